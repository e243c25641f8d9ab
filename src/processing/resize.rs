use anyhow::{Context, Result};
use fast_image_resize as fir;
use image::RgbaImage;

/// Size that fits `src` inside a `max_dim` square, preserving aspect.
/// Images already within bounds keep their size; nothing is upscaled.
pub fn fit_within(src_w: u32, src_h: u32, max_dim: u32) -> (u32, u32) {
    let iw = src_w.max(1) as f32;
    let ih = src_h.max(1) as f32;
    let limit = max_dim.max(1) as f32;
    let scale = (limit / iw).min(limit / ih).min(1.0);
    let w = (iw * scale).round().clamp(1.0, limit);
    let h = (ih * scale).round().clamp(1.0, limit);
    (w as u32, h as u32)
}

/// Downscale `source` so neither edge exceeds `max_dim`.
pub fn downscale_to_fit(source: RgbaImage, max_dim: u32) -> Result<RgbaImage> {
    let (target_w, target_h) = fit_within(source.width(), source.height(), max_dim);
    if source.width() == target_w && source.height() == target_h {
        return Ok(source);
    }

    let src_view = fir::images::ImageRef::new(
        source.width(),
        source.height(),
        source.as_raw(),
        fir::PixelType::U8x4,
    )
    .context("failed to create source view for texture downscale")?;
    let mut dst_image = fir::images::Image::new(target_w, target_h, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::CatmullRom));
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_view, &mut dst_image, Some(&options))
        .context("texture downscale failed")?;
    RgbaImage::from_raw(target_w, target_h, dst_image.into_vec())
        .ok_or_else(|| anyhow::anyhow!("failed to construct downscaled RGBA image"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_small_images() {
        assert_eq!(fit_within(640, 480, 2048), (640, 480));
    }

    #[test]
    fn shrinks_binding_edge() {
        assert_eq!(fit_within(4000, 2000, 2048), (2048, 1024));
        assert_eq!(fit_within(1000, 3000, 300), (100, 300));
    }

    #[test]
    fn downscale_produces_target_dimensions() {
        let img = RgbaImage::from_pixel(64, 32, image::Rgba([200, 10, 10, 255]));
        let out = downscale_to_fit(img, 16).unwrap();
        assert_eq!(out.dimensions(), (16, 8));
        assert!((i32::from(out.get_pixel(8, 4)[0]) - 200).abs() <= 1);
    }
}
