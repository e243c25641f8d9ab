use crate::events::{GalleryEntry, GalleryLoaded, LoadedImage};
use crate::processing::resize::downscale_to_fit;
use anyhow::Result;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tokio::select;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// Decodes an image to RGBA8 and applies EXIF orientation if available.
// Orientation handling is best-effort; without metadata the stored
// orientation is kept.
fn decode_rgba8_apply_exif(path: &Path) -> Result<image::RgbaImage> {
    let img = image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()?;
    let mut img = img.to_rgba8();

    let orientation: u16 = read_orientation(path).unwrap_or(1);
    match orientation {
        2 => img = image::imageops::flip_horizontal(&img),
        3 => img = image::imageops::rotate180(&img),
        4 => img = image::imageops::flip_vertical(&img),
        5 => {
            img = image::imageops::rotate90(&img);
            img = image::imageops::flip_horizontal(&img);
        }
        6 => img = image::imageops::rotate90(&img),
        7 => {
            img = image::imageops::rotate270(&img);
            img = image::imageops::flip_horizontal(&img);
        }
        8 => img = image::imageops::rotate270(&img),
        _ => {}
    }
    Ok(img)
}

fn read_orientation(path: &Path) -> Option<u16> {
    let file = File::open(path).ok()?;
    let mut buf = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut buf).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let o = field.value.get_uint(0)? as u16;
    debug!(orientation = o, path = %path.display(), "exif orientation");
    Some(o)
}

fn prepare(entry: &GalleryEntry, max_texture_dim: u32) -> Result<image::RgbaImage> {
    let decoded = decode_rgba8_apply_exif(&entry.path)?;
    downscale_to_fit(decoded, max_texture_dim)
}

/// Decode every entry, at most `max_in_flight` at a time.
///
/// Images come back in the order of `entries`; entries that fail to decode
/// are logged and left out, so the result may be shorter than the input.
pub async fn load_all(
    entries: Vec<GalleryEntry>,
    max_in_flight: usize,
    max_texture_dim: u32,
) -> GalleryLoaded {
    let total = entries.len();
    let mut slots: Vec<Option<LoadedImage>> = (0..total).map(|_| None).collect();
    let mut pending = entries.into_iter().enumerate();
    let mut tasks: JoinSet<(usize, GalleryEntry, Result<image::RgbaImage>)> = JoinSet::new();
    let limit = max_in_flight.max(1);

    loop {
        while tasks.len() < limit {
            let Some((slot, entry)) = pending.next() else {
                break;
            };
            tasks.spawn_blocking(move || {
                let res = prepare(&entry, max_texture_dim);
                (slot, entry, res)
            });
        }

        let Some(joined) = tasks.join_next().await else {
            break;
        };
        match joined {
            Ok((slot, entry, Ok(rgba8))) => {
                let (width, height) = rgba8.dimensions();
                debug!(id = %entry.id, width, height, "loaded (rgba8)");
                slots[slot] = Some(LoadedImage {
                    id: entry.id,
                    path: entry.path,
                    width,
                    height,
                    pixels: rgba8.into_raw(),
                });
            }
            Ok((_, entry, Err(err))) => {
                warn!(id = %entry.id, path = %entry.path.display(), error = %err, "dropping undecodable image");
            }
            Err(err) => {
                warn!(error = %err, "decode task failed");
            }
        }
    }

    let images: Vec<LoadedImage> = slots.into_iter().flatten().collect();
    info!(requested = total, loaded = images.len(), "gallery images decoded");
    GalleryLoaded { images }
}

/// Decode the gallery once and hand the whole set to the viewer.
pub async fn run(
    entries: Vec<GalleryEntry>,
    to_viewer: Sender<GalleryLoaded>,
    cancel: CancellationToken,
    max_in_flight: usize,
    max_texture_dim: u32,
) -> Result<()> {
    let loaded = select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("loader cancelled before decoding finished");
            return Ok(());
        }
        loaded = load_all(entries, max_in_flight, max_texture_dim) => loaded,
    };

    select! {
        biased;
        _ = cancel.cancelled() => {}
        res = to_viewer.send(loaded) => {
            if res.is_err() {
                debug!("viewer closed before gallery was delivered");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use std::path::PathBuf;

    // JPEG 2x1 with EXIF orientation 6 (rotate 90 CW), base64 encoded
    const ORIENT6_JPEG: &str = concat!(
        "/9j/4AAQSkZJRgABAQAAAQABAAD/4QAiRXhpZgAATU0AKgAAAAgAAQESAAMAAAABAAYAAAAAAAD/2wBDAAgGBgcGBQgHBwcJCQgKDBQNDAsLDBkSEw8UHRofHh0aHBwgJC4nICIsIxwcKDcpLDAxNDQ0Hyc5PTgyPC4zNDL/",
        "2wBDAQkJCQwLDBgNDRgyIRwhMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjL/wAARCAABAAIDASIAAhEBAxEB/8QAHwAAAQUBAQEBAQEAAAAAAAAAAAECAwQFBgcICQoL/8QAtRAAAgEDAwIEAwUFBAQAAAF9AQIDAAQRBRIhMUEGE1FhByJxFDKBkaEII0KxwRVS0fAkM2JyggkKFhcYGRolJicoKSo0NTY3ODk6Q0RFRkdISUpTVFVWV1hZWmNkZWZnaGlqc3R1dnd4eXqDhIWGh4iJipKTlJWWl5iZmqKjpKWmp6ipqrKztLW2t7i5usLDxMXGx8jJytLT1NXW19jZ2uHi4+Tl5ufo6erx8vP09fb3+Pn6/8QAHwEAAwEBAQEBAQEBAQAAAAAAAAECAwQFBgcICQoL/8QAtREAAgECBAQDBAcFBAQAAQJ3AAECAxEEBSExBhJBUQdhcRMiMoEIFEKRobHBCSMzUvAVYnLRChYkNOEl8RcYGRomJygpKjU2Nzg5OkNERUZHSElKU1RVVldYWVpjZGVmZ2hpanN0dXZ3eHl6goOEhYaHiImKkpOUlZaXmJmaoqOkpaanqKmqsrO0tba3uLm6wsPExcbHyMnK0tPU1dbX2Nna4uPk5ebn6Onq8vP09fb3+Pn6/9oADAMBAAIRAxEAPwDi6KKK+ZP3E//Z"
    );

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
        let path = dir.join(name);
        image::RgbaImage::from_pixel(w, h, image::Rgba([40, 80, 120, 255]))
            .save(&path)
            .unwrap();
        path
    }

    fn entry(id: &str, path: PathBuf) -> GalleryEntry {
        GalleryEntry {
            id: id.to_string(),
            path,
        }
    }

    #[test]
    fn applies_orientation_six() {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(ORIENT6_JPEG)
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orient6.jpg");
        std::fs::write(&path, &bytes).unwrap();
        let img = decode_rgba8_apply_exif(&path).unwrap();
        assert_eq!(img.dimensions(), (1, 2));
    }

    #[tokio::test]
    async fn keeps_source_order_and_drops_failures() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_png(dir.path(), "a.png", 6, 4);
        let broken = dir.path().join("broken.png");
        std::fs::write(&broken, b"not an image").unwrap();
        let c = write_png(dir.path(), "c.png", 3, 5);
        let missing = dir.path().join("missing.png");

        let loaded = load_all(
            vec![
                entry("a", a),
                entry("broken", broken),
                entry("missing", missing),
                entry("c", c),
            ],
            1,
            2048,
        )
        .await;

        let ids: Vec<_> = loaded.images.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["a", "c"]);
        assert_eq!((loaded.images[1].width, loaded.images[1].height), (3, 5));
        assert_eq!(loaded.images[1].pixels.len(), 3 * 5 * 4);
    }

    #[tokio::test]
    async fn oversized_images_are_downscaled() {
        let dir = tempfile::tempdir().unwrap();
        let big = write_png(dir.path(), "big.png", 128, 64);
        let loaded = load_all(vec![entry("big", big)], 4, 32).await;
        assert_eq!(loaded.images.len(), 1);
        assert_eq!((loaded.images[0].width, loaded.images[0].height), (32, 16));
    }

    #[tokio::test]
    async fn run_delivers_one_batch() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_png(dir.path(), "a.png", 2, 2);
        let (tx, mut rx) = tokio::sync::mpsc::channel(1);
        run(vec![entry("a", a)], tx, CancellationToken::new(), 2, 2048)
            .await
            .unwrap();
        let batch = rx.recv().await.unwrap();
        assert_eq!(batch.images.len(), 1);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn cancelled_run_sends_nothing() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(1);
        let cancel = CancellationToken::new();
        cancel.cancel();
        run(Vec::new(), tx, cancel, 2, 2048).await.unwrap();
        assert!(rx.recv().await.is_none());
    }
}
