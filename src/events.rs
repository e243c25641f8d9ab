use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use crate::gallery::layout::LayoutKind;

/// One entry returned by the image source, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryEntry {
    pub id: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub id: String,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// RGBA8, row-major, `width * height * 4` bytes.
    pub pixels: Vec<u8>,
}

/// The complete set of successfully decoded images, in source order.
#[derive(Debug, Clone, Default)]
pub struct GalleryLoaded {
    pub images: Vec<LoadedImage>,
}

/// User-facing gallery controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GalleryCommand {
    SelectLayout(LayoutKind),
    Select(usize),
    CloseFocus,
    ToggleCamera,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GestureStatus {
    #[default]
    Idle,
    Loading,
    Active,
    Error,
}

impl fmt::Display for GestureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GestureStatus::Idle => "idle",
            GestureStatus::Loading => "loading",
            GestureStatus::Active => "active",
            GestureStatus::Error => "error",
        };
        f.write_str(label)
    }
}

/// Emitted by the hand-gesture adapter toward the viewer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureEvent {
    Status(GestureStatus),
    /// Scaled per-sample scroll delta while pinching.
    Scroll { delta: f32, at: Instant },
}
