use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::gallery::animator::{DEFAULT_CAMERA_DISTANCE, DEFAULT_FOV_DEG};
use crate::gallery::layout::LayoutKind;
use crate::gallery::scroll::DEFAULT_GESTURE_TIMEOUT;
use crate::gallery::timing::MotionTiming;

pub const DEFAULT_LANDMARK_SOCKET_PATH: &str = "/run/hand-tracker/landmarks.sock";

/// Where gallery images come from. Exactly one of the two must be set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct GallerySourceConfig {
    /// YAML or JSON document listing `contents: [{ id, image: { url } }]`.
    pub manifest: Option<PathBuf>,
    /// Directory scanned recursively for images.
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GallerySource<'a> {
    Manifest(&'a Path),
    Directory(&'a Path),
}

impl GallerySourceConfig {
    pub fn resolve(&self) -> Result<GallerySource<'_>> {
        match (self.manifest.as_deref(), self.directory.as_deref()) {
            (Some(manifest), None) => Ok(GallerySource::Manifest(manifest)),
            (None, Some(directory)) => Ok(GallerySource::Directory(directory)),
            (Some(_), Some(_)) => {
                anyhow::bail!("gallery-source must set only one of manifest or directory")
            }
            (None, None) => anyhow::bail!("gallery-source must set manifest or directory"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ViewerConfig {
    /// Layout shown when the gallery opens.
    pub initial_layout: LayoutKind,
    /// Camera distance from the origin along +Z.
    pub camera_distance: f32,
    /// Vertical field of view in degrees.
    pub field_of_view_deg: f32,
    /// Viewports narrower than this (logical px) use the compact constants.
    pub compact_breakpoint_px: u32,
    /// Whether animation constants apply per frame or per elapsed time.
    pub motion_timing: MotionTiming,
    /// Optional deterministic seed for the particle field.
    pub particle_seed: Option<u64>,
    /// Initial window title prefix.
    pub title: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            initial_layout: LayoutKind::Corridor,
            camera_distance: DEFAULT_CAMERA_DISTANCE,
            field_of_view_deg: DEFAULT_FOV_DEG,
            compact_breakpoint_px: 768,
            motion_timing: MotionTiming::PerFrame,
            particle_seed: None,
            title: "Gallery".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct GestureConfig {
    /// Start with hand-gesture scrolling enabled.
    pub enabled: bool,
    /// Unix socket on which the hand tracker publishes landmark frames.
    pub landmark_socket: PathBuf,
    /// Thumb-to-index distance (normalized) below which the hand pinches.
    pub pinch_threshold: f32,
    /// Scale applied to thumb movement while pinching.
    pub sensitivity: f32,
    /// Drag is released when no pinch sample arrives for this long.
    #[serde(with = "humantime_serde")]
    pub drag_timeout: Duration,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            landmark_socket: PathBuf::from(DEFAULT_LANDMARK_SOCKET_PATH),
            pinch_threshold: 0.1,
            sensitivity: 8.0,
            drag_timeout: DEFAULT_GESTURE_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    /// Image source for the gallery.
    pub gallery_source: GallerySourceConfig,
    /// Maximum number of entries requested from the source.
    pub page_size: usize,
    /// Maximum number of concurrent image decodes in the loader.
    pub loader_max_concurrent_decodes: usize,
    /// Larger images are downscaled to fit this edge length before upload.
    pub max_texture_dim: u32,
    /// Scene and camera options.
    pub viewer: ViewerConfig,
    /// Hand-gesture scrolling.
    pub gesture: GestureConfig,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            gallery_source: GallerySourceConfig::default(),
            page_size: 50,
            loader_max_concurrent_decodes: 4,
            max_texture_dim: 2048,
            viewer: ViewerConfig::default(),
            gesture: GestureConfig::default(),
        }
    }
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        self.gallery_source
            .resolve()
            .context("invalid gallery-source configuration")?;
        ensure!(self.page_size > 0, "page-size must be greater than zero");
        ensure!(
            self.loader_max_concurrent_decodes > 0,
            "loader-max-concurrent-decodes must be greater than zero"
        );
        ensure!(
            self.max_texture_dim >= 16,
            "max-texture-dim must be at least 16"
        );
        ensure!(
            self.viewer.camera_distance > 0.0,
            "viewer.camera-distance must be positive"
        );
        ensure!(
            self.viewer.field_of_view_deg > 1.0 && self.viewer.field_of_view_deg < 179.0,
            "viewer.field-of-view-deg must be between 1 and 179"
        );
        ensure!(
            self.gesture.pinch_threshold > 0.0,
            "gesture.pinch-threshold must be positive"
        );
        ensure!(
            self.gesture.sensitivity.is_finite(),
            "gesture.sensitivity must be finite"
        );
        ensure!(
            self.gesture.drag_timeout > Duration::ZERO,
            "gesture.drag-timeout must be positive"
        );
        ensure!(
            !self.gesture.landmark_socket.as_os_str().is_empty(),
            "gesture.landmark-socket must not be empty"
        );
        Ok(self)
    }
}
