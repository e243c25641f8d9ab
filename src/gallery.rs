//! Gallery controller.
//!
//! Owns every piece of mutable gallery state (layout, scroll, focus, dimmer
//! and the photo entities) and advances it once per rendered frame. Input
//! handlers and the gesture adapter only reach this state through the
//! methods below, so a tick always sees one consistent snapshot.

pub mod animator;
pub mod focus;
pub mod layout;
pub mod scene;
pub mod scroll;
pub mod timing;

use std::time::{Duration, Instant};

use glam::Vec2;
use tracing::{debug, info};

use crate::config::ViewerConfig;
use crate::events::GalleryCommand;
use animator::{Camera, FrameInput, PhotoEntity, Ray};
use focus::{Dimmer, FocusChange, FocusSM, FocusState};
use layout::LayoutKind;
use scroll::{ScrollController, ScrollState};
use timing::MotionTiming;

/// Drawable area in pixels. The gallery expects logical pixels; see
/// [`Viewport::to_logical`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }

    pub fn is_compact(&self, breakpoint_px: u32) -> bool {
        self.width < breakpoint_px
    }

    /// Convert a physical size to logical pixels for the given scale factor.
    pub fn to_logical(self, scale_factor: f64) -> Self {
        if !scale_factor.is_finite() || scale_factor <= 0.0 {
            return self;
        }
        let logical = |px: u32| ((px as f64 / scale_factor).round() as u32).max(1);
        Self::new(logical(self.width), logical(self.height))
    }

    /// Map a pixel position (origin top-left) to `[-1, 1]`, y up.
    pub fn normalize(&self, x: f64, y: f64) -> Vec2 {
        let w = self.width.max(1) as f64;
        let h = self.height.max(1) as f64;
        let nx = (x / w) * 2.0 - 1.0;
        let ny = -((y / h) * 2.0 - 1.0);
        Vec2::new(nx.clamp(-1.0, 1.0) as f32, ny.clamp(-1.0, 1.0) as f32)
    }
}

pub struct Gallery {
    layout: LayoutKind,
    scroll: ScrollController,
    focus: FocusSM,
    dimmer: Dimmer,
    photos: Vec<PhotoEntity>,
    camera: Camera,
    camera_enabled: bool,
    timing: MotionTiming,
    compact_breakpoint: u32,
    mounted_at: Instant,
    last_tick: Option<Instant>,
    elapsed: f32,
}

impl Gallery {
    pub fn new(cfg: &ViewerConfig, gesture_timeout: Duration, now: Instant) -> Self {
        Self {
            layout: cfg.initial_layout,
            scroll: ScrollController::new(cfg.motion_timing, gesture_timeout),
            focus: FocusSM::default(),
            dimmer: Dimmer::default(),
            photos: Vec::new(),
            camera: Camera::new(cfg.camera_distance, cfg.field_of_view_deg, 1.0),
            camera_enabled: false,
            timing: cfg.motion_timing,
            compact_breakpoint: cfg.compact_breakpoint_px,
            mounted_at: now,
            last_tick: None,
            elapsed: 0.0,
        }
    }

    /// Replace the photo set. Items keep the order given; `total` becomes
    /// the number of sizes supplied.
    pub fn set_items<I>(&mut self, sizes: I)
    where
        I: IntoIterator<Item = (u32, u32)>,
    {
        self.photos = sizes
            .into_iter()
            .enumerate()
            .map(|(index, (w, h))| PhotoEntity::new(index, w, h))
            .collect();
        self.focus.retain(self.photos.len());
        info!(count = self.photos.len(), "gallery items replaced");
    }

    pub fn photos(&self) -> &[PhotoEntity] {
        &self.photos
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    pub fn layout(&self) -> LayoutKind {
        self.layout
    }

    /// Switch layout. Always restarts the scroll from rest; focus is kept.
    pub fn set_layout(&mut self, kind: LayoutKind) {
        if kind != self.layout {
            info!(from = %self.layout, to = %kind, "layout changed");
        }
        self.layout = kind;
        self.scroll.reset();
    }

    pub fn scroll(&self) -> ScrollState {
        self.scroll.state()
    }

    pub fn focus(&self) -> FocusState {
        self.focus.current()
    }

    pub fn focused_index(&self) -> Option<usize> {
        self.focus.focused_index()
    }

    pub fn is_focused(&self) -> bool {
        self.focus.is_focused()
    }

    /// Per-item select control. Out-of-range indices are ignored.
    pub fn select(&mut self, index: usize) -> Option<FocusChange> {
        if index >= self.photos.len() {
            debug!(index, total = self.photos.len(), "ignoring select for unknown item");
            return None;
        }
        self.focus.select(index)
    }

    pub fn clear_focus(&mut self) -> Option<FocusChange> {
        self.focus.clear()
    }

    pub fn dimmer(&self) -> &Dimmer {
        &self.dimmer
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_enabled(&self) -> bool {
        self.camera_enabled
    }

    pub fn toggle_camera(&mut self) -> bool {
        self.camera_enabled = !self.camera_enabled;
        info!(enabled = self.camera_enabled, "camera gesture mode toggled");
        self.camera_enabled
    }

    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed
    }

    pub fn is_compact(&self, viewport: Viewport) -> bool {
        viewport.is_compact(self.compact_breakpoint)
    }

    pub fn apply(&mut self, cmd: GalleryCommand) {
        match cmd {
            GalleryCommand::SelectLayout(kind) => {
                if self.is_focused() {
                    debug!(%kind, "layout selector hidden while focused");
                    return;
                }
                self.set_layout(kind);
            }
            GalleryCommand::Select(index) => {
                self.select(index);
            }
            GalleryCommand::CloseFocus => {
                self.clear_focus();
            }
            GalleryCommand::ToggleCamera => {
                self.toggle_camera();
            }
        }
    }

    pub fn wheel(&mut self, delta_y: f32) {
        if self.is_focused() {
            return;
        }
        self.scroll.wheel(delta_y, self.layout);
    }

    pub fn touch_start(&mut self, y: f32) {
        if self.is_focused() {
            return;
        }
        self.scroll.touch_start(y);
    }

    pub fn touch_move(&mut self, y: f32) {
        if self.is_focused() {
            return;
        }
        self.scroll.touch_move(y, self.layout);
    }

    pub fn touch_end(&mut self) {
        self.scroll.touch_end();
    }

    /// Entry point for the hand-gesture adapter.
    pub fn gesture_scroll(&mut self, delta: f32, at: Instant) {
        if self.is_focused() {
            return;
        }
        self.scroll.gesture_drag(delta, at);
    }

    /// Advance one frame: scroll first, then every photo against that
    /// scroll value, then the dimmer.
    pub fn tick(&mut self, now: Instant, viewport: Viewport, pointer: Vec2) {
        let dt = self
            .last_tick
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or(timing::REFERENCE_FRAME);
        self.last_tick = Some(now);
        self.elapsed = now.saturating_duration_since(self.mounted_at).as_secs_f32();
        self.camera.aspect = viewport.aspect();

        self.scroll.tick(now, dt);

        let steps = self.timing.steps(dt);
        let input = FrameInput {
            layout: self.layout,
            total: self.photos.len(),
            compact: self.is_compact(viewport),
            scroll: self.scroll.position(),
            focused: self.focus.focused_index(),
            elapsed: self.elapsed,
            pointer,
            camera: &self.camera,
            steps,
        };
        for photo in &mut self.photos {
            photo.animate(&input);
        }

        self.dimmer.tick(self.focus.is_focused(), steps);
    }

    /// Nearest photo hit by `ray`.
    pub fn pick(&self, ray: &Ray) -> Option<usize> {
        self.photos
            .iter()
            .filter_map(|photo| photo.hit_distance(ray).map(|d| (photo.index(), d)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(index, _)| index)
    }

    /// Photo under a normalized pointer position.
    pub fn pick_at(&self, pointer: Vec2) -> Option<usize> {
        self.pick(&self.camera.ray_through(pointer))
    }
}
