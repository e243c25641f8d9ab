//! Parametric spatial arrangements for the gallery photos.
//!
//! Every layout maps `(index, total, scroll)` to a pose. The functions here
//! are pure: the same inputs always produce bit-identical outputs, which the
//! animator relies on to keep all photos consistent within a tick.

use std::f32::consts::{FRAC_PI_2, TAU};
use std::fmt;
use std::str::FromStr;

use glam::Vec3;
use serde::Deserialize;
use thiserror::Error;

/// Lateral reduction applied to spiral and heart radii on compact viewports.
const COMPACT_X_MULT: f32 = 0.6;

const CORRIDOR_SPREAD: f32 = 3.0;
const CORRIDOR_SPREAD_COMPACT: f32 = 1.8;
const CORRIDOR_STEP: f32 = 3.5;
const CORRIDOR_YAW: f32 = 0.2;

const RING_RADIUS: f32 = 9.0;
const RING_RADIUS_COMPACT: f32 = 6.0;

const SPIRAL_RADIUS: f32 = 4.0;
const SPIRAL_ANGLE_STEP: f32 = 0.6;
const SPIRAL_RISE: f32 = 1.5;
const SPIRAL_SCROLL_RATE: f32 = 0.5;

const HEART_SCALE: f32 = 0.3;
const HEART_DEPTH_STEP: f32 = 0.2;

/// Scroll-to-angle rate shared by the rotating layouts (ring, heart).
const ANGULAR_SCROLL_RATE: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutKind {
    #[default]
    Corridor,
    Ring,
    Spiral,
    Heart,
}

impl LayoutKind {
    /// Order in which the layout selector presents the layouts.
    pub const SELECTOR_ORDER: [LayoutKind; 4] = [
        LayoutKind::Corridor,
        LayoutKind::Heart,
        LayoutKind::Ring,
        LayoutKind::Spiral,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LayoutKind::Corridor => "corridor",
            LayoutKind::Ring => "ring",
            LayoutKind::Spiral => "spiral",
            LayoutKind::Heart => "heart",
        }
    }

    /// Glyph shown on the layout selector control.
    pub fn glyph(self) -> &'static str {
        match self {
            LayoutKind::Corridor => "||",
            LayoutKind::Ring => "◎",
            LayoutKind::Spiral => "§",
            LayoutKind::Heart => "♥",
        }
    }

    /// Ring and heart interpret the scroll value as an angle; corridor and
    /// spiral as a vertical offset.
    pub fn is_angular(self) -> bool {
        matches!(self, LayoutKind::Ring | LayoutKind::Heart)
    }

    pub fn wheel_sensitivity(self) -> f32 {
        if self.is_angular() { 0.005 } else { 0.02 }
    }

    pub fn touch_sensitivity(self) -> f32 {
        if self.is_angular() { 0.01 } else { 0.05 }
    }

    /// Layout bound to the given 1-based selector slot.
    pub fn from_selector_slot(slot: usize) -> Option<Self> {
        slot.checked_sub(1)
            .and_then(|idx| Self::SELECTOR_ORDER.get(idx).copied())
    }
}

impl fmt::Display for LayoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown layout '{0}' (expected corridor, ring, spiral or heart)")]
pub struct UnknownLayout(pub String);

impl FromStr for LayoutKind {
    type Err = UnknownLayout;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "corridor" => Ok(LayoutKind::Corridor),
            "ring" => Ok(LayoutKind::Ring),
            "spiral" => Ok(LayoutKind::Spiral),
            "heart" => Ok(LayoutKind::Heart),
            _ => Err(UnknownLayout(s.to_string())),
        }
    }
}

/// Target pose produced by a layout. Rotation is XYZ Euler angles in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutTarget {
    pub position: Vec3,
    pub rotation: Vec3,
}

/// Even angular slot for `index` among `total` items, in `[0, 2π)`.
///
/// Returns `0` when `total` is zero; callers never request targets for an
/// empty gallery.
pub fn angular_slot(index: usize, total: usize) -> f32 {
    if total == 0 {
        return 0.0;
    }
    index as f32 / total as f32 * TAU
}

pub fn layout_target(
    index: usize,
    total: usize,
    kind: LayoutKind,
    compact: bool,
    scroll: f32,
) -> LayoutTarget {
    let theta = angular_slot(index, total);
    let x_mult = if compact { COMPACT_X_MULT } else { 1.0 };
    let centered = index as f32 - total as f32 / 2.0;

    match kind {
        LayoutKind::Corridor => {
            let spread = if compact {
                CORRIDOR_SPREAD_COMPACT
            } else {
                CORRIDOR_SPREAD
            };
            let odd = index % 2 == 1;
            let side = if odd { 1.0 } else { -1.0 };
            LayoutTarget {
                position: Vec3::new(side * spread, -(index as f32) * CORRIDOR_STEP + scroll, 0.0),
                rotation: Vec3::new(0.0, if odd { -CORRIDOR_YAW } else { CORRIDOR_YAW }, 0.0),
            }
        }
        LayoutKind::Ring => {
            let radius = if compact { RING_RADIUS_COMPACT } else { RING_RADIUS };
            let angle = theta + scroll * ANGULAR_SCROLL_RATE;
            LayoutTarget {
                position: Vec3::new(angle.cos() * radius, 0.0, angle.sin() * radius),
                rotation: Vec3::new(0.0, -angle + FRAC_PI_2, 0.0),
            }
        }
        LayoutKind::Spiral => {
            let radius = SPIRAL_RADIUS * x_mult;
            let angle = index as f32 * SPIRAL_ANGLE_STEP;
            let y = centered * SPIRAL_RISE + scroll * SPIRAL_SCROLL_RATE;
            LayoutTarget {
                position: Vec3::new(angle.cos() * radius, y, angle.sin() * radius),
                rotation: Vec3::new(0.0, -angle, 0.0),
            }
        }
        LayoutKind::Heart => {
            let scale = HEART_SCALE * x_mult;
            let angle = theta + scroll * ANGULAR_SCROLL_RATE;
            let (hx, hy) = heart_curve(angle);
            LayoutTarget {
                position: Vec3::new(hx * scale, hy * scale, centered * HEART_DEPTH_STEP),
                rotation: Vec3::ZERO,
            }
        }
    }
}

/// Classic polynomial heart curve, unscaled (roughly 32 × 30 units).
fn heart_curve(t: f32) -> (f32, f32) {
    let x = 16.0 * t.sin().powi(3);
    let y = 13.0 * t.cos() - 5.0 * (2.0 * t).cos() - 2.0 * (3.0 * t).cos() - (4.0 * t).cos();
    (x, y)
}
