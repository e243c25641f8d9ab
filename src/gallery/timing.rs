use std::time::Duration;

use serde::Deserialize;

/// Reference frame interval the per-tick constants were tuned for.
pub const REFERENCE_FRAME: Duration = Duration::from_nanos(16_666_667);

/// Longest interval a single tick may account for in `elapsed` mode, so a
/// stalled window does not fling the gallery forward when it resumes.
const MAX_TICK_STEPS: f32 = 4.0;

/// How per-tick animation constants (auto-scroll, friction, easing) relate
/// to wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MotionTiming {
    /// Apply each constant once per rendered frame. Visual speed follows the
    /// display refresh rate.
    #[default]
    PerFrame,
    /// Scale each constant by the elapsed time relative to a 60 Hz frame.
    Elapsed,
}

impl MotionTiming {
    /// Number of reference frames the given tick interval represents.
    pub fn steps(self, dt: Duration) -> f32 {
        match self {
            MotionTiming::PerFrame => 1.0,
            MotionTiming::Elapsed => {
                (dt.as_secs_f32() / REFERENCE_FRAME.as_secs_f32()).clamp(0.0, MAX_TICK_STEPS)
            }
        }
    }
}

/// Exponential approach factor for `steps` reference frames of a per-frame
/// lerp factor `base`.
pub fn ease_factor(base: f32, steps: f32) -> f32 {
    if steps == 1.0 {
        return base;
    }
    1.0 - (1.0 - base).powf(steps)
}

/// Multiplicative decay applied over `steps` reference frames.
pub fn decay_factor(per_frame: f32, steps: f32) -> f32 {
    if steps == 1.0 {
        return per_frame;
    }
    per_frame.powf(steps)
}
