//! Scroll position with momentum.
//!
//! The controller owns a single scalar that every layout reads. Input paths
//! either nudge the velocity (wheel) or drive the position directly while a
//! drag is in progress (touch, hand pinch). Between drags the position keeps
//! drifting by a small auto-scroll increment and the velocity decays.

use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::layout::LayoutKind;
use super::timing::{MotionTiming, decay_factor};

pub const AUTO_SCROLL_SPEED: f32 = 0.005;
pub const FRICTION: f32 = 0.95;
pub const MAX_VELOCITY: f32 = 0.5;
pub const REST_THRESHOLD: f32 = 0.001;
pub const DEFAULT_GESTURE_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScrollState {
    pub position: f32,
    pub velocity: f32,
    pub is_dragging: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Drag {
    Touch { last_y: f32 },
    Gesture { last_sample: Instant },
}

#[derive(Debug, Clone)]
pub struct ScrollController {
    state: ScrollState,
    drag: Option<Drag>,
    timing: MotionTiming,
    gesture_timeout: Duration,
}

impl Default for ScrollController {
    fn default() -> Self {
        Self::new(MotionTiming::default(), DEFAULT_GESTURE_TIMEOUT)
    }
}

impl ScrollController {
    pub fn new(timing: MotionTiming, gesture_timeout: Duration) -> Self {
        Self {
            state: ScrollState::default(),
            drag: None,
            timing,
            gesture_timeout,
        }
    }

    pub fn state(&self) -> ScrollState {
        self.state
    }

    pub fn position(&self) -> f32 {
        self.state.position
    }

    pub fn velocity(&self) -> f32 {
        self.state.velocity
    }

    pub fn is_dragging(&self) -> bool {
        self.state.is_dragging
    }

    /// Advance one animation tick.
    pub fn tick(&mut self, now: Instant, dt: Duration) {
        self.expire_gesture(now);
        if self.state.is_dragging {
            return;
        }
        let steps = self.timing.steps(dt);
        self.state.position += AUTO_SCROLL_SPEED * steps;
        self.state.position += self.state.velocity * steps;
        self.state.velocity *= decay_factor(FRICTION, steps);
        if self.state.velocity.abs() < REST_THRESHOLD {
            self.state.velocity = 0.0;
        }
    }

    pub fn wheel(&mut self, delta_y: f32, layout: LayoutKind) {
        if !delta_y.is_finite() {
            return;
        }
        self.state.velocity = clamp_velocity(self.state.velocity + delta_y * layout.wheel_sensitivity());
        trace!(delta_y, velocity = self.state.velocity, "wheel");
    }

    pub fn touch_start(&mut self, y: f32) {
        self.drag = Some(Drag::Touch { last_y: y });
        self.state.is_dragging = true;
        self.state.velocity = 0.0;
    }

    pub fn touch_move(&mut self, y: f32, layout: LayoutKind) {
        let Some(Drag::Touch { last_y }) = self.drag.as_mut() else {
            return;
        };
        let delta = *last_y - y;
        *last_y = y;
        self.drive(delta * layout.touch_sensitivity());
    }

    pub fn touch_end(&mut self) {
        if matches!(self.drag, Some(Drag::Touch { .. })) {
            self.release();
        }
    }

    /// Apply an already-scaled hand-gesture delta sampled at `at`.
    pub fn gesture_drag(&mut self, delta: f32, at: Instant) {
        self.drag = Some(Drag::Gesture { last_sample: at });
        self.state.is_dragging = true;
        self.drive(delta);
    }

    /// Zero position and velocity; used when the layout changes.
    pub fn reset(&mut self) {
        self.state.position = 0.0;
        self.state.velocity = 0.0;
    }

    fn drive(&mut self, increment: f32) {
        if !increment.is_finite() {
            trace!(increment, "ignoring non-finite scroll increment");
            return;
        }
        self.state.position += increment;
        self.state.velocity = clamp_velocity(increment);
    }

    fn release(&mut self) {
        self.drag = None;
        self.state.is_dragging = false;
    }

    fn expire_gesture(&mut self, now: Instant) {
        if let Some(Drag::Gesture { last_sample }) = self.drag {
            if now.saturating_duration_since(last_sample) > self.gesture_timeout {
                debug!("gesture drag timed out; resuming auto-scroll");
                self.release();
            }
        }
    }
}

fn clamp_velocity(v: f32) -> f32 {
    v.clamp(-MAX_VELOCITY, MAX_VELOCITY)
}
