//! Per-photo continuous animation.
//!
//! Each tick a photo picks a target pose (docked in front of the camera when
//! focused, otherwise its layout slot plus idle float and pointer parallax)
//! and eases its current transform toward it.
//!
//! Orientation is eased per Euler component rather than as a rotation
//! interpolation. The angular deltas in every layout stay small enough that
//! this does not visibly overshoot; large deltas (e.g. a ring item swapping
//! to the far side) take the long way round.

use glam::{EulerRot, Mat4, Quat, Vec2, Vec3};

use super::layout::{LayoutKind, layout_target};
use super::timing::ease_factor;

/// Fixed plane height; width follows the image aspect ratio.
pub const PHOTO_HEIGHT: f32 = 3.2;
pub const FOCUS_DISTANCE: f32 = 3.5;
/// Share of the visible frustum a focused photo may occupy.
pub const FOCUS_FILL: f32 = 0.85;
pub const FOCUS_SMOOTHING: f32 = 0.15;
pub const LAYOUT_SMOOTHING: f32 = 0.08;

const BOB_AMPLITUDE: f32 = 0.1;
const BOB_FREQUENCY: f32 = 2.0;
const ROLL_AMPLITUDE: f32 = 0.02;
const PARALLAX_OFFSET: f32 = 0.5;
const PARALLAX_TILT: f32 = 0.2;

pub const DEFAULT_CAMERA_DISTANCE: f32 = 14.0;
pub const DEFAULT_FOV_DEG: f32 = 50.0;
const NEAR_PLANE: f32 = 0.1;
const FAR_PLANE: f32 = 1000.0;

/// Perspective camera on the +Z axis looking toward the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub fov_y_deg: f32,
    pub aspect: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(DEFAULT_CAMERA_DISTANCE, DEFAULT_FOV_DEG, 1.0)
    }
}

impl Camera {
    pub fn new(distance: f32, fov_y_deg: f32, aspect: f32) -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, distance),
            fov_y_deg,
            aspect,
        }
    }

    pub fn forward(&self) -> Vec3 {
        Vec3::NEG_Z
    }

    pub fn fov_y(&self) -> f32 {
        self.fov_y_deg.to_radians()
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward(), Vec3::Y)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y(), self.aspect.max(f32::EPSILON), NEAR_PLANE, FAR_PLANE)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }

    /// Width and height of the frustum cross-section at `distance`.
    pub fn visible_extent(&self, distance: f32) -> Vec2 {
        let height = 2.0 * (self.fov_y() / 2.0).tan() * distance;
        Vec2::new(height * self.aspect, height)
    }

    /// World-space ray through a point in normalized device coordinates.
    pub fn ray_through(&self, ndc: Vec2) -> Ray {
        let inv = self.view_projection().inverse();
        let near = inv.project_point3(ndc.extend(0.0));
        let far = inv.project_point3(ndc.extend(1.0));
        Ray {
            origin: self.position,
            direction: (far - near).normalize_or(self.forward()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    /// XYZ Euler angles in radians.
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn ease_toward(&mut self, target: &Transform, factor: f32) {
        self.position = self.position.lerp(target.position, factor);
        self.rotation += (target.rotation - self.rotation) * factor;
        self.scale = self.scale.lerp(target.scale, factor);
    }

    pub fn quat(&self) -> Quat {
        Quat::from_euler(EulerRot::XYZ, self.rotation.x, self.rotation.y, self.rotation.z)
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.quat(), self.position)
    }
}

/// Everything a photo needs from the rest of the gallery for one tick.
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    pub layout: LayoutKind,
    pub total: usize,
    pub compact: bool,
    pub scroll: f32,
    pub focused: Option<usize>,
    /// Seconds since the gallery was mounted.
    pub elapsed: f32,
    /// Pointer in normalized coordinates, `[-1, 1]` on both axes, y up.
    pub pointer: Vec2,
    pub camera: &'a Camera,
    pub steps: f32,
}

#[derive(Debug, Clone)]
pub struct PhotoEntity {
    index: usize,
    aspect_ratio: f32,
    transform: Transform,
}

impl PhotoEntity {
    pub fn new(index: usize, width: u32, height: u32) -> Self {
        let aspect_ratio = if height == 0 {
            1.0
        } else {
            width as f32 / height as f32
        };
        Self {
            index,
            aspect_ratio,
            transform: Transform::default(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.aspect_ratio
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(PHOTO_HEIGHT * self.aspect_ratio, PHOTO_HEIGHT)
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn target(&self, input: &FrameInput<'_>) -> Transform {
        if input.focused == Some(self.index) {
            return focus_target(self.size(), input.camera);
        }

        let slot = layout_target(
            self.index,
            input.total,
            input.layout,
            input.compact,
            input.scroll,
        );
        let mut position = slot.position;
        let mut rotation = slot.rotation;

        let phase = self.index as f32;
        position.y += (input.elapsed * BOB_FREQUENCY + phase).sin() * BOB_AMPLITUDE;
        rotation.z += (input.elapsed + phase).cos() * ROLL_AMPLITUDE;

        position.x += input.pointer.x * PARALLAX_OFFSET;
        position.y += input.pointer.y * PARALLAX_OFFSET;
        rotation.x -= input.pointer.y * PARALLAX_TILT;
        rotation.y += input.pointer.x * PARALLAX_TILT;

        Transform {
            position,
            rotation,
            scale: Vec3::ONE,
        }
    }

    pub fn animate(&mut self, input: &FrameInput<'_>) {
        let target = self.target(input);
        let base = if input.focused == Some(self.index) {
            FOCUS_SMOOTHING
        } else {
            LAYOUT_SMOOTHING
        };
        self.transform
            .ease_toward(&target, ease_factor(base, input.steps));
    }

    /// Distance along `ray` to this photo's plane, if the ray hits it.
    /// Both faces are pickable.
    pub fn hit_distance(&self, ray: &Ray) -> Option<f32> {
        let inv = self.transform.matrix().inverse();
        let origin = inv.transform_point3(ray.origin);
        let dir = inv.transform_vector3(ray.direction);
        if dir.z.abs() < f32::EPSILON {
            return None;
        }
        let t = -origin.z / dir.z;
        if t <= 0.0 {
            return None;
        }
        let local = origin + dir * t;
        let half = self.size() / 2.0;
        if local.x.abs() > half.x || local.y.abs() > half.y {
            return None;
        }
        let world_hit = self.transform.matrix().transform_point3(local);
        Some(world_hit.distance(ray.origin))
    }
}

/// Pose that docks a photo of `size` in front of the camera, scaled so the
/// binding dimension fills `FOCUS_FILL` of the view.
pub fn focus_target(size: Vec2, camera: &Camera) -> Transform {
    let visible = camera.visible_extent(FOCUS_DISTANCE);
    let scale_h = visible.y * FOCUS_FILL / size.y;
    let scale_w = visible.x * FOCUS_FILL / size.x;
    let s = scale_h.min(scale_w);
    Transform {
        position: camera.position + camera.forward() * FOCUS_DISTANCE,
        rotation: Vec3::ZERO,
        scale: Vec3::splat(s),
    }
}
