//! Frame assembly.
//!
//! The composer turns the gallery's current state into a flat
//! [`FrameSnapshot`] the renderer can upload without consulting any other
//! component. It keeps only the particle cloud between frames.

use glam::{Mat4, Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::Gallery;
use super::animator::Camera;
use super::focus::{DIMMER_DISTANCE, DIMMER_SIZE};

pub const PARTICLE_COUNT: usize = 1500;
pub const PARTICLE_COUNT_COMPACT: usize = 600;
/// Extent of the box the particles are scattered in, centred on the origin.
pub const PARTICLE_VOLUME: Vec3 = Vec3::new(30.0, 40.0, 20.0);
pub const PARTICLE_SPIN: f32 = 0.05;
pub const PARTICLE_SIZE: f32 = 0.15;
pub const PARTICLE_OPACITY: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLight {
    pub position: Vec3,
    pub target: Vec3,
    /// Half-angle of the cone, radians.
    pub angle: f32,
    pub penumbra: f32,
    pub intensity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub intensity: f32,
    pub color: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lighting {
    pub ambient: f32,
    pub spot: SpotLight,
    pub point: PointLight,
}

pub const LIGHTING: Lighting = Lighting {
    ambient: 0.5,
    spot: SpotLight {
        position: Vec3::new(0.0, 15.0, 20.0),
        target: Vec3::ZERO,
        angle: 0.5,
        penumbra: 1.0,
        intensity: 80.0,
    },
    point: PointLight {
        position: Vec3::new(0.0, 0.0, 10.0),
        intensity: 2.0,
        color: Vec3::ONE,
    },
};

/// Exponential-squared distance fog.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fog {
    pub color: Vec3,
    pub density: f32,
}

pub const FOG: Fog = Fog {
    color: Vec3::ZERO,
    density: 0.02,
};

/// Decorative point cloud drifting around the gallery.
#[derive(Debug, Clone)]
pub struct ParticleField {
    points: Vec<Vec3>,
}

impl ParticleField {
    pub fn scatter<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Self {
        let points = (0..count)
            .map(|_| {
                Vec3::new(
                    rng.random::<f32>() - 0.5,
                    rng.random::<f32>() - 0.5,
                    rng.random::<f32>() - 0.5,
                ) * PARTICLE_VOLUME
            })
            .collect();
        Self { points }
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Rotation about Y after `elapsed` seconds.
    pub fn rotation(elapsed: f32) -> f32 {
        elapsed * PARTICLE_SPIN
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhotoInstance {
    pub index: usize,
    pub model: Mat4,
    /// Plane size before the model transform is applied.
    pub size: Vec2,
    /// Focused photos are drawn without lighting or fog.
    pub lit: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DimmerInstance {
    pub model: Mat4,
    pub opacity: f32,
    pub visible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleInstance {
    pub rotation: f32,
    pub size: f32,
    pub opacity: f32,
}

/// Everything the renderer needs for one frame.
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    pub view_proj: Mat4,
    pub camera_position: Vec3,
    pub lighting: Lighting,
    pub fog: Fog,
    pub photos: Vec<PhotoInstance>,
    pub particles: ParticleInstance,
    pub dimmer: DimmerInstance,
}

pub struct SceneComposer {
    rng: StdRng,
    particles: ParticleField,
    particles_dirty: bool,
}

impl SceneComposer {
    pub fn new(seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let particles = ParticleField::scatter(PARTICLE_COUNT, &mut rng);
        Self {
            rng,
            particles,
            particles_dirty: true,
        }
    }

    pub fn particles(&self) -> &ParticleField {
        &self.particles
    }

    /// Returns the particle cloud once after it was (re)generated so the
    /// renderer can re-upload it.
    pub fn take_particle_update(&mut self) -> Option<&ParticleField> {
        if self.particles_dirty {
            self.particles_dirty = false;
            Some(&self.particles)
        } else {
            None
        }
    }

    pub fn compose(&mut self, gallery: &Gallery, camera: &Camera, compact: bool) -> FrameSnapshot {
        let wanted = if compact {
            PARTICLE_COUNT_COMPACT
        } else {
            PARTICLE_COUNT
        };
        if self.particles.len() != wanted {
            self.particles = ParticleField::scatter(wanted, &mut self.rng);
            self.particles_dirty = true;
        }

        let focused = gallery.focused_index();
        let photos = gallery
            .photos()
            .iter()
            .map(|photo| PhotoInstance {
                index: photo.index(),
                model: photo.transform().matrix(),
                size: photo.size(),
                lit: focused != Some(photo.index()),
            })
            .collect();

        let dimmer_pos = camera.position + camera.forward() * DIMMER_DISTANCE;
        let dimmer = DimmerInstance {
            model: Mat4::from_scale_rotation_translation(
                Vec3::new(DIMMER_SIZE, DIMMER_SIZE, 1.0),
                glam::Quat::IDENTITY,
                dimmer_pos,
            ),
            opacity: gallery.dimmer().opacity(),
            visible: gallery.dimmer().is_visible(),
        };

        FrameSnapshot {
            view_proj: camera.view_projection(),
            camera_position: camera.position,
            lighting: LIGHTING,
            fog: FOG,
            photos,
            particles: ParticleInstance {
                rotation: ParticleField::rotation(gallery.elapsed_secs()),
                size: PARTICLE_SIZE,
                opacity: PARTICLE_OPACITY,
            },
            dimmer,
        }
    }
}
