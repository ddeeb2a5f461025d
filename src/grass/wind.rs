//! Wind fields sampled by the physics pass.
//!
//! `DirectionalWind` is mirrored by `wind_at` in grass_physics.wgsl; the two
//! must stay in sync.

use std::f32::consts::TAU;

use glam::{Vec2, Vec3};

use super::config::WindConfig;

/// Pure function of position and time returning a force vector.
pub trait WindField: Sync {
    fn sample(&self, position: Vec3, time: f32) -> Vec3;
}

/// No wind at all.
#[derive(Clone, Copy, Debug, Default)]
pub struct CalmWind;

impl WindField for CalmWind {
    fn sample(&self, _position: Vec3, _time: f32) -> Vec3 {
        Vec3::ZERO
    }
}

/// Horizontal wind with travelling sinusoidal gust fronts.
#[derive(Clone, Copy, Debug)]
pub struct DirectionalWind {
    /// Unit XZ direction
    pub direction: Vec2,
    pub base_speed: f32,
    pub gust_strength: f32,
    pub gust_frequency: f32,
    pub wavelength: f32,
}

impl DirectionalWind {
    pub fn from_config(config: &WindConfig) -> Self {
        Self {
            direction: Vec2::from(config.base_direction).normalize_or_zero(),
            base_speed: config.base_speed,
            gust_strength: config.gust_strength,
            gust_frequency: config.gust_frequency,
            wavelength: config.wavelength.max(f32::EPSILON),
        }
    }

    /// Gust factor in [0, 1] at an XZ position
    pub fn gust(&self, position: Vec3, time: f32) -> f32 {
        let phase = Vec2::new(position.x, position.z).dot(self.direction) / self.wavelength
            - time * self.gust_frequency * TAU;
        0.5 + 0.5 * phase.sin()
    }
}

impl WindField for DirectionalWind {
    fn sample(&self, position: Vec3, time: f32) -> Vec3 {
        let strength = self.base_speed * (1.0 + self.gust_strength * self.gust(position, time));
        Vec3::new(self.direction.x, 0.0, self.direction.y) * strength
    }
}
