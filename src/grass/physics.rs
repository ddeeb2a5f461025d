//! CPU reference for the physics pass.
//!
//! `step_blade` is the per-blade kernel; grass_physics.wgsl runs the same
//! arithmetic on the GPU. The CPU path is used by tests, benches and headless
//! tools.

use glam::Vec3;
use rayon::prelude::*;

use super::blade::{correct_shape, Blade, DEGENERATE_EPSILON};
use super::config::PhysicsConfig;
use super::wind::WindField;

/// Gravity, recovery and wind summed for one blade at one instant
pub fn blade_forces(blade: &Blade, config: &PhysicsConfig, wind: &dyn WindField, total_time: f32) -> Vec3 {
    let base = blade.base_position();
    let facing = blade.facing();

    let environmental = config.gravity_direction() * config.gravity_magnitude;
    let front = facing * (config.front_gravity_factor * environmental.length());
    let gravity = environmental + front;

    let recovery = (blade.rest_control_point() - blade.control_point()) * blade.stiffness();

    let w = wind.sample(base, total_time);
    let horizontal = Vec3::new(w.x, 0.0, w.z);
    let len = horizontal.length();
    let alignment = if len > DEGENERATE_EPSILON {
        (horizontal / len).dot(facing).abs()
    } else {
        0.0
    };

    gravity + recovery + w * alignment
}

/// Advance one blade by `delta_time` and restore its shape invariants.
pub fn step_blade(
    blade: &mut Blade,
    config: &PhysicsConfig,
    wind: &dyn WindField,
    delta_time: f32,
    total_time: f32,
) {
    let force = blade_forces(blade, config, wind, total_time);
    let control = blade.control_point() + force * delta_time;
    let (control, tip) = correct_shape(
        blade.base_position(),
        blade.up(),
        blade.height(),
        control,
        config.max_bend_angle,
    );
    blade.set_shape(control, tip);
}

/// Step every blade in parallel
pub fn simulate(
    blades: &mut [Blade],
    config: &PhysicsConfig,
    wind: &dyn WindField,
    delta_time: f32,
    total_time: f32,
) {
    blades
        .par_iter_mut()
        .for_each(|blade| step_blade(blade, config, wind, delta_time, total_time));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grass::config::WindConfig;
    use crate::grass::wind::{CalmWind, DirectionalWind};

    fn assert_valid(blade: &Blade) {
        let base = blade.base_position();
        let h = blade.height();
        assert!((blade.control_point() - base).length() <= h + 1e-4);
        assert!((blade.tip_position() - base).length() <= h + 1e-4);
        assert!(blade.control_point().y >= base.y);
        assert!(blade.control_point().is_finite() && blade.tip_position().is_finite());
    }

    #[test]
    fn test_zero_forces_conserve_rest_state() {
        let config = PhysicsConfig::weightless();
        let original = Blade::new(Vec3::ZERO, 0.7, Vec3::Y, 1.3, 0.1, 8.0);
        let mut blade = original;
        for _ in 0..10 {
            step_blade(&mut blade, &config, &CalmWind, 1.0 / 60.0, 0.0);
        }
        assert_eq!(blade, original);
    }

    #[test]
    fn test_zero_forces_off_origin_stay_put() {
        let config = PhysicsConfig::weightless();
        let original = Blade::new(Vec3::new(12.3, 4.5, -7.8), 2.1, Vec3::new(0.1, 1.0, 0.2), 0.9, 0.1, 6.0);
        let mut blade = original;
        step_blade(&mut blade, &config, &CalmWind, 1.0 / 60.0, 0.0);
        assert!((blade.control_point() - original.control_point()).length() < 1e-5);
        assert!((blade.tip_position() - original.tip_position()).length() < 1e-5);
    }

    #[test]
    fn test_zero_delta_is_noop() {
        let config = PhysicsConfig::default();
        let wind = DirectionalWind::from_config(&WindConfig::default());
        let original = Blade::new(Vec3::ZERO, 0.0, Vec3::Y, 1.0, 0.1, 8.0);
        let mut blade = original;
        step_blade(&mut blade, &config, &wind, 0.0, 3.0);
        assert_eq!(blade, original);
    }

    #[test]
    fn test_gravity_bends_toward_facing() {
        let config = PhysicsConfig { front_gravity_factor: 1.0, gravity_magnitude: 5.0, ..Default::default() };
        let mut blade = Blade::new(Vec3::ZERO, 0.0, Vec3::Y, 1.0, 0.1, 1.0);
        for _ in 0..30 {
            step_blade(&mut blade, &config, &CalmWind, 1.0 / 60.0, 0.0);
        }
        // Facing is +X for direction 0
        assert!(blade.control_point().x > 0.0);
        assert!(blade.control_point().y < 0.5);
        assert_valid(&blade);
    }

    #[test]
    fn test_bounded_under_strong_forces() {
        let config = PhysicsConfig { gravity_magnitude: 50.0, front_gravity_factor: 2.0, ..Default::default() };
        let wind = DirectionalWind::from_config(&WindConfig {
            base_speed: 40.0,
            gust_strength: 3.0,
            ..Default::default()
        });
        let mut blades: Vec<Blade> = (0..64)
            .map(|i| {
                let angle = i as f32 * 0.37;
                Blade::new(Vec3::new(i as f32, 0.0, -(i as f32)), angle, Vec3::Y, 0.5 + i as f32 * 0.02, 0.1, 6.0)
            })
            .collect();

        let mut t = 0.0;
        for _ in 0..120 {
            simulate(&mut blades, &config, &wind, 0.05, t);
            t += 0.05;
        }
        blades.iter().for_each(assert_valid);
    }

    #[test]
    fn test_recovery_returns_to_rest() {
        let config = PhysicsConfig::weightless();
        let rest = Blade::new(Vec3::ZERO, 0.0, Vec3::Y, 1.0, 0.1, 10.0);
        let mut blade = rest;
        let (c, t) = correct_shape(Vec3::ZERO, Vec3::Y, 1.0, Vec3::new(0.4, 0.2, 0.0), 1.0);
        blade.set_shape(c, t);

        for _ in 0..300 {
            step_blade(&mut blade, &config, &CalmWind, 1.0 / 60.0, 0.0);
        }
        assert!((blade.control_point() - rest.control_point()).length() < 1e-3);
    }

    #[test]
    fn test_edge_on_wind_has_no_effect() {
        // Facing +X, wind blowing along +Z
        let config = PhysicsConfig::weightless();
        let wind = DirectionalWind::from_config(&WindConfig {
            base_direction: [0.0, 1.0],
            ..Default::default()
        });
        let blade = Blade::new(Vec3::ZERO, 0.0, Vec3::Y, 1.0, 0.1, 5.0);
        let force = blade_forces(&blade, &config, &wind, 0.0);
        assert!(force.length() < 1e-5);
    }
}
