//! Simulated grass field.
//!
//! Blades are scattered once over the terrain into a [`BladeStore`], stepped
//! every frame by the physics pass, then culled and compacted into a draw list
//! consumed by an indirect draw. The GPU passes live in `render`; this module
//! holds the blade layout, configuration, uniforms and the CPU reference
//! kernels the shaders mirror.

pub mod blade;
pub mod config;
pub mod cull;
pub mod params;
pub mod physics;
pub mod scatter;
pub mod wind;

pub use blade::Blade;
pub use config::GrassConfig;
pub use cull::{CullOutput, CullRules, CullView, DrawEntry, LodTier};
pub use params::{CullUniform, DrawIndirectArgs, DrawUniform, PhysicsUniform};
pub use scatter::BladeStore;
pub use wind::{CalmWind, DirectionalWind, WindField};

use glam::Vec3;

use crate::core::Result;

/// Validated grass configuration plus the per-frame uniform builders.
pub struct GrassSystem {
    config: GrassConfig,
    wind: DirectionalWind,
    rules: CullRules,
}

impl GrassSystem {
    pub fn new(config: GrassConfig) -> Result<Self> {
        config.validate()?;
        let wind = DirectionalWind::from_config(&config.wind);
        let rules = CullRules::new(&config.cull, &config.lod);
        Ok(Self { config, wind, rules })
    }

    pub fn config(&self) -> &GrassConfig {
        &self.config
    }

    pub fn wind(&self) -> &DirectionalWind {
        &self.wind
    }

    pub fn cull_rules(&self) -> &CullRules {
        &self.rules
    }

    /// Toggle all culling (off draws every blade)
    pub fn set_culling_enabled(&mut self, enabled: bool) {
        self.config.cull.enabled = enabled;
        self.rules = CullRules::new(&self.config.cull, &self.config.lod);
    }

    pub fn culling_enabled(&self) -> bool {
        self.config.cull.enabled
    }

    /// Step the CPU copy of the blades
    pub fn simulate(&self, store: &mut BladeStore, delta_time: f32, total_time: f32) {
        physics::simulate(store.as_mut_slice(), &self.config.physics, &self.wind, delta_time, total_time);
    }

    /// Cull the CPU copy of the blades
    pub fn cull(&self, store: &BladeStore, view: &CullView) -> CullOutput {
        cull::cull_blades(store.as_slice(), view, &self.rules, store.len() as u32)
    }

    pub fn physics_uniform(&self, delta_time: f32, total_time: f32, blade_count: u32) -> PhysicsUniform {
        let physics = &self.config.physics;
        let wind = &self.wind;
        PhysicsUniform {
            delta_time,
            total_time,
            blade_count,
            max_bend_angle: physics.max_bend_angle,
            gravity: physics.gravity_direction().extend(physics.gravity_magnitude).to_array(),
            wind_direction: [wind.direction.x, 0.0, wind.direction.y, wind.base_speed],
            wind_gust: [wind.gust_strength, wind.gust_frequency, wind.wavelength, 0.0],
            front_gravity: physics.front_gravity_factor,
            _pad: [0.0; 3],
        }
    }

    pub fn cull_uniform(&self, view: &CullView, blade_count: u32, capacity: u32) -> CullUniform {
        let r = &self.rules;
        CullUniform {
            side_planes: view.frustum.side_planes_packed(),
            camera_position: view.position.extend(r.max_distance).to_array(),
            lod: [r.near_distance, r.mid_distance, r.orientation_tolerance, r.orientation_cull_distance],
            blade_count,
            capacity,
            flags: r.flags,
            _pad: 0,
        }
    }

    pub fn draw_uniform(&self) -> DrawUniform {
        let lod = &self.config.lod;
        let look = &self.config.appearance;
        let light = Vec3::from(look.light_direction).normalize_or(Vec3::Y);
        DrawUniform {
            segments: [lod.segments[0], lod.segments[1], lod.segments[2], 0],
            base_color: Vec3::from(look.base_color).extend(look.ambient).to_array(),
            tip_color: Vec3::from(look.tip_color).extend(1.0).to_array(),
            light_direction: light.extend(0.0).to_array(),
        }
    }

    /// Indirect args as uploaded before the first frame
    pub fn initial_draw_args(&self) -> DrawIndirectArgs {
        DrawIndirectArgs::new(self.rules.vertex_count, 0)
    }
}
