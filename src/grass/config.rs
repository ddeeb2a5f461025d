//! Grass configuration (scatter, physics, wind, culling, LOD, appearance).
//!
//! Every section has a `Default` and is `#[serde(default)]`, so a JSON file
//! only needs the keys it wants to override.

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::terrain::Footprint;

/// Hard upper bound on blades per store (64 bytes each = one 128 MiB binding)
pub const MAX_BLADES: u32 = 1 << 21;

/// Most strip segments a blade may be tessellated into
pub const MAX_SEGMENTS: u32 = 16;

/// Top-level grass configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GrassConfig {
    pub scatter: ScatterConfig,
    pub physics: PhysicsConfig,
    pub wind: WindConfig,
    pub cull: CullConfig,
    pub lod: LodConfig,
    pub appearance: AppearanceConfig,
}

impl GrassConfig {
    /// Load and validate a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        log::info!("Loaded grass config from {}", path.display());
        Ok(config)
    }

    /// Write the config as pretty-printed JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        self.scatter.validate()?;
        self.physics.validate()?;
        self.wind.validate()?;
        self.cull.validate()?;
        self.lod.validate()?;
        Ok(())
    }
}

fn check(ok: bool, msg: impl FnOnce() -> String) -> Result<()> {
    if ok { Ok(()) } else { Err(Error::Config(msg())) }
}

fn check_range(name: &str, range: [f32; 2], min: f32) -> Result<()> {
    check(
        range[0].is_finite() && range[1].is_finite() && range[0] >= min && range[0] <= range[1],
        || format!("{name} range {:?} must be ordered and >= {min}", range),
    )
}

// ---------------------------------------------------------------------------
// Scatter
// ---------------------------------------------------------------------------

/// How the blade store is populated at scene load.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ScatterConfig {
    /// Number of blades in the store (fixed for the scene lifetime).
    pub blade_count: u32,
    /// XZ area to scatter over; `None` uses the terrain's own footprint.
    pub area: Option<Footprint>,
    /// Hash seed for placement and per-blade variation.
    pub seed: u32,
    /// Blade height range in world units.
    pub height_range: [f32; 2],
    /// Blade width range in world units.
    pub width_range: [f32; 2],
    /// Stiffness range (recovery spring coefficient).
    pub stiffness_range: [f32; 2],
}

impl Default for ScatterConfig {
    fn default() -> Self {
        Self {
            blade_count: 1 << 16,
            area: None,
            seed: 1337,
            height_range: [0.6, 1.4],
            width_range: [0.06, 0.12],
            stiffness_range: [6.0, 12.0],
        }
    }
}

impl ScatterConfig {
    pub fn validate(&self) -> Result<()> {
        check(self.blade_count > 0 && self.blade_count <= MAX_BLADES, || {
            format!("blade_count {} must be in 1..={MAX_BLADES}", self.blade_count)
        })?;
        if let Some(area) = &self.area {
            check(area.is_valid(), || format!("scatter area {:?} is empty", area))?;
        }
        check_range("height", self.height_range, 0.0)?;
        check_range("width", self.width_range, 0.0)?;
        check_range("stiffness", self.stiffness_range, 0.0)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Physics
// ---------------------------------------------------------------------------

/// Forces and correction limits for the physics pass.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Direction of environmental gravity (normalized on use).
    pub gravity_direction: [f32; 3],
    /// Environmental gravity acceleration.
    pub gravity_magnitude: f32,
    /// Share of |gravity| pulling along the blade's facing.
    pub front_gravity_factor: f32,
    /// Largest angle (radians) between base→control and control→tip.
    pub max_bend_angle: f32,
    /// Longest simulation step in seconds; longer frames are clamped.
    pub max_delta_time: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity_direction: [0.0, -1.0, 0.0],
            gravity_magnitude: 1.5,
            front_gravity_factor: 0.25,
            max_bend_angle: 1.0,
            max_delta_time: 1.0 / 20.0,
        }
    }
}

impl PhysicsConfig {
    pub fn gravity_direction(&self) -> Vec3 {
        Vec3::from(self.gravity_direction).normalize_or_zero()
    }

    /// Config with every force source disabled
    pub fn weightless() -> Self {
        Self {
            gravity_magnitude: 0.0,
            front_gravity_factor: 0.0,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        check(self.gravity_magnitude.is_finite() && self.gravity_magnitude >= 0.0, || {
            format!("gravity_magnitude {} must be >= 0", self.gravity_magnitude)
        })?;
        check(self.front_gravity_factor.is_finite(), || "front_gravity_factor must be finite".into())?;
        check(
            self.max_bend_angle > 0.0 && self.max_bend_angle <= std::f32::consts::PI,
            || format!("max_bend_angle {} must be in (0, pi]", self.max_bend_angle),
        )?;
        check(self.max_delta_time > 0.0 && self.max_delta_time.is_finite(), || {
            format!("max_delta_time {} must be > 0", self.max_delta_time)
        })?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wind
// ---------------------------------------------------------------------------

/// Directional gusting wind. See [`super::wind::DirectionalWind`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WindConfig {
    /// XZ direction the wind blows toward (normalized on use).
    pub base_direction: [f32; 2],
    /// Force at zero gust.
    pub base_speed: f32,
    /// Extra force at full gust, as a multiple of `base_speed`.
    pub gust_strength: f32,
    /// Gust oscillation frequency (Hz).
    pub gust_frequency: f32,
    /// Distance between gust fronts in world units.
    pub wavelength: f32,
}

impl Default for WindConfig {
    fn default() -> Self {
        Self {
            base_direction: [1.0, 0.3],
            base_speed: 2.0,
            gust_strength: 1.5,
            gust_frequency: 0.4,
            wavelength: 12.0,
        }
    }
}

impl WindConfig {
    pub fn validate(&self) -> Result<()> {
        check(self.base_speed >= 0.0 && self.gust_strength >= 0.0, || {
            "wind speed and gust strength must be >= 0".into()
        })?;
        check(self.wavelength > 0.0, || format!("wind wavelength {} must be > 0", self.wavelength))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Culling
// ---------------------------------------------------------------------------

/// Per-blade visibility tests.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CullConfig {
    /// Master switch. Off = every blade is drawn (pass-through compaction).
    pub enabled: bool,
    pub orientation_enabled: bool,
    pub frustum_enabled: bool,
    pub distance_enabled: bool,
    /// Blades farther than this from the camera are discarded.
    pub max_distance: f32,
    /// Edge-on blades with |dot(view, facing)| below this are discarded.
    pub orientation_tolerance: f32,
    /// Orientation culling only applies beyond this distance.
    pub orientation_cull_distance: f32,
}

impl Default for CullConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            orientation_enabled: true,
            frustum_enabled: true,
            distance_enabled: true,
            max_distance: 60.0,
            orientation_tolerance: 0.1,
            orientation_cull_distance: 8.0,
        }
    }
}

impl CullConfig {
    pub fn validate(&self) -> Result<()> {
        check(self.max_distance > 0.0, || format!("max_distance {} must be > 0", self.max_distance))?;
        check((0.0..=1.0).contains(&self.orientation_tolerance), || {
            format!("orientation_tolerance {} must be in [0, 1]", self.orientation_tolerance)
        })?;
        check(self.orientation_cull_distance >= 0.0, || {
            "orientation_cull_distance must be >= 0".into()
        })?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// LOD
// ---------------------------------------------------------------------------

/// Distance tiers as fractions of `CullConfig::max_distance`, and strip
/// segments generated per tier.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LodConfig {
    /// Blades closer than `near_fraction * max_distance` get full detail.
    pub near_fraction: f32,
    /// Blades closer than `mid_fraction * max_distance` get the mid tier.
    pub mid_fraction: f32,
    /// Segments for the near, mid and far tiers.
    pub segments: [u32; 3],
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            near_fraction: 0.43,
            mid_fraction: 0.6,
            segments: [8, 4, 2],
        }
    }
}

impl LodConfig {
    /// Absolute (near, mid) thresholds for a cutoff distance
    pub fn thresholds(&self, max_distance: f32) -> (f32, f32) {
        (self.near_fraction * max_distance, self.mid_fraction * max_distance)
    }

    /// Strip vertices per instance: one row per segment boundary, two vertices
    /// per row, a single vertex at the tip.
    pub fn vertex_count(&self) -> u32 {
        2 * self.segments[0] + 1
    }

    pub fn validate(&self) -> Result<()> {
        check(
            self.near_fraction > 0.0 && self.near_fraction <= self.mid_fraction,
            || format!("lod fractions {} / {} must be ordered and > 0", self.near_fraction, self.mid_fraction),
        )?;
        let [near, mid, far] = self.segments;
        check(far >= 1 && mid >= far && near >= mid && near <= MAX_SEGMENTS, || {
            format!("lod segments {:?} must be non-increasing, >= 1 and <= {MAX_SEGMENTS}", self.segments)
        })?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Appearance
// ---------------------------------------------------------------------------

/// Colours used by the draw pass.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppearanceConfig {
    /// Linear RGB at the root.
    pub base_color: [f32; 3],
    /// Linear RGB at the tip.
    pub tip_color: [f32; 3],
    /// Direction toward the light (normalized on use).
    pub light_direction: [f32; 3],
    /// Ambient term added to the lambert factor.
    pub ambient: f32,
}

impl Default for AppearanceConfig {
    fn default() -> Self {
        Self {
            base_color: [0.05, 0.22, 0.03],
            tip_color: [0.45, 0.68, 0.18],
            light_direction: [0.4, 0.8, 0.3],
            ambient: 0.35,
        }
    }
}
