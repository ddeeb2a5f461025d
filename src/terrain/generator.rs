//! Noise-based procedural heightfield

use glam::Vec3;
use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use serde::{Deserialize, Serialize};

use super::{Footprint, HeightProvider};

/// Parameters controlling terrain generation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TerrainParams {
    pub seed: u32,
    pub scale: f32,        // Horizontal scale (larger = smoother)
    pub height_scale: f32, // Vertical scale (max height)
    pub octaves: u32,      // FBM octaves (detail levels)
    pub persistence: f32,  // FBM persistence (0.5 typical)
    pub lacunarity: f32,   // FBM lacunarity (2.0 typical)
    /// Region the terrain is defined over; queries outside it are rejected
    pub footprint: Option<Footprint>,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            seed: 12345,
            scale: 60.0,
            height_scale: 4.0,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
            footprint: Some(Footprint::centered(100.0)),
        }
    }
}

/// Procedural terrain using fractal Brownian motion (FBM)
pub struct TerrainGenerator {
    params: TerrainParams,
    noise: Fbm<Perlin>,
}

impl TerrainGenerator {
    /// Step used for central-difference normals
    const NORMAL_EPS: f32 = 0.05;

    pub fn new(params: TerrainParams) -> Self {
        let noise = Fbm::<Perlin>::new(params.seed)
            .set_octaves(params.octaves as usize)
            .set_persistence(params.persistence as f64)
            .set_lacunarity(params.lacunarity as f64);

        Self { params, noise }
    }

    pub fn params(&self) -> &TerrainParams {
        &self.params
    }

    /// Get terrain height at world position (x, z)
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        let nx = (x / self.params.scale) as f64;
        let nz = (z / self.params.scale) as f64;

        // [-1, 1] -> [0, height_scale]
        let noise_value = self.noise.get([nx, nz]);
        let normalized = (noise_value + 1.0) / 2.0;
        (normalized * self.params.height_scale as f64) as f32
    }

    /// Surface normal from central differences of the heightfield
    pub fn normal_at(&self, x: f32, z: f32) -> Vec3 {
        let e = Self::NORMAL_EPS;
        let dx = self.height_at(x + e, z) - self.height_at(x - e, z);
        let dz = self.height_at(x, z + e) - self.height_at(x, z - e);
        Vec3::new(-dx, 2.0 * e, -dz).normalize_or(Vec3::Y)
    }
}

impl HeightProvider for TerrainGenerator {
    fn height(&self, x: f32, z: f32) -> f32 {
        self.height_at(x, z)
    }

    fn normal(&self, x: f32, z: f32) -> Vec3 {
        self.normal_at(x, z)
    }

    fn footprint(&self) -> Option<Footprint> {
        self.params.footprint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terrain_params_default() {
        let params = TerrainParams::default();
        assert_eq!(params.seed, 12345);
        assert_eq!(params.octaves, 4);
        assert!(params.footprint.is_some());
    }

    #[test]
    fn test_height_in_range() {
        let generator = TerrainGenerator::new(TerrainParams::default());
        for i in 0..20 {
            let x = i as f32 * 3.7 - 30.0;
            let h = generator.height_at(x, -x * 0.5);
            assert!(h >= 0.0 && h <= generator.params().height_scale, "height {} out of range", h);
        }
    }

    #[test]
    fn test_height_at_consistency() {
        let generator = TerrainGenerator::new(TerrainParams::default());
        assert_eq!(generator.height_at(12.5, -3.0), generator.height_at(12.5, -3.0));
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = TerrainGenerator::new(TerrainParams { seed: 1, ..Default::default() });
        let b = TerrainGenerator::new(TerrainParams { seed: 2, ..Default::default() });
        let differs = (0..16).any(|i| {
            let x = i as f32 * 5.3;
            (a.height_at(x, x) - b.height_at(x, x)).abs() > 1e-4
        });
        assert!(differs);
    }

    #[test]
    fn test_normal_is_unit_and_upward() {
        let generator = TerrainGenerator::new(TerrainParams::default());
        let n = generator.normal_at(7.0, 11.0);
        assert!((n.length() - 1.0).abs() < 1e-4);
        assert!(n.y > 0.0);
    }

    #[test]
    fn test_sample_outside_footprint_fails() {
        let generator = TerrainGenerator::new(TerrainParams::default());
        assert!(generator.sample(0.0, 0.0).is_ok());
        assert!(matches!(
            generator.sample(500.0, 0.0),
            Err(crate::core::Error::Terrain(_))
        ));
    }
}
