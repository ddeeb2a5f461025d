//! Terrain height queries used to seed blade placement
//!
//! Terrain is consulted only while the blade store is being built. Height and
//! up vector are baked into each blade so the per-frame physics never samples
//! terrain.

pub mod generator;
pub use generator::{TerrainGenerator, TerrainParams};

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

/// Axis-aligned XZ rectangle a terrain is defined over.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    pub min: [f32; 2],
    pub max: [f32; 2],
}

impl Footprint {
    /// Square footprint of side `size` centred on the origin
    pub fn centered(size: f32) -> Self {
        let h = size * 0.5;
        Self { min: [-h, -h], max: [h, h] }
    }

    pub fn min(&self) -> Vec2 {
        Vec2::from(self.min)
    }

    pub fn max(&self) -> Vec2 {
        Vec2::from(self.max)
    }

    pub fn size(&self) -> Vec2 {
        self.max() - self.min()
    }

    pub fn contains(&self, x: f32, z: f32) -> bool {
        x >= self.min[0] && x <= self.max[0] && z >= self.min[1] && z <= self.max[1]
    }

    pub fn is_valid(&self) -> bool {
        let size = self.size();
        size.x > 0.0 && size.y > 0.0 && size.is_finite()
    }
}

/// Ground height and normal at a world XZ position.
///
/// Implementations must be deterministic and free of side effects.
pub trait HeightProvider: Sync {
    /// Ground height (world Y) at (x, z)
    fn height(&self, x: f32, z: f32) -> f32;

    /// Unit surface normal at (x, z)
    fn normal(&self, x: f32, z: f32) -> Vec3;

    /// Region the provider is defined over; `None` = unbounded
    fn footprint(&self) -> Option<Footprint> {
        None
    }

    /// Height and normal, rejecting queries outside the footprint
    fn sample(&self, x: f32, z: f32) -> Result<(f32, Vec3)> {
        if let Some(fp) = self.footprint() {
            if !fp.contains(x, z) {
                return Err(Error::Terrain(format!(
                    "query ({x}, {z}) outside terrain footprint {:?}..{:?}",
                    fp.min, fp.max
                )));
            }
        }
        let h = self.height(x, z);
        let n = self.normal(x, z);
        if !h.is_finite() || !n.is_finite() {
            return Err(Error::Terrain(format!("non-finite sample at ({x}, {z})")));
        }
        Ok((h, n))
    }
}

/// Infinite flat ground at a fixed height
#[derive(Clone, Copy, Debug, Default)]
pub struct FlatTerrain {
    pub height: f32,
}

impl FlatTerrain {
    pub fn new(height: f32) -> Self {
        Self { height }
    }
}

impl HeightProvider for FlatTerrain {
    fn height(&self, _x: f32, _z: f32) -> f32 {
        self.height
    }

    fn normal(&self, _x: f32, _z: f32) -> Vec3 {
        Vec3::Y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_terrain() {
        let t = FlatTerrain::new(3.0);
        assert_eq!(t.height(100.0, -5.0), 3.0);
        assert_eq!(t.normal(0.0, 0.0), Vec3::Y);
        assert!(t.sample(1e6, 1e6).is_ok());
    }

    #[test]
    fn test_footprint_contains() {
        let fp = Footprint::centered(10.0);
        assert!(fp.contains(0.0, 0.0));
        assert!(fp.contains(5.0, -5.0));
        assert!(!fp.contains(5.1, 0.0));
        assert!(fp.is_valid());
        assert!(!Footprint { min: [1.0, 0.0], max: [1.0, 2.0] }.is_valid());
    }
}
