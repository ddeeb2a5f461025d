//! Blade store construction.
//!
//! Blades are scattered over an XZ footprint with a stateless integer hash so
//! the same seed always yields the same field, independent of thread count.

use glam::{Vec2, Vec3};
use rayon::prelude::*;

use super::blade::Blade;
use super::config::{ScatterConfig, MAX_BLADES};
use crate::core::{Error, Result};
use crate::terrain::{Footprint, HeightProvider};

/// Persistent per-blade state, fixed in size for the scene lifetime.
///
/// Physics mutates blades in place; nothing ever adds or removes one.
#[derive(Clone, Debug)]
pub struct BladeStore {
    blades: Vec<Blade>,
}

impl BladeStore {
    /// Scatter `config.blade_count` blades over the terrain.
    ///
    /// The area is `config.area`, falling back to the terrain footprint.
    /// Fails if neither is bounded, or if the terrain rejects a query.
    pub fn scatter(config: &ScatterConfig, terrain: &dyn HeightProvider) -> Result<Self> {
        if config.blade_count == 0 {
            return Err(Error::Scatter("blade count must be at least 1".into()));
        }
        if config.blade_count > MAX_BLADES {
            return Err(Error::Scatter(format!(
                "blade count {} exceeds maximum {MAX_BLADES}",
                config.blade_count
            )));
        }
        let area = config.area.or_else(|| terrain.footprint()).ok_or_else(|| {
            Error::Scatter("no scatter area given and terrain is unbounded".into())
        })?;
        if !area.is_valid() {
            return Err(Error::Scatter(format!("empty scatter area {:?}", area)));
        }

        let start = std::time::Instant::now();
        let blades = (0..config.blade_count)
            .into_par_iter()
            .map(|i| scatter_one(i, config, &area, terrain))
            .collect::<Result<Vec<_>>>()?;

        log::info!(
            "Scattered {} blades over {:?}..{:?} in {:.1}ms",
            blades.len(),
            area.min,
            area.max,
            start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(Self { blades })
    }

    /// Wrap an explicit blade list
    pub fn from_blades(blades: Vec<Blade>) -> Result<Self> {
        if blades.is_empty() {
            return Err(Error::Scatter("blade store cannot be empty".into()));
        }
        if blades.len() > MAX_BLADES as usize {
            return Err(Error::Scatter(format!(
                "{} blades exceeds maximum {MAX_BLADES}",
                blades.len()
            )));
        }
        Ok(Self { blades })
    }

    pub fn len(&self) -> usize {
        self.blades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blades.is_empty()
    }

    pub fn as_slice(&self) -> &[Blade] {
        &self.blades
    }

    pub fn as_mut_slice(&mut self) -> &mut [Blade] {
        &mut self.blades
    }

    /// Size of the GPU buffer holding this store
    pub fn byte_size(&self) -> u64 {
        std::mem::size_of_val(self.blades.as_slice()) as u64
    }
}

fn scatter_one(i: u32, config: &ScatterConfig, area: &Footprint, terrain: &dyn HeightProvider) -> Result<Blade> {
    let seed = config.seed;
    let r = |channel: u32| hash_01(i, channel, seed);

    let (x, z) = area_point(area, r(0), r(1));
    let (y, normal) = terrain.sample(x, z)?;

    let direction = r(2) * std::f32::consts::TAU;
    let lerp = |range: [f32; 2], t: f32| range[0] + (range[1] - range[0]) * t;

    Ok(Blade::new(
        Vec3::new(x, y, z),
        direction,
        normal,
        lerp(config.height_range, r(3)),
        lerp(config.width_range, r(4)),
        lerp(config.stiffness_range, r(5)),
    ))
}

/// Point at fractions `(u, v)` across `area`, kept inside its bounds
fn area_point(area: &Footprint, u: f32, v: f32) -> (f32, f32) {
    let (min, max) = (area.min(), area.max());
    let p = (min + Vec2::new(u, v) * area.size()).clamp(min, max);
    (p.x, p.y)
}

/// Integer hash of (index, channel, seed) mapped to [0, 1].
fn hash_01(index: u32, channel: u32, seed: u32) -> f32 {
    let mut h = index
        .wrapping_mul(374761393)
        .wrapping_add(channel.wrapping_mul(668265263))
        .wrapping_add(seed.wrapping_mul(1274126177));
    h = (h ^ (h >> 13)).wrapping_mul(1103515245);
    h ^= h >> 16;
    (h & 0x7FFFFFFF) as f32 / 0x7FFFFFFF_u32 as f32
}
