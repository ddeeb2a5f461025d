//! CPU reference for the cull pass.
//!
//! `classify_blade` mirrors `classify` in grass_cull.wgsl. The GPU appends
//! survivors with an atomic counter in arbitrary order; `cull_blades` keeps
//! ascending blade order, which is a valid instance of the same result.

use glam::Vec3;
use rayon::prelude::*;

use super::blade::{Blade, DEGENERATE_EPSILON};
use super::config::{CullConfig, LodConfig};
use super::params::{DrawIndirectArgs, CULL_DISTANCE, CULL_ENABLED, CULL_FRUSTUM, CULL_ORIENTATION};
use crate::core::camera::Camera;
use crate::math::Frustum;

/// Geometric detail tier assigned to a surviving blade.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
pub enum LodTier {
    Near = 0,
    Mid = 1,
    Far = 2,
}

impl LodTier {
    pub const ALL: [LodTier; 3] = [LodTier::Near, LodTier::Mid, LodTier::Far];

    pub fn from_bits(bits: u32) -> Self {
        match bits {
            0 => LodTier::Near,
            1 => LodTier::Mid,
            _ => LodTier::Far,
        }
    }

    /// Strip segments generated for this tier
    pub fn segments(self, lod: &LodConfig) -> u32 {
        lod.segments[self as usize]
    }
}

/// Packed entry of the compacted draw list: blade index in the low 30 bits,
/// LOD tier in the top 2.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct DrawEntry(pub u32);

impl DrawEntry {
    pub const INDEX_BITS: u32 = 30;
    pub const INDEX_MASK: u32 = (1 << Self::INDEX_BITS) - 1;

    pub fn new(index: u32, tier: LodTier) -> Self {
        debug_assert!(index <= Self::INDEX_MASK);
        Self((index & Self::INDEX_MASK) | ((tier as u32) << Self::INDEX_BITS))
    }

    pub fn index(self) -> u32 {
        self.0 & Self::INDEX_MASK
    }

    pub fn tier(self) -> LodTier {
        LodTier::from_bits(self.0 >> Self::INDEX_BITS)
    }
}

/// Camera state the cull tests need
#[derive(Clone, Copy, Debug)]
pub struct CullView {
    pub position: Vec3,
    pub frustum: Frustum,
}

impl CullView {
    pub fn from_camera(camera: &Camera) -> Self {
        Self {
            position: camera.position,
            frustum: Frustum::from_view_projection(&camera.view_projection()),
        }
    }
}

/// Cull thresholds resolved from config into absolute distances
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CullRules {
    pub flags: u32,
    pub max_distance: f32,
    pub near_distance: f32,
    pub mid_distance: f32,
    pub orientation_tolerance: f32,
    pub orientation_cull_distance: f32,
    /// Strip vertices per instance (near-tier topology)
    pub vertex_count: u32,
}

impl CullRules {
    pub fn new(cull: &CullConfig, lod: &LodConfig) -> Self {
        let mut flags = 0;
        if cull.enabled {
            flags |= CULL_ENABLED;
        }
        if cull.orientation_enabled {
            flags |= CULL_ORIENTATION;
        }
        if cull.frustum_enabled {
            flags |= CULL_FRUSTUM;
        }
        if cull.distance_enabled {
            flags |= CULL_DISTANCE;
        }
        let (near_distance, mid_distance) = lod.thresholds(cull.max_distance);
        Self {
            flags,
            max_distance: cull.max_distance,
            near_distance,
            mid_distance,
            orientation_tolerance: cull.orientation_tolerance,
            orientation_cull_distance: cull.orientation_cull_distance,
            vertex_count: lod.vertex_count(),
        }
    }

    fn test(&self, flag: u32) -> bool {
        self.flags & CULL_ENABLED != 0 && self.flags & flag != 0
    }

    /// Tier for a camera distance
    pub fn tier_for_distance(&self, distance: f32) -> LodTier {
        if distance < self.near_distance {
            LodTier::Near
        } else if distance < self.mid_distance {
            LodTier::Mid
        } else {
            LodTier::Far
        }
    }
}

/// Run the cull tests on one blade. `None` = culled.
pub fn classify_blade(blade: &Blade, view: &CullView, rules: &CullRules) -> Option<LodTier> {
    let base = blade.base_position();
    let to_blade = base - view.position;
    let distance = to_blade.length();

    if rules.test(CULL_ORIENTATION) && distance > rules.orientation_cull_distance {
        let up = blade.up();
        let horizontal = to_blade - up * to_blade.dot(up);
        let len = horizontal.length();
        if len > DEGENERATE_EPSILON
            && (horizontal / len).dot(blade.facing()).abs() < rules.orientation_tolerance
        {
            return None;
        }
    }

    if rules.test(CULL_FRUSTUM) && !view.frustum.sphere_within_sides(&blade.bounding_sphere()) {
        return None;
    }

    if rules.test(CULL_DISTANCE) && distance > rules.max_distance {
        return None;
    }

    Some(rules.tier_for_distance(distance))
}

/// Compacted draw list and the indirect args describing it
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CullOutput {
    pub entries: Vec<DrawEntry>,
    pub args: DrawIndirectArgs,
}

/// Cull every blade and compact survivors into at most `capacity` entries.
///
/// Survivors past `capacity` are dropped and the instance count is clamped,
/// matching the GPU overflow behaviour.
pub fn cull_blades(blades: &[Blade], view: &CullView, rules: &CullRules, capacity: u32) -> CullOutput {
    let mut entries: Vec<DrawEntry> = blades
        .par_iter()
        .enumerate()
        .filter_map(|(i, blade)| classify_blade(blade, view, rules).map(|tier| DrawEntry::new(i as u32, tier)))
        .collect();

    if entries.len() > capacity as usize {
        log::warn!("Cull produced {} survivors, capacity {}; truncating", entries.len(), capacity);
        entries.truncate(capacity as usize);
    }

    let args = DrawIndirectArgs::new(rules.vertex_count, entries.len() as u32);
    CullOutput { entries, args }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(max_distance: f32) -> CullRules {
        let cull = CullConfig { max_distance, ..Default::default() };
        CullRules::new(&cull, &LodConfig::default())
    }

    fn blade_at(x: f32, z: f32, direction: f32) -> Blade {
        Blade::new(Vec3::new(x, 0.0, z), direction, Vec3::Y, 1.0, 0.1, 8.0)
    }

    fn view_down_x() -> CullView {
        CullView::from_camera(&Camera::look_at(Vec3::ZERO, Vec3::X, Vec3::Y))
    }

    #[test]
    fn test_entry_packing() {
        let e = DrawEntry::new(DrawEntry::INDEX_MASK, LodTier::Far);
        assert_eq!(e.index(), DrawEntry::INDEX_MASK);
        assert_eq!(e.tier(), LodTier::Far);
        let e = DrawEntry::new(12345, LodTier::Mid);
        assert_eq!((e.index(), e.tier()), (12345, LodTier::Mid));
    }

    #[test]
    fn test_end_to_end_three_blades() {
        let blades = [blade_at(0.0, 0.0, 0.0), blade_at(10.0, 0.0, 0.0), blade_at(1000.0, 0.0, 0.0)];
        let out = cull_blades(&blades, &view_down_x(), &rules(100.0), blades.len() as u32);

        let indices: Vec<u32> = out.entries.iter().map(|e| e.index()).collect();
        assert_eq!(indices, vec![0, 1]);
        assert_eq!(out.args.instance_count, 2);
        assert_eq!(out.args.vertex_count, LodConfig::default().vertex_count());
        assert!(out.entries.iter().all(|e| e.tier() == LodTier::Near));
    }

    #[test]
    fn test_zero_survivors() {
        let blades = [blade_at(0.0, -50.0, 0.0), blade_at(-30.0, 0.0, 0.0)];
        let out = cull_blades(&blades, &view_down_x(), &rules(100.0), 2);
        assert!(out.entries.is_empty());
        assert_eq!(out.args.instance_count, 0);
        assert_eq!(out.args.first_vertex, 0);
        assert!(out.args.vertex_count > 0);
    }

    #[test]
    fn test_compaction_matches_predicate() {
        let blades: Vec<Blade> = (0..400)
            .map(|i| blade_at((i % 40) as f32 * 4.0 - 20.0, (i / 40) as f32 * 6.0 - 30.0, i as f32 * 0.7))
            .collect();
        let view = view_down_x();
        let r = rules(60.0);
        let out = cull_blades(&blades, &view, &r, blades.len() as u32);

        let expected: Vec<u32> = (0..blades.len() as u32)
            .filter(|&i| classify_blade(&blades[i as usize], &view, &r).is_some())
            .collect();
        let got: Vec<u32> = out.entries.iter().map(|e| e.index()).collect();
        assert_eq!(got, expected);
        assert_eq!(out.args.instance_count as usize, expected.len());
        assert!(!expected.is_empty() && expected.len() < blades.len());
    }

    #[test]
    fn test_cull_is_deterministic() {
        let blades: Vec<Blade> = (0..256).map(|i| blade_at(i as f32 * 0.5, (i % 9) as f32, i as f32)).collect();
        let view = view_down_x();
        let a = cull_blades(&blades, &view, &rules(80.0), 256);
        let b = cull_blades(&blades, &view, &rules(80.0), 256);
        assert_eq!(a, b);
    }

    #[test]
    fn test_lod_monotonic_with_distance() {
        let r = rules(100.0);
        let view = view_down_x();
        let mut last = LodTier::Near;
        for i in 0..100 {
            let blade = blade_at(i as f32, 0.0, 0.0);
            if let Some(tier) = classify_blade(&blade, &view, &r) {
                assert!(tier >= last);
                last = tier;
            }
        }
        assert_eq!(last, LodTier::Far);
    }

    #[test]
    fn test_orientation_culls_edge_on_far_blades() {
        let r = rules(100.0);
        let view = view_down_x();
        // Facing +Z seen along +X: edge-on
        let edge_on = blade_at(20.0, 0.0, std::f32::consts::FRAC_PI_2);
        let face_on = blade_at(20.0, 0.0, 0.0);
        let close_edge_on = blade_at(5.0, 0.0, std::f32::consts::FRAC_PI_2);
        assert_eq!(classify_blade(&edge_on, &view, &r), None);
        assert!(classify_blade(&face_on, &view, &r).is_some());
        assert!(classify_blade(&close_edge_on, &view, &r).is_some());
    }

    #[test]
    fn test_disabled_is_pass_through() {
        let cull = CullConfig { enabled: false, max_distance: 100.0, ..Default::default() };
        let r = CullRules::new(&cull, &LodConfig::default());
        let blades = [blade_at(0.0, -50.0, 0.0), blade_at(5000.0, 0.0, 1.0)];
        let out = cull_blades(&blades, &view_down_x(), &r, 2);
        assert_eq!(out.args.instance_count, 2);
        assert_eq!(out.entries[1].tier(), LodTier::Far);
    }

    #[test]
    fn test_individual_toggles() {
        let cull = CullConfig { distance_enabled: false, max_distance: 100.0, ..Default::default() };
        let r = CullRules::new(&cull, &LodConfig::default());
        assert!(classify_blade(&blade_at(1000.0, 0.0, 0.0), &view_down_x(), &r).is_some());

        let cull = CullConfig { frustum_enabled: false, max_distance: 100.0, ..Default::default() };
        let r = CullRules::new(&cull, &LodConfig::default());
        assert!(classify_blade(&blade_at(-20.0, 0.0, 0.0), &view_down_x(), &r).is_some());
    }

    #[test]
    fn test_capacity_clamps_instance_count() {
        let blades: Vec<Blade> = (0..10).map(|i| blade_at(2.0 + i as f32, 0.0, 0.0)).collect();
        let out = cull_blades(&blades, &view_down_x(), &rules(100.0), 4);
        assert_eq!(out.args.instance_count, 4);
        assert_eq!(out.entries.len(), 4);
    }
}
