//! GPU-ready grass uniforms and the indirect draw record.
//!
//! Every struct here is bound by one of the grass shaders and must keep the
//! same field order and padding as its WGSL counterpart.

use bytemuck::{Pod, Zeroable};

/// Cull flag: culling enabled at all (off = pass-through)
pub const CULL_ENABLED: u32 = 1 << 0;
/// Cull flag: edge-on orientation test
pub const CULL_ORIENTATION: u32 = 1 << 1;
/// Cull flag: side-plane frustum test
pub const CULL_FRUSTUM: u32 = 1 << 2;
/// Cull flag: distance cutoff
pub const CULL_DISTANCE: u32 = 1 << 3;

/// Physics pass uniform (80 bytes). Must match `PhysicsParams` in grass_physics.wgsl.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct PhysicsUniform {
    pub delta_time: f32,
    pub total_time: f32,
    pub blade_count: u32,
    pub max_bend_angle: f32,
    // -- 16 bytes --
    /// xyz: unit gravity direction, w: magnitude
    pub gravity: [f32; 4],
    // -- 16 bytes --
    /// xz: unit wind direction, y: 0, w: base speed
    pub wind_direction: [f32; 4],
    // -- 16 bytes --
    /// x: gust strength, y: gust frequency, z: wavelength, w: unused
    pub wind_gust: [f32; 4],
    // -- 16 bytes --
    pub front_gravity: f32,
    pub _pad: [f32; 3],
    // -- 16 bytes --
    // Total: 80 bytes
}

/// Cull pass uniform (112 bytes). Must match `CullParams` in grass_cull.wgsl.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct CullUniform {
    /// Left, right, bottom, top planes as (normal.xyz, distance)
    pub side_planes: [[f32; 4]; 4],
    // -- 64 bytes --
    /// xyz: camera position, w: max distance
    pub camera_position: [f32; 4],
    // -- 16 bytes --
    /// x: near tier distance, y: mid tier distance,
    /// z: orientation tolerance, w: orientation cull distance
    pub lod: [f32; 4],
    // -- 16 bytes --
    pub blade_count: u32,
    pub capacity: u32,
    pub flags: u32,
    pub _pad: u32,
    // -- 16 bytes --
    // Total: 112 bytes
}

/// Draw pass uniform (64 bytes). Must match `DrawParams` in grass_draw.wgsl.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct DrawUniform {
    /// Segments for near, mid, far tiers; w unused
    pub segments: [u32; 4],
    // -- 16 bytes --
    /// rgb: root colour, a: ambient
    pub base_color: [f32; 4],
    // -- 16 bytes --
    pub tip_color: [f32; 4],
    // -- 16 bytes --
    /// xyz: unit direction toward the light
    pub light_direction: [f32; 4],
    // -- 16 bytes --
    // Total: 64 bytes
}

/// Arguments of a non-indexed indirect draw, laid out as wgpu reads them.
///
/// The cull shader increments `instance_count` atomically.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawIndirectArgs {
    pub vertex_count: u32,
    pub instance_count: u32,
    pub first_vertex: u32,
    pub first_instance: u32,
}

impl DrawIndirectArgs {
    /// Byte offset of `instance_count`, cleared before each cull pass
    pub const INSTANCE_COUNT_OFFSET: u64 = 4;

    pub fn new(vertex_count: u32, instance_count: u32) -> Self {
        Self {
            vertex_count,
            instance_count,
            first_vertex: 0,
            first_instance: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_physics_uniform_size() {
        assert_eq!(std::mem::size_of::<PhysicsUniform>(), 80);
        assert_eq!(std::mem::size_of::<PhysicsUniform>() % 16, 0);
    }

    #[test]
    fn test_cull_uniform_size() {
        assert_eq!(std::mem::size_of::<CullUniform>(), 112);
        assert_eq!(std::mem::size_of::<CullUniform>() % 16, 0);
    }

    #[test]
    fn test_draw_uniform_size() {
        assert_eq!(std::mem::size_of::<DrawUniform>(), 64);
    }

    #[test]
    fn test_indirect_args_layout() {
        assert_eq!(std::mem::size_of::<DrawIndirectArgs>(), 16);
        let args = DrawIndirectArgs::new(17, 5);
        let words: &[u32] = bytemuck::cast_slice(bytemuck::bytes_of(&args));
        assert_eq!(words, &[17, 5, 0, 0]);
        assert_eq!(words[(DrawIndirectArgs::INSTANCE_COUNT_OFFSET / 4) as usize], 5);
    }

    #[test]
    fn test_flags_are_distinct() {
        let all = [CULL_ENABLED, CULL_ORIENTATION, CULL_FRUSTUM, CULL_DISTANCE];
        let combined = all.iter().fold(0, |acc, f| acc | f);
        assert_eq!(combined.count_ones(), 4);
    }
}
