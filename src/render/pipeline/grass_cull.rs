//! Cull compute pipeline: tests each blade, assigns an LOD tier and appends
//! survivors to the draw list through an atomic counter in the indirect args.
//!
//! The pass runs two dispatches: `main` over every blade, then a single
//! `finalize` invocation that clamps the appended count to the list capacity.

use super::{storage_entry, uniform_entry, workgroup_count};
use crate::grass::CullUniform;
use crate::render::buffer::BladeBuffer;

/// Grass cull compute pipeline
pub struct GrassCullPipeline {
    cull_pipeline: wgpu::ComputePipeline,
    finalize_pipeline: wgpu::ComputePipeline,
    params_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl GrassCullPipeline {
    pub fn new(device: &wgpu::Device, blades: &BladeBuffer) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("grass_cull_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../../shaders/grass_cull.wgsl").into()),
        });

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grass_cull_params"),
            size: std::mem::size_of::<CullUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // Group 0: params, blades (read), draw list (write), draw args (atomic)
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("grass_cull_layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::COMPUTE),
                storage_entry(1, wgpu::ShaderStages::COMPUTE, true),
                storage_entry(2, wgpu::ShaderStages::COMPUTE, false),
                storage_entry(3, wgpu::ShaderStages::COMPUTE, false),
            ],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("grass_cull_bg"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: blades.blades().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: blades.draw_list().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: blades.draw_args().as_entire_binding(),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("grass_cull_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let create = |label: &str, entry_point: &str| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some(entry_point),
                compilation_options: Default::default(),
                cache: None,
            })
        };

        Self {
            cull_pipeline: create("grass_cull_pipeline", "main"),
            finalize_pipeline: create("grass_cull_finalize_pipeline", "finalize"),
            params_buffer,
            bind_group,
        }
    }

    /// Upload this frame's camera and thresholds
    pub fn update_params(&self, queue: &wgpu::Queue, params: &CullUniform) {
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(params));
    }

    /// Record the cull pass. `instance_count` must already be zeroed.
    pub fn dispatch(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        blade_count: u32,
        timestamp_writes: Option<wgpu::ComputePassTimestampWrites<'_>>,
    ) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("grass_cull_pass"),
            timestamp_writes,
        });
        pass.set_bind_group(0, &self.bind_group, &[]);

        pass.set_pipeline(&self.cull_pipeline);
        pass.dispatch_workgroups(workgroup_count(blade_count), 1, 1);

        pass.set_pipeline(&self.finalize_pipeline);
        pass.dispatch_workgroups(1, 1, 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grass::{Blade, DrawEntry, DrawIndirectArgs};
    use crate::render::pipeline::{validate_wgsl, wgsl_struct_size};

    const SOURCE: &str = include_str!("../../../shaders/grass_cull.wgsl");

    #[test]
    fn test_shader_validates() {
        validate_wgsl(SOURCE).unwrap();
    }

    #[test]
    fn test_layouts_match_rust() {
        let module = validate_wgsl(SOURCE).unwrap();
        assert_eq!(
            wgsl_struct_size(&module, "CullParams"),
            Some(std::mem::size_of::<CullUniform>() as u32)
        );
        assert_eq!(wgsl_struct_size(&module, "Blade"), Some(std::mem::size_of::<Blade>() as u32));
        assert_eq!(
            wgsl_struct_size(&module, "DrawArgs"),
            Some(std::mem::size_of::<DrawIndirectArgs>() as u32)
        );
    }

    #[test]
    fn test_both_entry_points() {
        let module = validate_wgsl(SOURCE).unwrap();
        let names: Vec<&str> = module.entry_points.iter().map(|ep| ep.name.as_str()).collect();
        assert!(names.contains(&"main"));
        assert!(names.contains(&"finalize"));
    }

    #[test]
    fn test_entry_packing_constant_matches() {
        assert!(SOURCE.contains(&format!("const INDEX_BITS: u32 = {}u;", DrawEntry::INDEX_BITS)));
    }
}
