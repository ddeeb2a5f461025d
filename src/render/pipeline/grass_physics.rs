//! Physics compute pipeline: advances every blade's control point and tip.

use super::{storage_entry, uniform_entry, workgroup_count};
use crate::grass::PhysicsUniform;
use crate::render::buffer::BladeBuffer;

/// Grass physics compute pipeline
pub struct GrassPhysicsPipeline {
    pipeline: wgpu::ComputePipeline,
    params_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl GrassPhysicsPipeline {
    pub fn new(device: &wgpu::Device, blades: &BladeBuffer) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("grass_physics_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../../shaders/grass_physics.wgsl").into()),
        });

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grass_physics_params"),
            size: std::mem::size_of::<PhysicsUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // Group 0: params, blades (read-write)
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("grass_physics_layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::COMPUTE),
                storage_entry(1, wgpu::ShaderStages::COMPUTE, false),
            ],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("grass_physics_bg"),
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
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("grass_physics_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("grass_physics_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Self {
            pipeline,
            params_buffer,
            bind_group,
        }
    }

    /// Upload this frame's time step and forces
    pub fn update_params(&self, queue: &wgpu::Queue, params: &PhysicsUniform) {
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(params));
    }

    /// Record the physics pass
    pub fn dispatch(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        blade_count: u32,
        timestamp_writes: Option<wgpu::ComputePassTimestampWrites<'_>>,
    ) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("grass_physics_pass"),
            timestamp_writes,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.dispatch_workgroups(workgroup_count(blade_count), 1, 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grass::Blade;
    use crate::render::pipeline::{validate_wgsl, wgsl_struct_size};

    const SOURCE: &str = include_str!("../../../shaders/grass_physics.wgsl");

    #[test]
    fn test_shader_validates() {
        validate_wgsl(SOURCE).unwrap();
    }

    #[test]
    fn test_layouts_match_rust() {
        let module = validate_wgsl(SOURCE).unwrap();
        assert_eq!(
            wgsl_struct_size(&module, "PhysicsParams"),
            Some(std::mem::size_of::<PhysicsUniform>() as u32)
        );
        assert_eq!(wgsl_struct_size(&module, "Blade"), Some(std::mem::size_of::<Blade>() as u32));
    }

    #[test]
    fn test_entry_point() {
        let module = validate_wgsl(SOURCE).unwrap();
        let main = module.entry_points.iter().find(|ep| ep.name == "main").unwrap();
        assert_eq!(main.stage, naga::ShaderStage::Compute);
        assert_eq!(main.workgroup_size, [crate::render::pipeline::WORKGROUP_SIZE, 1, 1]);
    }
}
