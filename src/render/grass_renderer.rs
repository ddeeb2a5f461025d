//! Per-frame orchestration of the grass passes.
//!
//! One encoder per frame records, in order:
//!
//! 1. the physics compute pass (blades read-write),
//! 2. a `clear_buffer` zeroing the indirect instance count,
//! 3. the cull compute pass (blades read, draw list and args written),
//! 4. the indirect draw render pass (blades, draw list and args read).
//!
//! Pass boundaries are where wgpu places the barriers between producers and
//! consumers. The blade buffer is single-buffered: queue order keeps frame N's
//! draw ahead of frame N+1's physics.

use crate::core::camera::Camera;
use crate::core::error::Error;
use crate::core::time::SimulationClock;
use crate::grass::{Blade, BladeStore, CullView, DrawEntry, DrawIndirectArgs, GrassSystem};
use crate::render::buffer::{BladeBuffer, CameraBuffer};
use crate::render::context::GpuContext;
use crate::render::pipeline::{GrassCullPipeline, GrassDrawPipeline, GrassPhysicsPipeline};
use crate::render::profiler::{GpuProfiler, GpuTimings, ProfiledPass};

/// Where the draw pass writes
pub struct FrameTarget<'a> {
    pub color: &'a wgpu::TextureView,
    pub depth: &'a wgpu::TextureView,
    /// Clear colour; `None` keeps existing contents
    pub clear: Option<wgpu::Color>,
}

/// Owns every GPU object of the grass pipeline
pub struct GrassRenderer {
    device: wgpu::Device,
    system: GrassSystem,
    blades: BladeBuffer,
    camera: CameraBuffer,
    physics: GrassPhysicsPipeline,
    cull: GrassCullPipeline,
    draw: GrassDrawPipeline,
    profiler: GpuProfiler,
    /// Read the visible count back every frame (blocks on the GPU)
    track_visible: bool,
    visible_count: Option<u32>,
}

impl GrassRenderer {
    /// Upload the blade store and build the three pipelines
    pub fn new(ctx: &GpuContext, system: GrassSystem, store: &BladeStore, profile: bool) -> Result<Self, Error> {
        let blades = BladeBuffer::new(&ctx.device, &ctx.queue, store, system.initial_draw_args())?;
        Self::from_buffers(ctx, system, blades, profile)
    }

    /// Like `new`, with a draw list shorter (or longer) than the blade count
    pub(crate) fn with_capacity(
        ctx: &GpuContext,
        system: GrassSystem,
        store: &BladeStore,
        capacity: u32,
    ) -> Result<Self, Error> {
        let blades =
            BladeBuffer::with_capacity(&ctx.device, &ctx.queue, store, system.initial_draw_args(), capacity)?;
        Self::from_buffers(ctx, system, blades, false)
    }

    fn from_buffers(ctx: &GpuContext, system: GrassSystem, blades: BladeBuffer, profile: bool) -> Result<Self, Error> {
        let device = &ctx.device;
        let queue = &ctx.queue;

        let camera = CameraBuffer::new(device);
        let physics = GrassPhysicsPipeline::new(device, &blades);
        let cull = GrassCullPipeline::new(device, &blades);
        let draw = GrassDrawPipeline::new(device, ctx.format(), camera.bind_group_layout(), &blades);
        draw.update_params(queue, &system.draw_uniform());

        let profiler = GpuProfiler::new(device, queue, profile);

        log::info!(
            "Grass renderer ready: {} blades, culling {}, profiling {}",
            blades.blade_count(),
            if system.culling_enabled() { "on" } else { "off" },
            if profiler.is_enabled() { "on" } else { "off" }
        );

        Ok(Self {
            device: device.clone(),
            system,
            blades,
            camera,
            physics,
            cull,
            draw,
            profiler,
            track_visible: false,
            visible_count: None,
        })
    }

    pub fn system(&self) -> &GrassSystem {
        &self.system
    }

    pub fn blade_count(&self) -> u32 {
        self.blades.blade_count()
    }

    /// Switch between real culling and draw-everything pass-through
    pub fn set_culling_enabled(&mut self, enabled: bool) {
        self.system.set_culling_enabled(enabled);
        log::info!("Grass culling {}", if enabled { "enabled" } else { "disabled" });
    }

    /// Read back the visible blade count after each frame
    pub fn set_track_visible(&mut self, track: bool) {
        self.track_visible = track;
        if !track {
            self.visible_count = None;
        }
    }

    pub fn is_tracking_visible(&self) -> bool {
        self.track_visible
    }

    /// Instances drawn in the last tracked frame
    pub fn visible_count(&self) -> Option<u32> {
        self.visible_count
    }

    pub fn timings(&self) -> GpuTimings {
        self.profiler.average_timings()
    }

    pub fn set_profiling(&mut self, enabled: bool) {
        self.profiler.set_enabled(enabled);
        log::info!("GPU profiling {}", if self.profiler.is_enabled() { "on" } else { "off" });
    }

    pub fn profiling_enabled(&self) -> bool {
        self.profiler.is_enabled()
    }

    /// Put every blade back to its scattered rest shape
    pub fn reset_blades(&self, ctx: &GpuContext, store: &BladeStore) -> Result<(), Error> {
        self.blades.upload_blades(&ctx.queue, store.as_slice())?;
        log::info!("Grass field reset ({} blades)", store.len());
        Ok(())
    }

    /// Upload uniforms and record the physics and cull passes
    pub fn encode_compute(
        &self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        camera: &Camera,
        delta_time: f32,
        total_time: f32,
    ) {
        let count = self.blades.blade_count();
        let view = CullView::from_camera(camera);

        self.physics.update_params(queue, &self.system.physics_uniform(delta_time, total_time, count));
        self.cull.update_params(queue, &self.system.cull_uniform(&view, count, self.blades.capacity()));
        self.camera.update(queue, camera);

        self.physics.dispatch(encoder, count, self.profiler.compute_pass_timestamp_writes(ProfiledPass::Physics));
        self.blades.clear_instance_count(encoder);
        self.cull.dispatch(encoder, count, self.profiler.compute_pass_timestamp_writes(ProfiledPass::Cull));
    }

    /// Record the indirect draw
    pub fn draw(&self, encoder: &mut wgpu::CommandEncoder, target: &FrameTarget<'_>) {
        self.draw.render(
            encoder,
            target.color,
            target.depth,
            self.camera.bind_group(),
            self.blades.draw_args(),
            target.clear,
            self.profiler.render_pass_timestamp_writes(ProfiledPass::Draw),
        );
    }

    /// Record, submit and (optionally) read back one full frame
    pub fn submit_frame(
        &mut self,
        ctx: &GpuContext,
        camera: &Camera,
        clock: &SimulationClock,
        target: &FrameTarget<'_>,
    ) -> Result<(), Error> {
        let mut encoder = ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("grass_frame"),
        });

        self.encode_compute(&ctx.queue, &mut encoder, camera, clock.delta_time(), clock.total_time());
        self.draw(&mut encoder, target);

        if self.track_visible {
            self.blades.copy_args_for_readback(&mut encoder);
        }
        self.profiler.resolve(&mut encoder);

        ctx.queue.submit(Some(encoder.finish()));

        if self.track_visible {
            let args = self.blades.read_args(&ctx.device)?;
            log::trace!("Grass visible: {}/{}", args.instance_count, self.blades.blade_count());
            self.visible_count = Some(args.instance_count);
        }
        self.profiler.read_results(&ctx.device);

        Ok(())
    }

    /// Blocking copy of the args and compacted draw list from the last frame
    pub fn read_draw_list(&self, ctx: &GpuContext) -> Result<(DrawIndirectArgs, Vec<DrawEntry>), Error> {
        self.blades.read_draw_list(&ctx.device, &ctx.queue)
    }

    /// Blocking copy of the simulated blades
    pub fn read_blades(&self, ctx: &GpuContext) -> Result<Vec<Blade>, Error> {
        self.blades.read_blades(&ctx.device, &ctx.queue)
    }
}

impl Drop for GrassRenderer {
    fn drop(&mut self) {
        // Buffers may still be referenced by in-flight submissions
        if let Err(e) = self.device.poll(wgpu::PollType::Wait { submission_index: None, timeout: None }) {
            log::warn!("Device poll failed during grass shutdown: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grass::config::PhysicsConfig;
    use crate::grass::{cull, CullRules, GrassConfig, LodTier};
    use glam::Vec3;
    use std::collections::BTreeSet;

    /// Headless context, or `None` on machines without a usable adapter
    fn headless() -> Option<GpuContext> {
        crate::core::logging::init_for_tests();
        match pollster::block_on(GpuContext::headless(64, 64)) {
            Ok(ctx) => Some(ctx),
            Err(e) => {
                eprintln!("skipping GPU test: {}", e);
                None
            }
        }
    }

    fn offscreen(ctx: &GpuContext) -> (wgpu::TextureView, wgpu::TextureView) {
        let (width, height) = ctx.size();
        let color = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("test_color"),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: ctx.format(),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let color = color.create_view(&wgpu::TextureViewDescriptor::default());
        let depth = GrassDrawPipeline::create_depth_view(&ctx.device, width, height);
        (color, depth)
    }

    #[test]
    fn test_gpu_end_to_end_visible_count() {
        let Some(ctx) = headless() else {
            return;
        };

        let mut config = GrassConfig::default();
        config.cull.max_distance = 100.0;
        let system = GrassSystem::new(config).unwrap();
        let store = BladeStore::from_blades(vec![
            Blade::new(Vec3::ZERO, 0.0, Vec3::Y, 1.0, 0.1, 8.0),
            Blade::new(Vec3::new(10.0, 0.0, 0.0), 0.0, Vec3::Y, 1.0, 0.1, 8.0),
            Blade::new(Vec3::new(1000.0, 0.0, 0.0), 0.0, Vec3::Y, 1.0, 0.1, 8.0),
        ])
        .unwrap();

        let mut renderer = GrassRenderer::new(&ctx, system, &store, false).unwrap();
        renderer.set_track_visible(true);

        let camera = Camera::look_at(Vec3::ZERO, Vec3::X, Vec3::Y);
        let mut clock = SimulationClock::default();
        clock.advance(1.0 / 60.0);

        let (color, depth) = offscreen(&ctx);
        let target = FrameTarget { color: &color, depth: &depth, clear: Some(wgpu::Color::BLACK) };
        renderer.submit_frame(&ctx, &camera, &clock, &target).unwrap();
        assert_eq!(renderer.visible_count(), Some(2));

        // Physics kept every blade valid
        for blade in renderer.read_blades(&ctx).unwrap() {
            let base = blade.base_position();
            assert!((blade.control_point() - base).length() <= blade.height() + 1e-4);
            assert!((blade.tip_position() - base).length() <= blade.height() + 1e-4);
            assert!(blade.control_point().y >= base.y);
        }
    }

    #[test]
    fn test_gpu_pass_through_draws_everything() {
        let Some(ctx) = headless() else {
            return;
        };

        let mut config = GrassConfig::default();
        config.cull.enabled = false;
        let system = GrassSystem::new(config).unwrap();
        let store = row_of_blades(100);

        let mut renderer = GrassRenderer::new(&ctx, system, &store, false).unwrap();
        renderer.set_track_visible(true);

        let camera = Camera::look_at(Vec3::ZERO, Vec3::X, Vec3::Y);
        let (color, depth) = offscreen(&ctx);
        let target = FrameTarget { color: &color, depth: &depth, clear: None };
        renderer.submit_frame(&ctx, &camera, &SimulationClock::default(), &target).unwrap();
        assert_eq!(renderer.visible_count(), Some(100));
    }

    fn row_of_blades(count: usize) -> BladeStore {
        BladeStore::from_blades(
            (0..count)
                .map(|i| Blade::new(Vec3::new(-(i as f32), 0.0, 0.0), 0.0, Vec3::Y, 1.0, 0.1, 8.0))
                .collect(),
        )
        .unwrap()
    }

    /// True when no cull decision for `blade` sits close enough to a threshold
    /// for GPU and CPU float rounding to disagree
    fn clear_of_thresholds(blade: &Blade, view: &CullView, rules: &CullRules) -> bool {
        let to_blade = blade.base_position() - view.position;
        let d = to_blade.length();
        let distances = [
            rules.near_distance,
            rules.mid_distance,
            rules.max_distance,
            rules.orientation_cull_distance,
        ];
        if distances.iter().any(|t| (d - t).abs() < 0.25) {
            return false;
        }

        let up = blade.up();
        let horizontal = to_blade - up * to_blade.dot(up);
        if horizontal.length() > 1e-3 {
            let alignment = horizontal.normalize().dot(blade.facing()).abs();
            if (alignment - rules.orientation_tolerance).abs() < 0.02 {
                return false;
            }
        }

        let sphere = blade.bounding_sphere();
        view.frustum
            .side_planes()
            .iter()
            .all(|plane| (plane.distance_to_point(sphere.center) + sphere.radius).abs() > 0.05)
    }

    /// A few hundred blades spread over every cull outcome and LOD tier
    fn mixed_field(view: &CullView, rules: &CullRules) -> BladeStore {
        let golden = std::f32::consts::PI * (3.0 - 5.0f32.sqrt());
        let blades = (0..600u32)
            .map(|i| {
                let angle = i as f32 * golden;
                let radius = 1.0 + (i as f32 * 0.37) % 130.0;
                let base = Vec3::new(angle.cos() * radius, 0.0, angle.sin() * radius);
                Blade::new(base, (i % 7) as f32 * 0.9, Vec3::Y, 1.0, 0.1, 8.0)
            })
            .filter(|blade| clear_of_thresholds(blade, view, rules))
            .take(300)
            .collect();
        BladeStore::from_blades(blades).unwrap()
    }

    fn entry_set(entries: &[DrawEntry]) -> BTreeSet<u32> {
        entries.iter().map(|e| e.0).collect()
    }

    #[test]
    fn test_gpu_cull_matches_reference_set() {
        let Some(ctx) = headless() else {
            return;
        };

        // Still field: physics leaves every blade where it was scattered
        let mut config = GrassConfig::default();
        config.physics = PhysicsConfig::weightless();
        config.wind.base_speed = 0.0;
        config.wind.gust_strength = 0.0;
        config.cull.max_distance = 100.0;
        let system = GrassSystem::new(config).unwrap();

        let camera = Camera::look_at(Vec3::ZERO, Vec3::X, Vec3::Y);
        let view = CullView::from_camera(&camera);
        let rules = *system.cull_rules();
        let store = mixed_field(&view, &rules);
        assert!(store.len() >= 200);

        let mut renderer = GrassRenderer::new(&ctx, system, &store, false).unwrap();
        let (color, depth) = offscreen(&ctx);
        let target = FrameTarget { color: &color, depth: &depth, clear: None };
        let clock = SimulationClock::default();

        let mut runs = Vec::new();
        for _ in 0..2 {
            renderer.submit_frame(&ctx, &camera, &clock, &target).unwrap();
            let (args, entries) = renderer.read_draw_list(&ctx).unwrap();
            assert_eq!(args.instance_count as usize, entries.len());

            let simulated = renderer.read_blades(&ctx).unwrap();
            let expected = cull::cull_blades(&simulated, &view, &rules, renderer.blade_count());
            assert_eq!(entry_set(&entries), entry_set(&expected.entries));
            assert_eq!(entries.len(), expected.entries.len());
            runs.push(entry_set(&entries));
        }

        assert_eq!(runs[0], runs[1]);
        let tiers: BTreeSet<LodTier> = runs[0].iter().map(|&raw| DrawEntry(raw).tier()).collect();
        assert_eq!(tiers.len(), LodTier::ALL.len());
        assert!(runs[0].len() < store.len());
    }

    #[test]
    fn test_gpu_overflow_is_clamped_to_capacity() {
        let Some(ctx) = headless() else {
            return;
        };

        let mut config = GrassConfig::default();
        config.cull.enabled = false;
        let system = GrassSystem::new(config).unwrap();
        let store = row_of_blades(100);

        let mut renderer = GrassRenderer::with_capacity(&ctx, system, &store, 4).unwrap();
        renderer.set_track_visible(true);

        let camera = Camera::look_at(Vec3::ZERO, Vec3::X, Vec3::Y);
        let (color, depth) = offscreen(&ctx);
        let target = FrameTarget { color: &color, depth: &depth, clear: None };
        renderer.submit_frame(&ctx, &camera, &SimulationClock::default(), &target).unwrap();
        assert_eq!(renderer.visible_count(), Some(4));

        let (args, entries) = renderer.read_draw_list(&ctx).unwrap();
        assert_eq!(args.instance_count, 4);
        assert_eq!(entries.len(), 4);
        let indices: BTreeSet<u32> = entries.iter().map(|e| e.index()).collect();
        assert_eq!(indices.len(), 4);
        assert!(indices.iter().all(|&i| i < 100));
    }

    #[test]
    fn test_gpu_reset_restores_scattered_blades() {
        let Some(ctx) = headless() else {
            return;
        };

        let system = GrassSystem::new(GrassConfig::default()).unwrap();
        let store = row_of_blades(32);
        let mut renderer = GrassRenderer::new(&ctx, system, &store, false).unwrap();

        let camera = Camera::look_at(Vec3::ZERO, Vec3::NEG_X, Vec3::Y);
        let (color, depth) = offscreen(&ctx);
        let target = FrameTarget { color: &color, depth: &depth, clear: None };
        let mut clock = SimulationClock::default();
        for _ in 0..10 {
            clock.advance(1.0 / 60.0);
            renderer.submit_frame(&ctx, &camera, &clock, &target).unwrap();
        }
        assert_ne!(renderer.read_blades(&ctx).unwrap(), store.as_slice());

        renderer.reset_blades(&ctx, &store).unwrap();
        assert_eq!(renderer.read_blades(&ctx).unwrap(), store.as_slice());
    }

    #[test]
    fn test_gpu_profiling_toggle_follows_device_support() {
        let Some(ctx) = headless() else {
            return;
        };

        let system = GrassSystem::new(GrassConfig::default()).unwrap();
        let mut renderer = GrassRenderer::new(&ctx, system, &row_of_blades(8), false).unwrap();
        assert!(!renderer.profiling_enabled());

        let supported = ctx.device.features().contains(wgpu::Features::TIMESTAMP_QUERY);
        renderer.set_profiling(true);
        assert_eq!(renderer.profiling_enabled(), supported);

        let camera = Camera::look_at(Vec3::ZERO, Vec3::NEG_X, Vec3::Y);
        let (color, depth) = offscreen(&ctx);
        let target = FrameTarget { color: &color, depth: &depth, clear: None };
        renderer.submit_frame(&ctx, &camera, &SimulationClock::default(), &target).unwrap();

        renderer.set_profiling(false);
        assert!(!renderer.profiling_enabled());
    }
}
