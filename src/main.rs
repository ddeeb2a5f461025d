//! Meadow - interactive grass field demo

use std::path::PathBuf;
use std::sync::Arc;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{DeviceEvent, DeviceId, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::KeyCode,
    window::{CursorGrabMode, Window, WindowId},
};

use meadow::core::{
    camera::Camera,
    camera_controller::FpsCameraController,
    input::InputState,
    logging,
    time::{FrameTimer, SimulationClock},
    Error, Result,
};
use meadow::grass::{BladeStore, GrassConfig, GrassSystem};
use meadow::render::pipeline::GrassDrawPipeline;
use meadow::render::{FrameTarget, GpuContext, GrassRenderer};
use meadow::terrain::{HeightProvider, TerrainGenerator, TerrainParams};

/// Ground-coloured clear behind the blades
const CLEAR_COLOR: wgpu::Color = wgpu::Color { r: 0.32, g: 0.42, b: 0.28, a: 1.0 };

/// Simulation speed while slow motion is on
const SLOW_MOTION_SCALE: f32 = 0.25;

/// Eye height above the terrain at spawn
const SPAWN_EYE_HEIGHT: f32 = 1.7;

/// Outcome of one redraw
#[derive(Debug, PartialEq)]
enum FrameStatus {
    Presented,
    /// No surface texture this frame; the next redraw tries again
    Skipped,
}

struct App {
    config: GrassConfig,
    terrain: TerrainGenerator,
    window: Option<Arc<Window>>,
    gpu: Option<GpuContext>,
    renderer: Option<GrassRenderer>,
    /// Scattered blades, kept for resetting the field
    store: Option<BladeStore>,
    depth_view: Option<wgpu::TextureView>,
    camera: Camera,
    controller: FpsCameraController,
    input: InputState,
    timer: FrameTimer,
    clock: SimulationClock,
    cursor_grabbed: bool,
    slow_motion: bool,
}

impl App {
    fn new(config: GrassConfig) -> Self {
        let clock = SimulationClock::new(config.physics.max_delta_time);
        Self {
            config,
            terrain: TerrainGenerator::new(TerrainParams::default()),
            window: None,
            gpu: None,
            renderer: None,
            store: None,
            depth_view: None,
            camera: Camera::default().with_clip(0.05, 500.0),
            controller: FpsCameraController::default(),
            input: InputState::new(),
            timer: FrameTimer::new(),
            clock,
            cursor_grabbed: false,
            slow_motion: false,
        }
    }

    /// Window, device, blade store and renderer
    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window_attrs = Window::default_attributes()
            .with_title("Meadow")
            .with_inner_size(PhysicalSize::new(1280, 720));
        let window = Arc::new(
            event_loop
                .create_window(window_attrs)
                .map_err(|e| Error::Window(e.to_string()))?,
        );

        let gpu = pollster::block_on(GpuContext::new(window.clone()))?;
        let size = window.inner_size();
        self.camera.set_aspect(size.width as f32, size.height as f32);

        log::info!("Window created: {}x{}", size.width, size.height);
        log::info!("GPU: {}", gpu.adapter.get_info().name);

        let system = GrassSystem::new(self.config.clone())?;
        let store = BladeStore::scatter(&self.config.scatter, &self.terrain)?;
        let renderer = GrassRenderer::new(&gpu, system, &store, true)?;
        let (width, height) = gpu.size();
        let depth_view = GrassDrawPipeline::create_depth_view(&gpu.device, width, height);

        // Stand in the middle of the field looking across it
        let ground = self.terrain.height(0.0, 0.0);
        let eye = glam::Vec3::new(0.0, ground + SPAWN_EYE_HEIGHT, 0.0);
        self.camera.position = eye;
        self.camera.point_at(eye + glam::Vec3::new(10.0, -2.0, 10.0), glam::Vec3::Y);
        self.controller.sync_from(&self.camera);
        log::info!("Camera spawned at ({:.1}, {:.1}, {:.1})", eye.x, eye.y, eye.z);

        self.window = Some(window);
        self.gpu = Some(gpu);
        self.renderer = Some(renderer);
        self.store = Some(store);
        self.depth_view = Some(depth_view);
        Ok(())
    }

    fn toggle_cursor_grab(&mut self) {
        if let Some(window) = &self.window {
            self.cursor_grabbed = !self.cursor_grabbed;

            if self.cursor_grabbed {
                window.set_cursor_grab(CursorGrabMode::Confined)
                    .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked))
                    .ok();
                window.set_cursor_visible(false);
            } else {
                window.set_cursor_grab(CursorGrabMode::None).ok();
                window.set_cursor_visible(true);
            }

            self.input.set_mouse_captured(self.cursor_grabbed);
        }
    }

    fn handle_keys(&mut self, event_loop: &ActiveEventLoop) {
        if self.input.is_key_just_pressed(KeyCode::Escape) {
            event_loop.exit();
        }
        if self.input.is_key_just_pressed(KeyCode::Tab) {
            self.toggle_cursor_grab();
        }
        if self.input.is_key_just_pressed(KeyCode::KeyM) {
            self.slow_motion = !self.slow_motion;
            self.clock.set_time_scale(if self.slow_motion { SLOW_MOTION_SCALE } else { 1.0 });
            log::info!("Slow motion {}", if self.slow_motion { "on" } else { "off" });
        }
        if self.input.is_key_just_pressed(KeyCode::KeyP) {
            let paused = !self.clock.is_paused();
            self.clock.set_paused(paused);
            log::info!("Simulation {}", if paused { "paused" } else { "resumed" });
        }

        let Some(renderer) = &mut self.renderer else { return };
        if self.input.is_key_just_pressed(KeyCode::KeyC) {
            let enabled = !renderer.system().culling_enabled();
            renderer.set_culling_enabled(enabled);
        }
        if self.input.is_key_just_pressed(KeyCode::KeyF) {
            let track = !renderer.is_tracking_visible();
            renderer.set_track_visible(track);
        }
        if self.input.is_key_just_pressed(KeyCode::KeyG) {
            let enabled = !renderer.profiling_enabled();
            renderer.set_profiling(enabled);
        }
        if self.input.is_key_just_pressed(KeyCode::KeyR) {
            if let (Some(gpu), Some(store)) = (&self.gpu, &self.store) {
                if let Err(e) = renderer.reset_blades(gpu, store) {
                    log::error!("Reset failed: {}", e);
                }
            }
        }
        if self.input.is_key_just_pressed(KeyCode::KeyT) {
            let timings = renderer.timings();
            log::info!(
                "GPU: physics {:.3}ms, cull {:.3}ms, draw {:.3}ms, total {:.3}ms",
                timings.physics_ms, timings.cull_ms, timings.draw_ms, timings.total_gpu_ms
            );
        }
    }

    /// Draw one frame. A missing surface texture skips the frame; a failed
    /// submission is returned as an error.
    fn render(&mut self) -> Result<FrameStatus> {
        let (Some(gpu), Some(renderer), Some(depth)) = (&self.gpu, &mut self.renderer, &self.depth_view) else {
            return Ok(FrameStatus::Skipped);
        };

        let output = match gpu.get_current_texture() {
            Ok(output) => output,
            Err(e) => {
                log::warn!("Skipping frame: {}", e);
                return Ok(FrameStatus::Skipped);
            }
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let target = FrameTarget {
            color: &view,
            depth,
            clear: Some(CLEAR_COLOR),
        };
        renderer.submit_frame(gpu, &self.camera, &self.clock, &target)?;
        output.present();
        Ok(FrameStatus::Presented)
    }

    fn update_title(&self) {
        let (Some(window), Some(renderer)) = (&self.window, &self.renderer) else { return };
        let visible = match renderer.visible_count() {
            Some(count) => format!(" | {}/{} visible", count, renderer.blade_count()),
            None => String::new(),
        };
        let culling = if renderer.system().culling_enabled() { "" } else { " | culling off" };
        let paused = if self.clock.is_paused() { " | paused" } else { "" };
        window.set_title(&format!(
            "Meadow - {:.1} FPS | Tab=mouse, WASD=move, C=cull, F=count, G=profile, R=reset, M=slow, P=pause{}{}{}",
            self.timer.stats().avg_fps, visible, culling, paused
        ));
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            log::error!("Failed to start: {}", e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        self.input.process_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if size.width > 0 && size.height > 0 {
                    if let Some(gpu) = &mut self.gpu {
                        gpu.resize(size.width, size.height);
                        self.camera.set_aspect(size.width as f32, size.height as f32);
                        self.depth_view = Some(GrassDrawPipeline::create_depth_view(
                            &gpu.device,
                            size.width,
                            size.height,
                        ));
                    }
                }
            }
            WindowEvent::RedrawRequested => {
                self.timer.tick();
                let dt = self.timer.delta_secs();
                self.clock.advance(dt);

                self.handle_keys(event_loop);
                self.controller.update(&mut self.camera, &self.input, dt, &self.terrain);

                if let Err(e) = self.render() {
                    log::error!("Frame failed: {}", e);
                    event_loop.exit();
                    return;
                }

                self.update_title();
                self.input.end_frame();

                if let Some(w) = &self.window {
                    w.request_redraw();
                }
            }
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta } = event {
            self.input.process_mouse_motion(delta);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // Let in-flight frames finish before the renderer releases its buffers
        if let Some(gpu) = &self.gpu {
            gpu.wait_idle();
        }
        log::info!("Meadow shutting down");
    }
}

/// Parse --config argument from command line
fn parse_config_arg(args: &[String]) -> Option<PathBuf> {
    args.iter()
        .position(|a| a == "--config" || a == "-c")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let config = match parse_config_arg(&args) {
        Some(path) => GrassConfig::load(&path)?,
        None => GrassConfig::default(),
    };

    let event_loop = EventLoop::new().map_err(|e| Error::Window(e.to_string()))?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app).map_err(|e| Error::Window(e.to_string()))
}

fn main() {
    logging::init();
    log::info!("Meadow starting...");

    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
