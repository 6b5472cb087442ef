//! Tessera viewer entry point.
//!
//! Usage: `tessera [model.gltf | config.json]`. With no argument the
//! built-in demo scene is shown.
//!
//! Controls: WASD move, Space/Left Ctrl up/down, Escape toggles mouse-look.

use anyhow::{Context, Result};
use glam::{Vec2, Vec3};
use tracing::{debug, error, info, warn};
use winit::application::ApplicationHandler;
use winit::event::{DeviceEvent, DeviceId, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use tessera_core::{FrameTimer, RendererConfig};
use tessera_platform::{InputState, KeyCode, Window};
use tessera_renderer::{FrameStatus, Renderer};
use tessera_resources::{SceneAsset, load_gltf};
use tessera_scene::{AnimationClock, Camera, FlyController, FlyInput, SceneLighting};

struct App {
    config: RendererConfig,
    scene: SceneAsset,
    clocks: Vec<AnimationClock>,
    lighting: SceneLighting,
    camera: Camera,
    controller: FlyController,
    window: Option<Window>,
    renderer: Option<Renderer>,
    input: InputState,
    timer: FrameTimer,
}

impl App {
    fn new(config: RendererConfig, scene: SceneAsset) -> Self {
        let clocks = scene.animations.iter().map(AnimationClock::for_clip).collect();
        let camera = framing_camera(&scene, &config);
        let mut controller = FlyController::new(config.camera_speed, config.mouse_sensitivity);
        controller.sync_from(&camera);

        Self {
            config,
            scene,
            clocks,
            lighting: SceneLighting::default(),
            camera,
            controller,
            window: None,
            renderer: None,
            input: InputState::new(),
            timer: FrameTimer::new(),
        }
    }

    fn update(&mut self, dt: f32) {
        if self.input.is_key_just_pressed(KeyCode::Escape)
            && let Some(window) = self.window.as_mut()
        {
            let captured = !window.is_cursor_captured();
            window.set_cursor_captured(captured);
        }

        for (clip, clock) in self.scene.animations.iter().zip(&mut self.clocks) {
            let time = clock.advance(dt);
            if let Err(e) = clip.apply(time, &mut self.scene.graph) {
                warn!("Animation '{}' stopped: {}", clip.name, e);
                clock.playing = false;
            }
        }

        let captured = self
            .window
            .as_ref()
            .is_some_and(Window::is_cursor_captured);
        let (dx, dy) = self.input.mouse_delta();
        let fly = FlyInput {
            forward: axis(&self.input, KeyCode::KeyW, KeyCode::KeyS),
            right: axis(&self.input, KeyCode::KeyD, KeyCode::KeyA),
            up: axis(&self.input, KeyCode::Space, KeyCode::ControlLeft),
            look: if captured { Vec2::new(dx, dy) } else { Vec2::ZERO },
        };
        self.controller.update(&mut self.camera, &fly, dt);
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let dt = self.timer.tick();
        self.update(dt);
        self.input.begin_frame();

        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        if renderer.is_minimized() {
            return;
        }

        match renderer.render(&self.scene, &self.camera, &self.lighting) {
            Ok(FrameStatus::SwapchainRebuilt) => {
                let extent = renderer.extent();
                self.camera
                    .set_aspect(extent.width as f32 / extent.height.max(1) as f32);
            }
            Ok(_) => {}
            Err(e) => {
                error!("Render error: {}", e);
                event_loop.exit();
            }
        }

        if self.timer.frame_count() % 600 == 0 {
            let stats = renderer.last_stats();
            debug!(
                fps = self.timer.fps(),
                draws = stats.draws,
                material_binds = stats.material_binds,
                skipped = stats.skipped_material_binds,
                "Frame stats"
            );
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window = match Window::new(event_loop, &self.config) {
            Ok(window) => window,
            Err(e) => {
                error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        match Renderer::new(&window, &self.config, &self.scene) {
            Ok(renderer) => {
                self.camera.set_aspect(window.aspect_ratio());
                info!("Initialization complete, entering main loop");
                self.renderer = Some(renderer);
                self.window = Some(window);
            }
            Err(e) => {
                error!("Failed to create renderer: {}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        self.input.handle_window_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                debug!("Window resized to {}x{}", size.width, size.height);
                if let Some(window) = self.window.as_mut() {
                    window.resize(size.width, size.height);
                    if !window.is_minimized() {
                        self.camera.set_aspect(window.aspect_ratio());
                    }
                }
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.notify_resized(size.width, size.height);
                }
            }
            WindowEvent::Focused(false) => {
                if let Some(window) = self.window.as_mut() {
                    window.set_cursor_captured(false);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _id: DeviceId, event: DeviceEvent) {
        self.input.handle_device_event(&event);
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(renderer) = self.renderer.as_mut()
            && let Err(e) = renderer.wait_idle()
        {
            error!("Failed to drain GPU work on exit: {}", e);
        }
        // Renderer before window: the surface references the window.
        self.renderer = None;
        self.window = None;
    }
}

/// +1 while `positive` is held, -1 while `negative` is held.
fn axis(input: &InputState, positive: KeyCode, negative: KeyCode) -> f32 {
    let mut value = 0.0;
    if input.is_key_pressed(positive) {
        value += 1.0;
    }
    if input.is_key_pressed(negative) {
        value -= 1.0;
    }
    value
}

/// Places the camera in front of the scene bounds, looking at their center.
fn framing_camera(scene: &SceneAsset, config: &RendererConfig) -> Camera {
    let mut camera = Camera::new();
    camera.set_aspect(config.window_width as f32 / config.window_height.max(1) as f32);

    let bounds = scene.bounds();
    if bounds.is_empty() {
        return camera;
    }
    let center = bounds.center();
    let radius = (bounds.extent().length() * 0.5).max(0.1);
    camera.position = center + Vec3::new(0.0, radius * 0.5, radius * 2.5);
    camera.look_at(center);
    camera
}

fn load_scene(config: &RendererConfig) -> Result<SceneAsset> {
    match &config.model_path {
        Some(path) => {
            info!("Loading model {}", path.display());
            load_gltf(path).with_context(|| format!("failed to load {}", path.display()))
        }
        None => {
            info!("No model given, using the demo scene");
            SceneAsset::demo().context("failed to build the demo scene")
        }
    }
}

fn main() -> Result<()> {
    tessera_core::init_logging();
    info!("Starting Tessera");

    let config = RendererConfig::from_args(std::env::args().skip(1))
        .context("invalid command line")?;
    let scene = load_scene(&config)?;
    info!(
        "Scene: {} node(s), {} mesh(es), {} triangle(s), {} animation(s)",
        scene.graph.len(),
        scene.meshes.len(),
        scene.triangle_count(),
        scene.animations.len()
    );

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config, scene);
    event_loop.run_app(&mut app)?;
    Ok(())
}
