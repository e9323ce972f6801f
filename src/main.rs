//! Interactive front end: a window showing the spheres, keyboard control of
//! the simulation and click-to-select with a live property readout.
//!
//! # Controls
//! - P: play
//! - Space: pause
//! - S: stop and release all device resources
//! - R: rebuild the simulation from scratch
//! - Left click: select the sphere under the cursor
//! - Q/Escape: exit

use clap::Parser;
use dynlab::{
    camera::Camera,
    error::DeviceError,
    gpu::{AdapterPreference, GpuContext},
    mesh::MeshLibrary,
    physics::{create_gpu_simulation, GpuBackend},
    picking::Ray,
    readback::{PropertySnapshot, SelectionReadback},
    viz::{RenderError, Renderer, Scene, WindowManager},
    Simulation, SimulationConfig, TickOutcome,
};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use winit::{
    dpi::{PhysicalPosition, PhysicalSize},
    event::{ElementState, Event, KeyEvent, MouseButton, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget},
    keyboard::{KeyCode, PhysicalKey},
};

#[derive(Parser, Debug)]
#[command(name = "dynlab")]
#[command(about = "GPU sphere dynamics with ray picking")]
struct Args {
    /// Number of spheres
    #[arg(long, default_value = "28")]
    bodies: usize,

    /// Spheres per grid row
    #[arg(long, default_value = "7")]
    per_row: usize,

    /// Seed for radii, velocities and colors (random if omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Simulation tick interval in milliseconds
    #[arg(long, default_value = "16")]
    tick_ms: u64,

    /// Selected-body readback interval in milliseconds
    #[arg(long, default_value = "150")]
    readback_ms: u64,

    /// Use the software fallback adapter
    #[arg(long)]
    fallback: bool,
}

impl Args {
    fn config(&self) -> SimulationConfig {
        let config = SimulationConfig::default()
            .with_body_count(self.bodies)
            .with_bodies_per_row(self.per_row)
            .with_tick_interval(Duration::from_millis(self.tick_ms))
            .with_readback_interval(Duration::from_millis(self.readback_ms));
        match self.seed {
            Some(seed) => config.with_seed(seed),
            None => config,
        }
    }
}

struct App {
    gpu: Arc<GpuContext>,
    window: WindowManager,
    renderer: Renderer,
    camera: Camera,
    config: SimulationConfig,
    meshes: MeshLibrary,
    simulation: Simulation<GpuBackend>,
    readback: SelectionReadback,
    last_tick: Instant,
    cursor: PhysicalPosition<f64>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = args.config();
    config.validate()?;

    let event_loop = EventLoop::new()?;
    let window = WindowManager::new(&event_loop)?;

    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
    let surface = instance.create_surface(Arc::clone(window.window()))?;
    let preference = if args.fallback {
        AdapterPreference::Fallback
    } else {
        AdapterPreference::Gpu
    };
    let gpu = Arc::new(pollster::block_on(GpuContext::from_instance(
        instance,
        Some(&surface),
        preference,
    ))?);

    let size = window.inner_size();
    let camera = Camera::new(size.width, size.height);
    let renderer = Renderer::new(surface, &gpu, size, &camera);
    let meshes = MeshLibrary::with_default_sphere(&config.mesh_name);
    let simulation = create_gpu_simulation(Arc::clone(&gpu), &config, &meshes, camera.world_bounds())?;

    let mut app = App {
        gpu,
        window,
        renderer,
        camera,
        readback: SelectionReadback::new(config.readback_interval),
        config,
        meshes,
        simulation,
        last_tick: Instant::now(),
        cursor: PhysicalPosition::new(0.0, 0.0),
    };

    event_loop.run(move |event, elwt| match event {
        Event::AboutToWait => app.handle_idle(elwt),
        Event::WindowEvent { event, .. } => match event {
            WindowEvent::CloseRequested => elwt.exit(),
            WindowEvent::Resized(physical_size) => app.handle_resize(physical_size),
            WindowEvent::RedrawRequested => app.handle_redraw(elwt),
            WindowEvent::CursorMoved { position, .. } => app.cursor = position,
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => app.handle_pick(),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => app.handle_key(code, elwt),
            _ => {}
        },
        _ => {}
    })?;

    Ok(())
}

impl App {
    fn handle_idle(&mut self, elwt: &EventLoopWindowTarget<()>) {
        let now = Instant::now();
        if now.saturating_duration_since(self.last_tick) >= self.config.tick_interval {
            self.last_tick = now;
            if let TickOutcome::Advanced { .. } = self.simulation.tick(now) {
                self.window.request_redraw();
            }
        }

        let window = &self.window;
        let mut show = |snapshot: &PropertySnapshot| {
            window.set_title(&format!("DynLab | {}", snapshot.summary()));
            log::debug!("selected body\n{snapshot}");
        };
        if let Err(error) = self.readback.poll(now, &mut self.simulation, &mut show) {
            log::warn!("property readback failed: {error}");
        }

        elwt.set_control_flow(ControlFlow::WaitUntil(self.last_tick + self.config.tick_interval));
    }

    fn handle_resize(&mut self, physical_size: PhysicalSize<u32>) {
        if physical_size.width == 0 || physical_size.height == 0 {
            return;
        }
        self.camera.resize(physical_size.width, physical_size.height);
        self.renderer.resize(&self.gpu, physical_size, &self.camera);
        self.simulation.set_bounds(self.camera.world_bounds());
        self.window.request_redraw();
    }

    fn handle_redraw(&mut self, elwt: &EventLoopWindowTarget<()>) {
        let scene = self
            .simulation
            .split_mut()
            .map(|(backend, metadata, selection)| Scene {
                backend,
                metadata,
                selection,
            });

        match self.renderer.render(&self.gpu, scene) {
            Ok(()) => {}
            Err(RenderError::Surface(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                let (width, height) = self.renderer.size();
                self.renderer
                    .resize(&self.gpu, PhysicalSize::new(width, height), &self.camera);
            }
            Err(RenderError::Surface(wgpu::SurfaceError::OutOfMemory)) => {
                log::error!("surface out of memory, exiting");
                elwt.exit();
            }
            Err(error) => log::warn!("frame skipped: {error}"),
        }
    }

    fn handle_pick(&mut self) {
        let ray = Ray::from_surface(&self.camera, self.cursor.x as f32, self.cursor.y as f32);
        match self.simulation.pick(&ray) {
            Ok(Some(body)) => {
                log::info!("selected body {body}");
                let window = &self.window;
                let mut show = |snapshot: &PropertySnapshot| {
                    window.set_title(&format!("DynLab | {}", snapshot.summary()));
                };
                if let Err(error) = SelectionReadback::read_now(&mut self.simulation, &mut show) {
                    log::warn!("property readback failed: {error}");
                }
            }
            Ok(None) => self.window.reset_title(),
            Err(DeviceError::Released) => log::debug!("pick ignored, simulation is stopped"),
            Err(error) => log::warn!("pick failed: {error}"),
        }
        self.window.request_redraw();
    }

    fn handle_key(&mut self, code: KeyCode, elwt: &EventLoopWindowTarget<()>) {
        match code {
            KeyCode::KeyP => self.simulation.play(),
            KeyCode::Space => self.simulation.pause(),
            KeyCode::KeyS => {
                self.simulation.stop();
                self.window.reset_title();
                self.window.request_redraw();
            }
            KeyCode::KeyR => self.reinitialize(),
            KeyCode::KeyQ | KeyCode::Escape => elwt.exit(),
            _ => {}
        }
    }

    fn reinitialize(&mut self) {
        self.simulation.stop();
        match create_gpu_simulation(
            Arc::clone(&self.gpu),
            &self.config,
            &self.meshes,
            self.camera.world_bounds(),
        ) {
            Ok(simulation) => {
                self.simulation = simulation;
                self.last_tick = Instant::now();
                self.window.reset_title();
                log::info!("simulation reinitialized");
            }
            Err(error) => log::error!("reinitialization failed: {error}"),
        }
        self.window.request_redraw();
    }
}
