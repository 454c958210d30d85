mod config;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use config::ViewerConfig;
use egui::Context as EguiContext;
use scenesync_panel::{ControlPanel, Explorer, PanelIntent, bootstrap};
use scenesync_reconcile::{Reconciler, SphereFactory, subscribe};
use scenesync_render_wgpu::WgpuRenderer;
use scenesync_scene::{DebugTextRenderer, PerspectiveCamera, Renderer, Scene, SceneHandle};
use scenesync_store::ObjectStore;
use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

#[derive(Parser)]
#[command(name = "scenesync-desktop", about = "Object store to 3D scene sync viewer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Viewer config file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Actions kept in the store log before the app drains it.
const ACTION_LOG_LIMIT: usize = 1024;

/// Text dump of the scene, or `None` while something holds it mutably.
fn describe_scene(scene: &SceneHandle, camera: &PerspectiveCamera) -> Option<String> {
    let scene = scene.try_borrow().ok()?;
    Some(DebugTextRenderer::new().render(&scene, camera))
}

/// Everything that lives on the UI thread besides the GPU.
struct AppState {
    store: ObjectStore,
    panel: ControlPanel,
    scene: SceneHandle,
    reconciler: Rc<RefCell<Reconciler<SphereFactory>>>,
    camera: PerspectiveCamera,
    /// Set by the reconciler after each pass, cleared when a frame is drawn.
    frame_requested: Rc<Cell<bool>>,
    /// Actions already drained from the store log.
    drained_actions: usize,
}

impl AppState {
    fn new(config: ViewerConfig) -> Self {
        let scene = Scene::with_default_lighting().into_handle();
        let frame_requested = Rc::new(Cell::new(true));

        let flag = frame_requested.clone();
        let dump_scene = scene.clone();
        let dump_camera = config.camera;
        let reconciler = Rc::new(RefCell::new(
            Reconciler::new(SphereFactory::with_style(scene.clone(), config.sphere))
                .with_render_hook(move || {
                    flag.set(true);
                    if tracing::enabled!(tracing::Level::TRACE) {
                        if let Some(text) = describe_scene(&dump_scene, &dump_camera) {
                            tracing::trace!("scene after pass\n{text}");
                        }
                    }
                }),
        ));

        let mut store = ObjectStore::new();
        subscribe(&mut store, reconciler.clone());
        bootstrap(&mut store);

        Self {
            store,
            panel: ControlPanel::new(),
            scene,
            reconciler,
            camera: config.camera,
            frame_requested,
            drained_actions: 0,
        }
    }

    /// Total actions accepted by the store this session.
    fn dispatched(&self) -> usize {
        self.drained_actions + self.store.actions().len()
    }

    fn apply(&mut self, intents: Vec<PanelIntent>) {
        for intent in intents {
            match self.panel.apply(&mut self.store, intent) {
                Ok(Some(id)) => tracing::debug!("{intent:?} -> {}", id.short()),
                Ok(None) => {}
                Err(e) => tracing::error!("{intent:?} failed: {e}"),
            }
        }

        if self.store.actions().len() > ACTION_LOG_LIMIT {
            let drained = self.store.drain_actions().len();
            self.drained_actions += drained;
            tracing::debug!("drained {drained} actions from the store log");
        }
    }

    fn draw_ui(&mut self, ctx: &EguiContext) {
        let snapshot = self.store.snapshot();
        let slider = self.panel.slider();
        let (materialized, passes) = {
            let r = self.reconciler.borrow();
            (r.len(), r.passes())
        };

        let intents = egui::SidePanel::left("explorer")
            .default_width(260.0)
            .show(ctx, |ui| {
                let intents = Explorer::show(ui, &snapshot, slider);
                ui.separator();
                ui.small(format!(
                    "objects: {}  materialized: {}  passes: {}",
                    snapshot.len(),
                    materialized,
                    passes
                ));
                intents
            })
            .inner;

        self.apply(intents);
    }
}

/// Window, surface and the two renderers that draw into it.
struct Gpu {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    renderer: WgpuRenderer,
    egui_winit: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

impl Gpu {
    fn new(event_loop: &ActiveEventLoop, egui_ctx: &EguiContext) -> Result<Self> {
        let attrs = Window::default_attributes()
            .with_title("scenesync")
            .with_inner_size(PhysicalSize::new(1280u32, 720));
        let window = Arc::new(event_loop.create_window(attrs).context("create window")?);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("create surface")?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| anyhow!("no compatible GPU adapter"))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("scenesync_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .context("create device")?;

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or_else(|| anyhow!("surface reports no formats"))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let renderer = WgpuRenderer::new(&device, surface_format, config.width, config.height);
        let egui_winit = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(&device, surface_format, None, 1, false);

        tracing::info!(
            "GPU initialized with {} backend",
            adapter.get_info().backend.to_str()
        );

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            renderer,
            egui_winit,
            egui_renderer,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.config.width = width.max(1);
        self.config.height = height.max(1);
        self.surface.configure(&self.device, &self.config);
        self.renderer
            .resize(&self.device, self.config.width, self.config.height);
    }
}

struct GpuApp {
    state: AppState,
    gpu: Option<Gpu>,
    egui_ctx: EguiContext,
}

impl GpuApp {
    fn new(config: ViewerConfig) -> Self {
        Self {
            state: AppState::new(config),
            gpu: None,
            egui_ctx: EguiContext::default(),
        }
    }

    fn redraw(&mut self) {
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };

        let output = match gpu.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu.surface.configure(&gpu.device, &gpu.config);
                return;
            }
            Err(e) => {
                tracing::error!("surface error: {e}");
                return;
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        // Panel first: its intents reconcile the scene before it is drawn.
        let raw_input = gpu.egui_winit.take_egui_input(&gpu.window);
        let state = &mut self.state;
        let full_output = self.egui_ctx.run(raw_input, |ctx| state.draw_ui(ctx));
        gpu.egui_winit
            .handle_platform_output(&gpu.window, full_output.platform_output);

        self.state.frame_requested.set(false);
        self.state.camera.set_viewport(gpu.config.width, gpu.config.height);
        gpu.renderer.render(
            &gpu.device,
            &gpu.queue,
            &view,
            &self.state.camera,
            &self.state.scene.borrow(),
        );

        let paint_jobs = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [gpu.config.width, gpu.config.height],
            pixels_per_point: full_output.pixels_per_point,
        };

        for (id, image_delta) in &full_output.textures_delta.set {
            gpu.egui_renderer
                .update_texture(&gpu.device, &gpu.queue, *id, image_delta);
        }
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("egui_encoder"),
            });
        gpu.egui_renderer.update_buffers(
            &gpu.device,
            &gpu.queue,
            &mut encoder,
            &paint_jobs,
            &screen_descriptor,
        );
        {
            let mut pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    ..Default::default()
                })
                .forget_lifetime();
            gpu.egui_renderer
                .render(&mut pass, &paint_jobs, &screen_descriptor);
        }
        gpu.queue.submit(std::iter::once(encoder.finish()));
        for id in &full_output.textures_delta.free {
            gpu.egui_renderer.free_texture(id);
        }

        output.present();

        let egui_wants_frame = full_output
            .viewport_output
            .get(&egui::ViewportId::ROOT)
            .is_some_and(|v| v.repaint_delay.is_zero());
        if egui_wants_frame || self.state.frame_requested.get() {
            gpu.window.request_redraw();
        }
    }
}

impl ApplicationHandler for GpuApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gpu.is_some() {
            return;
        }
        match Gpu::new(event_loop, &self.egui_ctx) {
            Ok(gpu) => {
                gpu.window.request_redraw();
                self.gpu = Some(gpu);
            }
            Err(e) => {
                tracing::error!("failed to initialize GPU: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(gpu) = self.gpu.as_mut() {
            let response = gpu.egui_winit.on_window_event(&gpu.window, &event);
            if response.repaint {
                gpu.window.request_redraw();
            }
            if response.consumed {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                self.state.reconciler.borrow_mut().clear();
                tracing::info!("{} actions dispatched", self.state.dispatched());
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Some(gpu) = self.gpu.as_mut() {
                    gpu.resize(new_size.width, new_size.height);
                    gpu.window.request_redraw();
                }
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if self.state.frame_requested.get() {
            if let Some(gpu) = &self.gpu {
                gpu.window.request_redraw();
            }
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Verbose also dumps the scene after every reconcile pass.
    let filter = if cli.verbose {
        "debug,scenesync_desktop=trace"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    tracing::info!("scenesync-desktop starting");
    let config = ViewerConfig::load(cli.config.as_deref())?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = GpuApp::new(config);
    event_loop.run_app(&mut app)?;

    Ok(())
}
