//! Application shell and event loop.
//!
//! [`App`] wires the [`RenderLoop`] to winit. On the first `resumed` it looks
//! up the render target (a new window natively, the `<canvas>` with the
//! configured id on the web), creates the renderer when the target exists and
//! spawns the model load. When the target is missing the renderer is
//! postponed and a [`RecoveryTimer`] gives it exactly one more chance.
//!
//! # Lifecycle
//!
//! 1. `resumed` builds the renderer (or arms the recovery timer), starts the
//!    asset loader and starts the render loop. On the web a document that is
//!    still loading holds back only the render loop, until `DOMContentLoaded`
//! 2. every tick calls [`RenderLoop::frame`]; frames are driven by
//!    `request_redraw` once a window exists, by a short timed wait before that
//! 3. the loader result arrives as a [`SceneEvent`] through the event loop
//!    proxy and is put into the scene on the event loop thread

use std::sync::Arc;

use instant::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    event::{StartCause, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy},
    window::{Window, WindowId},
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

use crate::{
    config::SceneConfig,
    context::GpuRenderer,
    data_structures::model::Model,
    render::{RenderLoop, Schedule},
    resources::{
        fallback::{Fallback, LoadProgress},
        load_tree_model,
    },
};

/// Results of background work, delivered on the event loop thread.
pub enum SceneEvent {
    /// Renderer construction finished (the web builds it asynchronously).
    #[cfg(target_arch = "wasm32")]
    RendererReady(anyhow::Result<GpuRenderer>),
    /// `DOMContentLoaded` fired.
    #[cfg(target_arch = "wasm32")]
    DocumentReady,
    ModelLoaded(Fallback<Model>),
}

impl std::fmt::Debug for SceneEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(target_arch = "wasm32")]
            Self::RendererReady(result) => f
                .debug_tuple("RendererReady")
                .field(&result.is_ok())
                .finish(),
            #[cfg(target_arch = "wasm32")]
            Self::DocumentReady => f.write_str("DocumentReady"),
            Self::ModelLoaded(result) => f
                .debug_tuple("ModelLoaded")
                .field(&result.is_loaded())
                .finish(),
        }
    }
}

/// One-shot timer. Once armed it fires a single time after its deadline and
/// can never be armed again.
#[derive(Debug, Default)]
pub struct RecoveryTimer {
    deadline: Option<Instant>,
    used: bool,
}

impl RecoveryTimer {
    pub fn arm(&mut self, now: Instant, delay: Duration) -> bool {
        if self.used {
            return false;
        }
        self.used = true;
        self.deadline = Some(now + delay);
        true
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// `true` exactly once, on the first poll at or after the deadline.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Asks winit for the next frame: a redraw once there is a window, a timed
/// wake-up otherwise.
struct FrameRequest<'a> {
    window: Option<&'a Window>,
    poll: bool,
}

impl Schedule for FrameRequest<'_> {
    fn request_frame(&mut self) {
        match self.window {
            Some(window) => window.request_redraw(),
            None => self.poll = true,
        }
    }
}

pub struct App {
    config: SceneConfig,
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: Arc<tokio::runtime::Runtime>,
    proxy: EventLoopProxy<SceneEvent>,
    render_loop: RenderLoop<GpuRenderer>,
    window: Option<Arc<Window>>,
    recovery: RecoveryTimer,
    poll_due: Option<Instant>,
    started: bool,
    document_ready: bool,
}

impl App {
    pub fn new(event_loop: &EventLoop<SceneEvent>, config: SceneConfig) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        #[cfg(not(target_arch = "wasm32"))]
        let async_runtime = Arc::new(tokio::runtime::Runtime::new()?);
        log::info!("Initializing scene");
        let render_loop = RenderLoop::new(&config);
        Ok(Self {
            config,
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime,
            proxy,
            render_loop,
            window: None,
            recovery: RecoveryTimer::default(),
            poll_due: None,
            started: false,
            document_ready: true,
        })
    }

    /// Starts the render loop once the document allows it.
    fn start_loop(&mut self) {
        if self.document_ready && self.render_loop.start() {
            self.tick();
        }
    }

    fn tick(&mut self) {
        let mut request = FrameRequest {
            window: self.window.as_deref(),
            poll: false,
        };
        self.render_loop.frame(Instant::now(), &mut request);
        self.poll_due = request
            .poll
            .then(|| Instant::now() + self.config.poll_interval);
    }

    fn create_renderer(&mut self, window: Arc<Window>) {
        if !self.render_loop.begin_renderer() {
            return;
        }
        self.window = Some(window.clone());

        #[cfg(not(target_arch = "wasm32"))]
        {
            match self.async_runtime.block_on(GpuRenderer::new(window)) {
                Ok(renderer) => {
                    self.render_loop.install_renderer(renderer);
                }
                Err(e) => self.render_loop.renderer_failed(&e),
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let result = GpuRenderer::new(window).await;
                if proxy.send_event(SceneEvent::RendererReady(result)).is_err() {
                    log::warn!("Event loop closed before the renderer was ready");
                }
            });
        }
    }

    /// The recovery timer fired: try the render target once more.
    fn recover(&mut self, event_loop: &ActiveEventLoop) {
        if self.render_loop.has_renderer() {
            return;
        }
        log::info!("Retrying renderer initialization");
        match find_target(event_loop, &self.config) {
            Some(window) => {
                self.create_renderer(window);
                self.start_loop();
            }
            None => log::warn!("Render target still not available"),
        }
    }

    fn spawn_loader(&self) {
        let proxy = self.proxy.clone();
        let candidates = self.config.model_paths.clone();

        #[cfg(not(target_arch = "wasm32"))]
        {
            let runtime = self.async_runtime.clone();
            let source = crate::resources::source::FileSource::new(self.config.asset_root.clone());
            let spawned = std::thread::Builder::new()
                .name("model-loader".into())
                .spawn(move || {
                    let result =
                        runtime.block_on(load_tree_model(&source, &candidates, &mut log_progress));
                    if proxy.send_event(SceneEvent::ModelLoaded(result)).is_err() {
                        log::warn!("Event loop closed before the model arrived");
                    }
                });
            if let Err(e) = spawned {
                log::error!("Cannot start the model loader: {}", e);
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            wasm_bindgen_futures::spawn_local(async move {
                let source = match crate::resources::source::HttpSource::from_location() {
                    Ok(source) => source,
                    Err(e) => {
                        log::error!("Cannot resolve asset location: {:#}", e);
                        return;
                    }
                };
                let result = load_tree_model(&source, &candidates, &mut log_progress).await;
                if proxy.send_event(SceneEvent::ModelLoaded(result)).is_err() {
                    log::warn!("Event loop closed before the model arrived");
                }
            });
        }
    }
}

fn log_progress(progress: &LoadProgress) {
    match progress.percent() {
        Some(percent) => log::debug!(
            "Loading {} (attempt {}): {}%",
            progress.path,
            progress.attempt + 1,
            percent
        ),
        None => log::debug!(
            "Loading {} (attempt {}): {} bytes",
            progress.path,
            progress.attempt + 1,
            progress.loaded
        ),
    }
}

/// Natively the target is a fresh window, on the web the configured canvas.
fn find_target(event_loop: &ActiveEventLoop, config: &SceneConfig) -> Option<Arc<Window>> {
    #[allow(unused_mut)]
    let mut window_attributes = Window::default_attributes().with_title("tree-scene");

    #[cfg(target_arch = "wasm32")]
    {
        use winit::platform::web::WindowAttributesExtWebSys;

        let canvas = web_sys::window()
            .and_then(|window| window.document())
            .and_then(|document| document.get_element_by_id(&config.canvas_id))
            .and_then(|element| element.dyn_into::<web_sys::HtmlCanvasElement>().ok());
        let Some(canvas) = canvas else {
            log::warn!("Canvas #{} not found", config.canvas_id);
            return None;
        };
        window_attributes = window_attributes.with_canvas(Some(canvas));
    }
    #[cfg(not(target_arch = "wasm32"))]
    let _ = config;

    match event_loop.create_window(window_attributes) {
        Ok(window) => Some(Arc::new(window)),
        Err(e) => {
            log::error!("Cannot create the render target: {}", e);
            None
        }
    }
}

impl ApplicationHandler<SceneEvent> for App {
    fn new_events(&mut self, event_loop: &ActiveEventLoop, _cause: StartCause) {
        let now = Instant::now();
        if self.recovery.poll(now) {
            self.recover(event_loop);
        }
        if let Some(due) = self.poll_due {
            if now >= due {
                self.poll_due = None;
                self.tick();
            }
        }
    }

    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.started {
            return;
        }
        self.started = true;

        match find_target(event_loop, &self.config) {
            Some(window) => self.create_renderer(window),
            None => {
                log::warn!("Render target not found, renderer postponed");
                self.recovery
                    .arm(Instant::now(), self.config.recovery_delay);
            }
        }

        log::info!("Loading model");
        self.spawn_loader();

        self.start_loop();
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: SceneEvent) {
        match event {
            #[cfg(target_arch = "wasm32")]
            SceneEvent::RendererReady(Ok(renderer)) => {
                self.render_loop.install_renderer(renderer);
                if let Some(window) = &self.window {
                    let size = window.inner_size();
                    self.render_loop.resize(size.width, size.height);
                    window.request_redraw();
                }
            }
            #[cfg(target_arch = "wasm32")]
            SceneEvent::RendererReady(Err(e)) => self.render_loop.renderer_failed(&e),
            #[cfg(target_arch = "wasm32")]
            SceneEvent::DocumentReady => {
                self.document_ready = true;
                self.start_loop();
            }
            SceneEvent::ModelLoaded(result) => {
                self.render_loop.finish_loading(result);
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => self.render_loop.resize(size.width, size.height),
            WindowEvent::RedrawRequested => self.tick(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let wake = [self.poll_due, self.recovery.deadline()]
            .into_iter()
            .flatten()
            .min();
        let control_flow = match wake {
            Some(at) => {
                let now = Instant::now();
                let timeout = if at > now { at - now } else { Duration::ZERO };
                ControlFlow::wait_duration(timeout)
            }
            None => ControlFlow::Wait,
        };
        event_loop.set_control_flow(control_flow);
    }
}

/// Builds the scene and runs the event loop until the window closes.
pub fn run(config: SceneConfig) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        if console_log::init_with_level(log::Level::Info).is_err() {
            web_sys::console::warn_1(&"Could not initialize logger".into());
        }
    }

    let event_loop: EventLoop<SceneEvent> = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop, config)?;
    #[cfg(target_arch = "wasm32")]
    wait_for_document(&mut app)?;
    event_loop.run_app(&mut app)?;

    Ok(())
}

/// `document.readyState` before `DOMContentLoaded`.
#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
fn document_is_loading(ready_state: &str) -> bool {
    ready_state == "loading"
}

/// Holds the render loop back until `DOMContentLoaded` if the document is
/// still loading. Scene setup and the model fetch go ahead regardless.
#[cfg(target_arch = "wasm32")]
fn wait_for_document(app: &mut App) -> anyhow::Result<()> {
    use anyhow::Context;

    let document = web_sys::window()
        .and_then(|window| window.document())
        .context("no document to attach to")?;
    if !document_is_loading(&document.ready_state()) {
        return Ok(());
    }

    app.document_ready = false;
    let proxy = app.proxy.clone();
    let on_ready = Closure::once_into_js(move || {
        if proxy.send_event(SceneEvent::DocumentReady).is_err() {
            log::warn!("Event loop closed before the document was ready");
        }
    });
    document
        .add_event_listener_with_callback("DOMContentLoaded", on_ready.unchecked_ref())
        .map_err(|e| anyhow::anyhow!("cannot listen for DOMContentLoaded: {:?}", e))?;
    log::info!("Document still loading, render loop waits for DOMContentLoaded");
    Ok(())
}

/// Web entry point.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() {
    if let Err(e) = run(SceneConfig::default()) {
        log::error!("Scene stopped: {:#}", e);
    }
}
