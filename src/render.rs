//! Render loop and the renderer seam.
//!
//! [`RenderLoop`] owns the scene, the camera and a [`RendererSlot`]. The host
//! (the winit app in [`crate::flow`]) calls [`RenderLoop::frame`] on every tick
//! and [`RenderLoop::resize`] on every resize. Frames are requested again
//! before anything else happens, so the loop keeps running while the renderer
//! is still missing and simply skips drawing until one is installed.
//!
//! # Key types
//!
//! - [`Renderer`] is what draws a scene; the wgpu implementation lives in
//!   [`crate::context::GpuRenderer`]
//! - [`RendererSlot`] holds at most one renderer, ever
//! - [`Schedule`] asks the host for another frame
//! - [`Frame`] tells the caller what a tick did

use instant::{Duration, Instant};

use crate::{
    camera::Camera,
    config::SceneConfig,
    data_structures::{model::Model, scene_graph::Scene, transform::Transform},
    resources::fallback::Fallback,
};

pub trait Renderer {
    /// Current drawable size in physical pixels.
    fn size(&self) -> (u32, u32);
    fn resize(&mut self, width: u32, height: u32);
    fn render(&mut self, scene: &Scene, camera: &Camera) -> anyhow::Result<()>;
}

/// Something that can be asked for one more frame.
pub trait Schedule {
    fn request_frame(&mut self);
}

/// Single-assignment holder of the renderer.
///
/// `Vacant → Initializing → Ready`. Construction may be asynchronous, so the
/// slot is claimed with [`begin`](Self::begin) first and filled later. A
/// failed construction hands the slot back with [`abandon`](Self::abandon).
#[derive(Debug, Default)]
pub enum RendererSlot<R> {
    #[default]
    Vacant,
    Initializing,
    Ready(R),
}

impl<R> RendererSlot<R> {
    /// Claims the slot. Only succeeds while nothing is installed or pending.
    pub fn begin(&mut self) -> bool {
        match self {
            RendererSlot::Vacant => {
                *self = RendererSlot::Initializing;
                true
            }
            _ => false,
        }
    }

    /// Installs a renderer into a claimed slot, returning it if the slot was
    /// not claimed.
    pub fn fill(&mut self, renderer: R) -> Result<(), R> {
        match self {
            RendererSlot::Initializing => {
                *self = RendererSlot::Ready(renderer);
                Ok(())
            }
            _ => Err(renderer),
        }
    }

    pub fn abandon(&mut self) {
        if let RendererSlot::Initializing = self {
            *self = RendererSlot::Vacant;
        }
    }

    pub fn is_vacant(&self) -> bool {
        matches!(self, RendererSlot::Vacant)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, RendererSlot::Ready(_))
    }

    pub fn get(&self) -> Option<&R> {
        match self {
            RendererSlot::Ready(renderer) => Some(renderer),
            _ => None,
        }
    }

    pub fn get_mut(&mut self) -> Option<&mut R> {
        match self {
            RendererSlot::Ready(renderer) => Some(renderer),
            _ => None,
        }
    }
}

/// Wall clock delta between drawn frames. The first tick yields zero.
#[derive(Debug, Default)]
pub struct FrameClock {
    last: Option<Instant>,
}

impl FrameClock {
    pub fn tick(&mut self, now: Instant) -> Duration {
        let dt = self
            .last
            .filter(|last| *last < now)
            .map(|last| now - last)
            .unwrap_or(Duration::ZERO);
        self.last = Some(now);
        dt
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Frame {
    /// No renderer yet, nothing drawn.
    Skipped,
    Drawn,
    /// The renderer returned an error; the loop keeps going.
    Failed,
}

#[derive(Debug)]
pub struct RenderLoop<R> {
    scene: Scene,
    camera: Camera,
    slot: RendererSlot<R>,
    clock: FrameClock,
    placement: Transform,
    running: bool,
    skipped: u64,
    drawn: u64,
    failed_loads: u64,
}

impl<R: Renderer> RenderLoop<R> {
    pub fn new(config: &SceneConfig) -> Self {
        let scene = Scene::bootstrap(config);
        let camera = Camera::from_config(&config.camera);
        Self {
            scene,
            camera,
            slot: RendererSlot::Vacant,
            clock: FrameClock::default(),
            placement: Transform::from(&config.placement),
            running: false,
            skipped: 0,
            drawn: 0,
            failed_loads: 0,
        }
    }

    /// Marks the loop as running. Returns `false` if it already was.
    pub fn start(&mut self) -> bool {
        if self.running {
            return false;
        }
        log::info!("Starting render loop");
        self.running = true;
        true
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Claims the renderer slot ahead of an asynchronous construction.
    pub fn begin_renderer(&mut self) -> bool {
        self.slot.begin()
    }

    /// Releases a claimed slot after construction failed.
    pub fn renderer_failed(&mut self, error: &anyhow::Error) {
        log::error!("Failed to initialize renderer: {:#}", error);
        self.slot.abandon();
    }

    /**
     * Installs `renderer` unless one is already installed. Claims the slot
     * first if nobody did. The camera aspect is synced to the renderer size.
     */
    pub fn install_renderer(&mut self, renderer: R) -> bool {
        if self.slot.is_vacant() {
            self.slot.begin();
        }
        let (width, height) = renderer.size();
        if self.slot.fill(renderer).is_err() {
            log::warn!("A renderer is already installed, dropping the new one");
            return false;
        }
        if width > 0 && height > 0 {
            self.camera.set_aspect(width as f32 / height as f32);
        }
        log::info!("Renderer initialized ({}x{})", width, height);
        true
    }

    pub fn renderer(&self) -> Option<&R> {
        self.slot.get()
    }

    pub fn has_renderer(&self) -> bool {
        self.slot.is_ready()
    }

    /**
     * Places `model`, puts it into the scene and starts all of its clips.
     * Returns `false` if the scene already holds a model.
     */
    pub fn attach_model(&mut self, mut model: Model) -> bool {
        model.placement = self.placement;
        if self.scene.insert_model(model).is_err() {
            log::warn!("Scene already holds a model, ignoring another one");
            return false;
        }
        log::info!("Model added to scene");
        if let Some(model) = self.scene.model_mut() {
            if model.play_all() == 0 {
                log::warn!("No animations found in the model");
            }
        }
        true
    }

    /// Consumes the outcome of the path fallback.
    pub fn finish_loading(&mut self, result: Fallback<Model>) {
        match result {
            Fallback::Loaded { path, asset, .. } => {
                log::info!("Model loaded successfully from: {}", path);
                self.attach_model(asset);
            }
            Fallback::Exhausted { failures } => {
                self.failed_loads += 1;
                log::error!(
                    "Failed to load model from all {} paths",
                    failures.len()
                );
            }
        }
    }

    /**
     * One tick of the loop. Asks for the next frame first, then draws if a
     * renderer is installed, advancing the animation by the time since the
     * last drawn frame.
     */
    pub fn frame(&mut self, now: Instant, schedule: &mut dyn Schedule) -> Frame {
        schedule.request_frame();

        let Some(renderer) = self.slot.get_mut() else {
            self.skipped += 1;
            log::debug!("Renderer not ready, skipping frame {}", self.skipped);
            return Frame::Skipped;
        };

        let dt = self.clock.tick(now);
        if let Some(model) = self.scene.model_mut() {
            model.animate(dt);
        }

        match renderer.render(&self.scene, &self.camera) {
            Ok(()) => {
                self.drawn += 1;
                Frame::Drawn
            }
            Err(e) => {
                log::error!("Unable to render: {:#}", e);
                Frame::Failed
            }
        }
    }

    /// Follows the host's size. Ignored without a renderer or with an empty size.
    pub fn resize(&mut self, width: u32, height: u32) {
        let Some(renderer) = self.slot.get_mut() else {
            return;
        };
        if width == 0 || height == 0 {
            return;
        }
        self.camera.set_aspect(width as f32 / height as f32);
        renderer.resize(width, height);
        log::info!("Resized to {}x{}", width, height);
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn skipped_frames(&self) -> u64 {
        self.skipped
    }

    pub fn drawn_frames(&self) -> u64 {
        self.drawn
    }

    /// How often every candidate path failed.
    pub fn failed_loads(&self) -> u64 {
        self.failed_loads
    }
}
