//! tree-scene
//!
//! A small cross-platform viewer that shows one animated glTF model in a lit
//! scene with an axis helper, natively in a winit window and on the web in an
//! existing `<canvas>`. The model is looked up in a list of candidate paths
//! and the first one that loads wins. When the render target is not there at
//! start-up the renderer is postponed and retried once.
//!
//! High-level modules
//! - `camera`: perspective camera and its uniform
//! - `config`: start-up parameters of the scene
//! - `context`: the wgpu renderer that owns surface, device and pipelines
//! - `data_structures`: models, animation mixer, scene graph, textures, transforms
//! - `flow`: winit application shell, recovery timer and entry points
//! - `pipelines`: render pipelines for the model and the axis helper
//! - `resources`: asset sources, path fallback and glTF loading
//! - `render`: the render loop and the renderer seam
//!

pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod flow;
pub mod pipelines;
pub mod render;
pub mod resources;

// Re-exports commonly used types for convenience in downstream code.
pub use config::SceneConfig;
pub use flow::run;
pub use render::{Frame, RenderLoop, Renderer, Schedule};
pub use resources::fallback::{Fallback, LoadProgress};
