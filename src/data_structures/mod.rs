//! Viewer data structures: models, animation, textures, scene graph and transforms.
//!
//! - `model` contains the CPU-side model (nodes, meshes, materials, images)
//! - `mixer` plays a model's animation clips over time
//! - `texture` contains GPU texture wrapper and creation utilities
//! - `transform` holds node transformations and their GPU record
//! - `scene_graph` is the scene: lights, helpers and the single model slot

pub mod mixer;
pub mod model;
pub mod scene_graph;
pub mod texture;
pub mod transform;
