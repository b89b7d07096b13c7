//! CPU-side model data.
//!
//! A [`Model`] is what the glTF loader produces: a node hierarchy, the meshes
//! and materials the nodes reference, decoded images and animation clips. It
//! carries no GPU resources; the renderer uploads it on first sight and keys
//! its cache by [`Model::id`].

use std::sync::atomic::{AtomicU32, Ordering};

use instant::Duration;

use crate::{
    data_structures::{mixer::AnimationMixer, transform::Transform},
    resources::animation::AnimationClip,
};

static NEXT_MODEL_ID: AtomicU32 = AtomicU32::new(1);

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 5]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// A triangle list sharing one material.
#[derive(Clone, Debug, Default)]
pub struct Primitive {
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
    pub material: Option<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub name: String,
    pub primitives: Vec<Primitive>,
}

/// Decoded RGBA8 pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    /// Linear RGBA multiplier.
    pub base_color: [f32; 4],
    /// Index into [`Model::images`].
    pub base_color_texture: Option<usize>,
    /// Fragments with a lower alpha are discarded (glTF `MASK` mode).
    pub alpha_cutoff: Option<f32>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            base_color: [1.0; 4],
            base_color_texture: None,
            alpha_cutoff: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    pub local: Transform,
    pub mesh: Option<usize>,
    pub children: Vec<usize>,
}

#[derive(Debug)]
pub struct Model {
    id: u32,
    pub nodes: Vec<Node>,
    pub roots: Vec<usize>,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub images: Vec<ImageData>,
    pub clips: Vec<AnimationClip>,
    /// Applied above every root node.
    pub placement: Transform,
    mixer: Option<AnimationMixer>,
}

impl Model {
    pub fn new(
        nodes: Vec<Node>,
        roots: Vec<usize>,
        meshes: Vec<Mesh>,
        materials: Vec<Material>,
        images: Vec<ImageData>,
        clips: Vec<AnimationClip>,
    ) -> Self {
        Self {
            id: NEXT_MODEL_ID.fetch_add(1, Ordering::Relaxed),
            nodes,
            roots,
            meshes,
            materials,
            images,
            clips,
            placement: Transform::default(),
            mixer: None,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /**
     * Creates the mixer and starts every clip. Models without clips get no
     * mixer at all. Returns the number of started clips.
     */
    pub fn play_all(&mut self) -> usize {
        if self.clips.is_empty() {
            return 0;
        }
        let mut mixer = AnimationMixer::new();
        for clip in &self.clips {
            log::info!("Playing animation: {}", clip.name);
            mixer.clip_action(clip.clone()).play();
        }
        let started = mixer.running();
        self.mixer = Some(mixer);
        started
    }

    pub fn mixer(&self) -> Option<&AnimationMixer> {
        self.mixer.as_ref()
    }

    pub fn animate(&mut self, dt: Duration) {
        if let Some(mixer) = &mut self.mixer {
            mixer.update(dt, &mut self.nodes);
        }
    }

    /**
     * World transform of every node reachable from the roots, indexed like
     * `nodes`. Unreachable nodes (and repeated visits) yield `None`.
     */
    pub fn world_transforms(&self) -> Vec<Option<Transform>> {
        let mut world = vec![None; self.nodes.len()];
        let mut stack: Vec<(usize, Transform)> = self
            .roots
            .iter()
            .rev()
            .map(|&root| (root, self.placement))
            .collect();
        while let Some((idx, parent)) = stack.pop() {
            let Some(node) = self.nodes.get(idx) else {
                log::warn!("node index {} is out of bounds", idx);
                continue;
            };
            if world[idx].is_some() {
                continue;
            }
            let transform = &parent * &node.local;
            world[idx] = Some(transform);
            stack.extend(node.children.iter().rev().map(|&child| (child, transform)));
        }
        world
    }

    /// Every (node, mesh) pair to draw this frame with its world transform.
    pub fn draw_list(&self) -> Vec<(usize, usize, Transform)> {
        self.world_transforms()
            .into_iter()
            .enumerate()
            .filter_map(|(idx, world)| {
                let mesh = self.nodes[idx].mesh?;
                (mesh < self.meshes.len()).then_some((idx, mesh, world?))
            })
            .collect()
    }
}
