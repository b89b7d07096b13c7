#![allow(dead_code)]

use std::{cell::RefCell, collections::HashMap};

use tree_scene::{
    Renderer, Schedule, camera::Camera, data_structures::scene_graph::Scene,
    resources::source::AssetSource,
};

/// Renderer that only counts what it is asked to do.
#[derive(Debug, Default)]
pub(crate) struct FakeRenderer {
    pub size: (u32, u32),
    pub draws: u32,
    pub draws_with_model: u32,
    pub resizes: Vec<(u32, u32)>,
    pub last_aspect: Option<f32>,
}

impl FakeRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            ..Default::default()
        }
    }
}

impl Renderer for FakeRenderer {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        self.resizes.push((width, height));
    }

    fn render(&mut self, scene: &Scene, camera: &Camera) -> anyhow::Result<()> {
        self.draws += 1;
        if scene.model().is_some() {
            self.draws_with_model += 1;
        }
        self.last_aspect = Some(camera.aspect());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(crate) struct CountingSchedule {
    pub requests: u32,
}

impl Schedule for CountingSchedule {
    fn request_frame(&mut self) {
        self.requests += 1;
    }
}

/// In-memory files keyed by path. Records every fetch in order.
#[derive(Debug, Default)]
pub(crate) struct MemorySource {
    files: HashMap<String, Vec<u8>>,
    pub fetched: RefCell<Vec<String>>,
}

impl MemorySource {
    pub fn with(mut self, path: &str, bytes: Vec<u8>) -> Self {
        self.files.insert(path.to_string(), bytes);
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.borrow().clone()
    }
}

impl AssetSource for MemorySource {
    async fn fetch(
        &self,
        path: &str,
        progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> anyhow::Result<Vec<u8>> {
        self.fetched.borrow_mut().push(path.to_string());
        match self.files.get(path) {
            Some(bytes) => {
                let total = bytes.len() as u64;
                progress(total / 2, Some(total));
                progress(total, Some(total));
                Ok(bytes.clone())
            }
            None => anyhow::bail!("404 Not Found: {}", path),
        }
    }
}

pub(crate) fn paths(paths: &[&str]) -> Vec<String> {
    paths.iter().map(|p| p.to_string()).collect()
}

/// Binary payload shared by the GLB and the external-buffer glTF:
/// one triangle, u16 indices, and a translation track from y=0 to y=1 at
/// `key_times`.
fn tree_bin(key_times: [f32; 2]) -> Vec<u8> {
    let mut bin = Vec::new();
    // positions @0
    for v in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
        v.iter().for_each(|f| bin.extend_from_slice(&f.to_le_bytes()));
    }
    // indices @36
    for i in [0u16, 1, 2] {
        bin.extend_from_slice(&i.to_le_bytes());
    }
    bin.extend_from_slice(&[0, 0]);
    // key times @44
    for t in key_times {
        bin.extend_from_slice(&t.to_le_bytes());
    }
    // translations @52
    for v in [[0.0f32, 0.0, 0.0], [0.0, 1.0, 0.0]] {
        v.iter().for_each(|f| bin.extend_from_slice(&f.to_le_bytes()));
    }
    bin
}

/// glTF JSON for [`tree_bin`]. An empty clip name leaves the animation unnamed.
fn tree_json(clips: &[&str], buffer_uri: Option<&str>, bin_len: usize) -> String {
    let animations: Vec<String> = clips
        .iter()
        .map(|name| {
            let name = if name.is_empty() {
                String::new()
            } else {
                format!(r#""name": "{}","#, name)
            };
            format!(
                r#"{{ {} "samplers": [{{"input": 2, "output": 3, "interpolation": "LINEAR"}}],
                   "channels": [{{"sampler": 0, "target": {{"node": 1, "path": "translation"}}}}] }}"#,
                name
            )
        })
        .collect();
    let uri = buffer_uri
        .map(|uri| format!(r#""uri": "{}","#, uri))
        .unwrap_or_default();
    format!(
        r#"{{
  "asset": {{"version": "2.0"}},
  "scene": 0,
  "scenes": [{{"nodes": [0]}}],
  "nodes": [
    {{"name": "trunk", "mesh": 0, "children": [1], "translation": [0.0, 1.0, 0.0]}},
    {{"name": "crown", "mesh": 0}}
  ],
  "meshes": [{{"name": "tree", "primitives": [{{"attributes": {{"POSITION": 0}}, "indices": 1}}]}}],
  "buffers": [{{ {} "byteLength": {} }}],
  "bufferViews": [
    {{"buffer": 0, "byteOffset": 0, "byteLength": 36, "target": 34962}},
    {{"buffer": 0, "byteOffset": 36, "byteLength": 6, "target": 34963}},
    {{"buffer": 0, "byteOffset": 44, "byteLength": 8}},
    {{"buffer": 0, "byteOffset": 52, "byteLength": 24}}
  ],
  "accessors": [
    {{"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3", "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]}},
    {{"bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR"}},
    {{"bufferView": 2, "componentType": 5126, "count": 2, "type": "SCALAR", "min": [0.0], "max": [1.0]}},
    {{"bufferView": 3, "componentType": 5126, "count": 2, "type": "VEC3"}}
  ],
  "animations": [{}]
}}"#,
        uri,
        bin_len,
        animations.join(",")
    )
}

/// Two-node tree model as GLB with one 1s animation clip per entry of `clips`.
pub(crate) fn tree_glb(clips: &[&str]) -> Vec<u8> {
    tree_glb_with_key_times(clips, [0.0, 1.0])
}

pub(crate) fn tree_glb_with_key_times(clips: &[&str], key_times: [f32; 2]) -> Vec<u8> {
    let bin = tree_bin(key_times);
    let mut json = tree_json(clips, None, bin.len()).into_bytes();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let mut bin_chunk = bin;
    while bin_chunk.len() % 4 != 0 {
        bin_chunk.push(0);
    }

    let total = 12 + 8 + json.len() + 8 + bin_chunk.len();
    let mut glb = Vec::with_capacity(total);
    glb.extend_from_slice(b"glTF");
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&(total as u32).to_le_bytes());
    glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"JSON");
    glb.extend_from_slice(&json);
    glb.extend_from_slice(&(bin_chunk.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"BIN\0");
    glb.extend_from_slice(&bin_chunk);
    glb
}

/// The same tree as JSON glTF referencing an external buffer at `uri`.
/// Returns (gltf, bin).
pub(crate) fn tree_gltf_external(clips: &[&str], uri: &str) -> (Vec<u8>, Vec<u8>) {
    let bin = tree_bin([0.0, 1.0]);
    let json = tree_json(clips, Some(uri), bin.len());
    (json.into_bytes(), bin)
}
