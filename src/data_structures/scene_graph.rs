//! Scene graph of the viewer.
//!
//! The scene is deliberately flat: a background colour, a list of helper
//! nodes (lights and the axis helper) and a single slot for the loaded model.
//! The slot can be filled once; the loader's first successful candidate is the
//! only model that ever enters the scene.

use crate::{config::SceneConfig, data_structures::model::Model};

#[derive(Clone, Debug, PartialEq)]
pub struct AmbientLight {
    pub color: [f32; 3],
    pub intensity: f32,
}

/// Light shining from `position` towards the origin.
#[derive(Clone, Debug, PartialEq)]
pub struct DirectionalLight {
    pub color: [f32; 3],
    pub intensity: f32,
    pub position: [f32; 3],
}

/// Debug helper drawing the X (red), Y (green) and Z (blue) axes.
#[derive(Clone, Debug, PartialEq)]
pub struct AxesHelper {
    pub size: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SceneNode {
    AmbientLight(AmbientLight),
    DirectionalLight(DirectionalLight),
    Axes(AxesHelper),
}

#[derive(Debug)]
pub struct Scene {
    /// sRGB
    pub background: [f32; 3],
    nodes: Vec<SceneNode>,
    model: Option<Model>,
}

impl Scene {
    pub fn new(background: [f32; 3]) -> Self {
        Self {
            background,
            nodes: Vec::new(),
            model: None,
        }
    }

    /// The start-up scene: ambient and directional light plus the axis helper.
    pub fn bootstrap(config: &SceneConfig) -> Self {
        let mut scene = Scene::new(config.background);
        scene.add(SceneNode::AmbientLight(AmbientLight {
            color: config.ambient.color,
            intensity: config.ambient.intensity,
        }));
        log::info!("Ambient light added");
        scene.add(SceneNode::DirectionalLight(DirectionalLight {
            color: config.directional.color,
            intensity: config.directional.intensity,
            position: config.directional.position,
        }));
        log::info!(
            "Directional light added at position {:?}",
            config.directional.position
        );
        scene.add(SceneNode::Axes(AxesHelper {
            size: config.axes_size,
        }));
        log::info!("Axes helper added");
        scene
    }

    pub fn add(&mut self, node: SceneNode) {
        self.nodes.push(node);
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    /**
     * Puts `model` into the scene. A scene holds at most one model, a second
     * insert is refused and hands the model back.
     */
    pub fn insert_model(&mut self, model: Model) -> Result<(), Model> {
        if self.model.is_some() {
            return Err(model);
        }
        self.model = Some(model);
        Ok(())
    }

    pub fn model(&self) -> Option<&Model> {
        self.model.as_ref()
    }

    pub fn model_mut(&mut self) -> Option<&mut Model> {
        self.model.as_mut()
    }

    pub fn model_count(&self) -> usize {
        usize::from(self.model.is_some())
    }

    /// Summed ambient contribution in linear RGB.
    pub fn ambient(&self) -> [f32; 3] {
        self.nodes
            .iter()
            .filter_map(|node| match node {
                SceneNode::AmbientLight(light) => Some(light),
                _ => None,
            })
            .fold([0.0; 3], |acc, light| {
                [
                    acc[0] + light.color[0] * light.intensity,
                    acc[1] + light.color[1] * light.intensity,
                    acc[2] + light.color[2] * light.intensity,
                ]
            })
    }

    pub fn directional(&self) -> Option<&DirectionalLight> {
        self.nodes.iter().find_map(|node| match node {
            SceneNode::DirectionalLight(light) => Some(light),
            _ => None,
        })
    }

    pub fn axes(&self) -> Option<&AxesHelper> {
        self.nodes.iter().find_map(|node| match node {
            SceneNode::Axes(axes) => Some(axes),
            _ => None,
        })
    }
}
