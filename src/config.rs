//! Start-up configuration.
//!
//! Everything the viewer needs to know before the first frame lives in
//! [`SceneConfig`]. The defaults describe the stylized tree scene; callers
//! override individual fields with the `with_*` setters.

use instant::Duration;

/// Candidate locations for the tree model, tried in order.
pub const DEFAULT_MODEL_PATHS: [&str; 4] = [
    "/images/stylized_tree.glb",
    "../images/stylized_tree.glb",
    "../../public/images/stylized_tree.glb",
    "./images/stylized_tree.glb",
];

/// Id of the `<canvas>` element used as render target on the web.
pub const DEFAULT_CANVAS_ID: &str = "tree-canvas";

/// Perspective camera parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraConfig {
    pub fovy_deg: f32,
    pub znear: f32,
    pub zfar: f32,
    pub position: [f32; 3],
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fovy_deg: 45.0,
            znear: 0.1,
            zfar: 100.0,
            position: [0.0, 1.5, 5.0],
        }
    }
}

/// Colour and intensity of a light. `position` is ignored for ambient light.
#[derive(Clone, Debug, PartialEq)]
pub struct LightConfig {
    pub color: [f32; 3],
    pub intensity: f32,
    pub position: [f32; 3],
}

/// Where the loaded model ends up in the scene.
#[derive(Clone, Debug, PartialEq)]
pub struct Placement {
    pub scale: f32,
    pub position: [f32; 3],
    /// Rotation about +Y in degrees.
    pub yaw_deg: f32,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            scale: 3.0,
            position: [0.0, -0.5, 0.0],
            yaw_deg: 180.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SceneConfig {
    pub canvas_id: String,
    pub model_paths: Vec<String>,
    /// Directory that candidate paths are resolved against on native targets.
    #[cfg(not(target_arch = "wasm32"))]
    pub asset_root: std::path::PathBuf,
    /// Delay of the single render target re-check when it was missing at start-up.
    pub recovery_delay: Duration,
    /// How often the loop ticks while there is no renderer to drive redraws.
    pub poll_interval: Duration,
    /// sRGB background colour.
    pub background: [f32; 3],
    pub camera: CameraConfig,
    pub ambient: LightConfig,
    pub directional: LightConfig,
    pub axes_size: f32,
    pub placement: Placement,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            canvas_id: DEFAULT_CANVAS_ID.to_string(),
            model_paths: DEFAULT_MODEL_PATHS.iter().map(|p| p.to_string()).collect(),
            #[cfg(not(target_arch = "wasm32"))]
            asset_root: std::path::PathBuf::from("./public"),
            recovery_delay: Duration::from_millis(1000),
            poll_interval: Duration::from_millis(16),
            // 0x1a1a1a
            background: [26.0 / 255.0; 3],
            camera: CameraConfig::default(),
            ambient: LightConfig {
                color: [1.0; 3],
                intensity: 1.0,
                position: [0.0; 3],
            },
            directional: LightConfig {
                color: [1.0; 3],
                intensity: 1.5,
                position: [5.0, 5.0, 5.0],
            },
            axes_size: 2.0,
            placement: Placement::default(),
        }
    }
}

impl SceneConfig {
    pub fn with_model_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.model_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_canvas_id(mut self, canvas_id: impl Into<String>) -> Self {
        self.canvas_id = canvas_id.into();
        self
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn with_asset_root(mut self, root: impl Into<std::path::PathBuf>) -> Self {
        self.asset_root = root.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_the_tree_scene() {
        let config = SceneConfig::default();
        assert_eq!(config.model_paths.len(), 4);
        assert_eq!(config.model_paths[0], "/images/stylized_tree.glb");
        assert_eq!(config.canvas_id, "tree-canvas");
        assert_eq!(config.recovery_delay, Duration::from_millis(1000));
        assert_eq!(config.camera.fovy_deg, 45.0);
        assert_eq!(config.placement.scale, 3.0);
    }

    #[test]
    fn setters_override_single_fields() {
        let config = SceneConfig::default()
            .with_model_paths(["/a.glb", "/b.glb"])
            .with_canvas_id("other");
        assert_eq!(config.model_paths, vec!["/a.glb", "/b.glb"]);
        assert_eq!(config.canvas_id, "other");
        assert_eq!(config.axes_size, 2.0);
    }
}
