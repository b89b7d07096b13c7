//! Perspective camera and its uniform.
//!
//! The camera sits at a fixed position and looks down −Z. Its aspect ratio
//! follows the render target and is the only thing that changes at runtime.

use cgmath::{Matrix4, Point3, Vector3};

use crate::config::CameraConfig;

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub position: Point3<f32>,
    pub fovy: cgmath::Rad<f32>,
    pub znear: f32,
    pub zfar: f32,
    aspect: f32,
}

impl Camera {
    pub fn new<V: Into<Point3<f32>>, F: Into<cgmath::Rad<f32>>>(
        position: V,
        fovy: F,
        znear: f32,
        zfar: f32,
        aspect: f32,
    ) -> Self {
        Self {
            position: position.into(),
            fovy: fovy.into(),
            znear,
            zfar,
            aspect,
        }
    }

    /// Aspect starts at 1.0 and is corrected once a render target is known.
    pub fn from_config(config: &CameraConfig) -> Self {
        let camera = Self::new(
            config.position,
            cgmath::Deg(config.fovy_deg),
            config.znear,
            config.zfar,
            1.0,
        );
        log::info!("Camera positioned at {:?}", config.position);
        camera
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_to_rh(self.position, -Vector3::unit_z(), Vector3::unit_y())
    }

    pub fn projection_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * cgmath::perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }

    pub fn view_proj(&self) -> Matrix4<f32> {
        self.projection_matrix() * self.view_matrix()
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        use cgmath::SquareMatrix;
        Self {
            view_position: [0.0; 4],
            view_proj: cgmath::Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera) {
        self.view_position = camera.position.to_homogeneous().into();
        self.view_proj = camera.view_proj().into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}
