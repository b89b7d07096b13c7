//! Node transforms and their GPU representation.
//!
//! Every node of a loaded model carries a local [`Transform`]. World transforms
//! are obtained by composing parent and child (`&parent * &child`) and are
//! uploaded as [`InstanceRaw`] records, one per drawn node.

use std::ops::Mul;

use cgmath::{One, Rotation3, SquareMatrix};

use crate::{config::Placement, data_structures::model};

/// Translation, rotation (as quaternion) and non-uniform scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: cgmath::Vector3<f32>,
    pub rotation: cgmath::Quaternion<f32>,
    pub scale: cgmath::Vector3<f32>,
}

impl Transform {
    /// Identity transformation (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: cgmath::Vector3::new(0.0, 0.0, 0.0),
            // `Quaternion::one()` is the identity quaternion (no rotation)
            rotation: cgmath::Quaternion::one(),
            scale: cgmath::Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn to_matrix(&self) -> cgmath::Matrix4<f32> {
        cgmath::Matrix4::from_translation(self.position)
            * cgmath::Matrix4::from(self.rotation)
            * cgmath::Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    pub fn to_raw(&self) -> InstanceRaw {
        let world_matrix = self.to_matrix();
        // Mirrored transforms flip the winding order, the shader needs to know.
        let handedness = world_matrix.determinant().signum();
        InstanceRaw {
            model: world_matrix.into(),
            normal: cgmath::Matrix3::from(self.rotation).into(),
            handedness,
        }
    }
}

impl From<&Placement> for Transform {
    fn from(placement: &Placement) -> Self {
        Transform {
            position: placement.position.into(),
            rotation: cgmath::Quaternion::from_angle_y(cgmath::Deg(placement.yaw_deg)),
            scale: cgmath::Vector3::new(placement.scale, placement.scale, placement.scale),
        }
    }
}

impl<'a, 'b> Mul<&'b Transform> for &'a Transform {
    type Output = Transform;

    fn mul(self, rhs: &'b Transform) -> Self::Output {
        let new_rotation = self.rotation * rhs.rotation;

        let new_scale = cgmath::Vector3::new(
            self.scale.x * rhs.scale.x,
            self.scale.y * rhs.scale.y,
            self.scale.z * rhs.scale.z,
        );
        let scaled_rhs_pos = cgmath::Vector3::new(
            self.scale.x * rhs.position.x,
            self.scale.y * rhs.position.y,
            self.scale.z * rhs.position.z,
        );
        let new_position = self.position + (self.rotation * scaled_rhs_pos);

        Transform {
            position: new_position,
            rotation: new_rotation,
            scale: new_scale,
        }
    }
}

impl Mul<Transform> for Transform {
    type Output = Transform;

    fn mul(self, rhs: Transform) -> Self::Output {
        &self * &rhs
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

/**
 * The raw instance is the actual data stored on the GPU
 */
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    model: [[f32; 4]; 4],
    normal: [[f32; 3]; 3],
    handedness: f32,
}

/**
 * Stride layout here: the world matrix as four vec4 slots, followed by the
 * normal matrix as three vec3 slots and the handedness sign.
 */
impl model::Vertex for InstanceRaw {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            // Shaders only advance to the next record when a new instance starts
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 6,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 7,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 12]>() as wgpu::BufferAddress,
                    shader_location: 8,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 16]>() as wgpu::BufferAddress,
                    shader_location: 9,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 19]>() as wgpu::BufferAddress,
                    shader_location: 10,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 22]>() as wgpu::BufferAddress,
                    shader_location: 11,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 25]>() as wgpu::BufferAddress,
                    shader_location: 12,
                    format: wgpu::VertexFormat::Float32,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{InnerSpace, Vector3};

    fn close(a: Vector3<f32>, b: Vector3<f32>) -> bool {
        (a - b).magnitude() < 1e-5
    }

    #[test]
    fn parent_scale_and_rotation_apply_to_child_offset() {
        let parent = Transform {
            position: Vector3::new(0.0, -0.5, 0.0),
            rotation: cgmath::Quaternion::from_angle_y(cgmath::Deg(180.0)),
            scale: Vector3::new(3.0, 3.0, 3.0),
        };
        let child = Transform {
            position: Vector3::new(1.0, 0.0, 0.0),
            ..Default::default()
        };
        let world = &parent * &child;
        assert!(close(world.position, Vector3::new(-3.0, -0.5, 0.0)));
        assert!(close(world.scale, Vector3::new(3.0, 3.0, 3.0)));
    }

    #[test]
    fn placement_becomes_scale_offset_and_yaw() {
        let transform = Transform::from(&Placement::default());
        assert_eq!(transform.scale, Vector3::new(3.0, 3.0, 3.0));
        assert_eq!(transform.position, Vector3::new(0.0, -0.5, 0.0));
        let forward = transform.rotation * Vector3::new(0.0, 0.0, 1.0);
        assert!(close(forward, Vector3::new(0.0, 0.0, -1.0)));
    }

    #[test]
    fn mirrored_transform_has_negative_handedness() {
        let mirrored = Transform {
            scale: Vector3::new(-1.0, 1.0, 1.0),
            ..Default::default()
        };
        assert_eq!(mirrored.to_raw().handedness, -1.0);
        assert_eq!(Transform::new().to_raw().handedness, 1.0);
    }
}
