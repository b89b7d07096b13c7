use cgmath::InnerSpace;
use wgpu::util::DeviceExt;

use crate::data_structures::scene_graph::Scene;

pub struct LightResources {
    pub uniform: LightUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl LightResources {
    pub fn new(device: &wgpu::Device, scene: &Scene) -> Self {
        let uniform = LightUniform::from(scene);
        let buffer = mk_buffer(device, uniform);
        let bind_group_layout = mk_bind_group_layout(device);
        let bind_group = mk_bind_group(device, &bind_group_layout, &buffer);
        Self {
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }

    /// Re-uploads the uniform if the scene's lights changed.
    pub fn update(&mut self, queue: &wgpu::Queue, scene: &Scene) {
        let uniform = LightUniform::from(scene);
        if uniform != self.uniform {
            self.uniform = uniform;
            queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
        }
    }
}

/**
 * Ambient colour and one directional light, already multiplied by their
 * intensities. Every field is a vec4 to keep the WebGL uniform layout trivial.
 */
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    ambient: [f32; 4],
    /// Unit vector from the surface towards the light.
    direction: [f32; 4],
    color: [f32; 4],
}

impl From<&Scene> for LightUniform {
    fn from(scene: &Scene) -> Self {
        let [r, g, b] = scene.ambient();
        let (direction, color) = match scene.directional() {
            Some(light) => {
                let to_light = cgmath::Vector3::from(light.position);
                let direction = if to_light.magnitude2() > 0.0 {
                    to_light.normalize()
                } else {
                    cgmath::Vector3::unit_y()
                };
                (
                    [direction.x, direction.y, direction.z, 0.0],
                    [
                        light.color[0] * light.intensity,
                        light.color[1] * light.intensity,
                        light.color[2] * light.intensity,
                        1.0,
                    ],
                )
            }
            None => ([0.0, 1.0, 0.0, 0.0], [0.0; 4]),
        };
        Self {
            ambient: [r, g, b, 1.0],
            direction,
            color,
        }
    }
}

pub fn mk_buffer(device: &wgpu::Device, light_uniform: LightUniform) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Light Buffer"),
        contents: bytemuck::cast_slice(&[light_uniform]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("light_bind_group_layout"),
    })
}

pub fn mk_bind_group(
    device: &wgpu::Device,
    bind_group_layout: &wgpu::BindGroupLayout,
    light_buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout: bind_group_layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: light_buffer.as_entire_binding(),
        }],
        label: Some("light_bind_group"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SceneConfig;

    #[test]
    fn default_scene_lights_are_premultiplied() {
        let uniform = LightUniform::from(&Scene::bootstrap(&SceneConfig::default()));
        assert_eq!(uniform.ambient, [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(uniform.color, [1.5, 1.5, 1.5, 1.0]);
        let d = 1.0 / 3.0f32.sqrt();
        for (got, want) in uniform.direction[..3].iter().zip([d, d, d]) {
            assert!((got - want).abs() < 1e-6);
        }
    }

    #[test]
    fn scene_without_lights_is_dark() {
        let uniform = LightUniform::from(&Scene::new([0.0; 3]));
        assert_eq!(uniform.ambient, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(uniform.color, [0.0; 4]);
    }
}
