//! Axis helper: three coloured lines from the origin.

use crate::{data_structures::texture::Texture, pipelines::basic::mk_render_pipeline};

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct AxesVertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

impl AxesVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<AxesVertex>() as wgpu::BufferAddress,
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
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Line list for X (red), Y (green) and Z (blue), each `size` long.
pub fn axes_vertices(size: f32) -> [AxesVertex; 6] {
    let red = [1.0, 0.0, 0.0];
    let green = [0.0, 1.0, 0.0];
    let blue = [0.0, 0.0, 1.0];
    let line = |end: [f32; 3], color: [f32; 3]| {
        [
            AxesVertex {
                position: [0.0; 3],
                color,
            },
            AxesVertex {
                position: end,
                color,
            },
        ]
    };
    let [x0, x1] = line([size, 0.0, 0.0], red);
    let [y0, y1] = line([0.0, size, 0.0], green);
    let [z0, z1] = line([0.0, 0.0, size], blue);
    [x0, x1, y0, y1, z0, z1]
}

pub fn mk_axes_pipeline(
    device: &wgpu::Device,
    color_format: wgpu::TextureFormat,
    camera_bind_group_layout: &wgpu::BindGroupLayout,
    sample_count: u32,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Axes Pipeline Layout"),
        bind_group_layouts: &[camera_bind_group_layout],
        push_constant_ranges: &[],
    });
    let shader = wgpu::ShaderModuleDescriptor {
        label: Some("Axes Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("axes.wgsl").into()),
    };
    mk_render_pipeline(
        device,
        &layout,
        color_format,
        Some(wgpu::BlendState::REPLACE),
        Some(Texture::DEPTH_FORMAT),
        &[AxesVertex::desc()],
        shader,
        wgpu::PrimitiveTopology::LineList,
        None,
        sample_count,
    )
}
