//! The wgpu renderer.
//!
//! [`GpuRenderer`] owns the surface, device and queue of one window and draws a
//! [`Scene`] each frame: the axis helper and, once loaded, the model. The
//! model is uploaded on first sight and kept until a model with a different id
//! shows up.

use std::{iter, sync::Arc};

use anyhow::Context as _;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::{
    camera::{Camera, CameraUniform},
    data_structures::{
        model::Model,
        scene_graph::Scene,
        texture::{self, Texture},
        transform::InstanceRaw,
    },
    pipelines::{
        axes::{axes_vertices, mk_axes_pipeline},
        basic::{material_bind_group_layout, mk_material_bind_group, mk_model_pipeline},
        light::LightResources,
    },
    render::Renderer,
    resources::shrink_to_fit,
};

struct GpuPrimitive {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    count: u32,
    material: Option<usize>,
}

/// Uploaded buffers of one [`Model`].
struct GpuModel {
    id: u32,
    meshes: Vec<Vec<GpuPrimitive>>,
    materials: Vec<wgpu::BindGroup>,
    default_material: wgpu::BindGroup,
    instances: Option<wgpu::Buffer>,
    instance_capacity: usize,
}

impl GpuModel {
    fn material(&self, index: Option<usize>) -> &wgpu::BindGroup {
        index
            .and_then(|i| self.materials.get(i))
            .unwrap_or(&self.default_material)
    }
}

struct Axes {
    buffer: wgpu::Buffer,
    size: f32,
}

pub struct GpuRenderer {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    sample_count: u32,
    msaa: Option<wgpu::TextureView>,
    depth_texture: Texture,
    camera_uniform: CameraUniform,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    light: Option<LightResources>,
    material_layout: wgpu::BindGroupLayout,
    model_pipeline: wgpu::RenderPipeline,
    axes_pipeline: wgpu::RenderPipeline,
    axes: Option<Axes>,
    white: Texture,
    sampler: wgpu::Sampler,
    model: Option<GpuModel>,
}

impl std::fmt::Debug for GpuRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuRenderer")
            .field("format", &self.config.format)
            .field("width", &self.config.width)
            .field("height", &self.config.height)
            .field("sample_count", &self.sample_count)
            .finish()
    }
}

impl GpuRenderer {
    pub async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let size = window.inner_size();

        // The instance is a handle to our GPU
        // BackendBit::PRIMARY => Vulkan + Metal + DX12 + Browser WebGPU
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("cannot create a surface for the render target")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no suitable graphics adapter")?;
        log::info!("Using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                // WebGL doesn't support all of wgpu's features
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("cannot open the graphics device")?;

        // The shaders write linear colour and rely on an sRGB surface
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("the surface supports no formats")?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: pick_alpha_mode(&surface_caps.alpha_modes),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let sample_count = pick_sample_count(&[
            adapter.get_texture_format_features(config.format).flags,
            adapter.get_texture_format_features(Texture::DEPTH_FORMAT).flags,
        ]);
        let msaa = (sample_count > 1)
            .then(|| Texture::create_msaa_view(&device, &config, sample_count));

        let camera_uniform = CameraUniform::new();
        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[camera_uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let camera_bind_group_layout =
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
                label: Some("camera_bind_group_layout"),
            });
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });

        let depth_texture =
            Texture::create_depth_texture(
                &device,
                [config.width, config.height],
                sample_count,
                "depth_texture",
            );

        let light_layout = crate::pipelines::light::mk_bind_group_layout(&device);
        let material_layout = material_bind_group_layout(&device);
        let model_pipeline = mk_model_pipeline(
            &device,
            config.format,
            &camera_bind_group_layout,
            &light_layout,
            &material_layout,
            sample_count,
        );
        let axes_pipeline =
            mk_axes_pipeline(&device, config.format, &camera_bind_group_layout, sample_count);

        let white = Texture::create_white(&device, &queue);
        let sampler = texture::create_default_sampler(&device);

        log::info!(
            "Renderer created ({}x{}, {:?}, {}x MSAA, {:?} alpha)",
            config.width,
            config.height,
            config.format,
            sample_count,
            config.alpha_mode
        );

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            sample_count,
            msaa,
            depth_texture,
            camera_uniform,
            camera_buffer,
            camera_bind_group,
            light: None,
            material_layout,
            model_pipeline,
            axes_pipeline,
            axes: None,
            white,
            sampler,
            model: None,
        })
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    fn clear_colour(&self, background: [f32; 3]) -> wgpu::Color {
        let channel = |c: f32| {
            let c = c as f64;
            if self.config.format.is_srgb() {
                srgb_to_linear(c)
            } else {
                c
            }
        };
        wgpu::Color {
            r: channel(background[0]),
            g: channel(background[1]),
            b: channel(background[2]),
            a: 1.0,
        }
    }

    fn reconfigure(&mut self) {
        let size = self.window.inner_size();
        self.resize(size.width, size.height);
    }

    /// Keeps the uploaded model, axes and lights in step with `scene`.
    fn sync(&mut self, scene: &Scene) {
        let device = &self.device;
        self.light
            .get_or_insert_with(|| LightResources::new(device, scene))
            .update(&self.queue, scene);

        match scene.axes() {
            Some(helper) if self.axes.as_ref().map(|a| a.size) != Some(helper.size) => {
                let buffer = self
                    .device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("Axes Vertex Buffer"),
                        contents: bytemuck::cast_slice(&axes_vertices(helper.size)),
                        usage: wgpu::BufferUsages::VERTEX,
                    });
                self.axes = Some(Axes {
                    buffer,
                    size: helper.size,
                });
            }
            Some(_) => {}
            None => self.axes = None,
        }

        let Some(model) = scene.model() else {
            self.model = None;
            return;
        };
        if self.model.as_ref().map(|m| m.id) != Some(model.id()) {
            self.model = Some(self.upload(model));
        }
        self.write_instances(model);
    }

    fn upload(&self, model: &Model) -> GpuModel {
        let max_dimension = self.device.limits().max_texture_dimension_2d;
        let textures: Vec<Texture> = model
            .images
            .iter()
            .enumerate()
            .map(|(i, image)| {
                let shrunk = shrink_to_fit(image, max_dimension);
                Texture::from_image_data(
                    &self.device,
                    &self.queue,
                    shrunk.as_ref().unwrap_or(image),
                    Some(format!("model texture {}", i).as_str()),
                )
            })
            .collect();

        let materials = model
            .materials
            .iter()
            .map(|material| {
                let texture = material
                    .base_color_texture
                    .and_then(|i| textures.get(i))
                    .unwrap_or(&self.white);
                mk_material_bind_group(
                    &self.device,
                    &self.material_layout,
                    material,
                    texture,
                    &self.sampler,
                )
            })
            .collect();
        let default_material = mk_material_bind_group(
            &self.device,
            &self.material_layout,
            &Default::default(),
            &self.white,
            &self.sampler,
        );

        let meshes = model
            .meshes
            .iter()
            .map(|mesh| {
                mesh.primitives
                    .iter()
                    .filter(|primitive| !primitive.indices.is_empty())
                    .map(|primitive| GpuPrimitive {
                        vertex: self
                            .device
                            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                                label: Some(format!("{} Vertex Buffer", mesh.name).as_str()),
                                contents: bytemuck::cast_slice(&primitive.vertices),
                                usage: wgpu::BufferUsages::VERTEX,
                            }),
                        index: self
                            .device
                            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                                label: Some(format!("{} Index Buffer", mesh.name).as_str()),
                                contents: bytemuck::cast_slice(&primitive.indices),
                                usage: wgpu::BufferUsages::INDEX,
                            }),
                        count: primitive.indices.len() as u32,
                        material: primitive.material,
                    })
                    .collect()
            })
            .collect();

        log::info!(
            "Uploaded model {} ({} meshes, {} textures)",
            model.id(),
            model.meshes.len(),
            textures.len()
        );
        GpuModel {
            id: model.id(),
            meshes,
            materials,
            default_material,
            instances: None,
            instance_capacity: 0,
        }
    }

    /// One instance record per drawn node, in `draw_list` order.
    fn write_instances(&mut self, model: &Model) {
        let Some(gpu) = &mut self.model else {
            return;
        };
        let raw: Vec<InstanceRaw> = model
            .draw_list()
            .iter()
            .map(|(_, _, world)| world.to_raw())
            .collect();
        if raw.is_empty() {
            return;
        }
        if raw.len() > gpu.instance_capacity {
            gpu.instances = Some(self.device.create_buffer_init(
                &wgpu::util::BufferInitDescriptor {
                    label: Some("Instance Buffer"),
                    contents: bytemuck::cast_slice(&raw),
                    usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                },
            ));
            gpu.instance_capacity = raw.len();
        } else if let Some(buffer) = &gpu.instances {
            self.queue.write_buffer(buffer, 0, bytemuck::cast_slice(&raw));
        }
    }
}

impl Renderer for GpuRenderer {
    fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
            self.depth_texture = Texture::create_depth_texture(
                &self.device,
                [self.config.width, self.config.height],
                self.sample_count,
                "depth_texture",
            );
            if self.msaa.is_some() {
                self.msaa = Some(Texture::create_msaa_view(
                    &self.device,
                    &self.config,
                    self.sample_count,
                ));
            }
        }
    }

    fn render(&mut self, scene: &Scene, camera: &Camera) -> anyhow::Result<()> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            // Reconfigure the surface if it's lost or outdated
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("Surface lost or outdated, reconfiguring");
                self.reconfigure();
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Timed out waiting for the next surface texture");
                return Ok(());
            }
            Err(e) => return Err(e).context("cannot acquire the next surface texture"),
        };

        self.sync(scene);
        self.camera_uniform.update_view_proj(camera);
        self.queue.write_buffer(
            &self.camera_buffer,
            0,
            bytemuck::cast_slice(&[self.camera_uniform]),
        );

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: self.msaa.as_ref().unwrap_or(&view),
                    resolve_target: self.msaa.as_ref().map(|_| &view),
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_colour(scene.background)),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            if let Some(axes) = &self.axes {
                render_pass.set_pipeline(&self.axes_pipeline);
                render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
                render_pass.set_vertex_buffer(0, axes.buffer.slice(..));
                render_pass.draw(0..6, 0..1);
            }

            if let (Some(model), Some(gpu), Some(light)) = (scene.model(), &self.model, &self.light)
            {
                if let Some(instances) = &gpu.instances {
                    render_pass.set_pipeline(&self.model_pipeline);
                    render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
                    render_pass.set_bind_group(1, &light.bind_group, &[]);
                    render_pass.set_vertex_buffer(1, instances.slice(..));
                    for (instance, (_, mesh, _)) in model.draw_list().iter().enumerate() {
                        let instance = instance as u32;
                        for primitive in gpu.meshes.get(*mesh).into_iter().flatten() {
                            render_pass.set_bind_group(2, gpu.material(primitive.material), &[]);
                            render_pass.set_vertex_buffer(0, primitive.vertex.slice(..));
                            render_pass
                                .set_index_buffer(primitive.index.slice(..), wgpu::IndexFormat::Uint32);
                            render_pass.draw_indexed(0..primitive.count, 0, instance..instance + 1);
                        }
                    }
                }
            }
        }

        self.queue.submit(iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

/// 4x MSAA when every attachment format allows it, no multisampling otherwise.
fn pick_sample_count(formats: &[wgpu::TextureFormatFeatureFlags]) -> u32 {
    if formats.iter().all(|flags| flags.sample_count_supported(4)) {
        4
    } else {
        1
    }
}

/// Prefers a surface that composites with the page over an opaque one.
fn pick_alpha_mode(modes: &[wgpu::CompositeAlphaMode]) -> wgpu::CompositeAlphaMode {
    [
        wgpu::CompositeAlphaMode::PreMultiplied,
        wgpu::CompositeAlphaMode::PostMultiplied,
    ]
    .into_iter()
    .find(|mode| modes.contains(mode))
    .or_else(|| modes.first().copied())
    .unwrap_or(wgpu::CompositeAlphaMode::Auto)
}

fn srgb_to_linear(c: f64) -> f64 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srgb_background_is_linearized() {
        assert_eq!(srgb_to_linear(0.0), 0.0);
        assert!((srgb_to_linear(1.0) - 1.0).abs() < 1e-12);
        // 0x1a
        let linear = srgb_to_linear(26.0 / 255.0);
        assert!((linear - 0.0103).abs() < 1e-3);
    }

    #[test]
    fn msaa_needs_every_attachment_format() {
        use wgpu::TextureFormatFeatureFlags as Flags;

        let x4 = Flags::MULTISAMPLE_X4 | Flags::MULTISAMPLE_RESOLVE;
        assert_eq!(pick_sample_count(&[x4, Flags::MULTISAMPLE_X4]), 4);
        assert_eq!(pick_sample_count(&[x4, Flags::empty()]), 1);
    }

    #[test]
    fn alpha_mode_prefers_premultiplied() {
        use wgpu::CompositeAlphaMode as Mode;

        assert_eq!(
            pick_alpha_mode(&[Mode::Opaque, Mode::PostMultiplied, Mode::PreMultiplied]),
            Mode::PreMultiplied
        );
        assert_eq!(pick_alpha_mode(&[Mode::Opaque, Mode::PostMultiplied]), Mode::PostMultiplied);
        assert_eq!(pick_alpha_mode(&[Mode::Opaque]), Mode::Opaque);
        assert_eq!(pick_alpha_mode(&[]), Mode::Auto);
    }
}
