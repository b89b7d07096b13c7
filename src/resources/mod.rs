//! Model loading: where the bytes come from, which candidate path wins, and
//! how glTF content becomes a [`Model`].

use std::collections::HashMap;

use anyhow::Context;

use crate::{
    data_structures::{
        model::{ImageData, Material, Mesh, Model, ModelVertex, Node, Primitive},
        transform::Transform,
    },
    resources::{
        animation::{AnimationClip, Channel, Interpolation, Keyframes, is_timeline},
        fallback::{Fallback, LoadProgress, load_first},
        source::{AssetSource, resolve_relative},
    },
};

pub mod animation;
pub mod fallback;
pub mod source;

/// Walks `candidates` until one of them yields a valid glTF model.
pub async fn load_tree_model<S: AssetSource>(
    source: &S,
    candidates: &[String],
    on_progress: &mut dyn FnMut(&LoadProgress),
) -> Fallback<Model> {
    log::info!("Attempting to load model with these paths: {:?}", candidates);
    load_first(source, candidates, on_progress, |path, bytes| {
        load_model_gltf(source, path, bytes)
    })
    .await
}

/// Parses GLB or JSON glTF `bytes` that were fetched from `path`.
///
/// External buffers and images are fetched through `source`, relative to `path`.
pub async fn load_model_gltf<S: AssetSource>(
    source: &S,
    path: String,
    bytes: Vec<u8>,
) -> anyhow::Result<Model> {
    let gltf = gltf::Gltf::from_slice(&bytes).with_context(|| format!("{} is not valid glTF", path))?;

    // Load buffers
    let mut buffer_data: Vec<Vec<u8>> = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                let blob = gltf
                    .blob
                    .as_deref()
                    .with_context(|| format!("{} references a missing BIN chunk", path))?;
                buffer_data.push(blob.into());
            }
            gltf::buffer::Source::Uri(uri) => {
                let location = resolve_relative(&path, uri)?;
                let bin = source
                    .fetch(&location, &mut |_, _| {})
                    .await
                    .with_context(|| format!("cannot load buffer {}", location))?;
                buffer_data.push(bin);
            }
        }
        if buffer_data[buffer.index()].len() < buffer.length() {
            anyhow::bail!(
                "buffer {} of {} is shorter than declared ({} < {})",
                buffer.index(),
                path,
                buffer_data[buffer.index()].len(),
                buffer.length()
            );
        }
    }

    // Load the images materials actually use
    let mut images = Vec::new();
    let mut image_slots: HashMap<usize, usize> = HashMap::new();
    for material in gltf.materials() {
        let Some(info) = material.pbr_metallic_roughness().base_color_texture() else {
            continue;
        };
        let image = info.texture().source();
        if image_slots.contains_key(&image.index()) {
            continue;
        }
        match load_image(source, &path, &image, &buffer_data).await {
            Ok(data) => {
                image_slots.insert(image.index(), images.len());
                images.push(data);
            }
            Err(e) => log::warn!(
                "Texture {} of {} dropped: {:#}",
                image.index(),
                path,
                e
            ),
        }
    }

    let materials = read_materials(&gltf, &image_slots);
    let meshes = read_meshes(&gltf, &buffer_data)?;
    let nodes = read_nodes(&gltf);
    let roots = gltf
        .default_scene()
        .or_else(|| gltf.scenes().next())
        .map(|scene| scene.nodes().map(|node| node.index()).collect())
        .unwrap_or_default();
    let clips = read_clips(&gltf, &buffer_data);

    log::info!(
        "Model details for {}: {} nodes, {} meshes, {} animations",
        path,
        nodes.len(),
        meshes.len(),
        clips.len()
    );
    Ok(Model::new(nodes, roots, meshes, materials, images, clips))
}

async fn load_image<S: AssetSource>(
    source: &S,
    path: &str,
    image: &gltf::Image<'_>,
    buffers: &[Vec<u8>],
) -> anyhow::Result<ImageData> {
    let (bytes, mime_type): (Vec<u8>, Option<&str>) = match image.source() {
        gltf::image::Source::View { view, mime_type } => {
            let buffer = buffers
                .get(view.buffer().index())
                .context("image view points at a missing buffer")?;
            let bytes = buffer
                .get(view.offset()..view.offset() + view.length())
                .context("image view is out of bounds")?;
            (bytes.to_vec(), Some(mime_type))
        }
        gltf::image::Source::Uri { uri, mime_type } => {
            let location = resolve_relative(path, uri)?;
            let bytes = source.fetch(&location, &mut |_, _| {}).await?;
            (bytes, mime_type)
        }
    };
    decode_image(&bytes, mime_type)
}

/// Decodes image file bytes into sRGB RGBA8 pixels.
pub fn decode_image(bytes: &[u8], mime_type: Option<&str>) -> anyhow::Result<ImageData> {
    let img = match mime_type.and_then(image::ImageFormat::from_mime_type) {
        Some(format) => image::load_from_memory_with_format(bytes, format)?,
        None => image::load_from_memory(bytes)?,
    };
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(ImageData {
        width,
        height,
        rgba: rgba.into_raw(),
    })
}

/**
 * Downscaled copy of `image` when one of its sides exceeds `max_dimension`,
 * keeping the aspect ratio. `None` when the image already fits.
 */
pub fn shrink_to_fit(image: &ImageData, max_dimension: u32) -> Option<ImageData> {
    let longest = image.width.max(image.height);
    if max_dimension == 0 || longest <= max_dimension {
        return None;
    }
    let scale = max_dimension as f64 / longest as f64;
    let width = ((image.width as f64 * scale).round() as u32).clamp(1, max_dimension);
    let height = ((image.height as f64 * scale).round() as u32).clamp(1, max_dimension);
    let source = image::RgbaImage::from_raw(image.width, image.height, image.rgba.clone())?;
    let resized =
        image::imageops::resize(&source, width, height, image::imageops::FilterType::Triangle);
    log::warn!(
        "Texture {}x{} exceeds the {} pixel limit, downscaled to {}x{}",
        image.width,
        image.height,
        max_dimension,
        width,
        height
    );
    Some(ImageData {
        width,
        height,
        rgba: resized.into_raw(),
    })
}

fn read_materials(gltf: &gltf::Document, image_slots: &HashMap<usize, usize>) -> Vec<Material> {
    gltf.materials()
        .map(|material| {
            let pbr = material.pbr_metallic_roughness();
            let base_color_texture = pbr
                .base_color_texture()
                .and_then(|info| image_slots.get(&info.texture().source().index()).copied());
            let alpha_cutoff = match material.alpha_mode() {
                gltf::material::AlphaMode::Mask => Some(material.alpha_cutoff().unwrap_or(0.5)),
                gltf::material::AlphaMode::Opaque => None,
                gltf::material::AlphaMode::Blend => {
                    log::warn!(
                        "Material {:?} uses alpha blending, drawing it opaque",
                        material.name()
                    );
                    None
                }
            };
            Material {
                name: material.name().unwrap_or("unnamed_material").to_string(),
                base_color: pbr.base_color_factor(),
                base_color_texture,
                alpha_cutoff,
            }
        })
        .collect()
}

fn read_meshes(gltf: &gltf::Document, buffers: &[Vec<u8>]) -> anyhow::Result<Vec<Mesh>> {
    let mut meshes = Vec::new();
    for mesh in gltf.meshes() {
        let name = mesh.name().unwrap_or("unknown_mesh").to_string();
        let mut primitives = Vec::new();
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::warn!(
                    "Skipping primitive {} of mesh {}: mode {:?} is not supported",
                    primitive.index(),
                    name,
                    primitive.mode()
                );
                continue;
            }
            let reader =
                primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.as_slice()));

            let mut vertices: Vec<ModelVertex> = reader
                .read_positions()
                .with_context(|| format!("mesh {} has a primitive without positions", name))?
                .map(|position| ModelVertex {
                    position,
                    tex_coords: [0.0; 2],
                    normal: [0.0, 1.0, 0.0],
                })
                .collect();
            if let Some(normals) = reader.read_normals() {
                vertices
                    .iter_mut()
                    .zip(normals)
                    .for_each(|(vertex, normal)| vertex.normal = normal);
            }
            if let Some(tex_coords) = reader.read_tex_coords(0).map(|v| v.into_f32()) {
                vertices
                    .iter_mut()
                    .zip(tex_coords)
                    .for_each(|(vertex, tex_coord)| vertex.tex_coords = tex_coord);
            }

            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..vertices.len() as u32).collect(),
            };
            if let Some(bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
                anyhow::bail!(
                    "mesh {} indexes vertex {} but only has {}",
                    name,
                    bad,
                    vertices.len()
                );
            }

            primitives.push(Primitive {
                vertices,
                indices,
                material: primitive.material().index(),
            });
        }
        meshes.push(Mesh { name, primitives });
    }
    Ok(meshes)
}

fn read_nodes(gltf: &gltf::Document) -> Vec<Node> {
    gltf.nodes()
        .map(|node| {
            let (translation, rotation, scale) = node.transform().decomposed();
            Node {
                name: node.name().unwrap_or("node").to_string(),
                local: Transform {
                    position: translation.into(),
                    // glTF stores quaternions as [x, y, z, w]
                    rotation: cgmath::Quaternion::new(rotation[3], rotation[0], rotation[1], rotation[2]),
                    scale: scale.into(),
                },
                mesh: node.mesh().map(|mesh| mesh.index()),
                children: node.children().map(|child| child.index()).collect(),
            }
        })
        .collect()
}

fn read_clips(gltf: &gltf::Document, buffers: &[Vec<u8>]) -> Vec<AnimationClip> {
    gltf.animations()
        .map(|animation| {
            let channels = animation
                .channels()
                .enumerate()
                .filter_map(|(index, channel)| {
                    let reader =
                        channel.reader(|buffer| buffers.get(buffer.index()).map(|d| d.as_slice()));
                    let timestamps: Vec<f32> = match reader.read_inputs() {
                        Some(inputs) => inputs.collect(),
                        None => {
                            log::warn!("No key times found in channel {}", index);
                            return None;
                        }
                    };
                    if !is_timeline(&timestamps) {
                        log::warn!("Dropping channel {}: key times are not increasing", index);
                        return None;
                    }
                    let keyframes = match reader.read_outputs() {
                        Some(gltf::animation::util::ReadOutputs::Translations(translations)) => {
                            Keyframes::Translation(translations.map(Into::into).collect())
                        }
                        Some(gltf::animation::util::ReadOutputs::Rotations(rotations)) => {
                            Keyframes::Rotation(
                                rotations
                                    .into_f32()
                                    .map(|r| cgmath::Quaternion::new(r[3], r[0], r[1], r[2]))
                                    .collect(),
                            )
                        }
                        Some(gltf::animation::util::ReadOutputs::Scales(scales)) => {
                            Keyframes::Scale(scales.map(Into::into).collect())
                        }
                        Some(gltf::animation::util::ReadOutputs::MorphTargetWeights(_)) => {
                            Keyframes::Other
                        }
                        None => {
                            log::warn!("No keyframes found in channel {}", index);
                            return None;
                        }
                    };
                    let interpolation = Interpolation::from(channel.sampler().interpolation());
                    let keyframes = match interpolation {
                        Interpolation::CubicSpline => keyframes.spline_values(),
                        _ => keyframes,
                    };
                    Some(Channel {
                        node: channel.target().node().index(),
                        interpolation,
                        timestamps,
                        keyframes,
                    })
                })
                .collect();
            AnimationClip::new(animation.name().unwrap_or("Default"), channels)
        })
        .collect()
}
