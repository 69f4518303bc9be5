//! Asset loading: glTF parsing, Draco decompression and progress reporting.
//!
//! [`load_scene`] runs off the event loop (a worker task native, a local
//! future on web) and produces plain [`SceneData`]; nothing in here touches
//! the GPU, which keeps the whole loader testable headless.

use std::{
    collections::HashMap,
    io::{BufReader, Cursor},
};

use anyhow::{Context, Result};
use log::warn;

use crate::{
    animation::{ChannelClip, Keyframes},
    data_structures::{
        model::ModelVertex,
        scene_graph::{MaterialData, MeshData, NodeData, PrimitiveData, SceneData, TextureData},
        transform::Transform,
    },
};

pub mod draco;
pub mod io;

type DecodedPrimitives = HashMap<(usize, usize), (Vec<ModelVertex>, Vec<u32>)>;

/// Load a glTF or glb asset into CPU scene data.
///
/// `progress` receives `(loaded, total)` byte counts while the asset file
/// itself downloads; secondary fetches (external buffers, textures) are not
/// tracked, matching how a single-file asset reports.
pub async fn load_scene(
    file_name: &str,
    mut progress: impl FnMut(u64, u64),
) -> Result<SceneData> {
    let bytes = io::load_binary(file_name, &mut progress).await?;
    let gltf_reader = BufReader::new(Cursor::new(bytes));
    let gltf = gltf::Gltf::from_reader(gltf_reader)
        .with_context(|| format!("{file_name} is not a valid glTF asset"))?;

    let mut buffer_data: Vec<Vec<u8>> = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                let blob = gltf.blob.as_deref().context("glb blob missing")?;
                buffer_data.push(blob.to_vec());
            }
            gltf::buffer::Source::Uri(uri) => {
                buffer_data.push(io::load_relative(file_name, uri).await?);
            }
        }
    }

    // Draco primitives decode up front so the tree build below stays
    // synchronous.
    let mut decoded: DecodedPrimitives = HashMap::new();
    for mesh in gltf.meshes() {
        for primitive in mesh.primitives() {
            if draco::is_draco_compressed(&primitive) {
                let geometry =
                    draco::decode_primitive(&gltf.document, &buffer_data, &primitive).await?;
                decoded.insert((mesh.index(), primitive.index()), geometry);
            }
        }
    }

    let mut materials = Vec::new();
    for material in gltf.materials() {
        materials.push(load_material(file_name, &material, &buffer_data).await?);
    }

    let animations = load_animations(&gltf, &buffer_data);

    let mut root = NodeData::container("Scene");
    let scene = gltf.default_scene().or_else(|| gltf.scenes().next());
    if let Some(scene) = scene {
        for node in scene.nodes() {
            root.children
                .push(build_node(&node, &buffer_data, &mut decoded)?);
        }
    }

    Ok(SceneData {
        root,
        materials,
        animations,
    })
}

async fn load_material(
    file_name: &str,
    material: &gltf::Material<'_>,
    buffer_data: &[Vec<u8>],
) -> Result<MaterialData> {
    let pbr = material.pbr_metallic_roughness();
    let texture = match pbr.base_color_texture() {
        Some(info) => Some(load_texture_data(file_name, &info.texture(), buffer_data).await?),
        None => None,
    };
    Ok(MaterialData {
        name: material.name().unwrap_or("Material").to_string(),
        base_color: pbr.base_color_factor(),
        roughness: pbr.roughness_factor(),
        metallic: pbr.metallic_factor(),
        texture,
    })
}

async fn load_texture_data(
    file_name: &str,
    texture: &gltf::Texture<'_>,
    buffer_data: &[Vec<u8>],
) -> Result<TextureData> {
    match texture.source().source() {
        gltf::image::Source::View { view, mime_type } => {
            let buffer = buffer_data
                .get(view.buffer().index())
                .context("texture buffer index out of range")?;
            let bytes = buffer
                .get(view.offset()..view.offset() + view.length())
                .context("texture bufferView outside its buffer")?;
            Ok(TextureData {
                bytes: bytes.to_vec(),
                format: mime_type.rsplit('/').next().map(str::to_string),
            })
        }
        gltf::image::Source::Uri { uri, mime_type } => Ok(TextureData {
            bytes: io::load_relative(file_name, uri).await?,
            format: mime_type
                .and_then(|mt| mt.rsplit('/').next())
                .or_else(|| uri.rsplit('.').next())
                .map(str::to_string),
        }),
    }
}

fn load_animations(gltf: &gltf::Gltf, buffer_data: &[Vec<u8>]) -> Vec<ChannelClip> {
    let mut clips = Vec::new();
    for animation in gltf.animations() {
        for channel in animation.channels() {
            let reader =
                channel.reader(|buffer| buffer_data.get(buffer.index()).map(Vec::as_slice));
            let timestamps: Vec<f32> = match reader.read_inputs() {
                Some(gltf::accessor::Iter::Standard(times)) => times.collect(),
                Some(gltf::accessor::Iter::Sparse(_)) | None => {
                    warn!("skipping channel {} without inputs", channel.index());
                    continue;
                }
            };
            let keyframes = match reader.read_outputs() {
                Some(gltf::animation::util::ReadOutputs::Translations(translations)) => {
                    Keyframes::Translation(translations.map(Into::into).collect())
                }
                Some(gltf::animation::util::ReadOutputs::Rotations(rotations)) => {
                    Keyframes::Rotation(
                        rotations
                            .into_f32()
                            .map(|[x, y, z, w]| cgmath::Quaternion::new(w, x, y, z))
                            .collect(),
                    )
                }
                Some(gltf::animation::util::ReadOutputs::Scales(scales)) => {
                    Keyframes::Scale(scales.map(Into::into).collect())
                }
                Some(gltf::animation::util::ReadOutputs::MorphTargetWeights(_)) | None => {
                    Keyframes::Other
                }
            };
            clips.push(ChannelClip {
                name: animation.name().unwrap_or("Default").to_string(),
                target: channel.target().node().index(),
                keyframes,
                timestamps,
            });
        }
    }
    clips
}

fn build_node(
    node: &gltf::Node,
    buffer_data: &[Vec<u8>],
    decoded: &mut DecodedPrimitives,
) -> Result<NodeData> {
    let (translation, rotation, scale) = node.transform().decomposed();
    let transform = Transform {
        position: translation.into(),
        rotation: cgmath::Quaternion::new(rotation[3], rotation[0], rotation[1], rotation[2]),
        scale: scale.into(),
    };

    let mesh = match node.mesh() {
        Some(mesh) => Some(build_mesh(&mesh, buffer_data, decoded)?),
        None => None,
    };

    let mut children = Vec::new();
    for child in node.children() {
        children.push(build_node(&child, buffer_data, decoded)?);
    }

    Ok(NodeData {
        name: node.name().unwrap_or("Node").to_string(),
        index: Some(node.index()),
        transform,
        mesh,
        children,
    })
}

fn build_mesh(
    mesh: &gltf::Mesh,
    buffer_data: &[Vec<u8>],
    decoded: &mut DecodedPrimitives,
) -> Result<MeshData> {
    let mut primitives = Vec::new();
    for primitive in mesh.primitives() {
        let (vertices, indices) = match decoded.remove(&(mesh.index(), primitive.index())) {
            Some(geometry) => geometry,
            None => read_primitive(&primitive, buffer_data)?,
        };
        primitives.push(PrimitiveData {
            vertices,
            indices,
            material: primitive.material().index(),
        });
    }
    Ok(MeshData {
        name: mesh.name().unwrap_or("Mesh").to_string(),
        primitives,
        cast_shadow: false,
        receive_shadow: false,
    })
}

/// Read an uncompressed primitive through the regular accessors.
fn read_primitive(
    primitive: &gltf::mesh::Primitive,
    buffer_data: &[Vec<u8>],
) -> Result<(Vec<ModelVertex>, Vec<u32>)> {
    let reader = primitive.reader(|buffer| buffer_data.get(buffer.index()).map(Vec::as_slice));
    let positions: Vec<[f32; 3]> = reader
        .read_positions()
        .context("primitive has no POSITION accessor")?
        .collect();
    let normals: Vec<[f32; 3]> = match reader.read_normals() {
        Some(normals) => normals.collect(),
        None => vec![[0.0, 1.0, 0.0]; positions.len()],
    };
    let tex_coords: Vec<[f32; 2]> = match reader.read_tex_coords(0) {
        Some(tex_coords) => tex_coords.into_f32().collect(),
        None => vec![[0.0, 0.0]; positions.len()],
    };

    let vertices = positions
        .iter()
        .zip(normals.iter())
        .zip(tex_coords.iter())
        .map(|((position, normal), tex_coords)| ModelVertex {
            position: *position,
            tex_coords: *tex_coords,
            normal: *normal,
        })
        .collect();

    let indices = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..positions.len() as u32).collect(),
    };
    Ok((vertices, indices))
}
