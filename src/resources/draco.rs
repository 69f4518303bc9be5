//! Decoding of `KHR_draco_mesh_compression` primitives.
//!
//! The extension stores the primitive's geometry as a Draco-compressed blob
//! in a buffer view; the regular accessors only describe counts and types.
//! The decoder returns one flat byte stream holding the indices first and
//! then every attribute in attribute-id order, so the walk below has to
//! mirror the order the decode config was built in.

use anyhow::{Context, Result, anyhow, ensure};
use draco_decoder::{AttributeDataType, DracoDecodeConfig, decode_mesh};
use gltf::mesh::Semantic;

use crate::data_structures::model::ModelVertex;

/// Check whether a primitive carries Draco-compressed geometry.
pub fn is_draco_compressed(primitive: &gltf::mesh::Primitive) -> bool {
    primitive
        .extension_value("KHR_draco_mesh_compression")
        .is_some()
}

/// Decode one Draco-compressed primitive into vertices and indices.
pub async fn decode_primitive(
    document: &gltf::Document,
    buffers: &[Vec<u8>],
    primitive: &gltf::mesh::Primitive<'_>,
) -> Result<(Vec<ModelVertex>, Vec<u32>)> {
    let ext = primitive
        .extension_value("KHR_draco_mesh_compression")
        .context("primitive is not Draco-compressed")?;
    let ext = ext.as_object().context("Draco extension is not an object")?;
    let view_index = ext
        .get("bufferView")
        .and_then(|v| v.as_u64())
        .context("Draco bufferView missing")? as usize;
    let attributes = ext
        .get("attributes")
        .and_then(|v| v.as_object())
        .context("Draco attributes missing")?;

    let view = document
        .views()
        .nth(view_index)
        .context("Draco bufferView index out of range")?;
    let buffer = buffers
        .get(view.buffer().index())
        .context("Draco buffer index out of range")?;
    let compressed = buffer
        .get(view.offset()..view.offset() + view.length())
        .context("Draco bufferView outside its buffer")?;

    let vertex_count = primitive
        .get(&Semantic::Positions)
        .context("POSITION accessor missing")?
        .count() as u32;
    let index_count = primitive.indices().map(|a| a.count() as u32).unwrap_or(0);

    // The decode stream lists attributes by their Draco attribute id, not by
    // semantic, so the config has to be built in that order.
    let mut mapped: Vec<(u32, Semantic)> = Vec::new();
    for (name, id) in attributes.iter() {
        let id = id
            .as_u64()
            .with_context(|| format!("Draco attribute id for {name} is not a number"))?
            as u32;
        let semantic = match name.as_str() {
            "POSITION" => Semantic::Positions,
            "NORMAL" => Semantic::Normals,
            name if name.starts_with("TEXCOORD_") => {
                Semantic::TexCoords(name[9..].parse().unwrap_or(0))
            }
            _ => continue,
        };
        mapped.push((id, semantic));
    }
    mapped.sort_by_key(|(id, _)| *id);

    let mut config = DracoDecodeConfig::new(vertex_count, index_count);
    for (_, semantic) in &mapped {
        let accessor = primitive
            .get(semantic)
            .context("accessor for Draco attribute missing")?;
        config.add_attribute(dimensions(&accessor) as u32, data_type(&accessor));
    }

    let decoded = decode_mesh(compressed, &config)
        .await
        .ok_or_else(|| anyhow!("Draco decode failed"))?;

    let mut offset = 0;
    let indices = read_indices(&decoded, &mut offset, index_count)?;

    let mut positions: Option<Vec<[f32; 3]>> = None;
    let mut normals: Option<Vec<[f32; 3]>> = None;
    let mut tex_coords: Option<Vec<[f32; 2]>> = None;
    for (_, semantic) in &mapped {
        let accessor = primitive
            .get(semantic)
            .context("accessor for Draco attribute missing")?;
        let dim = dimensions(&accessor);
        let ty = data_type(&accessor);
        let byte_len = dim * vertex_count as usize * ty.size_in_bytes();
        let slice = decoded
            .get(offset..offset + byte_len)
            .context("Draco decode stream shorter than its attributes")?;
        offset += byte_len;

        match (semantic, ty) {
            (Semantic::Positions, AttributeDataType::Float32) => {
                positions = Some(read_vec3s(slice, dim)?);
            }
            (Semantic::Normals, AttributeDataType::Float32) => {
                normals = Some(read_vec3s(slice, dim)?);
            }
            (Semantic::TexCoords(0), AttributeDataType::Float32) => {
                tex_coords = Some(read_vec2s(slice, dim)?);
            }
            _ => {}
        }
    }

    let positions = positions.context("decoded POSITION missing")?;
    let normals = normals.unwrap_or_else(|| vec![[0.0, 1.0, 0.0]; positions.len()]);
    let tex_coords = tex_coords.unwrap_or_else(|| vec![[0.0, 0.0]; positions.len()]);

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

    // Unindexed primitives draw every vertex in order.
    let indices = if indices.is_empty() {
        (0..vertex_count).collect()
    } else {
        indices
    };
    Ok((vertices, indices))
}

/// Indices come first in the stream, 16-bit when all of them fit.
fn read_indices(decoded: &[u8], offset: &mut usize, index_count: u32) -> Result<Vec<u32>> {
    if index_count == 0 {
        return Ok(Vec::new());
    }
    let mut indices = Vec::with_capacity(index_count as usize);
    if index_count <= u16::MAX as u32 {
        let byte_len = index_count as usize * 2;
        let slice = decoded
            .get(*offset..*offset + byte_len)
            .context("Draco decode stream shorter than its indices")?;
        *offset += byte_len;
        for chunk in slice.chunks_exact(2) {
            indices.push(u16::from_le_bytes([chunk[0], chunk[1]]) as u32);
        }
    } else {
        let byte_len = index_count as usize * 4;
        let slice = decoded
            .get(*offset..*offset + byte_len)
            .context("Draco decode stream shorter than its indices")?;
        *offset += byte_len;
        for chunk in slice.chunks_exact(4) {
            indices.push(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }
    }
    Ok(indices)
}

fn read_vec3s(slice: &[u8], dim: usize) -> Result<Vec<[f32; 3]>> {
    ensure!(dim >= 2, "vector attribute declares {dim} component(s)");
    Ok(slice
        .chunks_exact(4 * dim)
        .map(|c| {
            [
                f32::from_le_bytes([c[0], c[1], c[2], c[3]]),
                f32::from_le_bytes([c[4], c[5], c[6], c[7]]),
                if dim > 2 {
                    f32::from_le_bytes([c[8], c[9], c[10], c[11]])
                } else {
                    0.0
                },
            ]
        })
        .collect())
}

fn read_vec2s(slice: &[u8], dim: usize) -> Result<Vec<[f32; 2]>> {
    ensure!(dim >= 2, "vector attribute declares {dim} component(s)");
    Ok(slice
        .chunks_exact(4 * dim)
        .map(|c| {
            [
                f32::from_le_bytes([c[0], c[1], c[2], c[3]]),
                f32::from_le_bytes([c[4], c[5], c[6], c[7]]),
            ]
        })
        .collect())
}

fn dimensions(accessor: &gltf::Accessor) -> usize {
    match accessor.dimensions() {
        gltf::accessor::Dimensions::Scalar => 1,
        gltf::accessor::Dimensions::Vec2 => 2,
        gltf::accessor::Dimensions::Vec3 => 3,
        gltf::accessor::Dimensions::Vec4 => 4,
        _ => 3,
    }
}

fn data_type(accessor: &gltf::Accessor) -> AttributeDataType {
    match accessor.data_type() {
        gltf::accessor::DataType::F32 => AttributeDataType::Float32,
        gltf::accessor::DataType::U32 => AttributeDataType::UInt32,
        gltf::accessor::DataType::U16 => AttributeDataType::UInt16,
        gltf::accessor::DataType::I16 => AttributeDataType::Int16,
        gltf::accessor::DataType::U8 => AttributeDataType::UInt8,
        gltf::accessor::DataType::I8 => AttributeDataType::Int8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_attribute_data_is_an_error_not_a_panic() {
        let bytes = [0u8; 12];
        assert!(read_vec3s(&bytes, 1).is_err());
        assert!(read_vec2s(&bytes, 1).is_err());
    }

    #[test]
    fn two_component_attributes_pad_the_missing_axis() {
        let mut bytes = Vec::new();
        for v in [1.0f32, 2.0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        assert_eq!(read_vec3s(&bytes, 2).unwrap(), vec![[1.0, 2.0, 0.0]]);
        assert_eq!(read_vec2s(&bytes, 2).unwrap(), vec![[1.0, 2.0]]);
    }
}
