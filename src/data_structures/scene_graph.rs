//! Scene graph and hierarchical scene organization.
//!
//! Two representations live here. The loader produces the CPU-side tree
//! ([`SceneData`] / [`NodeData`]): plain data, `Send`, safe to build on a
//! worker task and to inspect in tests. Once the load completes on the event
//! loop, the tree is uploaded into the GPU-side [`SceneNode`] hierarchy which
//! owns vertex/index/transform buffers and knows how to draw itself.

use log::warn;
use wgpu::util::DeviceExt;

use crate::{
    animation::{ChannelClip, TransformDelta},
    data_structures::{
        model::{self, DrawMesh, ModelVertex},
        transform::Transform,
    },
};

/// Raw image bytes for a material texture, decoded only at GPU upload.
#[derive(Clone, Debug)]
pub struct TextureData {
    pub bytes: Vec<u8>,
    /// File extension hint ("png", "jpeg", ...) when the asset names one.
    pub format: Option<String>,
}

#[derive(Clone, Debug)]
pub struct MaterialData {
    pub name: String,
    pub base_color: [f32; 4],
    pub roughness: f32,
    pub metallic: f32,
    pub texture: Option<TextureData>,
}

/// A single glTF primitive: geometry plus an optional material reference.
///
/// `material: None` means the asset assigned no material; the material policy
/// substitutes the shared default before upload.
#[derive(Clone, Debug)]
pub struct PrimitiveData {
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
    pub material: Option<usize>,
}

#[derive(Clone, Debug)]
pub struct MeshData {
    pub name: String,
    pub primitives: Vec<PrimitiveData>,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

/// One node of the loaded hierarchy.
///
/// `index` is the glTF node index animation channels target; the synthetic
/// root the loader wraps the scene in has no index.
#[derive(Clone, Debug)]
pub struct NodeData {
    pub name: String,
    pub index: Option<usize>,
    pub transform: Transform,
    pub mesh: Option<MeshData>,
    pub children: Vec<NodeData>,
}

impl NodeData {
    pub fn container(name: &str) -> Self {
        Self {
            name: name.to_string(),
            index: None,
            transform: Transform::default(),
            mesh: None,
            children: Vec::new(),
        }
    }
}

/// The loader's complete output: the node tree, the material table the
/// primitives index into, and the animation channel clips bound to the tree.
#[derive(Clone, Debug)]
pub struct SceneData {
    pub root: NodeData,
    pub materials: Vec<MaterialData>,
    pub animations: Vec<ChannelClip>,
}

/// GPU-side scene node: per-primitive buffers plus a one-element transform
/// buffer holding the node's world matrix.
pub struct SceneNode {
    pub name: String,
    pub index: Option<usize>,
    local: Transform,
    world: Transform,
    meshes: Vec<model::Mesh>,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
    transform_buffer: wgpu::Buffer,
    children: Vec<SceneNode>,
}

impl SceneNode {
    /// Upload a loaded node tree into GPU buffers.
    ///
    /// Material indices in the data refer into the shared material table the
    /// caller uploads separately and passes to [`SceneNode::draw`].
    pub fn from_data(data: NodeData, device: &wgpu::Device) -> Self {
        let (cast_shadow, receive_shadow, meshes) = match data.mesh {
            Some(mesh) => {
                let gpu_meshes = mesh
                    .primitives
                    .into_iter()
                    .map(|primitive| {
                        let vertex_buffer =
                            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                                label: Some(&format!("{:?} Vertex Buffer", mesh.name)),
                                contents: bytemuck::cast_slice(&primitive.vertices),
                                usage: wgpu::BufferUsages::VERTEX,
                            });
                        let index_buffer =
                            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                                label: Some(&format!("{:?} Index Buffer", mesh.name)),
                                contents: bytemuck::cast_slice(&primitive.indices),
                                usage: wgpu::BufferUsages::INDEX,
                            });
                        let material = primitive.material.unwrap_or_else(|| {
                            warn!(
                                "primitive of mesh {:?} reached upload without a material",
                                mesh.name
                            );
                            0
                        });
                        model::Mesh {
                            name: mesh.name.clone(),
                            vertex_buffer,
                            index_buffer,
                            num_elements: primitive.indices.len() as u32,
                            material,
                        }
                    })
                    .collect();
                (mesh.cast_shadow, mesh.receive_shadow, gpu_meshes)
            }
            None => (false, false, Vec::new()),
        };

        let transform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Node Transform Buffer"),
            contents: bytemuck::cast_slice(&[data.transform.to_raw(receive_shadow)]),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });

        let children = data
            .children
            .into_iter()
            .map(|child| SceneNode::from_data(child, device))
            .collect();

        Self {
            name: data.name,
            index: data.index,
            world: data.transform.clone(),
            local: data.transform,
            meshes,
            cast_shadow,
            receive_shadow,
            transform_buffer,
            children,
        }
    }

    pub fn set_local_transform(&mut self, transform: Transform) {
        self.local = transform;
    }

    pub fn local_transform(&self) -> &Transform {
        &self.local
    }

    /// Apply an animation sample to the node with the given glTF index.
    ///
    /// Walks the tree iteratively and returns whether a node matched.
    pub fn apply_animation(&mut self, target: usize, delta: &TransformDelta) -> bool {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.index == Some(target) {
                delta.apply(&mut node.local);
                return true;
            }
            stack.extend(node.children.iter_mut());
        }
        false
    }

    /// Recompute world transforms as `parent * local` down the tree.
    ///
    /// Depth is bounded by asset authoring, so plain recursion is fine here.
    pub fn update_world_transforms(&mut self, parent: &Transform) {
        self.world = parent * &self.local;
        for child in self.children.iter_mut() {
            child.update_world_transforms(&self.world);
        }
    }

    pub fn write_to_buffers(&self, queue: &wgpu::Queue) {
        queue.write_buffer(
            &self.transform_buffer,
            0,
            bytemuck::cast_slice(&[self.world.to_raw(self.receive_shadow)]),
        );
        for child in &self.children {
            child.write_to_buffers(queue);
        }
    }

    pub fn draw<'a, 'pass>(
        &'a self,
        materials: &'a [model::Material],
        camera_bind_group: &'a wgpu::BindGroup,
        light_bind_group: &'a wgpu::BindGroup,
        shadow_bind_group: &'a wgpu::BindGroup,
        render_pass: &'pass mut wgpu::RenderPass<'a>,
    ) where
        'a: 'pass,
    {
        if !self.meshes.is_empty() {
            render_pass.set_vertex_buffer(1, self.transform_buffer.slice(..));
            for mesh in &self.meshes {
                match materials.get(mesh.material) {
                    Some(material) => render_pass.draw_mesh(
                        mesh,
                        material,
                        camera_bind_group,
                        light_bind_group,
                        shadow_bind_group,
                    ),
                    None => warn!(
                        "mesh {:?} references material {} outside the material table",
                        mesh.name, mesh.material
                    ),
                }
            }
        }
        for child in &self.children {
            child.draw(
                materials,
                camera_bind_group,
                light_bind_group,
                shadow_bind_group,
                render_pass,
            );
        }
    }

    /// Depth-only walk for the shadow passes; only shadow casters are drawn.
    pub fn draw_shadow<'a, 'pass>(&'a self, render_pass: &'pass mut wgpu::RenderPass<'a>)
    where
        'a: 'pass,
    {
        if self.cast_shadow && !self.meshes.is_empty() {
            render_pass.set_vertex_buffer(1, self.transform_buffer.slice(..));
            for mesh in &self.meshes {
                render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                render_pass
                    .set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..mesh.num_elements, 0, 0..1);
            }
        }
        for child in &self.children {
            child.draw_shadow(render_pass);
        }
    }
}
