//! Scene assembly: model placement, the material-defaulting policy and the
//! uploaded scene the render loop draws.

use cgmath::{Rad, Rotation3};
use log::info;

use crate::{
    animation::Mixer,
    data_structures::{
        model::{Material, MaterialUniform, material_layout},
        scene_graph::{MaterialData, SceneData, SceneNode},
        texture::Texture,
        transform::Transform,
    },
};

/// Fixed placement of the loaded model.
pub const MODEL_POSITION: [f32; 3] = [0.0, 1.0, 0.0];
pub const MODEL_SCALE: f32 = 0.17;
pub const MODEL_ROTATION_Y: f32 = 1.4;

pub const DEFAULT_BASE_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
pub const DEFAULT_ROUGHNESS: f32 = 0.5;
pub const DEFAULT_METALLIC: f32 = 0.0;

pub fn model_transform() -> Transform {
    Transform {
        position: MODEL_POSITION.into(),
        rotation: cgmath::Quaternion::from_angle_y(Rad(MODEL_ROTATION_Y)),
        scale: cgmath::Vector3::new(MODEL_SCALE, MODEL_SCALE, MODEL_SCALE),
    }
}

/// Normalize materials and shadow flags across a freshly loaded scene.
///
/// Every primitive without a material is pointed at one shared default
/// (appended to the material table on first use); existing material
/// assignments are left alone. Every mesh is marked to both cast and receive
/// shadows.
pub fn apply_material_policy(data: &mut SceneData) {
    let mut default_material: Option<usize> = None;
    let mut stack = vec![&mut data.root];
    while let Some(node) = stack.pop() {
        if let Some(mesh) = node.mesh.as_mut() {
            mesh.cast_shadow = true;
            mesh.receive_shadow = true;
            for primitive in mesh.primitives.iter_mut() {
                if primitive.material.is_none() {
                    let index = *default_material.get_or_insert_with(|| {
                        data.materials.push(MaterialData {
                            name: "Default".to_string(),
                            base_color: DEFAULT_BASE_COLOR,
                            roughness: DEFAULT_ROUGHNESS,
                            metallic: DEFAULT_METALLIC,
                            texture: None,
                        });
                        data.materials.len() - 1
                    });
                    primitive.material = Some(index);
                }
            }
        }
        stack.extend(node.children.iter_mut());
    }
}

/// The uploaded scene: the GPU node tree, its material table and the animation
/// mixer. Empty until the asset load completes.
pub struct Scene {
    pub root: Option<SceneNode>,
    pub materials: Vec<Material>,
    pub mixer: Option<Mixer>,
    pub material_bind_group_layout: wgpu::BindGroupLayout,
}

impl Scene {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            root: None,
            materials: Vec::new(),
            mixer: None,
            material_bind_group_layout: material_layout(device),
        }
    }

    /// Upload loaded scene data and place it at the fixed model transform.
    pub fn attach_model(
        &mut self,
        mut data: SceneData,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> anyhow::Result<()> {
        apply_material_policy(&mut data);

        let mut materials = Vec::with_capacity(data.materials.len());
        for material in &data.materials {
            materials.push(upload_material(
                device,
                queue,
                material,
                &self.material_bind_group_layout,
            )?);
        }

        let mut root = SceneNode::from_data(data.root, device);
        root.set_local_transform(model_transform());
        root.update_world_transforms(&Transform::new());
        root.write_to_buffers(queue);

        let mixer = if data.animations.is_empty() {
            None
        } else {
            Some(Mixer::new(data.animations))
        };
        info!(
            "scene attached: {} materials, {} animation actions",
            materials.len(),
            mixer.as_ref().map_or(0, |m| m.actions().len()),
        );

        self.root = Some(root);
        self.materials = materials;
        self.mixer = mixer;
        Ok(())
    }

    /// Advance animations and push the resulting world transforms to the GPU.
    pub fn update(&mut self, queue: &wgpu::Queue, dt: f32) {
        let Some(root) = self.root.as_mut() else {
            return;
        };
        if let Some(mixer) = self.mixer.as_mut() {
            for (target, delta) in mixer.update(dt) {
                root.apply_animation(target, &delta);
            }
        }
        root.update_world_transforms(&Transform::new());
        root.write_to_buffers(queue);
    }

    pub fn draw<'a, 'pass>(
        &'a self,
        camera_bind_group: &'a wgpu::BindGroup,
        light_bind_group: &'a wgpu::BindGroup,
        shadow_bind_group: &'a wgpu::BindGroup,
        render_pass: &'pass mut wgpu::RenderPass<'a>,
    ) where
        'a: 'pass,
    {
        if let Some(root) = &self.root {
            root.draw(
                &self.materials,
                camera_bind_group,
                light_bind_group,
                shadow_bind_group,
                render_pass,
            );
        }
    }

    pub fn draw_shadow<'a, 'pass>(&'a self, render_pass: &'pass mut wgpu::RenderPass<'a>)
    where
        'a: 'pass,
    {
        if let Some(root) = &self.root {
            root.draw_shadow(render_pass);
        }
    }
}

fn upload_material(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    data: &MaterialData,
    layout: &wgpu::BindGroupLayout,
) -> anyhow::Result<Material> {
    let texture = match &data.texture {
        Some(texture) => Texture::from_bytes(
            device,
            queue,
            &texture.bytes,
            &data.name,
            texture.format.as_deref(),
        )?,
        None => Texture::create_default_white(device, queue),
    };
    let uniform = MaterialUniform {
        base_color: data.base_color,
        roughness: data.roughness,
        metallic: data.metallic,
        _padding: [0.0; 2],
    };
    Ok(Material::new(device, &data.name, uniform, texture, layout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::scene_graph::{MeshData, NodeData, PrimitiveData};

    fn mesh(primitives: Vec<PrimitiveData>) -> MeshData {
        MeshData {
            name: "mesh".to_string(),
            primitives,
            cast_shadow: false,
            receive_shadow: false,
        }
    }

    fn primitive(material: Option<usize>) -> PrimitiveData {
        PrimitiveData {
            vertices: Vec::new(),
            indices: Vec::new(),
            material,
        }
    }

    #[test]
    fn policy_substitutes_one_shared_default() {
        let mut child = NodeData::container("a");
        child.mesh = Some(mesh(vec![primitive(None)]));
        let mut grandchild = NodeData::container("b");
        grandchild.mesh = Some(mesh(vec![primitive(None), primitive(Some(0))]));
        child.children.push(grandchild);
        let mut root = NodeData::container("root");
        root.children.push(child);

        let mut data = SceneData {
            root,
            materials: vec![MaterialData {
                name: "Red".to_string(),
                base_color: [1.0, 0.0, 0.0, 1.0],
                roughness: 0.3,
                metallic: 0.0,
                texture: None,
            }],
            animations: Vec::new(),
        };
        apply_material_policy(&mut data);

        // Exactly one default appended, shared by both bare primitives.
        assert_eq!(data.materials.len(), 2);
        assert_eq!(data.materials[1].name, "Default");
        assert_eq!(data.materials[1].base_color, DEFAULT_BASE_COLOR);
        assert_eq!(data.materials[1].roughness, DEFAULT_ROUGHNESS);
        assert_eq!(data.materials[1].metallic, DEFAULT_METALLIC);

        let child = &data.root.children[0];
        let child_mesh = child.mesh.as_ref().unwrap();
        assert_eq!(child_mesh.primitives[0].material, Some(1));
        let grandchild_mesh = child.children[0].mesh.as_ref().unwrap();
        assert_eq!(grandchild_mesh.primitives[0].material, Some(1));
        // Pre-existing assignment untouched.
        assert_eq!(grandchild_mesh.primitives[1].material, Some(0));
    }

    #[test]
    fn policy_marks_every_mesh_as_shadow_caster_and_receiver() {
        let mut root = NodeData::container("root");
        root.mesh = Some(mesh(vec![primitive(Some(0))]));
        let mut data = SceneData {
            root,
            materials: vec![MaterialData {
                name: "Red".to_string(),
                base_color: [1.0, 0.0, 0.0, 1.0],
                roughness: 0.3,
                metallic: 0.0,
                texture: None,
            }],
            animations: Vec::new(),
        };
        apply_material_policy(&mut data);
        let mesh = data.root.mesh.as_ref().unwrap();
        assert!(mesh.cast_shadow);
        assert!(mesh.receive_shadow);
        // No material was missing, so no default got appended.
        assert_eq!(data.materials.len(), 1);
    }

    #[test]
    fn model_transform_matches_the_fixed_placement() {
        let transform = model_transform();
        assert_eq!(transform.position, cgmath::Vector3::new(0.0, 1.0, 0.0));
        assert_eq!(
            transform.scale,
            cgmath::Vector3::new(MODEL_SCALE, MODEL_SCALE, MODEL_SCALE)
        );
    }
}
