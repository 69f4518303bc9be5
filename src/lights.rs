//! The fixed three-light rig and its shadow resources.
//!
//! One spot light above the scene, a soft ambient term and a cool-tinted
//! directional light. The rig is built once at startup and never changes, so
//! everything lives in a single uniform block; only the shadow maps are
//! re-rendered each frame.

use cgmath::{InnerSpace, Matrix4, Point3, Rad, Vector3, ortho, perspective};
use wgpu::util::DeviceExt;

use crate::{camera::OPENGL_TO_WGPU_MATRIX, data_structures::texture::Texture};

pub const SPOT_POSITION: [f32; 3] = [0.0, 30.0, 0.0];
pub const SPOT_COLOR: [f32; 3] = [1.0, 1.0, 1.0];
pub const SPOT_INTENSITY: f32 = 1500.0;
/// Cone half-angle in radians.
pub const SPOT_ANGLE: f32 = std::f32::consts::FRAC_PI_3;
pub const SPOT_PENUMBRA: f32 = 0.05;

pub const AMBIENT_COLOR: [f32; 3] = [1.0, 1.0, 1.0];
pub const AMBIENT_INTENSITY: f32 = 1.0;

/// 0x8BACCF, a cold sky tint.
pub const DIRECTIONAL_COLOR: [f32; 3] = [0x8B as f32 / 255.0, 0xAC as f32 / 255.0, 0xCF as f32 / 255.0];
pub const DIRECTIONAL_INTENSITY: f32 = 3.0;
pub const DIRECTIONAL_POSITION: [f32; 3] = [100.0, 100.0, 100.0];

pub const SHADOW_MAP_SIZE: u32 = 2048;
pub const SHADOW_BIAS: f32 = -0.001;
pub const EXPOSURE: f32 = 1.5;

/// GPU block for the whole rig. vec3 fields are padded to 16 bytes by the
/// scalar that follows them, matching the WGSL struct layout.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightsUniform {
    spot_view_proj: [[f32; 4]; 4],
    directional_view_proj: [[f32; 4]; 4],
    spot_position: [f32; 3],
    spot_intensity: f32,
    spot_color: [f32; 3],
    spot_cos_outer: f32,
    ambient_color: [f32; 3],
    spot_cos_inner: f32,
    directional_color: [f32; 3],
    ambient_intensity: f32,
    directional_direction: [f32; 3],
    directional_intensity: f32,
    shadow_bias: f32,
    exposure: f32,
    _padding: [f32; 2],
}

impl LightsUniform {
    fn new(spot_view_proj: Matrix4<f32>, directional_view_proj: Matrix4<f32>) -> Self {
        let direction = (Point3::from(DIRECTIONAL_POSITION) - Point3::new(0.0, 0.0, 0.0))
            .normalize();
        Self {
            spot_view_proj: spot_view_proj.into(),
            directional_view_proj: directional_view_proj.into(),
            spot_position: SPOT_POSITION,
            spot_intensity: SPOT_INTENSITY,
            spot_color: SPOT_COLOR,
            spot_cos_outer: SPOT_ANGLE.cos(),
            ambient_color: AMBIENT_COLOR,
            spot_cos_inner: (SPOT_ANGLE * (1.0 - SPOT_PENUMBRA)).cos(),
            directional_color: DIRECTIONAL_COLOR,
            ambient_intensity: AMBIENT_INTENSITY,
            // Direction light travels: from the light towards the origin.
            directional_direction: (-direction).into(),
            directional_intensity: DIRECTIONAL_INTENSITY,
            shadow_bias: SHADOW_BIAS,
            exposure: EXPOSURE,
            _padding: [0.0; 2],
        }
    }
}

/// Depth map of one shadow-casting light plus the caster's view-projection
/// uniform the depth pass renders with.
pub struct ShadowMap {
    pub texture: Texture,
    #[allow(unused)]
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

impl ShadowMap {
    fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        view_proj: Matrix4<f32>,
        label: &str,
    ) -> Self {
        let texture = Texture::create_shadow_map(device, SHADOW_MAP_SIZE, label);
        let view_proj: [[f32; 4]; 4] = view_proj.into();
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} Caster Buffer")),
            contents: bytemuck::cast_slice(&[view_proj]),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some(&format!("{label} Caster Bind Group")),
        });
        Self {
            texture,
            buffer,
            bind_group,
        }
    }
}

pub struct LightsRig {
    #[allow(unused)]
    pub uniform: LightsUniform,
    #[allow(unused)]
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
    pub spot_shadow: ShadowMap,
    pub directional_shadow: ShadowMap,
    /// Layout of the per-caster uniform the shadow pipeline renders with.
    pub caster_bind_group_layout: wgpu::BindGroupLayout,
    /// Both depth maps plus the comparison sampler, bound in the main pass.
    pub shadow_bind_group: wgpu::BindGroup,
    pub shadow_bind_group_layout: wgpu::BindGroupLayout,
}

impl LightsRig {
    pub fn new(device: &wgpu::Device) -> Self {
        let spot_view_proj = mk_spot_view_proj();
        let directional_view_proj = mk_directional_view_proj();
        let uniform = LightsUniform::new(spot_view_proj, directional_view_proj);

        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Lights Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
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
            label: Some("lights_bind_group_layout"),
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("lights_bind_group"),
        });

        let caster_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
                label: Some("shadow_caster_bind_group_layout"),
            });

        let spot_shadow = ShadowMap::new(
            device,
            &caster_bind_group_layout,
            spot_view_proj,
            "Spot Shadow Map",
        );
        let directional_shadow = ShadowMap::new(
            device,
            &caster_bind_group_layout,
            directional_view_proj,
            "Directional Shadow Map",
        );

        let shadow_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Shadow Comparison Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        let shadow_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            multisampled: false,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            sample_type: wgpu::TextureSampleType::Depth,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            multisampled: false,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            sample_type: wgpu::TextureSampleType::Depth,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                        count: None,
                    },
                ],
                label: Some("shadow_bind_group_layout"),
            });
        let shadow_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &shadow_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&spot_shadow.texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&directional_shadow.texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&shadow_sampler),
                },
            ],
            label: Some("shadow_bind_group"),
        });

        Self {
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
            spot_shadow,
            directional_shadow,
            caster_bind_group_layout,
            shadow_bind_group,
            shadow_bind_group_layout,
        }
    }
}

/// Perspective projection from the spot light down onto the scene.
fn mk_spot_view_proj() -> Matrix4<f32> {
    // Looking straight down, so up cannot be +Y.
    let view = Matrix4::look_at_rh(
        Point3::from(SPOT_POSITION),
        Point3::new(0.0, 0.0, 0.0),
        Vector3::unit_z(),
    );
    let proj = perspective(Rad(2.0 * SPOT_ANGLE), 1.0, 0.5, 100.0);
    OPENGL_TO_WGPU_MATRIX * proj * view
}

/// Orthographic projection along the directional light. The extent generously
/// covers the model's neighbourhood around the origin.
fn mk_directional_view_proj() -> Matrix4<f32> {
    let view = Matrix4::look_at_rh(
        Point3::from(DIRECTIONAL_POSITION),
        Point3::new(0.0, 0.0, 0.0),
        Vector3::unit_y(),
    );
    let proj = ortho(-10.0, 10.0, -10.0, 10.0, 0.1, 400.0);
    OPENGL_TO_WGPU_MATRIX * proj * view
}
