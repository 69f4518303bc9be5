use std::sync::Arc;

use winit::window::Window;

use crate::{
    camera::{self, CameraResources, Projection},
    data_structures::texture::Texture,
    lights::LightsRig,
    pipelines::{
        basic::{MSAA_SAMPLE_COUNT, mk_main_pipeline},
        shadow::mk_shadow_pipeline,
    },
    scene::Scene,
};

/// Initial camera pose.
pub const CAMERA_POSITION: (f32, f32, f32) = (4.0, 8.0, 11.0);
pub const CAMERA_TARGET: (f32, f32, f32) = (0.0, 1.0, 0.0);
pub const CAMERA_FOVY_DEG: f32 = 45.0;
pub const CAMERA_ZNEAR: f32 = 1.0;
pub const CAMERA_ZFAR: f32 = 2000.0;

/// Background 0xA6A6A6, converted to linear for the sRGB surface.
const CLEAR_COLOR_SRGB: f64 = 166.0 / 255.0;

fn srgb_to_linear(channel: f64) -> f64 {
    if channel <= 0.04045 {
        channel / 12.92
    } else {
        ((channel + 0.055) / 1.055).powf(2.4)
    }
}

/// Everything the render loop needs: surface, device, targets, camera, the
/// light rig and the loaded scene.
pub struct Context {
    pub window: Arc<Window>,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    depth_texture: Texture,
    msaa_texture: Texture,
    pub camera: CameraResources,
    pub projection: Projection,
    pub lights: LightsRig,
    pub scene: Scene,
    main_pipeline: wgpu::RenderPipeline,
    shadow_pipeline: wgpu::RenderPipeline,
    clear_color: wgpu::Color,
}

impl Context {
    pub async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let size = window.inner_size();

        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        log::info!("device and queue");
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                // WebGL doesn't support all of wgpu's features, so if
                // we're building for the web we'll have to disable some.
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;

        log::info!("surface");
        let surface_caps = surface.get_capabilities(&adapter);
        // The shader assumes an sRGB surface; a linear one would come out too
        // dark.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(surface_caps.formats[0]);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let camera = camera::Camera::new(CAMERA_POSITION, CAMERA_TARGET);
        let projection = Projection::new(
            config.width,
            config.height,
            cgmath::Deg(CAMERA_FOVY_DEG),
            CAMERA_ZNEAR,
            CAMERA_ZFAR,
        );
        let camera = CameraResources::new(&device, camera, &projection);

        let depth_texture = Texture::create_depth_texture(
            &device,
            [config.width, config.height],
            MSAA_SAMPLE_COUNT,
            "depth_texture",
        );
        let msaa_texture =
            Texture::create_msaa_texture(&device, &config, MSAA_SAMPLE_COUNT, "msaa_texture");

        let lights = LightsRig::new(&device);
        let scene = Scene::new(&device);

        let main_pipeline = mk_main_pipeline(
            &device,
            &config,
            &scene.material_bind_group_layout,
            &camera.bind_group_layout,
            &lights.bind_group_layout,
            &lights.shadow_bind_group_layout,
        );
        let shadow_pipeline = mk_shadow_pipeline(&device, &lights.caster_bind_group_layout);

        let srgb = srgb_to_linear(CLEAR_COLOR_SRGB);
        let clear_color = wgpu::Color {
            r: srgb,
            g: srgb,
            b: srgb,
            a: 1.0,
        };

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            depth_texture,
            msaa_texture,
            camera,
            projection,
            lights,
            scene,
            main_pipeline,
            shadow_pipeline,
            clear_color,
        })
    }

    /// Reconfigure the surface and rebuild the size-dependent targets.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.projection.resize(width, height);
        self.depth_texture = Texture::create_depth_texture(
            &self.device,
            [width, height],
            MSAA_SAMPLE_COUNT,
            "depth_texture",
        );
        self.msaa_texture = Texture::create_msaa_texture(
            &self.device,
            &self.config,
            MSAA_SAMPLE_COUNT,
            "msaa_texture",
        );
    }

    /// Advance one frame and draw it: animation and camera update, the two
    /// shadow passes, then the lit multisampled main pass.
    pub fn render(&mut self, dt: f32) -> Result<(), wgpu::SurfaceError> {
        self.scene.update(&self.queue, dt);
        self.camera.update(&self.projection, &self.queue, dt);

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        for (shadow, label) in [
            (&self.lights.spot_shadow, "Spot Shadow Pass"),
            (&self.lights.directional_shadow, "Directional Shadow Pass"),
        ] {
            let mut shadow_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(label),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &shadow.texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            shadow_pass.set_pipeline(&self.shadow_pipeline);
            shadow_pass.set_bind_group(0, &shadow.bind_group, &[]);
            self.scene.draw_shadow(&mut shadow_pass);
        }

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Main Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.msaa_texture.view,
                    depth_slice: None,
                    resolve_target: Some(&view),
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Discard,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            render_pass.set_pipeline(&self.main_pipeline);
            self.scene.draw(
                &self.camera.bind_group,
                &self.lights.bind_group,
                &self.lights.shadow_bind_group,
                &mut render_pass,
            );
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}
