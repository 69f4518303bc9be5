//! Camera, projection and the damped orbit controller.
//!
//! The camera orbits a fixed point of interest. Input moves spherical target
//! coordinates (azimuth, polar angle, distance) and every frame the current
//! coordinates are damped towards those targets, so motion eases out smoothly
//! after the input stops.

use cgmath::{InnerSpace, Matrix4, Point3, Rad, SquareMatrix, Vector3, perspective};
use wgpu::util::DeviceExt;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

/// Orbit distance limits, world units.
pub const MIN_DISTANCE: f32 = 5.0;
pub const MAX_DISTANCE: f32 = 20.0;
/// Polar angle limits, radians from the +Y axis. Keeps the camera from
/// reaching the zenith or dipping below the ground plane.
pub const MIN_POLAR_ANGLE: f32 = 0.5;
pub const MAX_POLAR_ANGLE: f32 = 1.5;

/// Exponential damping rate in 1/s. Higher snaps faster.
const DAMPING_RATE: f32 = 3.0;
const ROTATE_SENSITIVITY: f32 = 0.005;
const ZOOM_STEP: f32 = 0.95;

/// cgmath projections target OpenGL clip space (z in -1..1); WGPU expects
/// z in 0..1.
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
}

impl Camera {
    pub fn new<P: Into<Point3<f32>>>(position: P, target: P) -> Self {
        Self {
            position: position.into(),
            target: target.into(),
        }
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.target, Vector3::unit_y())
    }
}

pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        self.view_position = camera.position.to_homogeneous().into();
        self.view_proj = (projection.calc_matrix() * camera.calc_matrix()).into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

/// Damped orbit control around a fixed target.
///
/// Left-drag rotates, the scroll wheel dollies. The target point itself never
/// moves; panning is deliberately not offered.
pub struct OrbitController {
    azimuth: f32,
    polar: f32,
    distance: f32,
    target_azimuth: f32,
    target_polar: f32,
    target_distance: f32,
    rotating: bool,
}

impl OrbitController {
    /// Derive the initial spherical coordinates from a camera pose.
    pub fn new(camera: &Camera) -> Self {
        let offset = camera.position - camera.target;
        let distance = offset.magnitude().clamp(MIN_DISTANCE, MAX_DISTANCE);
        let azimuth = offset.x.atan2(offset.z);
        let polar = (offset.y / offset.magnitude())
            .clamp(-1.0, 1.0)
            .acos()
            .clamp(MIN_POLAR_ANGLE, MAX_POLAR_ANGLE);
        Self {
            azimuth,
            polar,
            distance,
            target_azimuth: azimuth,
            target_polar: polar,
            target_distance: distance,
            rotating: false,
        }
    }

    /// Handle window-scoped input. Returns whether the event was consumed.
    pub fn process_window_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.rotating = *state == ElementState::Pressed;
                true
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 50.0,
                };
                self.target_distance = (self.target_distance * ZOOM_STEP.powf(steps))
                    .clamp(MIN_DISTANCE, MAX_DISTANCE);
                true
            }
            _ => false,
        }
    }

    /// Handle raw mouse motion; only applies while the left button is held.
    pub fn process_mouse(&mut self, dx: f64, dy: f64) {
        if !self.rotating {
            return;
        }
        self.target_azimuth -= dx as f32 * ROTATE_SENSITIVITY;
        self.target_polar = (self.target_polar - dy as f32 * ROTATE_SENSITIVITY)
            .clamp(MIN_POLAR_ANGLE, MAX_POLAR_ANGLE);
    }

    /// Step the damping and reposition the camera on its orbit sphere.
    pub fn update_camera(&mut self, camera: &mut Camera, dt: f32) {
        let alpha = 1.0 - (-DAMPING_RATE * dt).exp();
        self.azimuth += (self.target_azimuth - self.azimuth) * alpha;
        self.polar += (self.target_polar - self.polar) * alpha;
        self.distance += (self.target_distance - self.distance) * alpha;

        let offset = Vector3::new(
            self.distance * self.polar.sin() * self.azimuth.sin(),
            self.distance * self.polar.cos(),
            self.distance * self.polar.sin() * self.azimuth.cos(),
        );
        camera.position = camera.target + offset;
    }
}

/// Camera with all its GPU plumbing, grouped so the render context stays flat.
pub struct CameraResources {
    pub camera: Camera,
    pub controller: OrbitController,
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl CameraResources {
    pub fn new(device: &wgpu::Device, camera: Camera, projection: &Projection) -> Self {
        let controller = OrbitController::new(&camera);
        let mut uniform = CameraUniform::new();
        uniform.update_view_proj(&camera, projection);

        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
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
            label: Some("camera_bind_group_layout"),
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });

        Self {
            camera,
            controller,
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }

    /// Step the controller and push the refreshed view-projection to the GPU.
    pub fn update(&mut self, projection: &Projection, queue: &wgpu::Queue, dt: f32) {
        self.controller.update_camera(&mut self.camera, dt);
        self.uniform.update_view_proj(&self.camera, projection);
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Deg;

    fn camera() -> Camera {
        Camera::new((4.0, 8.0, 11.0), (0.0, 1.0, 0.0))
    }

    #[test]
    fn controller_starts_on_the_camera_pose() {
        let mut cam = camera();
        let mut controller = OrbitController::new(&cam);
        let before = cam.position;
        // With no input the damped state is already at its target.
        controller.update_camera(&mut cam, 1.0 / 60.0);
        let moved = (cam.position - before).magnitude();
        assert!(moved < 1e-4, "camera drifted by {moved} without input");
    }

    #[test]
    fn drag_orbits_towards_the_new_angle() {
        let mut cam = camera();
        let mut controller = OrbitController::new(&cam);
        let distance_before = (cam.position - cam.target).magnitude();

        controller.process_window_event(&WindowEvent::MouseInput {
            device_id: winit::event::DeviceId::dummy(),
            state: ElementState::Pressed,
            button: MouseButton::Left,
        });
        controller.process_mouse(120.0, 0.0);
        for _ in 0..600 {
            controller.update_camera(&mut cam, 1.0 / 60.0);
        }

        let distance_after = (cam.position - cam.target).magnitude();
        assert!((distance_before - distance_after).abs() < 1e-3);
        assert_eq!(cam.target, Point3::new(0.0, 1.0, 0.0));
        // Azimuth moved, so the position must have changed.
        assert!((cam.position - Point3::new(4.0, 8.0, 11.0)).magnitude() > 0.5);
    }

    #[test]
    fn dolly_clamps_to_the_distance_range() {
        let mut cam = camera();
        let mut controller = OrbitController::new(&cam);
        for _ in 0..200 {
            controller.process_window_event(&WindowEvent::MouseWheel {
                device_id: winit::event::DeviceId::dummy(),
                delta: MouseScrollDelta::LineDelta(0.0, 10.0),
                phase: winit::event::TouchPhase::Moved,
            });
        }
        for _ in 0..600 {
            controller.update_camera(&mut cam, 1.0 / 60.0);
        }
        let distance = (cam.position - cam.target).magnitude();
        assert!((distance - MIN_DISTANCE).abs() < 1e-2);
    }

    #[test]
    fn polar_angle_never_leaves_its_clamp() {
        let mut cam = camera();
        let mut controller = OrbitController::new(&cam);
        controller.process_window_event(&WindowEvent::MouseInput {
            device_id: winit::event::DeviceId::dummy(),
            state: ElementState::Pressed,
            button: MouseButton::Left,
        });
        // Drag far past the zenith.
        controller.process_mouse(0.0, -10_000.0);
        for _ in 0..600 {
            controller.update_camera(&mut cam, 1.0 / 60.0);
        }
        let offset = cam.position - cam.target;
        let polar = (offset.y / offset.magnitude()).acos();
        assert!(polar >= MIN_POLAR_ANGLE - 1e-3 && polar <= MAX_POLAR_ANGLE + 1e-3);
    }

    #[test]
    fn projection_resize_updates_aspect() {
        let mut projection = Projection::new(800, 600, Deg(45.0), 1.0, 2000.0);
        let before = projection.calc_matrix();
        projection.resize(400, 600);
        assert_ne!(before, projection.calc_matrix());
    }
}
