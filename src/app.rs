//! Application shell and event loop.
//!
//! The window and GPU context come up immediately and the render loop starts
//! on the grey background; the asset loads concurrently (a tokio task native,
//! a local future on web) and is delivered back to the event loop as a user
//! event. Input, resize and redraw all run through the winit
//! [`ApplicationHandler`].

use std::sync::Arc;

use instant::Instant;
use winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, DeviceId, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::Window,
};

use crate::{context::Context, data_structures::scene_graph::SceneData, resources::load_scene};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

const WINDOW_TITLE: &str = "orbit-viewer";

/// Events delivered to the loop from outside it.
pub enum ViewerEvent {
    /// Web only: the context finished initializing inside `spawn_local`.
    #[allow(dead_code)]
    Initialized(AppState),
    /// Asset download progress in bytes; `total` is 0 when unknown.
    Progress { loaded: u64, total: u64 },
    /// The asset load finished, one way or the other.
    Loaded(anyhow::Result<SceneData>),
}

/// Visibility state of the "loading" hint shown until the model is in.
///
/// Hidden exactly once on load success, never re-shown; a failed load leaves
/// it visible. Presentation (the window title natively, the overlay element
/// the page provides on web) reacts to the transitions reported here.
struct LoadingIndicator {
    visible: bool,
}

impl LoadingIndicator {
    fn new() -> Self {
        Self { visible: true }
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    /// Record the load outcome. Returns true when the presentation should
    /// run its hide path, which happens exactly once and only on success.
    fn load_finished(&mut self, success: bool) -> bool {
        if !success {
            return false;
        }
        let was_visible = self.visible;
        self.visible = false;
        was_visible
    }
}

fn present_progress(window: &Window, loaded: u64, total: u64) {
    if total > 0 {
        let percent = loaded * 100 / total;
        log::info!("loading: {percent}% ({loaded}/{total} bytes)");
        #[cfg(not(target_arch = "wasm32"))]
        window.set_title(&format!("{WINDOW_TITLE} — loading {percent}%"));
    } else {
        log::info!("loading: {loaded} bytes");
    }
    #[cfg(target_arch = "wasm32")]
    let _ = window;
}

fn present_hidden(window: &Window) {
    #[cfg(not(target_arch = "wasm32"))]
    window.set_title(WINDOW_TITLE);
    #[cfg(target_arch = "wasm32")]
    {
        let _ = window;
        if let Some(element) = web_sys::window()
            .and_then(|w| w.document())
            .and_then(|d| d.get_element_by_id("loading"))
        {
            let _ = element.set_attribute("style", "display: none;");
        }
    }
}

/// GPU context plus surface status.
pub struct AppState {
    ctx: Context,
    is_surface_configured: bool,
}

impl AppState {
    async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let ctx = Context::new(window).await?;
        Ok(Self {
            ctx,
            is_surface_configured: false,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.is_surface_configured = true;
            self.ctx.resize(width, height);
        }
    }

    fn render(&mut self, dt: f32) -> Result<(), wgpu::SurfaceError> {
        // Rendering requires the surface to be configured.
        if !self.is_surface_configured {
            return Ok(());
        }
        self.ctx.render(dt)
    }
}

pub struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: EventLoopProxy<ViewerEvent>,
    state: Option<AppState>,
    asset_path: String,
    indicator: LoadingIndicator,
    last_time: Instant,
}

impl App {
    fn new(
        event_loop: &EventLoop<ViewerEvent>,
        asset_path: &str,
    ) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        #[cfg(not(target_arch = "wasm32"))]
        let async_runtime = tokio::runtime::Runtime::new()?;
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime,
            proxy,
            state: None,
            asset_path: asset_path.to_string(),
            indicator: LoadingIndicator::new(),
            last_time: Instant::now(),
        })
    }

    /// Kick off the asset load; completion and progress come back as user
    /// events so all state stays on the event loop.
    fn spawn_load(&self) {
        let path = self.asset_path.clone();
        let proxy = self.proxy.clone();
        let progress_proxy = self.proxy.clone();
        let load = async move {
            let result = load_scene(&path, move |loaded, total| {
                let _ = progress_proxy.send_event(ViewerEvent::Progress { loaded, total });
            })
            .await;
            if proxy.send_event(ViewerEvent::Loaded(result)).is_err() {
                log::warn!("event loop closed before the asset load finished");
            }
        };

        #[cfg(not(target_arch = "wasm32"))]
        self.async_runtime.spawn(load);

        #[cfg(target_arch = "wasm32")]
        wasm_bindgen_futures::spawn_local(load);
    }

    fn attach_loaded(&mut self, result: anyhow::Result<SceneData>) {
        let Some(state) = &mut self.state else {
            return;
        };
        let outcome = result.and_then(|data| {
            state
                .ctx
                .scene
                .attach_model(data, &state.ctx.device, &state.ctx.queue)
        });
        match &outcome {
            Ok(()) => log::info!("model ready"),
            // The viewer keeps running on the empty scene; the indicator
            // stays up.
            Err(e) => log::error!("failed to load {}: {e:#}", self.asset_path),
        }
        if self.indicator.load_finished(outcome.is_ok()) {
            present_hidden(&state.ctx.window);
        }
    }
}

impl ApplicationHandler<ViewerEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title(WINDOW_TITLE);

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let window = wgpu::web_sys::window().unwrap_throw();
            let document = window.document().unwrap_throw();
            let canvas = document.get_element_by_id(CANVAS_ID).unwrap_throw();
            let html_canvas_element = canvas.unchecked_into();
            window_attributes = window_attributes.with_canvas(Some(html_canvas_element));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("could not create a window: {e}");
                event_loop.exit();
                return;
            }
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            match self.async_runtime.block_on(AppState::new(window)) {
                Ok(mut state) => {
                    let size = state.ctx.window.inner_size();
                    state.resize(size.width, size.height);
                    self.state = Some(state);
                    self.spawn_load();
                    self.last_time = Instant::now();
                }
                Err(e) => {
                    log::error!("initialization failed: {e:#}");
                    event_loop.exit();
                }
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                match AppState::new(window).await {
                    Ok(state) => {
                        assert!(proxy.send_event(ViewerEvent::Initialized(state)).is_ok())
                    }
                    Err(e) => log::error!("initialization failed: {e:#}"),
                }
            });
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            ViewerEvent::Initialized(mut state) => {
                // This is the message from our wasm `spawn_local`. Trigger a
                // resize and redraw now that we are initialized.
                let size = state.ctx.window.inner_size();
                state.resize(size.width, size.height);
                state.ctx.window.request_redraw();
                self.state = Some(state);
                self.spawn_load();
                self.last_time = Instant::now();
            }
            ViewerEvent::Progress { loaded, total } => {
                if let Some(state) = &self.state
                    && self.indicator.is_visible()
                {
                    present_progress(&state.ctx.window, loaded, total);
                }
            }
            ViewerEvent::Loaded(result) => self.attach_loaded(result),
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        let Some(state) = &mut self.state else {
            return;
        };
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            state.ctx.camera.controller.process_mouse(dx, dy);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = &mut self.state else {
            return;
        };

        state.ctx.camera.controller.process_window_event(&event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => state.resize(size.width, size.height),
            WindowEvent::RedrawRequested => {
                state.ctx.window.request_redraw();

                let dt = self.last_time.elapsed().as_secs_f32();
                self.last_time = Instant::now();

                match state.render(dt) {
                    Ok(()) => {}
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = state.ctx.window.inner_size();
                        state.resize(size.width, size.height);
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("out of GPU memory, exiting");
                        event_loop.exit();
                    }
                    Err(e) => log::error!("unable to render: {e}"),
                }
            }
            _ => {}
        }
    }
}

/// Build the event loop and run the viewer on the given asset.
pub fn run(asset_path: &str) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {e}");
        }
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_log::init_with_level(log::Level::Info).unwrap_throw();
    }

    let event_loop: EventLoop<ViewerEvent> = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop, asset_path)?;
    event_loop.run_app(&mut app)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_starts_visible() {
        assert!(LoadingIndicator::new().is_visible());
    }

    #[test]
    fn indicator_hides_exactly_once_on_success() {
        let mut indicator = LoadingIndicator::new();
        assert!(indicator.load_finished(true));
        assert!(!indicator.is_visible());
        // A later outcome reports no transition and never re-shows it.
        assert!(!indicator.load_finished(true));
        assert!(!indicator.load_finished(false));
        assert!(!indicator.is_visible());
    }

    #[test]
    fn indicator_stays_visible_when_the_load_fails() {
        let mut indicator = LoadingIndicator::new();
        assert!(!indicator.load_finished(false));
        assert!(indicator.is_visible());
        // Only a success afterwards hides it.
        assert!(indicator.load_finished(true));
        assert!(!indicator.is_visible());
    }
}
