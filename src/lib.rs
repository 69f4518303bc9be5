//! orbit-viewer
//!
//! A minimal cross-platform viewer for a single animated, Draco-compressed
//! glTF asset. The window comes up immediately on a grey background, a fixed
//! three-light rig with two shadow maps lights the scene, and a damped orbit
//! controller moves the camera while the asset streams in concurrently.
//!
//! High-level modules
//! - `animation`: channel clips and the mixer that drives node transforms
//! - `app`: the winit application shell and event loop
//! - `camera`: camera, projection and the damped orbit controller
//! - `context`: central GPU and window context that owns device/queue/pipelines
//! - `data_structures`: scene data models (meshes, materials, transforms)
//! - `lights`: the fixed spot/ambient/directional rig and its shadow maps
//! - `pipelines`: the lit main pipeline and the depth-only shadow pipeline
//! - `resources`: glTF loading, Draco decompression and progress reporting
//! - `scene`: model placement, material policy and the uploaded scene

pub mod animation;
pub mod app;
pub mod camera;
pub mod context;
pub mod data_structures;
pub mod lights;
pub mod pipelines;
pub mod resources;
pub mod scene;

/// The asset shown by the viewer, relative to the working directory.
pub const DEFAULT_ASSET: &str = "assets/LittlestTokyo.glb";

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() {
    if let Err(e) = app::run(DEFAULT_ASSET) {
        log::error!("viewer exited with an error: {e:#}");
    }
}
