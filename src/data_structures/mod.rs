//! Core data types for scene representation:
//!
//! - `model` contains mesh and material definitions, GPU resources for 3D models
//! - `texture` contains GPU texture wrapper and creation utilities
//! - `transform` holds per-node transformation data and its GPU layout
//! - `scene_graph` enables hierarchical scene organization

pub mod model;
pub mod scene_graph;
pub mod texture;
pub mod transform;
