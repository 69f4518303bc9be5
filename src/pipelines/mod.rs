//! Render pipelines and their WGSL shaders.

pub mod basic;
pub mod shadow;
