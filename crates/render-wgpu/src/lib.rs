//! wgpu render backend for the scene graph.
//!
//! Draws every wireframe primitive as a line list. Primitives whose material
//! disables depth testing are drawn last, over everything else.
//!
//! # Invariants
//! - Renderer never mutates the scene.
//! - Vertex data is rebuilt from the scene every frame; nothing is cached
//!   across reconciliation passes.

mod gpu;
mod lines;
mod shaders;

pub use gpu::WgpuRenderer;
pub use lines::{LineBatch, LineVertex};
