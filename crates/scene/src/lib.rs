//! Scene graph shared by the reconciler, its disposers, and the renderers.
//!
//! # Invariants
//! - Only scene-entry disposers and the reconciler's factory add or remove
//!   primitives; renderers read the scene and never mutate it.
//! - Node ids are never reused within one scene.

mod camera;
mod color;
mod geometry;
mod graph;
mod renderer;

pub use camera::PerspectiveCamera;
pub use color::Color;
pub use geometry::{LineMaterial, WireframeSphere};
pub use graph::{Light, Node, NodeId, NodeKind, Primitive, Scene, SceneHandle};
pub use renderer::{DebugTextRenderer, Renderer};
