use crate::camera::PerspectiveCamera;
use crate::graph::{Light, Primitive, Scene};

/// A renderer that needs nothing beyond the scene and a camera.
///
/// GPU backends take their device and target per frame and do not fit this
/// shape; they follow the same rule of never mutating the scene. Only
/// scene-entry factories and disposers do that.
pub trait Renderer {
    /// The output type produced by this renderer.
    type Output;

    /// Render one frame of the scene as seen from `camera`.
    fn render(&self, scene: &Scene, camera: &PerspectiveCamera) -> Self::Output;
}

/// Plain-text scene dump, logged after reconcile passes at trace level.
#[derive(Debug, Default)]
pub struct DebugTextRenderer;

impl DebugTextRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for DebugTextRenderer {
    type Output = String;

    fn render(&self, scene: &Scene, camera: &PerspectiveCamera) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "=== Scene (nodes={}, primitives={}) ===\n",
            scene.len(),
            scene.primitive_count()
        ));
        out.push_str(&format!(
            "Camera: eye=({:.1}, {:.1}, {:.1}) target=({:.1}, {:.1}, {:.1}) fov={:.0}\n",
            camera.position.x,
            camera.position.y,
            camera.position.z,
            camera.target.x,
            camera.target.y,
            camera.target.z,
            camera.fov_degrees
        ));

        for (id, position, light) in scene.lights() {
            let (kind, intensity) = match light {
                Light::Ambient { intensity, .. } => ("ambient", intensity),
                Light::Hemisphere { intensity, .. } => ("hemisphere", intensity),
                Light::Directional { intensity, .. } => ("directional", intensity),
            };
            out.push_str(&format!(
                "  light #{} {kind} i={intensity:.2} pos=({:.1}, {:.1}, {:.1})\n",
                id.raw(),
                position.x,
                position.y,
                position.z
            ));
        }

        for (id, p, primitive) in scene.primitives() {
            match primitive {
                Primitive::WireframeSphere(sphere) => out.push_str(&format!(
                    "  sphere #{} r={:.1} pos=({:.2}, {:.2}, {:.2})\n",
                    id.raw(),
                    sphere.radius,
                    p.x,
                    p.y,
                    p.z
                )),
            }
        }

        out
    }
}
