use anyhow::{Context, Result, ensure};
use scenesync_scene::{PerspectiveCamera, WireframeSphere};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Viewer settings. Every field is optional in the file.
///
/// ```json
/// { "camera": { "fov_degrees": 60.0 }, "sphere": { "radius": 1.5 } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerConfig {
    pub camera: PerspectiveCamera,
    pub sphere: WireframeSphere,
}

impl ViewerConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).context("invalid viewer config")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the camera or sphere geometry cannot use.
    pub fn validate(&self) -> Result<()> {
        let sphere = &self.sphere;
        let max = WireframeSphere::MAX_SEGMENTS;
        ensure!(
            (WireframeSphere::MIN_WIDTH_SEGMENTS..=max).contains(&sphere.width_segments),
            "sphere.width_segments must be in {}..={max}, got {}",
            WireframeSphere::MIN_WIDTH_SEGMENTS,
            sphere.width_segments
        );
        ensure!(
            (WireframeSphere::MIN_HEIGHT_SEGMENTS..=max).contains(&sphere.height_segments),
            "sphere.height_segments must be in {}..={max}, got {}",
            WireframeSphere::MIN_HEIGHT_SEGMENTS,
            sphere.height_segments
        );
        ensure!(
            sphere.radius.is_finite() && sphere.radius > 0.0,
            "sphere.radius must be positive, got {}",
            sphere.radius
        );

        let camera = &self.camera;
        ensure!(
            camera.fov_degrees > 0.0 && camera.fov_degrees < 180.0,
            "camera.fov_degrees must be in (0, 180), got {}",
            camera.fov_degrees
        );
        ensure!(
            camera.near > 0.0 && camera.far > camera.near && camera.far.is_finite(),
            "camera.near/far must satisfy 0 < near < far, got {}/{}",
            camera.near,
            camera.far
        );
        Ok(())
    }

    /// Load from `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::from_json(&text)?;
        tracing::info!("loaded config from {}", path.display());
        Ok(config)
    }
}
