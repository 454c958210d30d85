use crate::color::Color;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::f32::consts::{PI, TAU};

/// Unlit line material.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineMaterial {
    pub color: Color,
    pub opacity: f32,
    pub transparent: bool,
    /// When false, lines draw over everything regardless of depth.
    pub depth_test: bool,
}

impl LineMaterial {
    /// Alpha actually used for blending.
    pub fn alpha(&self) -> f32 {
        if self.transparent {
            self.opacity.clamp(0.0, 1.0)
        } else {
            1.0
        }
    }
}

impl Default for LineMaterial {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            opacity: 1.0,
            transparent: false,
            depth_test: true,
        }
    }
}

/// Wireframe of a UV sphere centred on its node's position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireframeSphere {
    pub radius: f32,
    pub width_segments: u32,
    pub height_segments: u32,
    pub material: LineMaterial,
}

impl Default for WireframeSphere {
    /// Half-transparent red sphere of radius 3 that ignores depth.
    fn default() -> Self {
        Self {
            radius: 3.0,
            width_segments: 8,
            height_segments: 8,
            material: LineMaterial {
                color: Color::from_hex(0xff0000),
                opacity: 0.5,
                transparent: true,
                depth_test: false,
            },
        }
    }
}

impl WireframeSphere {
    pub const MIN_WIDTH_SEGMENTS: u32 = 3;
    pub const MIN_HEIGHT_SEGMENTS: u32 = 2;
    pub const MAX_SEGMENTS: u32 = 256;

    /// Every distinct triangle edge of the sphere mesh, in local space.
    ///
    /// Segment counts are clamped to `MIN_*_SEGMENTS..=MAX_SEGMENTS`.
    pub fn line_segments(&self) -> Vec<[Vec3; 2]> {
        let w = self
            .width_segments
            .clamp(Self::MIN_WIDTH_SEGMENTS, Self::MAX_SEGMENTS);
        let h = self
            .height_segments
            .clamp(Self::MIN_HEIGHT_SEGMENTS, Self::MAX_SEGMENTS);

        let mut vertices = Vec::with_capacity(((w + 1) * (h + 1)) as usize);
        for iy in 0..=h {
            let v = iy as f32 / h as f32;
            for ix in 0..=w {
                let u = ix as f32 / w as f32;
                vertices.push(Vec3::new(
                    -self.radius * (u * TAU).cos() * (v * PI).sin(),
                    self.radius * (v * PI).cos(),
                    self.radius * (u * TAU).sin() * (v * PI).sin(),
                ));
            }
        }

        let index = |ix: u32, iy: u32| iy * (w + 1) + ix;
        let mut seen = BTreeSet::new();
        let mut edges = Vec::new();
        let mut push_triangle = |tri: [u32; 3]| {
            for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
                let key = (a.min(b), a.max(b));
                if seen.insert(key) {
                    edges.push(key);
                }
            }
        };

        for iy in 0..h {
            for ix in 0..w {
                let a = index(ix + 1, iy);
                let b = index(ix, iy);
                let c = index(ix, iy + 1);
                let d = index(ix + 1, iy + 1);
                // The poles collapse one triangle of each quad.
                if iy != 0 {
                    push_triangle([a, b, d]);
                }
                if iy != h - 1 {
                    push_triangle([b, c, d]);
                }
            }
        }

        edges
            .into_iter()
            .map(|(a, b)| [vertices[a as usize], vertices[b as usize]])
            .collect()
    }
}
