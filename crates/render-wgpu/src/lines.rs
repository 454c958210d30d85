use bytemuck::{Pod, Zeroable};
use scenesync_scene::{NodeKind, Scene};

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

/// World-space line vertices for one frame, split by depth mode.
#[derive(Debug, Default)]
pub struct LineBatch {
    /// Lines that respect the depth buffer.
    pub depth_tested: Vec<LineVertex>,
    /// Lines drawn over everything.
    pub overlay: Vec<LineVertex>,
}

impl LineBatch {
    /// Collect every primitive in the scene, offset by its node position.
    pub fn from_scene(scene: &Scene) -> Self {
        let mut batch = Self::default();
        for (_, node) in scene.iter() {
            let NodeKind::Primitive(primitive) = &node.kind else {
                continue;
            };
            let material = primitive.material();
            let color = material.color.to_array(material.alpha());
            let target = if material.depth_test {
                &mut batch.depth_tested
            } else {
                &mut batch.overlay
            };
            for [a, b] in primitive.line_segments() {
                for p in [a, b] {
                    target.push(LineVertex {
                        position: (p + node.position).to_array(),
                        color,
                    });
                }
            }
        }
        batch
    }

    pub fn vertex_count(&self) -> usize {
        self.depth_tested.len() + self.overlay.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_count() == 0
    }

    /// Keep at most `max` vertices, whole lines only, preferring depth-tested ones.
    pub fn truncate(&mut self, max: usize) {
        let max = max - max % 2;
        if self.depth_tested.len() >= max {
            self.depth_tested.truncate(max);
            self.overlay.clear();
        } else {
            let left = max - self.depth_tested.len();
            self.overlay.truncate(left);
        }
    }
}
