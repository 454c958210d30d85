use crate::color::Color;
use crate::geometry::{LineMaterial, WireframeSphere};
use glam::Vec3;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Shared, single-threaded handle to a scene. Factories, disposers and the
/// renderer each hold one; borrows must not outlive a single call.
pub type SceneHandle = Rc<RefCell<Scene>>;

/// Identifier of a node within one [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Light {
    Ambient {
        color: Color,
        intensity: f32,
    },
    /// Sky colour from above, ground colour from below.
    Hemisphere {
        sky: Color,
        ground: Color,
        intensity: f32,
    },
    /// Parallel light shining from the node's position toward the origin.
    Directional {
        color: Color,
        intensity: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Primitive {
    WireframeSphere(WireframeSphere),
}

impl Primitive {
    /// Line segments in local space.
    pub fn line_segments(&self) -> Vec<[Vec3; 2]> {
        match self {
            Primitive::WireframeSphere(sphere) => sphere.line_segments(),
        }
    }

    pub fn material(&self) -> &LineMaterial {
        match self {
            Primitive::WireframeSphere(sphere) => &sphere.material,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeKind {
    Light(Light),
    Primitive(Primitive),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    pub position: Vec3,
    pub kind: NodeKind,
}

impl Node {
    pub fn light(light: Light, position: Vec3) -> Self {
        Self {
            position,
            kind: NodeKind::Light(light),
        }
    }

    pub fn primitive(primitive: Primitive, position: Vec3) -> Self {
        Self {
            position,
            kind: NodeKind::Primitive(primitive),
        }
    }
}

/// Flat scene graph.
///
/// Uses BTreeMap so iteration (and therefore draw order) follows insertion.
#[derive(Debug, Default)]
pub struct Scene {
    nodes: BTreeMap<NodeId, Node>,
    next_id: u64,
}

impl Scene {
    /// Create an empty scene with no lights.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scene with the demo light rig: a warm ambient fill, a hemisphere light
    /// overhead and a directional key light from the upper left.
    pub fn with_default_lighting() -> Self {
        let mut scene = Self::new();
        scene.add(Node::light(
            Light::Ambient {
                color: Color::from_hsl(0.1, 1.0, 0.95),
                intensity: 0.35,
            },
            Vec3::ZERO,
        ));
        scene.add(Node::light(
            Light::Hemisphere {
                sky: Color::from_hsl(0.6, 1.0, 0.95),
                ground: Color::from_hsl(0.095, 1.0, 0.75),
                intensity: 0.5,
            },
            Vec3::new(0.0, 0.0, 500.0),
        ));
        scene.add(Node::light(
            Light::Directional {
                color: Color::from_hsl(0.1, 1.0, 0.95),
                intensity: 0.65,
            },
            Vec3::new(-1.0, 1.0, 1.0) * 50.0,
        ));
        scene
    }

    /// Wrap into a shareable handle.
    pub fn into_handle(self) -> SceneHandle {
        Rc::new(RefCell::new(self))
    }

    pub fn add(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, node);
        tracing::trace!("scene add node {}", id.0);
        id
    }

    /// Detach a node. Returns it if it was present.
    pub fn remove(&mut self, id: NodeId) -> Option<Node> {
        let node = self.nodes.remove(&id);
        if node.is_some() {
            tracing::trace!("scene remove node {}", id.0);
        }
        node
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.nodes.iter().map(|(id, node)| (*id, node))
    }

    pub fn primitives(&self) -> impl Iterator<Item = (NodeId, Vec3, &Primitive)> + '_ {
        self.iter().filter_map(|(id, node)| match &node.kind {
            NodeKind::Primitive(p) => Some((id, node.position, p)),
            NodeKind::Light(_) => None,
        })
    }

    pub fn lights(&self) -> impl Iterator<Item = (NodeId, Vec3, &Light)> + '_ {
        self.iter().filter_map(|(id, node)| match &node.kind {
            NodeKind::Light(l) => Some((id, node.position, l)),
            NodeKind::Primitive(_) => None,
        })
    }

    pub fn primitive_count(&self) -> usize {
        self.primitives().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere_at(position: Vec3) -> Node {
        Node::primitive(Primitive::WireframeSphere(WireframeSphere::default()), position)
    }

    #[test]
    fn scene_starts_empty() {
        let scene = Scene::new();
        assert!(scene.is_empty());
        assert_eq!(scene.primitive_count(), 0);
    }

    #[test]
    fn default_lighting_has_three_lights_and_no_primitives() {
        let scene = Scene::with_default_lighting();
        assert_eq!(scene.lights().count(), 3);
        assert_eq!(scene.primitive_count(), 0);
        let (_, directional_pos, _) = scene
            .lights()
            .find(|(_, _, l)| matches!(l, Light::Directional { .. }))
            .unwrap();
        assert_eq!(directional_pos, Vec3::new(-50.0, 50.0, 50.0));
    }

    #[test]
    fn add_and_remove() {
        let mut scene = Scene::new();
        let a = scene.add(sphere_at(Vec3::ZERO));
        let b = scene.add(sphere_at(Vec3::X));
        assert_eq!(scene.primitive_count(), 2);

        assert!(scene.remove(a).is_some());
        assert!(scene.remove(a).is_none());
        assert!(!scene.contains(a));
        assert_eq!(scene.get(b).unwrap().position, Vec3::X);
    }

    #[test]
    fn node_ids_not_reused() {
        let mut scene = Scene::new();
        let a = scene.add(sphere_at(Vec3::ZERO));
        scene.remove(a);
        let b = scene.add(sphere_at(Vec3::ZERO));
        assert_ne!(a, b);
    }

    #[test]
    fn handle_shares_scene() {
        let handle = Scene::new().into_handle();
        let other = handle.clone();
        handle.borrow_mut().add(sphere_at(Vec3::ZERO));
        assert_eq!(other.borrow().primitive_count(), 1);
    }
}
