use glam::Vec3;
use indexmap::IndexMap;

use crate::config::Color;
use crate::engine::animation::AnimationClip;
use crate::engine::light::Light;
use crate::engine::material::{Material, MaterialHandle};
use crate::engine::texture::{CubeTexture, EnvironmentMap, Texture};

/// Root container handed to the renderer every frame.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    /// Loaded objects, in insertion order.
    pub objects: Vec<SceneNode>,
    /// The lights group, keyed by light name.
    pub lights: IndexMap<String, Light>,
    /// Feature owned nodes (highlight markers and the like).
    pub helpers: Vec<SceneNode>,
    pub background: Option<Background>,
    pub environment: Option<EnvironmentMap>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Background {
    Color(Color),
    Texture(Texture),
    Cube(CubeTexture),
    Environment(EnvironmentMap),
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Group,
    Mesh { materials: Vec<MaterialHandle> },
    Marker { color: Color, radius: f32 },
}

/// Node of a loaded object hierarchy.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub kind: NodeKind,
    pub position: Vec3,
    pub scale: Vec3,
    pub visible: bool,
    pub children: Vec<SceneNode>,
    pub animations: Vec<AnimationClip>,
}

impl SceneNode {
    pub fn group(name: impl Into<String>) -> Self {
        Self::with_kind(name, NodeKind::Group)
    }

    pub fn mesh(name: impl Into<String>, materials: Vec<Material>) -> Self {
        Self::with_kind(
            name,
            NodeKind::Mesh {
                materials: materials.into_iter().map(Material::into_handle).collect(),
            },
        )
    }

    pub fn marker(name: impl Into<String>, color: Color, radius: f32) -> Self {
        Self::with_kind(name, NodeKind::Marker { color, radius })
    }

    fn with_kind(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            position: Vec3::ZERO,
            scale: Vec3::ONE,
            visible: true,
            children: Vec::new(),
            animations: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_animation(mut self, clip: AnimationClip) -> Self {
        self.animations.push(clip);
        self
    }

    pub fn is_mesh(&self) -> bool {
        matches!(self.kind, NodeKind::Mesh { .. })
    }

    /// Depth-first, parent before children.
    pub fn traverse<F>(&self, visit: &mut F)
    where
        F: FnMut(&SceneNode),
    {
        visit(self);
        for child in &self.children {
            child.traverse(visit);
        }
    }

    pub fn traverse_mut<F>(&mut self, visit: &mut F)
    where
        F: FnMut(&mut SceneNode),
    {
        visit(self);
        for child in &mut self.children {
            child.traverse_mut(visit);
        }
    }

    /// Every material slot of every mesh below (and including) this node.
    pub fn materials(&self) -> Vec<MaterialHandle> {
        let mut found = Vec::new();
        self.traverse(&mut |node| {
            if let NodeKind::Mesh { materials } = &node.kind {
                found.extend(materials.iter().cloned());
            }
        });
        found
    }

    pub fn mesh_count(&self) -> usize {
        let mut count = 0;
        self.traverse(&mut |node| {
            if node.is_mesh() {
                count += 1;
            }
        });
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn truck() -> SceneNode {
        SceneNode::group("Truck")
            .with_child(SceneNode::mesh(
                "Body",
                vec![Material::new("Paint"), Material::new("Glass")],
            ))
            .with_child(
                SceneNode::group("Wheels")
                    .with_child(SceneNode::mesh("Wheel", vec![Material::new("Rubber")])),
            )
    }

    #[test]
    fn traversal_visits_parents_before_children() {
        let mut names = Vec::new();
        truck().traverse(&mut |node| names.push(node.name.clone()));
        assert_eq!(names, vec!["Truck", "Body", "Wheels", "Wheel"]);
    }

    #[test]
    fn collects_materials_from_every_mesh() {
        let node = truck();
        assert_eq!(node.mesh_count(), 2);
        let names: Vec<_> = node
            .materials()
            .iter()
            .map(|material| material.read().name.clone())
            .collect();
        assert_eq!(names, vec!["Paint", "Glass", "Rubber"]);
    }
}
