use glam::Mat4;

use crate::geometry::MeshId;
use crate::material::MaterialId;

/// Renderable payload of a scene node.
#[derive(Clone, Copy, Debug)]
pub struct NodeData {
    pub mesh: MeshId,
    pub material: MaterialId,
}

/// A node in the scene hierarchy. The transform is local; world transforms
/// are accumulated during flattening. Children keep insertion order, which
/// fixes the traversal order.
pub struct SceneNode {
    pub name: String,
    pub transform: Mat4,
    pub data: Option<NodeData>,
    children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            transform: Mat4::IDENTITY,
            data: None,
            children: Vec::new(),
        }
    }

    pub fn with_data(name: &str, mesh: MeshId, material: MaterialId) -> Self {
        Self {
            data: Some(NodeData { mesh, material }),
            ..Self::new(name)
        }
    }

    pub fn add_child(&mut self, child: SceneNode) -> &mut SceneNode {
        self.children.push(child);
        self.children.last_mut().unwrap()
    }

    pub fn children(&self) -> &[SceneNode] {
        &self.children
    }

    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    /// Recursive lookup by name, depth first.
    pub fn find_node(&self, name: &str) -> Option<&SceneNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find_node(name))
    }

    pub fn find_node_mut(&mut self, name: &str) -> Option<&mut SceneNode> {
        if self.name == name {
            return Some(self);
        }
        self.children
            .iter_mut()
            .find_map(|child| child.find_node_mut(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_node_searches_depth_first() {
        let mut root = SceneNode::new("root");
        let group = root.add_child(SceneNode::new("group"));
        group.add_child(SceneNode::new("box"));

        assert!(root.find_node("box").is_some());
        assert!(root.find_node("sphere").is_none());
        assert_eq!(root.find_node("root").unwrap().name, "root");
    }

    #[test]
    fn find_node_mut_allows_transform_updates() {
        let mut root = SceneNode::new("root");
        root.add_child(SceneNode::new("box"));

        let spin = Mat4::from_rotation_y(1.0);
        root.find_node_mut("box").unwrap().set_transform(spin);
        assert_eq!(root.children()[0].transform, spin);
    }
}
