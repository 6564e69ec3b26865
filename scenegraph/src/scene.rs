use glam::Vec4;

use crate::camera::Camera;
use crate::geometry::{MeshId, TriangleMesh};
use crate::node::SceneNode;

/// Owns the node hierarchy, the meshes nodes refer to, the scene cameras
/// and the background color used where no geometry is hit.
pub struct Scene {
    root: SceneNode,
    meshes: Vec<TriangleMesh>,
    cameras: Vec<Camera>,
    pub background: Vec4,
}

impl Scene {
    pub fn new(background: Vec4) -> Self {
        Self {
            root: SceneNode::new("root"),
            meshes: Vec::new(),
            cameras: Vec::new(),
            background,
        }
    }

    pub fn root(&self) -> &SceneNode {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut SceneNode {
        &mut self.root
    }

    pub fn add_mesh(&mut self, mesh: TriangleMesh) -> MeshId {
        let id = MeshId(self.meshes.len() as u32);
        self.meshes.push(mesh);
        id
    }

    pub fn mesh(&self, id: MeshId) -> &TriangleMesh {
        &self.meshes[id.0 as usize]
    }

    pub fn add_camera(&mut self, camera: Camera) -> usize {
        self.cameras.push(camera);
        self.cameras.len() - 1
    }

    pub fn camera(&self, index: usize) -> Option<&Camera> {
        self.cameras.get(index)
    }

    pub fn camera_mut(&mut self, index: usize) -> Option<&mut Camera> {
        self.cameras.get_mut(index)
    }

    pub fn find_node(&self, name: &str) -> Option<&SceneNode> {
        self.root.find_node(name)
    }

    pub fn find_node_mut(&mut self, name: &str) -> Option<&mut SceneNode> {
        self.root.find_node_mut(name)
    }
}
