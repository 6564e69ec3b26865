use glam::Mat4;

use crate::geometry::MeshId;
use crate::material::MaterialId;
use crate::node::SceneNode;
use crate::scene::Scene;

/// One renderable emitted by flattening: a mesh, its material and the
/// accumulated world transform. Produced fresh each frame, never persisted.
#[derive(Clone, Copy, Debug)]
pub struct RenderNode {
    pub mesh: MeshId,
    pub material: MaterialId,
    pub transform: Mat4,
}

/// Flatten the scene hierarchy into an ordered renderable list.
///
/// Pre-order depth-first walk; each node's world transform is
/// `parent_world * local`. Children are visited in insertion order, so the
/// output order is deterministic. The closest-hit reduction downstream is
/// commutative, so results do not depend on this order.
pub fn flatten(scene: &Scene) -> Vec<RenderNode> {
    let mut out = Vec::new();
    visit(scene.root(), Mat4::IDENTITY, &mut out);
    out
}

fn visit(node: &SceneNode, parent_world: Mat4, out: &mut Vec<RenderNode>) {
    let world = parent_world * node.transform;
    if let Some(data) = node.data {
        out.push(RenderNode {
            mesh: data.mesh,
            material: data.material,
            transform: world,
        });
    }
    for child in node.children() {
        visit(child, world, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::TriangleMesh;
    use crate::material::{Material, MaterialLibrary};
    use glam::{Vec3, Vec4};

    fn test_scene() -> (Scene, MaterialId) {
        let mut scene = Scene::new(Vec4::ZERO);
        let mesh = scene.add_mesh(TriangleMesh::cube(1.0));
        let mut materials = MaterialLibrary::new();
        let material = materials.create(Material::new(Vec4::ONE));

        let mut group = SceneNode::new("group");
        group.set_transform(Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)));
        let child = group.add_child(SceneNode::with_data("box", mesh, material));
        child.set_transform(Mat4::from_translation(Vec3::new(0.0, 5.0, 0.0)));
        scene.root_mut().add_child(group);

        (scene, material)
    }

    #[test]
    fn transforms_accumulate_parent_times_local() {
        let (scene, _) = test_scene();
        let nodes = flatten(&scene);
        assert_eq!(nodes.len(), 1);

        let origin = nodes[0].transform.transform_point3(Vec3::ZERO);
        assert_eq!(origin, Vec3::new(10.0, 5.0, 0.0));
    }

    #[test]
    fn nodes_without_data_are_skipped() {
        let mut scene = Scene::new(Vec4::ZERO);
        scene.root_mut().add_child(SceneNode::new("empty"));
        assert!(flatten(&scene).is_empty());
    }

    #[test]
    fn traversal_order_follows_child_insertion_order() {
        let mut scene = Scene::new(Vec4::ZERO);
        let mesh = scene.add_mesh(TriangleMesh::cube(1.0));
        let mut materials = MaterialLibrary::new();
        let a = materials.create(Material::new(Vec4::X));
        let b = materials.create(Material::new(Vec4::Y));
        let c = materials.create(Material::new(Vec4::Z));

        let mut first = SceneNode::with_data("first", mesh, a);
        first.add_child(SceneNode::with_data("nested", mesh, b));
        scene.root_mut().add_child(first);
        scene
            .root_mut()
            .add_child(SceneNode::with_data("second", mesh, c));

        let order: Vec<MaterialId> = flatten(&scene).iter().map(|n| n.material).collect();
        assert_eq!(order, vec![a, b, c]);
    }
}
