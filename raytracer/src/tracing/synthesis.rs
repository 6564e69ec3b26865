use glam::{Mat4, Vec3, Vec4};
use scenegraph::{GpuMaterial, MaterialId, TriangleMesh};

use super::intersect::ray_triangle;
use super::ray::Ray;

/// Hits closer than this are rejected as self-intersection or grazing the
/// ray origin.
pub const HIT_EPSILON: f32 = 1e-4;

/// Material index marking a ray with no recorded hit.
pub const NO_MATERIAL: i32 = -1;

/// Per-ray accumulator for the closest intersection found so far. Matches
/// the storage layout of the device kernels.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SynthesisRecord {
    pub distance: f32,
    pub material: i32,
    /// Flatten-order index of the node that produced the hit.
    pub node: i32,
    pub _pad: u32,
    pub normal: [f32; 4],
}

impl SynthesisRecord {
    pub fn no_hit() -> Self {
        Self {
            distance: f32::INFINITY,
            material: NO_MATERIAL,
            node: -1,
            _pad: 0,
            normal: [0.0; 4],
        }
    }

    pub fn is_hit(&self) -> bool {
        self.material != NO_MATERIAL
    }
}

/// Reset every record to the no-hit state. Runs before the first node of a
/// frame.
pub fn clear_synthesis(records: &mut [SynthesisRecord]) {
    records.fill(SynthesisRecord::no_hit());
}

/// One node pass of the closest-hit reduction: intersect every ray against
/// the node's triangles (transformed into world space) and overwrite a
/// record only with a strictly nearer hit at distance `>= HIT_EPSILON`.
///
/// Commutative across nodes, so the flatten order does not affect results.
pub fn accumulate(
    rays: &[Ray],
    mesh: &TriangleMesh,
    transform: &Mat4,
    material: MaterialId,
    node_index: i32,
    records: &mut [SynthesisRecord],
) {
    debug_assert_eq!(rays.len(), records.len());
    if mesh.is_empty() {
        return;
    }

    let world_positions: Vec<Vec3> = mesh
        .vertices()
        .iter()
        .map(|vertex| transform.transform_point3(vertex.position))
        .collect();

    for (ray, record) in rays.iter().zip(records.iter_mut()) {
        let origin = ray.origin();
        let direction = ray.direction();
        for triangle in mesh.indices().chunks_exact(3) {
            let a = world_positions[triangle[0] as usize];
            let b = world_positions[triangle[1] as usize];
            let c = world_positions[triangle[2] as usize];
            if let Some(hit) = ray_triangle(origin, direction, a, b, c) {
                if hit.distance >= HIT_EPSILON && hit.distance < record.distance {
                    record.distance = hit.distance;
                    record.material = material.0 as i32;
                    record.node = node_index;
                    record.normal = [hit.normal.x, hit.normal.y, hit.normal.z, 0.0];
                }
            }
        }
    }
}

/// Resolve the finalized synthesis buffer into one color per pixel: the
/// arithmetic mean over the pixel's sub-samples, with the background color
/// standing in for no-hit or invalid material references.
pub fn compose(
    records: &[SynthesisRecord],
    materials: &[GpuMaterial],
    background: Vec4,
    width: u32,
    height: u32,
    samples: u32,
) -> Vec<Vec4> {
    assert_eq!(records.len(), (width * height * samples) as usize);

    let mut pixels = Vec::with_capacity((width * height) as usize);
    for pixel_records in records.chunks_exact(samples as usize) {
        let mut sum = Vec4::ZERO;
        for record in pixel_records {
            sum += materials
                .get(usize::try_from(record.material).unwrap_or(usize::MAX))
                .map(|material| Vec4::from_array(material.color))
                .unwrap_or(background);
        }
        pixels.push(sum / samples as f32);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracing::ray::{ray_index, GridSampler, RayGenerator};
    use scenegraph::{Camera, Material, MaterialLibrary, Vertex};

    fn single_ray(origin: Vec3, direction: Vec3) -> Vec<Ray> {
        vec![Ray::new(origin, direction)]
    }

    /// A triangle in the z = `depth` plane, large enough to cover the view.
    fn wall(depth: f32) -> TriangleMesh {
        let n = -Vec3::Z;
        TriangleMesh::new(
            vec![
                Vertex::new(Vec3::new(-1000.0, -1000.0, depth), n),
                Vertex::new(Vec3::new(1000.0, -1000.0, depth), n),
                Vertex::new(Vec3::new(0.0, 1000.0, depth), n),
            ],
            vec![0, 1, 2],
        )
    }

    #[test]
    fn cleared_records_have_no_hit() {
        let mut records = vec![SynthesisRecord::no_hit(); 4];
        records[2].distance = 1.0;
        records[2].material = 7;

        clear_synthesis(&mut records);
        for record in &records {
            assert_eq!(record.distance, f32::INFINITY);
            assert_eq!(record.material, NO_MATERIAL);
            assert!(!record.is_hit());
        }
    }

    #[test]
    fn empty_mesh_leaves_records_unchanged() {
        let rays = single_ray(Vec3::ZERO, Vec3::Z);
        let mut records = vec![SynthesisRecord::no_hit(); 1];

        accumulate(
            &rays,
            &TriangleMesh::default(),
            &Mat4::IDENTITY,
            MaterialId(0),
            0,
            &mut records,
        );
        assert!(!records[0].is_hit());
    }

    #[test]
    fn hits_below_epsilon_are_rejected() {
        // Triangle exactly at the ray origin.
        let rays = single_ray(Vec3::ZERO, Vec3::Z);
        let mut records = vec![SynthesisRecord::no_hit(); 1];

        accumulate(
            &rays,
            &wall(0.0),
            &Mat4::IDENTITY,
            MaterialId(0),
            0,
            &mut records,
        );
        assert!(!records[0].is_hit());

        // Triangle behind the origin.
        accumulate(
            &rays,
            &wall(-5.0),
            &Mat4::IDENTITY,
            MaterialId(0),
            0,
            &mut records,
        );
        assert!(!records[0].is_hit());
    }

    #[test]
    fn closest_hit_wins_in_any_order() {
        let rays = single_ray(Vec3::ZERO, Vec3::Z);
        let near = (wall(2.0), MaterialId(0), 0);
        let far = (wall(5.0), MaterialId(1), 1);

        for passes in [[&near, &far], [&far, &near]] {
            let mut records = vec![SynthesisRecord::no_hit(); 1];
            for (mesh, material, node) in passes {
                accumulate(
                    &rays,
                    mesh,
                    &Mat4::IDENTITY,
                    *material,
                    *node,
                    &mut records,
                );
            }
            assert_eq!(records[0].material, 0);
            assert_eq!(records[0].node, 0);
            assert!((records[0].distance - 2.0).abs() < 1e-4);
        }
    }

    #[test]
    fn accumulate_applies_the_node_transform() {
        let rays = single_ray(Vec3::ZERO, Vec3::Z);
        let mut records = vec![SynthesisRecord::no_hit(); 1];

        // The wall starts at z = 2; pushing it to z = 9 must move the hit.
        accumulate(
            &rays,
            &wall(2.0),
            &Mat4::from_translation(Vec3::new(0.0, 0.0, 7.0)),
            MaterialId(3),
            0,
            &mut records,
        );
        assert!((records[0].distance - 9.0).abs() < 1e-3);
    }

    #[test]
    fn full_cover_scene_composes_to_the_material_color() {
        let mut materials = MaterialLibrary::new();
        let red = materials.create(Material::new(Vec4::new(1.0, 0.0, 0.0, 1.0)));

        let camera = Camera::new(Vec3::ZERO, Vec3::Z);
        let (width, height, samples) = (16, 12, 1);

        let mut generator = RayGenerator::new(Box::new(GridSampler));
        generator.generate(&camera, width, height, samples);

        let mut records = vec![SynthesisRecord::no_hit(); generator.rays().len()];
        accumulate(
            generator.rays(),
            &wall(10.0),
            &Mat4::IDENTITY,
            red,
            0,
            &mut records,
        );

        let pixels = compose(
            &records,
            &materials.packed(),
            Vec4::ZERO,
            width,
            height,
            samples,
        );
        for pixel in pixels {
            assert_eq!(pixel, Vec4::new(1.0, 0.0, 0.0, 1.0));
        }
    }

    #[test]
    fn empty_scene_composes_to_the_background() {
        let background = Vec4::new(0.2, 0.2, 0.8, 1.0);
        let (width, height, samples) = (8, 8, 4);
        let records =
            vec![SynthesisRecord::no_hit(); (width * height * samples) as usize];

        let pixels = compose(&records, &[], background, width, height, samples);
        assert_eq!(pixels.len(), (width * height) as usize);
        for pixel in pixels {
            assert!((pixel - background).abs().max_element() < 1e-6);
        }
    }

    #[test]
    fn out_of_range_material_resolves_to_background() {
        let background = Vec4::ONE;
        let mut record = SynthesisRecord::no_hit();
        record.distance = 1.0;
        record.material = 42;

        let pixels = compose(&[record], &[], background, 1, 1, 1);
        assert_eq!(pixels[0], background);
    }

    #[test]
    fn multisample_average_is_the_arithmetic_mean() {
        let mut materials = MaterialLibrary::new();
        let white = materials.create(Material::new(Vec4::ONE));

        // Two of four samples hit; background is black, so the pixel is 50% grey.
        let mut records = vec![SynthesisRecord::no_hit(); 4];
        for i in [0, 2] {
            records[i].distance = 1.0;
            records[i].material = white.0 as i32;
        }

        let pixels = compose(&records, &materials.packed(), Vec4::ZERO, 1, 1, 4);
        assert!((pixels[0] - Vec4::splat(0.5)).abs().max_element() < 1e-6);
    }

    #[test]
    fn overlapping_triangles_pick_the_nearer_material_per_pixel() {
        let camera = Camera::new(Vec3::ZERO, Vec3::Z);
        let (width, height, samples) = (3, 3, 1);

        let mut generator = RayGenerator::new(Box::new(GridSampler));
        generator.generate(&camera, width, height, samples);

        let mut materials = MaterialLibrary::new();
        let near_mat = materials.create(Material::new(Vec4::X));
        let far_mat = materials.create(Material::new(Vec4::Y));

        for order_flipped in [false, true] {
            let mut records = vec![SynthesisRecord::no_hit(); generator.rays().len()];
            let mut passes = vec![(wall(3.0), near_mat, 0), (wall(6.0), far_mat, 1)];
            if order_flipped {
                passes.reverse();
            }
            for (mesh, material, node) in &passes {
                accumulate(
                    generator.rays(),
                    mesh,
                    &Mat4::IDENTITY,
                    *material,
                    *node,
                    &mut records,
                );
            }

            let center = ray_index(1, 1, 0, width, samples);
            assert_eq!(records[center].material, near_mat.0 as i32);
        }
    }
}
