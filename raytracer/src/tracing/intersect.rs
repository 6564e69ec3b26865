use glam::Vec3;

/// A ray/triangle intersection candidate. The distance may be negative
/// (behind the ray origin); the caller applies the epsilon policy.
#[derive(Clone, Copy, Debug)]
pub struct Hit {
    pub distance: f32,
    pub u: f32,
    pub v: f32,
    /// Geometric normal, flipped to face the ray origin.
    pub normal: Vec3,
}

const DET_EPSILON: f32 = 1e-8;

/// Möller–Trumbore intersection, no backface culling.
pub fn ray_triangle(origin: Vec3, direction: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Option<Hit> {
    let e1 = b - a;
    let e2 = c - a;

    let p = direction.cross(e2);
    let det = e1.dot(p);
    if det.abs() < DET_EPSILON {
        return None;
    }

    let inv_det = 1.0 / det;
    let s = origin - a;
    let u = s.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(e1);
    let v = direction.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let distance = e2.dot(q) * inv_det;
    let mut normal = e1.cross(e2).normalize();
    if normal.dot(direction) > 0.0 {
        normal = -normal;
    }

    Some(Hit {
        distance,
        u,
        v,
        normal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: Vec3 = Vec3::new(-1.0, -1.0, 0.0);
    const B: Vec3 = Vec3::new(1.0, -1.0, 0.0);
    const C: Vec3 = Vec3::new(0.0, 1.0, 0.0);

    #[test]
    fn hit_through_triangle_center() {
        let hit = ray_triangle(Vec3::new(0.0, 0.0, -2.0), Vec3::Z, A, B, C).unwrap();
        assert!((hit.distance - 2.0).abs() < 1e-5);
        // Normal faces back toward the origin.
        assert!(hit.normal.dot(Vec3::Z) < 0.0);
    }

    #[test]
    fn miss_outside_triangle() {
        assert!(ray_triangle(Vec3::new(5.0, 5.0, -2.0), Vec3::Z, A, B, C).is_none());
    }

    #[test]
    fn parallel_ray_misses() {
        assert!(ray_triangle(Vec3::new(0.0, 0.0, -2.0), Vec3::X, A, B, C).is_none());
    }

    #[test]
    fn triangle_behind_origin_reports_negative_distance() {
        let hit = ray_triangle(Vec3::new(0.0, 0.0, 2.0), Vec3::Z, A, B, C).unwrap();
        assert!(hit.distance < 0.0);
    }
}
