use glam::{Mat4, Vec3};

/// A look-at camera with a vertical field of view. Supplies the matrices
/// used by rasterization-style consumers and the orthonormal basis used to
/// unproject rays.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Camera {
    pub fn new(eye: Vec3, target: Vec3) -> Self {
        Self {
            eye,
            target,
            up: Vec3::Y,
            fov_y: 60.0_f32.to_radians(),
            z_near: 0.1,
            z_far: 1000.0,
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, aspect, self.z_near, self.z_far)
    }

    /// Orthonormal (forward, right, up) basis. The configured up vector only
    /// hints at the roll; the returned vectors are mutually perpendicular.
    pub fn basis(&self) -> (Vec3, Vec3, Vec3) {
        let forward = (self.target - self.eye).normalize();
        let right = forward.cross(self.up).normalize();
        let up = right.cross(forward);
        (forward, right, up)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basis_is_orthonormal() {
        let camera = Camera::new(Vec3::new(1.0, 2.0, 3.0), Vec3::ZERO);
        let (forward, right, up) = camera.basis();

        assert!(forward.dot(right).abs() < 1e-6);
        assert!(forward.dot(up).abs() < 1e-6);
        assert!(right.dot(up).abs() < 1e-6);
        assert!((forward.length() - 1.0).abs() < 1e-6);
        assert!((up.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn view_matrix_maps_eye_to_origin() {
        let camera = Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        let eye_in_view = camera.view_matrix().transform_point3(camera.eye);
        assert!(eye_in_view.length() < 1e-6);
    }
}
