use glam::Vec3;
use scenegraph::Camera;

/// A primary ray in its device-uploadable layout. The fourth components are
/// padding for the `vec4` alignment the kernels expect.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Ray {
    pub origin: [f32; 4],
    pub direction: [f32; 4],
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin: [origin.x, origin.y, origin.z, 1.0],
            direction: [direction.x, direction.y, direction.z, 0.0],
        }
    }

    pub fn origin(&self) -> Vec3 {
        Vec3::new(self.origin[0], self.origin[1], self.origin[2])
    }

    pub fn direction(&self) -> Vec3 {
        Vec3::new(self.direction[0], self.direction[1], self.direction[2])
    }
}

/// Canonical ray buffer index for pixel `(x, y)`, sub-sample `sample`.
pub fn ray_index(x: u32, y: u32, sample: u32, width: u32, samples: u32) -> usize {
    (((y * width + x) * samples) + sample) as usize
}

/// Inverse of [`ray_index`]: `(x, y, sample)` for a buffer index.
pub fn pixel_of(index: usize, width: u32, samples: u32) -> (u32, u32, u32) {
    let pixel = index as u32 / samples;
    (pixel % width, pixel / width, index as u32 % samples)
}

/// Sub-pixel sample placement policy.
pub trait SamplePattern {
    /// Offsets in `[0, 1)²`, one per sub-sample. Must be deterministic for a
    /// given count so repeated frames trace identical rays.
    fn offsets(&self, sample_count: u32) -> Vec<[f32; 2]>;
}

/// Samples at the cell centers of a fixed ⌈√S⌉×⌈√S⌉ grid.
pub struct GridSampler;

impl SamplePattern for GridSampler {
    fn offsets(&self, sample_count: u32) -> Vec<[f32; 2]> {
        let grid = (sample_count as f32).sqrt().ceil().max(1.0) as u32;
        (0..sample_count.max(1))
            .map(|i| {
                let x = i % grid;
                let y = i / grid;
                [
                    (x as f32 + 0.5) / grid as f32,
                    (y as f32 + 0.5) / grid as f32,
                ]
            })
            .collect()
    }
}

#[derive(Clone, Copy, PartialEq)]
struct Signature {
    camera: Camera,
    width: u32,
    height: u32,
    samples: u32,
}

/// Generates the primary ray buffer from a camera, memoized on camera
/// identity and resolution. Storage is reused while the cardinality is
/// unchanged and reallocated otherwise.
pub struct RayGenerator {
    pattern: Box<dyn SamplePattern>,
    rays: Vec<Ray>,
    signature: Option<Signature>,
    generation: u64,
}

impl RayGenerator {
    pub fn new(pattern: Box<dyn SamplePattern>) -> Self {
        Self {
            pattern,
            rays: Vec::new(),
            signature: None,
            generation: 0,
        }
    }

    /// Regenerates the buffer if the camera or resolution changed since the
    /// last call. Returns whether regeneration happened.
    pub fn generate(&mut self, camera: &Camera, width: u32, height: u32, samples: u32) -> bool {
        let signature = Signature {
            camera: *camera,
            width,
            height,
            samples,
        };
        if self.signature == Some(signature) {
            return false;
        }

        let offsets = self.pattern.offsets(samples);
        let (forward, right, up) = camera.basis();
        let aspect = width as f32 / height as f32;
        let half_v = (camera.fov_y * 0.5).tan();
        let half_h = half_v * aspect;

        self.rays.clear();
        self.rays
            .reserve_exact((width * height * samples) as usize);
        for y in 0..height {
            for x in 0..width {
                for offset in &offsets {
                    let u = ((x as f32 + offset[0]) / width as f32) * 2.0 - 1.0;
                    let v = 1.0 - ((y as f32 + offset[1]) / height as f32) * 2.0;
                    let direction = (forward + right * (u * half_h) + up * (v * half_v)).normalize();
                    self.rays.push(Ray::new(camera.eye, direction));
                }
            }
        }

        self.signature = Some(signature);
        self.generation += 1;
        true
    }

    pub fn rays(&self) -> &[Ray] {
        &self.rays
    }

    /// Bumped every time the buffer is actually regenerated.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn test_camera() -> Camera {
        Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO)
    }

    #[test]
    fn index_mapping_roundtrips() {
        let (width, height, samples) = (7, 5, 3);
        for y in 0..height {
            for x in 0..width {
                for s in 0..samples {
                    let index = ray_index(x, y, s, width, samples);
                    assert_eq!(pixel_of(index, width, samples), (x, y, s));
                }
            }
        }
    }

    #[test]
    fn buffer_cardinality_is_pixels_times_samples() {
        let mut generator = RayGenerator::new(Box::new(GridSampler));
        generator.generate(&test_camera(), 8, 6, 4);
        assert_eq!(generator.rays().len(), 8 * 6 * 4);
    }

    #[test]
    fn unchanged_camera_does_not_regenerate() {
        let mut generator = RayGenerator::new(Box::new(GridSampler));
        let camera = test_camera();

        assert!(generator.generate(&camera, 320, 200, 2));
        let generation = generator.generation();

        assert!(!generator.generate(&camera, 320, 200, 2));
        assert_eq!(generator.generation(), generation);
    }

    #[test]
    fn resolution_change_reallocates() {
        let mut generator = RayGenerator::new(Box::new(GridSampler));
        let camera = test_camera();

        generator.generate(&camera, 320, 200, 2);
        assert!(generator.generate(&camera, 640, 480, 2));
        assert_eq!(generator.rays().len(), 640 * 480 * 2);
    }

    #[test]
    fn camera_move_regenerates() {
        let mut generator = RayGenerator::new(Box::new(GridSampler));
        let mut camera = test_camera();

        generator.generate(&camera, 64, 64, 1);
        camera.eye.x += 1.0;
        assert!(generator.generate(&camera, 64, 64, 1));
    }

    #[test]
    fn center_ray_points_at_target() {
        let mut generator = RayGenerator::new(Box::new(GridSampler));
        let camera = test_camera();

        // Odd resolution, single sample: the center pixel straddles the axis.
        generator.generate(&camera, 101, 101, 1);
        let index = ray_index(50, 50, 0, 101, 1);
        let ray = generator.rays()[index];

        assert_eq!(ray.origin(), camera.eye);
        let to_target = (camera.target - camera.eye).normalize();
        assert!(ray.direction().dot(to_target) > 0.999);
    }

    #[test]
    fn grid_sampler_offsets_are_deterministic_and_in_range() {
        let a = GridSampler.offsets(4);
        let b = GridSampler.offsets(4);
        assert_eq!(a, b);
        assert_eq!(a.len(), 4);
        for [x, y] in a {
            assert!((0.0..1.0).contains(&x));
            assert!((0.0..1.0).contains(&y));
        }
    }
}
