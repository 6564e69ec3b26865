use std::sync::Arc;

use glam::{Mat4, Vec4};
use scenegraph::{flatten, AssetLibrary, Camera, MaterialId, MaterialLibrary, Scene, TriangleMesh};

use crate::render::gpu::GpuContext;
use crate::render::hardware::HardwareRenderer;
use crate::render::software::SoftwareRenderer;
use crate::render::RenderError;
use crate::tracing::GridSampler;

/// Which rendering backend a renderer should be built on.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Backend {
    Hardware,
    Software,
}

#[derive(Copy, Clone, Debug)]
pub struct RendererConfig {
    pub backend: Backend,
    pub width: u32,
    pub height: u32,
    /// Sub-samples per pixel.
    pub samples: u32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Hardware,
            width: 640,
            height: 480,
            samples: 1,
        }
    }
}

/// The per-frame contract every renderer backend implements. Calls follow a
/// strict order: `prepare_camera`, `begin_frame`, any number of
/// `set_transform`/`render_node_data` pairs, then `end_frame`. Calling a
/// frame-scoped operation outside an open frame, or opening a second frame,
/// is a caller bug and panics.
pub trait RenderWrapper {
    /// Bring the primary ray state up to date for `camera` at the current
    /// output resolution.
    fn prepare_camera(&mut self, camera: &Camera) -> Result<(), RenderError>;

    /// Open a frame and reset the synthesis state to `background`.
    fn begin_frame(&mut self, background: Vec4) -> Result<(), RenderError>;

    /// Close the frame, compose the image and present it.
    fn end_frame(&mut self) -> Result<(), RenderError>;

    /// World transform applied to every node rendered until the next call.
    fn set_transform(&mut self, transform: Mat4);

    /// Accumulate one node's geometry into the open frame.
    fn render_node_data(
        &mut self,
        mesh: &TriangleMesh,
        material: MaterialId,
    ) -> Result<(), RenderError>;

    fn resize(&mut self, width: u32, height: u32);

    fn view_matrix(&self, camera: &Camera) -> Mat4 {
        camera.view_matrix()
    }

    /// Tracing projects through ray generation, not a projection transform.
    fn projection_matrix(&self, _camera: &Camera) -> Mat4 {
        Mat4::IDENTITY
    }
}

/// Drive one full frame of `scene` through `wrapper`: camera preparation,
/// then every flattened node in order, then composition.
pub fn render_with(
    wrapper: &mut dyn RenderWrapper,
    scene: &Scene,
    camera: &Camera,
) -> Result<(), RenderError> {
    wrapper.prepare_camera(camera)?;
    wrapper.begin_frame(scene.background)?;
    for node in flatten(scene) {
        wrapper.set_transform(node.transform);
        wrapper.render_node_data(scene.mesh(node.mesh), node.material)?;
    }
    wrapper.end_frame()
}

/// Owns a backend and renders scenes through it.
pub struct SceneRenderer {
    wrapper: Box<dyn RenderWrapper>,
}

impl SceneRenderer {
    pub fn new(wrapper: Box<dyn RenderWrapper>) -> Self {
        Self { wrapper }
    }

    pub fn render(&mut self, scene: &Scene, camera: &Camera) -> Result<(), RenderError> {
        render_with(self.wrapper.as_mut(), scene, camera)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.wrapper.resize(width, height);
    }

    pub fn wrapper_mut(&mut self) -> &mut dyn RenderWrapper {
        self.wrapper.as_mut()
    }
}

/// Build the backend `config` asks for. The hardware backend requires a GPU
/// context; the software backend ignores one.
pub fn create_renderer(
    config: &RendererConfig,
    gpu: Option<GpuContext>,
    assets: &AssetLibrary,
    materials: Arc<MaterialLibrary>,
) -> Result<Box<dyn RenderWrapper>, RenderError> {
    match config.backend {
        Backend::Hardware => {
            let gpu = gpu.ok_or(RenderError::NoAdapter)?;
            let renderer =
                HardwareRenderer::new(gpu, assets, materials, Box::new(GridSampler), config)?;
            Ok(Box::new(renderer))
        }
        Backend::Software => Ok(Box::new(SoftwareRenderer::new(
            materials,
            Box::new(GridSampler),
            config,
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use scenegraph::Material;

    fn software(width: u32, height: u32, samples: u32) -> SoftwareRenderer {
        let config = RendererConfig {
            backend: Backend::Software,
            width,
            height,
            samples,
        };
        SoftwareRenderer::new(
            Arc::new(MaterialLibrary::new()),
            Box::new(GridSampler),
            &config,
        )
    }

    fn camera() -> Camera {
        Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO)
    }

    #[test]
    fn frame_sequence_runs_to_completion() {
        let mut renderer = software(16, 16, 1);
        renderer.prepare_camera(&camera()).unwrap();
        renderer.begin_frame(Vec4::ZERO).unwrap();
        renderer.set_transform(Mat4::IDENTITY);
        renderer
            .render_node_data(&TriangleMesh::cube(1.0), MaterialId(0))
            .unwrap();
        renderer.end_frame().unwrap();
    }

    #[test]
    #[should_panic]
    fn double_begin_frame_panics() {
        let mut renderer = software(8, 8, 1);
        renderer.prepare_camera(&camera()).unwrap();
        renderer.begin_frame(Vec4::ZERO).unwrap();
        let _ = renderer.begin_frame(Vec4::ZERO);
    }

    #[test]
    #[should_panic]
    fn end_frame_without_begin_panics() {
        let mut renderer = software(8, 8, 1);
        let _ = renderer.end_frame();
    }

    #[test]
    #[should_panic]
    fn render_node_data_outside_frame_panics() {
        let mut renderer = software(8, 8, 1);
        let _ = renderer.render_node_data(&TriangleMesh::cube(1.0), MaterialId(0));
    }

    #[test]
    #[should_panic]
    fn set_transform_outside_frame_panics() {
        let mut renderer = software(8, 8, 1);
        renderer.set_transform(Mat4::IDENTITY);
    }

    #[test]
    fn begin_frame_without_prepare_is_not_ready() {
        let mut renderer = software(8, 8, 1);
        assert!(matches!(
            renderer.begin_frame(Vec4::ZERO),
            Err(RenderError::NotReady(_))
        ));
    }

    #[test]
    fn resize_mid_sequence_regenerates_rays() {
        let mut renderer = software(8, 8, 2);
        let camera = camera();

        renderer.prepare_camera(&camera).unwrap();
        renderer.begin_frame(Vec4::ZERO).unwrap();
        renderer.end_frame().unwrap();

        renderer.resize(32, 16);
        renderer.prepare_camera(&camera).unwrap();
        renderer.begin_frame(Vec4::ZERO).unwrap();
        renderer.end_frame().unwrap();
        assert_eq!(renderer.pixels().len(), 32 * 16);
    }

    #[test]
    fn render_with_walks_the_whole_scene() {
        let mut materials = MaterialLibrary::new();
        let grey = materials.create(Material::new(Vec4::splat(0.5)));

        let mut scene = Scene::new(Vec4::new(0.0, 0.0, 0.0, 1.0));
        let mesh = scene.add_mesh(TriangleMesh::cube(1.0));
        scene
            .root_mut()
            .add_child(scenegraph::SceneNode::with_data("box", mesh, grey));

        let config = RendererConfig {
            backend: Backend::Software,
            width: 24,
            height: 24,
            samples: 1,
        };
        let mut renderer = SceneRenderer::new(Box::new(SoftwareRenderer::new(
            Arc::new(materials),
            Box::new(GridSampler),
            &config,
        )));
        renderer.render(&scene, &camera()).unwrap();
    }
}
