use std::sync::Arc;

use glam::{Mat4, Vec4};
use scenegraph::{Camera, MaterialId, MaterialLibrary, TriangleMesh};

use crate::render::wrapper::{RendererConfig, RenderWrapper};
use crate::render::RenderError;
use crate::tracing::{
    accumulate, clear_synthesis, compose, RayGenerator, SamplePattern, SynthesisRecord,
};

/// CPU reference backend. Runs the same clear, accumulate and compose
/// passes as the device kernels, one node at a time, and keeps the composed
/// image host-side.
pub struct SoftwareRenderer {
    materials: Arc<MaterialLibrary>,
    generator: RayGenerator,
    records: Vec<SynthesisRecord>,
    pixels: Vec<Vec4>,
    width: u32,
    height: u32,
    samples: u32,
    background: Vec4,
    transform: Mat4,
    node_cursor: i32,
    prepared: bool,
    in_frame: bool,
}

impl SoftwareRenderer {
    pub fn new(
        materials: Arc<MaterialLibrary>,
        pattern: Box<dyn SamplePattern>,
        config: &RendererConfig,
    ) -> Self {
        Self {
            materials,
            generator: RayGenerator::new(pattern),
            records: Vec::new(),
            pixels: Vec::new(),
            width: config.width.max(1),
            height: config.height.max(1),
            samples: config.samples.max(1),
            background: Vec4::ZERO,
            transform: Mat4::IDENTITY,
            node_cursor: 0,
            prepared: false,
            in_frame: false,
        }
    }

    /// Composed colors of the last completed frame, one per pixel in row
    /// major order.
    pub fn pixels(&self) -> &[Vec4] {
        &self.pixels
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Last frame packed as 8-bit RGBA rows.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.pixels.len() * 4);
        for pixel in &self.pixels {
            for channel in pixel.to_array() {
                bytes.push((channel.clamp(0.0, 1.0) * 255.0).round() as u8);
            }
        }
        bytes
    }
}

impl RenderWrapper for SoftwareRenderer {
    fn prepare_camera(&mut self, camera: &Camera) -> Result<(), RenderError> {
        if self
            .generator
            .generate(camera, self.width, self.height, self.samples)
        {
            self.records
                .resize(self.generator.rays().len(), SynthesisRecord::no_hit());
        }
        self.prepared = true;
        Ok(())
    }

    fn begin_frame(&mut self, background: Vec4) -> Result<(), RenderError> {
        assert!(!self.in_frame, "begin_frame while a frame is already open");
        if !self.prepared {
            return Err(RenderError::NotReady("prepare_camera has not run"));
        }

        clear_synthesis(&mut self.records);
        self.background = background;
        self.transform = Mat4::IDENTITY;
        self.node_cursor = 0;
        self.in_frame = true;
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), RenderError> {
        assert!(self.in_frame, "end_frame without an open frame");

        self.pixels = compose(
            &self.records,
            &self.materials.packed(),
            self.background,
            self.width,
            self.height,
            self.samples,
        );
        self.in_frame = false;
        Ok(())
    }

    fn set_transform(&mut self, transform: Mat4) {
        assert!(self.in_frame, "set_transform without an open frame");
        self.transform = transform;
    }

    fn render_node_data(
        &mut self,
        mesh: &TriangleMesh,
        material: MaterialId,
    ) -> Result<(), RenderError> {
        assert!(self.in_frame, "render_node_data without an open frame");

        accumulate(
            self.generator.rays(),
            mesh,
            &self.transform,
            material,
            self.node_cursor,
            &mut self.records,
        );
        self.node_cursor += 1;
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        assert!(!self.in_frame, "resize while a frame is open");
        self.width = width.max(1);
        self.height = height.max(1);
        self.prepared = false;
    }
}
