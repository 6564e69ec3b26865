use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::{Mat4, Vec4};
use scenegraph::{Camera, MaterialId, MaterialLibrary, TriangleMesh};

use crate::render::device::{DeviceBuffers, NodeParams};
use crate::render::gpu::GpuContext;
use crate::render::pipeline::{
    image_workgroups, linear_workgroups, TracerBindGroups, TracerPipelines,
};
use crate::render::present;
use crate::render::wrapper::{RendererConfig, RenderWrapper};
use crate::render::RenderError;
use crate::tracing::{RayGenerator, SamplePattern};

/// Host-side timings for the last frame's dispatch phases.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameStats {
    pub clear: Duration,
    pub accumulate: Duration,
    pub compose: Duration,
    pub nodes: u32,
}

/// GPU tracing backend. Each frame runs a fixed kernel sequence on the
/// device's single in-order queue: one clear, one intersection pass per
/// node, one composition, then the presentation blit.
pub struct HardwareRenderer {
    gpu: GpuContext,
    pipelines: TracerPipelines,
    buffers: DeviceBuffers,
    bind_groups: TracerBindGroups,
    bind_groups_stale: bool,
    generator: RayGenerator,
    materials: Arc<MaterialLibrary>,
    samples: u32,
    prepared: bool,
    in_frame: bool,
    transform: Mat4,
    node_cursor: i32,
    stats: FrameStats,
}

impl HardwareRenderer {
    pub fn new(
        gpu: GpuContext,
        assets: &scenegraph::AssetLibrary,
        materials: Arc<MaterialLibrary>,
        pattern: Box<dyn SamplePattern>,
        config: &RendererConfig,
    ) -> Result<Self, RenderError> {
        let pipelines = TracerPipelines::new(&gpu.device, assets, gpu.surface_format())?;
        let buffers = DeviceBuffers::new(&gpu.device, config.width.max(1), config.height.max(1))?;
        let bind_groups = TracerBindGroups::new(&gpu.device, &pipelines, &buffers);

        Ok(Self {
            gpu,
            pipelines,
            buffers,
            bind_groups,
            bind_groups_stale: false,
            generator: RayGenerator::new(pattern),
            materials,
            samples: config.samples.max(1),
            prepared: false,
            in_frame: false,
            transform: Mat4::IDENTITY,
            node_cursor: 0,
            stats: FrameStats::default(),
        })
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Read the composed image back to the host. Intended for offscreen
    /// contexts and tests.
    pub fn read_output(&self) -> Result<Vec<u8>, RenderError> {
        let (width, height) = self.buffers.output_size();
        present::read_texture(
            &self.gpu.device,
            &self.gpu.queue,
            &self.buffers.output,
            width,
            height,
        )
    }

    fn ray_count(&self) -> u32 {
        let (width, height) = self.buffers.output_size();
        width * height * self.samples
    }

    fn refresh_bind_groups(&mut self) {
        if self.bind_groups_stale {
            self.bind_groups =
                TracerBindGroups::new(&self.gpu.device, &self.pipelines, &self.buffers);
            self.bind_groups_stale = false;
        }
    }

    /// Submit `encoder` and surface any validation error raised since the
    /// matching `push_error_scope`.
    fn finish_checked(&mut self, encoder: wgpu::CommandEncoder) -> Result<(), RenderError> {
        self.gpu.queue.submit(Some(encoder.finish()));
        let _ = self.gpu.device.poll(wgpu::Maintain::Poll);
        if let Some(error) = pollster::block_on(self.gpu.device.pop_error_scope()) {
            self.in_frame = false;
            return Err(RenderError::Dispatch(error.to_string()));
        }
        Ok(())
    }
}

impl RenderWrapper for HardwareRenderer {
    fn prepare_camera(&mut self, camera: &Camera) -> Result<(), RenderError> {
        let (width, height) = self.buffers.output_size();
        if self.generator.generate(camera, width, height, self.samples) {
            let rays = self.generator.rays();
            if self.buffers.ensure_ray_capacity(&self.gpu.device, rays.len())? {
                self.bind_groups_stale = true;
            }
            self.buffers.upload_rays(&self.gpu.queue, rays);
        }
        self.prepared = true;
        Ok(())
    }

    fn begin_frame(&mut self, background: Vec4) -> Result<(), RenderError> {
        assert!(!self.in_frame, "begin_frame while a frame is already open");
        if !self.prepared {
            return Err(RenderError::NotReady("prepare_camera has not run"));
        }

        let started = Instant::now();
        if self
            .buffers
            .upload_materials(&self.gpu.device, &self.materials)
        {
            self.bind_groups_stale = true;
        }
        let params =
            self.buffers
                .frame_params(background, self.samples, self.materials.len() as u32);
        self.buffers.write_frame_params(&self.gpu.queue, &params);
        self.refresh_bind_groups();

        self.gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Clear Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Clear Synthesis Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipelines.clear);
            pass.set_bind_group(0, &self.bind_groups.frame, &[]);
            pass.dispatch_workgroups(linear_workgroups(self.ray_count()), 1, 1);
        }
        self.finish_checked(encoder)?;

        self.stats = FrameStats {
            clear: started.elapsed(),
            ..FrameStats::default()
        };
        self.transform = Mat4::IDENTITY;
        self.node_cursor = 0;
        self.in_frame = true;
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), RenderError> {
        assert!(self.in_frame, "end_frame without an open frame");
        // Any failure below leaves the renderer ready for the next frame.
        self.in_frame = false;

        let started = Instant::now();
        let (width, height) = self.buffers.output_size();

        self.gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Synthesize Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Synthesize Image Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipelines.synthesize);
            pass.set_bind_group(0, &self.bind_groups.frame, &[]);
            pass.set_bind_group(1, &self.bind_groups.node, &[]);
            pass.set_bind_group(2, &self.bind_groups.image, &[]);
            pass.dispatch_workgroups(image_workgroups(width), image_workgroups(height), 1);
        }
        self.finish_checked(encoder)?;
        self.stats.compose = started.elapsed();

        if let Some(pipeline) = &self.pipelines.blit {
            present::present_frame(&self.gpu, pipeline, &self.bind_groups)?;
        }
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

        let node_index = self.node_cursor;
        self.node_cursor += 1;
        self.stats.nodes += 1;
        if mesh.is_empty() {
            return Ok(());
        }

        let started = Instant::now();
        match self
            .buffers
            .upload_node_geometry(&self.gpu.device, &self.gpu.queue, mesh)
        {
            Ok(recreated) => {
                if recreated {
                    self.bind_groups_stale = true;
                }
            }
            Err(err) => {
                self.in_frame = false;
                return Err(err);
            }
        }
        self.refresh_bind_groups();

        self.buffers.write_node_params(
            &self.gpu.queue,
            &NodeParams {
                index_count: mesh.indices().len() as u32,
                material: material.0 as i32,
                node: node_index,
                ray_count: self.ray_count(),
            },
        );
        self.buffers.write_transform(&self.gpu.queue, &self.transform);

        self.gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Intersect Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Intersect Node Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipelines.intersect);
            pass.set_bind_group(0, &self.bind_groups.frame, &[]);
            pass.set_bind_group(1, &self.bind_groups.node, &[]);
            pass.dispatch_workgroups(linear_workgroups(self.ray_count()), 1, 1);
        }
        self.finish_checked(encoder)?;

        self.stats.accumulate += started.elapsed();
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        assert!(!self.in_frame, "resize while a frame is open");
        self.buffers.resize_output(&self.gpu.device, width, height);
        self.gpu.resize(width, height);
        self.bind_groups_stale = true;
        self.prepared = false;
    }
}

impl Drop for HardwareRenderer {
    fn drop(&mut self) {
        // Drain in-flight work before resources are released.
        let _ = self.gpu.device.poll(wgpu::Maintain::Wait);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::wrapper::Backend;
    use crate::tracing::GridSampler;
    use crate::{BLIT_SHADER_ASSET, TRACER_SHADER_ASSET};
    use glam::Vec3;
    use scenegraph::{AssetLibrary, HeapBuffer, Material};

    fn shader_assets() -> AssetLibrary {
        let mut assets = AssetLibrary::new();
        assets.add_asset(
            TRACER_SHADER_ASSET,
            HeapBuffer::from_bytes(include_str!("../../shaders/tracer.wgsl").as_bytes()),
        );
        assets.add_asset(
            BLIT_SHADER_ASSET,
            HeapBuffer::from_bytes(include_str!("../../shaders/blit.wgsl").as_bytes()),
        );
        assets
    }

    // Skips silently on machines without a compute adapter.
    #[test]
    fn headless_frame_composes_the_material_color() {
        let Ok(gpu) = pollster::block_on(GpuContext::headless()) else {
            return;
        };

        let mut materials = MaterialLibrary::new();
        let red = materials.create(Material::new(Vec4::new(1.0, 0.0, 0.0, 1.0)));

        let config = RendererConfig {
            backend: Backend::Hardware,
            width: 32,
            height: 24,
            samples: 1,
        };
        let mut renderer = HardwareRenderer::new(
            gpu,
            &shader_assets(),
            Arc::new(materials),
            Box::new(GridSampler),
            &config,
        )
        .unwrap();

        let camera = Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        renderer.prepare_camera(&camera).unwrap();
        renderer.begin_frame(Vec4::new(0.0, 0.0, 1.0, 1.0)).unwrap();
        renderer.set_transform(Mat4::from_scale(Vec3::splat(100.0)));
        renderer
            .render_node_data(&TriangleMesh::cube(1.0), red)
            .unwrap();
        renderer.end_frame().unwrap();

        let pixels = renderer.read_output().unwrap();
        assert_eq!(pixels.len(), 32 * 24 * 4);
        // The scaled cube surrounds the camera, so every pixel is the
        // material color.
        assert_eq!(&pixels[0..4], &[255, 0, 0, 255]);
    }
}
