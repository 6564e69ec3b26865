use scenegraph::AssetLibrary;
use wgpu::ShaderStages;

use crate::render::device::DeviceBuffers;
use crate::render::gpu::WgpuExt;
use crate::render::RenderError;
use crate::{BLIT_SHADER_ASSET, TRACER_SHADER_ASSET};

const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Workgroup sizes baked into `tracer.wgsl`.
pub const LINEAR_WORKGROUP: u32 = 64;
pub const IMAGE_WORKGROUP: u32 = 8;

/// The compiled kernel program: three compute entry points sharing one
/// module, plus the presentation blit when a surface format is known.
/// Process-lifetime, built once at renderer construction.
pub struct TracerPipelines {
    pub clear: wgpu::ComputePipeline,
    pub intersect: wgpu::ComputePipeline,
    pub synthesize: wgpu::ComputePipeline,
    pub blit: Option<wgpu::RenderPipeline>,
    pub frame_layout: wgpu::BindGroupLayout,
    pub node_layout: wgpu::BindGroupLayout,
    pub image_layout: wgpu::BindGroupLayout,
    pub blit_layout: wgpu::BindGroupLayout,
}

impl TracerPipelines {
    /// Builds every kernel from the sources in the asset library. Any
    /// compilation or validation failure is a construction error.
    pub fn new(
        device: &wgpu::Device,
        assets: &AssetLibrary,
        surface_format: Option<wgpu::TextureFormat>,
    ) -> Result<Self, RenderError> {
        let tracer_source = assets.source_str(TRACER_SHADER_ASSET)?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = device.shader().label("Tracer Kernels").wgsl(tracer_source);

        // Group 0: per-frame resources, shared by all kernels.
        let frame_layout = device
            .bind_group_layout()
            .label("Tracer Frame Bind Group Layout")
            .storage(0, ShaderStages::COMPUTE, false)
            .uniform(1, ShaderStages::COMPUTE)
            .build();
        // Group 1: the node currently being intersected.
        let node_layout = device
            .bind_group_layout()
            .label("Tracer Node Bind Group Layout")
            .storage(0, ShaderStages::COMPUTE, true)
            .storage(1, ShaderStages::COMPUTE, true)
            .storage(2, ShaderStages::COMPUTE, true)
            .uniform(3, ShaderStages::COMPUTE)
            .uniform(4, ShaderStages::COMPUTE)
            .build();
        // Group 2: composition output.
        let image_layout = device
            .bind_group_layout()
            .label("Tracer Image Bind Group Layout")
            .storage_texture_2d(
                0,
                ShaderStages::COMPUTE,
                wgpu::StorageTextureAccess::WriteOnly,
                OUTPUT_FORMAT,
            )
            .storage(1, ShaderStages::COMPUTE, true)
            .build();
        let blit_layout = device
            .bind_group_layout()
            .label("Present Blit Bind Group Layout")
            .texture_2d(0, ShaderStages::FRAGMENT)
            .build();

        let clear_layout = device
            .pipeline_layout()
            .label("Clear Pipeline Layout")
            .bind_group_layouts(&[&frame_layout])
            .build();
        let intersect_layout = device
            .pipeline_layout()
            .label("Intersect Pipeline Layout")
            .bind_group_layouts(&[&frame_layout, &node_layout])
            .build();
        let synthesize_layout = device
            .pipeline_layout()
            .label("Synthesize Pipeline Layout")
            .bind_group_layouts(&[&frame_layout, &node_layout, &image_layout])
            .build();

        let clear = device
            .compute_pipeline()
            .label("Clear Synthesis Pipeline")
            .layout(&clear_layout)
            .shader(&module, "clear_synthesis")
            .build()
            .map_err(|msg| RenderError::ProgramBuild(msg.to_string()))?;
        let intersect = device
            .compute_pipeline()
            .label("Intersect Node Pipeline")
            .layout(&intersect_layout)
            .shader(&module, "intersect_node")
            .build()
            .map_err(|msg| RenderError::ProgramBuild(msg.to_string()))?;
        let synthesize = device
            .compute_pipeline()
            .label("Synthesize Image Pipeline")
            .layout(&synthesize_layout)
            .shader(&module, "synthesize_image")
            .build()
            .map_err(|msg| RenderError::ProgramBuild(msg.to_string()))?;

        let blit = match surface_format {
            Some(format) => {
                let blit_source = assets.source_str(BLIT_SHADER_ASSET)?;
                let blit_module = device.shader().label("Present Blit").wgsl(blit_source);
                let layout = device
                    .pipeline_layout()
                    .label("Present Blit Pipeline Layout")
                    .bind_group_layouts(&[&blit_layout])
                    .build();
                Some(crate::render::gpu::builders::blit_pipeline(
                    device,
                    &layout,
                    &blit_module,
                    format,
                ))
            }
            None => None,
        };

        let _ = device.poll(wgpu::Maintain::Poll);
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::ProgramBuild(error.to_string()));
        }

        Ok(Self {
            clear,
            intersect,
            synthesize,
            blit,
            frame_layout,
            node_layout,
            image_layout,
            blit_layout,
        })
    }
}

/// Bind groups over the managed buffers. Rebuilt wholesale whenever any
/// referenced buffer or the output image is re-created.
pub struct TracerBindGroups {
    pub frame: wgpu::BindGroup,
    pub node: wgpu::BindGroup,
    pub image: wgpu::BindGroup,
    pub blit: wgpu::BindGroup,
}

impl TracerBindGroups {
    pub fn new(
        device: &wgpu::Device,
        pipelines: &TracerPipelines,
        buffers: &DeviceBuffers,
    ) -> Self {
        let frame = device
            .bind_group(&pipelines.frame_layout)
            .label("Tracer Frame Bind Group")
            .buffer(0, buffers.synthesis.buffer())
            .buffer(1, &buffers.frame)
            .build();
        let node = device
            .bind_group(&pipelines.node_layout)
            .label("Tracer Node Bind Group")
            .buffer(0, buffers.rays.buffer())
            .buffer(1, buffers.vertices.buffer())
            .buffer(2, buffers.indices.buffer())
            .buffer(3, &buffers.node_params)
            .buffer(4, &buffers.transform)
            .build();
        let image = device
            .bind_group(&pipelines.image_layout)
            .label("Tracer Image Bind Group")
            .texture(0, &buffers.output_view)
            .buffer(1, &buffers.materials)
            .build();
        let blit = device
            .bind_group(&pipelines.blit_layout)
            .label("Present Blit Bind Group")
            .texture(0, &buffers.output_view)
            .build();

        Self {
            frame,
            node,
            image,
            blit,
        }
    }
}

pub fn linear_workgroups(count: u32) -> u32 {
    count.div_ceil(LINEAR_WORKGROUP)
}

pub fn image_workgroups(extent: u32) -> u32 {
    extent.div_ceil(IMAGE_WORKGROUP)
}
