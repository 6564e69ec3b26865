use std::borrow::Cow;
use wgpu::util::DeviceExt;
use wgpu::{
    BindGroup, BindGroupLayout, Buffer, ComputePipeline, Device, Queue, RenderPipeline,
    ShaderModule, ShaderStages, Texture, TextureFormat,
};

/// Fluent builders over `wgpu::Device` for the handful of resource kinds
/// this pipeline creates.
pub trait WgpuExt {
    fn buffer(&self) -> BufferBuilder<'_>;
    fn texture(&self) -> TextureBuilder<'_>;
    fn shader(&self) -> ShaderBuilder<'_>;
    fn bind_group_layout(&self) -> BindGroupLayoutBuilder<'_>;
    fn bind_group<'a>(&'a self, layout: &'a BindGroupLayout) -> BindGroupBuilder<'a>;
    fn pipeline_layout(&self) -> PipelineLayoutBuilder<'_>;
    fn compute_pipeline(&self) -> ComputePipelineBuilder<'_>;
}

impl WgpuExt for Device {
    fn buffer(&self) -> BufferBuilder<'_> {
        BufferBuilder::new(self)
    }
    fn texture(&self) -> TextureBuilder<'_> {
        TextureBuilder::new(self)
    }
    fn shader(&self) -> ShaderBuilder<'_> {
        ShaderBuilder::new(self)
    }
    fn bind_group_layout(&self) -> BindGroupLayoutBuilder<'_> {
        BindGroupLayoutBuilder::new(self)
    }
    fn bind_group<'a>(&'a self, layout: &'a BindGroupLayout) -> BindGroupBuilder<'a> {
        BindGroupBuilder::new(self, layout)
    }
    fn pipeline_layout(&self) -> PipelineLayoutBuilder<'_> {
        PipelineLayoutBuilder::new(self)
    }
    fn compute_pipeline(&self) -> ComputePipelineBuilder<'_> {
        ComputePipelineBuilder::new(self)
    }
}

pub struct BufferBuilder<'a> {
    device: &'a Device,
    label: Option<&'a str>,
    usage: wgpu::BufferUsages,
}

impl<'a> BufferBuilder<'a> {
    fn new(device: &'a Device) -> Self {
        Self {
            device,
            label: None,
            usage: wgpu::BufferUsages::empty(),
        }
    }

    pub fn label(mut self, label: &'a str) -> Self {
        self.label = Some(label);
        self
    }

    pub fn usage(mut self, usage: wgpu::BufferUsages) -> Self {
        self.usage = usage;
        self
    }

    pub fn uniform<T: bytemuck::Pod>(self, data: &T) -> Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: self.label,
                contents: bytemuck::cast_slice(std::slice::from_ref(data)),
                usage: self.usage | wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            })
    }

    pub fn storage<T: bytemuck::Pod>(self, data: &[T]) -> Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: self.label,
                contents: bytemuck::cast_slice(data),
                usage: self.usage | wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            })
    }

    pub fn empty(self, size: u64) -> Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: self.label,
            size,
            usage: self.usage,
            mapped_at_creation: false,
        })
    }
}

pub struct TextureBuilder<'a> {
    device: &'a Device,
    label: Option<&'a str>,
    size: wgpu::Extent3d,
    format: TextureFormat,
    usage: wgpu::TextureUsages,
}

impl<'a> TextureBuilder<'a> {
    fn new(device: &'a Device) -> Self {
        Self {
            device,
            label: None,
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            format: TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
        }
    }

    pub fn label(mut self, label: &'a str) -> Self {
        self.label = Some(label);
        self
    }

    pub fn size_2d(mut self, width: u32, height: u32) -> Self {
        self.size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        self
    }

    pub fn format(mut self, format: TextureFormat) -> Self {
        self.format = format;
        self
    }

    pub fn usage(mut self, usage: wgpu::TextureUsages) -> Self {
        self.usage = usage;
        self
    }

    pub fn build(self) -> Texture {
        self.device.create_texture(&wgpu::TextureDescriptor {
            label: self.label,
            size: self.size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.format,
            usage: self.usage,
            view_formats: &[],
        })
    }
}

pub struct ShaderBuilder<'a> {
    device: &'a Device,
    label: Option<&'a str>,
}

impl<'a> ShaderBuilder<'a> {
    fn new(device: &'a Device) -> Self {
        Self {
            device,
            label: None,
        }
    }

    pub fn label(mut self, label: &'a str) -> Self {
        self.label = Some(label);
        self
    }

    pub fn wgsl(self, source: &str) -> ShaderModule {
        self.device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: self.label,
                source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source)),
            })
    }
}

pub struct BindGroupLayoutBuilder<'a> {
    device: &'a Device,
    label: Option<&'a str>,
    entries: Vec<wgpu::BindGroupLayoutEntry>,
}

impl<'a> BindGroupLayoutBuilder<'a> {
    fn new(device: &'a Device) -> Self {
        Self {
            device,
            label: None,
            entries: Vec::new(),
        }
    }

    pub fn label(mut self, label: &'a str) -> Self {
        self.label = Some(label);
        self
    }

    pub fn uniform(mut self, binding: u32, visibility: ShaderStages) -> Self {
        self.entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        });
        self
    }

    pub fn storage(mut self, binding: u32, visibility: ShaderStages, read_only: bool) -> Self {
        self.entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        });
        self
    }

    pub fn texture_2d(mut self, binding: u32, visibility: ShaderStages) -> Self {
        self.entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        self
    }

    pub fn storage_texture_2d(
        mut self,
        binding: u32,
        visibility: ShaderStages,
        access: wgpu::StorageTextureAccess,
        format: TextureFormat,
    ) -> Self {
        self.entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::StorageTexture {
                access,
                format,
                view_dimension: wgpu::TextureViewDimension::D2,
            },
            count: None,
        });
        self
    }

    pub fn build(self) -> BindGroupLayout {
        self.device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: self.label,
                entries: &self.entries,
            })
    }
}

pub struct BindGroupBuilder<'a> {
    device: &'a Device,
    layout: &'a BindGroupLayout,
    label: Option<&'a str>,
    entries: Vec<wgpu::BindGroupEntry<'a>>,
}

impl<'a> BindGroupBuilder<'a> {
    fn new(device: &'a Device, layout: &'a BindGroupLayout) -> Self {
        Self {
            device,
            layout,
            label: None,
            entries: Vec::new(),
        }
    }

    pub fn label(mut self, label: &'a str) -> Self {
        self.label = Some(label);
        self
    }

    pub fn buffer(mut self, binding: u32, buffer: &'a Buffer) -> Self {
        self.entries.push(wgpu::BindGroupEntry {
            binding,
            resource: buffer.as_entire_binding(),
        });
        self
    }

    pub fn texture(mut self, binding: u32, view: &'a wgpu::TextureView) -> Self {
        self.entries.push(wgpu::BindGroupEntry {
            binding,
            resource: wgpu::BindingResource::TextureView(view),
        });
        self
    }

    pub fn build(self) -> BindGroup {
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: self.label,
            layout: self.layout,
            entries: &self.entries,
        })
    }
}

pub struct PipelineLayoutBuilder<'a> {
    device: &'a Device,
    label: Option<&'a str>,
    bind_group_layouts: Vec<&'a BindGroupLayout>,
}

impl<'a> PipelineLayoutBuilder<'a> {
    fn new(device: &'a Device) -> Self {
        Self {
            device,
            label: None,
            bind_group_layouts: Vec::new(),
        }
    }

    pub fn label(mut self, label: &'a str) -> Self {
        self.label = Some(label);
        self
    }

    pub fn bind_group_layouts(mut self, layouts: &[&'a BindGroupLayout]) -> Self {
        self.bind_group_layouts.extend_from_slice(layouts);
        self
    }

    pub fn build(self) -> wgpu::PipelineLayout {
        self.device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: self.label,
                bind_group_layouts: &self.bind_group_layouts,
                push_constant_ranges: &[],
            })
    }
}

pub struct ComputePipelineBuilder<'a> {
    device: &'a Device,
    label: Option<&'a str>,
    layout: Option<&'a wgpu::PipelineLayout>,
    shader: Option<(&'a ShaderModule, &'a str)>,
}

impl<'a> ComputePipelineBuilder<'a> {
    fn new(device: &'a Device) -> Self {
        Self {
            device,
            label: None,
            layout: None,
            shader: None,
        }
    }

    pub fn label(mut self, label: &'a str) -> Self {
        self.label = Some(label);
        self
    }

    pub fn layout(mut self, layout: &'a wgpu::PipelineLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn shader(mut self, shader: &'a ShaderModule, entry_point: &'a str) -> Self {
        self.shader = Some((shader, entry_point));
        self
    }

    pub fn build(self) -> Result<ComputePipeline, &'static str> {
        let layout = self.layout.ok_or("pipeline layout is required")?;
        let (module, entry_point) = self.shader.ok_or("compute shader is required")?;

        Ok(self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: self.label,
                layout: Some(layout),
                module,
                entry_point,
                compilation_options: Default::default(),
            }))
    }
}

/// Fullscreen blit pipeline: no vertex buffers, replace blending.
pub fn blit_pipeline(
    device: &Device,
    layout: &wgpu::PipelineLayout,
    shader: &ShaderModule,
    format: TextureFormat,
) -> RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Present Blit Pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: "vs_main",
            compilation_options: Default::default(),
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: "fs_main",
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    })
}

/// Write helpers over `wgpu::Queue`.
pub trait QueueExt {
    fn write_buffer_data<T: bytemuck::Pod>(&self, buffer: &Buffer, offset: u64, data: &T);
    fn write_buffer_slice<T: bytemuck::Pod>(&self, buffer: &Buffer, offset: u64, data: &[T]);
}

impl QueueExt for Queue {
    fn write_buffer_data<T: bytemuck::Pod>(&self, buffer: &Buffer, offset: u64, data: &T) {
        self.write_buffer(
            buffer,
            offset,
            bytemuck::cast_slice(std::slice::from_ref(data)),
        );
    }

    fn write_buffer_slice<T: bytemuck::Pod>(&self, buffer: &Buffer, offset: u64, data: &[T]) {
        self.write_buffer(buffer, offset, bytemuck::cast_slice(data));
    }
}
