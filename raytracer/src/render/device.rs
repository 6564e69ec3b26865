use glam::{Mat4, Vec4};
use scenegraph::{MaterialLibrary, TriangleMesh, Vertex};

use crate::render::gpu::{QueueExt, WgpuExt};
use crate::render::RenderError;
use crate::tracing::{Ray, SynthesisRecord};

/// Device-side vertex layout: positions and normals padded to `vec4`.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuVertex {
    pub position: [f32; 4],
    pub normal: [f32; 4],
}

impl GpuVertex {
    pub fn from_vertex(vertex: &Vertex) -> Self {
        let p = vertex.position;
        let n = vertex.normal;
        Self {
            position: [p.x, p.y, p.z, 1.0],
            normal: [n.x, n.y, n.z, 0.0],
        }
    }
}

/// Per-frame constants shared by the clear and synthesize kernels.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameParams {
    pub width: u32,
    pub height: u32,
    pub samples: u32,
    pub material_count: u32,
    pub background: [f32; 4],
}

/// Per-dispatch constants for one node's intersection pass.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct NodeParams {
    pub index_count: u32,
    pub material: i32,
    pub node: i32,
    pub ray_count: u32,
}

/// A device buffer that grows to fit its content and never shrinks.
pub struct GrowableBuffer {
    label: &'static str,
    usage: wgpu::BufferUsages,
    buffer: wgpu::Buffer,
    capacity: u64,
}

impl GrowableBuffer {
    fn new(
        device: &wgpu::Device,
        label: &'static str,
        usage: wgpu::BufferUsages,
        initial: u64,
    ) -> Self {
        let buffer = device.buffer().label(label).usage(usage).empty(initial);
        Self {
            label,
            usage,
            buffer,
            capacity: initial,
        }
    }

    /// Grow to at least `bytes`, surfacing device out-of-memory as an
    /// allocation error. Returns whether the buffer was re-created (bind
    /// groups referencing it must be rebuilt).
    pub fn ensure_capacity(
        &mut self,
        device: &wgpu::Device,
        bytes: u64,
    ) -> Result<bool, RenderError> {
        if bytes <= self.capacity {
            return Ok(false);
        }

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = device
            .buffer()
            .label(self.label)
            .usage(self.usage)
            .empty(bytes);
        let _ = device.poll(wgpu::Maintain::Poll);
        if pollster::block_on(device.pop_error_scope()).is_some() {
            return Err(RenderError::Allocation {
                label: self.label,
                bytes,
            });
        }

        self.buffer = buffer;
        self.capacity = bytes;
        Ok(true)
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }
}

const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Owns every device buffer of the tracing pipeline and its sizing rules.
/// Ray and synthesis buffers are rewritten every frame; geometry buffers
/// are per-node scratch; the material mirror re-uploads only when the
/// library generation moves.
pub struct DeviceBuffers {
    pub rays: GrowableBuffer,
    pub synthesis: GrowableBuffer,
    pub vertices: GrowableBuffer,
    pub indices: GrowableBuffer,
    pub materials: wgpu::Buffer,
    material_generation: Option<u64>,
    pub frame: wgpu::Buffer,
    pub node_params: wgpu::Buffer,
    pub transform: wgpu::Buffer,
    pub output: wgpu::Texture,
    pub output_view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl DeviceBuffers {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Result<Self, RenderError> {
        let storage = wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST;
        let ray_stride = std::mem::size_of::<Ray>() as u64;
        let record_stride = std::mem::size_of::<SynthesisRecord>() as u64;
        let vertex_stride = std::mem::size_of::<GpuVertex>() as u64;

        let rays = GrowableBuffer::new(device, "Ray Buffer", storage, ray_stride);
        let synthesis = GrowableBuffer::new(device, "Synthesis Buffer", storage, record_stride);
        let vertices = GrowableBuffer::new(device, "Node Vertex Buffer", storage, vertex_stride);
        let indices = GrowableBuffer::new(device, "Node Index Buffer", storage, 4);

        let materials = device
            .buffer()
            .label("Material Buffer")
            .storage(&[scenegraph::GpuMaterial {
                color: [0.0; 4],
            }]);

        let frame = device.buffer().label("Frame Params").uniform(&FrameParams {
            width,
            height,
            samples: 1,
            material_count: 0,
            background: [0.0; 4],
        });
        let node_params = device.buffer().label("Node Params").uniform(&NodeParams {
            index_count: 0,
            material: -1,
            node: -1,
            ray_count: 0,
        });
        let transform = device
            .buffer()
            .label("Node Transform")
            .uniform(&Mat4::IDENTITY.to_cols_array_2d());

        let (output, output_view) = Self::create_output(device, width, height);

        Ok(Self {
            rays,
            synthesis,
            vertices,
            indices,
            materials,
            material_generation: None,
            frame,
            node_params,
            transform,
            output,
            output_view,
            width,
            height,
        })
    }

    fn create_output(
        device: &wgpu::Device,
        width: u32,
        height: u32,
    ) -> (wgpu::Texture, wgpu::TextureView) {
        let output = device
            .texture()
            .label("Output Image")
            .size_2d(width.max(1), height.max(1))
            .format(OUTPUT_FORMAT)
            .usage(
                wgpu::TextureUsages::STORAGE_BINDING
                    | wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_SRC,
            )
            .build();
        let view = output.create_view(&wgpu::TextureViewDescriptor::default());
        (output, view)
    }

    pub fn output_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Size the ray and synthesis buffers for `ray_count` rays. Both share
    /// cardinality and grow together.
    pub fn ensure_ray_capacity(
        &mut self,
        device: &wgpu::Device,
        ray_count: usize,
    ) -> Result<bool, RenderError> {
        let ray_bytes = (ray_count * std::mem::size_of::<Ray>()) as u64;
        let record_bytes = (ray_count * std::mem::size_of::<SynthesisRecord>()) as u64;

        let a = self.rays.ensure_capacity(device, ray_bytes)?;
        let b = self.synthesis.ensure_capacity(device, record_bytes)?;
        Ok(a || b)
    }

    pub fn upload_rays(&self, queue: &wgpu::Queue, rays: &[Ray]) {
        queue.write_buffer_slice(self.rays.buffer(), 0, rays);
    }

    /// Stage one node's geometry into the scratch buffers. Returns whether
    /// either buffer was re-created.
    pub fn upload_node_geometry(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        mesh: &TriangleMesh,
    ) -> Result<bool, RenderError> {
        let vertices: Vec<GpuVertex> = mesh.vertices().iter().map(GpuVertex::from_vertex).collect();
        let vertex_bytes = (vertices.len() * std::mem::size_of::<GpuVertex>()) as u64;
        let index_bytes = (mesh.indices().len() * std::mem::size_of::<u32>()) as u64;

        let a = self.vertices.ensure_capacity(device, vertex_bytes)?;
        let b = self.indices.ensure_capacity(device, index_bytes)?;

        queue.write_buffer_slice(self.vertices.buffer(), 0, &vertices);
        queue.write_buffer_slice(self.indices.buffer(), 0, mesh.indices());
        Ok(a || b)
    }

    /// Mirror the material table to the device if its content changed since
    /// the last upload. Returns whether the buffer was re-created.
    pub fn upload_materials(&mut self, device: &wgpu::Device, library: &MaterialLibrary) -> bool {
        if self.material_generation == Some(library.generation()) {
            return false;
        }

        let mut packed = library.packed();
        if packed.is_empty() {
            packed.push(scenegraph::GpuMaterial { color: [0.0; 4] });
        }
        self.materials = device.buffer().label("Material Buffer").storage(&packed);
        self.material_generation = Some(library.generation());
        true
    }

    pub fn write_frame_params(&self, queue: &wgpu::Queue, params: &FrameParams) {
        queue.write_buffer_data(&self.frame, 0, params);
    }

    pub fn write_node_params(&self, queue: &wgpu::Queue, params: &NodeParams) {
        queue.write_buffer_data(&self.node_params, 0, params);
    }

    pub fn write_transform(&self, queue: &wgpu::Queue, transform: &Mat4) {
        queue.write_buffer_data(&self.transform, 0, &transform.to_cols_array_2d());
    }

    /// Re-create the output image for a new resolution. Ray and synthesis
    /// growth happens on the next `prepare_camera`.
    pub fn resize_output(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        let (output, view) = Self::create_output(device, self.width, self.height);
        self.output = output;
        self.output_view = view;
    }

    pub fn frame_params(&self, background: Vec4, samples: u32, material_count: u32) -> FrameParams {
        FrameParams {
            width: self.width,
            height: self.height,
            samples,
            material_count,
            background: background.to_array(),
        }
    }
}
