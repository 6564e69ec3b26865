use glam::Vec3;

use crate::buffer::LinearBuffer;

/// Index into the scene's mesh list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3) -> Self {
        Self { position, normal }
    }
}

/// An indexed triangle list. May be empty, in which case it contributes
/// nothing to a frame.
#[derive(Clone, Debug, Default)]
pub struct TriangleMesh {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
}

impl TriangleMesh {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        debug_assert!(indices.len() % 3 == 0, "index count must be a multiple of 3");
        debug_assert!(
            indices.iter().all(|&i| (i as usize) < vertices.len()),
            "index out of vertex range"
        );
        Self { vertices, indices }
    }

    /// Build a mesh from raw interleaved data held in linear buffers:
    /// six floats per vertex (position, normal), `u32` indices.
    pub fn from_buffers(
        vertex_data: &dyn LinearBuffer,
        index_data: &dyn LinearBuffer,
    ) -> Option<Self> {
        let floats: &[f32] = bytemuck::try_cast_slice(vertex_data.as_slice()).ok()?;
        let indices: &[u32] = bytemuck::try_cast_slice(index_data.as_slice()).ok()?;
        if floats.len() % 6 != 0 {
            return None;
        }

        let vertices = floats
            .chunks_exact(6)
            .map(|v| Vertex::new(Vec3::new(v[0], v[1], v[2]), Vec3::new(v[3], v[4], v[5])))
            .collect::<Vec<_>>();
        if indices.len() % 3 != 0 || indices.iter().any(|&i| (i as usize) >= vertices.len()) {
            return None;
        }

        Some(Self {
            vertices,
            indices: indices.to_vec(),
        })
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Axis-aligned cube centered at the origin, one normal per face.
    pub fn cube(half_extent: f32) -> Self {
        let h = half_extent;
        let faces: [(Vec3, Vec3, Vec3); 6] = [
            (Vec3::X, Vec3::Y, Vec3::Z),
            (-Vec3::X, Vec3::Y, -Vec3::Z),
            (Vec3::Y, Vec3::Z, Vec3::X),
            (-Vec3::Y, -Vec3::Z, Vec3::X),
            (Vec3::Z, Vec3::Y, -Vec3::X),
            (-Vec3::Z, Vec3::Y, Vec3::X),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, up, right) in faces {
            let base = vertices.len() as u32;
            for (u, v) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                let position = (normal + right * u + up * v) * h;
                vertices.push(Vertex::new(position, normal));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self::new(vertices, indices)
    }

    /// Two-triangle quad in the XZ plane facing +Y.
    pub fn ground_quad(half_extent: f32) -> Self {
        let h = half_extent;
        let vertices = vec![
            Vertex::new(Vec3::new(-h, 0.0, -h), Vec3::Y),
            Vertex::new(Vec3::new(h, 0.0, -h), Vec3::Y),
            Vertex::new(Vec3::new(h, 0.0, h), Vec3::Y),
            Vertex::new(Vec3::new(-h, 0.0, h), Vec3::Y),
        ];
        Self::new(vertices, vec![0, 1, 2, 0, 2, 3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::HeapBuffer;

    #[test]
    fn cube_has_twelve_triangles() {
        let cube = TriangleMesh::cube(1.0);
        assert_eq!(cube.vertices().len(), 24);
        assert_eq!(cube.triangle_count(), 12);

        // Every vertex sits on the surface of the cube.
        for vertex in cube.vertices() {
            let p = vertex.position.abs();
            assert!((p.max_element() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn mesh_from_linear_buffers() {
        let floats: Vec<f32> = vec![
            0.0, 0.0, 0.0, 0.0, 1.0, 0.0, //
            1.0, 0.0, 0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, 1.0, 0.0,
        ];
        let indices: Vec<u32> = vec![0, 1, 2];

        let vertex_data = HeapBuffer::from_bytes(bytemuck::cast_slice(&floats));
        let index_data = HeapBuffer::from_bytes(bytemuck::cast_slice(&indices));

        let mesh = TriangleMesh::from_buffers(&vertex_data, &index_data).unwrap();
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.vertices()[1].position, Vec3::X);
    }

    #[test]
    fn malformed_buffer_data_is_rejected() {
        let vertex_data = HeapBuffer::from_bytes(bytemuck::cast_slice(&[0.0f32; 5]));
        let index_data = HeapBuffer::from_bytes(bytemuck::cast_slice(&[0u32; 3]));
        assert!(TriangleMesh::from_buffers(&vertex_data, &index_data).is_none());
    }
}
