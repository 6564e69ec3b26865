use glam::Vec4;

/// Index into a [`MaterialLibrary`], stable for the library's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MaterialId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    pub diffuse: Vec4,
}

impl Material {
    pub fn new(diffuse: Vec4) -> Self {
        Self { diffuse }
    }
}

/// Packed device mirror of [`Material`].
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuMaterial {
    pub color: [f32; 4],
}

impl GpuMaterial {
    pub fn from_material(material: &Material) -> Self {
        Self {
            color: material.diffuse.to_array(),
        }
    }
}

/// Owns all materials referenced by the scene. Read-only during a frame;
/// the generation counter tells device mirrors when a re-upload is due.
#[derive(Default)]
pub struct MaterialLibrary {
    materials: Vec<Material>,
    generation: u64,
}

impl MaterialLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, material: Material) -> MaterialId {
        let id = MaterialId(self.materials.len() as u32);
        self.materials.push(material);
        self.generation += 1;
        id
    }

    pub fn get(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0 as usize)
    }

    pub fn set(&mut self, id: MaterialId, material: Material) {
        if let Some(slot) = self.materials.get_mut(id.0 as usize) {
            *slot = material;
            self.generation += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    /// Bumped on every content change.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn packed(&self) -> Vec<GpuMaterial> {
        self.materials.iter().map(GpuMaterial::from_material).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_tracks_content_changes() {
        let mut library = MaterialLibrary::new();
        let before = library.generation();

        let red = library.create(Material::new(Vec4::new(1.0, 0.0, 0.0, 1.0)));
        assert!(library.generation() > before);

        let at_create = library.generation();
        library.set(red, Material::new(Vec4::new(0.5, 0.0, 0.0, 1.0)));
        assert!(library.generation() > at_create);

        // Writing to a nonexistent slot changes nothing.
        let at_set = library.generation();
        library.set(MaterialId(99), Material::new(Vec4::ONE));
        assert_eq!(library.generation(), at_set);
    }

    #[test]
    fn packed_layout_matches_library_order() {
        let mut library = MaterialLibrary::new();
        library.create(Material::new(Vec4::new(1.0, 0.0, 0.0, 1.0)));
        library.create(Material::new(Vec4::new(0.0, 1.0, 0.0, 1.0)));

        let packed = library.packed();
        assert_eq!(packed.len(), 2);
        assert_eq!(packed[0].color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(packed[1].color, [0.0, 1.0, 0.0, 1.0]);
    }
}
