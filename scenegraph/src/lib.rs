pub mod assets;
pub mod buffer;
pub mod camera;
pub mod flatten;
pub mod geometry;
pub mod material;
pub mod node;
pub mod scene;

pub use assets::{AssetError, AssetLibrary};
pub use buffer::{BufferError, HeapBuffer, LinearBuffer};
pub use camera::Camera;
pub use flatten::{flatten, RenderNode};
pub use geometry::{MeshId, TriangleMesh, Vertex};
pub use material::{GpuMaterial, Material, MaterialId, MaterialLibrary};
pub use node::{NodeData, SceneNode};
pub use scene::Scene;
