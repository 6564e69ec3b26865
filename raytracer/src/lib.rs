pub mod render;
pub mod tracing;

/// WGSL source for the staged tracing kernels, registered into an
/// [`scenegraph::AssetLibrary`] under this name by the application.
pub const TRACER_SHADER_ASSET: &str = "tracer.wgsl";

/// WGSL source for the presentation blit.
pub const BLIT_SHADER_ASSET: &str = "blit.wgsl";
