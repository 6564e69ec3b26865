pub mod device;
pub mod gpu;
pub mod hardware;
pub mod pipeline;
pub mod present;
pub mod software;
pub mod wrapper;

pub use gpu::GpuContext;
pub use hardware::{FrameStats, HardwareRenderer};
pub use software::SoftwareRenderer;
pub use wrapper::{create_renderer, render_with, Backend, RenderWrapper, RendererConfig, SceneRenderer};

use std::fmt;

/// Errors surfaced by the rendering layer. Construction failures abort
/// initialization; per-frame failures drop the frame and leave the renderer
/// ready for the next one. Nothing is retried.
#[derive(Debug)]
pub enum RenderError {
    /// No compatible compute device was found.
    NoAdapter,
    DeviceRequest(String),
    /// Kernel program compilation or pipeline creation failed.
    ProgramBuild(String),
    /// Device memory could not satisfy a buffer growth request.
    Allocation { label: &'static str, bytes: u64 },
    /// A kernel dispatch or per-frame device operation failed.
    Dispatch(String),
    Surface(wgpu::SurfaceError),
    /// A required resource is not available in this configuration.
    NotReady(&'static str),
    Asset(scenegraph::AssetError),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::NoAdapter => write!(f, "no compatible compute device found"),
            RenderError::DeviceRequest(msg) => write!(f, "device request failed: {msg}"),
            RenderError::ProgramBuild(msg) => write!(f, "kernel program build failed: {msg}"),
            RenderError::Allocation { label, bytes } => {
                write!(f, "failed to allocate {bytes} bytes for {label}")
            }
            RenderError::Dispatch(msg) => write!(f, "device dispatch failed: {msg}"),
            RenderError::Surface(err) => write!(f, "presentation surface error: {err}"),
            RenderError::NotReady(what) => write!(f, "resource not ready: {what}"),
            RenderError::Asset(err) => write!(f, "asset error: {err}"),
        }
    }
}

impl std::error::Error for RenderError {}

impl From<scenegraph::AssetError> for RenderError {
    fn from(err: scenegraph::AssetError) -> Self {
        RenderError::Asset(err)
    }
}

impl From<wgpu::SurfaceError> for RenderError {
    fn from(err: wgpu::SurfaceError) -> Self {
        RenderError::Surface(err)
    }
}
