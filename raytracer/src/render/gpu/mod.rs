pub mod builders;
pub mod resources;

pub use builders::{QueueExt, WgpuExt};
pub use resources::GpuContext;
