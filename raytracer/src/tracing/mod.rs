pub mod intersect;
pub mod ray;
pub mod synthesis;

pub use intersect::{ray_triangle, Hit};
pub use ray::{pixel_of, ray_index, GridSampler, Ray, RayGenerator, SamplePattern};
pub use synthesis::{
    accumulate, clear_synthesis, compose, SynthesisRecord, HIT_EPSILON, NO_MATERIAL,
};
