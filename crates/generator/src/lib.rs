//! Random einsum and tensor data generation.
//!
//! Both generators are pure in the caller-supplied RNG: fuzzing jobs hand in
//! a stream seeded from `base_seed + iteration`, so any iteration can be
//! replayed bit for bit.

pub mod data;
pub mod einsum;

pub use data::generate_tensor_data;
pub use einsum::generate_random_einsum;
