//! Kernel descriptions for einsum fuzzing.
//!
//! A kernel description ties together a set of tensor descriptors, a single
//! einsum expression over them, and the data files backing the input tensors.
//! Descriptions are written as JSON and consumed read-only by backends.
//!
//! # Key components
//!
//! - [`tensor::TensorDesc`]: one tensor of the contraction (name, indices,
//!   shape, per-dimension storage, data file)
//! - [`kernel::Kernel`]: the full description with atomic JSON save/load
//! - [`formats::TensorFileFormat`]: the coordinate-list data file formats

pub mod formats;
pub mod kernel;
pub mod tensor;

pub use formats::{CoordinateData, TensorFileFormat};
pub use kernel::{Computation, Kernel};
pub use tensor::{StorageFormat, TensorDesc, INDEX_ALPHABET, OUTPUT_DATA_FILE};
