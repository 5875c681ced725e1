//! Backend contract.
//!
//! A backend translates kernel descriptions into its own executable
//! artifacts, runs them, and compares result files. The fuzzing core treats
//! it as opaque: the whole surface is the three operations of [`FuzzBackend`].

pub mod comparator;
pub mod plugin;

use std::path::{Path, PathBuf};

/// The operations a backend plugin exposes to the fuzzer.
///
/// Artifact convention: `generate_kernel` places the artifact for
/// `kernel.json` under `output_dir/kernel/` and for `kernel<k>.json` under
/// `output_dir/kernel<k>/`. `execute_kernel` writes the computed output
/// tensor to `<artifact_dir>/results.<fmt>`.
pub trait FuzzBackend: Send + Sync {
    /// Translate each kernel JSON into an executable artifact under
    /// `output_dir`. Returns `false` when any translation fails.
    fn generate_kernel(&self, kernel_files: &[PathBuf], output_dir: &Path) -> bool;

    /// Run one artifact. Returns 0 on success, a backend-defined positive
    /// code on failure. The `output_dir` argument is reserved for backends
    /// that separate artifacts from results.
    fn execute_kernel(&self, artifact_dir: &Path, output_dir: &Path) -> i32;

    /// Whether two result files agree within the backend's tolerance.
    fn compare_results(&self, ref_path: &Path, test_path: &Path) -> bool;
}
