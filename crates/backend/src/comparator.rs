//! Default result comparison.

use anyhow::Result;
use std::path::Path;
use tensure_kernel::formats::read_coordinate_file;

/// Default elementwise tolerance for result comparison.
pub const DEFAULT_TOLERANCE: f64 = 1e-5;

/// Compare two result files as `coordinate → value` maps.
///
/// The files agree when they hold the same number of nonzeros and every
/// reference entry has a counterpart within `tolerance`. Backends with their
/// own comparison semantics override [`crate::FuzzBackend::compare_results`]
/// instead of calling this.
pub fn compare_outputs(ref_path: &Path, test_path: &Path, tolerance: f64) -> Result<bool> {
    let reference = read_coordinate_file(ref_path)?;
    let candidate = read_coordinate_file(test_path)?;

    if reference.len() != candidate.len() {
        return Ok(false);
    }
    for (coordinate, value) in &reference {
        match candidate.get(coordinate) {
            Some(other) if (value - other).abs() <= tolerance => {}
            _ => return Ok(false),
        }
    }
    Ok(true)
}
