//! Differential oracle and bug classification.

use std::path::Path;
use std::sync::Arc;
use tensure_backend::FuzzBackend;

/// The bug classes the fuzzer reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BugKind {
    /// The backend crashed or timed out on the unmutated reference kernel.
    /// Not proof of a bug in the target, but the iteration has no baseline.
    RefCrash,
    /// A mutant crashed or aborted.
    Crash,
    /// A mutant computed numerically different results from the reference.
    WrongCode,
}

impl BugKind {
    /// Archival bucket under `failures/`.
    pub fn bucket(&self) -> &'static str {
        match self {
            BugKind::RefCrash => "ref_crash",
            BugKind::Crash => "crash",
            BugKind::WrongCode => "wc",
        }
    }
}

/// Whether a mutant's output matches the reference output, within the
/// backend's tolerance. The backend owns the comparison policy; the core
/// imposes none of its own.
pub fn mutant_matches_reference(
    backend: &Arc<dyn FuzzBackend>,
    ref_output: &Path,
    mutant_output: &Path,
) -> bool {
    backend.compare_results(ref_output, mutant_output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_names() {
        assert_eq!(BugKind::RefCrash.bucket(), "ref_crash");
        assert_eq!(BugKind::Crash.bucket(), "crash");
        assert_eq!(BugKind::WrongCode.bucket(), "wc");
    }
}
