//! Timed backend execution.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tensure_backend::FuzzBackend;
use tracing::{error, warn};

/// Driver return code for a backend that panicked during execution.
pub const EXEC_PANICKED: i32 = -1;

/// Driver return code for an execution that exceeded its timeout.
pub const EXEC_TIMED_OUT: i32 = -2;

/// Run one artifact under `timeout_ms`.
///
/// The backend call runs on a dedicated thread. On timeout the call is
/// abandoned: the driver returns [`EXEC_TIMED_OUT`] immediately and never
/// joins the thread, which finishes (or hangs) on its own. A completion that
/// arrives after the deadline is discarded and cannot change the result.
pub fn run_with_timeout(
    backend: &Arc<dyn FuzzBackend>,
    artifact_dir: &Path,
    output_dir: &Path,
    timeout_ms: u64,
) -> i32 {
    let (tx, rx) = mpsc::channel();
    let backend = Arc::clone(backend);
    let artifact = artifact_dir.to_path_buf();
    let output = output_dir.to_path_buf();

    thread::spawn(move || {
        let result =
            panic::catch_unwind(AssertUnwindSafe(|| backend.execute_kernel(&artifact, &output)));
        // The receiver may be gone already if the driver timed out.
        let _ = tx.send(result);
    });

    match rx.recv_timeout(Duration::from_millis(timeout_ms)) {
        Ok(Ok(code)) => code,
        Ok(Err(_)) => {
            error!(artifact = %artifact_dir.display(), "backend panicked during execution");
            EXEC_PANICKED
        }
        Err(_) => {
            warn!(
                artifact = %artifact_dir.display(),
                timeout_ms,
                "execution timed out, abandoning the in-flight task"
            );
            EXEC_TIMED_OUT
        }
    }
}
