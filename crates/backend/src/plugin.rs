//! Dynamic backend loading.
//!
//! Plugins expose two C-linkage entry points:
//!
//! ```c
//! BoxedBackend* create_backend(void);
//! void destroy_backend(BoxedBackend*);
//! ```
//!
//! where the handle is a boxed [`FuzzBackend`] trait object. The library
//! stays mapped for as long as the handle lives.

use crate::FuzzBackend;
use anyhow::{ensure, Context, Result};
use libloading::Library;
use std::path::Path;
use tracing::info;

/// The object handed across the plugin boundary.
pub type BoxedBackend = Box<dyn FuzzBackend>;

type CreateBackendFn = unsafe extern "C" fn() -> *mut BoxedBackend;
type DestroyBackendFn = unsafe extern "C" fn(*mut BoxedBackend);

/// A backend loaded from a shared library.
pub struct BackendPlugin {
    backend: *mut BoxedBackend,
    destroy: DestroyBackendFn,
    _library: Library,
}

// The pointee is a `FuzzBackend`, which is Send + Sync by contract, and the
// library it came from is kept alive alongside it.
unsafe impl Send for BackendPlugin {}
unsafe impl Sync for BackendPlugin {}

impl BackendPlugin {
    /// Load a backend plugin and instantiate its backend.
    pub fn load(path: &Path) -> Result<Self> {
        unsafe {
            let library = Library::new(path)
                .with_context(|| format!("failed to load backend library {}", path.display()))?;
            let create = *library
                .get::<CreateBackendFn>(b"create_backend")
                .with_context(|| format!("create_backend symbol not found in {}", path.display()))?;
            let destroy = *library
                .get::<DestroyBackendFn>(b"destroy_backend")
                .with_context(|| format!("destroy_backend symbol not found in {}", path.display()))?;

            let backend = create();
            ensure!(
                !backend.is_null(),
                "create_backend returned null for {}",
                path.display()
            );

            info!(path = %path.display(), "loaded backend plugin");
            Ok(Self {
                backend,
                destroy,
                _library: library,
            })
        }
    }

    fn backend(&self) -> &dyn FuzzBackend {
        unsafe { (*self.backend).as_ref() }
    }
}

impl FuzzBackend for BackendPlugin {
    fn generate_kernel(&self, kernel_files: &[std::path::PathBuf], output_dir: &Path) -> bool {
        self.backend().generate_kernel(kernel_files, output_dir)
    }

    fn execute_kernel(&self, artifact_dir: &Path, output_dir: &Path) -> i32 {
        self.backend().execute_kernel(artifact_dir, output_dir)
    }

    fn compare_results(&self, ref_path: &Path, test_path: &Path) -> bool {
        self.backend().compare_results(ref_path, test_path)
    }
}

impl Drop for BackendPlugin {
    fn drop(&mut self) {
        unsafe { (self.destroy)(self.backend) }
    }
}
