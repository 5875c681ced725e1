//! CLI wiring for the TenSure fuzzer.

use crate::job::FuzzConfig;
use clap::Parser;
use std::env;
use std::path::PathBuf;
use tensure_kernel::formats::TensorFileFormat;
use tracing::warn;

#[derive(Parser, Debug)]
#[command(name = "tensure", about = "Differential fuzzer for sparse tensor compilers")]
pub struct Cli {
    /// Backend plugin to load (falls back to the BACKEND_LIB environment
    /// variable).
    #[arg(long, short = 'b')]
    pub backend: Option<PathBuf>,

    /// Initial execution timeout in milliseconds.
    #[arg(long, default_value_t = 30_000)]
    pub timeout: u64,

    /// Tensor data file format: tns or ttx.
    #[arg(long = "tensor-format", visible_alias = "tfmt", default_value = "tns")]
    pub tensor_format: String,

    /// Root directory for corpus and failure artifacts.
    #[arg(long, default_value = "fuzz_output")]
    pub out_root: PathBuf,

    /// Maximum number of mutants per iteration.
    #[arg(long, default_value_t = tensure_mutator::DEFAULT_MAX_MUTANTS)]
    pub mutants: usize,

    /// Keep passing iteration directories instead of removing them.
    #[arg(long, default_value_t = false)]
    pub keep_passing: bool,
}

impl Cli {
    /// The backend path, falling back to `BACKEND_LIB`.
    pub fn resolve_backend(&self) -> Option<PathBuf> {
        self.backend
            .clone()
            .or_else(|| env::var_os("BACKEND_LIB").map(PathBuf::from))
    }

    /// Parse the tensor format, warning and keeping the default on
    /// unsupported values.
    pub fn resolve_tensor_format(&self) -> TensorFileFormat {
        match self.tensor_format.parse() {
            Ok(format) => format,
            Err(_) => {
                warn!(
                    requested = %self.tensor_format,
                    "unsupported tensor storage format, keeping tns"
                );
                eprintln!(
                    "Unsupported tensor storage format: {}",
                    self.tensor_format
                );
                TensorFileFormat::Tns
            }
        }
    }

    /// Assemble the run configuration, reading `FUZZ_SEED` and `FUZZ_ITERS`
    /// from the environment.
    pub fn to_config(&self) -> FuzzConfig {
        FuzzConfig {
            base_seed: env_or("FUZZ_SEED", 42),
            max_iterations: env_or("FUZZ_ITERS", 1000),
            timeout_ms: self.timeout,
            tensor_format: self.resolve_tensor_format(),
            out_root: self.out_root.clone(),
            max_mutants: self.mutants,
            keep_passing: self.keep_passing,
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
