//! A single fuzzing iteration.

use crate::archive::archive_failure_case;
use crate::driver::{run_with_timeout, EXEC_TIMED_OUT};
use crate::oracle::{mutant_matches_reference, BugKind};
use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tensure_backend::FuzzBackend;
use tensure_generator::{generate_random_einsum, generate_tensor_data};
use tensure_kernel::formats::TensorFileFormat;
use tensure_kernel::kernel::Kernel;
use tensure_mutator::MutationEngine;
use tracing::{error, info, warn};

/// Added to the execution timeout each time a mutant times out.
const TIMEOUT_STEP_MS: u64 = 4000;

/// Configuration for a fuzzing run.
#[derive(Debug, Clone)]
pub struct FuzzConfig {
    pub base_seed: u64,
    pub max_iterations: usize,
    pub timeout_ms: u64,
    pub tensor_format: TensorFileFormat,
    pub out_root: PathBuf,
    pub max_mutants: usize,
    /// Keep passing iteration directories instead of removing them.
    pub keep_passing: bool,
}

impl Default for FuzzConfig {
    fn default() -> Self {
        Self {
            base_seed: 42,
            max_iterations: 1000,
            timeout_ms: 30_000,
            tensor_format: TensorFileFormat::Tns,
            out_root: PathBuf::from("fuzz_output"),
            max_mutants: tensure_mutator::DEFAULT_MAX_MUTANTS,
            keep_passing: false,
        }
    }
}

/// Run-wide tallies. The only state fuzzing jobs share.
#[derive(Debug, Default)]
pub struct Counters {
    pub completed_runs: AtomicUsize,
    pub ref_crash_count: AtomicUsize,
    pub crash_bug_count: AtomicUsize,
    pub wrong_code_count: AtomicUsize,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Scope guard for one iteration: bumps `completed_runs` exactly once and
/// removes the iteration directory unless the job archived it, on every exit
/// path including panics inside the job body.
struct IterationScope<'a> {
    counters: &'a Counters,
    iter_dir: PathBuf,
    keep: bool,
}

impl<'a> IterationScope<'a> {
    fn new(counters: &'a Counters, iter_dir: PathBuf, keep: bool) -> Self {
        Self {
            counters,
            iter_dir,
            keep,
        }
    }

    fn mark_archived(&mut self) {
        self.keep = true;
    }
}

impl Drop for IterationScope<'_> {
    fn drop(&mut self) {
        self.counters.completed_runs.fetch_add(1, Ordering::SeqCst);
        if !self.keep && self.iter_dir.exists() {
            if let Err(e) = fs::remove_dir_all(&self.iter_dir) {
                warn!(dir = %self.iter_dir.display(), error = %e, "failed to remove iteration directory");
            }
        }
    }
}

fn timestamp_str() -> String {
    chrono::Local::now().format("%Y%m%d-%H%M%S").to_string()
}

/// Run one complete fuzzing job.
pub fn run_iteration(
    iter: usize,
    backend: &Arc<dyn FuzzBackend>,
    cfg: &FuzzConfig,
    counters: &Counters,
    terminate: &AtomicBool,
) {
    let iter_id = format!("iter_{}_{}", iter, timestamp_str());
    let iter_dir = cfg.out_root.join("corpus").join(&iter_id);
    let mut scope = IterationScope::new(counters, iter_dir.clone(), cfg.keep_passing);

    if terminate.load(Ordering::Relaxed) {
        return;
    }

    if let Err(e) = run_iteration_inner(iter, &iter_id, backend, cfg, counters, terminate, &mut scope)
    {
        error!(iter, error = %e, "fuzzing iteration aborted");
    }
}

#[allow(clippy::too_many_arguments)]
fn run_iteration_inner(
    iter: usize,
    iter_id: &str,
    backend: &Arc<dyn FuzzBackend>,
    cfg: &FuzzConfig,
    counters: &Counters,
    terminate: &AtomicBool,
    scope: &mut IterationScope<'_>,
) -> Result<()> {
    let mut rng = fastrand::Rng::with_seed(cfg.base_seed.wrapping_add(iter as u64));

    let iter_dir = cfg.out_root.join("corpus").join(iter_id);
    let fail_dir = cfg.out_root.join("failures");
    let data_dir = iter_dir.join("data");
    fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create iteration directory {}", iter_dir.display()))?;
    info!(iter_id, "starting fuzzing job");

    // 1) Synthesize a random contraction.
    let num_inputs = rng.usize(2..=5);
    let (tensors, expression) = generate_random_einsum(&mut rng, num_inputs, 6);
    info!(%expression, "generated random einsum");

    // 2) Materialize input tensor data.
    let data_files = generate_tensor_data(&tensors, &data_dir, "", cfg.tensor_format, &mut rng);
    if data_files.len() != tensors.len() - 1 {
        warn!(iter_id, "tensor data generation failed, skipping iteration");
        return Ok(());
    }

    // 3) Write the reference kernel description.
    let kernel = Kernel::reference(tensors, &expression, &data_files);
    kernel.save(&iter_dir.join("kernel.json"))?;

    // 4) Derive equivalent mutants.
    let engine = MutationEngine::new();
    let kernel_files =
        engine.mutate_equivalent_kernel(&iter_dir, "kernel.json", cfg.max_mutants, &mut rng)?;
    info!(mutants = kernel_files.len() - 1, "generated equivalent mutants");

    // 5) Backend translation of seed + mutants.
    let backend_dir = iter_dir.join("backend_kernel");
    fs::create_dir_all(&backend_dir)?;
    if !backend.generate_kernel(&kernel_files, &backend_dir) {
        warn!(iter_id, "backend kernel generation failed, skipping iteration");
        return Ok(());
    }

    // 6) Reference execution establishes the baseline.
    let ext = cfg.tensor_format.extension();
    let ref_out_dir = data_dir.join("ref_out");
    fs::create_dir_all(&ref_out_dir)?;

    let mut timeout = cfg.timeout_ms;
    let ref_artifact = backend_dir.join("kernel");
    let ref_code = run_with_timeout(backend, &ref_artifact, &ref_out_dir, timeout);
    if ref_code != 0 {
        let reason = if ref_code == EXEC_TIMED_OUT {
            "reference kernel execution timed out".to_string()
        } else {
            format!("reference kernel execution failed with code {ref_code}")
        };
        info!(iter_id, code = ref_code, "reference kernel crash/timeout");
        counters.ref_crash_count.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = archive_failure_case(
            &fail_dir.join(BugKind::RefCrash.bucket()),
            iter_id,
            &iter_dir,
            &ref_artifact,
            &reason,
        ) {
            error!(iter_id, error = %e, "failed to archive reference crash");
        }
        scope.mark_archived();
        return Ok(());
    }

    // The seed artifact's output is the comparison baseline; keep a copy next
    // to the input data so archived cases carry the expected result.
    let mut ref_output = ref_artifact.join(format!("results.{ext}"));
    let ref_out_copy = ref_out_dir.join(format!("results.{ext}"));
    if ref_output.exists() {
        fs::copy(&ref_output, &ref_out_copy)?;
        ref_output = ref_out_copy;
    }

    // 7) Execute each mutant and compare against the baseline.
    for k in 1..kernel_files.len() {
        if terminate.load(Ordering::Relaxed) {
            break;
        }
        let mutant_dir = backend_dir.join(format!("kernel{k}"));

        loop {
            let code = run_with_timeout(backend, &mutant_dir, &ref_out_dir, timeout);

            if code == EXEC_TIMED_OUT {
                timeout += TIMEOUT_STEP_MS;
                info!(
                    iter_id,
                    mutant = k,
                    timeout_ms = timeout,
                    "mutant timed out, extending timeout and retrying"
                );
                continue;
            }

            if code != 0 {
                info!(iter_id, mutant = k, code, "crashing bug found");
                counters.crash_bug_count.fetch_add(1, Ordering::SeqCst);
                if let Err(e) = archive_failure_case(
                    &fail_dir.join(BugKind::Crash.bucket()),
                    iter_id,
                    &iter_dir,
                    &mutant_dir,
                    &format!("mutated kernel execution failed with code {code}"),
                ) {
                    error!(iter_id, error = %e, "failed to archive crash");
                }
                scope.mark_archived();
                return Ok(());
            }

            let mutant_output = mutant_dir.join(format!("results.{ext}"));
            if !mutant_matches_reference(backend, &ref_output, &mutant_output) {
                info!(iter_id, mutant = k, "wrong code bug found");
                counters.wrong_code_count.fetch_add(1, Ordering::SeqCst);
                if let Err(e) = archive_failure_case(
                    &fail_dir.join(BugKind::WrongCode.bucket()),
                    iter_id,
                    &iter_dir,
                    &mutant_dir,
                    "mutated kernel produced incorrect results",
                ) {
                    error!(iter_id, error = %e, "failed to archive wrong-code case");
                }
                scope.mark_archived();
                return Ok(());
            }
            break;
        }
    }

    Ok(())
}
