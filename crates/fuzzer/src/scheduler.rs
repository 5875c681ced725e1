//! Worker-pool scheduling and progress monitoring.

use crate::job::{run_iteration, Counters, FuzzConfig};
use anyhow::Result;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tensure_backend::FuzzBackend;
use tracing::{error, info};

/// Producer sleep while too many jobs are outstanding.
const PRODUCER_THROTTLE: Duration = Duration::from_millis(500);

/// Monitor reporting interval.
const MONITOR_INTERVAL: Duration = Duration::from_secs(2);

/// Final tallies of a fuzzing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuzzSummary {
    pub scheduled: usize,
    pub completed: usize,
    pub ref_crashes: usize,
    pub crash_bugs: usize,
    pub wrong_code_bugs: usize,
    pub terminated: bool,
}

/// Worker pool size: hardware threads with a floor of four.
pub fn worker_count() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(0)
        .max(4)
}

/// Drive `cfg.max_iterations` fuzzing jobs across a fixed worker pool.
///
/// The producer enqueues jobs into the pool's FIFO, sleeping while more than
/// `2 * workers` are outstanding. The calling thread then monitors progress
/// until every scheduled job has completed; jobs observe `terminate` at
/// iteration boundaries and between mutants, so a signal drains the queue
/// instead of tearing it down.
pub fn run_fuzzer(
    backend: Arc<dyn FuzzBackend>,
    cfg: FuzzConfig,
    terminate: Arc<AtomicBool>,
) -> Result<FuzzSummary> {
    fs::create_dir_all(cfg.out_root.join("corpus"))?;
    fs::create_dir_all(cfg.out_root.join("failures"))?;

    let workers = worker_count();
    info!(workers, iterations = cfg.max_iterations, "starting worker pool");
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        // A panicking job must not tear the pool down; its scope guard has
        // already counted it as completed during unwinding.
        .panic_handler(|_| error!("fuzzing job panicked"))
        .build()?;

    let counters = Arc::new(Counters::new());
    let mut scheduled = 0usize;

    for iter in 0..cfg.max_iterations {
        if terminate.load(Ordering::Relaxed) {
            break;
        }

        let backend = Arc::clone(&backend);
        let cfg = cfg.clone();
        let job_counters = Arc::clone(&counters);
        let job_terminate = Arc::clone(&terminate);
        pool.spawn(move || run_iteration(iter, &backend, &cfg, &job_counters, &job_terminate));
        scheduled += 1;

        while outstanding(scheduled, &counters) > workers * 2
            && !terminate.load(Ordering::Relaxed)
        {
            thread::sleep(PRODUCER_THROTTLE);
        }
    }
    info!(scheduled, "all fuzzing jobs queued");

    let mut last = counters.completed_runs.load(Ordering::SeqCst);
    while counters.completed_runs.load(Ordering::SeqCst) < scheduled {
        thread::sleep(MONITOR_INTERVAL);
        let current = counters.completed_runs.load(Ordering::SeqCst);
        let rate = (current.saturating_sub(last)) as u64 / MONITOR_INTERVAL.as_secs();
        println!("Progress: {current} / {scheduled} | Rate: {rate} runs/sec");
        last = current;
    }

    Ok(FuzzSummary {
        scheduled,
        completed: counters.completed_runs.load(Ordering::SeqCst),
        ref_crashes: counters.ref_crash_count.load(Ordering::SeqCst),
        crash_bugs: counters.crash_bug_count.load(Ordering::SeqCst),
        wrong_code_bugs: counters.wrong_code_count.load(Ordering::SeqCst),
        terminated: terminate.load(Ordering::Relaxed),
    })
}

fn outstanding(scheduled: usize, counters: &Counters) -> usize {
    scheduled.saturating_sub(counters.completed_runs.load(Ordering::SeqCst))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_count_floor() {
        assert!(worker_count() >= 4);
    }
}
