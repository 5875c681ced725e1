//! Fuzzing orchestration.
//!
//! The pipeline per iteration: synthesize an einsum, materialize input data,
//! write the reference kernel, derive equivalent mutants, hand everything to
//! the backend, execute under timeout, and compare mutant outputs against the
//! reference. Crashes and mismatches are archived under a failures bucket.
//!
//! # Key components
//!
//! - [`driver::run_with_timeout`]: timed backend execution with abandonment
//! - [`oracle::BugKind`]: bug classification and archival buckets
//! - [`job::run_iteration`]: one complete fuzzing job
//! - [`scheduler::run_fuzzer`]: worker pool, producer throttle, monitoring

pub mod archive;
pub mod cli;
pub mod driver;
pub mod job;
pub mod oracle;
pub mod scheduler;

pub use job::{Counters, FuzzConfig};
pub use scheduler::{run_fuzzer, FuzzSummary};
