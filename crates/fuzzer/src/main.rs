use anyhow::{bail, Context, Result};
use clap::Parser;
use signal_hook::consts::{SIGINT, SIGTERM};
use std::fs::{self, OpenOptions};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tensure_backend::plugin::BackendPlugin;
use tensure_backend::FuzzBackend;
use tensure_fuzzer::cli::Cli;
use tensure_fuzzer::run_fuzzer;
use tracing::info;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.out_root)?;
    let cfg = cli.to_config();

    let Some(backend_path) = cli.resolve_backend() else {
        bail!("no backend specified; use --backend /path/to/plugin or set BACKEND_LIB");
    };

    let terminate = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGINT, Arc::clone(&terminate))?;
    signal_hook::flag::register(SIGTERM, Arc::clone(&terminate))?;

    let backend: Arc<dyn FuzzBackend> = Arc::new(
        BackendPlugin::load(&backend_path)
            .with_context(|| format!("failed to load backend {}", backend_path.display()))?,
    );
    println!("Loaded backend: {}", backend_path.display());
    println!(
        "Starting fuzz loop with seed={} up to {} iterations",
        cfg.base_seed, cfg.max_iterations
    );
    info!(
        backend = %backend_path.display(),
        seed = cfg.base_seed,
        iterations = cfg.max_iterations,
        "fuzzer starting"
    );

    let summary = run_fuzzer(backend, cfg, terminate)?;

    println!("Fuzzing loop finished (terminated={})", summary.terminated);
    println!(
        "Completed: {} | ref crashes: {} | crash bugs: {} | wrong code bugs: {}",
        summary.completed, summary.ref_crashes, summary.crash_bugs, summary.wrong_code_bugs
    );
    info!(
        completed = summary.completed,
        ref_crashes = summary.ref_crashes,
        crash_bugs = summary.crash_bugs,
        wrong_code_bugs = summary.wrong_code_bugs,
        "fuzzing loop finished"
    );
    Ok(())
}

/// Structured logs go to `<out_root>/fuzzer.log`; progress stays on stdout.
fn init_logging(out_root: &std::path::Path) -> Result<()> {
    fs::create_dir_all(out_root)?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(out_root.join("fuzzer.log"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(log_file))
        .init();
    Ok(())
}
