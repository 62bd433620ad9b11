// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod monitor;
pub mod retry;
pub mod service;
pub mod stats;
pub mod store;
pub mod types;

use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cli::CliArgs;
use crate::config::{load_or_default, ConfigFile};
use crate::engine::JobManager;
use crate::fs::RealFileSystem;
use crate::service::JobService;
use crate::stats::StatsEngine;
use crate::types::JobSpec;

pub use crate::engine::{CoreRuntime, Runtime, RuntimeEvent};
pub use crate::errors::{JobwatchError, Result as JobwatchResult};
pub use crate::stats::{compute_stats, StatsReport};
pub use crate::types::{FailureReason, Job, JobId, JobStatus};

const IDLE_POLL: Duration = Duration::from_millis(250);

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the job service (runtime, executor, liveness monitor)
/// - startup jobs from `[job.*]`
/// - Ctrl-C / `--once` handling
/// - the final statistics report on stdout
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_or_default(&RealFileSystem, &args.config)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let service = JobService::start(&cfg);
    let manager = service.manager().clone();
    let engine = StatsEngine::from_config(&cfg);

    launch_startup_jobs(&manager, &cfg).await?;

    let stats_logger = args
        .stats_interval_secs
        .filter(|secs| *secs > 0)
        .map(|secs| spawn_stats_logger(manager.clone(), engine.clone(), Duration::from_secs(secs)));

    if args.once {
        tokio::select! {
            res = manager.wait_until_idle(IDLE_POLL) => res?,
            res = tokio::signal::ctrl_c() => res?,
        }
        info!("no jobs left running");
    } else {
        info!("supervising jobs; press Ctrl-C to stop");
        tokio::signal::ctrl_c().await?;
        info!("Ctrl-C received; shutting down");
    }

    if let Some(task) = stats_logger {
        task.abort();
    }

    let report = manager.stats(&engine).await?;
    let summary = service.shutdown().await?;
    if let Some((path, count)) = &summary.exported {
        info!(path = ?path, jobs = count, "store exported");
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Launch every `[job.*]` entry. A rejected entry is logged and skipped.
async fn launch_startup_jobs(manager: &JobManager, cfg: &ConfigFile) -> Result<()> {
    for (name, job) in &cfg.job {
        let spec = JobSpec::new(name.as_str(), job.path.clone(), job.args.iter().cloned());
        match manager.launch_job(spec).await {
            Ok(job) => debug!(job_id = %job.id, "startup job launched"),
            Err(JobwatchError::Validation(err)) => {
                error!(name = %name, error = %err, "startup job rejected");
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn spawn_stats_logger(manager: JobManager, engine: StatsEngine, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match manager.stats(&engine).await {
                Ok(report) => match serde_json::to_string(&report) {
                    Ok(json) => info!(report = %json, "job statistics"),
                    Err(err) => warn!(error = %err, "could not serialize statistics"),
                },
                Err(JobwatchError::RuntimeClosed) => break,
                Err(err) => warn!(error = %err, "could not compute statistics"),
            }
        }
    })
}

/// Simple dry-run output: print settings and startup jobs.
fn print_dry_run(cfg: &ConfigFile) {
    println!("jobwatch dry-run");
    println!("  monitor.interval_ms = {}", cfg.monitor.interval_ms);
    println!("  memory.max_allowed_mb = {}", cfg.memory.max_allowed_mb);
    println!("  retry.enabled = {}", cfg.retry.enabled);
    if let Some(ref path) = cfg.persistence.snapshot_path {
        println!("  persistence.snapshot_path = {}", path.display());
    }
    println!();

    println!("jobs ({}):", cfg.job.len());
    for (name, job) in cfg.job.iter() {
        println!("  - {name}");
        println!("      path: {}", job.path.display());
        if !job.args.is_empty() {
            println!("      args: {:?}", job.args);
        }
    }

    debug!("dry-run complete (no execution)");
}
