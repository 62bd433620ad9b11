// src/monitor/mod.rs

//! Periodic liveness monitor.
//!
//! Every tick the monitor asks the runtime for the running jobs, takes one
//! process-table snapshot, and hands it back to the runtime, which marks
//! vanished processes `UNEXPECTED_DEATH` and refreshes memory and duration
//! for the live ones. Ticks never overlap: the next one starts only after
//! the runtime has applied the previous snapshot.

pub mod probe;

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::engine::{JobManager, TickSummary};
use crate::errors::Result;

pub use probe::{ProcessProbe, ProcessSample, ProcessSnapshot, SysinfoProbe};

/// What one monitor tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No job was running; the process table was not read.
    Idle,
    /// Listing processes failed; no job state changed.
    ProbeFailed,
    Applied(TickSummary),
}

#[derive(Debug)]
pub struct LivenessMonitor<P: ProcessProbe> {
    manager: JobManager,
    probe: P,
}

impl<P: ProcessProbe + 'static> LivenessMonitor<P> {
    pub fn new(manager: JobManager, probe: P) -> Self {
        Self { manager, probe }
    }

    /// Run a single check.
    pub async fn tick(&mut self) -> Result<TickOutcome> {
        let running = self.manager.running_jobs().await?;
        if running.is_empty() {
            return Ok(TickOutcome::Idle);
        }

        let snapshot = match self.probe.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(error = %err, running = running.len(), "process listing failed; skipping tick");
                return Ok(TickOutcome::ProbeFailed);
            }
        };

        let summary = self.manager.report_snapshot(snapshot).await?;
        if summary.died > 0 {
            info!(died = summary.died, "monitor detected vanished processes");
        }
        Ok(TickOutcome::Applied(summary))
    }

    /// Start ticking every `interval` on a background task.
    ///
    /// The first check happens one full interval after start. Ticks missed
    /// while a slow check was in flight are skipped.
    pub fn spawn(mut self, interval: Duration) -> MonitorHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;

            info!(interval_ms = interval.as_millis() as u64, "liveness monitor started");

            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        debug!("liveness monitor stop requested");
                        break;
                    }
                    _ = ticker.tick() => {
                        match self.tick().await {
                            Ok(outcome) => debug!(?outcome, "monitor tick finished"),
                            Err(err) => {
                                info!(error = %err, "runtime gone; liveness monitor exiting");
                                break;
                            }
                        }
                    }
                }
            }

            info!("liveness monitor stopped");
        });

        MonitorHandle {
            stop: Some(stop_tx),
            task,
        }
    }
}

/// Handle to a running monitor task.
#[derive(Debug)]
pub struct MonitorHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Stop ticking and wait for the task to finish. A tick already in
    /// progress completes first.
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(err) = self.task.await {
            warn!(error = %err, "liveness monitor task ended abnormally");
        }
    }
}
