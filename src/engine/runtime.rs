// src/engine/runtime.rs

use std::fmt;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::errors::Result;
use crate::exec::ExecutorBackend;
use crate::types::Job;

use super::core::CoreRuntime;
use super::{CoreCommand, CoreStep, ProcessEvent, RuntimeEvent};

/// Drives the job store in response to `RuntimeEvent`s, and delegates
/// actual process execution to an `ExecutorBackend`.
///
/// This is a pure IO shell around `CoreRuntime`, which contains all the
/// supervision semantics. Because only this task touches the core, every
/// store mutation is serialized.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(core: CoreRuntime, event_rx: mpsc::Receiver<RuntimeEvent>, executor: E) -> Self {
        Self {
            core,
            event_rx,
            executor,
        }
    }

    /// Main event loop. Returns the core once the loop ends so callers (and
    /// tests) can inspect the final store.
    pub async fn run(mut self) -> Result<CoreRuntime> {
        info!("jobwatch runtime started");

        while let Some(event) = self.event_rx.recv().await {
            debug!(?event, "runtime received event");

            match event {
                RuntimeEvent::Launch { spec, respond } => {
                    let result = self.core.launch(spec, Utc::now());
                    let reply = match result {
                        Ok((job, step)) => {
                            self.execute(step).await;
                            // The spawn may already have failed; report the
                            // stored state.
                            Ok(self.core.get(&job.id).unwrap_or(job))
                        }
                        Err(err) => Err(err),
                    };
                    let _ = respond.send(reply);
                }
                RuntimeEvent::Retry { job_id, respond } => {
                    let reply = match self.core.retry_job(&job_id, Utc::now()) {
                        Ok((job, step)) => {
                            self.execute(step).await;
                            Ok(self.core.get(&job.id).unwrap_or(job))
                        }
                        Err(err) => Err(err),
                    };
                    let _ = respond.send(reply);
                }
                RuntimeEvent::GetJob { job_id, respond } => {
                    let _ = respond.send(self.core.get(&job_id));
                }
                RuntimeEvent::ListJobs { respond } => {
                    let _ = respond.send(self.core.list());
                }
                RuntimeEvent::RunningJobs { respond } => {
                    let _ = respond.send(self.core.running());
                }
                RuntimeEvent::Process(event) => {
                    let step = self.core.step(event, Utc::now());
                    self.execute(step).await;
                }
                RuntimeEvent::MonitorSnapshot { snapshot, respond } => {
                    let (summary, step) = self.core.apply_snapshot(&snapshot, Utc::now());
                    self.execute(step).await;
                    let _ = respond.send(summary);
                }
                RuntimeEvent::Shutdown { respond } => {
                    info!(
                        jobs = self.core.store().len(),
                        running = self.core.running().len(),
                        "shutdown requested"
                    );
                    let _ = respond.send(self.core.export_snapshot());
                    break;
                }
            }
        }

        info!("runtime exiting");
        Ok(self.core)
    }

    /// Execute the commands of a step. Jobs the backend fails to accept are
    /// marked `PROCESS_ERROR`, which may in turn queue a retry.
    async fn execute(&mut self, mut step: CoreStep) {
        while !step.commands.is_empty() {
            let jobs: Vec<Job> = step
                .commands
                .drain(..)
                .map(|CoreCommand::Spawn(job)| job)
                .collect();

            let ids: Vec<_> = jobs.iter().map(|job| job.id.clone()).collect();
            debug!(?ids, "spawning jobs");

            if let Err(err) = self.executor.spawn_jobs(jobs).await {
                error!(error = %err, ?ids, "executor rejected jobs");
                let detail = format!("failed to dispatch process: {err}");
                for job_id in ids {
                    let next = self.core.step(
                        ProcessEvent::Errored {
                            job_id,
                            detail: detail.clone(),
                        },
                        Utc::now(),
                    );
                    step.extend(next);
                }
            }
        }
    }
}
