// src/engine/handle.rs

//! Cloneable client side of the runtime's inbox.
//!
//! Every call is one message to the runtime task plus a oneshot reply, so
//! callers on any task see a consistent view of the store.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::engine::{RuntimeEvent, ShutdownSummary, TickSummary};
use crate::errors::{JobwatchError, Result};
use crate::monitor::ProcessSnapshot;
use crate::stats::{StatsEngine, StatsReport};
use crate::types::{Job, JobId, JobSpec};

#[derive(Debug, Clone)]
pub struct JobManager {
    sender: mpsc::Sender<RuntimeEvent>,
}

impl JobManager {
    pub fn new(sender: mpsc::Sender<RuntimeEvent>) -> Self {
        Self { sender }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RuntimeEvent,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(make(tx))
            .await
            .map_err(|_| JobwatchError::RuntimeClosed)?;
        rx.await.map_err(|_| JobwatchError::RuntimeClosed)
    }

    /// Validate, record and start a job. Returns the stored record.
    pub async fn launch_job(&self, spec: JobSpec) -> Result<Job> {
        self.request(|respond| RuntimeEvent::Launch { spec, respond })
            .await?
    }

    pub async fn get_job(&self, job_id: &JobId) -> Result<Job> {
        let job_id = job_id.clone();
        let found = self
            .request(|respond| RuntimeEvent::GetJob {
                job_id: job_id.clone(),
                respond,
            })
            .await?;
        found.ok_or(JobwatchError::NotFound(job_id))
    }

    /// Every job in launch order.
    pub async fn list_jobs(&self) -> Result<Vec<Job>> {
        self.request(|respond| RuntimeEvent::ListJobs { respond })
            .await
    }

    pub async fn running_jobs(&self) -> Result<Vec<Job>> {
        self.request(|respond| RuntimeEvent::RunningJobs { respond })
            .await
    }

    /// Manually retry a failed original job.
    pub async fn retry_job(&self, job_id: &JobId) -> Result<Job> {
        let job_id = job_id.clone();
        self.request(|respond| RuntimeEvent::Retry { job_id, respond })
            .await?
    }

    /// Compute statistics over the current job list.
    pub async fn stats(&self, engine: &StatsEngine) -> Result<StatsReport> {
        let jobs = self.list_jobs().await?;
        Ok(engine.compute(&jobs)?)
    }

    /// Hand one process table to the runtime and wait until it is applied.
    pub async fn report_snapshot(&self, snapshot: ProcessSnapshot) -> Result<TickSummary> {
        self.request(|respond| RuntimeEvent::MonitorSnapshot { snapshot, respond })
            .await
    }

    /// Export the store if configured and stop the runtime loop.
    pub async fn shutdown_runtime(&self) -> Result<ShutdownSummary> {
        self.request(|respond| RuntimeEvent::Shutdown { respond })
            .await?
    }

    /// Poll until no job is running.
    pub async fn wait_until_idle(&self, poll: Duration) -> Result<()> {
        loop {
            let running = self.running_jobs().await?;
            if running.is_empty() {
                return Ok(());
            }
            debug!(running = running.len(), "waiting for running jobs");
            tokio::time::sleep(poll).await;
        }
    }
}
