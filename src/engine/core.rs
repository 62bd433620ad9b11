// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! [`CoreRuntime`] owns the job store and applies every mutation to it:
//! launches, process reports and monitor snapshots. It returns
//! [`CoreStep`]s describing processes the IO shell should start, so a retry
//! is only ever spawned after the failure that caused it has been recorded.
//!
//! The core has no channels and spawns nothing. Time is passed in, which
//! keeps it testable without Tokio.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::ConfigFile;
use crate::engine::event_handlers::{
    handle_process_error, handle_process_exited, handle_process_started, handle_snapshot,
    launch_retry, CoreStep,
};
use crate::engine::launcher::Launcher;
use crate::engine::{ProcessEvent, ShutdownSummary, TickSummary};
use crate::errors::{JobwatchError, Result};
use crate::fs::FileSystem;
use crate::monitor::ProcessSnapshot;
use crate::retry::{is_retryable, RetryPolicy};
use crate::store::JobStore;
use crate::types::{Job, JobId, JobSpec};

#[derive(Debug)]
pub struct CoreRuntime {
    store: JobStore,
    launcher: Launcher,
    policy: RetryPolicy,
    snapshot_path: Option<PathBuf>,
}

impl CoreRuntime {
    pub fn new(fs: Arc<dyn FileSystem>, policy: RetryPolicy, snapshot_path: Option<PathBuf>) -> Self {
        Self {
            store: JobStore::new(),
            launcher: Launcher::new(fs),
            policy,
            snapshot_path,
        }
    }

    pub fn from_config(cfg: &ConfigFile, fs: Arc<dyn FileSystem>) -> Self {
        Self::new(
            fs,
            RetryPolicy::from_config(cfg),
            cfg.persistence.snapshot_path.clone(),
        )
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// Validate and record a new job. The returned step spawns it.
    ///
    /// Validation errors leave the store untouched.
    pub fn launch(&mut self, spec: JobSpec, now: DateTime<Utc>) -> Result<(Job, CoreStep)> {
        let resolved = self.launcher.validate(&spec)?;
        let name = spec.name.trim().to_string();
        let id = self.launcher.next_id(&name, now);

        let job = Job::running(
            id,
            JobSpec {
                name,
                executable_path: resolved,
                ..spec
            },
            now,
        );
        self.store.add(job.clone())?;

        info!(
            job_id = %job.id,
            name = %job.name,
            path = ?job.executable_path,
            args = ?job.args,
            "job launched"
        );
        Ok((job.clone(), CoreStep::spawn(job)))
    }

    /// Manually retry a failed original attempt.
    ///
    /// Follows the one-hop rule of automatic retries: retries can't be
    /// retried, and an original that already has a retry is refused. The
    /// `[retry] enabled` switch only governs automatic retries.
    pub fn retry_job(&mut self, job_id: &JobId, now: DateTime<Utc>) -> Result<(Job, CoreStep)> {
        let job = self
            .store
            .get(job_id)
            .cloned()
            .ok_or_else(|| JobwatchError::NotFound(job_id.clone()))?;

        if !is_retryable(&job) {
            let why = if job.retry_of.is_some() {
                "retry attempts are never retried"
            } else {
                "only failed jobs can be retried"
            };
            return Err(JobwatchError::NotRetryable(job_id.clone(), why));
        }
        if self
            .store
            .iter()
            .any(|other| other.retry_of.as_ref() == Some(job_id))
        {
            return Err(JobwatchError::NotRetryable(
                job_id.clone(),
                "job has already been retried",
            ));
        }

        info!(job_id = %job_id, name = %job.name, "manual retry requested");
        Ok(launch_retry(
            &mut self.store,
            &mut self.launcher,
            &self.policy,
            &job,
            now,
        ))
    }

    /// Apply a report from a process runner.
    pub fn step(&mut self, event: ProcessEvent, now: DateTime<Utc>) -> CoreStep {
        match event {
            ProcessEvent::Started { job_id, pid } => {
                handle_process_started(&mut self.store, &job_id, pid);
                CoreStep::default()
            }
            ProcessEvent::Exited { job_id, exit } => handle_process_exited(
                &mut self.store,
                &mut self.launcher,
                &self.policy,
                &job_id,
                exit,
                now,
            ),
            ProcessEvent::Errored { job_id, detail } => handle_process_error(
                &mut self.store,
                &mut self.launcher,
                &self.policy,
                &job_id,
                detail,
                now,
            ),
        }
    }

    /// Apply one liveness-monitor tick.
    pub fn apply_snapshot(
        &mut self,
        snapshot: &ProcessSnapshot,
        now: DateTime<Utc>,
    ) -> (TickSummary, CoreStep) {
        let (summary, step) = handle_snapshot(
            &mut self.store,
            &mut self.launcher,
            &self.policy,
            snapshot,
            now,
        );
        debug!(?summary, "monitor snapshot applied");
        (summary, step)
    }

    pub fn get(&self, job_id: &JobId) -> Option<Job> {
        self.store.get(job_id).cloned()
    }

    pub fn list(&self) -> Vec<Job> {
        self.store.get_all()
    }

    pub fn running(&self) -> Vec<Job> {
        self.store.get_running()
    }

    /// Write the store to the configured snapshot path, if any.
    pub fn export_snapshot(&self) -> Result<ShutdownSummary> {
        let Some(path) = &self.snapshot_path else {
            return Ok(ShutdownSummary::default());
        };

        let count = self.store.export_snapshot(self.launcher.fs(), path)?;
        info!(path = ?path, jobs = count, "job snapshot exported");
        Ok(ShutdownSummary {
            exported: Some((path.clone(), count)),
        })
    }
}
