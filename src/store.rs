// src/store.rs

//! In-memory job store: the single source of truth for job state.
//!
//! The store itself is a plain data structure with no locking. It is owned by
//! the engine's core runtime, which is only ever driven from one task, so
//! every read-modify-write below is atomic with respect to other callers.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result as AnyResult};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::errors::StoreError;
use crate::fs::FileSystem;
use crate::types::{FailureReason, Job, JobId, JobStatus};

#[derive(Debug, Default)]
pub struct JobStore {
    order: Vec<JobId>,
    jobs: HashMap<JobId, Job>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Insert a new record. Ids are never reused.
    pub fn add(&mut self, job: Job) -> Result<(), StoreError> {
        if self.jobs.contains_key(&job.id) {
            return Err(StoreError::DuplicateId(job.id));
        }
        self.order.push(job.id.clone());
        self.jobs.insert(job.id.clone(), job);
        Ok(())
    }

    pub fn get(&self, id: &JobId) -> Option<&Job> {
        self.jobs.get(id)
    }

    /// All records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.order.iter().filter_map(|id| self.jobs.get(id))
    }

    pub fn get_all(&self) -> Vec<Job> {
        self.iter().cloned().collect()
    }

    pub fn get_running(&self) -> Vec<Job> {
        self.iter().filter(|job| job.is_running()).cloned().collect()
    }

    /// Replace the stored record wholesale (last writer wins).
    ///
    /// Returns `false` if no record with that id exists; the store never
    /// creates records through `update`.
    pub fn update(&mut self, job: Job) -> bool {
        match self.jobs.get_mut(&job.id) {
            Some(slot) => {
                *slot = job;
                true
            }
            None => {
                debug!(job_id = %job.id, "update for unknown job ignored");
                false
            }
        }
    }

    /// Transition a running job to `Completed`.
    ///
    /// Returns the updated record, or `None` when the job is unknown or
    /// already terminal (both are no-ops).
    pub fn mark_completed(&mut self, id: &JobId, now: DateTime<Utc>) -> Option<&Job> {
        let job = self.running_mut(id)?;
        job.status = JobStatus::Completed;
        job.end_time = Some(now);
        job.duration = Some(job.elapsed_secs(now));
        job.failure_reason = FailureReason::None;
        job.failure_details = None;
        Some(&*job)
    }

    /// Transition a running job to `Failed` with the given reason.
    ///
    /// Same no-op rules as [`JobStore::mark_completed`]. A job that is already
    /// terminal keeps its original outcome.
    pub fn mark_failed(
        &mut self,
        id: &JobId,
        reason: FailureReason,
        detail: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Option<&Job> {
        let job = self.running_mut(id)?;
        job.status = JobStatus::Failed;
        job.end_time = Some(now);
        job.duration = Some(job.elapsed_secs(now));
        job.failure_reason = reason;
        job.failure_details = Some(detail.into());
        Some(&*job)
    }

    /// Attach the process exit code. Only the first code sticks.
    pub fn attach_exit_code(&mut self, id: &JobId, code: i32) {
        if let Some(job) = self.jobs.get_mut(id) {
            if job.exit_code.is_none() {
                job.exit_code = Some(code);
            }
        }
    }

    /// Serialize every record (insertion order) as a pretty JSON array.
    pub fn snapshot_json(&self) -> serde_json::Result<String> {
        let jobs: Vec<&Job> = self.iter().collect();
        serde_json::to_string_pretty(&jobs)
    }

    /// Write the JSON snapshot to `path`. Returns the number of records.
    pub fn export_snapshot(&self, fs: &dyn FileSystem, path: &Path) -> AnyResult<usize> {
        let json = self.snapshot_json().context("serializing job snapshot")?;
        fs.write(path, json.as_bytes())
            .with_context(|| format!("writing job snapshot to {:?}", path))?;
        Ok(self.len())
    }

    fn running_mut(&mut self, id: &JobId) -> Option<&mut Job> {
        match self.jobs.get_mut(id) {
            Some(job) if job.is_running() => Some(job),
            Some(job) => {
                debug!(
                    job_id = %id,
                    status = ?job.status,
                    "job already terminal; transition ignored"
                );
                None
            }
            None => {
                warn!(job_id = %id, "transition requested for unknown job");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::types::JobSpec;
    use chrono::Duration;

    fn job(id: &str, now: DateTime<Utc>) -> Job {
        Job::running(JobId::from(id), JobSpec::new("n", "/bin/true", ["a"]), now)
    }

    #[test]
    fn add_rejects_duplicate_ids() {
        let now = Utc::now();
        let mut store = JobStore::new();
        store.add(job("a", now)).unwrap();
        let err = store.add(job("a", now)).unwrap_err();
        assert_eq!(err, StoreError::DuplicateId(JobId::from("a")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn get_all_keeps_insertion_order() {
        let now = Utc::now();
        let mut store = JobStore::new();
        for id in ["c", "a", "b"] {
            store.add(job(id, now)).unwrap();
        }
        let ids: Vec<_> = store.get_all().into_iter().map(|j| j.id.to_string()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn running_filter_excludes_terminal_jobs() {
        let now = Utc::now();
        let mut store = JobStore::new();
        store.add(job("a", now)).unwrap();
        store.add(job("b", now)).unwrap();
        store.mark_completed(&JobId::from("a"), now);
        let running: Vec<_> = store.get_running().into_iter().map(|j| j.id).collect();
        assert_eq!(running, vec![JobId::from("b")]);
    }

    #[test]
    fn terminal_transitions_set_end_time_and_duration() {
        let start = Utc::now();
        let mut store = JobStore::new();
        store.add(job("a", start)).unwrap();

        let done = store
            .mark_failed(
                &JobId::from("a"),
                FailureReason::ExitCode,
                "Process exited with code 1",
                start + Duration::milliseconds(2500),
            )
            .cloned()
            .unwrap();

        assert_eq!(done.status, JobStatus::Failed);
        assert_eq!(done.failure_reason, FailureReason::ExitCode);
        assert_eq!(done.duration, Some(2.5));
        assert_eq!(done.end_time, Some(start + Duration::milliseconds(2500)));
    }

    #[test]
    fn terminal_state_is_never_reentered() {
        let now = Utc::now();
        let mut store = JobStore::new();
        store.add(job("a", now)).unwrap();
        let id = JobId::from("a");

        assert!(store.mark_failed(&id, FailureReason::UnexpectedDeath, "gone", now).is_some());
        assert!(store.mark_completed(&id, now).is_none());
        assert!(store.mark_failed(&id, FailureReason::ExitCode, "late", now).is_none());

        let stored = store.get(&id).unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.failure_reason, FailureReason::UnexpectedDeath);
        assert_eq!(stored.failure_details.as_deref(), Some("gone"));
    }

    #[test]
    fn transitions_on_unknown_ids_are_noops() {
        let mut store = JobStore::new();
        assert!(store.mark_completed(&JobId::from("nope"), Utc::now()).is_none());
        assert!(!store.update(job("nope", Utc::now())));
        assert!(store.is_empty());
    }

    #[test]
    fn exit_code_attaches_once() {
        let now = Utc::now();
        let mut store = JobStore::new();
        store.add(job("a", now)).unwrap();
        let id = JobId::from("a");
        store.attach_exit_code(&id, 3);
        store.attach_exit_code(&id, 9);
        assert_eq!(store.get(&id).unwrap().exit_code, Some(3));
    }

    #[test]
    fn snapshot_export_writes_json_array() {
        let now = Utc::now();
        let mut store = JobStore::new();
        store.add(job("a", now)).unwrap();
        store.add(job("b", now)).unwrap();

        let fs = MockFileSystem::new();
        let path = Path::new("/tmp/snapshot.json");
        let written = store.export_snapshot(&fs, path).unwrap();
        assert_eq!(written, 2);

        let contents = fs.read_to_string(path).unwrap();
        let parsed: Vec<Job> = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].id, JobId::from("a"));
    }
}
