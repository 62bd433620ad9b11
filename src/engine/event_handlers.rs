// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.
//!
//! Every failure transition, whoever reports it, goes through
//! [`record_failure`], which is the only place the retry policy is consulted.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::engine::launcher::Launcher;
use crate::engine::{ProcessExit, TickSummary};
use crate::monitor::ProcessSnapshot;
use crate::retry::{build_retry, RetryPolicy};
use crate::store::JobStore;
use crate::types::{FailureReason, Job, JobId};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreCommand {
    /// Start the process for this freshly stored `Running` job.
    Spawn(Job),
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoreStep {
    /// Commands the IO shell should execute.
    pub commands: Vec<CoreCommand>,
}

impl CoreStep {
    pub fn spawn(job: Job) -> Self {
        Self {
            commands: vec![CoreCommand::Spawn(job)],
        }
    }

    pub fn extend(&mut self, other: CoreStep) {
        self.commands.extend(other.commands);
    }
}

/// Record the PID the OS assigned to a job's process.
pub fn handle_process_started(store: &mut JobStore, job_id: &JobId, pid: u32) {
    let Some(job) = store.get(job_id) else {
        warn!(job_id = %job_id, pid, "PID reported for unknown job");
        return;
    };
    if !job.is_running() {
        debug!(job_id = %job_id, pid, status = ?job.status, "PID reported for finished job; ignored");
        return;
    }

    let mut updated = job.clone();
    updated.pid = Some(pid);
    store.update(updated);
    debug!(job_id = %job_id, pid, "process started");
}

/// Apply a process exit: code 0 completes the job, a nonzero code fails it
/// with `EXIT_CODE`, and a signal death fails it with `UNEXPECTED_DEATH`.
pub fn handle_process_exited(
    store: &mut JobStore,
    launcher: &mut Launcher,
    policy: &RetryPolicy,
    job_id: &JobId,
    exit: ProcessExit,
    now: DateTime<Utc>,
) -> CoreStep {
    let still_running = store.get(job_id).is_some_and(Job::is_running);

    match exit {
        ProcessExit::Code(0) => {
            if let Some(job) = store.mark_completed(job_id, now) {
                info!(
                    job_id = %job.id,
                    name = %job.name,
                    duration = job.duration,
                    "job completed successfully"
                );
            }
            if still_running {
                store.attach_exit_code(job_id, 0);
            }
            CoreStep::default()
        }
        ProcessExit::Code(code) => {
            if still_running {
                store.attach_exit_code(job_id, code);
            }
            record_failure(
                store,
                launcher,
                policy,
                job_id,
                FailureReason::ExitCode,
                format!("Process exited with code {code}"),
                now,
            )
        }
        ProcessExit::Signal(signal) => record_failure(
            store,
            launcher,
            policy,
            job_id,
            FailureReason::UnexpectedDeath,
            format!("terminated by signal {signal}"),
            now,
        ),
    }
}

/// Spawn or wait failure reported by the process runner.
pub fn handle_process_error(
    store: &mut JobStore,
    launcher: &mut Launcher,
    policy: &RetryPolicy,
    job_id: &JobId,
    detail: String,
    now: DateTime<Utc>,
) -> CoreStep {
    record_failure(
        store,
        launcher,
        policy,
        job_id,
        FailureReason::ProcessError,
        detail,
        now,
    )
}

/// Cross-check every running job against one process table snapshot.
///
/// - no PID yet: skipped (the runner has not reported it)
/// - PID missing from the snapshot: failed with `UNEXPECTED_DEATH`
/// - otherwise: memory stats and running duration refreshed
pub fn handle_snapshot(
    store: &mut JobStore,
    launcher: &mut Launcher,
    policy: &RetryPolicy,
    snapshot: &ProcessSnapshot,
    now: DateTime<Utc>,
) -> (TickSummary, CoreStep) {
    let mut summary = TickSummary::default();
    let mut step = CoreStep::default();

    for job in store.get_running() {
        let Some(pid) = job.pid else {
            warn!(job_id = %job.id, name = %job.name, "no PID recorded for running job; skipping");
            summary.skipped += 1;
            continue;
        };

        match snapshot.get(pid) {
            None => {
                info!(job_id = %job.id, pid, "process for running job not found");
                summary.died += 1;
                step.extend(record_failure(
                    store,
                    launcher,
                    policy,
                    &job.id,
                    FailureReason::UnexpectedDeath,
                    "Process not found",
                    now,
                ));
            }
            Some(sample) => {
                let mut updated = job;
                updated.observe_memory(sample.memory_bytes);
                updated.duration = Some(updated.elapsed_secs(now));
                debug!(
                    job_id = %updated.id,
                    pid,
                    memory_bytes = sample.memory_bytes,
                    highest_mem = updated.highest_mem,
                    "refreshed usage"
                );
                store.update(updated);
                summary.refreshed += 1;
            }
        }
    }

    (summary, step)
}

/// Fail a running job and, if the policy allows, queue its retry.
///
/// No-op (and no retry) when the job is unknown or already terminal, so each
/// job triggers the retry policy at most once.
pub fn record_failure(
    store: &mut JobStore,
    launcher: &mut Launcher,
    policy: &RetryPolicy,
    job_id: &JobId,
    reason: FailureReason,
    detail: impl Into<String>,
    now: DateTime<Utc>,
) -> CoreStep {
    let Some(failed) = store.mark_failed(job_id, reason, detail, now).cloned() else {
        return CoreStep::default();
    };

    warn!(
        job_id = %failed.id,
        name = %failed.name,
        reason = %reason,
        details = failed.failure_details.as_deref().unwrap_or_default(),
        "job failed"
    );

    if !policy.should_retry(&failed) {
        debug!(
            job_id = %failed.id,
            retry_enabled = policy.enabled(),
            is_retry = failed.retry_of.is_some(),
            "no automatic retry"
        );
        return CoreStep::default();
    }

    info!(job_id = %failed.id, name = %failed.name, "automatically retrying job");
    launch_retry(store, launcher, policy, &failed, now).1
}

/// Store a new attempt of `failed` and return it with the step that spawns
/// it.
///
/// If the executable is no longer valid, the new attempt is recorded as
/// failed with `PROCESS_ERROR` instead of being dropped.
pub fn launch_retry(
    store: &mut JobStore,
    launcher: &mut Launcher,
    policy: &RetryPolicy,
    failed: &Job,
    now: DateTime<Utc>,
) -> (Job, CoreStep) {
    let id = launcher.next_id(&failed.name, now);
    let retry = build_retry(failed, id, now);

    if let Err(err) = store.add(retry.clone()) {
        error!(job_id = %retry.id, error = %err, "could not store retry attempt");
        return (retry, CoreStep::default());
    }

    match launcher.validate(&retry.spec()) {
        Ok(_) => {
            info!(job_id = %retry.id, retry_of = %failed.id, "retry attempt created");
            (retry.clone(), CoreStep::spawn(retry))
        }
        Err(err) => {
            let step = record_failure(
                store,
                launcher,
                policy,
                &retry.id,
                FailureReason::ProcessError,
                err.to_string(),
                now,
            );
            let stored = store.get(&retry.id).cloned().unwrap_or(retry);
            (stored, step)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::monitor::ProcessSample;
    use crate::types::{JobSpec, JobStatus};
    use chrono::Duration;
    use std::sync::Arc;

    struct Fixture {
        store: JobStore,
        launcher: Launcher,
        policy: RetryPolicy,
        fs: MockFileSystem,
    }

    fn fixture(retry: bool) -> Fixture {
        let fs = MockFileSystem::new();
        fs.add_file("/work/job.sh", b"");
        Fixture {
            store: JobStore::new(),
            launcher: Launcher::new(Arc::new(fs.clone())),
            policy: RetryPolicy::new(retry),
            fs,
        }
    }

    fn running(f: &mut Fixture, name: &str, pid: Option<u32>, now: DateTime<Utc>) -> JobId {
        let id = f.launcher.next_id(name, now);
        let mut job = Job::running(id.clone(), JobSpec::new(name, "/work/job.sh", ["a"]), now);
        job.pid = pid;
        f.store.add(job).unwrap();
        id
    }

    #[test]
    fn exit_zero_completes_without_retry() {
        let mut f = fixture(true);
        let now = Utc::now();
        let id = running(&mut f, "ok", Some(10), now);

        let step = handle_process_exited(&mut f.store, &mut f.launcher, &f.policy, &id, ProcessExit::Code(0), now);
        assert!(step.commands.is_empty());

        let job = f.store.get(&id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.failure_reason, FailureReason::None);
        assert_eq!(job.exit_code, Some(0));
    }

    #[test]
    fn nonzero_exit_fails_and_spawns_one_retry() {
        let mut f = fixture(true);
        let now = Utc::now();
        let id = running(&mut f, "bad", Some(10), now);

        let step = handle_process_exited(&mut f.store, &mut f.launcher, &f.policy, &id, ProcessExit::Code(3), now);

        let failed = f.store.get(&id).unwrap();
        assert_eq!(failed.failure_reason, FailureReason::ExitCode);
        assert_eq!(failed.failure_details.as_deref(), Some("Process exited with code 3"));
        assert_eq!(failed.exit_code, Some(3));

        assert_eq!(step.commands.len(), 1);
        let CoreCommand::Spawn(retry) = &step.commands[0];
        assert_eq!(retry.retry_of.as_ref(), Some(&id));
        assert!(f.store.get(&retry.id).unwrap().is_running());

        // The retry failing does not produce another attempt.
        let step = handle_process_exited(&mut f.store, &mut f.launcher, &f.policy, &retry.id, ProcessExit::Code(3), now);
        assert!(step.commands.is_empty());
        assert_eq!(f.store.len(), 2);
    }

    #[test]
    fn signal_death_is_unexpected() {
        let mut f = fixture(false);
        let now = Utc::now();
        let id = running(&mut f, "killed", Some(10), now);

        handle_process_exited(&mut f.store, &mut f.launcher, &f.policy, &id, ProcessExit::Signal(9), now);
        let job = f.store.get(&id).unwrap();
        assert_eq!(job.failure_reason, FailureReason::UnexpectedDeath);
        assert!(job.exit_code.is_none());
    }

    #[test]
    fn late_exit_after_monitor_death_is_ignored() {
        let mut f = fixture(true);
        let now = Utc::now();
        let id = running(&mut f, "racy", Some(10), now);

        let (_, step) = handle_snapshot(&mut f.store, &mut f.launcher, &f.policy, &ProcessSnapshot::new(), now);
        assert_eq!(step.commands.len(), 1);

        let step = handle_process_exited(&mut f.store, &mut f.launcher, &f.policy, &id, ProcessExit::Code(1), now);
        assert!(step.commands.is_empty());
        let job = f.store.get(&id).unwrap();
        assert_eq!(job.failure_reason, FailureReason::UnexpectedDeath);
        assert!(job.exit_code.is_none());
    }

    #[test]
    fn snapshot_refreshes_skips_and_detects_death() {
        let mut f = fixture(false);
        let start = Utc::now();
        let alive = running(&mut f, "alive", Some(100), start);
        let pending = running(&mut f, "pending", None, start);
        let gone = running(&mut f, "gone", Some(200), start);

        let snapshot: ProcessSnapshot = [(100, ProcessSample { memory_bytes: 4096 })].into_iter().collect();
        let now = start + Duration::seconds(3);
        let (summary, step) = handle_snapshot(&mut f.store, &mut f.launcher, &f.policy, &snapshot, now);

        assert_eq!(summary, TickSummary { refreshed: 1, died: 1, skipped: 1 });
        assert!(step.commands.is_empty());

        let alive = f.store.get(&alive).unwrap();
        assert!(alive.is_running());
        assert_eq!(alive.highest_mem, Some(4096));
        assert_eq!(alive.average_mem, Some(4096.0));
        assert_eq!(alive.duration, Some(3.0));
        assert!(alive.end_time.is_none());

        assert!(f.store.get(&pending).unwrap().is_running());

        let gone = f.store.get(&gone).unwrap();
        assert_eq!(gone.status, JobStatus::Failed);
        assert_eq!(gone.failure_reason, FailureReason::UnexpectedDeath);
        assert_eq!(gone.failure_details.as_deref(), Some("Process not found"));
    }

    #[test]
    fn retry_with_vanished_executable_fails_new_attempt() {
        let mut f = fixture(true);
        let now = Utc::now();
        let id = running(&mut f, "fragile", Some(10), now);
        f.fs.remove("/work/job.sh");

        let step = handle_process_exited(&mut f.store, &mut f.launcher, &f.policy, &id, ProcessExit::Code(1), now);
        assert!(step.commands.is_empty());

        let retry = f
            .store
            .iter()
            .find(|job| job.retry_of.as_ref() == Some(&id))
            .expect("retry attempt recorded");
        assert_eq!(retry.status, JobStatus::Failed);
        assert_eq!(retry.failure_reason, FailureReason::ProcessError);
        assert!(retry.failure_details.as_deref().unwrap().contains("not found"));
    }
}
