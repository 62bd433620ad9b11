// src/retry.rs

//! Retry policy: at most one automatic retry per original job.

use chrono::{DateTime, Utc};

use crate::config::ConfigFile;
use crate::types::{Job, JobId, JobStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    enabled: bool,
}

impl RetryPolicy {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self::new(cfg.retry.enabled)
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Whether a freshly failed job gets an automatic retry.
    ///
    /// Only original attempts (no `retry_of`) are eligible, which caps every
    /// failure chain at one hop.
    pub fn should_retry(&self, failed: &Job) -> bool {
        self.enabled && is_retryable(failed)
    }
}

/// A failed original attempt. Retries themselves are never retried.
pub fn is_retryable(job: &Job) -> bool {
    job.status == JobStatus::Failed && job.retry_of.is_none()
}

/// Build the record for a new attempt of `failed`.
///
/// Same name, executable and arguments; every terminal and metric field
/// starts empty, and the hour of day is sampled from `now`.
pub fn build_retry(failed: &Job, id: JobId, now: DateTime<Utc>) -> Job {
    let mut job = Job::running(id, failed.spec(), now);
    job.retry_of = Some(failed.id.clone());
    job
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FailureReason, JobSpec};

    fn failed_job() -> Job {
        let mut job = Job::running(
            JobId::from("build-1-0"),
            JobSpec::new("build", "/usr/bin/make", ["all", "-j4"]),
            Utc::now(),
        );
        job.status = JobStatus::Failed;
        job.failure_reason = FailureReason::ExitCode;
        job.failure_details = Some("Process exited with code 2".into());
        job.exit_code = Some(2);
        job.pid = Some(4242);
        job.highest_mem = Some(1024);
        job.average_mem = Some(512.0);
        job.end_time = Some(Utc::now());
        job.duration = Some(1.0);
        job
    }

    #[test]
    fn disabled_policy_never_retries() {
        assert!(!RetryPolicy::new(false).should_retry(&failed_job()));
        assert!(RetryPolicy::new(true).should_retry(&failed_job()));
    }

    #[test]
    fn retries_are_not_retried() {
        let mut retry = failed_job();
        retry.retry_of = Some(JobId::from("build-0-0"));
        assert!(!RetryPolicy::new(true).should_retry(&retry));
    }

    #[test]
    fn running_or_completed_jobs_are_not_retryable() {
        let mut job = failed_job();
        job.status = JobStatus::Completed;
        assert!(!is_retryable(&job));
        job.status = JobStatus::Running;
        assert!(!is_retryable(&job));
    }

    #[test]
    fn retry_record_resets_terminal_and_metric_fields() {
        let failed = failed_job();
        let now = Utc::now();
        let retry = build_retry(&failed, JobId::from("build-2-1"), now);

        assert_eq!(retry.retry_of, Some(failed.id.clone()));
        assert_eq!(retry.name, failed.name);
        assert_eq!(retry.executable_path, failed.executable_path);
        assert_eq!(retry.args, failed.args);
        assert_eq!(retry.status, JobStatus::Running);
        assert_eq!(retry.start_time, now);
        assert_eq!(retry.failure_reason, FailureReason::None);
        assert!(retry.failure_details.is_none());
        assert!(retry.end_time.is_none());
        assert!(retry.duration.is_none());
        assert!(retry.exit_code.is_none());
        assert!(retry.pid.is_none());
        assert!(retry.highest_mem.is_none());
        assert!(retry.average_mem.is_none());
        assert!(retry.hour_of_day.is_some());
    }
}
