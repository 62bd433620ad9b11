// src/types.rs

//! Job record and the small value types around it.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Local, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a single launch attempt.
///
/// Every launch (including each retry) gets a fresh id of the form
/// `"{name}-{start_millis}-{seq}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(name: &str, started: DateTime<Utc>, seq: u64) -> Self {
        Self(format!("{name}-{}-{seq}", started.timestamp_millis()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Lifecycle state of a job. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

/// Why a job ended up `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    #[default]
    None,
    /// The process vanished without reporting an exit code.
    UnexpectedDeath,
    /// The process ran and exited with a nonzero code.
    ExitCode,
    /// The OS refused to spawn the process, or waiting on it errored.
    ProcessError,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureReason::None => "NONE",
            FailureReason::UnexpectedDeath => "UNEXPECTED_DEATH",
            FailureReason::ExitCode => "EXIT_CODE",
            FailureReason::ProcessError => "PROCESS_ERROR",
        };
        f.write_str(s)
    }
}

/// What a client asks to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,
    pub executable_path: PathBuf,
    pub args: Vec<String>,
}

impl JobSpec {
    pub fn new(
        name: impl Into<String>,
        executable_path: impl Into<PathBuf>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            executable_path: executable_path.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// One tracked launch attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub executable_path: PathBuf,
    pub args: Vec<String>,
    pub status: JobStatus,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Seconds, two decimals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_of: Option<JobId>,
    #[serde(default)]
    pub failure_reason: FailureReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_details: Option<String>,
    /// Peak resident memory in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highest_mem: Option<u64>,
    /// Two-point running average of resident memory in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_mem: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hour_of_day: Option<u8>,
}

impl Job {
    /// Build a fresh `Running` record for `spec`, started at `now`.
    pub fn running(id: JobId, spec: JobSpec, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: spec.name,
            executable_path: spec.executable_path,
            args: spec.args,
            status: JobStatus::Running,
            start_time: now,
            end_time: None,
            duration: None,
            exit_code: None,
            pid: None,
            retry_of: None,
            failure_reason: FailureReason::None,
            failure_details: None,
            highest_mem: None,
            average_mem: None,
            hour_of_day: Some(local_hour(now)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == JobStatus::Running
    }

    pub fn spec(&self) -> JobSpec {
        JobSpec {
            name: self.name.clone(),
            executable_path: self.executable_path.clone(),
            args: self.args.clone(),
        }
    }

    /// Fold one resident-memory sample into the usage fields.
    ///
    /// The peak never decreases; the average is a two-point blend of the
    /// previous average and the new sample, seeded by the first sample.
    pub fn observe_memory(&mut self, current: u64) {
        self.highest_mem = Some(self.highest_mem.map_or(current, |peak| peak.max(current)));
        self.average_mem = Some(match self.average_mem {
            Some(previous) => (previous + current as f64) / 2.0,
            None => current as f64,
        });
    }

    /// Seconds between start and `now`, rounded to two decimals.
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> f64 {
        let millis = (now - self.start_time).num_milliseconds().max(0);
        (millis as f64 / 10.0).round() / 100.0
    }
}

/// Wall-clock hour (0-23, local time zone) of the given instant.
pub fn local_hour(at: DateTime<Utc>) -> u8 {
    at.with_timezone(&Local).hour() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn job_ids_differ_by_sequence() {
        let now = Utc::now();
        assert_ne!(JobId::new("a", now, 1), JobId::new("a", now, 2));
        assert!(JobId::new("build", now, 7).as_str().starts_with("build-"));
    }

    #[test]
    fn elapsed_is_rounded_to_hundredths() {
        let start = Utc::now();
        let job = Job::running(JobId::from("x"), JobSpec::new("x", "/bin/true", Vec::<String>::new()), start);
        let elapsed = job.elapsed_secs(start + Duration::milliseconds(1234));
        assert_eq!(elapsed, 1.23);
    }

    #[test]
    fn memory_peak_is_monotonic_and_average_blends() {
        let mut job = Job::running(JobId::from("m"), JobSpec::new("m", "/bin/true", Vec::<String>::new()), Utc::now());
        job.observe_memory(400);
        assert_eq!((job.highest_mem, job.average_mem), (Some(400), Some(400.0)));
        job.observe_memory(100);
        assert_eq!((job.highest_mem, job.average_mem), (Some(400), Some(250.0)));
        job.observe_memory(1000);
        assert_eq!((job.highest_mem, job.average_mem), (Some(1000), Some(625.0)));
    }

    #[test]
    fn serializes_camel_case_with_screaming_reason() {
        let job = Job::running(
            JobId::from("x-1-0"),
            JobSpec::new("x", "/bin/true", ["a"]),
            Utc::now(),
        );
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["status"], "running");
        assert_eq!(value["failureReason"], "NONE");
        assert!(value.get("executablePath").is_some());
        assert!(value.get("endTime").is_none());
    }
}
