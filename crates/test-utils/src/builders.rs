#![allow(dead_code)]

use std::path::PathBuf;

use chrono::{DateTime, Duration, TimeZone, Utc};
use jobwatch::config::{ConfigFile, RawConfigFile, StartupJob};
use jobwatch::types::{FailureReason, Job, JobId, JobSpec, JobStatus};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_interval_ms(mut self, ms: u64) -> Self {
        self.config.monitor.interval_ms = ms;
        self
    }

    pub fn with_max_allowed_mb(mut self, mb: u64) -> Self {
        self.config.memory.max_allowed_mb = mb;
        self
    }

    pub fn with_retry(mut self, enabled: bool) -> Self {
        self.config.retry.enabled = enabled;
        self
    }

    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.persistence.snapshot_path = Some(path.into());
        self
    }

    pub fn with_job(mut self, name: &str, path: impl Into<PathBuf>, args: &[&str]) -> Self {
        self.config.job.insert(
            name.to_string(),
            StartupJob {
                path: path.into(),
                args: args.iter().map(|a| a.to_string()).collect(),
            },
        );
        self
    }

    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config")
    }
}

/// Builder for finished (or running) `Job` records, for statistics tests.
pub struct JobBuilder {
    job: Job,
}

impl JobBuilder {
    /// A completed one-second job launched at 10:00 UTC on a fixed day.
    pub fn new(name: &str) -> Self {
        let start = base_time();
        let mut job = Job::running(
            JobId::new(name, start, 0),
            JobSpec::new(name, format!("/usr/local/bin/{name}"), Vec::<String>::new()),
            start,
        );
        job.hour_of_day = Some(10);
        job.status = JobStatus::Completed;
        job.end_time = Some(start + Duration::seconds(1));
        job.duration = Some(1.0);
        job.exit_code = Some(0);
        Self { job }
    }

    pub fn seq(mut self, seq: u64) -> Self {
        self.job.id = JobId::new(&self.job.name, self.job.start_time, seq);
        self
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.job.args = args.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn running(mut self) -> Self {
        self.job.status = JobStatus::Running;
        self.job.end_time = None;
        self.job.duration = None;
        self.job.exit_code = None;
        self
    }

    pub fn failed(mut self, reason: FailureReason) -> Self {
        self.job.status = JobStatus::Failed;
        self.job.failure_reason = reason;
        self.job.failure_details = Some(format!("{reason}"));
        self.job.exit_code = match reason {
            FailureReason::ExitCode => Some(1),
            _ => None,
        };
        self
    }

    pub fn duration(mut self, secs: f64) -> Self {
        self.job.duration = Some(secs);
        self
    }

    pub fn hour(mut self, hour: u8) -> Self {
        self.job.hour_of_day = Some(hour);
        self
    }

    pub fn peak_mb(mut self, mb: u64) -> Self {
        let bytes = mb * 1024 * 1024;
        self.job.highest_mem = Some(bytes);
        self.job.average_mem = Some(bytes as f64);
        self
    }

    pub fn retry_of(mut self, original: &JobId) -> Self {
        self.job.retry_of = Some(original.clone());
        self
    }

    pub fn build(self) -> Job {
        self.job
    }
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0)
        .single()
        .expect("valid fixed timestamp")
}
