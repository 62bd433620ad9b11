// src/stats/mod.rs

//! Aggregate analytics over the job history.
//!
//! [`StatsEngine::compute`] derives the overall success rate and average
//! duration, then runs every detector in [`detectors::Detector::default_set`]
//! against the full job list.

pub mod detectors;

use serde::Serialize;
use tracing::debug;

use crate::config::ConfigFile;
use crate::errors::StatsError;
use crate::types::{Job, JobStatus};

pub use detectors::{BucketResult, Detector, PatternResult, RateComparison};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    pub total_jobs: usize,
    /// Fraction of jobs that did not fail. Running jobs count as non-failed.
    pub success_rate: f64,
    /// Mean duration in seconds over non-failed jobs.
    pub average_duration: f64,
    pub patterns: Vec<PatternResult>,
}

impl StatsReport {
    pub fn empty() -> Self {
        Self {
            total_jobs: 0,
            success_rate: 0.0,
            average_duration: 0.0,
            patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatsEngine {
    detectors: Vec<Detector>,
}

impl StatsEngine {
    pub fn new(max_allowed_mb: u64) -> Self {
        Self {
            detectors: Detector::default_set(max_allowed_mb),
        }
    }

    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self::new(cfg.memory.max_allowed_mb)
    }

    pub fn compute(&self, jobs: &[Job]) -> Result<StatsReport, StatsError> {
        if jobs.is_empty() {
            debug!("no jobs available for statistics");
            return Ok(StatsReport::empty());
        }
        validate_jobs(jobs)?;

        let total_jobs = jobs.len();
        let non_failed: Vec<&Job> = jobs
            .iter()
            .filter(|job| job.status != JobStatus::Failed)
            .collect();

        let success_rate = non_failed.len() as f64 / total_jobs as f64;
        let average_duration = if non_failed.is_empty() {
            0.0
        } else {
            let sum: f64 = non_failed.iter().map(|job| job.duration.unwrap_or(0.0)).sum();
            sum / non_failed.len() as f64
        };

        let patterns = self
            .detectors
            .iter()
            .map(|detector| detector.calc(jobs, success_rate))
            .collect();

        Ok(StatsReport {
            total_jobs,
            success_rate,
            average_duration,
            patterns,
        })
    }
}

/// Compute statistics with the default detector set.
pub fn compute_stats(jobs: &[Job], max_allowed_mb: u64) -> Result<StatsReport, StatsError> {
    StatsEngine::new(max_allowed_mb).compute(jobs)
}

fn validate_jobs(jobs: &[Job]) -> Result<(), StatsError> {
    for job in jobs {
        if let Some(hour) = job.hour_of_day {
            if hour > 23 {
                return Err(StatsError::InvalidInput(format!(
                    "job '{}' has hour_of_day {hour} (expected 0-23)",
                    job.id
                )));
            }
        }
        if let Some(duration) = job.duration {
            if !duration.is_finite() {
                return Err(StatsError::InvalidInput(format!(
                    "job '{}' has a non-finite duration",
                    job.id
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{JobId, JobSpec};
    use chrono::Utc;

    fn job(id: &str, status: JobStatus, duration: Option<f64>) -> Job {
        let mut job = Job::running(JobId::from(id), JobSpec::new("job", "/bin/true", ["x"]), Utc::now());
        job.status = status;
        job.duration = duration;
        job
    }

    #[test]
    fn empty_input_yields_zero_report() {
        let report = compute_stats(&[], 800).unwrap();
        assert_eq!(report, StatsReport::empty());
    }

    #[test]
    fn running_jobs_count_as_non_failed() {
        let jobs = vec![
            job("a", JobStatus::Completed, Some(2.0)),
            job("b", JobStatus::Running, None),
            job("c", JobStatus::Failed, Some(10.0)),
            job("d", JobStatus::Failed, Some(10.0)),
        ];
        let report = compute_stats(&jobs, 800).unwrap();
        assert_eq!(report.total_jobs, 4);
        assert_eq!(report.success_rate, 0.5);
        // (2.0 + 0) / 2; the running job without a duration still counts.
        assert_eq!(report.average_duration, 1.0);
        assert_eq!(report.patterns.len(), 6);
    }

    #[test]
    fn all_failed_gives_zero_average_duration() {
        let jobs = vec![job("a", JobStatus::Failed, Some(3.0))];
        let report = compute_stats(&jobs, 800).unwrap();
        assert_eq!(report.success_rate, 0.0);
        assert_eq!(report.average_duration, 0.0);
    }

    #[test]
    fn out_of_range_hour_is_invalid_input() {
        let mut bad = job("a", JobStatus::Failed, None);
        bad.hour_of_day = Some(24);
        let err = compute_stats(&[bad], 800).unwrap_err();
        assert!(matches!(err, StatsError::InvalidInput(msg) if msg.contains("hour_of_day")));
    }

    #[test]
    fn report_serializes_camel_case() {
        let jobs = vec![job("a", JobStatus::Completed, Some(1.5))];
        let value = serde_json::to_value(compute_stats(&jobs, 800).unwrap()).unwrap();
        assert_eq!(value["totalJobs"], 1);
        assert_eq!(value["successRate"], 1.0);
        assert_eq!(value["averageDuration"], 1.5);
        assert_eq!(value["patterns"][4]["name"], "Specific Hour of Day");
    }
}
