// src/stats/detectors.rs

//! The fixed set of pattern detectors run by the statistics engine.
//!
//! Each detector is a pure function of `(jobs, overall_success_rate)`. There
//! are two result shapes:
//! - rate comparison: how a structural subgroup of jobs fares against the
//!   overall success rate;
//! - buckets: which discrete keys (hour, name) accumulate the most failures.

use serde::{Serialize, Serializer};

use crate::types::{Job, JobStatus};

/// Result of running one [`Detector`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PatternResult {
    RateComparison(RateComparison),
    Buckets(BucketResult),
}

impl PatternResult {
    pub fn name(&self) -> &str {
        match self {
            PatternResult::RateComparison(r) => &r.name,
            PatternResult::Buckets(b) => &b.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateComparison {
    pub name: String,
    pub match_count: usize,
    /// Fraction (0..=1) of matching jobs that completed.
    #[serde(serialize_with = "serialize_percent")]
    pub success_rate: f64,
    /// Relative deviation from the overall rate, in percent. `None` when the
    /// overall rate is zero and the ratio is undefined.
    #[serde(serialize_with = "serialize_signed_percent")]
    pub difference_from_average: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketResult {
    pub name: String,
    /// Never empty: holds a placeholder when no bucket qualifies.
    pub most_failures: Vec<String>,
}

/// Closed set of detectors. `Detector::default_set` is the ordered list the
/// engine runs.
#[derive(Debug, Clone, PartialEq)]
pub enum Detector {
    /// Jobs whose name is longer than `threshold` characters.
    NameLength { threshold: usize },
    /// Jobs whose name contains at least one ASCII digit.
    NameHasDigits,
    /// Jobs with more than `threshold` arguments.
    ArgCount { threshold: usize },
    /// Failed jobs whose peak memory exceeded `max_allowed_mb`.
    HighMemoryFailures { max_allowed_mb: u64 },
    /// Hour of day (0-23) with the most failures.
    FailureHour,
    /// Job names that failed more than `threshold` times.
    ProneToFail { threshold: usize },
}

impl Detector {
    pub fn default_set(max_allowed_mb: u64) -> Vec<Detector> {
        vec![
            Detector::NameLength { threshold: 10 },
            Detector::NameHasDigits,
            Detector::ArgCount { threshold: 2 },
            Detector::HighMemoryFailures { max_allowed_mb },
            Detector::FailureHour,
            Detector::ProneToFail { threshold: 5 },
        ]
    }

    pub fn name(&self) -> String {
        match self {
            Detector::NameLength { threshold } => format!("Job name length > {threshold}"),
            Detector::NameHasDigits => "Job name contains digits".to_string(),
            Detector::ArgCount { threshold } => format!("Job has more than {threshold} arguments"),
            Detector::HighMemoryFailures { .. } => "Memory is too high".to_string(),
            Detector::FailureHour => "Specific Hour of Day".to_string(),
            Detector::ProneToFail { .. } => "Processes Prone to Fail".to_string(),
        }
    }

    pub fn calc(&self, jobs: &[Job], overall_success_rate: f64) -> PatternResult {
        match self {
            Detector::NameLength { threshold } => self.compare_rate(
                jobs,
                overall_success_rate,
                |job| job.name.chars().count() > *threshold,
            ),
            Detector::NameHasDigits => self.compare_rate(jobs, overall_success_rate, |job| {
                job.name.chars().any(|c| c.is_ascii_digit())
            }),
            Detector::ArgCount { threshold } => {
                self.compare_rate(jobs, overall_success_rate, |job| job.args.len() > *threshold)
            }
            Detector::HighMemoryFailures { max_allowed_mb } => {
                self.buckets(high_memory_failures(jobs, *max_allowed_mb), || {
                    format!("No failed jobs exceeded {max_allowed_mb} MB")
                })
            }
            Detector::FailureHour => self.buckets(worst_failure_hour(jobs), || {
                "No failures recorded".to_string()
            }),
            Detector::ProneToFail { threshold } => {
                self.buckets(prone_to_fail(jobs, *threshold), || {
                    format!("No processes with more than {threshold} failures")
                })
            }
        }
    }

    fn compare_rate(
        &self,
        jobs: &[Job],
        overall_success_rate: f64,
        matches: impl Fn(&Job) -> bool,
    ) -> PatternResult {
        let matching: Vec<&Job> = jobs.iter().filter(|job| matches(job)).collect();
        let match_count = matching.len();
        let successes = matching
            .iter()
            .filter(|job| job.status == JobStatus::Completed)
            .count();
        let success_rate = if match_count > 0 {
            successes as f64 / match_count as f64
        } else {
            0.0
        };

        PatternResult::RateComparison(RateComparison {
            name: self.name(),
            match_count,
            success_rate,
            difference_from_average: difference_from_average(success_rate, overall_success_rate),
        })
    }

    fn buckets(&self, labels: Vec<String>, placeholder: impl FnOnce() -> String) -> PatternResult {
        let most_failures = if labels.is_empty() {
            vec![placeholder()]
        } else {
            labels
        };
        PatternResult::Buckets(BucketResult {
            name: self.name(),
            most_failures,
        })
    }
}

/// `(rate - overall) / overall * 100`, or `None` when `overall` is zero.
pub fn difference_from_average(rate: f64, overall: f64) -> Option<f64> {
    if overall == 0.0 {
        return None;
    }
    let diff = (rate - overall) / overall * 100.0;
    diff.is_finite().then_some(diff)
}

fn high_memory_failures(jobs: &[Job], max_allowed_mb: u64) -> Vec<String> {
    let max_allowed_bytes = max_allowed_mb.saturating_mul(1024 * 1024);
    let mut offenders: Vec<(&str, u64)> = jobs
        .iter()
        .filter(|job| job.status == JobStatus::Failed)
        .filter_map(|job| match job.highest_mem {
            Some(mem) if mem > max_allowed_bytes => Some((job.name.as_str(), mem)),
            _ => None,
        })
        .collect();

    // Stable: equal peaks keep insertion order.
    offenders.sort_by(|a, b| b.1.cmp(&a.1));

    offenders
        .into_iter()
        .map(|(name, mem)| format!("{name} ({:.0} MB)", mem as f64 / (1024.0 * 1024.0)))
        .collect()
}

fn worst_failure_hour(jobs: &[Job]) -> Vec<String> {
    let mut failed_counts = [0usize; 24];
    for job in jobs.iter().filter(|job| job.status == JobStatus::Failed) {
        if let Some(hour) = job.hour_of_day {
            if let Some(slot) = failed_counts.get_mut(hour as usize) {
                *slot += 1;
            }
        }
    }

    // Strict `>` keeps the earliest hour on ties.
    let mut worst: Option<(usize, usize)> = None;
    for (hour, &count) in failed_counts.iter().enumerate() {
        if count > 0 && worst.is_none_or(|(_, best)| count > best) {
            worst = Some((hour, count));
        }
    }

    worst
        .map(|(hour, _)| vec![format!("{hour:02}:00 - {hour:02}:59")])
        .unwrap_or_default()
}

fn prone_to_fail(jobs: &[Job], threshold: usize) -> Vec<String> {
    // Names in order of first failure.
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for job in jobs.iter().filter(|job| job.status == JobStatus::Failed) {
        match counts.iter_mut().find(|(name, _)| *name == job.name) {
            Some((_, count)) => *count += 1,
            None => counts.push((job.name.as_str(), 1)),
        }
    }

    counts
        .into_iter()
        .filter(|(_, count)| *count > threshold)
        .map(|(name, count)| format!("{name} failed ({count} times)"))
        .collect()
}

// Halves round away from zero: 62.5 renders as "63", not the "62" `{:.0}` gives.
fn serialize_percent<S: Serializer>(rate: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{:.0}%", (rate * 100.0).round()))
}

fn serialize_signed_percent<S: Serializer>(
    diff: &Option<f64>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match diff {
        Some(d) if *d >= 0.0 => serializer.serialize_str(&format!("+{:.0}%", d.round())),
        Some(d) => serializer.serialize_str(&format!("{:.0}%", d.round())),
        None => serializer.serialize_str("n/a"),
    }
}
