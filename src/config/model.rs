// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Raw configuration as read from a TOML file, before validation.
///
/// ```toml
/// [monitor]
/// interval_ms = 5000
///
/// [memory]
/// max_allowed_mb = 800
///
/// [retry]
/// enabled = true
///
/// [persistence]
/// snapshot_path = "jobs.json"
///
/// [job.nightly-report]
/// path = "./scripts/report.sh"
/// args = ["--full"]
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub monitor: MonitorSection,

    #[serde(default)]
    pub memory: MemorySection,

    #[serde(default)]
    pub retry: RetrySection,

    #[serde(default)]
    pub persistence: PersistenceSection,

    /// Jobs launched at startup, keyed by job name.
    #[serde(default)]
    pub job: BTreeMap<String, StartupJob>,
}

/// Validated configuration. Only obtainable through `TryFrom<RawConfigFile>`
/// (see `validate.rs`) or [`ConfigFile::default`].
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub monitor: MonitorSection,
    pub memory: MemorySection,
    pub retry: RetrySection,
    pub persistence: PersistenceSection,
    pub job: BTreeMap<String, StartupJob>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            monitor: raw.monitor,
            memory: raw.memory,
            retry: raw.retry,
            persistence: raw.persistence,
            job: raw.job,
        }
    }
}

/// `[monitor]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorSection {
    /// Liveness monitor tick interval in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl MonitorSection {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

fn default_interval_ms() -> u64 {
    5000
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

/// `[memory]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct MemorySection {
    /// Peak memory above which a failed job counts as "memory is too high".
    #[serde(default = "default_max_allowed_mb")]
    pub max_allowed_mb: u64,
}

impl MemorySection {
    /// Largest `max_allowed_mb` whose byte count still fits in a `u64`.
    pub const MAX_MB: u64 = u64::MAX / (1024 * 1024);

    pub fn max_allowed_bytes(&self) -> u64 {
        self.max_allowed_mb.saturating_mul(1024 * 1024)
    }
}

fn default_max_allowed_mb() -> u64 {
    800
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            max_allowed_mb: default_max_allowed_mb(),
        }
    }
}

/// `[retry]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_retry_enabled")]
    pub enabled: bool,
}

fn default_retry_enabled() -> bool {
    true
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            enabled: default_retry_enabled(),
        }
    }
}

/// `[persistence]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersistenceSection {
    /// Where the shutdown hook writes the JSON job snapshot. No export when
    /// unset.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

/// `[job.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StartupJob {
    /// Executable to run, absolute or relative to the working directory.
    pub path: PathBuf,

    #[serde(default)]
    pub args: Vec<String>,
}
