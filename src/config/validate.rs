// src/config/validate.rs

use crate::config::model::{ConfigFile, MemorySection, RawConfigFile};
use crate::errors::{JobwatchError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = JobwatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    validate_monitor(cfg)?;
    validate_memory(cfg)?;
    validate_startup_jobs(cfg)?;
    Ok(())
}

fn validate_monitor(cfg: &RawConfigFile) -> Result<()> {
    if cfg.monitor.interval_ms == 0 {
        return Err(JobwatchError::ConfigError(
            "[monitor].interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_memory(cfg: &RawConfigFile) -> Result<()> {
    let mb = cfg.memory.max_allowed_mb;
    if mb == 0 {
        return Err(JobwatchError::ConfigError(
            "[memory].max_allowed_mb must be >= 1 (got 0)".to_string(),
        ));
    }
    if mb > MemorySection::MAX_MB {
        return Err(JobwatchError::ConfigError(format!(
            "[memory].max_allowed_mb must be <= {} (got {mb})",
            MemorySection::MAX_MB
        )));
    }
    Ok(())
}

// Existence of the executable is checked at launch time, not here: the file
// may legitimately appear between config load and launch.
fn validate_startup_jobs(cfg: &RawConfigFile) -> Result<()> {
    for (name, job) in cfg.job.iter() {
        if name.trim().is_empty() {
            return Err(JobwatchError::ConfigError(
                "[job.<name>] sections need a non-empty name".to_string(),
            ));
        }
        if job.path.as_os_str().is_empty() {
            return Err(JobwatchError::ConfigError(format!(
                "job '{}' has an empty `path`",
                name
            )));
        }
    }
    Ok(())
}
