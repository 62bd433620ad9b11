// tests/config_loading.rs

use std::io::Write;
use std::path::PathBuf;

use jobwatch::config::{load_and_validate, load_or_default};
use jobwatch::errors::JobwatchError;
use jobwatch::fs::RealFileSystem;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn full_config_is_loaded() {
    let file = write_config(
        r#"
[monitor]
interval_ms = 250

[memory]
max_allowed_mb = 512

[retry]
enabled = false

[persistence]
snapshot_path = "out/jobs.json"

[job.nightly-report]
path = "./scripts/report.sh"
args = ["--full", "--quiet"]

[job.cleanup]
path = "/usr/local/bin/cleanup"
"#,
    );

    let cfg = load_and_validate(&RealFileSystem, file.path()).unwrap();
    assert_eq!(cfg.monitor.interval_ms, 250);
    assert_eq!(cfg.memory.max_allowed_mb, 512);
    assert!(!cfg.retry.enabled);
    assert_eq!(cfg.persistence.snapshot_path, Some(PathBuf::from("out/jobs.json")));

    let names: Vec<_> = cfg.job.keys().cloned().collect();
    assert_eq!(names, vec!["cleanup", "nightly-report"]);
    assert_eq!(cfg.job["nightly-report"].args, vec!["--full", "--quiet"]);
    assert!(cfg.job["cleanup"].args.is_empty());
}

#[test]
fn empty_file_uses_defaults() {
    let file = write_config("");
    let cfg = load_and_validate(&RealFileSystem, file.path()).unwrap();
    assert_eq!(cfg.monitor.interval_ms, 5000);
    assert_eq!(cfg.memory.max_allowed_mb, 800);
    assert!(cfg.retry.enabled);
    assert!(cfg.persistence.snapshot_path.is_none());
    assert!(cfg.job.is_empty());
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = load_or_default(&RealFileSystem, dir.path().join("absent.toml")).unwrap();
    assert_eq!(cfg.monitor.interval_ms, 5000);
}

#[test]
fn zero_interval_is_rejected() {
    let file = write_config("[monitor]\ninterval_ms = 0\n");
    let err = load_and_validate(&RealFileSystem, file.path()).unwrap_err();
    assert!(matches!(err, JobwatchError::ConfigError(msg) if msg.contains("interval_ms")));
}

#[test]
fn zero_memory_ceiling_is_rejected() {
    let file = write_config("[memory]\nmax_allowed_mb = 0\n");
    assert!(matches!(
        load_and_validate(&RealFileSystem, file.path()),
        Err(JobwatchError::ConfigError(_))
    ));
}

#[test]
fn job_without_path_is_a_parse_error() {
    let file = write_config("[job.broken]\nargs = [\"x\"]\n");
    assert!(matches!(
        load_and_validate(&RealFileSystem, file.path()),
        Err(JobwatchError::TomlError(_))
    ));
}

#[test]
fn job_with_empty_path_is_rejected() {
    let file = write_config("[job.broken]\npath = \"\"\n");
    assert!(matches!(
        load_and_validate(&RealFileSystem, file.path()),
        Err(JobwatchError::ConfigError(_))
    ));
}

#[test]
fn malformed_toml_is_reported() {
    let file = write_config("[monitor\ninterval_ms = 1");
    assert!(matches!(
        load_and_validate(&RealFileSystem, file.path()),
        Err(JobwatchError::TomlError(_))
    ));
}
