// src/engine/launcher.rs

//! Launch-request validation and job id allocation.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::errors::ValidationError;
use crate::fs::FileSystem;
use crate::types::{JobId, JobSpec};

#[derive(Debug)]
pub struct Launcher {
    fs: Arc<dyn FileSystem>,
    next_seq: u64,
}

impl Launcher {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs, next_seq: 0 }
    }

    pub fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    /// Check a launch request and return the absolute executable path.
    ///
    /// Runs before anything is spawned or stored.
    pub fn validate(&self, spec: &JobSpec) -> Result<PathBuf, ValidationError> {
        if spec.name.trim().is_empty() {
            return Err(ValidationError::MissingName);
        }
        if spec.executable_path.as_os_str().is_empty() {
            return Err(ValidationError::MissingPath);
        }
        if let Some(pos) = spec.args.iter().position(|arg| arg.contains('\0')) {
            return Err(ValidationError::InvalidArgs(format!(
                "argument {pos} contains a NUL byte"
            )));
        }

        let resolved = self
            .fs
            .resolve(&spec.executable_path)
            .map_err(|_| ValidationError::PathNotFound(spec.executable_path.clone()))?;
        if !self.fs.is_file(&resolved) {
            return Err(ValidationError::PathNotFound(resolved));
        }
        Ok(resolved)
    }

    /// Fresh id for a launch of `name` at `now`. Never repeats within one
    /// launcher.
    pub fn next_id(&mut self, name: &str, now: DateTime<Utc>) -> JobId {
        let id = JobId::new(name, now, self.next_seq);
        self.next_seq += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn launcher() -> Launcher {
        let fs = MockFileSystem::with_cwd("/work");
        fs.add_file("/work/run.sh", b"#!/bin/sh\nexit 0\n");
        fs.add_dir("/work/bin");
        Launcher::new(Arc::new(fs))
    }

    #[test]
    fn accepts_relative_path_and_resolves_it() {
        let spec = JobSpec::new("nightly", "run.sh", ["--full"]);
        assert_eq!(launcher().validate(&spec), Ok(PathBuf::from("/work/run.sh")));
    }

    #[test]
    fn rejects_missing_fields_in_order() {
        let l = launcher();
        assert_eq!(
            l.validate(&JobSpec::new("", "", Vec::<String>::new())),
            Err(ValidationError::MissingName)
        );
        assert_eq!(
            l.validate(&JobSpec::new("x", "", Vec::<String>::new())),
            Err(ValidationError::MissingPath)
        );
    }

    #[test]
    fn rejects_nonexistent_and_directory_paths() {
        let l = launcher();
        assert_eq!(
            l.validate(&JobSpec::new("x", "/nope/tool", Vec::<String>::new())),
            Err(ValidationError::PathNotFound(PathBuf::from("/nope/tool")))
        );
        assert_eq!(
            l.validate(&JobSpec::new("x", "bin", Vec::<String>::new())),
            Err(ValidationError::PathNotFound(PathBuf::from("/work/bin")))
        );
    }

    #[test]
    fn rejects_nul_bytes_in_args() {
        let spec = JobSpec::new("x", "/work/run.sh", ["ok", "bad\0arg"]);
        assert!(matches!(
            launcher().validate(&spec),
            Err(ValidationError::InvalidArgs(msg)) if msg.contains("argument 1")
        ));
    }

    #[test]
    fn ids_are_unique_within_the_same_millisecond() {
        let mut l = launcher();
        let now = Utc::now();
        let a = l.next_id("job", now);
        let b = l.next_id("job", now);
        assert_ne!(a, b);
    }
}
