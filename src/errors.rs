// src/errors.rs

//! Crate-wide error types and aliases.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::JobId;

#[derive(Error, Debug)]
pub enum JobwatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid job request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("job {0} cannot be retried: {1}")]
    NotRetryable(JobId, &'static str),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Stats(#[from] StatsError),

    #[error("job runtime is no longer running")]
    RuntimeClosed,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Rejections of a launch request. Nothing is spawned and the store is not
/// touched when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("job name is required")]
    MissingName,

    #[error("executable path is required")]
    MissingPath,

    #[error("executable not found at path: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("a job with id '{0}' already exists")]
    DuplicateId(JobId),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatsError {
    #[error("invalid statistics input: {0}")]
    InvalidInput(String),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, JobwatchError>;
