// src/exec/mod.rs

//! Process execution layer.
//!
//! Runs job executables with `tokio::process::Command` and reports back to
//! the runtime via `RuntimeEvent`s.
//!
//! - [`process_runner`] spawns one process, drains its output and reports
//!   start, exit or error.
//! - [`backend`] provides the `ExecutorBackend` trait and the
//!   `RealExecutorBackend` the runtime uses in production, which tests
//!   replace with a fake implementation.

pub mod backend;
pub mod process_runner;

pub use backend::{ExecutorBackend, RealExecutorBackend};
pub use process_runner::run_process;
