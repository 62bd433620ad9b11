// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime hands jobs to an `ExecutorBackend` instead of spawning
//! processes itself. This makes it easy to swap in a fake executor in tests
//! that scripts exits, signals and spawn failures without real processes.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::engine::RuntimeEvent;
use crate::errors::Result;
use crate::types::Job;

use super::process_runner::run_process;

/// Trait abstracting how jobs are started.
///
/// Implementations must not wait for the processes to finish: outcomes are
/// reported later as `RuntimeEvent::Process` events.
pub trait ExecutorBackend: Send {
    /// Start the given jobs. An error means none of them was dispatched.
    fn spawn_jobs(&mut self, jobs: Vec<Job>)
    -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Real executor backend used in production: one tokio task per process.
#[derive(Debug, Clone)]
pub struct RealExecutorBackend {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
}

impl RealExecutorBackend {
    /// Create a backend whose process runners report to `runtime_tx`.
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self { runtime_tx }
    }
}

impl ExecutorBackend for RealExecutorBackend {
    fn spawn_jobs(
        &mut self,
        jobs: Vec<Job>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();

        Box::pin(async move {
            for job in jobs {
                tokio::spawn(run_process(job, tx.clone()));
            }
            Ok(())
        })
    }
}
