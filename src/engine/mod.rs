// src/engine/mod.rs

//! Orchestration engine for jobwatch.
//!
//! This module ties together:
//! - the job store (owned by the core, never shared)
//! - the retry policy
//! - the main runtime event loop that reacts to:
//!   - client requests (launch, query, retry)
//!   - process start/exit/error reports from the executor
//!   - liveness monitor snapshots
//!   - shutdown
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`]; [`handle::JobManager`] is the cloneable client
//! side of the runtime's inbox.

use std::path::PathBuf;

use tokio::sync::oneshot;

use crate::errors::Result;
use crate::monitor::ProcessSnapshot;
use crate::types::{Job, JobId, JobSpec};

/// How a spawned process ended, as observed by its runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    /// The process exited on its own with this code.
    Code(i32),
    /// The process was terminated by this signal (no exit code).
    Signal(i32),
}

/// Reports flowing from process runners into the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// The OS accepted the spawn and assigned a PID.
    Started { job_id: JobId, pid: u32 },
    /// The process is gone and has been reaped.
    Exited { job_id: JobId, exit: ProcessExit },
    /// Spawning or waiting on the process failed.
    Errored { job_id: JobId, detail: String },
}

/// What the monitor learned on one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Running jobs whose usage fields were refreshed.
    pub refreshed: usize,
    /// Running jobs whose PID was missing from the snapshot.
    pub died: usize,
    /// Running jobs with no PID recorded yet.
    pub skipped: usize,
}

/// Result of the shutdown hook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownSummary {
    /// Where the snapshot went and how many records it held, if exported.
    pub exported: Option<(PathBuf, usize)>,
}

/// Events flowing into the runtime from clients, executors and the monitor.
#[derive(Debug)]
pub enum RuntimeEvent {
    Launch {
        spec: JobSpec,
        respond: oneshot::Sender<Result<Job>>,
    },
    Retry {
        job_id: JobId,
        respond: oneshot::Sender<Result<Job>>,
    },
    GetJob {
        job_id: JobId,
        respond: oneshot::Sender<Option<Job>>,
    },
    ListJobs {
        respond: oneshot::Sender<Vec<Job>>,
    },
    RunningJobs {
        respond: oneshot::Sender<Vec<Job>>,
    },
    Process(ProcessEvent),
    /// One monitor tick's process table. The monitor waits for the reply
    /// before it can start another tick.
    MonitorSnapshot {
        snapshot: ProcessSnapshot,
        respond: oneshot::Sender<TickSummary>,
    },
    /// Export the store (if configured) and stop the runtime loop.
    Shutdown {
        respond: oneshot::Sender<Result<ShutdownSummary>>,
    },
}

impl From<ProcessEvent> for RuntimeEvent {
    fn from(event: ProcessEvent) -> Self {
        RuntimeEvent::Process(event)
    }
}

pub mod core;
pub mod launcher;
pub mod event_handlers;
pub mod handle;
pub mod runtime;

pub use self::core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use handle::JobManager;
pub use launcher::Launcher;
pub use runtime::Runtime;
