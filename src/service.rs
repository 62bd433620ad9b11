// src/service.rs

//! Wiring of the runtime, executor and liveness monitor into one running
//! service, plus the shutdown hook.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::ConfigFile;
use crate::engine::{CoreRuntime, JobManager, Runtime, RuntimeEvent, ShutdownSummary};
use crate::errors::{JobwatchError, Result};
use crate::exec::{ExecutorBackend, RealExecutorBackend};
use crate::fs::{FileSystem, RealFileSystem};
use crate::monitor::{LivenessMonitor, MonitorHandle, ProcessProbe, SysinfoProbe};

const RUNTIME_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug)]
pub struct JobService {
    manager: JobManager,
    runtime: JoinHandle<Result<CoreRuntime>>,
    monitor: Option<MonitorHandle>,
}

impl JobService {
    /// Start with real processes, the real filesystem and `sysinfo`.
    pub fn start(cfg: &ConfigFile) -> Self {
        Self::start_with(
            cfg,
            Arc::new(RealFileSystem),
            SysinfoProbe::new(),
            RealExecutorBackend::new,
        )
    }

    /// Start with injected collaborators. `make_executor` receives the sender
    /// its processes report to.
    pub fn start_with<E, P, F>(
        cfg: &ConfigFile,
        fs: Arc<dyn FileSystem>,
        probe: P,
        make_executor: F,
    ) -> Self
    where
        E: ExecutorBackend + 'static,
        P: ProcessProbe + 'static,
        F: FnOnce(mpsc::Sender<RuntimeEvent>) -> E,
    {
        let (tx, rx) = mpsc::channel::<RuntimeEvent>(RUNTIME_CHANNEL_CAPACITY);
        let executor = make_executor(tx.clone());

        let core = CoreRuntime::from_config(cfg, fs);
        let runtime = tokio::spawn(Runtime::new(core, rx, executor).run());

        let manager = JobManager::new(tx);
        let monitor = LivenessMonitor::new(manager.clone(), probe).spawn(cfg.monitor.interval());

        info!(
            interval_ms = cfg.monitor.interval_ms,
            max_allowed_mb = cfg.memory.max_allowed_mb,
            retry_enabled = cfg.retry.enabled,
            "job service started"
        );

        Self {
            manager,
            runtime,
            monitor: Some(monitor),
        }
    }

    pub fn manager(&self) -> &JobManager {
        &self.manager
    }

    /// Shutdown hook: stop the monitor timer, export the store if a snapshot
    /// path is configured, then stop the runtime. Spawned processes keep
    /// running.
    pub async fn shutdown(mut self) -> Result<ShutdownSummary> {
        if let Some(monitor) = self.monitor.take() {
            monitor.stop().await;
        }

        let summary = self.manager.shutdown_runtime().await;

        let core = self
            .runtime
            .await
            .map_err(|err| JobwatchError::Other(err.into()))??;
        info!(jobs = core.store().len(), "job service stopped");

        summary
    }
}
