#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use jobwatch::config::ConfigFile;
use jobwatch::engine::JobManager;
use jobwatch::fs::mock::MockFileSystem;
use jobwatch::service::JobService;
use jobwatch::types::{Job, JobId};
use jobwatch_test_utils::{FakeExecutor, FakeProbe};

pub const POLL: Duration = Duration::from_millis(10);

/// Mock filesystem in which every name in `tools` exists as
/// `/work/bin/<name>`.
pub fn fs_with_tools(tools: &[&str]) -> MockFileSystem {
    let fs = MockFileSystem::new();
    for tool in tools {
        fs.add_file(format!("/work/bin/{tool}"), b"#!/bin/sh\n".to_vec());
    }
    fs
}

pub fn tool(name: &str) -> String {
    format!("/work/bin/{name}")
}

/// Start a service on fakes. The background monitor is effectively idle
/// unless `cfg` sets a short interval.
pub fn start_fake(
    cfg: &ConfigFile,
    fs: &MockFileSystem,
    probe: &FakeProbe,
    exec: &FakeExecutor,
) -> JobService {
    JobService::start_with(cfg, Arc::new(fs.clone()), probe.clone(), exec.connect())
}

/// Poll until `pred` holds for the job.
pub async fn wait_for_job<F>(manager: &JobManager, id: &JobId, pred: F) -> Job
where
    F: Fn(&Job) -> bool,
{
    loop {
        let job = manager.get_job(id).await.expect("job exists");
        if pred(&job) {
            return job;
        }
        tokio::time::sleep(POLL).await;
    }
}

/// Poll until no job is running, then return the full list.
pub async fn settle(manager: &JobManager) -> Vec<Job> {
    manager.wait_until_idle(POLL).await.expect("runtime alive");
    manager.list_jobs().await.expect("runtime alive")
}
