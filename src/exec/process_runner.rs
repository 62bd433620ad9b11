// src/exec/process_runner.rs

//! Individual job process runner.

use std::process::{ExitStatus, Stdio};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::engine::{ProcessEvent, ProcessExit, RuntimeEvent};
use crate::types::{Job, JobId};

/// Spawn the job's executable and report its lifecycle to the runtime.
///
/// Sends `Started` once the OS assigns a PID, then exactly one of `Exited`
/// or `Errored`. The child is not killed when the runner is dropped.
pub async fn run_process(job: Job, runtime_tx: mpsc::Sender<RuntimeEvent>) {
    let job_id = job.id.clone();
    if let Err(err) = run_process_inner(job, &runtime_tx).await {
        error!(job_id = %job_id, error = %err, "job process error");
        let event = ProcessEvent::Errored {
            job_id,
            detail: format!("{err:#}"),
        };
        if runtime_tx.send(event.into()).await.is_err() {
            warn!("runtime closed before process error could be reported");
        }
    }
}

async fn run_process_inner(job: Job, runtime_tx: &mpsc::Sender<RuntimeEvent>) -> Result<()> {
    info!(
        job_id = %job.id,
        name = %job.name,
        path = ?job.executable_path,
        args = ?job.args,
        "starting job process"
    );

    let mut child = Command::new(&job.executable_path)
        .args(&job.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(false)
        .spawn()
        .with_context(|| format!("spawning {:?}", job.executable_path))?;

    let pid = child
        .id()
        .context("spawned process has no PID (already reaped)")?;
    send(runtime_tx, ProcessEvent::Started { job_id: job.id.clone(), pid }).await;

    if let Some(stdout) = child.stdout.take() {
        drain_output(job.id.clone(), "stdout", stdout);
    }
    if let Some(stderr) = child.stderr.take() {
        drain_output(job.id.clone(), "stderr", stderr);
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for process {pid}"))?;

    let exit = classify(status);
    info!(job_id = %job.id, pid, ?exit, "job process exited");
    send(runtime_tx, ProcessEvent::Exited { job_id: job.id, exit }).await;
    Ok(())
}

#[cfg(unix)]
fn classify(status: ExitStatus) -> ProcessExit {
    use std::os::unix::process::ExitStatusExt;

    match (status.code(), status.signal()) {
        (Some(code), _) => ProcessExit::Code(code),
        (None, Some(signal)) => ProcessExit::Signal(signal),
        (None, None) => ProcessExit::Code(-1),
    }
}

#[cfg(not(unix))]
fn classify(status: ExitStatus) -> ProcessExit {
    ProcessExit::Code(status.code().unwrap_or(-1))
}

/// Consume a child pipe so its buffer never fills; lines go to debug logs.
fn drain_output<R>(job_id: JobId, stream: &'static str, reader: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(job_id = %job_id, stream, "{}", line);
        }
    });
}

async fn send(runtime_tx: &mpsc::Sender<RuntimeEvent>, event: ProcessEvent) {
    if runtime_tx.send(event.into()).await.is_err() {
        warn!("runtime closed; dropping process event");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    #[test]
    fn classify_codes_and_signals() {
        assert_eq!(classify(ExitStatus::from_raw(0)), ProcessExit::Code(0));
        assert_eq!(classify(ExitStatus::from_raw(3 << 8)), ProcessExit::Code(3));
        assert_eq!(classify(ExitStatus::from_raw(9)), ProcessExit::Signal(9));
    }
}
