use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use jobwatch::engine::{ProcessEvent, ProcessExit, RuntimeEvent};
use jobwatch::errors::{JobwatchError, Result};
use jobwatch::exec::ExecutorBackend;
use jobwatch::types::{Job, JobId};
use tokio::sync::mpsc;

/// What a fake process does once "spawned".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeOutcome {
    /// Start, then exit with this code.
    Exit(i32),
    /// Start, then die from this signal.
    Signal(i32),
    /// The OS refuses the spawn; no PID is ever reported.
    SpawnError(String),
    /// Start and keep running until [`FakeExecutor::finish`] is called.
    Hang,
}

#[derive(Default)]
struct State {
    tx: Option<mpsc::Sender<RuntimeEvent>>,
    scripts: HashMap<String, VecDeque<FakeOutcome>>,
    spawned: Vec<Job>,
    pids: HashMap<JobId, u32>,
    next_pid: u32,
    reject_dispatch: bool,
}

/// A fake executor that:
/// - records which jobs were "spawned"
/// - reports a scripted outcome per job name (default: exit 0)
///
/// Clones share state, so a test can keep one handle while the runtime owns
/// another.
#[derive(Clone, Default)]
pub struct FakeExecutor {
    state: Arc<Mutex<State>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        let exec = Self::default();
        exec.state.lock().unwrap().next_pid = 10_000;
        exec
    }

    /// Outcomes for successive launches of `name` (originals and retries).
    /// Once the script runs out, launches exit 0.
    pub fn script(self, name: &str, outcomes: impl IntoIterator<Item = FakeOutcome>) -> Self {
        self.state
            .lock()
            .unwrap()
            .scripts
            .insert(name.to_string(), outcomes.into_iter().collect());
        self
    }

    /// Make every `spawn_jobs` call fail as if the backend were unavailable.
    pub fn reject_dispatch(self) -> Self {
        self.state.lock().unwrap().reject_dispatch = true;
        self
    }

    /// Wire this executor to the runtime inbox. Shaped for
    /// `JobService::start_with`.
    pub fn connect(&self) -> impl FnOnce(mpsc::Sender<RuntimeEvent>) -> FakeExecutor + use<> {
        let exec = self.clone();
        move |tx| {
            exec.state.lock().unwrap().tx = Some(tx);
            exec
        }
    }

    pub fn spawned(&self) -> Vec<Job> {
        self.state.lock().unwrap().spawned.clone()
    }

    pub fn spawned_names(&self) -> Vec<String> {
        self.spawned().into_iter().map(|job| job.name).collect()
    }

    pub fn pid_of(&self, job_id: &JobId) -> Option<u32> {
        self.state.lock().unwrap().pids.get(job_id).copied()
    }

    /// Report an exit for a job started with [`FakeOutcome::Hang`].
    pub async fn finish(&self, job_id: &JobId, exit: ProcessExit) {
        let tx = self.state.lock().unwrap().tx.clone().expect("executor not connected");
        tx.send(
            ProcessEvent::Exited {
                job_id: job_id.clone(),
                exit,
            }
            .into(),
        )
        .await
        .expect("runtime closed");
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_jobs(
        &mut self,
        jobs: Vec<Job>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let state = Arc::clone(&self.state);

        Box::pin(async move {
            let mut planned = Vec::new();
            let tx = {
                let mut guard = state.lock().unwrap();
                if guard.reject_dispatch {
                    return Err(JobwatchError::Other(anyhow::anyhow!(
                        "fake executor rejects dispatch"
                    )));
                }
                let tx = guard.tx.clone().expect("executor not connected");

                for job in jobs {
                    let outcome = guard
                        .scripts
                        .get_mut(&job.name)
                        .and_then(VecDeque::pop_front)
                        .unwrap_or(FakeOutcome::Exit(0));
                    let pid = guard.next_pid;
                    guard.next_pid += 1;
                    if !matches!(outcome, FakeOutcome::SpawnError(_)) {
                        guard.pids.insert(job.id.clone(), pid);
                    }
                    guard.spawned.push(job.clone());
                    planned.push((job.id, pid, outcome));
                }
                tx
            };

            // Report from a separate task, like real process runners do, so
            // the runtime never waits on its own inbox.
            tokio::spawn(async move {
                for (job_id, pid, outcome) in planned {
                    let events = match outcome {
                        FakeOutcome::Exit(code) => vec![
                            ProcessEvent::Started { job_id: job_id.clone(), pid },
                            ProcessEvent::Exited { job_id, exit: ProcessExit::Code(code) },
                        ],
                        FakeOutcome::Signal(signal) => vec![
                            ProcessEvent::Started { job_id: job_id.clone(), pid },
                            ProcessEvent::Exited { job_id, exit: ProcessExit::Signal(signal) },
                        ],
                        FakeOutcome::SpawnError(detail) => {
                            vec![ProcessEvent::Errored { job_id, detail }]
                        }
                        FakeOutcome::Hang => vec![ProcessEvent::Started { job_id, pid }],
                    };
                    for event in events {
                        if tx.send(event.into()).await.is_err() {
                            return;
                        }
                    }
                }
            });

            Ok(())
        })
    }
}
