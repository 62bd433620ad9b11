use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use jobwatch::monitor::{ProcessProbe, ProcessSample, ProcessSnapshot};

#[derive(Default)]
struct State {
    alive: HashMap<u32, u64>,
    failing: bool,
}

/// Process table under test control.
///
/// Clones share state. Only PIDs registered with [`FakeProbe::set_alive`]
/// appear in snapshots.
#[derive(Clone, Default)]
pub struct FakeProbe {
    state: Arc<Mutex<State>>,
    calls: Arc<AtomicUsize>,
}

impl FakeProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or update) a live PID with its resident memory in bytes.
    pub fn set_alive(&self, pid: u32, memory_bytes: u64) {
        self.state.lock().unwrap().alive.insert(pid, memory_bytes);
    }

    pub fn kill(&self, pid: u32) {
        self.state.lock().unwrap().alive.remove(&pid);
    }

    /// While set, every snapshot call errors.
    pub fn set_failing(&self, failing: bool) {
        self.state.lock().unwrap().failing = failing;
    }

    /// Number of snapshots requested so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ProcessProbe for FakeProbe {
    fn snapshot(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ProcessSnapshot>> + Send + '_>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = {
            let state = self.state.lock().unwrap();
            if state.failing {
                Err(anyhow::anyhow!("process table unavailable"))
            } else {
                Ok(state
                    .alive
                    .iter()
                    .map(|(pid, mem)| (*pid, ProcessSample { memory_bytes: *mem }))
                    .collect())
            }
        };
        Box::pin(async move { result })
    }
}
