// src/monitor/probe.rs

//! Operating-system process enumeration.
//!
//! The liveness monitor asks a [`ProcessProbe`] for one [`ProcessSnapshot`]
//! per tick. Production uses [`SysinfoProbe`]; tests provide a fake probe
//! whose process table they control.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use sysinfo::System;
use tracing::trace;

/// Usage sample for one live process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessSample {
    /// Resident set size in bytes.
    pub memory_bytes: u64,
}

/// Live processes at one instant, keyed by PID.
#[derive(Debug, Clone, Default)]
pub struct ProcessSnapshot {
    processes: HashMap<u32, ProcessSample>,
}

impl ProcessSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pid: u32, sample: ProcessSample) {
        self.processes.insert(pid, sample);
    }

    pub fn get(&self, pid: u32) -> Option<&ProcessSample> {
        self.processes.get(&pid)
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.processes.contains_key(&pid)
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}

impl FromIterator<(u32, ProcessSample)> for ProcessSnapshot {
    fn from_iter<I: IntoIterator<Item = (u32, ProcessSample)>>(iter: I) -> Self {
        Self {
            processes: iter.into_iter().collect(),
        }
    }
}

/// Trait abstracting the OS process listing.
pub trait ProcessProbe: Send {
    /// Enumerate live processes. An error means the listing itself failed;
    /// callers must not read it as "every process is gone".
    fn snapshot(&mut self) -> Pin<Box<dyn Future<Output = Result<ProcessSnapshot>> + Send + '_>>;
}

/// Probe backed by `sysinfo`. The refresh runs on the blocking pool.
#[derive(Clone)]
pub struct SysinfoProbe {
    system: Arc<Mutex<System>>,
}

impl std::fmt::Debug for SysinfoProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SysinfoProbe").finish_non_exhaustive()
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoProbe {
    pub fn new() -> Self {
        Self {
            system: Arc::new(Mutex::new(System::new())),
        }
    }
}

impl ProcessProbe for SysinfoProbe {
    fn snapshot(&mut self) -> Pin<Box<dyn Future<Output = Result<ProcessSnapshot>> + Send + '_>> {
        let system = Arc::clone(&self.system);

        Box::pin(async move {
            tokio::task::spawn_blocking(move || {
                let mut sys = system
                    .lock()
                    .map_err(|_| anyhow!("process table lock poisoned"))?;
                sys.refresh_processes();

                let snapshot: ProcessSnapshot = sys
                    .processes()
                    .iter()
                    .map(|(pid, process)| {
                        (
                            pid.as_u32(),
                            ProcessSample {
                                memory_bytes: process.memory(),
                            },
                        )
                    })
                    .collect();

                trace!(processes = snapshot.len(), "process table refreshed");
                Ok::<_, anyhow::Error>(snapshot)
            })
            .await
            .context("process listing task panicked")?
        })
    }
}
