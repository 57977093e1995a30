//! Single-flight registry of in-flight network operations.
//!
//! At most one [`ProcessingUnit`] may be active per remote resource. A
//! second caller for the same resource parks until the active unit
//! finishes, re-checking after every wake-up, and gives up once a full
//! timeout passes with the same unit still registered. Distinct resources
//! never wait on each other.

use std::sync::Arc;
use std::time::{Duration, Instant};

use notevault_shared::constants::PROCESSING_WAIT_TIMEOUT_SECS;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingStatus {
    Uploading,
    Downloading,
}

/// One active network operation against a remote file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingUnit {
    pub id: Uuid,
    pub status: ProcessingStatus,
    pub uid: Option<String>,
    pub remote_path: String,
}

impl ProcessingUnit {
    pub fn new(status: ProcessingStatus, uid: Option<String>, remote_path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            status,
            uid,
            remote_path: remote_path.into(),
        }
    }

    /// Two units target the same resource when their uids match or, failing
    /// that, their remote paths do.
    pub fn same_resource(&self, other: &ProcessingUnit) -> bool {
        match (&self.uid, &other.uid) {
            (Some(a), Some(b)) if a == b => true,
            _ => self.remote_path == other.remote_path,
        }
    }
}

/// Signalled exactly once, when the owning unit finishes.
#[derive(Default)]
struct Completion {
    finished: Mutex<bool>,
    cond: Condvar,
}

impl Completion {
    fn signal(&self) {
        *self.finished.lock() = true;
        self.cond.notify_all();
    }

    /// Wait until signalled or `deadline`; returns whether it was signalled.
    fn wait_until(&self, deadline: Instant) -> bool {
        let mut finished = self.finished.lock();
        while !*finished {
            if self.cond.wait_until(&mut finished, deadline).timed_out() {
                return *finished;
            }
        }
        true
    }
}

struct ActiveUnit {
    unit: ProcessingUnit,
    completion: Arc<Completion>,
}

pub struct ProcessingRegistry {
    active: Mutex<Vec<ActiveUnit>>,
    timeout: Duration,
}

impl ProcessingRegistry {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(PROCESSING_WAIT_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            active: Mutex::new(Vec::new()),
            timeout,
        }
    }

    /// Register `unit`, blocking while another unit holds the same resource.
    ///
    /// Returns `false` when the wait timed out with the blocking unit still
    /// active; the caller must not perform its operation in that case.
    pub fn start(&self, unit: ProcessingUnit) -> bool {
        loop {
            let (blocking_id, completion) = {
                let mut active = self.active.lock();
                match active.iter().find(|a| a.unit.same_resource(&unit)) {
                    None => {
                        debug!(unit = %unit.id, path = %unit.remote_path, status = ?unit.status, "processing started");
                        active.push(ActiveUnit {
                            unit,
                            completion: Arc::new(Completion::default()),
                        });
                        return true;
                    }
                    Some(blocking) => (blocking.unit.id, Arc::clone(&blocking.completion)),
                }
            };

            debug!(unit = %unit.id, blocking = %blocking_id, "waiting for in-flight operation");
            let deadline = Instant::now() + self.timeout;
            if !completion.wait_until(deadline) && self.is_active(blocking_id) {
                warn!(
                    unit = %unit.id,
                    blocking = %blocking_id,
                    path = %unit.remote_path,
                    "gave up waiting for in-flight operation"
                );
                return false;
            }
        }
    }

    /// Unregister a unit and wake everyone waiting on it.
    pub fn finish(&self, unit_id: Uuid) {
        let removed = {
            let mut active = self.active.lock();
            active
                .iter()
                .position(|a| a.unit.id == unit_id)
                .map(|idx| active.swap_remove(idx))
        };

        match removed {
            Some(entry) => {
                debug!(unit = %unit_id, "processing finished");
                entry.completion.signal();
            }
            None => warn!(unit = %unit_id, "finish called for unknown processing unit"),
        }
    }

    /// [`start`](Self::start) returning a guard that finishes the unit when
    /// dropped.
    pub fn acquire(self: &Arc<Self>, unit: ProcessingUnit) -> Option<ProcessingGuard> {
        let unit_id = unit.id;
        if self.start(unit) {
            Some(ProcessingGuard {
                registry: Arc::clone(self),
                unit_id,
            })
        } else {
            None
        }
    }

    pub fn is_active(&self, unit_id: Uuid) -> bool {
        self.active.lock().iter().any(|a| a.unit.id == unit_id)
    }

    /// Snapshot of the currently registered units.
    pub fn active_units(&self) -> Vec<ProcessingUnit> {
        self.active.lock().iter().map(|a| a.unit.clone()).collect()
    }
}

impl Default for ProcessingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps a unit registered for as long as it lives.
pub struct ProcessingGuard {
    registry: Arc<ProcessingRegistry>,
    unit_id: Uuid,
}

impl ProcessingGuard {
    pub fn unit_id(&self) -> Uuid {
        self.unit_id
    }
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.registry.finish(self.unit_id);
    }
}
