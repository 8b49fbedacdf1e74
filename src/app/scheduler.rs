use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};

/// Caps concurrent run workers and hands out per-target locks so that two
/// overlapping batch runs never talk to the same device at the same time.
/// One external-tool call per device is an adb requirement, not a choice.
pub struct RunScheduler {
    worker_limit: usize,
    active_workers: Mutex<usize>,
    worker_freed: Condvar,
    target_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl RunScheduler {
    pub fn new(worker_limit: usize) -> Arc<Self> {
        Arc::new(Self {
            worker_limit: worker_limit.max(1),
            active_workers: Mutex::new(0),
            worker_freed: Condvar::new(),
            target_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Blocks until a worker slot frees up.
    pub fn acquire_worker(self: &Arc<Self>) -> WorkerPermit {
        let mut active = self
            .active_workers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        while *active >= self.worker_limit {
            active = self
                .worker_freed
                .wait(active)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        *active += 1;
        WorkerPermit {
            scheduler: Arc::clone(self),
        }
    }

    pub fn target_lock(&self, serial: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .target_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(serial.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn release_worker(&self) {
        let mut active = self
            .active_workers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *active = active.saturating_sub(1);
        self.worker_freed.notify_one();
    }
}

pub struct WorkerPermit {
    scheduler: Arc<RunScheduler>,
}

impl Drop for WorkerPermit {
    fn drop(&mut self) {
        self.scheduler.release_worker();
    }
}
