//! Process-wide batch progress with a single-run guard.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use uuid::Uuid;

use crush_core::BatchProgress;

#[derive(Debug, Default)]
pub(crate) struct ProgressTracker {
    state: RwLock<BatchProgress>,
    running: AtomicBool,
}

/// Holds the running flag. Dropping it, including during a panic, clears it.
#[derive(Debug)]
pub(crate) struct RunGuard {
    tracker: Arc<ProgressTracker>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.tracker.running.store(false, Ordering::Release);
    }
}

impl ProgressTracker {
    /// Claims the running flag and resets progress for a new run.
    ///
    /// Returns `None`, touching nothing, if a run is already active.
    pub(crate) fn try_begin(self: &Arc<Self>, run_id: Uuid, total: usize) -> Option<RunGuard> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        self.update(|p| *p = BatchProgress::preparing(run_id, total));
        Some(RunGuard {
            tracker: Arc::clone(self),
        })
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn snapshot(&self) -> BatchProgress {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn update(&self, f: impl FnOnce(&mut BatchProgress)) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state);
    }

    pub(crate) fn set_status(&self, status: String) {
        self.update(|p| p.status = status);
    }
}
