//! Per-job overlap guard.
//!
//! Scheduled and manual runs of the same job share one guard, so at most one
//! execution of a job is in flight. A run that finds the guard taken is
//! skipped, never queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared in-flight flag for one job.
#[derive(Debug, Clone, Default)]
pub struct JobGuard {
    busy: Arc<AtomicBool>,
}

/// Proof that the holder owns the job's single execution slot.
///
/// Dropping the permit releases the slot, including during unwinding.
#[derive(Debug)]
pub struct JobPermit {
    busy: Arc<AtomicBool>,
}

impl JobGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the execution slot, or returns `None` while another run holds it.
    pub fn try_acquire(&self) -> Option<JobPermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| JobPermit {
                busy: Arc::clone(&self.busy),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for JobPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
