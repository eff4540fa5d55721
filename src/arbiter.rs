//! Single-slot guard for in-flight normalizations.
//!
//! At most one operation may run per [`OperationSlot`]. A claim is a
//! `compare_exchange` on an atomic id (0 means free); a losing claim fails
//! immediately instead of queueing. The winning claim holds an
//! [`OperationGuard`] that frees the slot when dropped. The guard owns an
//! `Arc` of its slot so it can travel into a worker thread: the slot stays
//! claimed until the work itself ends, by return or by unwinding, even if
//! whoever awaited it has gone away.

use crate::pipeline::PipelineError;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

const FREE: u64 = 0;

#[derive(Debug, Default)]
pub struct OperationSlot {
    current: AtomicU64,
    next_id: AtomicU64,
}

impl OperationSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot, or fail with [`PipelineError::OperationInProgress`].
    pub fn try_acquire(self: &Arc<Self>) -> Result<OperationGuard, PipelineError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.current
            .compare_exchange(FREE, id, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| PipelineError::OperationInProgress)?;
        trace!(id, "operation slot claimed");
        Ok(OperationGuard {
            slot: Arc::clone(self),
            id,
        })
    }

    /// Id of the in-flight operation, if any.
    pub fn current(&self) -> Option<u64> {
        match self.current.load(Ordering::Acquire) {
            FREE => None,
            id => Some(id),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.current().is_some()
    }
}

/// Holds the slot until dropped.
#[derive(Debug)]
pub struct OperationGuard {
    slot: Arc<OperationSlot>,
    id: u64,
}

impl OperationGuard {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        // Only the owner may clear its own claim
        let _ = self.slot.current.compare_exchange(
            self.id,
            FREE,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        trace!(id = self.id, "operation slot released");
    }
}
