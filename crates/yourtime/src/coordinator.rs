//! Single-active-timer coordination.
//!
//! The [`Coordinator`] is a process-wide slot naming the one record, if any,
//! that is currently accumulating time. It is a cheap, cloneable handle that
//! is handed to every [`crate::engine::TimerEngine`], so the invariant can be
//! tested without any presentation layer.
//!
//! Each successful acquisition hands out a [`Lease`]. Only the engine holding
//! the current lease may tick, so an engine whose slot was released and then
//! re-acquired for the same record by someone else cannot resume writing.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::record::RecordId;

/// Proof of one acquisition of the active slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lease {
    id: RecordId,
    generation: u64,
}

impl Lease {
    /// The record the slot was acquired for.
    #[must_use]
    pub fn id(self) -> RecordId {
        self.id
    }
}

#[derive(Debug, Default)]
struct Slot {
    active: Option<Lease>,
    generation: u64,
}

/// Arbiter for the single active timer slot.
#[derive(Debug, Clone, Default)]
pub struct Coordinator {
    slot: Arc<Mutex<Slot>>,
}

impl Coordinator {
    /// Create a coordinator with no active timer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for `id`.
    ///
    /// Succeeds only if no timer is active. A record that already holds the
    /// slot does not acquire it again.
    pub fn try_acquire(&self, id: RecordId) -> Option<Lease> {
        let mut slot = self.slot();
        if let Some(current) = slot.active {
            debug!(%id, current = %current.id, "Active timer slot busy");
            return None;
        }

        slot.generation += 1;
        let lease = Lease {
            id,
            generation: slot.generation,
        };
        slot.active = Some(lease);
        debug!(%id, generation = lease.generation, "Active timer slot acquired");
        Some(lease)
    }

    /// Release the slot if it currently names `id`, whoever acquired it.
    ///
    /// Returns `true` if the slot was cleared. Releasing a stale id leaves a
    /// newer holder untouched.
    pub fn release(&self, id: RecordId) -> bool {
        let mut slot = self.slot();
        match slot.active {
            Some(current) if current.id == id => {
                slot.active = None;
                debug!(%id, "Active timer slot released");
                true
            }
            _ => false,
        }
    }

    /// Release the slot only if `lease` is still the current one.
    pub fn release_lease(&self, lease: Lease) -> bool {
        let mut slot = self.slot();
        if slot.active == Some(lease) {
            slot.active = None;
            debug!(id = %lease.id, generation = lease.generation, "Active timer slot released");
            true
        } else {
            false
        }
    }

    /// Whether `lease` is the current holder of the slot.
    #[must_use]
    pub fn holds(&self, lease: Lease) -> bool {
        self.slot().active == Some(lease)
    }

    /// The record currently holding the slot.
    #[must_use]
    pub fn current_active(&self) -> Option<RecordId> {
        self.slot().active.map(Lease::id)
    }

    /// Whether `id` currently holds the slot.
    #[must_use]
    pub fn is_active(&self, id: RecordId) -> bool {
        self.current_active() == Some(id)
    }

    /// Empty the slot regardless of holder.
    ///
    /// Recovery for a slot left behind by an engine that never released it.
    pub fn clear(&self) {
        if let Some(lease) = self.slot().active.take() {
            warn!(id = %lease.id, "Active timer slot force-cleared");
        }
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        // A poisoned slot still holds a valid lease.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
