/*
    A single handler registration and its delivery metadata.
*/
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::ids::{HandlerId, Priority};

/// Callback shape accepted by every subscribe method: a read-only
/// reference to the event, no return value.
pub(crate) type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// One registration inside a [`crate::dispatcher::Dispatcher`].
///
/// `id`, `priority`, `callback`, and `one_shot` are fixed at construction.
/// `active` is the sole mutable field and is the arbiter of both ordinary
/// unsubscription and one-shot claim atomicity.
pub(crate) struct Slot<E> {
    pub(crate) id: HandlerId,
    pub(crate) priority: Priority,
    pub(crate) callback: Callback<E>,
    pub(crate) one_shot: bool,
    active: AtomicBool,
}

impl<E> Slot<E> {
    pub(crate) fn new(id: HandlerId, priority: Priority, callback: Callback<E>, one_shot: bool) -> Self {
        Self {
            id,
            priority,
            callback,
            one_shot,
            active: AtomicBool::new(true),
        }
    }

    /// Non-atomic liveness check used by `remove` and at-rest bookkeeping.
    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Marks the slot inactive. Returns `true` if this call is the one that
    /// transitioned it (mirrors `remove`'s "already inactive" contract).
    pub(crate) fn deactivate(&self) -> bool {
        self.active.swap(false, Ordering::Release)
    }

    /// The one-shot claim: succeeds for exactly one caller, ever, across any
    /// number of concurrent deliveries.
    pub(crate) fn claim_one_shot(&self) -> bool {
        self.active
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Just-in-time liveness check performed immediately before invoking a
    /// non-one-shot slot during delivery.
    pub(crate) fn check_active_for_delivery(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}
