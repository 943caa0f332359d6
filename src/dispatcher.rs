/*
    Per-event-type dispatcher: the ordered slot list, priority sort,
    snapshot-and-iterate delivery, and one-shot claim arbitration.
*/
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use crate::ids::{HandlerId, Priority};
use crate::registry::AnyDispatcher;
use crate::slot::{Callback, Slot};

/// Owns the ordered slot sequence for one event type and executes
/// synchronous delivery.
///
/// Invariant: at rest, the sequence is sorted by priority descending
/// (`High` first), ties broken by subscription order, and contains no
/// inactive entries. During delivery the invariant is relaxed, as described
/// in [`Dispatcher::deliver`].
pub(crate) struct Dispatcher<E> {
    slots: RwLock<Vec<Arc<Slot<E>>>>,
}

impl<E> Default for Dispatcher<E> {
    fn default() -> Self {
        Self {
            slots: RwLock::new(Vec::new()),
        }
    }
}

impl<E> Dispatcher<E> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends a new slot, then re-establishes priority order with a
    /// stable sort. Safe to call concurrently with delivery on any
    /// thread, including from within a handler on the same thread.
    pub(crate) fn add(&self, id: HandlerId, priority: Priority, callback: Callback<E>, one_shot: bool) {
        let slot = Arc::new(Slot::new(id, priority, callback, one_shot));
        let mut slots = self.slots.write().expect("dispatcher lock poisoned");
        slots.push(slot);
        // Stable sort: equal-priority slots keep their relative (subscription) order.
        slots.sort_by(|a, b| a.priority.cmp(&b.priority));
    }

    /// Marks the slot inactive. Returns `false` if no such slot exists, or
    /// it was already inactive. Always excises now-inactive entries from
    /// the live list before returning. This is safe regardless of whether a
    /// delivery is in flight elsewhere, because delivery iterates its own
    /// snapshot of `Arc<Slot<E>>`s, unaffected by removal from this `Vec`.
    pub(crate) fn remove(&self, id: HandlerId) -> bool {
        let mut slots = self.slots.write().expect("dispatcher lock poisoned");
        let removed = match slots.iter().position(|s| s.id == id) {
            Some(idx) => slots[idx].deactivate(),
            None => false,
        };
        slots.retain(|s| s.is_active());
        removed
    }

    /// Invokes every currently active slot for `event`, in priority order.
    ///
    /// 1. Snapshot the slot sequence under a shared lock, then release it.
    /// 2. For each slot in the snapshot: a one-shot slot must win an
    ///    atomic active-to-inactive compare-and-set before it is invoked;
    ///    a normal slot is invoked iff `active` reads true just before the
    ///    call. Either way a slot already excised (or claimed by a
    ///    concurrent delivery) is silently skipped.
    /// 3. If any one-shot was claimed during this delivery, excise
    ///    now-inactive entries.
    /// 4. A handler panic aborts the remaining iteration: required
    ///    cleanup still runs, then the panic resumes so it reaches the
    ///    publisher.
    pub(crate) fn deliver(&self, event: &E) {
        let snapshot: Vec<Arc<Slot<E>>> = {
            let slots = self.slots.read().expect("dispatcher lock poisoned");
            slots.clone()
        };

        let mut claimed_one_shot = false;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            for slot in &snapshot {
                if slot.one_shot {
                    if !slot.claim_one_shot() {
                        continue;
                    }
                    claimed_one_shot = true;
                    (slot.callback)(event);
                } else {
                    if !slot.check_active_for_delivery() {
                        continue;
                    }
                    (slot.callback)(event);
                }
            }
        }));

        if claimed_one_shot {
            self.cleanup();
        }
        if let Err(payload) = outcome {
            panic::resume_unwind(payload);
        }
    }

    /// Invokes exactly one slot, identified by `id`, applying the same
    /// one-shot claim protocol as [`Dispatcher::deliver`]. Used by the bus
    /// to run a just-subscribed handler against the event of an in-flight
    /// delivery. A no-op if `id` is unknown or was already claimed/removed.
    pub(crate) fn deliver_one(&self, id: HandlerId, event: &E) {
        let slot = {
            let slots = self.slots.read().expect("dispatcher lock poisoned");
            slots.iter().find(|s| s.id == id).cloned()
        };
        let slot = match slot {
            Some(slot) => slot,
            None => return,
        };

        let mut claimed_one_shot = false;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            if slot.one_shot {
                if slot.claim_one_shot() {
                    claimed_one_shot = true;
                    (slot.callback)(event);
                }
            } else if slot.check_active_for_delivery() {
                (slot.callback)(event);
            }
        }));

        if claimed_one_shot {
            self.cleanup();
        }
        if let Err(payload) = outcome {
            panic::resume_unwind(payload);
        }
    }

    /// Number of active slots.
    pub(crate) fn active_count(&self) -> usize {
        let slots = self.slots.read().expect("dispatcher lock poisoned");
        slots.iter().filter(|s| s.is_active()).count()
    }

    fn cleanup(&self) {
        let mut slots = self.slots.write().expect("dispatcher lock poisoned");
        slots.retain(|s| s.is_active());
    }
}

impl<E: Send + Sync + 'static> AnyDispatcher for Dispatcher<E> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn remove(&self, id: HandlerId) -> bool {
        Dispatcher::remove(self, id)
    }

    fn active_count(&self) -> usize {
        Dispatcher::active_count(self)
    }
}
