/*
    RAII wrapper tying a subscription's lifetime to a Rust value's scope.
*/
use crate::bus::Bus;
use crate::ids::HandlerId;

/// A move-only handle that unsubscribes its handler when dropped.
///
/// Construction takes a [`Bus`] (cheaply cloned, since it's a thin handle
/// around shared state) and the [`HandlerId`] to release. Explicit early
/// release via [`ScopedSubscription::unsubscribe`] is supported and
/// idempotent; calling it more than once, or letting a released guard
/// drop afterward, is a no-op either way.
pub struct ScopedSubscription {
    bus: Bus,
    id: HandlerId,
}

impl ScopedSubscription {
    pub(crate) fn new(bus: Bus, id: HandlerId) -> Self {
        Self { bus, id }
    }

    /// The wrapped handler's identifier, or [`HandlerId::NONE`] if this
    /// guard has already released.
    pub fn id(&self) -> HandlerId {
        self.id
    }

    /// Unsubscribes the handler now instead of waiting for `Drop`.
    /// Idempotent: a second call (or a subsequent `Drop`) is a no-op.
    pub fn unsubscribe(&mut self) {
        if self.id.is_some() {
            self.bus.unsubscribe(self.id);
            self.id = HandlerId::NONE;
        }
    }
}

impl Drop for ScopedSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::Priority;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn drop_unsubscribes() {
        let bus = Bus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_cb = counter.clone();
        let scoped = bus.subscribe_scoped::<i32, _>(Priority::Normal, move |_| {
            counter_cb.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(bus.handler_count::<i32>(), 1);
        drop(scoped);
        assert_eq!(bus.handler_count::<i32>(), 0);
        bus.publish(1i32);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn explicit_unsubscribe_is_idempotent() {
        let bus = Bus::new();
        let mut scoped = bus.subscribe_scoped::<i32, _>(Priority::Normal, |_| {});
        scoped.unsubscribe();
        assert_eq!(bus.handler_count::<i32>(), 0);
        scoped.unsubscribe(); // no panic, no-op
        assert_eq!(scoped.id(), HandlerId::NONE);
    }
}
