/*
    Cross-type coordinator: routes subscribe/publish/unsubscribe by event
    type, and integrates newly subscribed handlers into in-flight
    deliveries via the thread-local dispatch-frame stack.
*/
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::dispatcher::Dispatcher;
use crate::error::BusError;
use crate::frame;
use crate::ids::{EventTypeId, HandlerId, Priority};
use crate::registry::AnyDispatcher;
use crate::scoped::ScopedSubscription;

struct BusMaps {
    dispatchers: HashMap<EventTypeId, Arc<dyn AnyDispatcher>>,
    handler_types: HashMap<HandlerId, EventTypeId>,
}

struct BusInner {
    maps: Mutex<BusMaps>,
    next_id: AtomicU64,
}

/// The cross-type event bus coordinator.
///
/// Owns one [`crate::dispatcher::Dispatcher`] per distinct event payload
/// type, a `HandlerId -> event type` index for type-agnostic
/// unsubscription, and a per-bus monotonic identifier counter.
/// Cloning a `Bus` is cheap, since clones share the same underlying state
/// (the way a handle to shared state is typically passed around, with
/// publishers and subscribers alike holding a handle to the same bus).
#[derive(Clone)]
pub struct Bus {
    inner: Arc<BusInner>,
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus {
    /// Creates a new, empty bus.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                maps: Mutex::new(BusMaps {
                    dispatchers: HashMap::new(),
                    handler_types: HashMap::new(),
                }),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    fn bus_id(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }

    fn get_or_create_dispatcher<E: Send + Sync + 'static>(&self) -> Arc<dyn AnyDispatcher> {
        let type_id = EventTypeId::of::<E>();
        let mut maps = self.inner.maps.lock().expect("bus lock poisoned");
        maps.dispatchers
            .entry(type_id)
            .or_insert_with(|| Arc::new(Dispatcher::<E>::new()) as Arc<dyn AnyDispatcher>)
            .clone()
    }

    fn downcast<E: Send + Sync + 'static>(dispatcher: &Arc<dyn AnyDispatcher>) -> &Dispatcher<E> {
        dispatcher
            .as_any()
            .downcast_ref::<Dispatcher<E>>()
            .expect("dispatcher registry corrupted: TypeId key did not match stored dispatcher")
    }

    fn subscribe_impl<E, F>(&self, priority: Priority, callback: F, one_shot: bool) -> HandlerId
    where
        E: Send + Sync + 'static,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let raw_id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let id = HandlerId(raw_id);

        let dispatcher_any = self.get_or_create_dispatcher::<E>();
        let dispatcher = Self::downcast::<E>(&dispatcher_any);
        dispatcher.add(id, priority, Arc::new(callback), one_shot);

        {
            let mut maps = self.inner.maps.lock().expect("bus lock poisoned");
            maps.handler_types.insert(id, EventTypeId::of::<E>());
        }

        // Re-entrant subscription rule: if this thread is already inside a
        // delivery of `E` on this bus, the new handler observes that
        // event once, right now, before any not-yet-visited handler from
        // the outer iteration runs.
        frame::with_innermost_matching_frame::<E, ()>(self.bus_id(), |_frame_dispatcher, event| {
            dispatcher.deliver_one(id, event);
        });

        id
    }

    /// Registers a permanent handler for events of type `E` at `priority`.
    /// Returns the handler's identifier (always `>= 1`).
    pub fn subscribe<E, F>(&self, priority: Priority, callback: F) -> HandlerId
    where
        E: Send + Sync + 'static,
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.subscribe_impl(priority, callback, false)
    }

    /// Registers a handler for events of type `E` at `priority` that fires
    /// at most once, ever, across any number of publishes or threads.
    pub fn subscribe_once<E, F>(&self, priority: Priority, callback: F) -> HandlerId
    where
        E: Send + Sync + 'static,
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.subscribe_impl(priority, callback, true)
    }

    /// Equivalent to [`Bus::subscribe`], wrapped in a
    /// [`ScopedSubscription`] that unsubscribes on drop.
    pub fn subscribe_scoped<E, F>(&self, priority: Priority, callback: F) -> ScopedSubscription
    where
        E: Send + Sync + 'static,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = self.subscribe::<E, F>(priority, callback);
        ScopedSubscription::new(self.clone(), id)
    }

    /// Equivalent to [`Bus::subscribe_once`], wrapped in a
    /// [`ScopedSubscription`] that unsubscribes on drop (a no-op if the
    /// handler has already fired).
    pub fn subscribe_once_scoped<E, F>(&self, priority: Priority, callback: F) -> ScopedSubscription
    where
        E: Send + Sync + 'static,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = self.subscribe_once::<E, F>(priority, callback);
        ScopedSubscription::new(self.clone(), id)
    }

    /// Unsubscribes the handler with this identifier. A silent no-op if
    /// `id` is unknown (already unsubscribed, or never issued by this
    /// bus). This keeps [`ScopedSubscription`]'s `Drop` safe to run after
    /// an explicit unsubscribe already happened.
    pub fn unsubscribe(&self, id: HandlerId) {
        let type_id = {
            let mut maps = self.inner.maps.lock().expect("bus lock poisoned");
            maps.handler_types.remove(&id)
        };
        let Some(type_id) = type_id else {
            return;
        };
        let dispatcher = {
            let maps = self.inner.maps.lock().expect("bus lock poisoned");
            maps.dispatchers.get(&type_id).cloned()
        };
        if let Some(dispatcher) = dispatcher {
            dispatcher.remove(id);
        }
    }

    /// Delivers `event` to every active handler for `E`, in priority
    /// order, on the calling thread. A handler panic aborts the remaining
    /// handlers for this publish and then propagates to the caller.
    pub fn publish<E: Send + Sync + 'static>(&self, event: E) {
        let dispatcher_any = self.get_or_create_dispatcher::<E>();
        let dispatcher = Self::downcast::<E>(&dispatcher_any);
        let _frame = frame::push_frame(self.bus_id(), dispatcher_any.as_ref(), &event);
        dispatcher.deliver(&event);
    }

    /// Equivalent to [`Bus::publish`], but catches a handler panic instead
    /// of letting it unwind past this call. Prefer `publish` unless the
    /// embedding application specifically needs to isolate a misbehaving
    /// handler from the rest of its process.
    pub fn try_publish<E: Send + Sync + 'static>(&self, event: E) -> Result<(), BusError> {
        let dispatcher_any = self.get_or_create_dispatcher::<E>();
        let dispatcher = Self::downcast::<E>(&dispatcher_any);
        let outcome = {
            let _frame = frame::push_frame(self.bus_id(), dispatcher_any.as_ref(), &event);
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| dispatcher.deliver(&event)))
        };
        outcome.map_err(BusError::HandlerPanicked)
    }

    /// Number of currently active handlers for `E` (0 if `E` has never
    /// had a dispatcher created, i.e. nobody has subscribed or published
    /// it yet).
    pub fn handler_count<E: Send + Sync + 'static>(&self) -> usize {
        let type_id = EventTypeId::of::<E>();
        let maps = self.inner.maps.lock().expect("bus lock poisoned");
        maps.dispatchers
            .get(&type_id)
            .map(|d| d.active_count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn handler_ids_are_strictly_increasing_and_never_reused() {
        let bus = Bus::new();
        let a = bus.subscribe::<i32, _>(Priority::Normal, |_| {});
        let b = bus.subscribe::<i32, _>(Priority::Normal, |_| {});
        assert!(b.as_u64() > a.as_u64());
        bus.unsubscribe(b);
        let c = bus.subscribe::<i32, _>(Priority::Normal, |_| {});
        assert!(c.as_u64() > b.as_u64());
    }

    #[test]
    fn publishing_with_zero_subscribers_is_a_no_op() {
        let bus = Bus::new();
        bus.publish(42i32); // must not panic
        assert_eq!(bus.handler_count::<i32>(), 0);
    }

    #[test]
    fn subscribe_unsubscribe_round_trip_restores_handler_count() {
        let bus = Bus::new();
        assert_eq!(bus.handler_count::<i32>(), 0);
        let id = bus.subscribe::<i32, _>(Priority::Normal, |_| {});
        assert_eq!(bus.handler_count::<i32>(), 1);
        bus.unsubscribe(id);
        assert_eq!(bus.handler_count::<i32>(), 0);
    }

    #[test]
    fn double_unsubscribe_is_a_no_op() {
        let bus = Bus::new();
        let id = bus.subscribe::<i32, _>(Priority::Normal, |_| {});
        bus.unsubscribe(id);
        bus.unsubscribe(id); // must not panic
        assert_eq!(bus.handler_count::<i32>(), 0);
    }

    #[test]
    fn unsubscribe_of_unknown_id_is_a_no_op() {
        let bus = Bus::new();
        bus.unsubscribe(HandlerId(999)); // must not panic
    }

    #[test]
    fn subscribe_during_dispatch_observes_current_event_and_future_ones() {
        let bus = Bus::new();
        let order = Arc::new(StdMutex::new(Vec::new()));
        let bus_for_a = bus.clone();
        let order_for_a = order.clone();
        bus.subscribe::<i32, _>(Priority::High, move |event| {
            order_for_a.lock().unwrap().push(("A", *event));
            let order_for_b = order_for_a.clone();
            bus_for_a.subscribe::<i32, _>(Priority::Low, move |event| {
                order_for_b.lock().unwrap().push(("B", *event));
            });
        });

        bus.publish(1);
        assert_eq!(*order.lock().unwrap(), vec![("A", 1), ("B", 1)]);
        assert_eq!(bus.handler_count::<i32>(), 2);

        order.lock().unwrap().clear();
        bus.publish(2);
        assert_eq!(
            *order.lock().unwrap(),
            vec![("A", 2), ("B", 2), ("B", 2)]
        );
    }

    #[test]
    fn unsubscribe_other_during_dispatch_suppresses_not_yet_visited_target() {
        let bus = Bus::new();
        let order = Arc::new(StdMutex::new(Vec::new()));
        let bus_for_a = bus.clone();
        let b_id = Arc::new(StdMutex::new(HandlerId::NONE));
        let b_id_for_setup = b_id.clone();

        let order_for_a = order.clone();
        bus.subscribe::<i32, _>(Priority::High, move |_event| {
            order_for_a.lock().unwrap().push("A");
            let target = *b_id_for_setup.lock().unwrap();
            bus_for_a.unsubscribe(target);
        });
        let order_for_b = order.clone();
        let b = bus.subscribe::<i32, _>(Priority::Low, move |_event| {
            order_for_b.lock().unwrap().push("B");
        });
        *b_id.lock().unwrap() = b;

        bus.publish(1);

        assert_eq!(*order.lock().unwrap(), vec!["A"]);
        assert_eq!(bus.handler_count::<i32>(), 1);
    }

    #[test]
    fn recursive_publish_terminates() {
        let bus = Bus::new();
        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let bus_for_handler = bus.clone();
        let counter_for_handler = counter.clone();
        bus.subscribe::<i32, _>(Priority::Normal, move |payload| {
            counter_for_handler.fetch_add(1, Ordering::Relaxed);
            if *payload < 3 {
                bus_for_handler.publish(payload + 1);
            }
        });

        bus.publish(0);

        assert_eq!(counter.load(Ordering::Relaxed), 4); // depths 0,1,2,3
    }

    #[test]
    fn try_publish_recovers_from_handler_panic_and_leaves_bus_usable() {
        let bus = Bus::new();
        let normal_count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        bus.subscribe_once::<i32, _>(Priority::Normal, |_| panic!("boom"));
        let normal_count_cb = normal_count.clone();
        bus.subscribe::<i32, _>(Priority::Low, move |_| {
            normal_count_cb.fetch_add(1, Ordering::Relaxed);
        });

        let first = bus.try_publish(1);
        assert!(first.is_err());
        assert_eq!(normal_count.load(Ordering::Relaxed), 0);

        let second = bus.try_publish(2);
        assert!(second.is_ok());
        assert_eq!(normal_count.load(Ordering::Relaxed), 1);
    }
}
