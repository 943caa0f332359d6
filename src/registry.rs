/*
    Type-erased facade over a per-event-type Dispatcher<E>, letting the Bus
    hold dispatchers for arbitrarily many distinct event types in one map.
*/
use std::any::Any;

use crate::ids::HandlerId;

/// Operations reachable without knowing a dispatcher's event type.
///
/// Every [`crate::dispatcher::Dispatcher<E>`] implements this. Typed
/// operations (`add`, `deliver`, `deliver_one`) are reached by downcasting
/// `as_any()` back to the concrete `Dispatcher<E>`, keyed on the same
/// `TypeId` already used to look the entry up in the bus's registry.
pub(crate) trait AnyDispatcher: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    /// Marks the slot with this identifier inactive. See
    /// [`crate::dispatcher::Dispatcher::remove`].
    fn remove(&self, id: HandlerId) -> bool;

    /// Number of currently active slots. See
    /// [`crate::dispatcher::Dispatcher::active_count`].
    fn active_count(&self) -> usize;
}
