/*
    Identifier and priority primitives shared by the dispatcher and bus.
*/
use std::any::TypeId;

/// A process-wide handle to one registered handler.
///
/// Allocated strictly increasingly per [`crate::Bus`], starting at 1. The
/// value `0` is reserved to mean "no handler" and is never returned by
/// [`crate::Bus::subscribe`] or [`crate::Bus::subscribe_once`]; it is the
/// value a moved-from [`crate::ScopedSubscription`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(pub(crate) u64);

impl HandlerId {
    pub(crate) const NONE: HandlerId = HandlerId(0);

    /// Returns the raw numeric value of this identifier.
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// `true` for every identifier actually issued by a bus (never for
    /// [`HandlerId::NONE`]).
    pub fn is_some(self) -> bool {
        self.0 != 0
    }
}

/// Runtime-unique tag identifying an event payload type.
///
/// Two events share a dispatcher iff their tags are equal. Backed by
/// [`TypeId`], which is stable for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct EventTypeId(TypeId);

impl EventTypeId {
    pub(crate) fn of<E: 'static>() -> Self {
        EventTypeId(TypeId::of::<E>())
    }
}

/// Delivery priority for a registered handler.
///
/// Three totally ordered levels exist and no others: `High` runs before
/// `Normal`, which runs before `Low`. The derived [`Ord`] relies on the
/// declaration order below, so this enum's variant order is load-bearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    High,
    Normal,
    Low,
}
