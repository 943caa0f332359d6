/*
    Per-thread stack of in-flight-delivery records, enabling a nested
    subscribe/unsubscribe call to find "which dispatch am I inside of"
    without a global registry.
*/
use std::cell::RefCell;

use crate::ids::EventTypeId;
use crate::registry::AnyDispatcher;

struct Frame {
    bus_id: usize,
    event_type: EventTypeId,
    // Raw pointers into the publishing stack frame. Valid for exactly the
    // lifetime of the `FrameGuard` that created this entry: `publish`
    // borrows the dispatcher and the event for its whole body, and the
    // guard's `Drop` truncates this frame (and everything pushed after it)
    // off the stack before `publish` returns, including on unwind.
    dispatcher: *const dyn AnyDispatcher,
    event: *const (),
}

thread_local! {
    static FRAME_STACK: RefCell<Vec<Frame>> = RefCell::new(Vec::new());
}

/// RAII guard returned by [`push_frame`]. Truncates the thread-local stack
/// back to its pre-push depth on every exit path, including a handler
/// panic unwinding through `publish`.
pub(crate) struct FrameGuard {
    depth_before: usize,
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        FRAME_STACK.with(|stack| {
            stack.borrow_mut().truncate(self.depth_before);
        });
    }
}

/// Pushes a frame recording "this thread is delivering an event of type
/// `E` on the bus identified by `bus_id`, via `dispatcher`". Must be paired
/// with dropping the returned guard before `event` or `dispatcher` become
/// invalid; `Bus::publish` holds the guard for exactly its own body.
pub(crate) fn push_frame<E: 'static>(
    bus_id: usize,
    dispatcher: &dyn AnyDispatcher,
    event: &E,
) -> FrameGuard {
    let frame = Frame {
        bus_id,
        event_type: EventTypeId::of::<E>(),
        // SAFETY: raw-pointer cast that erases `dispatcher`'s borrow lifetime;
        // `as` cannot perform this cast directly because `*const dyn
        // AnyDispatcher` is implicitly `'static`. Validity past this point is
        // guaranteed by `FrameGuard` truncating the stack before `dispatcher`
        // goes out of scope (see the struct-level comment above).
        dispatcher: unsafe {
            std::mem::transmute::<&dyn AnyDispatcher, *const dyn AnyDispatcher>(dispatcher)
        },
        event: event as *const E as *const (),
    };
    let depth_before = FRAME_STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        let depth = stack.len();
        stack.push(frame);
        depth
    });
    FrameGuard { depth_before }
}

/// Looks up the innermost frame on this thread matching `(bus_id, E)` and,
/// if found, invokes `f` with the frame's dispatcher and event reference.
///
/// Used by `Bus::subscribe`/`subscribe_once` to honor the re-entrant
/// subscription rule: a handler registered mid-delivery of the same event
/// type, on the same bus, observes the current event once before the
/// function returns.
pub(crate) fn with_innermost_matching_frame<E, R>(
    bus_id: usize,
    f: impl FnOnce(&dyn AnyDispatcher, &E) -> R,
) -> Option<R>
where
    E: 'static,
{
    let event_type = EventTypeId::of::<E>();
    // Copy the raw pointers out and drop the RefCell borrow before calling
    // `f`: `f` ultimately runs a user callback, which may itself publish
    // (pushing a new frame) and would otherwise deadlock against our own
    // immutable borrow here.
    let found = FRAME_STACK.with(|stack| {
        stack
            .borrow()
            .iter()
            .rev()
            .find(|frame| frame.bus_id == bus_id && frame.event_type == event_type)
            .map(|frame| (frame.dispatcher, frame.event))
    });

    found.map(|(dispatcher_ptr, event_ptr)| {
        // Safety: `event_type` equality guarantees `event_ptr` was derived
        // from a `&E` by `push_frame::<E>`, and the frame is still on the
        // stack (hence its publish call is still executing on this
        // thread), so both pointers remain valid for this call.
        let dispatcher: &dyn AnyDispatcher = unsafe { &*dispatcher_ptr };
        let event: &E = unsafe { &*(event_ptr as *const E) };
        f(dispatcher, event)
    })
}
