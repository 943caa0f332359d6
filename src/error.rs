/*
    Error type surfaced by the recoverable publish path.
*/
use std::any::Any;

/// Error returned by [`crate::Bus::try_publish`].
///
/// `publish` itself never returns a `Result`. A handler panic propagates
/// to the publisher exactly as an unhandled exception would in a language
/// with checked exceptions, on the view that handler failures are
/// programmer bugs, not something to hide. `try_publish` exists for host
/// applications (long-running servers, game loops) that would rather
/// isolate a misbehaving handler than unwind the whole call stack.
#[derive(thiserror::Error)]
pub enum BusError {
    /// A handler panicked while processing this publish. Carries the
    /// panic payload as caught by [`std::panic::catch_unwind`].
    #[error("a handler panicked while processing this publish")]
    HandlerPanicked(Box<dyn Any + Send>),
}

impl std::fmt::Debug for BusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BusError::HandlerPanicked(_) => f.debug_tuple("HandlerPanicked").finish(),
        }
    }
}
