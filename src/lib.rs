//! A type-safe, in-process publish/subscribe event bus.
//!
//! Producers [`Bus::publish`] values of any `'static` payload type;
//! handlers previously registered with [`Bus::subscribe`] receive those
//! values synchronously, in priority order, on the publishing thread.
//!
//! ```
//! use eventure::{Bus, Priority};
//!
//! struct PlayerJoined { name: &'static str }
//!
//! let bus = Bus::new();
//! let id = bus.subscribe::<PlayerJoined, _>(Priority::High, |event| {
//!     println!("welcome, {}", event.name);
//! });
//! bus.publish(PlayerJoined { name: "ada" });
//! bus.unsubscribe(id);
//! ```
//!
//! The bus is fully re-entrant: a handler may publish further events,
//! subscribe new handlers, or unsubscribe any handler, including itself,
//! while delivery is in progress. See [`Bus`] for the full contract.

mod bus;
mod dispatcher;
mod error;
mod frame;
mod ids;
mod registry;
mod scoped;
mod slot;

pub use bus::Bus;
pub use error::BusError;
pub use ids::{HandlerId, Priority};
pub use scoped::ScopedSubscription;
