#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Signal/slot connections between emitters and receiver objects.
//!
//! An [`Emitter`] broadcasts values to a list of connections. Each connection binds one receiver
//! object to one callable, typically a method of the receiver type. Either side of a connection
//! may be dropped or copied at any time and the other side is kept consistent:
//!
//! * Dropping an emitter removes it from every receiver it was connected to.
//! * Dropping a receiver object removes every connection targeting it, from every emitter.
//! * Cloning an emitter gives the clone the same connections as the original.
//! * Duplicating a receiver object via [`HasReceiver::duplicate()`] gives every emitter connected
//!   to the original an equivalent connection to the copy.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! use signals::{Emitter, HasReceiver, Receiver};
//!
//! #[derive(Debug, Default)]
//! struct Odometer {
//!     receiver: Receiver,
//!     meters: AtomicU64,
//! }
//!
//! impl HasReceiver for Odometer {
//!     fn receiver(&self) -> &Receiver {
//!         &self.receiver
//!     }
//! }
//!
//! impl Odometer {
//!     fn on_moved(&self, meters: u64) {
//!         self.meters.fetch_add(meters, Ordering::Relaxed);
//!     }
//! }
//!
//! let moved = Emitter::<u64>::builder().name("moved").build();
//!
//! let trip = Arc::new(Odometer::default());
//! let total = Arc::new(Odometer::default());
//!
//! moved.connect(&trip, Odometer::on_moved);
//! moved.connect(&total, Odometer::on_moved);
//!
//! moved.emit(150);
//! moved.emit(50);
//!
//! // Resetting the trip counter: replace it with a fresh one. The old one disconnects itself.
//! drop(trip);
//! moved.emit(300);
//!
//! assert_eq!(total.meters.load(Ordering::Relaxed), 500);
//! assert_eq!(moved.connection_count(), 1);
//! ```
//!
//! # Receiver objects
//!
//! A receiver object is any type that embeds a [`Receiver`] and implements [`HasReceiver`] to
//! expose it. Receiver objects are connected via `Arc<T>`; emitters only hold weak references to
//! them, so connecting never extends the lifetime of a receiver object.
//!
//! # Callbacks
//!
//! Callables run without any lock held. They may connect, disconnect, emit or drop emitters and
//! receiver objects other than the emitter currently dispatching to them. Connections removed
//! during an [`Emitter::emit()`] are skipped if their turn has not come yet; connections added
//! during an `emit()` are first called by the next `emit()`.
//!
//! # Thread safety
//!
//! Every emitter and receiver carries a [`LockPolicy`] type parameter that decides how the two
//! sides of a connection synchronize:
//!
//! * [`GlobalLock`] (default) - one process-wide reentrant lock.
//! * [`PerObjectLock`] - one reentrant lock per object, acquired in a fixed order.
//! * [`Unsynchronized`] - no locking, for single-threaded object graphs.
//!
//! Emitters and receivers can only be connected when they use the same policy.
//!
//! # Logging
//!
//! Connection lifecycle events are logged via the [`tracing`](https://docs.rs/tracing) crate:
//! teardown and copies at `debug` level, individual connects, disconnects and emits at `trace`
//! level. Emitters can be given a name via [`EmitterBuilder::name()`] to tell them apart in logs.

mod connection;
mod constants;
mod emitter;
mod emitter_builder;
mod object_id;
mod policy;
mod receiver;

#[cfg(test)]
mod test_utils;

pub(crate) use connection::{Connection, MethodSlot};
pub(crate) use constants::*;
pub use emitter::Emitter;
pub(crate) use emitter::{EmitterCore, EmitterLink};
pub use emitter_builder::*;
pub(crate) use object_id::ObjectId;
pub(crate) use policy::lock_pair;
pub use policy::{GlobalLock, LockPolicy, PerObjectLock, PolicyGuard, Unsynchronized};
pub use receiver::{HasReceiver, Receiver};
pub(crate) use receiver::ReceiverCore;

/// Prevents implementation of a trait outside this crate.
trait Sealed {}
