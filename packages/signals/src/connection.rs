use std::any::{Any, type_name};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::{ERR_REBIND_TYPE_MISMATCH, LockPolicy, ObjectId, ReceiverCore};

/// A callable bound to a receiver object, with the receiver type erased.
pub(crate) trait Slot<A>: Send + Sync {
    /// Calls the bound callable with `args`.
    ///
    /// Does nothing if the receiver object is already being dropped.
    fn call(&self, args: A);

    /// Returns the same callable bound to the same receiver object.
    fn clone_slot(&self) -> Box<dyn Slot<A>>;

    /// Returns the same callable bound to `target`.
    ///
    /// # Panics
    ///
    /// Panics if `target` is not of the exact type the callable expects.
    fn rebind(&self, target: Arc<dyn Any + Send + Sync>) -> Box<dyn Slot<A>>;
}

/// A [`Slot`] that calls a function taking the receiver object by shared reference.
///
/// The receiver object is only weakly referenced. Its own teardown is what removes the
/// connection, so an emitter never keeps a receiver alive.
pub(crate) struct MethodSlot<T, A> {
    target: Weak<T>,
    method: Arc<dyn Fn(&T, A) + Send + Sync>,
}

impl<T, A> MethodSlot<T, A>
where
    T: Send + Sync + 'static,
    A: 'static,
{
    #[must_use]
    pub(crate) fn new<F>(target: &Arc<T>, method: F) -> Self
    where
        F: Fn(&T, A) + Send + Sync + 'static,
    {
        Self {
            target: Arc::downgrade(target),
            method: Arc::new(method),
        }
    }
}

impl<T, A> Slot<A> for MethodSlot<T, A>
where
    T: Send + Sync + 'static,
    A: 'static,
{
    fn call(&self, args: A) {
        // Fails only while the target is mid-drop, after which its receiver removes us.
        if let Some(target) = self.target.upgrade() {
            (self.method)(target.as_ref(), args);
        }
    }

    fn clone_slot(&self) -> Box<dyn Slot<A>> {
        Box::new(Self {
            target: Weak::clone(&self.target),
            method: Arc::clone(&self.method),
        })
    }

    fn rebind(&self, target: Arc<dyn Any + Send + Sync>) -> Box<dyn Slot<A>> {
        let Ok(target) = target.downcast::<T>() else {
            panic!("{ERR_REBIND_TYPE_MISMATCH}");
        };

        Box::new(Self {
            target: Arc::downgrade(&target),
            method: Arc::clone(&self.method),
        })
    }
}

/// One subscription of a receiver to an emitter.
///
/// Owned exclusively by the connection list of one emitter. A connection starts out active and
/// becomes removed when it is taken out of that list. A removed connection is never invoked
/// again, even if an `emit()` already in progress captured it before the removal.
pub(crate) struct Connection<A, P>
where
    P: LockPolicy,
{
    receiver: Arc<ReceiverCore<P>>,
    slot: Box<dyn Slot<A>>,
    active: AtomicBool,
}

impl<A, P> Connection<A, P>
where
    A: 'static,
    P: LockPolicy,
{
    #[must_use]
    pub(crate) fn new(receiver: Arc<ReceiverCore<P>>, slot: Box<dyn Slot<A>>) -> Self {
        Self {
            receiver,
            slot,
            active: AtomicBool::new(true),
        }
    }

    pub(crate) fn invoke(&self, args: A) {
        if self.is_active() {
            self.slot.call(args);
        }
    }

    #[must_use]
    pub(crate) fn target_id(&self) -> ObjectId {
        self.receiver.id()
    }

    #[must_use]
    pub(crate) fn receiver(&self) -> &Arc<ReceiverCore<P>> {
        &self.receiver
    }

    /// A new connection to the same receiver with the same callable, used when copying an emitter.
    #[must_use]
    pub(crate) fn clone_connection(&self) -> Self {
        Self::new(Arc::clone(&self.receiver), self.slot.clone_slot())
    }

    /// A new connection with the same callable bound to a copy of the receiver object.
    ///
    /// `target` must be the object that embeds `receiver`.
    #[must_use]
    pub(crate) fn rebind(
        &self,
        receiver: &Arc<ReceiverCore<P>>,
        target: &Arc<dyn Any + Send + Sync>,
    ) -> Self {
        Self::new(Arc::clone(receiver), self.slot.rebind(Arc::clone(target)))
    }

    #[must_use]
    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn mark_removed(&self) {
        self.active.store(false, Ordering::Release);
    }
}

impl<A, P> fmt::Debug for Connection<A, P>
where
    P: LockPolicy,
{
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("receiver", &self.receiver.id())
            .field("active", &self.active.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
