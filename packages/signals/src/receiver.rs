use std::any::{Any, type_name};
use std::fmt;
use std::sync::{Arc, Weak};

use foldhash::{HashMap, HashMapExt};
use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::debug;

use crate::{EmitterLink, GlobalLock, LockPolicy, ObjectId};

/// Implemented by types that can be the target of [`Emitter`][crate::Emitter] connections.
///
/// The implementing type embeds a [`Receiver`] and exposes it via [`receiver()`][Self::receiver].
/// The receiver keeps track of every emitter that holds a connection to the object and removes
/// those connections when the object is dropped.
///
/// Receiver objects are connected via `Arc<T>`. Emitters only hold weak references to them, so a
/// connection never keeps its receiver object alive.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicI32, Ordering};
///
/// use signals::{Emitter, HasReceiver, Receiver};
///
/// #[derive(Debug, Default)]
/// struct Gauge {
///     receiver: Receiver,
///     value: AtomicI32,
/// }
///
/// impl HasReceiver for Gauge {
///     fn receiver(&self) -> &Receiver {
///         &self.receiver
///     }
/// }
///
/// impl Gauge {
///     fn update(&self, value: i32) {
///         self.value.store(value, Ordering::Relaxed);
///     }
/// }
///
/// let changed = Emitter::<i32>::new();
/// let gauge = Arc::new(Gauge::default());
///
/// changed.connect(&gauge, Gauge::update);
/// changed.emit(42);
/// assert_eq!(gauge.value.load(Ordering::Relaxed), 42);
///
/// // Dropping the receiver object removes its connections.
/// drop(gauge);
/// assert!(changed.is_empty());
/// ```
pub trait HasReceiver<P = GlobalLock>
where
    P: LockPolicy,
{
    /// Returns the receiver embedded in this object.
    ///
    /// Must return the same receiver every time it is called on the same object.
    fn receiver(&self) -> &Receiver<P>;

    /// Clones the object, connecting the clone to every emitter the original is connected to.
    ///
    /// For every connection from an emitter to `self`, that emitter gains a new connection to the
    /// clone, with the same callable. The clone is then disconnected independently of the
    /// original.
    ///
    /// A plain [`Clone::clone()`] of the object produces a clone that is not connected to anything
    /// because the [`Receiver`] inside it cannot know where the new object will live.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    ///
    /// use signals::{Emitter, HasReceiver, Receiver};
    ///
    /// #[derive(Debug, Default)]
    /// struct Counter {
    ///     receiver: Receiver,
    ///     hits: AtomicUsize,
    /// }
    ///
    /// impl Clone for Counter {
    ///     fn clone(&self) -> Self {
    ///         Self {
    ///             receiver: self.receiver.clone(),
    ///             hits: AtomicUsize::new(0),
    ///         }
    ///     }
    /// }
    ///
    /// impl HasReceiver for Counter {
    ///     fn receiver(&self) -> &Receiver {
    ///         &self.receiver
    ///     }
    /// }
    ///
    /// let ping = Emitter::<()>::new();
    /// let original = Arc::new(Counter::default());
    /// ping.connect(&original, |c: &Counter, ()| {
    ///     c.hits.fetch_add(1, Ordering::Relaxed);
    /// });
    ///
    /// let copy = original.duplicate();
    /// ping.emit(());
    ///
    /// assert_eq!(original.hits.load(Ordering::Relaxed), 1);
    /// assert_eq!(copy.hits.load(Ordering::Relaxed), 1);
    /// ```
    #[must_use]
    fn duplicate(self: &Arc<Self>) -> Arc<Self>
    where
        Self: Clone + Send + Sync + Sized + 'static,
    {
        let copy = Arc::new((**self).clone());
        let target: Arc<dyn Any + Send + Sync> = Arc::<Self>::clone(&copy);

        self.receiver()
            .core()
            .duplicate_into(copy.receiver().core(), &target);

        copy
    }
}

/// Lets the embedding type be the target of [`Emitter`][crate::Emitter] connections.
///
/// Embed a `Receiver` in a type and implement [`HasReceiver`] to make the type connectable.
/// When the receiver is dropped, every connection targeting it is removed from every emitter.
///
/// The lock policy `P` must match the policy of the emitters the object connects to.
///
/// # Cloning
///
/// Cloning a `Receiver` produces a new receiver that is not connected to anything. To clone a
/// receiver object together with its connections, use [`HasReceiver::duplicate()`].
pub struct Receiver<P = GlobalLock>
where
    P: LockPolicy,
{
    core: Arc<ReceiverCore<P>>,
}

impl<P> Receiver<P>
where
    P: LockPolicy,
{
    /// Creates a receiver that is not connected to any emitter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            core: ReceiverCore::new(),
        }
    }

    /// Removes every connection targeting this receiver, from every emitter.
    ///
    /// The receiver remains usable and can be connected again.
    pub fn disconnect_all(&self) {
        self.core.disconnect_all();
    }

    /// Number of distinct emitters that hold at least one connection to this receiver.
    #[must_use]
    pub fn emitter_count(&self) -> usize {
        self.core.emitter_count()
    }

    pub(crate) fn core(&self) -> &Arc<ReceiverCore<P>> {
        &self.core
    }
}

impl<P> Default for Receiver<P>
where
    P: LockPolicy,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Clone for Receiver<P>
where
    P: LockPolicy,
{
    /// Returns a new receiver that is not connected to anything.
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<P> Drop for Receiver<P>
where
    P: LockPolicy,
{
    fn drop(&mut self) {
        self.core.close();
        self.core.disconnect_all();
    }
}

impl<P> fmt::Debug for Receiver<P>
where
    P: LockPolicy,
{
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("core", &self.core)
            .finish()
    }
}

type EmitterLinks<P> = SmallVec<[(ObjectId, Weak<dyn EmitterLink<P>>); 4]>;

struct ReceiverState<P>
where
    P: LockPolicy,
{
    /// Every emitter holding at least one connection to us, once regardless of how many.
    emitters: HashMap<ObjectId, Weak<dyn EmitterLink<P>>>,

    /// Set when the receiver starts tearing down. No emitter may register after that.
    closed: bool,
}

/// Bookkeeping half of a [`Receiver`], shared with the connections that target it.
///
/// The emitter set is only ever changed through the connect/disconnect/notify protocol driven by
/// the emitters, while the policy locks of both the emitter and this receiver are held.
pub(crate) struct ReceiverCore<P>
where
    P: LockPolicy,
{
    id: ObjectId,
    lock: P::Lock,
    state: Mutex<ReceiverState<P>>,
}

impl<P> ReceiverCore<P>
where
    P: LockPolicy,
{
    #[must_use]
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            id: ObjectId::next(),
            lock: P::Lock::default(),
            state: Mutex::new(ReceiverState {
                emitters: HashMap::new(),
                closed: false,
            }),
        })
    }

    #[must_use]
    pub(crate) fn id(&self) -> ObjectId {
        self.id
    }

    #[must_use]
    pub(crate) fn lock(&self) -> &P::Lock {
        &self.lock
    }

    /// Records that `emitter` holds a connection to us.
    ///
    /// Returns `false` if we are tearing down, in which case the caller must not keep the
    /// connection it was about to add.
    #[must_use]
    pub(crate) fn register_emitter(
        &self,
        emitter: ObjectId,
        link: Weak<dyn EmitterLink<P>>,
    ) -> bool {
        let mut state = self.state.lock();

        if state.closed {
            return false;
        }

        state.emitters.entry(emitter).or_insert(link);
        true
    }

    pub(crate) fn unregister_emitter(&self, emitter: ObjectId) {
        self.state.lock().emitters.remove(&emitter);
    }

    #[must_use]
    pub(crate) fn emitter_count(&self) -> usize {
        let _guard = P::acquire(&self.lock);
        self.state.lock().emitters.len()
    }

    fn emitters(&self) -> EmitterLinks<P> {
        let _guard = P::acquire(&self.lock);
        self.state
            .lock()
            .emitters
            .iter()
            .map(|(id, link)| (*id, Weak::clone(link)))
            .collect()
    }

    fn close(&self) {
        let _guard = P::acquire(&self.lock);
        self.state.lock().closed = true;
    }

    /// Asks every emitter connected to us to drop its connections to us.
    ///
    /// We iterate over a snapshot because each emitter removes itself from our set as it goes.
    pub(crate) fn disconnect_all(&self) {
        let emitters = self.emitters();

        if emitters.is_empty() {
            return;
        }

        debug!(
            receiver = self.id.get(),
            emitters = emitters.len(),
            "disconnecting receiver from all emitters"
        );

        for (emitter_id, link) in emitters {
            if let Some(emitter) = link.upgrade() {
                emitter.drop_connections_targeting(self);
            } else {
                // The emitter is gone without having told us. Nothing is left to disconnect.
                let _guard = P::acquire(&self.lock);
                self.unregister_emitter(emitter_id);
            }
        }
    }

    /// Asks every emitter connected to us to also connect to `copy`, which embeds a copy of us.
    ///
    /// `target` is the object that owns `copy`.
    pub(crate) fn duplicate_into(&self, copy: &Arc<Self>, target: &Arc<dyn Any + Send + Sync>) {
        let emitters = self.emitters();

        debug!(
            receiver = self.id.get(),
            copy = copy.id.get(),
            emitters = emitters.len(),
            "duplicating receiver connections"
        );

        for (_, link) in emitters {
            if let Some(emitter) = link.upgrade() {
                emitter.duplicate_connections(self, copy, target);
            }
        }
    }
}

impl<P> fmt::Debug for ReceiverCore<P>
where
    P: LockPolicy,
{
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();

        f.debug_struct(type_name::<Self>())
            .field("id", &self.id)
            .field("emitters", &state.emitters.len())
            .field("closed", &state.closed)
            .finish_non_exhaustive()
    }
}
