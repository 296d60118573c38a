use std::any::{Any, type_name};
use std::borrow::Cow;
use std::fmt;
use std::mem;
use std::sync::{Arc, Weak};

use foldhash::{HashMap, HashMapExt};
use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::{
    Connection, EmitterBuilder, GlobalLock, HasReceiver, LockPolicy, MethodSlot, ObjectId,
    PolicyGuard, ReceiverCore, lock_pair,
};

/// Connections captured by one operation. Most emitters only have a handful.
type Snapshot<A, P> = SmallVec<[Arc<Connection<A, P>>; 8]>;

/// What a receiver needs from an emitter, with the argument type erased.
///
/// A receiver calls into this when it is being dropped or duplicated, to get the emitters on the
/// other end of its connections to update their connection lists.
pub(crate) trait EmitterLink<P>: Send + Sync
where
    P: LockPolicy,
{
    /// Removes every connection targeting `receiver`, which is tearing down or disconnecting
    /// everything.
    fn drop_connections_targeting(&self, receiver: &ReceiverCore<P>);

    /// For every connection targeting `original`, adds a connection with the same callable that
    /// targets `copy`. `target` is the object embedding `copy`.
    fn duplicate_connections(
        &self,
        original: &ReceiverCore<P>,
        copy: &Arc<ReceiverCore<P>>,
        target: &Arc<dyn Any + Send + Sync>,
    );
}

/// Broadcasts values of type `A` to every connected receiver object.
///
/// Receiver objects are types that embed a [`Receiver`][crate::Receiver] and implement
/// [`HasReceiver`]. Each [`connect()`][Self::connect] binds one receiver object to one callable;
/// [`emit()`][Self::emit] calls every bound callable in the order the connections were made.
///
/// To pass multiple values per event, use a tuple as `A`. The value is cloned for every
/// connection.
///
/// `A` must be `'static`, so borrowed payloads such as `&str` cannot be emitted. Pass owned
/// values instead, or share larger payloads via `Arc<T>`, which keeps the per-connection clone
/// cheap.
///
/// # Lifetime of connections
///
/// Either side of a connection can be dropped at any time:
///
/// * Dropping the emitter removes all its connections and tells each receiver to forget it.
/// * Dropping a receiver object removes every connection targeting it, from every emitter.
///
/// Cloning the emitter clones all its connections: the clone calls the same receivers with the
/// same callables. To clone a receiver object together with its connections, see
/// [`HasReceiver::duplicate()`].
///
/// # Callbacks
///
/// No lock is held while a callable runs. A callable may connect, disconnect, emit on this same
/// emitter or drop receiver objects. During one `emit()`:
///
/// * Connections removed before their turn are skipped.
/// * Connections added after the `emit()` started are not called until the next `emit()`.
///
/// If a callable panics, the panic propagates out of `emit()` and the remaining connections are
/// not called. The emitter remains fully usable.
///
/// # Thread safety
///
/// The lock policy `P` decides how the emitter synchronizes with the receivers it connects to.
/// See [`LockPolicy`] for the available policies. The default is [`GlobalLock`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
///
/// use parking_lot::Mutex;
/// use signals::{Emitter, HasReceiver, Receiver};
///
/// #[derive(Debug, Default)]
/// struct Log {
///     receiver: Receiver,
///     lines: Mutex<Vec<String>>,
/// }
///
/// impl HasReceiver for Log {
///     fn receiver(&self) -> &Receiver {
///         &self.receiver
///     }
/// }
///
/// impl Log {
///     fn on_moved(&self, (x, y): (i32, i32)) {
///         self.lines.lock().push(format!("moved to {x},{y}"));
///     }
/// }
///
/// let moved = Emitter::<(i32, i32)>::new();
/// let log = Arc::new(Log::default());
///
/// moved.connect(&log, Log::on_moved);
/// moved.emit((3, 4));
///
/// moved.disconnect(&*log);
/// moved.emit((5, 6));
///
/// assert_eq!(*log.lines.lock(), vec!["moved to 3,4".to_string()]);
/// ```
pub struct Emitter<A, P = GlobalLock>
where
    A: Clone + 'static,
    P: LockPolicy,
{
    core: Arc<EmitterCore<A, P>>,
}

impl<A, P> Emitter<A, P>
where
    A: Clone + 'static,
    P: LockPolicy,
{
    /// Creates an emitter with no connections.
    ///
    /// Use [`Emitter::builder()`] to customize the emitter.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a builder for configuring an emitter.
    #[must_use]
    #[cfg_attr(test, mutants::skip)] // Gets replaced with itself by different name, bad mutation.
    pub fn builder() -> EmitterBuilder<A, P> {
        EmitterBuilder::new()
    }

    #[must_use]
    pub(crate) fn from_core(core: Arc<EmitterCore<A, P>>) -> Self {
        Self { core }
    }

    /// The name given to the emitter via [`EmitterBuilder::name()`], if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.core.name.as_deref()
    }

    /// Connects `slot` to this emitter, to be called with `receiver` on every [`emit()`][1].
    ///
    /// `slot` is typically a method of the receiver type, such as `Gauge::update`, but any
    /// function or closure taking the receiver by shared reference will do.
    ///
    /// The new connection is added after all existing ones. Connecting the same receiver more
    /// than once creates independent connections, all of which are called and each of which has
    /// to be removed separately.
    ///
    /// [1]: Self::emit
    pub fn connect<T, F>(&self, receiver: &Arc<T>, slot: F)
    where
        T: HasReceiver<P> + Send + Sync + 'static,
        F: Fn(&T, A) + Send + Sync + 'static,
    {
        let connection = Connection::new(
            Arc::clone(receiver.receiver().core()),
            Box::new(MethodSlot::new(receiver, slot)),
        );

        self.core.connect(connection);
    }

    /// Calls every connected slot with a clone of `args`, in the order they were connected.
    pub fn emit(&self, args: A) {
        self.core.emit(args);
    }

    /// Returns a function that calls [`emit()`][Self::emit] on this emitter.
    ///
    /// Useful for passing the emitter where a callback is expected.
    ///
    /// # Example
    ///
    /// ```rust
    /// use signals::Emitter;
    ///
    /// let progress = Emitter::<u8>::new();
    ///
    /// [10, 50, 100].into_iter().for_each(progress.as_fn());
    /// ```
    pub fn as_fn(&self) -> impl Fn(A) + '_ {
        move |args| self.emit(args)
    }

    /// Removes the first connection to `receiver`, in connection order.
    ///
    /// If `receiver` is connected more than once, only one connection is removed per call.
    /// Does nothing if `receiver` is not connected to this emitter.
    pub fn disconnect<T>(&self, receiver: &T)
    where
        T: HasReceiver<P> + ?Sized,
    {
        self.core.disconnect(receiver.receiver().core());
    }

    /// Removes every connection of this emitter.
    pub fn disconnect_all(&self) {
        self.core.disconnect_all();
    }

    /// Number of connections, counting repeated connections to the same receiver separately.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.core.connection_count()
    }

    /// Whether the emitter has no connections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connection_count() == 0
    }

    /// Whether the emitter holds at least one connection to `receiver`.
    #[must_use]
    pub fn is_connected_to<T>(&self, receiver: &T) -> bool
    where
        T: HasReceiver<P> + ?Sized,
    {
        self.core.is_connected_to(receiver.receiver().core().id())
    }
}

impl<A, P> Default for Emitter<A, P>
where
    A: Clone + 'static,
    P: LockPolicy,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A, P> Clone for Emitter<A, P>
where
    A: Clone + 'static,
    P: LockPolicy,
{
    /// Returns a new emitter connected to the same receivers with the same callables.
    fn clone(&self) -> Self {
        let core = EmitterCore::new(self.core.name.clone());
        core.copy_connections_from(&self.core);

        Self::from_core(core)
    }
}

impl<A, P> Drop for Emitter<A, P>
where
    A: Clone + 'static,
    P: LockPolicy,
{
    fn drop(&mut self) {
        self.core.close();
        self.core.disconnect_all();
    }
}

impl<A, P> fmt::Debug for Emitter<A, P>
where
    A: Clone + 'static,
    P: LockPolicy,
{
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("id", &self.core.id)
            .field("name", &self.core.name)
            .field("connections", &self.core.connection_count())
            .finish_non_exhaustive()
    }
}

struct EmitterState<A, P>
where
    P: LockPolicy,
{
    /// In the order the connections were made.
    connections: Vec<Arc<Connection<A, P>>>,

    /// Set when the emitter starts tearing down. No connection may be added after that.
    closed: bool,
}

impl<A, P> EmitterState<A, P>
where
    A: 'static,
    P: LockPolicy,
{
    /// Removes and returns every connection targeting `receiver`, keeping the order of the rest.
    fn take_targeting(&mut self, receiver: ObjectId) -> Vec<Arc<Connection<A, P>>> {
        let (removed, kept): (Vec<_>, Vec<_>) = mem::take(&mut self.connections)
            .into_iter()
            .partition(|c| c.target_id() == receiver);

        self.connections = kept;

        for connection in &removed {
            connection.mark_removed();
        }

        removed
    }

    fn is_connected_to(&self, receiver: ObjectId) -> bool {
        self.connections.iter().any(|c| c.target_id() == receiver)
    }
}

/// Shared state of an [`Emitter`], reachable from receivers via [`EmitterLink`].
///
/// Every change to the connection list that concerns a single receiver happens while the policy
/// locks of both this emitter and that receiver are held, and updates the receiver's emitter set
/// before the locks are released. Removing every connection at once only needs our own lock; each
/// affected receiver is then updated under the pair of locks. Connections taken out of the list are only dropped after the locks are released,
/// because dropping a callable may run arbitrary code, including code that drops other
/// receivers or emitters.
pub(crate) struct EmitterCore<A, P>
where
    P: LockPolicy,
{
    id: ObjectId,
    name: Option<Cow<'static, str>>,
    lock: P::Lock,
    this: Weak<Self>,
    state: Mutex<EmitterState<A, P>>,
}

impl<A, P> EmitterCore<A, P>
where
    A: Clone + 'static,
    P: LockPolicy,
{
    #[must_use]
    pub(crate) fn new(name: Option<Cow<'static, str>>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            id: ObjectId::next(),
            name,
            lock: P::Lock::default(),
            this: Weak::clone(this),
            state: Mutex::new(EmitterState {
                connections: Vec::new(),
                closed: false,
            }),
        })
    }

    fn link(&self) -> Weak<dyn EmitterLink<P>> {
        Weak::<Self>::clone(&self.this)
    }

    // The guards must be bound to a named variable by the caller. Binding them to `_` would
    // release the locks immediately.
    fn lock_with<'a>(
        &'a self,
        receiver: &'a ReceiverCore<P>,
    ) -> (PolicyGuard<'a>, PolicyGuard<'a>) {
        lock_pair::<P>((self.id, &self.lock), (receiver.id(), receiver.lock()))
    }

    fn snapshot(&self) -> Snapshot<A, P> {
        let _guard = P::acquire(&self.lock);
        self.state.lock().connections.iter().map(Arc::clone).collect()
    }

    fn connect(&self, connection: Connection<A, P>) {
        let receiver = Arc::clone(connection.receiver());

        let _guards = self.lock_with(&receiver);

        self.state.lock().connections.push(Arc::new(connection));

        // A receiver only closes when the object embedding it is dropped, which cannot happen
        // while the caller of `connect()` holds an `Arc` to that object.
        let registered = receiver.register_emitter(self.id, self.link());
        debug_assert!(registered, "connected to a receiver that is tearing down");

        trace!(
            emitter = self.id.get(),
            name = self.name.as_deref(),
            receiver = receiver.id().get(),
            "connected"
        );
    }

    fn emit(&self, args: A) {
        // The lock only covers taking the snapshot. Callables run without any lock held, so
        // they are free to call back into this emitter.
        let snapshot = self.snapshot();

        trace!(
            emitter = self.id.get(),
            name = self.name.as_deref(),
            connections = snapshot.len(),
            "emitting"
        );

        for connection in &snapshot {
            connection.invoke(args.clone());
        }
    }

    fn disconnect(&self, receiver: &ReceiverCore<P>) {
        let removed = {
            let _guards = self.lock_with(receiver);
            let mut state = self.state.lock();

            let Some(index) = state
                .connections
                .iter()
                .position(|c| c.target_id() == receiver.id())
            else {
                return;
            };

            let removed = state.connections.remove(index);
            removed.mark_removed();

            // With repeated connections, we stay in the receiver's set until the last one goes.
            let still_connected = state.is_connected_to(receiver.id());
            drop(state);

            if !still_connected {
                receiver.unregister_emitter(self.id);
            }

            removed
        };

        trace!(
            emitter = self.id.get(),
            name = self.name.as_deref(),
            receiver = receiver.id().get(),
            "disconnected"
        );

        drop(removed);
    }

    fn disconnect_all(&self) {
        // Everything is taken out in one pass. The receivers are told afterwards, one pair of
        // locks at a time.
        let (removed, receivers) = {
            let _guard = P::acquire(&self.lock);
            let removed = mem::take(&mut self.state.lock().connections);

            let mut receivers: HashMap<ObjectId, Arc<ReceiverCore<P>>> = HashMap::new();

            for connection in &removed {
                connection.mark_removed();
                receivers
                    .entry(connection.target_id())
                    .or_insert_with(|| Arc::clone(connection.receiver()));
            }

            (removed, receivers)
        };

        if removed.is_empty() {
            return;
        }

        debug!(
            emitter = self.id.get(),
            name = self.name.as_deref(),
            connections = removed.len(),
            receivers = receivers.len(),
            "disconnecting all receivers"
        );

        for receiver in receivers.into_values() {
            let _guards = self.lock_with(&receiver);

            // Connected again since we emptied the list, so we still belong in its set.
            if !self.state.lock().is_connected_to(receiver.id()) {
                receiver.unregister_emitter(self.id);
            }
        }

        drop(removed);
    }

    fn close(&self) {
        let _guard = P::acquire(&self.lock);
        self.state.lock().closed = true;
    }

    fn connection_count(&self) -> usize {
        let _guard = P::acquire(&self.lock);
        self.state.lock().connections.len()
    }

    fn is_connected_to(&self, receiver: ObjectId) -> bool {
        let _guard = P::acquire(&self.lock);
        self.state.lock().is_connected_to(receiver)
    }

    /// Adds a clone of every connection of `source` to `self`, which is a fresh emitter.
    fn copy_connections_from(&self, source: &Self) {
        let snapshot = source.snapshot();

        for connection in &snapshot {
            let receiver = connection.receiver();
            let _guards = self.lock_with(receiver);

            // Removed from the source after we took the snapshot.
            if !connection.is_active() {
                continue;
            }

            // A closed receiver is tearing down and is about to be removed from the source too.
            if receiver.register_emitter(self.id, self.link()) {
                self.state
                    .lock()
                    .connections
                    .push(Arc::new(connection.clone_connection()));
            }
        }

        debug!(
            emitter = self.id.get(),
            source = source.id.get(),
            name = self.name.as_deref(),
            connections = snapshot.len(),
            "copied emitter"
        );
    }
}

impl<A, P> EmitterLink<P> for EmitterCore<A, P>
where
    A: Clone + 'static,
    P: LockPolicy,
{
    fn drop_connections_targeting(&self, receiver: &ReceiverCore<P>) {
        let removed = {
            let _guards = self.lock_with(receiver);
            let removed = self.state.lock().take_targeting(receiver.id());

            // The receiver walks a snapshot of its emitter set, so leaving the set is safe here.
            receiver.unregister_emitter(self.id);

            removed
        };

        debug!(
            emitter = self.id.get(),
            name = self.name.as_deref(),
            receiver = receiver.id().get(),
            connections = removed.len(),
            "dropped connections to receiver"
        );

        drop(removed);
    }

    fn duplicate_connections(
        &self,
        original: &ReceiverCore<P>,
        copy: &Arc<ReceiverCore<P>>,
        target: &Arc<dyn Any + Send + Sync>,
    ) {
        let _guards = self.lock_with(copy);

        let rebound: Snapshot<A, P> = {
            let state = self.state.lock();

            if state.closed {
                return;
            }

            state
                .connections
                .iter()
                .filter(|c| c.target_id() == original.id())
                .map(|c| Arc::new(c.rebind(copy, target)))
                .collect()
        };

        if rebound.is_empty() || !copy.register_emitter(self.id, self.link()) {
            return;
        }

        trace!(
            emitter = self.id.get(),
            name = self.name.as_deref(),
            receiver = copy.id().get(),
            connections = rebound.len(),
            "duplicated connections"
        );

        self.state.lock().connections.extend(rebound);
    }
}

impl<A, P> fmt::Debug for EmitterCore<A, P>
where
    P: LockPolicy,
{
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();

        f.debug_struct(type_name::<Self>())
            .field("id", &self.id)
            .field("name", &self.name)
            .field("connections", &state.connections)
            .field("closed", &state.closed)
            .finish_non_exhaustive()
    }
}
