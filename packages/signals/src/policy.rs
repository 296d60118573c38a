//! Locking policies that decide how emitters and receivers synchronize their bookkeeping.

use std::fmt::Debug;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard, const_reentrant_mutex};

use crate::{ObjectId, Sealed};

/// Guard returned by [`LockPolicy::acquire()`]. Empty if the policy does not lock.
pub type PolicyGuard<'a> = Option<ReentrantMutexGuard<'a, ()>>;

static GLOBAL_LOCK: ReentrantMutex<()> = const_reentrant_mutex(());

/// Decides how an [`Emitter`][crate::Emitter] and the [`Receiver`][crate::Receiver]s it is
/// connected to synchronize their two-sided bookkeeping.
///
/// Every connect, disconnect, copy and teardown touches both the emitter's connection list and
/// the receiver's set of emitters. The policy determines which lock is held while both sides are
/// updated:
///
/// * [`Unsynchronized`] - no lock. The caller guarantees that a connected graph of emitters and
///   receivers is only ever used from one logical thread at a time.
/// * [`GlobalLock`] - one lock shared by every emitter and receiver in the process. This is the
///   default.
/// * [`PerObjectLock`] - every emitter and receiver owns its own lock. Operations touching two
///   objects acquire both locks in a fixed, process-wide order.
///
/// All locks are reentrant, so a callback may connect or disconnect on the emitter that is
/// currently dispatching to it. No lock is ever held while a callback is running.
///
/// This trait is sealed and cannot be implemented outside this crate.
#[expect(private_bounds, reason = "intentional - sealed trait")]
pub trait LockPolicy: Sealed + Debug + Send + Sync + 'static {
    /// Lock embedded in every emitter and receiver using this policy.
    #[doc(hidden)]
    type Lock: Debug + Default + Send + Sync;

    /// Acquires the policy lock for the object owning `lock`.
    #[doc(hidden)]
    fn acquire(lock: &Self::Lock) -> PolicyGuard<'_>;
}

/// Performs no locking. See [`LockPolicy`].
///
/// Memory safety is unaffected by this policy; what is lost is the atomicity of updates that
/// span an emitter and a receiver. Use this when all emitters and receivers that are connected to
/// each other live on a single thread.
#[derive(Debug)]
#[non_exhaustive]
pub struct Unsynchronized;

impl Sealed for Unsynchronized {}

impl LockPolicy for Unsynchronized {
    type Lock = ();

    #[inline]
    fn acquire(_lock: &()) -> PolicyGuard<'_> {
        None
    }
}

/// Serializes all emitters and receivers in the process on one lock. See [`LockPolicy`].
///
/// This uses the least resources but every emitter and receiver contends on the same lock.
#[derive(Debug)]
#[non_exhaustive]
pub struct GlobalLock;

impl Sealed for GlobalLock {}

impl LockPolicy for GlobalLock {
    type Lock = ();

    #[inline]
    fn acquire(_lock: &()) -> PolicyGuard<'_> {
        Some(GLOBAL_LOCK.lock())
    }
}

/// Gives every emitter and receiver its own lock. See [`LockPolicy`].
///
/// Contention only happens between objects that are actually connected to each other, at the
/// cost of one lock per object.
#[derive(Debug)]
#[non_exhaustive]
pub struct PerObjectLock;

impl Sealed for PerObjectLock {}

impl LockPolicy for PerObjectLock {
    type Lock = ReentrantMutex<()>;

    #[inline]
    fn acquire(lock: &Self::Lock) -> PolicyGuard<'_> {
        Some(lock.lock())
    }
}

/// Acquires the policy locks of two objects in ascending identity order.
///
/// Every operation that touches two objects goes through here, which is what keeps two threads
/// working on the same pair from deadlocking on each other.
pub(crate) fn lock_pair<'a, P>(
    first: (ObjectId, &'a P::Lock),
    second: (ObjectId, &'a P::Lock),
) -> (PolicyGuard<'a>, PolicyGuard<'a>)
where
    P: LockPolicy,
{
    let (low, high) = if first.0 <= second.0 {
        (first, second)
    } else {
        (second, first)
    };

    let low_guard = P::acquire(low.1);
    let high_guard = P::acquire(high.1);

    (low_guard, high_guard)
}
