//! Thread safety integration tests for `signals`.
//!
//! These tests connect, emit, copy and tear down emitters and receiver objects from several
//! threads at once and verify that both sides of every connection stay consistent.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use signals::{Emitter, GlobalLock, HasReceiver, LockPolicy, PerObjectLock, Receiver};

const THREADS: usize = 4;

#[derive(Debug)]
struct Counter<P>
where
    P: LockPolicy,
{
    receiver: Receiver<P>,
    hits: AtomicUsize,
}

impl<P> Counter<P>
where
    P: LockPolicy,
{
    fn new() -> Arc<Self> {
        Arc::new(Self {
            receiver: Receiver::new(),
            hits: AtomicUsize::new(0),
        })
    }

    fn hit(&self, _value: u32) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }
}

impl<P> Clone for Counter<P>
where
    P: LockPolicy,
{
    fn clone(&self) -> Self {
        Self {
            receiver: self.receiver.clone(),
            hits: AtomicUsize::new(0),
        }
    }
}

impl<P> HasReceiver<P> for Counter<P>
where
    P: LockPolicy,
{
    fn receiver(&self) -> &Receiver<P> {
        &self.receiver
    }
}

fn emit_while_receivers_come_and_go<P>()
where
    P: LockPolicy,
{
    const ITERATIONS: usize = 500;

    let emitter = Emitter::<u32, P>::new();
    let permanent = Counter::<P>::new();
    emitter.connect(&permanent, Counter::hit);

    thread::scope(|s| {
        s.spawn(|| {
            for _ in 0..ITERATIONS {
                emitter.emit(1);
            }
        });

        for _ in 0..THREADS {
            s.spawn(|| {
                for _ in 0..ITERATIONS {
                    let transient = Counter::<P>::new();
                    emitter.connect(&transient, Counter::hit);
                }
            });
        }
    });

    assert_eq!(permanent.hits(), ITERATIONS);
    assert_eq!(emitter.connection_count(), 1);
    assert_eq!(permanent.receiver().emitter_count(), 1);
}

#[cfg_attr(miri, ignore)] // Too slow under Miri.
#[test]
fn emit_while_receivers_come_and_go_global_lock() {
    emit_while_receivers_come_and_go::<GlobalLock>();
}

#[cfg_attr(miri, ignore)] // Too slow under Miri.
#[test]
fn emit_while_receivers_come_and_go_per_object_lock() {
    emit_while_receivers_come_and_go::<PerObjectLock>();
}

fn emitters_come_and_go<P>()
where
    P: LockPolicy,
{
    const ITERATIONS: usize = 500;

    let receiver = Counter::<P>::new();

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                for _ in 0..ITERATIONS {
                    let emitter = Emitter::<u32, P>::new();
                    emitter.connect(&receiver, Counter::hit);
                    emitter.emit(1);

                    let copy = emitter.clone();
                    drop(emitter);
                    copy.emit(2);
                }
            });
        }
    });

    assert_eq!(receiver.hits(), THREADS * ITERATIONS * 2);
    assert_eq!(receiver.receiver().emitter_count(), 0);
}

#[cfg_attr(miri, ignore)] // Too slow under Miri.
#[test]
fn emitters_come_and_go_global_lock() {
    emitters_come_and_go::<GlobalLock>();
}

#[cfg_attr(miri, ignore)] // Too slow under Miri.
#[test]
fn emitters_come_and_go_per_object_lock() {
    emitters_come_and_go::<PerObjectLock>();
}

fn duplicate_while_emitting<P>()
where
    P: LockPolicy,
{
    const ITERATIONS: usize = 200;

    let emitter = Emitter::<u32, P>::new();
    let original = Counter::<P>::new();
    emitter.connect(&original, Counter::hit);

    thread::scope(|s| {
        s.spawn(|| {
            for _ in 0..ITERATIONS {
                emitter.emit(1);
            }
        });

        for _ in 0..THREADS {
            s.spawn(|| {
                for _ in 0..ITERATIONS {
                    let copy = original.duplicate();
                    assert!(emitter.is_connected_to(&*copy));
                    assert_eq!(copy.receiver().emitter_count(), 1);
                }
            });
        }
    });

    assert_eq!(original.hits(), ITERATIONS);
    assert_eq!(emitter.connection_count(), 1);
}

#[cfg_attr(miri, ignore)] // Too slow under Miri.
#[test]
fn duplicate_while_emitting_global_lock() {
    duplicate_while_emitting::<GlobalLock>();
}

#[cfg_attr(miri, ignore)] // Too slow under Miri.
#[test]
fn duplicate_while_emitting_per_object_lock() {
    duplicate_while_emitting::<PerObjectLock>();
}

#[cfg_attr(miri, ignore)] // Too slow under Miri.
#[test]
fn emitter_and_receiver_dropped_on_different_threads() {
    for _ in 0..500 {
        let emitter = Emitter::<u32, PerObjectLock>::new();
        let receiver = Counter::<PerObjectLock>::new();
        let other = Counter::<PerObjectLock>::new();
        emitter.connect(&receiver, Counter::hit);
        emitter.connect(&other, Counter::hit);

        thread::scope(|s| {
            s.spawn(move || drop(emitter));
            s.spawn(move || drop(receiver));
        });

        assert_eq!(other.receiver().emitter_count(), 0);
    }
}
