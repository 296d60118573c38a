//! Shared fixtures for the unit tests of this crate.

use std::env;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::{GlobalLock, HasReceiver, LockPolicy, Receiver};

/// Calls observed across all recorders of one test, in the order they happened.
pub(crate) type Journal = Arc<Mutex<Vec<(&'static str, i32)>>>;

pub(crate) fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

/// A receiver object that writes every call it receives into a shared journal.
#[derive(Debug)]
pub(crate) struct Recorder<P = GlobalLock>
where
    P: LockPolicy,
{
    receiver: Receiver<P>,
    name: &'static str,
    journal: Journal,
    calls: AtomicUsize,
}

impl<P> Recorder<P>
where
    P: LockPolicy,
{
    pub(crate) fn new(name: &'static str, journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            receiver: Receiver::new(),
            name,
            journal: Arc::clone(journal),
            calls: AtomicUsize::new(0),
        })
    }

    pub(crate) fn record(&self, value: i32) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.journal.lock().push((self.name, value));
    }

    /// Calls received by this instance only.
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl<P> Clone for Recorder<P>
where
    P: LockPolicy,
{
    fn clone(&self) -> Self {
        Self {
            receiver: self.receiver.clone(),
            name: self.name,
            journal: Arc::clone(&self.journal),
            calls: AtomicUsize::new(0),
        }
    }
}

impl<P> HasReceiver<P> for Recorder<P>
where
    P: LockPolicy,
{
    fn receiver(&self) -> &Receiver<P> {
        &self.receiver
    }
}

/// Runs `test_fn` on a separate thread and fails the test if it does not finish in 10 seconds
/// (60 under Miri).
///
/// Used by tests that would otherwise hang forever on a lock ordering bug.
///
/// Under mutation testing (`MUTATION_TESTING=1`) the test runs directly on the calling thread
/// without a timeout, so that a mutant which hangs is reported as such by the mutation runner.
pub(crate) fn with_watchdog<F, R>(test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if mutation_testing() {
        return test_fn();
    }

    let (tx, rx) = mpsc::channel();

    let handle = thread::spawn(move || {
        // If this fails, the watchdog has already given up on us.
        drop(tx.send(test_fn()));
    });

    // Thread synchronization is much slower under Miri.
    let timeout = if cfg!(miri) {
        Duration::from_secs(60)
    } else {
        Duration::from_secs(10)
    };

    match rx.recv_timeout(timeout) {
        Ok(result) => {
            handle.join().expect("test thread should not panic after completing");
            result
        }
        Err(mpsc::RecvTimeoutError::Timeout) => panic!("test exceeded {timeout:?} timeout"),
        Err(mpsc::RecvTimeoutError::Disconnected) => match handle.join() {
            Ok(()) => panic!("test thread disconnected unexpectedly"),
            Err(e) => std::panic::resume_unwind(e),
        },
    }
}

fn mutation_testing() -> bool {
    env::var("MUTATION_TESTING").as_deref() == Ok("1")
}

#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn watchdog_returns_result() {
        assert_eq!(with_watchdog(|| 42), 42);
    }

    #[test]
    #[should_panic]
    fn watchdog_propagates_panic() {
        with_watchdog(|| panic!("inner failure"));
    }

    #[test]
    fn mutation_testing_detected_only_for_exact_value() {
        // Whatever the environment of this test run, the detection must agree with it.
        let expected = env::var("MUTATION_TESTING").is_ok_and(|v| v == "1");

        assert_eq!(mutation_testing(), expected);
    }
}
