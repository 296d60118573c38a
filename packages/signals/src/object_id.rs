use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an emitter or receiver.
///
/// Emitters and receivers draw from the same sequence, so identities are totally ordered across
/// both kinds of object. Locks of two objects are always acquired in ascending identity order.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub(crate) struct ObjectId(u64);

impl ObjectId {
    #[must_use]
    pub(crate) fn next() -> Self {
        // We only need uniqueness, not ordering relative to other memory operations.
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub(crate) const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    #[cfg_attr(test, mutants::skip)] // No API contract for display format.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
