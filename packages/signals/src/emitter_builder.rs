use std::any::type_name;
use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;

use crate::{Emitter, EmitterCore, GlobalLock, LockPolicy};

/// Creates instances of [`Emitter`].
///
/// Obtained via [`Emitter::builder()`].
///
/// # Example
///
/// ```rust
/// use signals::Emitter;
///
/// let clicked = Emitter::<(i32, i32)>::builder().name("clicked").build();
///
/// assert_eq!(clicked.name(), Some("clicked"));
/// ```
pub struct EmitterBuilder<A, P = GlobalLock>
where
    A: Clone + 'static,
    P: LockPolicy,
{
    name: Option<Cow<'static, str>>,

    _types: PhantomData<fn(A) -> P>,
}

impl<A, P> EmitterBuilder<A, P>
where
    A: Clone + 'static,
    P: LockPolicy,
{
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            name: None,
            _types: PhantomData,
        }
    }

    /// Sets a name for the emitter.
    ///
    /// The name has no effect on behavior. It is included in log events emitted by this crate
    /// so that activity of individual emitters can be told apart.
    #[must_use]
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Creates an emitter with the configured settings and no connections.
    #[must_use]
    pub fn build(self) -> Emitter<A, P> {
        Emitter::from_core(EmitterCore::new(self.name))
    }
}

impl<A, P> fmt::Debug for EmitterBuilder<A, P>
where
    A: Clone + 'static,
    P: LockPolicy,
{
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
