//! Units of work run by effects.
//!
//! An effect stores its work as a `dyn Runnable` so the runtime can invoke
//! it uniformly, whatever closure or type the caller supplied.

use std::marker::PhantomData;

use crate::error::BoxError;

/// A re-runnable unit of work.
///
/// Implement this directly for types that carry their own state; plain
/// closures are adapted by [`Effect::new`](super::Effect::new) and
/// [`Effect::try_new`](super::Effect::try_new).
pub trait Runnable: Send + Sync + 'static {
    fn run(&self) -> Result<(), BoxError>;
}

/// Adapter for closures that cannot fail.
pub(crate) struct Infallible<F>(pub(crate) F);

impl<F> Runnable for Infallible<F>
where
    F: Fn() + Send + Sync + 'static,
{
    fn run(&self) -> Result<(), BoxError> {
        (self.0)();
        Ok(())
    }
}

/// Adapter for closures returning their own error type.
pub(crate) struct Fallible<F, E> {
    work: F,
    _error: PhantomData<fn() -> E>,
}

impl<F, E> Fallible<F, E> {
    pub(crate) fn new(work: F) -> Self {
        Self {
            work,
            _error: PhantomData,
        }
    }
}

impl<F, E> Runnable for Fallible<F, E>
where
    F: Fn() -> Result<(), E> + Send + Sync + 'static,
    E: Into<BoxError> + 'static,
{
    fn run(&self) -> Result<(), BoxError> {
        (self.work)().map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn infallible_closure_always_succeeds() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let work = Infallible(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(work.run().is_ok());
        assert!(work.run().is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn fallible_closure_boxes_its_error() {
        let work = Fallible::new(|| Err::<(), _>(std::fmt::Error));

        let err = work.run().unwrap_err();
        assert!(err.downcast_ref::<std::fmt::Error>().is_some());
    }

    #[test]
    fn custom_runnable() {
        struct Counter(AtomicUsize);

        impl Runnable for Counter {
            fn run(&self) -> Result<(), BoxError> {
                if self.0.fetch_add(1, Ordering::SeqCst) >= 1 {
                    return Err("ran twice".into());
                }
                Ok(())
            }
        }

        let counter = Counter(AtomicUsize::new(0));
        assert!(counter.run().is_ok());
        assert_eq!(counter.run().unwrap_err().to_string(), "ran twice");
    }
}
