//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its work immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the effect re-runs synchronously, inside
//!    the write that changed it.
//!
//! 3. Before re-running, the effect tears down its old dependencies and
//!    tracks new ones during execution, so branches not taken on a run stop
//!    triggering it.
//!
//! # Failures
//!
//! Work may fail. The error is returned to whoever caused the run (the
//! constructor, [`Effect::run`], or the `set` that triggered it) after the
//! tracking context has been restored. A failed effect stays subscribed to
//! whatever it read before failing and runs again on the next change.
//!
//! # Lifetime
//!
//! Signals never own the effects that read them. An effect lives as long as
//! one of its handles does: dropping the last handle, or calling
//! [`Effect::dispose`], removes it from the graph for good.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use tracing::{debug, trace};

use super::runnable::{Fallible, Infallible, Runnable};
use super::runtime::{Reactive, ReactiveHandle, Runtime};
use crate::error::{BoxError, ReactiveError, Result};
use crate::graph::{NodeId, NodeKind};

struct EffectInner {
    id: NodeId,
    work: Box<dyn Runnable>,
    disposed: AtomicBool,
    run_count: AtomicUsize,
}

impl EffectInner {
    fn is_live(&self) -> bool {
        !self.disposed.load(Ordering::SeqCst) && Runtime::contains(self.id)
    }

    fn run(&self) -> Result<()> {
        let _pass = Runtime::lock_propagation();

        if !self.is_live() {
            return Err(ReactiveError::Disposed { node: self.id });
        }

        let result = Runtime::run_tracked(self.id, NodeKind::Effect, || self.work.run())?;
        let runs = self.run_count.fetch_add(1, Ordering::SeqCst) + 1;

        result.map_err(|source| {
            let err = ReactiveError::from_work(self.id, source);
            debug!(effect = %self.id, runs, error = %err, "effect failed");
            err
        })
    }
}

impl Reactive for EffectInner {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn update(&self) -> Result<()> {
        if !self.is_live() {
            return Ok(());
        }

        if !Runtime::needs_update(self.id)? {
            trace!(effect = %self.id, "effect skipped, already up to date");
            return Ok(());
        }

        self.run()
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use ripple_core::reactive::{Effect, Signal};
///
/// let count = Signal::new(0);
/// let log = Arc::new(Mutex::new(Vec::new()));
///
/// let (c, l) = (count.clone(), log.clone());
/// let _effect = Effect::new(move || {
///     l.lock().unwrap().push(format!("Count is now {}", c.get()));
/// })
/// .unwrap();
///
/// count.set(5).unwrap();
/// assert_eq!(log.lock().unwrap().last().unwrap(), "Count is now 5");
/// ```
pub struct Effect {
    inner: Arc<EffectInner>,
    _handle: Arc<ReactiveHandle>,
}

impl Effect {
    /// Create a new effect and run it once.
    ///
    /// If the first run fails the error is returned and the effect is
    /// dropped. Use [`Effect::new_lazy`] and [`Effect::run`] to keep an
    /// effect whose first run may fail.
    pub fn new<F>(work: F) -> Result<Self>
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::from_runnable(Infallible(work))
    }

    /// Create a new effect from fallible work and run it once.
    ///
    /// ```rust
    /// use ripple_core::reactive::{Effect, Signal};
    ///
    /// let input = Signal::new(1);
    /// let output = Signal::new(0);
    ///
    /// let (i, o) = (input.clone(), output.clone());
    /// let _sync = Effect::try_new(move || o.set(i.get() * 2)).unwrap();
    ///
    /// input.set(21).unwrap();
    /// assert_eq!(output.get(), 42);
    /// ```
    pub fn try_new<F, E>(work: F) -> Result<Self>
    where
        F: Fn() -> std::result::Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError> + 'static,
    {
        Self::from_runnable(Fallible::new(work))
    }

    /// Create a new effect from any [`Runnable`] and run it once.
    pub fn from_runnable<R: Runnable>(work: R) -> Result<Self> {
        let effect = Self::lazy(Box::new(work));
        effect.run()?;
        Ok(effect)
    }

    /// Create a new effect without running it.
    ///
    /// It has no dependencies, so nothing triggers it until [`Effect::run`]
    /// is called.
    pub fn new_lazy<F>(work: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::lazy(Box::new(Infallible(work)))
    }

    fn lazy(work: Box<dyn Runnable>) -> Self {
        let id = Runtime::add_node(NodeKind::Effect);
        let inner = Arc::new(EffectInner {
            id,
            work,
            disposed: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
        });

        let weak: Weak<dyn Reactive> = Arc::downgrade(&inner) as Weak<dyn Reactive>;
        let handle = Runtime::register(id, weak);
        trace!(effect = %id, "effect created");

        Self {
            inner,
            _handle: Arc::new(handle),
        }
    }

    /// Get the effect's node ID.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Tear down the old dependencies and run the work again.
    pub fn run(&self) -> Result<()> {
        self.inner.run()
    }

    /// Dispose of the effect.
    ///
    /// The effect is removed from every signal it read and will never run
    /// again. Disposing twice is harmless.
    pub fn dispose(&self) {
        if !self.inner.disposed.swap(true, Ordering::SeqCst) {
            Runtime::unregister(self.inner.id);
            debug!(effect = %self.inner.id, "effect disposed");
        }
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Get the number of signals and memos read during the latest run.
    pub fn dependency_count(&self) -> usize {
        Runtime::dependencies_of(self.inner.id).len()
    }

    /// Check whether the latest run read `node_id`.
    pub fn depends_on(&self, node_id: NodeId) -> bool {
        Runtime::dependencies_of(self.inner.id).contains(&node_id)
    }
}

impl Clone for Effect {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _handle: Arc::clone(&self._handle),
        }
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Create an effect and run it once.
pub fn create_effect<F>(work: F) -> Result<Effect>
where
    F: Fn() + Send + Sync + 'static,
{
    Effect::new(work)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
