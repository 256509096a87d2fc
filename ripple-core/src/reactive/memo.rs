//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Memos Work
//!
//! 1. On first access, the memo runs its computation and caches the result.
//!
//! 2. When accessed again, if no dependencies have changed, returns cached value.
//!
//! 3. When a signal it reads changes, the memo is marked "dirty". When only a
//!    memo it reads was invalidated, it is marked "maybe dirty".
//!
//! 4. On next access, a "maybe dirty" memo first refreshes the memos it reads
//!    and recomputes only if one of them produced a new value.
//!
//! 5. A recompute that produces a value equal to the cached one does not
//!    count as a change for anything downstream.
//!
//! # Why This Matters
//!
//! Memos are pulled, not pushed. An effect that reads two memos derived from
//! the same signal always sees both computed from the signal's latest value,
//! so a diamond-shaped graph never exposes a half-updated state.

use std::fmt::Debug;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::trace;

use super::equality::{self, EqualsFn};
use super::runtime::{Reactive, ReactiveHandle, Runtime};
use crate::error::Result;
use crate::graph::{DirtyState, NodeId, NodeKind};

struct MemoInner<T> {
    id: NodeId,
    compute: Box<dyn Fn() -> T + Send + Sync>,
    value: RwLock<Option<T>>,
    equals: EqualsFn<T>,
}

impl<T> MemoInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Bring the cached value up to date and return it.
    fn refresh(&self) -> Result<T> {
        let _pass = Runtime::lock_propagation();

        let cached = self.value.read().clone();
        if let Some(value) = cached {
            if !Runtime::needs_update(self.id)? {
                return Ok(value);
            }
        }

        let new_value = Runtime::run_tracked(self.id, NodeKind::Derived, || (self.compute)())?;

        let changed = {
            let mut slot = self.value.write();
            let changed = slot
                .as_ref()
                .map_or(true, |old| !(self.equals)(old, &new_value));
            if changed {
                *slot = Some(new_value.clone());
            }
            changed
        };

        if changed {
            Runtime::mark_value_changed(self.id);
        }
        trace!(memo = %self.id, changed, "memo recomputed");

        Ok(new_value)
    }
}

impl<T> Reactive for MemoInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn update(&self) -> Result<()> {
        self.refresh().map(drop)
    }
}

/// A cached derived value that recomputes only when dependencies change.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::{Memo, Signal};
///
/// let count = Signal::new(2);
/// let c = count.clone();
/// let doubled = Memo::new(move || c.get() * 2);
///
/// assert_eq!(doubled.get(), 4);
/// count.set(5).unwrap();
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Memo<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<MemoInner<T>>,
    _handle: Arc<ReactiveHandle>,
}

impl<T> Memo<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a new memo with the given computation function.
    ///
    /// The computation is not run immediately. It runs on first access.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::with_equality(compute, equality::equals)
    }
}

impl<T> Memo<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a memo that uses `equals` to decide whether a recompute
    /// produced a new value.
    pub fn with_equality<F>(compute: F, equals: EqualsFn<T>) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let id = Runtime::add_node(NodeKind::Derived);
        let inner = Arc::new(MemoInner {
            id,
            compute: Box::new(compute),
            value: RwLock::new(None),
            equals,
        });

        let weak: Weak<dyn Reactive> = Arc::downgrade(&inner) as Weak<dyn Reactive>;
        let handle = Runtime::register(id, weak);
        trace!(memo = %id, "memo created");

        Self {
            inner,
            _handle: Arc::new(handle),
        }
    }

    /// Get the memo's node ID.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// # Panics
    ///
    /// Panics if the memo depends on itself, directly or through other
    /// memos. Use [`Memo::try_get`] to handle that case. Chains of memos are
    /// not limited by [`RuntimeConfig::max_depth`](crate::RuntimeConfig).
    pub fn get(&self) -> T {
        match self.try_get() {
            Ok(value) => value,
            Err(err) => panic!("memo {} could not be computed: {err}", self.inner.id),
        }
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// If called within a reactive context, the current computation starts
    /// depending on this memo.
    pub fn try_get(&self) -> Result<T> {
        Runtime::track_read(self.inner.id);
        self.inner.refresh()
    }

    /// Get the current value without tracking the read.
    pub fn get_untracked(&self) -> Result<T> {
        super::untrack(|| self.inner.refresh())
    }

    /// Get the current dirty state.
    pub fn state(&self) -> DirtyState {
        Runtime::dirty_state(self.inner.id).unwrap_or(DirtyState::Dirty)
    }

    /// Get the number of computations reading this memo.
    pub fn dependent_count(&self) -> usize {
        Runtime::subscribers_of(self.inner.id).len()
    }

    /// Get the number of signals and memos this memo read last time.
    pub fn dependency_count(&self) -> usize {
        Runtime::dependencies_of(self.inner.id).len()
    }

    /// Check if the memo has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.read().is_some()
    }
}

impl<T> Clone for Memo<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _handle: Arc::clone(&self._handle),
        }
    }
}

impl<T> Debug for Memo<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("value", &*self.inner.value.read())
            .field("dependent_count", &self.dependent_count())
            .finish()
    }
}

/// Create a lazily computed, cached derived value.
pub fn create_memo<T, F>(compute: F) -> Memo<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    Memo::new(compute)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
