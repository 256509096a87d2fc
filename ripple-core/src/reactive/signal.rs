//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! is read by computations that depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (memo/effect), the
//!    runtime records an edge between the signal and that computation.
//!
//! 2. When a signal's value changes, every computation reading it re-runs
//!    synchronously, before `set` returns.
//!
//! 3. Writing a value equal to the current one does nothing.
//!
//! # Thread Safety
//!
//! Signals are `Send + Sync`. The value is protected by a `RwLock`; the
//! edges live in the runtime's graph, keyed by the signal's node ID, so a
//! signal never holds a reference to the computations that read it.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use super::equality::{self, EqualsFn};
use super::runtime::Runtime;
use crate::error::Result;
use crate::graph::{NodeId, NodeKind};

struct SignalInner<T> {
    id: NodeId,
    value: RwLock<T>,
    equals: EqualsFn<T>,
}

impl<T> Drop for SignalInner<T> {
    fn drop(&mut self) {
        // Last handle gone: nothing can read or write this signal again.
        Runtime::remove_node(self.id);
    }
}

/// A reactive signal holding a value of type T.
///
/// Clones share the same value.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::Signal;
///
/// let count = Signal::new(0);
/// assert_eq!(count.get(), 0);
///
/// count.set(5).unwrap();
/// assert_eq!(count.get(), 5);
/// ```
pub struct Signal<T>
where
    T: Send + Sync + 'static,
{
    inner: Arc<SignalInner<T>>,
}

impl<T> Signal<T>
where
    T: PartialEq + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self::with_equality(value, equality::equals)
    }
}

impl<T> Signal<T>
where
    T: Send + Sync + 'static,
{
    /// Create a new signal that uses `equals` to detect changes.
    ///
    /// ```rust
    /// use ripple_core::reactive::{equality::total_eq_f64, Signal};
    ///
    /// let ratio = Signal::with_equality(f64::NAN, total_eq_f64);
    /// ratio.set(f64::NAN).unwrap(); // no-op
    /// ```
    pub fn with_equality(value: T, equals: EqualsFn<T>) -> Self {
        let id = Runtime::add_node(NodeKind::Source);
        trace!(signal = %id, "signal created");

        Self {
            inner: Arc::new(SignalInner {
                id,
                value: RwLock::new(value),
                equals,
            }),
        }
    }

    /// Get the signal's node ID.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the
    /// current computation as a subscriber.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    /// Alias for [`Signal::get`].
    pub fn read(&self) -> T
    where
        T: Clone,
    {
        self.get()
    }

    /// Borrow the current value, tracking the read like [`Signal::get`].
    ///
    /// The value stays read-locked while `f` runs. Writers on other threads
    /// wait for the propagation lock, which is held for the same span, so `f`
    /// may read other signals and memos, this one included. It must not
    /// write this signal.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let _lock = Runtime::lock_propagation();
        Runtime::track_read(self.inner.id);
        f(&*self.inner.value.read())
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.inner.value.read().clone()
    }

    /// Set a new value and re-run everything that reads this signal.
    ///
    /// Returns the failures of the computations that re-ran, according to
    /// the thread's [`FailurePolicy`](crate::FailurePolicy). The value is
    /// committed even when a subscriber fails.
    pub fn set(&self, value: T) -> Result<()> {
        let _pass = Runtime::lock_propagation();
        Runtime::track_write(self.inner.id);

        {
            let mut current = self.inner.value.write();
            if (self.inner.equals)(&current, &value) {
                trace!(signal = %self.inner.id, "write with equal value ignored");
                return Ok(());
            }
            *current = value;
        }

        debug!(signal = %self.inner.id, "signal changed");
        Runtime::notify_signal_change(self.inner.id)
    }

    /// Alias for [`Signal::set`].
    pub fn write(&self, value: T) -> Result<()> {
        self.set(value)
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&T) -> T,
    {
        let _pass = Runtime::lock_propagation();
        let new_value = f(&*self.inner.value.read());
        self.set(new_value)
    }

    /// Get the number of computations reading this signal.
    pub fn subscriber_count(&self) -> usize {
        Runtime::subscribers_of(self.inner.id).len()
    }

    /// Check whether computation `node_id` currently reads this signal.
    pub fn has_subscriber(&self, node_id: NodeId) -> bool {
        Runtime::subscribers_of(self.inner.id).contains(&node_id)
    }

    /// Split into separate accessor and mutator handles.
    pub fn split(self) -> (ReadSignal<T>, WriteSignal<T>) {
        (
            ReadSignal {
                signal: self.clone(),
            },
            WriteSignal { signal: self },
        )
    }

    /// A handle that can only read this signal.
    pub fn read_only(&self) -> ReadSignal<T> {
        ReadSignal {
            signal: self.clone(),
        }
    }
}

impl<T> Clone for Signal<T>
where
    T: Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.read())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// Read half of a signal.
pub struct ReadSignal<T>
where
    T: Send + Sync + 'static,
{
    signal: Signal<T>,
}

impl<T> ReadSignal<T>
where
    T: Send + Sync + 'static,
{
    pub fn id(&self) -> NodeId {
        self.signal.id()
    }

    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.signal.get()
    }

    pub fn read(&self) -> T
    where
        T: Clone,
    {
        self.signal.get()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.signal.with(f)
    }

    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.signal.get_untracked()
    }

    pub fn subscriber_count(&self) -> usize {
        self.signal.subscriber_count()
    }

    pub fn has_subscriber(&self, node_id: NodeId) -> bool {
        self.signal.has_subscriber(node_id)
    }
}

impl<T> Clone for ReadSignal<T>
where
    T: Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
        }
    }
}

impl<T> Debug for ReadSignal<T>
where
    T: Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ReadSignal").field(&self.signal).finish()
    }
}

/// Write half of a signal.
pub struct WriteSignal<T>
where
    T: Send + Sync + 'static,
{
    signal: Signal<T>,
}

impl<T> WriteSignal<T>
where
    T: Send + Sync + 'static,
{
    pub fn id(&self) -> NodeId {
        self.signal.id()
    }

    pub fn set(&self, value: T) -> Result<()> {
        self.signal.set(value)
    }

    pub fn write(&self, value: T) -> Result<()> {
        self.signal.set(value)
    }

    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&T) -> T,
    {
        self.signal.update(f)
    }
}

impl<T> Clone for WriteSignal<T>
where
    T: Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
        }
    }
}

impl<T> Debug for WriteSignal<T>
where
    T: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteSignal")
            .field("id", &self.signal.id())
            .finish()
    }
}

/// Create a signal and return its accessor and mutator handles.
///
/// ```rust
/// use ripple_core::reactive::create_signal;
///
/// let (count, set_count) = create_signal(0);
/// set_count.set(3).unwrap();
/// assert_eq!(count.get(), 3);
/// ```
pub fn create_signal<T>(value: T) -> (ReadSignal<T>, WriteSignal<T>)
where
    T: PartialEq + Send + Sync + 'static,
{
    Signal::new(value).split()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
