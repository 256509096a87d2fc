//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! we can register the current computation as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing computation.
//! When entering a reactive context (e.g., running a memo or effect), we push
//! the computation onto the stack. When the computation completes, we pop it.
//!
//! This design supports nested reactive contexts (e.g., a memo that reads
//! from another memo, or an effect whose write re-runs other effects).
//! Untracked scopes push an empty entry, which hides the outer computation
//! without losing it.

use std::cell::RefCell;

use smallvec::SmallVec;

use crate::graph::NodeId;

thread_local! {
    static CONTEXT_STACK: RefCell<SmallVec<[ContextEntry; 8]>> = RefCell::new(SmallVec::new());
}

/// An entry in the reactive context stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContextEntry {
    /// An effect whose reads are being recorded.
    Effect(NodeId),
    /// A memo recompute whose reads are being recorded.
    Memo(NodeId),
    /// A scope in which reads are not recorded.
    Untracked,
}

impl ContextEntry {
    fn subscriber(self) -> Option<NodeId> {
        match self {
            Self::Effect(id) | Self::Memo(id) => Some(id),
            Self::Untracked => None,
        }
    }
}

/// Guard that pops the context when dropped.
///
/// This ensures the context stack is properly maintained even if
/// the computation returns an error or panics.
#[must_use = "the context is exited as soon as the guard is dropped"]
pub(crate) struct ReactiveContext {
    entry: ContextEntry,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given effect.
    ///
    /// While this context is active, any signals that are read will
    /// register the effect as a dependent.
    pub fn enter(node_id: NodeId) -> Self {
        Self::push(ContextEntry::Effect(node_id))
    }

    /// Enter a reactive context for a memo recompute.
    ///
    /// Memo frames track reads like effect frames but do not count towards
    /// [`ReactiveContext::depth`].
    pub fn enter_memo(node_id: NodeId) -> Self {
        Self::push(ContextEntry::Memo(node_id))
    }

    /// Enter a scope in which reads are not tracked.
    pub fn untracked() -> Self {
        Self::push(ContextEntry::Untracked)
    }

    fn push(entry: ContextEntry) -> Self {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(entry));
        Self { entry }
    }

    /// Check if reads are currently being tracked.
    pub fn is_active() -> bool {
        Self::current_subscriber().is_some()
    }

    /// Get the computation that reads are currently attributed to, if any.
    pub fn current_subscriber() -> Option<NodeId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(|entry| entry.subscriber()))
    }

    /// Check if `node_id` is running anywhere on this thread's stack.
    pub fn is_running(node_id: NodeId) -> bool {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .iter()
                .any(|entry| entry.subscriber() == Some(node_id))
        })
    }

    /// Number of effects currently running on this thread.
    ///
    /// This is the nesting of propagation passes. Memo recomputes are pulled
    /// along an acyclic chain and are not counted.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .iter()
                .filter(|entry| matches!(entry, ContextEntry::Effect(_)))
                .count()
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        // `try_with` because a guard may be dropped during thread teardown.
        let _ = CONTEXT_STACK.try_with(|stack| {
            let popped = stack.borrow_mut().pop();

            debug_assert_eq!(
                popped,
                Some(self.entry),
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.entry,
                popped
            );
        });
    }
}

/// Run `f` without tracking any reads it performs.
///
/// ```rust
/// use ripple_core::reactive::{untrack, Effect, Signal};
///
/// let tracked = Signal::new(1);
/// let ignored = Signal::new(2);
///
/// let (t, i) = (tracked.clone(), ignored.clone());
/// let effect = Effect::new(move || {
///     let _ = t.get() + untrack(|| i.get());
/// })
/// .unwrap();
///
/// assert_eq!(effect.dependency_count(), 1);
/// ```
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    let _ctx = ReactiveContext::untracked();
    f()
}
