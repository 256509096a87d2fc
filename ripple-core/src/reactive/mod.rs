//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, memos, and effects.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (such as a memo or effect), the signal automatically
//! registers that context as a dependent. When the signal's value changes, all
//! dependents are brought up to date before the write returns.
//!
//! ## Memos
//!
//! A Memo is a derived value that caches its result. It re-evaluates only when
//! one of its dependencies changed, and only when it is read.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its dependencies
//! change. Effects are used to synchronize reactive state with the outside world.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking stack to automatically
//! detect dependencies. When a signal is read, we check if there is an active
//! computation and, if so, record the dependency in both directions.
//!
//! Propagation is eager and depth first: an effect's re-run, and everything
//! it writes in turn, completes before the next effect of the same write runs.
//! Effects already planned by an enclosing pass are left to that pass, so
//! each effect runs at most once per write.
//!
//! The tracking stack belongs to the runtime. Only [`untrack`] is public:
//!
//! ```compile_fail
//! use ripple_core::reactive::ReactiveContext;
//! ```

mod context;
mod effect;
pub mod equality;
mod memo;
mod runnable;
mod runtime;
mod signal;

pub use context::untrack;
pub use effect::{create_effect, Effect};
pub use memo::{create_memo, Memo};
pub use runnable::Runnable;
pub use runtime::Runtime;
pub use signal::{create_signal, ReadSignal, Signal, WriteSignal};
