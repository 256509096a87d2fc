//! Ripple Core
//!
//! A fine-grained reactive runtime. It implements:
//!
//! - Reactive primitives (signals, memos, effects)
//! - Implicit dependency discovery: reading a signal inside a computation
//!   subscribes the computation, no explicit subscribe calls
//! - Dynamic re-subscription: every run rebuilds the dependency set
//! - Synchronous, depth-first change propagation with cycle detection
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Reactive primitives and dependency tracking
//! - `graph`: Dependency graph and update planning
//! - `config`: Per-thread runtime configuration
//! - `error`: Error types
//!
//! # Example
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use ripple_core::reactive::{Effect, Memo, Signal};
//!
//! // Create a signal
//! let count = Signal::new(0);
//!
//! // Create a derived value
//! let c = count.clone();
//! let doubled = Memo::new(move || c.get() * 2);
//!
//! // Create an effect
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let (c, d, s) = (count.clone(), doubled.clone(), seen.clone());
//! let _effect = Effect::new(move || {
//!     s.lock().unwrap().push((c.get(), d.get()));
//! })
//! .unwrap();
//!
//! // Update the signal; the effect re-runs before `set` returns
//! count.set(5).unwrap();
//! assert_eq!(*seen.lock().unwrap(), vec![(0, 0), (5, 10)]);
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod reactive;

pub use config::{FailurePolicy, RuntimeConfig};
pub use error::{BoxError, ReactiveError, Result};
pub use graph::NodeId;
pub use reactive::{
    create_effect, create_memo, create_signal, untrack, Effect, Memo, ReadSignal, Runnable,
    Runtime, Signal, WriteSignal,
};
