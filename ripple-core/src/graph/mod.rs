//! Dependency Graph
//!
//! This module implements the dependency graph that tracks relationships
//! between reactive values and computations.
//!
//! # Overview
//!
//! - Nodes represent reactive values (signals, memos) or computations
//!   (memos, effects)
//! - Edges represent dependencies: if A reads B, there is an edge from B to A
//!
//! When a signal changes, we traverse the graph to find all affected nodes
//! and mark them as dirty, collecting the effects that must re-run.
//!
//! # Design Decisions
//!
//! 1. The graph is centralized rather than stored inside each signal, so
//!    edges are plain node IDs. A signal never owns the computations that
//!    read it.
//!
//! 2. The graph is indexed by node ID for O(1) lookups.
//!
//! 3. We maintain both forward (dependencies) and reverse (dependents) edges
//!    and always update them as a pair.

mod node;
mod scheduler;

pub use node::{DirtyState, Node, NodeId, NodeKind};
pub use scheduler::UpdateScheduler;
