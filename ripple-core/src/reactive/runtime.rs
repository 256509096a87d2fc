//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, memos, and
//! effects. It owns the dependency graph and runs updates when signals
//! change.
//!
//! # How It Works
//!
//! 1. When a signal, memo or effect is created, it gets a node in the graph.
//!    Memos and effects also register a weak reference to themselves so the
//!    runtime can re-run them without keeping them alive.
//!
//! 2. When a memo or effect reads a signal, the runtime records the edge in
//!    both directions.
//!
//! 3. When a signal's value changes, the runtime:
//!    a. Marks dependent memos dirty and collects the affected effects,
//!       writers ahead of the effects reading what they write
//!    b. Releases the graph lock
//!    c. Runs each effect in order; memos recompute when they are next read
//!
//! 4. An effect planned by a pass stays pending until that pass reaches it.
//!    A nested pass, started by a write inside an effect, skips pending
//!    effects: they are already dirty and the outer pass runs them once.
//!
//! # Thread Safety
//!
//! The tracking context is thread-local. The graph and the registry are
//! process-wide, and neither lock is ever held while user code runs. Writes,
//! effect runs and memo recomputes all hold one re-entrant propagation lock,
//! so at most one thread propagates at a time while nested propagation on
//! the same thread proceeds normally.

use std::cell::RefCell;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use dashmap::DashMap;
use indexmap::IndexSet;
use parking_lot::{Mutex, MutexGuard, ReentrantMutex, ReentrantMutexGuard};
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use super::context::ReactiveContext;
use crate::config::{self, FailurePolicy, RuntimeConfig};
use crate::error::{ReactiveError, Result};
use crate::graph::{DirtyState, Node, NodeId, NodeKind, UpdateScheduler};

/// A computation the runtime can bring up to date on demand.
pub(crate) trait Reactive: Send + Sync {
    fn node_id(&self) -> NodeId;

    /// Re-run (effects) or recompute (memos) if any dependency changed.
    fn update(&self) -> Result<()>;
}

/// Handle to a registered reactive value.
///
/// Dropping this handle unregisters the reactive value from the runtime and
/// removes all of its edges.
pub(crate) struct ReactiveHandle {
    node_id: NodeId,
}

impl Drop for ReactiveHandle {
    fn drop(&mut self) {
        Runtime::unregister(self.node_id);
    }
}

/// The global reactive runtime.
pub struct Runtime;

// Maps node IDs to weak references so the registry never keeps a
// computation alive.
static REGISTRY: OnceLock<DashMap<NodeId, Weak<dyn Reactive>>> = OnceLock::new();
static GRAPH: OnceLock<Mutex<UpdateScheduler>> = OnceLock::new();
static PROPAGATION: ReentrantMutex<()> = parking_lot::const_reentrant_mutex(());

/// Logical clock for value changes. Starts above zero so a fresh node, whose
/// timestamps are zero, is always older than any change.
static EPOCH: AtomicU64 = AtomicU64::new(1);

fn registry() -> &'static DashMap<NodeId, Weak<dyn Reactive>> {
    REGISTRY.get_or_init(DashMap::new)
}

fn graph() -> MutexGuard<'static, UpdateScheduler> {
    GRAPH.get_or_init(|| Mutex::new(UpdateScheduler::new())).lock()
}

thread_local! {
    static PENDING: RefCell<HashSet<NodeId>> = RefCell::new(HashSet::new());
}

/// The effects a propagation pass planned and has not run yet.
///
/// Effects pending in an enclosing pass on this thread are not claimed.
/// Whatever is still claimed when the pass ends (abort, panic) is released.
struct PendingPass {
    claimed: SmallVec<[NodeId; 8]>,
}

impl PendingPass {
    fn claim(plan: &IndexSet<NodeId>) -> Self {
        let claimed: SmallVec<[NodeId; 8]> = PENDING.with(|pending| {
            let mut pending = pending.borrow_mut();
            plan.iter().copied().filter(|id| pending.insert(*id)).collect()
        });
        Self { claimed }
    }

    /// Take `effect_id` off the pending set. False if it belongs to an
    /// enclosing pass.
    fn take(&self, effect_id: NodeId) -> bool {
        self.claimed.contains(&effect_id)
            && PENDING.with(|pending| pending.borrow_mut().remove(&effect_id))
    }
}

impl Drop for PendingPass {
    fn drop(&mut self) {
        let _ = PENDING.try_with(|pending| {
            let mut pending = pending.borrow_mut();
            for id in &self.claimed {
                pending.remove(id);
            }
        });
    }
}

impl Runtime {
    /// Install `config` for reactive work performed on the current thread.
    pub fn configure(config: RuntimeConfig) {
        debug!(?config, "runtime configured");
        config::install(config);
    }

    /// The configuration active on the current thread.
    pub fn config() -> RuntimeConfig {
        config::current()
    }

    /// Get the computation currently being tracked, if any.
    pub fn current_subscriber() -> Option<NodeId> {
        ReactiveContext::current_subscriber()
    }

    /// Check if we're inside a reactive context.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }

    /// Check if `node_id` is still part of the graph.
    pub fn contains(node_id: NodeId) -> bool {
        graph().contains(node_id)
    }

    /// Computations that read `node_id` during their latest run, in
    /// subscription order.
    pub fn subscribers_of(node_id: NodeId) -> Vec<NodeId> {
        graph().dependents_of(node_id)
    }

    /// Signals and memos read by `node_id` during its latest run.
    pub fn dependencies_of(node_id: NodeId) -> Vec<NodeId> {
        graph().dependencies_of(node_id)
    }

    /// Signals written by `node_id` during its latest run.
    pub fn writes_of(node_id: NodeId) -> Vec<NodeId> {
        graph().writes_of(node_id)
    }

    /// Current dirty state of a memo or effect.
    pub fn dirty_state(node_id: NodeId) -> Option<DirtyState> {
        graph().get_node(node_id).map(Node::dirty_state)
    }

    pub(crate) fn add_node(kind: NodeKind) -> NodeId {
        graph().add_node(Node::new(kind))
    }

    pub(crate) fn remove_node(node_id: NodeId) {
        if graph().remove_node(node_id).is_some() {
            trace!(node = %node_id, "node removed");
        }
    }

    /// Register a memo or effect so propagation can find it.
    pub(crate) fn register(node_id: NodeId, reactive: Weak<dyn Reactive>) -> ReactiveHandle {
        registry().insert(node_id, reactive);
        ReactiveHandle { node_id }
    }

    /// Remove a computation from the registry and the graph.
    pub(crate) fn unregister(node_id: NodeId) {
        registry().remove(&node_id);
        Self::remove_node(node_id);
    }

    fn lookup(node_id: NodeId) -> Option<Arc<dyn Reactive>> {
        registry()
            .get(&node_id)
            .and_then(|entry| entry.value().upgrade())
    }

    /// Acquire the propagation lock. Re-entrant on the owning thread.
    pub(crate) fn lock_propagation() -> ReentrantMutexGuard<'static, ()> {
        PROPAGATION.lock()
    }

    /// Record that the current computation, if any, read `source_id`.
    pub(crate) fn track_read(source_id: NodeId) {
        if let Some(subscriber) = ReactiveContext::current_subscriber() {
            if graph().add_edge(source_id, subscriber) {
                trace!(source = %source_id, subscriber = %subscriber, "dependency recorded");
            }
        }
    }

    /// Record that the current computation, if any, wrote `source_id`.
    pub(crate) fn track_write(source_id: NodeId) {
        if let Some(writer) = ReactiveContext::current_subscriber() {
            if graph().add_write(writer, source_id) {
                trace!(source = %source_id, writer = %writer, "write recorded");
            }
        }
    }

    /// Stamp a memo's value as changed.
    pub(crate) fn mark_value_changed(node_id: NodeId) {
        let epoch = EPOCH.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(node) = graph().get_node_mut(node_id) {
            node.set_changed_at(epoch);
        }
    }

    /// Run `work` as computation `node_id` of kind `kind`.
    ///
    /// The computation's old edges are torn down first, then `work` runs with
    /// the computation on top of the tracking stack so every read re-records
    /// an edge. The stack is restored on every exit path.
    ///
    /// Re-entering a running computation is a cycle. Effects are also
    /// refused once `max_depth` effects are nested on this thread; memo
    /// recomputes only follow acyclic reads and are not depth limited.
    pub(crate) fn run_tracked<R>(
        node_id: NodeId,
        kind: NodeKind,
        work: impl FnOnce() -> R,
    ) -> Result<R> {
        let depth = ReactiveContext::depth();
        let max_depth = config::current().max_depth;
        let too_deep = kind == NodeKind::Effect && depth >= max_depth;

        if ReactiveContext::is_running(node_id) || too_deep {
            warn!(node = %node_id, depth, max_depth, "cyclic dependency detected");
            return Err(ReactiveError::CyclicDependency {
                node: node_id,
                depth,
            });
        }

        let removed = graph().clear_dependencies(node_id);
        trace!(node = %node_id, removed, depth, "running computation");

        let output = {
            let _ctx = match kind {
                NodeKind::Derived => ReactiveContext::enter_memo(node_id),
                _ => ReactiveContext::enter(node_id),
            };
            work()
        };

        let epoch = EPOCH.load(Ordering::SeqCst);
        if let Some(node) = graph().get_node_mut(node_id) {
            node.mark_clean();
            node.set_verified_at(epoch);
        }

        Ok(output)
    }

    /// Decide whether computation `node_id` must run again.
    ///
    /// `MaybeDirty` computations refresh the memos they read and only re-run
    /// if one of them produced a new value.
    pub(crate) fn needs_update(node_id: NodeId) -> Result<bool> {
        let (state, verified_at, dependencies) = {
            let graph = graph();
            let Some(node) = graph.get_node(node_id) else {
                return Ok(false);
            };
            let dependencies: SmallVec<[NodeId; 8]> =
                node.dependencies().iter().copied().collect();
            (node.dirty_state(), node.verified_at(), dependencies)
        };

        match state {
            DirtyState::Clean => Ok(false),
            DirtyState::Dirty => Ok(true),
            DirtyState::MaybeDirty => {
                for dependency in dependencies {
                    if let Some(memo) = Self::lookup(dependency) {
                        memo.update()?;
                    }

                    let changed = graph()
                        .get_node(dependency)
                        .is_some_and(|dep| dep.changed_at() > verified_at);
                    if changed {
                        return Ok(true);
                    }
                }

                if let Some(node) = graph().get_node_mut(node_id) {
                    node.mark_clean();
                }
                trace!(node = %node_id, "dependencies unchanged");
                Ok(false)
            }
        }
    }

    /// Propagate a change of signal `source_id` to everything that reads it.
    pub(crate) fn notify_signal_change(source_id: NodeId) -> Result<()> {
        let _lock = Self::lock_propagation();

        let epoch = EPOCH.fetch_add(1, Ordering::SeqCst) + 1;
        let plan = graph().mark_changed(source_id, epoch);

        if plan.is_empty() {
            return Ok(());
        }

        let policy = config::current().failure_policy;
        debug!(source = %source_id, effects = plan.len(), epoch, "propagating change");

        let pass = PendingPass::claim(&plan);
        let mut failures = Vec::new();
        for effect_id in plan {
            if !pass.take(effect_id) {
                trace!(effect = %effect_id, "effect left to the enclosing pass");
                continue;
            }

            // The effect may have been dropped since the plan was made.
            let Some(effect) = Self::lookup(effect_id) else {
                continue;
            };

            if let Err(err) = effect.update() {
                debug!(effect = %effect.node_id(), error = %err, "subscriber failed");
                match err {
                    ReactiveError::Propagation { failures: nested } => failures.extend(nested),
                    err => failures.push(err),
                }

                if policy == FailurePolicy::Abort {
                    break;
                }
            }
        }

        ReactiveError::collect(failures)
    }
}
