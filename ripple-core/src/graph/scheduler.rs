//! Update Scheduler
//!
//! The scheduler owns every node of the dependency graph and decides which
//! computations must re-run after a source changes.
//!
//! # Algorithm
//!
//! 1. When a source node changes, walk its dependents depth first, in the
//!    order they subscribed.
//! 2. Direct dependents are marked "dirty". Nodes reached only through a memo
//!    are marked "maybe dirty": the memo may recompute to an equal value.
//! 3. Memos are lazy, so they are only marked and their own dependents are
//!    visited. Effects are collected into an ordered set, which makes every
//!    effect appear once per change even when several paths reach it.
//!
//! 4. Effects that wrote a source during their latest run are moved ahead
//!    of planned effects fed by that source, so a reader runs once, after
//!    its writer, instead of once before and once after.
//!
//! The runtime then runs the collected effects in order. Each effect pulls
//! the memos it reads, so derived values are always computed from the latest
//! sources and no effect observes a half-updated graph.

use std::collections::{HashMap, HashSet};

use indexmap::IndexSet;
use smallvec::SmallVec;

use super::node::{Node, NodeId, NodeKind};

/// The update scheduler manages the dependency graph and plans updates.
#[derive(Debug, Default)]
pub struct UpdateScheduler {
    /// All nodes in the graph, indexed by ID.
    nodes: HashMap<NodeId, Node>,
}

impl UpdateScheduler {
    /// Create a new empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the graph.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id();
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node from the graph, along with every edge involving it.
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        let node = self.nodes.remove(&node_id)?;

        for dep_id in node.dependencies() {
            if let Some(dep) = self.nodes.get_mut(dep_id) {
                dep.remove_dependent(node_id);
            }
        }

        for dependent_id in node.dependents() {
            if let Some(dependent) = self.nodes.get_mut(dependent_id) {
                dependent.remove_dependency(node_id);
            }
        }

        Some(node)
    }

    pub fn contains(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    pub fn get_node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    pub fn get_node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Add a dependency edge: `dependent` reads `dependency`.
    ///
    /// Both directions are recorded together; nothing is recorded if either
    /// node is gone. Returns true if the edge is new.
    pub fn add_edge(&mut self, dependency: NodeId, dependent: NodeId) -> bool {
        if dependency == dependent
            || !self.nodes.contains_key(&dependency)
            || !self.nodes.contains_key(&dependent)
        {
            return false;
        }

        let added = self
            .nodes
            .get_mut(&dependent)
            .is_some_and(|node| node.add_dependency(dependency));
        if let Some(dep_node) = self.nodes.get_mut(&dependency) {
            dep_node.add_dependent(dependent);
        }
        added
    }

    /// Remove a dependency edge.
    pub fn remove_edge(&mut self, dependency: NodeId, dependent: NodeId) {
        if let Some(dep_node) = self.nodes.get_mut(&dependency) {
            dep_node.remove_dependent(dependent);
        }
        if let Some(dependent_node) = self.nodes.get_mut(&dependent) {
            dependent_node.remove_dependency(dependency);
        }
    }

    /// Tear down every edge from `node_id` to the nodes it read.
    ///
    /// Returns the number of edges removed.
    pub fn clear_dependencies(&mut self, node_id: NodeId) -> usize {
        let Some(node) = self.nodes.get_mut(&node_id) else {
            return 0;
        };
        let dependencies = node.take_dependencies();
        node.clear_writes();

        for dep_id in &dependencies {
            if let Some(dep) = self.nodes.get_mut(dep_id) {
                dep.remove_dependent(node_id);
            }
        }

        dependencies.len()
    }

    /// Record that computation `writer` wrote source `source`.
    ///
    /// Write edges are forgotten with the writer's dependencies, so they
    /// always describe the latest run.
    pub fn add_write(&mut self, writer: NodeId, source: NodeId) -> bool {
        if writer == source || !self.nodes.contains_key(&source) {
            return false;
        }
        self.nodes
            .get_mut(&writer)
            .is_some_and(|node| node.add_write(source))
    }

    /// Sources written by `node_id` during its latest run.
    pub fn writes_of(&self, node_id: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(&node_id)
            .map(|node| node.writes().iter().copied().collect())
            .unwrap_or_default()
    }

    /// Mark a source node as changed at `epoch` and propagate dirty flags.
    ///
    /// Returns the effects that need to re-run, in run order.
    pub fn mark_changed(&mut self, source_id: NodeId, epoch: u64) -> IndexSet<NodeId> {
        let mut plan = IndexSet::new();

        let Some(source) = self.nodes.get_mut(&source_id) else {
            return plan;
        };
        source.set_changed_at(epoch);

        // Snapshot the subscribers; the stack is popped from the back, so
        // push in reverse to visit in subscription order.
        let mut stack: SmallVec<[(NodeId, bool); 16]> =
            source.dependents().iter().rev().map(|id| (*id, true)).collect();
        let mut visited = HashSet::new();

        while let Some((node_id, direct)) = stack.pop() {
            let Some(node) = self.nodes.get_mut(&node_id) else {
                continue;
            };

            if direct {
                node.mark_dirty();
            } else {
                node.mark_maybe_dirty();
            }

            if !visited.insert(node_id) {
                continue;
            }

            match node.kind() {
                NodeKind::Effect => {
                    plan.insert(node_id);
                }
                NodeKind::Derived => {
                    stack.extend(node.dependents().iter().rev().map(|id| (*id, false)));
                }
                NodeKind::Source => {}
            }
        }

        self.order_writers_first(plan)
    }

    /// Effects reachable from `source` through memos, without marking.
    fn effects_fed_by(&self, source: NodeId, found: &mut IndexSet<NodeId>) {
        let mut stack: SmallVec<[NodeId; 16]> = SmallVec::new();
        stack.push(source);
        let mut visited = HashSet::new();

        while let Some(node_id) = stack.pop() {
            if !visited.insert(node_id) {
                continue;
            }
            let Some(node) = self.nodes.get(&node_id) else {
                continue;
            };
            for dependent in node.dependents() {
                match self.nodes.get(dependent).map(Node::kind) {
                    Some(NodeKind::Effect) => {
                        found.insert(*dependent);
                    }
                    Some(NodeKind::Derived) => stack.push(*dependent),
                    _ => {}
                }
            }
        }
    }

    /// Reorder `plan` so each effect runs after the planned effects that
    /// write what it reads.
    ///
    /// Discovery order is kept wherever the write edges allow it. Effects
    /// that write each other's inputs keep their discovery order.
    fn order_writers_first(&self, plan: IndexSet<NodeId>) -> IndexSet<NodeId> {
        // blockers[i] = number of planned writers that must run before plan[i]
        let mut blockers = vec![0usize; plan.len()];
        let mut readers: Vec<SmallVec<[usize; 4]>> = vec![SmallVec::new(); plan.len()];

        for (writer_index, writer) in plan.iter().enumerate() {
            let Some(node) = self.nodes.get(writer) else {
                continue;
            };
            let mut fed = IndexSet::new();
            for source in node.writes() {
                self.effects_fed_by(*source, &mut fed);
            }
            for reader in fed {
                match plan.get_index_of(&reader) {
                    Some(reader_index) if reader_index != writer_index => {
                        readers[writer_index].push(reader_index);
                        blockers[reader_index] += 1;
                    }
                    _ => {}
                }
            }
        }

        if blockers.iter().all(|count| *count == 0) {
            return plan;
        }

        let mut emitted = vec![false; plan.len()];
        let mut ordered = IndexSet::with_capacity(plan.len());

        while ordered.len() < plan.len() {
            // First unblocked effect in discovery order; if a write cycle
            // leaves none, fall back to the first remaining one.
            let next = (0..plan.len())
                .find(|i| !emitted[*i] && blockers[*i] == 0)
                .or_else(|| (0..plan.len()).find(|i| !emitted[*i]));
            let Some(index) = next else {
                break;
            };

            emitted[index] = true;
            ordered.insert(plan[index]);
            for reader in &readers[index] {
                blockers[*reader] = blockers[*reader].saturating_sub(1);
            }
        }

        ordered
    }

    /// Subscribers of `node_id`, in subscription order.
    pub fn dependents_of(&self, node_id: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(&node_id)
            .map(|node| node.dependents().iter().copied().collect())
            .unwrap_or_default()
    }

    /// Nodes read by `node_id` during its latest run.
    pub fn dependencies_of(&self, node_id: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(&node_id)
            .map(|node| node.dependencies().iter().copied().collect())
            .unwrap_or_default()
    }

    /// Get the total number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::DirtyState;

    fn clean(scheduler: &mut UpdateScheduler, ids: &[NodeId]) {
        for id in ids {
            scheduler.get_node_mut(*id).unwrap().mark_clean();
        }
    }

    #[test]
    fn add_and_remove_nodes() {
        let mut scheduler = UpdateScheduler::new();

        let id1 = scheduler.add_node(Node::source());
        let id2 = scheduler.add_node(Node::derived());
        scheduler.add_edge(id1, id2);

        assert_eq!(scheduler.node_count(), 2);

        scheduler.remove_node(id1);
        assert_eq!(scheduler.node_count(), 1);
        assert!(scheduler.get_node(id1).is_none());
        assert!(scheduler.dependencies_of(id2).is_empty());
    }

    #[test]
    fn add_and_remove_edges() {
        let mut scheduler = UpdateScheduler::new();

        let source_id = scheduler.add_node(Node::source());
        let effect_id = scheduler.add_node(Node::effect());

        assert!(scheduler.add_edge(source_id, effect_id));
        assert!(!scheduler.add_edge(source_id, effect_id));

        assert_eq!(scheduler.dependents_of(source_id), vec![effect_id]);
        assert_eq!(scheduler.dependencies_of(effect_id), vec![source_id]);

        scheduler.remove_edge(source_id, effect_id);

        assert!(scheduler.dependents_of(source_id).is_empty());
        assert!(scheduler.dependencies_of(effect_id).is_empty());
    }

    #[test]
    fn edges_to_missing_nodes_are_ignored() {
        let mut scheduler = UpdateScheduler::new();
        let source_id = scheduler.add_node(Node::source());

        assert!(!scheduler.add_edge(source_id, NodeId::new()));
        assert!(scheduler.dependents_of(source_id).is_empty());
    }

    #[test]
    fn clear_dependencies_removes_both_directions() {
        let mut scheduler = UpdateScheduler::new();
        let a = scheduler.add_node(Node::source());
        let b = scheduler.add_node(Node::source());
        let effect = scheduler.add_node(Node::effect());

        scheduler.add_edge(a, effect);
        scheduler.add_edge(b, effect);

        assert_eq!(scheduler.clear_dependencies(effect), 2);
        assert!(scheduler.dependents_of(a).is_empty());
        assert!(scheduler.dependents_of(b).is_empty());
        assert!(scheduler.dependencies_of(effect).is_empty());
    }

    #[test]
    fn mark_changed_collects_effects_in_order() {
        let mut scheduler = UpdateScheduler::new();

        let source = scheduler.add_node(Node::source());
        let first = scheduler.add_node(Node::effect());
        let second = scheduler.add_node(Node::effect());

        scheduler.add_edge(source, second);
        scheduler.add_edge(source, first);
        clean(&mut scheduler, &[first, second]);

        let plan = scheduler.mark_changed(source, 1);
        assert_eq!(plan.into_iter().collect::<Vec<_>>(), vec![second, first]);
        assert_eq!(scheduler.get_node(source).unwrap().changed_at(), 1);
        assert_eq!(scheduler.get_node(first).unwrap().dirty_state(), DirtyState::Dirty);
    }

    #[test]
    fn mark_changed_walks_through_memos() {
        let mut scheduler = UpdateScheduler::new();

        // source -> memo1 -> memo2 -> effect
        let source = scheduler.add_node(Node::source());
        let memo1 = scheduler.add_node(Node::derived());
        let memo2 = scheduler.add_node(Node::derived());
        let effect = scheduler.add_node(Node::effect());

        scheduler.add_edge(source, memo1);
        scheduler.add_edge(memo1, memo2);
        scheduler.add_edge(memo2, effect);
        clean(&mut scheduler, &[memo1, memo2, effect]);

        let plan = scheduler.mark_changed(source, 7);

        assert_eq!(plan.into_iter().collect::<Vec<_>>(), vec![effect]);
        assert_eq!(scheduler.get_node(memo1).unwrap().dirty_state(), DirtyState::Dirty);
        assert_eq!(scheduler.get_node(memo2).unwrap().dirty_state(), DirtyState::MaybeDirty);
        assert_eq!(scheduler.get_node(effect).unwrap().dirty_state(), DirtyState::MaybeDirty);
    }

    #[test]
    fn effect_reached_twice_is_planned_once() {
        let mut scheduler = UpdateScheduler::new();

        // source -> memo -> effect, and source -> effect directly
        let source = scheduler.add_node(Node::source());
        let memo = scheduler.add_node(Node::derived());
        let effect = scheduler.add_node(Node::effect());

        scheduler.add_edge(source, memo);
        scheduler.add_edge(memo, effect);
        scheduler.add_edge(source, effect);
        clean(&mut scheduler, &[memo, effect]);

        let plan = scheduler.mark_changed(source, 1);

        assert_eq!(plan.len(), 1);
        // The direct edge wins: the effect must re-run regardless of the memo.
        assert_eq!(scheduler.get_node(effect).unwrap().dirty_state(), DirtyState::Dirty);
    }

    #[test]
    fn writers_run_before_their_readers() {
        let mut scheduler = UpdateScheduler::new();

        // reader reads a and b, writer reads a and writes b
        let a = scheduler.add_node(Node::source());
        let b = scheduler.add_node(Node::source());
        let reader = scheduler.add_node(Node::effect());
        let writer = scheduler.add_node(Node::effect());

        scheduler.add_edge(a, reader);
        scheduler.add_edge(b, reader);
        scheduler.add_edge(a, writer);
        assert!(scheduler.add_write(writer, b));
        clean(&mut scheduler, &[reader, writer]);

        let plan = scheduler.mark_changed(a, 1);
        assert_eq!(plan.into_iter().collect::<Vec<_>>(), vec![writer, reader]);
    }

    #[test]
    fn writes_through_memos_order_readers() {
        let mut scheduler = UpdateScheduler::new();

        let a = scheduler.add_node(Node::source());
        let b = scheduler.add_node(Node::source());
        let memo = scheduler.add_node(Node::derived());
        let reader = scheduler.add_node(Node::effect());
        let writer = scheduler.add_node(Node::effect());

        scheduler.add_edge(a, reader);
        scheduler.add_edge(b, memo);
        scheduler.add_edge(memo, reader);
        scheduler.add_edge(a, writer);
        scheduler.add_write(writer, b);
        clean(&mut scheduler, &[memo, reader, writer]);

        let plan = scheduler.mark_changed(a, 1);
        assert_eq!(plan.into_iter().collect::<Vec<_>>(), vec![writer, reader]);
    }

    #[test]
    fn mutual_writers_keep_discovery_order() {
        let mut scheduler = UpdateScheduler::new();

        let a = scheduler.add_node(Node::source());
        let b = scheduler.add_node(Node::source());
        let c = scheduler.add_node(Node::source());
        let first = scheduler.add_node(Node::effect());
        let second = scheduler.add_node(Node::effect());

        scheduler.add_edge(a, first);
        scheduler.add_edge(a, second);
        scheduler.add_edge(b, first);
        scheduler.add_edge(c, second);
        scheduler.add_write(first, c);
        scheduler.add_write(second, b);
        clean(&mut scheduler, &[first, second]);

        let plan = scheduler.mark_changed(a, 1);
        assert_eq!(plan.into_iter().collect::<Vec<_>>(), vec![first, second]);
    }

    #[test]
    fn clearing_dependencies_forgets_writes() {
        let mut scheduler = UpdateScheduler::new();
        let source = scheduler.add_node(Node::source());
        let effect = scheduler.add_node(Node::effect());

        scheduler.add_write(effect, source);
        assert_eq!(scheduler.writes_of(effect), vec![source]);

        scheduler.clear_dependencies(effect);
        assert!(scheduler.writes_of(effect).is_empty());
    }
}
