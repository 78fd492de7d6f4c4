//! Dependency-graph snapshots for invalidation queries.
//!
//! The registry is a lazily populated map, which is the right shape for
//! recursive builds but the wrong shape for "what depends on this file?"
//! Watch mode takes a [`DepGraph`] snapshot of the registered targets
//! and walks edges forward (input to output) to find every key affected
//! by a set of changed paths.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::key::TargetKey;
use crate::registry::Registry;

/// An edge-per-dependency view of the registered targets.
pub struct DepGraph {
  graph: DiGraph<TargetKey, ()>,
  nodes: HashMap<TargetKey, NodeIndex>,
}

impl DepGraph {
  /// Snapshot the registry's current targets.
  ///
  /// For every registered target, an edge runs from each input key to
  /// each output key. Keys only ever seen as inputs (plain sources) get
  /// nodes too, so changed source files can be looked up directly.
  pub fn snapshot(registry: &Registry) -> DepGraph {
    let mut dep = DepGraph {
      graph: DiGraph::new(),
      nodes: HashMap::new(),
    };

    for target in registry.registered() {
      let outputs: Vec<NodeIndex> = target.outputs().iter().map(|o| dep.node(o)).collect();
      for input in target.inputs() {
        let from = dep.node(&input);
        for &to in &outputs {
          dep.graph.add_edge(from, to, ());
        }
      }
    }

    dep
  }

  /// Get or insert the node for a key.
  fn node(&mut self, key: &TargetKey) -> NodeIndex {
    if let Some(&idx) = self.nodes.get(key) {
      return idx;
    }
    let idx = self.graph.add_node(key.clone());
    self.nodes.insert(key.clone(), idx);
    idx
  }

  pub fn contains(&self, key: &TargetKey) -> bool {
    self.nodes.contains_key(key)
  }

  pub fn node_count(&self) -> usize {
    self.graph.node_count()
  }

  /// Direct dependents of a key.
  pub fn dependents(&self, key: &TargetKey) -> Vec<TargetKey> {
    let Some(&idx) = self.nodes.get(key) else {
      return Vec::new();
    };

    self
      .graph
      .neighbors_directed(idx, Direction::Outgoing)
      .map(|n| self.graph[n].clone())
      .collect()
  }

  /// Every key transitively affected by the given changed keys.
  ///
  /// The changed keys themselves are included: their owning targets
  /// need invalidating too. Cycles are harmless here - the visited set
  /// bounds the walk.
  pub fn affected(&self, changed: impl IntoIterator<Item = TargetKey>) -> HashSet<TargetKey> {
    let mut result: HashSet<TargetKey> = HashSet::new();
    let mut queue: VecDeque<NodeIndex> = VecDeque::new();

    for key in changed {
      if let Some(&idx) = self.nodes.get(&key) {
        queue.push_back(idx);
      }
      result.insert(key);
    }

    while let Some(idx) = queue.pop_front() {
      for next in self.graph.neighbors_directed(idx, Direction::Outgoing) {
        let key = self.graph[next].clone();
        if result.insert(key) {
          queue.push_back(next);
        }
      }
    }

    result
  }
}
