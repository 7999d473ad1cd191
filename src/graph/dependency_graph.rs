//! Immutable dependency graph of work nodes.
//!
//! Nodes are shared behind `Arc` so that pruned copies of a graph (used by
//! metrics that simulate only part of the page load) are cheap to build and
//! never duplicate node payloads.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::types::{NodeId, WorkNode};

/// Errors raised while assembling a dependency graph
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Duplicate node id: {id}")]
    DuplicateNode { id: NodeId },

    #[error("Node {node} depends on unknown node {dependency}")]
    UnknownDependency { node: NodeId, dependency: NodeId },

    #[error("Dependency cycle detected at node {node}")]
    Cycle { node: NodeId },
}

/// Directed acyclic graph of work nodes, keyed by node id
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<NodeId, Arc<WorkNode>>,
}

impl DependencyGraph {
    /// Build a graph, rejecting duplicate ids, dangling edges and cycles
    pub fn new(nodes: Vec<WorkNode>) -> Result<Self, GraphError> {
        let mut map = BTreeMap::new();
        for node in nodes {
            if map.contains_key(&node.id) {
                return Err(GraphError::DuplicateNode { id: node.id });
            }
            map.insert(node.id.clone(), Arc::new(node));
        }

        for node in map.values() {
            if let Some(missing) = node.dependencies.iter().find(|dep| !map.contains_key(*dep)) {
                return Err(GraphError::UnknownDependency {
                    node: node.id.clone(),
                    dependency: missing.clone(),
                });
            }
        }

        let graph = Self { nodes: map };
        let order = graph.topological_order();
        if order.len() < graph.nodes.len() {
            let visited: BTreeSet<&str> = order.iter().map(|node| node.id.as_str()).collect();
            let node = graph
                .nodes
                .keys()
                .find(|id| !visited.contains(id.as_str()))
                .cloned()
                .unwrap_or_default();
            return Err(GraphError::Cycle { node });
        }

        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Arc<WorkNode>> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Nodes in id order
    pub fn nodes(&self) -> impl Iterator<Item = &Arc<WorkNode>> {
        self.nodes.values()
    }

    /// Hash of every node's content, stable for the lifetime of the process
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.nodes.len().hash(&mut hasher);
        for node in self.nodes.values() {
            node.hash_content(&mut hasher);
        }
        hasher.finish()
    }

    /// Map from node id to the ids of nodes that depend on it
    pub fn dependents(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut dependents: BTreeMap<&str, Vec<&str>> =
            self.nodes.keys().map(|id| (id.as_str(), Vec::new())).collect();
        for node in self.nodes.values() {
            for dep in &node.dependencies {
                if let Some(list) = dependents.get_mut(dep.as_str()) {
                    list.push(node.id.as_str());
                }
            }
        }
        dependents
    }

    /// Kahn ordering with ties broken by id.
    ///
    /// Nodes on a cycle are left out, so a short result means the graph is
    /// cyclic. Graphs built through [`DependencyGraph::new`] never are.
    pub fn topological_order(&self) -> Vec<&Arc<WorkNode>> {
        let dependents = self.dependents();
        let mut pending: BTreeMap<&str, usize> = self
            .nodes
            .values()
            .map(|node| (node.id.as_str(), node.dependencies.len()))
            .collect();

        let mut queue: VecDeque<&str> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| *id)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = queue.pop_front() {
            if let Some(node) = self.nodes.get(id) {
                order.push(node);
            }
            for dependent in dependents.get(id).into_iter().flatten() {
                if let Some(count) = pending.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        queue.push_back(*dependent);
                    }
                }
            }
        }

        order
    }

    /// Copy of the graph holding every node accepted by `keep` together with
    /// all of its transitive dependencies.
    ///
    /// Every dependency of a kept node is kept too, so edges stay inside the
    /// new graph and it remains acyclic.
    pub fn retain_with_dependencies<F>(&self, keep: F) -> DependencyGraph
    where
        F: Fn(&WorkNode) -> bool,
    {
        let mut kept: BTreeSet<&str> = BTreeSet::new();
        let mut stack: Vec<&str> = self
            .nodes
            .values()
            .filter(|node| keep(node))
            .map(|node| node.id.as_str())
            .collect();

        while let Some(id) = stack.pop() {
            if !kept.insert(id) {
                continue;
            }
            if let Some(node) = self.nodes.get(id) {
                stack.extend(node.dependencies.iter().map(String::as_str));
            }
        }

        let nodes = kept
            .into_iter()
            .filter_map(|id| self.nodes.get_key_value(id))
            .map(|(id, node)| (id.clone(), Arc::clone(node)))
            .collect();

        DependencyGraph { nodes }
    }
}
