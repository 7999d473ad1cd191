//! Graph simulation under a throttling profile.
//!
//! The reference simulator uses a simple throughput model:
//!
//! ```text
//! network duration = rtt + transfer_size * 8 / throughput_kbps
//! cpu duration     = duration_ms * cpu_slowdown
//!
//! ready[n] = max(end[dep] for dep in dependencies), or 0
//! start[n] = ready[n]                          (network)
//! start[n] = max(ready[n], main_thread_free)   (cpu)
//! end[n]   = start[n] + duration[n]
//! ```
//!
//! Requests run fully in parallel. CPU tasks share a single main thread and
//! are scheduled in order of readiness (ties broken by node id).

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use std::sync::Arc;

use log::debug;

use super::types::{NodeTiming, NodeTimings, SimulationResult, ThrottlingProfile};
use crate::graph::{DependencyGraph, NodeKind, WorkNode};

/// Produces node timings for a dependency graph.
///
/// Implementations must be deterministic for a given graph and profile.
pub trait Simulator: Send + Sync {
    fn simulate(&self, graph: &DependencyGraph, profile: &ThrottlingProfile) -> SimulationResult;

    /// Identity of this simulator inside result cache keys.
    ///
    /// Implementations whose output depends on their own configuration must
    /// override this so that differently configured instances never share
    /// cached results.
    fn name(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

/// Throughput-based list-scheduling simulator
#[derive(Debug, Default, Clone, Copy)]
pub struct ThroughputSimulator;

impl ThroughputSimulator {
    /// Simulated duration of a node in ms
    pub fn node_duration(node: &WorkNode, profile: &ThrottlingProfile) -> f64 {
        match &node.kind {
            NodeKind::Network(request) => {
                let transfer_ms = if profile.throughput_kbps > 0.0 {
                    request.transfer_size as f64 * 8.0 / profile.throughput_kbps
                } else {
                    0.0
                };
                profile.rtt_ms() + transfer_ms
            }
            NodeKind::Cpu(task) => task.duration_ms * profile.cpu_slowdown,
        }
    }
}

impl Simulator for ThroughputSimulator {
    fn simulate(&self, graph: &DependencyGraph, profile: &ThrottlingProfile) -> SimulationResult {
        let dependents = graph.dependents();
        let mut pending: BTreeMap<&str, usize> = graph
            .nodes()
            .map(|node| (node.id.as_str(), node.dependencies.len()))
            .collect();
        let mut ready_at: BTreeMap<&str, f64> = BTreeMap::new();
        let mut ready: BinaryHeap<ReadyNode<'_>> = graph
            .nodes()
            .filter(|node| node.dependencies.is_empty())
            .map(|node| ReadyNode { ready_time: 0.0, node })
            .collect();

        let mut main_thread_free = 0.0_f64;
        let mut timings = NodeTimings::new();

        while let Some(ReadyNode { ready_time, node }) = ready.pop() {
            let duration = Self::node_duration(node, profile);
            let start_time = if node.is_cpu() {
                ready_time.max(main_thread_free)
            } else {
                ready_time
            };
            let end_time = start_time + duration;
            if node.is_cpu() {
                main_thread_free = end_time;
            }
            timings.insert(Arc::clone(node), NodeTiming::new(start_time, end_time));

            for dependent_id in dependents.get(node.id.as_str()).into_iter().flatten() {
                let ready_entry = ready_at.entry(*dependent_id).or_insert(0.0);
                *ready_entry = ready_entry.max(end_time);
                if let Some(count) = pending.get_mut(dependent_id) {
                    *count -= 1;
                    if *count == 0 {
                        if let Some(dependent) = graph.get(dependent_id) {
                            ready.push(ReadyNode {
                                ready_time: *ready_entry,
                                node: dependent,
                            });
                        }
                    }
                }
            }
        }

        let result = SimulationResult::new(timings);
        debug!(
            "Simulated {} nodes (rtt {:?}, {} kbps, {}x cpu): completes at {:.1} ms",
            result.node_timings.len(),
            profile.rtt,
            profile.throughput_kbps,
            profile.cpu_slowdown,
            result.timing
        );
        result
    }
}

/// Node whose dependencies have all finished.
///
/// Ordered so that the max-heap pops the earliest ready time first, ties
/// broken by the smaller id.
struct ReadyNode<'g> {
    ready_time: f64,
    node: &'g Arc<WorkNode>,
}

impl Ord for ReadyNode<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .ready_time
            .total_cmp(&self.ready_time)
            .then_with(|| other.node.id.cmp(&self.node.id))
    }
}

impl PartialOrd for ReadyNode<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ReadyNode<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ReadyNode<'_> {}
