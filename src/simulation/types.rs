//! Simulation inputs and outputs.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize, Serializer};

use crate::graph::{NodeId, WorkNode};

/// Network and CPU throughput assumptions for one simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrottlingProfile {
    /// Round-trip time paid by every request
    #[serde(with = "humantime_serde")]
    pub rtt: Duration,
    /// Downlink throughput in kilobits per second
    pub throughput_kbps: f64,
    /// Multiplier applied to main-thread task durations
    pub cpu_slowdown: f64,
}

impl ThrottlingProfile {
    pub fn rtt_ms(&self) -> f64 {
        self.rtt.as_secs_f64() * 1000.0
    }
}

/// Simulated start and end of one node, in ms since navigation start
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeTiming {
    pub start_time: f64,
    pub end_time: f64,
}

impl NodeTiming {
    pub fn new(start_time: f64, end_time: f64) -> Self {
        Self { start_time, end_time }
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// A node together with its simulated timing
#[derive(Debug, Clone)]
pub struct TimedNode {
    pub node: Arc<WorkNode>,
    pub timing: NodeTiming,
}

/// Per-node simulation results, ordered by node id
#[derive(Debug, Clone, Default)]
pub struct NodeTimings {
    entries: BTreeMap<NodeId, TimedNode>,
}

impl NodeTimings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: Arc<WorkNode>, timing: NodeTiming) {
        self.entries.insert(node.id.clone(), TimedNode { node, timing });
    }

    pub fn get(&self, id: &str) -> Option<&NodeTiming> {
        self.entries.get(id).map(|entry| &entry.timing)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimedNode> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Latest end time across all nodes, 0 when empty
    pub fn latest_end(&self) -> f64 {
        self.iter().map(|entry| entry.timing.end_time).fold(0.0, f64::max)
    }
}

impl FromIterator<TimedNode> for NodeTimings {
    fn from_iter<I: IntoIterator<Item = TimedNode>>(iter: I) -> Self {
        let mut timings = Self::new();
        for entry in iter {
            timings.insert(entry.node, entry.timing);
        }
        timings
    }
}

/// Flat view of a timed node for reports
#[derive(Debug, Clone, Serialize)]
pub struct NodeTimingRecord<'a> {
    pub id: &'a str,
    pub kind: &'static str,
    pub start_time: f64,
    pub end_time: f64,
}

impl<'a> From<&'a TimedNode> for NodeTimingRecord<'a> {
    fn from(entry: &'a TimedNode) -> Self {
        Self {
            id: &entry.node.id,
            kind: entry.node.kind_label(),
            start_time: entry.timing.start_time,
            end_time: entry.timing.end_time,
        }
    }
}

impl Serialize for NodeTimings {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter().map(NodeTimingRecord::from))
    }
}

/// Outcome of simulating one graph under one throttling profile
#[derive(Debug, Clone, Serialize)]
pub struct SimulationResult {
    pub node_timings: NodeTimings,
    /// Overall completion time in ms
    pub timing: f64,
}

impl SimulationResult {
    pub fn new(node_timings: NodeTimings) -> Self {
        let timing = node_timings.latest_end();
        Self { node_timings, timing }
    }
}
