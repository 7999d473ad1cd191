//! Trace file loading.
//!
//! A trace file bundles the page-load dependency graph extracted from a
//! browser trace with the metrics observed in that trace. See the crate docs
//! for the JSON layout.

use std::collections::hash_map::DefaultHasher;
use std::fs::File;
use std::hash::{Hash, Hasher};
use std::io::{BufReader, Read};
use std::path::Path;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::graph::{DependencyGraph, NodeKind, WorkNode};
use crate::metrics::MetricError;

/// Metrics measured directly from the captured trace
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedMetrics {
    /// Speed Index computed from captured frames
    #[serde(default)]
    pub speed_index: Option<f64>,
    /// First Contentful Paint timestamp in ms since navigation start
    #[serde(default)]
    pub first_contentful_paint: Option<f64>,
}

/// On-disk layout of a trace file
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TraceFile {
    id: String,
    #[serde(default)]
    observed: ObservedMetrics,
    nodes: Vec<WorkNode>,
}

/// A loaded, validated trace
#[derive(Debug, Clone)]
pub struct TraceData {
    pub id: String,
    pub observed: ObservedMetrics,
    pub graph: DependencyGraph,
    fingerprint: u64,
}

impl TraceData {
    pub fn new(id: impl Into<String>, observed: ObservedMetrics, graph: DependencyGraph) -> Self {
        let id = id.into();
        let mut hasher = DefaultHasher::new();
        id.hash(&mut hasher);
        observed.speed_index.map(f64::to_bits).hash(&mut hasher);
        observed.first_contentful_paint.map(f64::to_bits).hash(&mut hasher);
        graph.fingerprint().hash(&mut hasher);

        Self {
            id,
            observed,
            graph,
            fingerprint: hasher.finish(),
        }
    }

    /// Hash of the id, observed metrics and graph content, computed once at
    /// construction
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Parse and validate a trace from JSON text
    pub fn from_json_str(json: &str) -> Result<Self, MetricError> {
        let file: TraceFile = serde_json::from_str(json)?;
        Self::from_trace_file(file)
    }

    /// Parse and validate a trace from a JSON reader
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, MetricError> {
        let file: TraceFile = serde_json::from_reader(reader)?;
        Self::from_trace_file(file)
    }

    fn from_trace_file(file: TraceFile) -> Result<Self, MetricError> {
        if file.id.trim().is_empty() {
            return Err(MetricError::InvalidTrace("trace id cannot be empty".to_string()));
        }
        validate_observed(&file.observed)?;
        for node in &file.nodes {
            validate_node(node)?;
        }

        let graph = DependencyGraph::new(file.nodes)?;
        debug!("Trace '{}' has {} nodes", file.id, graph.len());
        if graph.is_empty() {
            warn!("Trace '{}' has no work nodes, simulations will complete at 0 ms", file.id);
        }
        if file.observed.speed_index.is_none() {
            warn!("Trace '{}' has no observed speed index", file.id);
        }

        Ok(Self::new(file.id, file.observed, graph))
    }
}

/// Load a trace file from disk
pub fn load_trace(path: &Path) -> Result<TraceData, MetricError> {
    info!("Loading trace from: {:?}", path);
    let file = File::open(path).map_err(|source| MetricError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    TraceData::from_reader(BufReader::new(file))
}

fn validate_observed(observed: &ObservedMetrics) -> Result<(), MetricError> {
    let values = [
        ("speedIndex", observed.speed_index),
        ("firstContentfulPaint", observed.first_contentful_paint),
    ];
    for (name, value) in values {
        if let Some(value) = value {
            if !value.is_finite() || value < 0.0 {
                return Err(MetricError::InvalidTrace(format!(
                    "observed {} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
    }
    Ok(())
}

fn validate_node(node: &WorkNode) -> Result<(), MetricError> {
    if let NodeKind::Cpu(task) = &node.kind {
        if !task.duration_ms.is_finite() || task.duration_ms < 0.0 {
            return Err(MetricError::InvalidTrace(format!(
                "node {} has invalid duration {}",
                node.id, task.duration_ms
            )));
        }
    }

    if let Some(span) = node.observed {
        if !span.start_ms.is_finite() || !span.end_ms.is_finite() || span.end_ms < span.start_ms {
            return Err(MetricError::InvalidTrace(format!(
                "node {} has invalid observed span {}..{}",
                node.id, span.start_ms, span.end_ms
            )));
        }
    }

    Ok(())
}
