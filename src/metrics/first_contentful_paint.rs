//! First Contentful Paint estimation.
//!
//! Unlike Speed Index, FCP prunes the graph before simulating: only the work
//! that could have blocked the first paint observed in the trace is kept.
//!
//! - network: finished before the observed paint (or is the main document)
//!   and is render-blocking; the optimistic side also drops
//!   script-initiated requests
//! - cpu: finished before the observed paint and evaluates one of the
//!   render-blocking scripts kept above
//!
//! Kept nodes bring their transitive dependencies along. Each side's estimate
//! is the completion time of its simulation.

use std::borrow::Cow;
use std::collections::HashSet;

use async_trait::async_trait;
use log::info;

use super::estimator::{estimate_with_strategy, MetricContext, MetricStrategy};
use super::providers::FcpProvider;
use super::types::{FinalMetricResult, MetricCoefficients, MetricError, MetricEstimate, SimulationSide};
use crate::graph::{DependencyGraph, NetworkRequest, NodeKind, ResourceType, EVALUATE_SCRIPT_EVENT};
use crate::simulation::SimulationResult;
use crate::trace::TraceData;

pub const FCP_COEFFICIENTS: MetricCoefficients = MetricCoefficients {
    intercept: 0.0,
    optimistic: 0.5,
    pessimistic: 0.5,
};

/// Observed paint timestamp the graph is pruned against
#[derive(Debug, Clone, Copy)]
pub struct FcpExtras {
    pub observed_fcp_ms: f64,
}

pub const FIRST_CONTENTFUL_PAINT: MetricStrategy<FcpExtras> = MetricStrategy {
    name: "first-contentful-paint",
    coefficients: FCP_COEFFICIENTS,
    select_optimistic_graph: optimistic_fcp_graph,
    select_pessimistic_graph: pessimistic_fcp_graph,
    derive_estimate: derive_fcp_estimate,
};

fn optimistic_fcp_graph<'g>(graph: &'g DependencyGraph, extras: &FcpExtras) -> Cow<'g, DependencyGraph> {
    Cow::Owned(first_paint_based_graph(graph, extras.observed_fcp_ms, |request| {
        request.render_blocking && !request.script_initiated
    }))
}

fn pessimistic_fcp_graph<'g>(graph: &'g DependencyGraph, extras: &FcpExtras) -> Cow<'g, DependencyGraph> {
    Cow::Owned(first_paint_based_graph(graph, extras.observed_fcp_ms, |request| {
        request.render_blocking
    }))
}

fn derive_fcp_estimate(simulation: SimulationResult, _side: SimulationSide, _extras: &FcpExtras) -> MetricEstimate {
    MetricEstimate {
        time_in_ms: simulation.timing,
        node_timings: simulation.node_timings,
    }
}

/// Subgraph of the work that could have blocked a paint at `paint_ms`
pub fn first_paint_based_graph<F>(graph: &DependencyGraph, paint_ms: f64, blocking: F) -> DependencyGraph
where
    F: Fn(&NetworkRequest) -> bool,
{
    let blocking_scripts: HashSet<&str> = graph
        .nodes()
        .filter(|node| node.observed_end_by(paint_ms))
        .filter_map(|node| match &node.kind {
            NodeKind::Network(request) if request.resource_type == ResourceType::Script && blocking(request) => {
                Some(request.url.as_str())
            }
            _ => None,
        })
        .collect();

    graph.retain_with_dependencies(|node| match &node.kind {
        NodeKind::Network(request) => {
            request.main_document || (node.observed_end_by(paint_ms) && blocking(request))
        }
        NodeKind::Cpu(task) => {
            node.observed_end_by(paint_ms)
                && task.child_events.iter().any(|event| {
                    event.name == EVALUATE_SCRIPT_EVENT
                        && event
                            .url
                            .as_deref()
                            .map_or(false, |url| blocking_scripts.contains(url))
                })
        }
    })
}

/// FCP computed by simulating the pruned graphs
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedFcp;

#[async_trait]
impl FcpProvider for SimulatedFcp {
    async fn request(&self, trace: &TraceData, context: &MetricContext<'_>) -> Result<FinalMetricResult, MetricError> {
        let observed_fcp_ms = trace
            .observed
            .first_contentful_paint
            .ok_or_else(|| MetricError::MissingObservedMetric {
                trace_id: trace.id.clone(),
                metric: "first contentful paint",
            })?;

        let extras = FcpExtras { observed_fcp_ms };
        let result = estimate_with_strategy(&FIRST_CONTENTFUL_PAINT, &trace.graph, context, &extras);
        info!(
            "Trace '{}': estimated first contentful paint {:.0} ms",
            trace.id, result.timing
        );
        Ok(result)
    }
}
