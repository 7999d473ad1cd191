//! Shared optimistic/pessimistic estimation procedure.
//!
//! Every simulated metric follows the same recipe:
//!
//! ```text
//! optimistic_graph  = select_optimistic_graph(graph)
//! pessimistic_graph = select_pessimistic_graph(graph)
//! optimistic  = derive_estimate(simulate(optimistic_graph,  optimistic profile))
//! pessimistic = derive_estimate(simulate(pessimistic_graph, pessimistic profile))
//! timing = intercept + a * optimistic + b * pessimistic
//! ```
//!
//! A metric plugs into this recipe by supplying a [`MetricStrategy`] record.

use std::borrow::Cow;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use log::debug;

use super::types::{FinalMetricResult, MetricCoefficients, MetricEstimate, SimulationSide};
use crate::cache::CacheKey;
use crate::config::SimulationSettings;
use crate::graph::DependencyGraph;
use crate::simulation::{SimulationResult, Simulator};
use crate::trace::TraceData;

/// Picks the graph simulated for one side
pub type GraphSelector<X> = for<'g> fn(&'g DependencyGraph, &X) -> Cow<'g, DependencyGraph>;

/// Turns one side's simulation into that side's estimate
pub type EstimateDeriver<X> = fn(SimulationResult, SimulationSide, &X) -> MetricEstimate;

/// Capability record describing one metric.
///
/// `X` is the extra per-computation input the metric needs (observed values,
/// results of other metrics).
pub struct MetricStrategy<X> {
    pub name: &'static str,
    pub coefficients: MetricCoefficients,
    pub select_optimistic_graph: GraphSelector<X>,
    pub select_pessimistic_graph: GraphSelector<X>,
    pub derive_estimate: EstimateDeriver<X>,
}

/// Everything a computation needs besides the trace itself
#[derive(Clone, Copy)]
pub struct MetricContext<'a> {
    pub settings: &'a SimulationSettings,
    pub simulator: &'a dyn Simulator,
}

impl<'a> MetricContext<'a> {
    pub fn new(settings: &'a SimulationSettings, simulator: &'a dyn Simulator) -> Self {
        Self { settings, simulator }
    }

    /// Key identifying results computed for `trace` in this context.
    ///
    /// Covers the trace content, every settings value and the simulator
    /// identity, not just the user-facing names.
    pub fn cache_key(&self, trace: &TraceData) -> CacheKey {
        let mut hasher = DefaultHasher::new();
        trace.fingerprint().hash(&mut hasher);
        self.settings.fingerprint().hash(&mut hasher);
        self.simulator.name().hash(&mut hasher);
        CacheKey::new(&trace.id, &self.settings.name, hasher.finish())
    }
}

/// Graph selector that simulates the full graph unchanged
pub fn identity_graph<'g, X>(graph: &'g DependencyGraph, _extras: &X) -> Cow<'g, DependencyGraph> {
    Cow::Borrowed(graph)
}

/// Run both simulations for `strategy` and blend them into one result
pub fn estimate_with_strategy<X>(
    strategy: &MetricStrategy<X>,
    graph: &DependencyGraph,
    context: &MetricContext<'_>,
    extras: &X,
) -> FinalMetricResult {
    let optimistic_graph = (strategy.select_optimistic_graph)(graph, extras);
    let pessimistic_graph = (strategy.select_pessimistic_graph)(graph, extras);
    debug!(
        "{}: simulating {} optimistic and {} pessimistic nodes",
        strategy.name,
        optimistic_graph.len(),
        pessimistic_graph.len()
    );

    let simulator = context.simulator;
    let settings = context.settings;
    let (optimistic_simulation, pessimistic_simulation) = rayon::join(
        || simulator.simulate(&optimistic_graph, &settings.optimistic),
        || simulator.simulate(&pessimistic_graph, &settings.pessimistic),
    );

    let optimistic_estimate =
        (strategy.derive_estimate)(optimistic_simulation, SimulationSide::Optimistic, extras);
    let pessimistic_estimate =
        (strategy.derive_estimate)(pessimistic_simulation, SimulationSide::Pessimistic, extras);

    let timing = strategy
        .coefficients
        .blend(optimistic_estimate.time_in_ms, pessimistic_estimate.time_in_ms);
    debug!(
        "{}: optimistic {:.1} ms, pessimistic {:.1} ms, blended {:.1} ms",
        strategy.name, optimistic_estimate.time_in_ms, pessimistic_estimate.time_in_ms, timing
    );

    FinalMetricResult {
        timing,
        optimistic_estimate,
        pessimistic_estimate,
    }
}
