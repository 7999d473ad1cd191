//! Speed Index estimation.
//!
//! Both sides simulate the full, unpruned graph. The optimistic estimate is
//! the Speed Index observed in the trace; the pessimistic estimate is a
//! layout-weighted average of simulated CPU task end times:
//!
//! ```text
//! weight_i = max(log2(end_i - start_i), 0)      for CPU tasks that ran Layout
//! estimate = Σ weight_i * max(end_i, fcp) / Σ weight_i
//! ```
//!
//! The final timing is never earlier than the pessimistic FCP estimate.

use log::{debug, info};

use super::estimator::{estimate_with_strategy, identity_graph, MetricContext, MetricStrategy};
use super::providers::{FcpProvider, SpeedlineProvider};
use super::types::{FinalMetricResult, MetricCoefficients, MetricError, MetricEstimate, SimulationSide, Speedline};
use crate::simulation::{NodeTimings, SimulationResult};
use crate::trace::TraceData;

pub const SPEED_INDEX_COEFFICIENTS: MetricCoefficients = MetricCoefficients {
    intercept: -250.0,
    optimistic: 1.4,
    pessimistic: 0.65,
};

/// Inputs gathered before Speed Index can be blended
#[derive(Debug, Clone)]
pub struct SpeedIndexExtras {
    pub speedline: Speedline,
    pub fcp: FinalMetricResult,
}

pub const SPEED_INDEX: MetricStrategy<SpeedIndexExtras> = MetricStrategy {
    name: "speed-index",
    coefficients: SPEED_INDEX_COEFFICIENTS,
    select_optimistic_graph: identity_graph::<SpeedIndexExtras>,
    select_pessimistic_graph: identity_graph::<SpeedIndexExtras>,
    derive_estimate: derive_speed_index_estimate,
};

/// Time/weight pair contributed by one layout-bearing task
#[derive(Debug, Clone, Copy, PartialEq)]
struct LayoutWeight {
    time: f64,
    weight: f64,
}

fn derive_speed_index_estimate(
    simulation: SimulationResult,
    side: SimulationSide,
    extras: &SpeedIndexExtras,
) -> MetricEstimate {
    let time_in_ms = match side {
        SimulationSide::Optimistic => extras.speedline.speed_index,
        SimulationSide::Pessimistic => layout_weighted_speed_index(
            &simulation.node_timings,
            extras.fcp.pessimistic_estimate.time_in_ms,
        ),
    };

    MetricEstimate {
        time_in_ms,
        node_timings: simulation.node_timings,
    }
}

/// Influence of a layout-bearing task of the given duration.
///
/// Tasks shorter than 1 ms get zero weight.
pub fn layout_weight(duration_ms: f64) -> f64 {
    duration_ms.log2().max(0.0)
}

/// Approximate Speed Index from simulated timings alone.
///
/// Falls back to `fcp_time_in_ms` when no CPU task performed layout or when
/// every layout task had zero weight.
pub fn layout_weighted_speed_index(node_timings: &NodeTimings, fcp_time_in_ms: f64) -> f64 {
    let layout_weights: Vec<LayoutWeight> = node_timings
        .iter()
        .filter(|entry| entry.node.is_cpu() && entry.node.did_perform_layout())
        .map(|entry| LayoutWeight {
            time: entry.timing.end_time.max(fcp_time_in_ms),
            weight: layout_weight(entry.timing.duration()),
        })
        .collect();

    if layout_weights.is_empty() {
        debug!("No layout tasks in simulation, falling back to FCP");
        return fcp_time_in_ms;
    }

    let total_weight: f64 = layout_weights.iter().map(|lw| lw.weight).sum();
    if total_weight <= 0.0 {
        debug!(
            "All {} layout tasks are shorter than 1 ms, falling back to FCP",
            layout_weights.len()
        );
        return fcp_time_in_ms;
    }

    let weighted_time: f64 = layout_weights.iter().map(|lw| lw.weight * lw.time).sum();
    weighted_time / total_weight
}

/// Speed Index estimator wired to its two upstream providers
pub struct SpeedIndexEstimator<S, F> {
    speedline: S,
    fcp: F,
}

impl<S: SpeedlineProvider, F: FcpProvider> SpeedIndexEstimator<S, F> {
    pub fn new(speedline: S, fcp: F) -> Self {
        Self { speedline, fcp }
    }

    pub fn speedline_provider(&self) -> &S {
        &self.speedline
    }

    pub fn fcp_provider(&self) -> &F {
        &self.fcp
    }

    /// Estimate Speed Index for `trace`.
    ///
    /// The observed Speed Index and the FCP estimate are fetched
    /// concurrently; a failure in either aborts the computation.
    pub async fn compute(&self, trace: &TraceData, context: &MetricContext<'_>) -> Result<FinalMetricResult, MetricError> {
        let (speedline, fcp) = futures::try_join!(
            self.speedline.request(trace, context),
            self.fcp.request(trace, context),
        )?;

        let fcp_pessimistic_ms = fcp.pessimistic_estimate.time_in_ms;
        let extras = SpeedIndexExtras { speedline, fcp };
        let mut result = estimate_with_strategy(&SPEED_INDEX, &trace.graph, context, &extras);

        if result.timing < fcp_pessimistic_ms {
            debug!(
                "Blended speed index {:.1} ms is earlier than pessimistic FCP {:.1} ms, clamping",
                result.timing, fcp_pessimistic_ms
            );
            result.timing = fcp_pessimistic_ms;
        }

        info!("Trace '{}': estimated speed index {:.0} ms", trace.id, result.timing);
        Ok(result)
    }
}
