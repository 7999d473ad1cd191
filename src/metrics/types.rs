//! Core data types shared by the metric estimators.

use std::path::PathBuf;

use serde::Serialize;

use crate::graph::GraphError;
use crate::simulation::NodeTimings;

/// Errors that abort a metric computation
#[derive(Debug, thiserror::Error)]
pub enum MetricError {
    #[error("Failed to read trace file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed trace: {0}")]
    TraceFormat(#[from] serde_json::Error),

    #[error("Invalid trace: {0}")]
    InvalidTrace(String),

    #[error("Invalid dependency graph: {0}")]
    Graph(#[from] GraphError),

    #[error("Trace '{trace_id}' has no observed {metric}")]
    MissingObservedMetric {
        trace_id: String,
        metric: &'static str,
    },
}

/// Which throughput assumption a simulation ran under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationSide {
    Optimistic,
    Pessimistic,
}

impl std::fmt::Display for SimulationSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimulationSide::Optimistic => write!(f, "optimistic"),
            SimulationSide::Pessimistic => write!(f, "pessimistic"),
        }
    }
}

/// Linear model mapping the two simulated bounds to one estimate
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricCoefficients {
    pub intercept: f64,
    pub optimistic: f64,
    pub pessimistic: f64,
}

impl MetricCoefficients {
    /// `intercept + optimistic * optimistic_ms + pessimistic * pessimistic_ms`
    pub fn blend(&self, optimistic_ms: f64, pessimistic_ms: f64) -> f64 {
        self.intercept + self.optimistic * optimistic_ms + self.pessimistic * pessimistic_ms
    }
}

/// Observed Speed Index from captured frames
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Speedline {
    pub speed_index: f64,
}

/// Point estimate for one simulation side
#[derive(Debug, Clone, Serialize)]
pub struct MetricEstimate {
    pub time_in_ms: f64,
    /// Carried through from the simulation for diagnostics
    pub node_timings: NodeTimings,
}

/// Blended estimate plus both per-side estimates
#[derive(Debug, Clone, Serialize)]
pub struct FinalMetricResult {
    pub timing: f64,
    pub optimistic_estimate: MetricEstimate,
    pub pessimistic_estimate: MetricEstimate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_applies_linear_model() {
        let coefficients = MetricCoefficients {
            intercept: -250.0,
            optimistic: 1.4,
            pessimistic: 0.65,
        };
        let timing = coefficients.blend(1500.0, 1800.0);
        assert!((timing - 3020.0).abs() < 1e-9);
    }

    #[test]
    fn test_blend_is_repeatable() {
        let coefficients = MetricCoefficients {
            intercept: 0.0,
            optimistic: 0.5,
            pessimistic: 0.5,
        };
        let first = coefficients.blend(812.25, 1433.5);
        let second = coefficients.blend(812.25, 1433.5);
        assert_eq!(first.to_bits(), second.to_bits());
        assert_eq!(first, 1122.875);
    }

    #[test]
    fn test_side_display() {
        assert_eq!(SimulationSide::Optimistic.to_string(), "optimistic");
        assert_eq!(SimulationSide::Pessimistic.to_string(), "pessimistic");
    }
}
