//! Collaborators consulted by the Speed Index estimator.

use async_trait::async_trait;
use log::debug;

use super::estimator::MetricContext;
use super::types::{FinalMetricResult, MetricError, Speedline};
use crate::trace::TraceData;

/// Source of the observed Speed Index for a trace
#[async_trait]
pub trait SpeedlineProvider: Send + Sync {
    async fn request(&self, trace: &TraceData, context: &MetricContext<'_>) -> Result<Speedline, MetricError>;
}

/// Source of the First Contentful Paint estimate for a trace
#[async_trait]
pub trait FcpProvider: Send + Sync {
    async fn request(&self, trace: &TraceData, context: &MetricContext<'_>)
        -> Result<FinalMetricResult, MetricError>;
}

/// Reads the Speed Index recorded in the trace file
#[derive(Debug, Default, Clone, Copy)]
pub struct ObservedSpeedline;

#[async_trait]
impl SpeedlineProvider for ObservedSpeedline {
    async fn request(&self, trace: &TraceData, _context: &MetricContext<'_>) -> Result<Speedline, MetricError> {
        let speed_index = trace
            .observed
            .speed_index
            .ok_or_else(|| MetricError::MissingObservedMetric {
                trace_id: trace.id.clone(),
                metric: "speed index",
            })?;
        debug!("Trace '{}': observed speed index {:.1} ms", trace.id, speed_index);
        Ok(Speedline { speed_index })
    }
}
