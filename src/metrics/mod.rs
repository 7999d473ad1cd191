//! Simulated metric estimation.
//!
//! This module provides the shared optimistic/pessimistic estimation
//! procedure, the Speed Index and First Contentful Paint strategies built on
//! it, and the provider traits the Speed Index estimator consults.

pub mod estimator;
pub mod first_contentful_paint;
pub mod providers;
pub mod speed_index;
pub mod types;

pub use estimator::{estimate_with_strategy, identity_graph, MetricContext, MetricStrategy};
pub use first_contentful_paint::{SimulatedFcp, FIRST_CONTENTFUL_PAINT};
pub use providers::{FcpProvider, ObservedSpeedline, SpeedlineProvider};
pub use speed_index::{layout_weighted_speed_index, SpeedIndexEstimator, SPEED_INDEX};
pub use types::*;
