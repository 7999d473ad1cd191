use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::executor::block_on;
use tempfile::NamedTempFile;

use speedsim::cache::{CachedFcp, CachedSpeedline};
use speedsim::config::SimulationSettings;
use speedsim::graph::{
    ChildEvent, CpuTask, DependencyGraph, NetworkRequest, ResourceType, WorkNode, LAYOUT_EVENT,
};
use speedsim::metrics::{
    FcpProvider, FinalMetricResult, MetricContext, MetricError, MetricEstimate, ObservedSpeedline,
    SimulatedFcp, Speedline, SpeedIndexEstimator, SpeedlineProvider,
};
use speedsim::simulation::{
    NodeTiming, NodeTimings, SimulationResult, Simulator, ThrottlingProfile, ThroughputSimulator,
};
use speedsim::trace::{load_trace, ObservedMetrics, TraceData};

/// Simulator returning fixed timings per node id, regardless of profile
struct FixedSimulator {
    timings: HashMap<String, NodeTiming>,
}

impl FixedSimulator {
    fn new(entries: &[(&str, f64, f64)]) -> Self {
        let timings = entries
            .iter()
            .map(|(id, start, end)| (id.to_string(), NodeTiming::new(*start, *end)))
            .collect();
        Self { timings }
    }
}

impl Simulator for FixedSimulator {
    fn simulate(&self, graph: &DependencyGraph, _profile: &ThrottlingProfile) -> SimulationResult {
        let mut node_timings = NodeTimings::new();
        for node in graph.nodes() {
            let timing = self.timings.get(&node.id).copied().unwrap_or(NodeTiming::new(0.0, 0.0));
            node_timings.insert(Arc::clone(node), timing);
        }
        SimulationResult::new(node_timings)
    }
}

struct FixedSpeedline {
    speed_index: f64,
    calls: AtomicUsize,
}

impl FixedSpeedline {
    fn new(speed_index: f64) -> Self {
        Self {
            speed_index,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SpeedlineProvider for FixedSpeedline {
    async fn request(&self, _trace: &TraceData, _context: &MetricContext<'_>) -> Result<Speedline, MetricError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Speedline {
            speed_index: self.speed_index,
        })
    }
}

struct FixedFcp {
    pessimistic_ms: f64,
}

#[async_trait]
impl FcpProvider for FixedFcp {
    async fn request(&self, _trace: &TraceData, _context: &MetricContext<'_>)
        -> Result<FinalMetricResult, MetricError>
    {
        Ok(FinalMetricResult {
            timing: self.pessimistic_ms,
            optimistic_estimate: MetricEstimate {
                time_in_ms: self.pessimistic_ms,
                node_timings: NodeTimings::new(),
            },
            pessimistic_estimate: MetricEstimate {
                time_in_ms: self.pessimistic_ms,
                node_timings: NodeTimings::new(),
            },
        })
    }
}

struct FailingFcp;

#[async_trait]
impl FcpProvider for FailingFcp {
    async fn request(&self, trace: &TraceData, _context: &MetricContext<'_>)
        -> Result<FinalMetricResult, MetricError>
    {
        Err(MetricError::InvalidTrace(format!("no paint events in {}", trace.id)))
    }
}

fn layout_trace() -> TraceData {
    let graph = DependencyGraph::new(vec![WorkNode::cpu(
        "layout",
        CpuTask::new(8.0, vec![ChildEvent::new(LAYOUT_EVENT)]),
    )])
    .unwrap();
    TraceData::new("layout-trace", ObservedMetrics::default(), graph)
}

#[test]
fn test_blended_speed_index_example() {
    // pessimistic layout-weighted estimate: single task ending at 1800
    let settings = SimulationSettings::default();
    let simulator = FixedSimulator::new(&[("layout", 1792.0, 1800.0)]);
    let context = MetricContext::new(&settings, &simulator);
    let estimator = SpeedIndexEstimator::new(FixedSpeedline::new(1500.0), FixedFcp { pessimistic_ms: 1000.0 });

    let result = block_on(estimator.compute(&layout_trace(), &context)).unwrap();

    assert_eq!(result.optimistic_estimate.time_in_ms, 1500.0);
    assert_eq!(result.pessimistic_estimate.time_in_ms, 1800.0);
    assert!((result.timing - 3020.0).abs() < 1e-9);
    assert_eq!(result.pessimistic_estimate.node_timings.len(), 1);
    assert_eq!(result.optimistic_estimate.node_timings.len(), 1);
}

#[test]
fn test_speed_index_never_precedes_pessimistic_fcp() {
    let settings = SimulationSettings::default();
    let simulator = FixedSimulator::new(&[("layout", 100.0, 108.0)]);
    let context = MetricContext::new(&settings, &simulator);
    let estimator = SpeedIndexEstimator::new(FixedSpeedline::new(100.0), FixedFcp { pessimistic_ms: 2000.0 });

    let result = block_on(estimator.compute(&layout_trace(), &context)).unwrap();

    // the only layout task ends at 108, so its end time is raised to FCP
    // inside the weighted average; blended -250 + 140 + 1300 = 1190 is then
    // raised to FCP as well
    assert_eq!(result.pessimistic_estimate.time_in_ms, 2000.0);
    assert_eq!(result.timing, 2000.0);
}

#[test]
fn test_zero_duration_layout_does_not_produce_nan() {
    let settings = SimulationSettings::default();
    let simulator = FixedSimulator::new(&[("layout", 1500.0, 1500.0)]);
    let context = MetricContext::new(&settings, &simulator);
    let estimator = SpeedIndexEstimator::new(FixedSpeedline::new(1500.0), FixedFcp { pessimistic_ms: 1200.0 });

    let result = block_on(estimator.compute(&layout_trace(), &context)).unwrap();

    assert_eq!(result.pessimistic_estimate.time_in_ms, 1200.0);
    assert!(result.timing.is_finite());
    assert!((result.timing - (-250.0 + 1.4 * 1500.0 + 0.65 * 1200.0)).abs() < 1e-9);
}

#[test]
fn test_upstream_failure_aborts_computation() {
    let settings = SimulationSettings::default();
    let context = MetricContext::new(&settings, &ThroughputSimulator);
    let estimator = SpeedIndexEstimator::new(FixedSpeedline::new(1500.0), FailingFcp);

    let err = block_on(estimator.compute(&layout_trace(), &context)).unwrap_err();
    assert!(matches!(err, MetricError::InvalidTrace(message) if message.contains("layout-trace")));
}

#[test]
fn test_missing_observed_speed_index_aborts_computation() {
    let settings = SimulationSettings::default();
    let context = MetricContext::new(&settings, &ThroughputSimulator);
    let estimator = SpeedIndexEstimator::new(ObservedSpeedline, FixedFcp { pessimistic_ms: 900.0 });

    let err = block_on(estimator.compute(&layout_trace(), &context)).unwrap_err();
    assert!(matches!(err, MetricError::MissingObservedMetric { .. }));
}

#[test]
fn test_cached_providers_compute_once_per_run() {
    let settings = SimulationSettings::default();
    let simulator = FixedSimulator::new(&[("layout", 1792.0, 1800.0)]);
    let context = MetricContext::new(&settings, &simulator);
    let speedline = CachedSpeedline::new(FixedSpeedline::new(1500.0));
    let estimator = SpeedIndexEstimator::new(speedline, CachedFcp::new(FixedFcp { pessimistic_ms: 1000.0 }));
    let trace = layout_trace();

    let first = block_on(estimator.compute(&trace, &context)).unwrap();
    let second = block_on(estimator.compute(&trace, &context)).unwrap();

    assert_eq!(first.timing, second.timing);
    assert_eq!(estimator.speedline_provider().cache().misses(), 1);
    assert_eq!(estimator.speedline_provider().cache().hits(), 1);
    assert_eq!(estimator.fcp_provider().cache().hits(), 1);
}

#[test]
fn test_cached_speedline_counts_hits() {
    let settings = SimulationSettings::default();
    let context = MetricContext::new(&settings, &ThroughputSimulator);
    let speedline = CachedSpeedline::new(FixedSpeedline::new(1500.0));
    let trace = layout_trace();

    block_on(speedline.request(&trace, &context)).unwrap();
    block_on(speedline.request(&trace, &context)).unwrap();

    let other_settings = SimulationSettings {
        name: "desktop".to_string(),
        ..SimulationSettings::default()
    };
    let other_context = MetricContext::new(&other_settings, &ThroughputSimulator);
    block_on(speedline.request(&trace, &other_context)).unwrap();

    assert_eq!(speedline.cache().hits(), 1);
    assert_eq!(speedline.cache().misses(), 2);
    assert_eq!(speedline.cache().len(), 2);
}

fn document_only_trace(id: &str, transfer_size: u64) -> TraceData {
    let mut request = NetworkRequest::new("https://example.com/", ResourceType::Document, transfer_size);
    request.render_blocking = true;
    request.main_document = true;
    let graph = DependencyGraph::new(vec![WorkNode::network("doc", request).with_observed(0.0, 320.0)]).unwrap();
    let observed = ObservedMetrics {
        speed_index: Some(1000.0),
        first_contentful_paint: Some(400.0),
    };
    TraceData::new(id, observed, graph)
}

#[test]
fn test_cached_fcp_separates_same_named_settings() {
    let trace = document_only_trace("doc-only", 14000);
    let fast = SimulationSettings::default();
    let mut slow = fast.clone();
    slow.optimistic.throughput_kbps = 100.0;
    slow.pessimistic.throughput_kbps = 100.0;
    assert_eq!(fast.name, slow.name);

    let fcp = CachedFcp::new(SimulatedFcp);
    let fast_context = MetricContext::new(&fast, &ThroughputSimulator);
    let slow_context = MetricContext::new(&slow, &ThroughputSimulator);
    let fast_result = block_on(fcp.request(&trace, &fast_context)).unwrap();
    let slow_result = block_on(fcp.request(&trace, &slow_context)).unwrap();
    let slow_direct = block_on(SimulatedFcp.request(&trace, &slow_context)).unwrap();

    assert_eq!(fcp.cache().misses(), 2);
    assert_eq!(fcp.cache().hits(), 0);
    assert_eq!(slow_result.timing, slow_direct.timing);
    assert!(slow_result.timing > fast_result.timing);
}

#[test]
fn test_cached_fcp_separates_traces_sharing_an_id() {
    let small = document_only_trace("page", 14000);
    let large = document_only_trace("page", 140000);
    let settings = SimulationSettings::default();
    let context = MetricContext::new(&settings, &ThroughputSimulator);
    let fcp = CachedFcp::new(SimulatedFcp);

    let small_result = block_on(fcp.request(&small, &context)).unwrap();
    let large_result = block_on(fcp.request(&large, &context)).unwrap();

    assert_eq!(fcp.cache().misses(), 2);
    assert!(large_result.timing > small_result.timing);
}

#[test]
fn test_cached_fcp_separates_simulators() {
    let trace = document_only_trace("doc-only", 14000);
    let settings = SimulationSettings::default();
    let fixed = FixedSimulator::new(&[("doc", 0.0, 5000.0)]);
    let fcp = CachedFcp::new(SimulatedFcp);

    let simulated = block_on(fcp.request(&trace, &MetricContext::new(&settings, &ThroughputSimulator))).unwrap();
    let fixed_result = block_on(fcp.request(&trace, &MetricContext::new(&settings, &fixed))).unwrap();

    assert_eq!(fcp.cache().misses(), 2);
    assert_eq!(fixed_result.timing, 5000.0);
    assert!(simulated.timing < 5000.0);
}

const PAGE_TRACE: &str = r#"{
    "id": "example.com-run1",
    "observed": {"speedIndex": 1500.0, "firstContentfulPaint": 900.0},
    "nodes": [
        {"id": "doc", "type": "network", "url": "https://example.com/",
         "resourceType": "document", "transferSize": 14000,
         "renderBlocking": true, "mainDocument": true,
         "observed": {"startMs": 0, "endMs": 320}},
        {"id": "style", "type": "network", "url": "https://example.com/style.css",
         "resourceType": "stylesheet", "transferSize": 8000, "renderBlocking": true,
         "observed": {"startMs": 330, "endMs": 500}, "dependencies": ["doc"]},
        {"id": "app", "type": "network", "url": "https://example.com/app.js",
         "resourceType": "script", "transferSize": 60000, "renderBlocking": true,
         "observed": {"startMs": 330, "endMs": 700}, "dependencies": ["doc"]},
        {"id": "parse", "type": "cpu", "durationMs": 12,
         "childEvents": [{"name": "ParseHTML"}, {"name": "Layout"}],
         "observed": {"startMs": 320, "endMs": 332}, "dependencies": ["doc"]},
        {"id": "eval-app", "type": "cpu", "durationMs": 45,
         "childEvents": [{"name": "EvaluateScript", "url": "https://example.com/app.js"}],
         "observed": {"startMs": 700, "endMs": 745}, "dependencies": ["app"]},
        {"id": "hero", "type": "network", "url": "https://example.com/hero.jpg",
         "resourceType": "image", "transferSize": 120000,
         "observed": {"startMs": 750, "endMs": 1400}, "dependencies": ["eval-app"]},
        {"id": "render", "type": "cpu", "durationMs": 30,
         "childEvents": [{"name": "Layout"}, {"name": "Paint"}],
         "observed": {"startMs": 1400, "endMs": 1430}, "dependencies": ["hero", "style"]}
    ]
}"#;

#[test]
fn test_end_to_end_from_trace_file() {
    let mut temp_file = NamedTempFile::new().unwrap();
    write!(temp_file, "{}", PAGE_TRACE).unwrap();
    let trace = load_trace(temp_file.path()).unwrap();

    let settings = SimulationSettings::default();
    let context = MetricContext::new(&settings, &ThroughputSimulator);
    let fcp = block_on(SimulatedFcp.request(&trace, &context)).unwrap();

    let estimator = SpeedIndexEstimator::new(CachedSpeedline::new(ObservedSpeedline), CachedFcp::new(SimulatedFcp));
    let result = block_on(estimator.compute(&trace, &context)).unwrap();

    // FCP only simulates work that could block the first paint
    assert!(fcp.pessimistic_estimate.node_timings.get("hero").is_none());
    assert!(fcp.pessimistic_estimate.node_timings.get("eval-app").is_some());

    // Speed Index simulates the full graph on both sides
    assert_eq!(result.optimistic_estimate.time_in_ms, 1500.0);
    assert_eq!(result.pessimistic_estimate.node_timings.len(), trace.graph.len());
    assert!(result.pessimistic_estimate.time_in_ms >= fcp.pessimistic_estimate.time_in_ms);
    assert!(result.timing >= fcp.pessimistic_estimate.time_in_ms);

    let latest_layout_end = ["parse", "render"]
        .iter()
        .filter_map(|id| result.pessimistic_estimate.node_timings.get(id))
        .map(|timing| timing.end_time)
        .fold(fcp.pessimistic_estimate.time_in_ms, f64::max);
    assert!(result.pessimistic_estimate.time_in_ms <= latest_layout_end);

    let expected = -250.0 + 1.4 * 1500.0 + 0.65 * result.pessimistic_estimate.time_in_ms;
    assert!((result.timing - expected.max(fcp.pessimistic_estimate.time_in_ms)).abs() < 1e-9);
}
