//! Report generation for metric estimates.
//!
//! Generates both JSON and human-readable text reports.

use std::fs;
use std::path::Path;

use color_eyre::eyre::{Context, Result};
use serde::Serialize;

use crate::config::SimulationSettings;
use crate::metrics::{FinalMetricResult, MetricEstimate};
use crate::trace::TraceData;

/// Report metadata
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub analysis_timestamp: String,
    pub trace_id: String,
    pub metric: String,
    pub total_nodes: usize,
}

/// Full report for one metric computation
#[derive(Debug, Clone, Serialize)]
pub struct MetricReport {
    pub metadata: ReportMetadata,
    pub settings: SimulationSettings,
    pub observed_speed_index: Option<f64>,
    pub observed_first_contentful_paint: Option<f64>,
    pub result: FinalMetricResult,
}

impl MetricReport {
    pub fn new(metric: &str, trace: &TraceData, settings: &SimulationSettings, result: FinalMetricResult) -> Self {
        Self {
            metadata: ReportMetadata {
                analysis_timestamp: chrono::Utc::now().to_rfc3339(),
                trace_id: trace.id.clone(),
                metric: metric.to_string(),
                total_nodes: trace.graph.len(),
            },
            settings: settings.clone(),
            observed_speed_index: trace.observed.speed_index,
            observed_first_contentful_paint: trace.observed.first_contentful_paint,
            result,
        }
    }
}

/// Generate JSON report
pub fn generate_json_report(report: &MetricReport, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)
        .context("Failed to serialize report to JSON")?;

    fs::write(output_path, json)
        .with_context(|| format!("Failed to write JSON report to {}", output_path.display()))?;

    log::info!("JSON report written to {}", output_path.display());
    Ok(())
}

/// Generate human-readable text report
pub fn generate_text_report(report: &MetricReport, output_path: &Path) -> Result<()> {
    let text = render_text_report(report);

    fs::write(output_path, text)
        .with_context(|| format!("Failed to write text report to {}", output_path.display()))?;

    log::info!("Text report written to {}", output_path.display());
    Ok(())
}

/// Render the text report without writing it
pub fn render_text_report(report: &MetricReport) -> String {
    let mut lines: Vec<String> = Vec::new();

    // Header
    lines.push("=".repeat(80));
    lines.push("                      SPEEDSIM METRIC ESTIMATE".to_string());
    lines.push("=".repeat(80));
    lines.push(String::new());

    // Metadata
    lines.push(format!("Analysis Date: {}", report.metadata.analysis_timestamp));
    lines.push(format!("Trace: {}", report.metadata.trace_id));
    lines.push(format!("Metric: {}", report.metadata.metric));
    lines.push(format!("Graph Nodes: {}", report.metadata.total_nodes));
    lines.push(format!("Settings Preset: {}", report.settings.name));
    lines.push(String::new());

    lines.push("Throttling:".to_string());
    for (label, profile) in [
        ("optimistic", &report.settings.optimistic),
        ("pessimistic", &report.settings.pessimistic),
    ] {
        lines.push(format!(
            "  {:<12} rtt {:>6.0} ms, {:>8.1} kbps, {:.1}x cpu",
            label,
            profile.rtt_ms(),
            profile.throughput_kbps,
            profile.cpu_slowdown
        ));
    }
    lines.push(String::new());

    lines.push("Observed:".to_string());
    lines.push(format!("  Speed Index:              {}", format_ms(report.observed_speed_index)));
    lines.push(format!(
        "  First Contentful Paint:   {}",
        format_ms(report.observed_first_contentful_paint)
    ));
    lines.push(String::new());

    lines.push("=".repeat(80));
    lines.push("                               ESTIMATE".to_string());
    lines.push("=".repeat(80));
    lines.push(String::new());

    lines.push(format!("Estimated {}: {:.0} ms", report.metadata.metric, report.result.timing));
    lines.push(String::new());
    push_estimate(&mut lines, "Optimistic", &report.result.optimistic_estimate);
    push_estimate(&mut lines, "Pessimistic", &report.result.pessimistic_estimate);

    lines.push("=".repeat(80));
    lines.join("\n")
}

fn push_estimate(lines: &mut Vec<String>, label: &str, estimate: &MetricEstimate) {
    lines.push(format!(
        "{} estimate: {:.0} ms ({} simulated nodes)",
        label,
        estimate.time_in_ms,
        estimate.node_timings.len()
    ));

    let mut slowest: Vec<_> = estimate.node_timings.iter().collect();
    slowest.sort_by(|a, b| b.timing.duration().total_cmp(&a.timing.duration()));
    for (i, entry) in slowest.iter().take(5).enumerate() {
        lines.push(format!(
            "  {}. {} [{}]: {:.1} -> {:.1} ms",
            i + 1,
            entry.node.id,
            entry.node.kind_label(),
            entry.timing.start_time,
            entry.timing.end_time
        ));
    }
    lines.push(String::new());
}

fn format_ms(value: Option<f64>) -> String {
    match value {
        Some(ms) => format!("{:.0} ms", ms),
        None => "n/a".to_string(),
    }
}
