//! # Speedsim - Speed Index estimation from simulated page loads
//!
//! This library estimates the Speed Index of a page load without a real
//! browser run. It takes the dependency graph of network and main-thread work
//! extracted from one trace, simulates it under an optimistic and a
//! pessimistic throttling profile, and blends the two outcomes with a fixed
//! linear model.
//!
//! ## Overview
//!
//! Speed Index estimation needs two upstream results:
//!
//! - **Observed Speed Index** ("speedline"): measured from captured frames and
//!   stored in the trace file. It is used directly as the optimistic estimate.
//! - **First Contentful Paint**: estimated by simulation with the same
//!   optimistic/pessimistic procedure. Its pessimistic estimate is the floor
//!   of the final Speed Index and the fallback of the layout-weighted average.
//!
//! The pessimistic Speed Index estimate is a log-duration weighted average of
//! the simulated end times of CPU tasks that performed layout.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - `graph`: Work nodes and the immutable dependency graph
//! - `simulation`: Throttling profiles, node timings and the graph simulator
//! - `metrics`: Shared estimation procedure, Speed Index and FCP strategies,
//!   provider traits
//! - `cache`: Per-run memoization of provider results
//! - `trace`: Trace file loading and validation
//! - `config`: Simulation settings and validation
//! - `config_loader`: Settings file loading
//! - `report`: JSON and text reports
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use speedsim::cache::{CachedFcp, CachedSpeedline};
//! use speedsim::metrics::{MetricContext, ObservedSpeedline, SimulatedFcp, SpeedIndexEstimator};
//! use speedsim::simulation::ThroughputSimulator;
//! use speedsim::{config_loader, trace};
//!
//! let trace = trace::load_trace("trace.json".as_ref())?;
//! let settings = config_loader::load_settings_or_default(None)?;
//! let context = MetricContext::new(&settings, &ThroughputSimulator);
//!
//! let estimator = SpeedIndexEstimator::new(
//!     CachedSpeedline::new(ObservedSpeedline),
//!     CachedFcp::new(SimulatedFcp),
//! );
//! let result = futures::executor::block_on(estimator.compute(&trace, &context))?;
//! println!("Speed Index: {:.0} ms", result.timing);
//! # Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
//! ```
//!
//! ## Trace Format
//!
//! ```json
//! {
//!   "id": "example.com-run1",
//!   "observed": { "speedIndex": 1500.0, "firstContentfulPaint": 900.0 },
//!   "nodes": [
//!     { "id": "doc", "type": "network", "url": "https://example.com/",
//!       "resourceType": "document", "transferSize": 14000,
//!       "renderBlocking": true, "mainDocument": true,
//!       "observed": { "startMs": 0, "endMs": 320 } },
//!     { "id": "task-1", "type": "cpu", "durationMs": 12.5,
//!       "childEvents": [ { "name": "Layout" } ],
//!       "observed": { "startMs": 330, "endMs": 342 }, "dependencies": ["doc"] }
//!   ]
//! }
//! ```
//!
//! ## Settings Format
//!
//! ```yaml
//! name: mobile-slow4g
//! optimistic:
//!   rtt: 40ms
//!   throughput_kbps: 10240
//!   cpu_slowdown: 1
//! pessimistic:
//!   rtt: 150ms
//!   throughput_kbps: 1638.4
//!   cpu_slowdown: 4
//! ```
//!
//! ## Error Handling
//!
//! Metric computations return `Result<T, metrics::MetricError>`; upstream
//! failures propagate unchanged and no partial result is produced. File
//! loading and reporting helpers return `color_eyre::Result` with context.

pub mod cache;
pub mod config;
pub mod config_loader;
pub mod graph;
pub mod metrics;
pub mod report;
pub mod simulation;
pub mod trace;
