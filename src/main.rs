use clap::{Parser, ValueEnum};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use futures::executor::block_on;
use log::info;
use std::fs;
use std::path::PathBuf;

use speedsim::cache::{CachedFcp, CachedSpeedline};
use speedsim::metrics::{FcpProvider, MetricContext, ObservedSpeedline, SimulatedFcp, SpeedIndexEstimator};
use speedsim::report::{generate_json_report, generate_text_report, MetricReport};
use speedsim::simulation::ThroughputSimulator;
use speedsim::{config_loader, trace};

/// Estimate page-load metrics from a simulated dependency graph
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the trace JSON file
    #[arg(short, long)]
    trace: PathBuf,

    /// Path to the simulation settings YAML file (built-in preset when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory for reports
    #[arg(short, long, default_value = "speedsim_output")]
    output: PathBuf,

    /// Metric to estimate
    #[arg(short, long, value_enum, default_value_t = Metric::SpeedIndex)]
    metric: Metric,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Metric {
    SpeedIndex,
    FirstContentfulPaint,
}

impl Metric {
    fn name(self) -> &'static str {
        match self {
            Metric::SpeedIndex => "speed-index",
            Metric::FirstContentfulPaint => "first-contentful-paint",
        }
    }
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let args = Args::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or(&args.log_level)).init();

    info!("Starting speedsim");
    info!("Trace file: {:?}", args.trace);
    info!("Output directory: {:?}", args.output);

    let trace = trace::load_trace(&args.trace)
        .wrap_err_with(|| format!("Failed to load trace '{}'", args.trace.display()))?;
    let settings = config_loader::load_settings_or_default(args.config.as_deref())?;

    let simulator = ThroughputSimulator;
    let context = MetricContext::new(&settings, &simulator);
    let fcp = CachedFcp::new(SimulatedFcp);

    let result = match args.metric {
        Metric::SpeedIndex => {
            let estimator = SpeedIndexEstimator::new(CachedSpeedline::new(ObservedSpeedline), fcp);
            block_on(estimator.compute(&trace, &context))
        }
        Metric::FirstContentfulPaint => block_on(fcp.request(&trace, &context)),
    }
    .wrap_err_with(|| format!("Failed to estimate {} for trace '{}'", args.metric.name(), trace.id))?;

    fs::create_dir_all(&args.output)
        .wrap_err_with(|| format!("Failed to create output directory '{}'", args.output.display()))?;

    let report = MetricReport::new(args.metric.name(), &trace, &settings, result);
    generate_json_report(&report, &args.output.join("report.json"))?;
    generate_text_report(&report, &args.output.join("report.txt"))?;

    info!(
        "Estimated {}: {:.0} ms (optimistic {:.0} ms, pessimistic {:.0} ms)",
        args.metric.name(),
        report.result.timing,
        report.result.optimistic_estimate.time_in_ms,
        report.result.pessimistic_estimate.time_in_ms
    );
    Ok(())
}
