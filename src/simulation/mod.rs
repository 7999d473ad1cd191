//! Graph simulation: turns a dependency graph and a throttling profile into
//! per-node start/end times.

pub mod simulator;
pub mod types;

pub use simulator::{Simulator, ThroughputSimulator};
pub use types::*;
