use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use crate::simulation::ThrottlingProfile;

/// Simulation settings that mirror the YAML settings file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSettings {
    /// Name of this settings preset, also part of the result cache key
    pub name: String,
    /// Favorable network/CPU assumptions
    pub optimistic: ThrottlingProfile,
    /// Unfavorable network/CPU assumptions
    pub pessimistic: ThrottlingProfile,
}

impl SimulationSettings {
    /// Validate the settings
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::InvalidName(
                "name cannot be empty".to_string(),
            ));
        }

        Self::validate_profile("optimistic", &self.optimistic)?;
        Self::validate_profile("pessimistic", &self.pessimistic)?;

        Ok(())
    }

    /// Hash of the name and both throttling profiles
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.name.hash(&mut hasher);
        for profile in [&self.optimistic, &self.pessimistic] {
            profile.rtt.hash(&mut hasher);
            profile.throughput_kbps.to_bits().hash(&mut hasher);
            profile.cpu_slowdown.to_bits().hash(&mut hasher);
        }
        hasher.finish()
    }

    fn validate_profile(side: &'static str, profile: &ThrottlingProfile) -> Result<(), ValidationError> {
        if !profile.throughput_kbps.is_finite() || profile.throughput_kbps <= 0.0 {
            return Err(ValidationError::InvalidProfile {
                side,
                message: format!("throughput_kbps must be positive, got {}", profile.throughput_kbps),
            });
        }

        if !profile.cpu_slowdown.is_finite() || profile.cpu_slowdown <= 0.0 {
            return Err(ValidationError::InvalidProfile {
                side,
                message: format!("cpu_slowdown must be positive, got {}", profile.cpu_slowdown),
            });
        }

        Ok(())
    }
}

/// Settings validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid settings name: {0}")]
    InvalidName(String),
    #[error("Invalid {side} profile: {message}")]
    InvalidProfile { side: &'static str, message: String },
}

/// Default implementation for SimulationSettings
impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            name: "mobile-slow4g".to_string(),
            optimistic: ThrottlingProfile {
                rtt: Duration::from_millis(40),
                throughput_kbps: 10240.0,
                cpu_slowdown: 1.0,
            },
            pessimistic: ThrottlingProfile {
                rtt: Duration::from_millis(150),
                throughput_kbps: 1638.4,
                cpu_slowdown: 4.0,
            },
        }
    }
}
