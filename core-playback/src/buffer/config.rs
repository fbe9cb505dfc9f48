//! Buffer strategist configuration

use super::strategy::Aggressiveness;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Health percentages below which a track needs more data, per aggressiveness.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthThresholds {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

impl HealthThresholds {
    pub fn for_aggressiveness(&self, aggressiveness: Aggressiveness) -> f64 {
        match aggressiveness {
            Aggressiveness::Low => self.low,
            Aggressiveness::Medium => self.medium,
            Aggressiveness::High => self.high,
        }
    }
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            low: 20.0,
            medium: 40.0,
            high: 60.0,
        }
    }
}

/// Configuration for the buffer strategist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Added to every load-time estimate (default: 500ms).
    #[serde(default = "default_safety_margin")]
    pub safety_margin: Duration,

    /// Estimate returned when no downlink figure is known (default: 5s).
    #[serde(default = "default_load_estimate")]
    pub default_load_estimate: Duration,

    /// Runway below which playback is considered starved (default: 2s).
    #[serde(default = "default_starvation_threshold")]
    pub starvation_threshold: Duration,

    #[serde(default)]
    pub health_thresholds: HealthThresholds,
}

fn default_safety_margin() -> Duration {
    Duration::from_millis(500)
}

fn default_load_estimate() -> Duration {
    Duration::from_secs(5)
}

fn default_starvation_threshold() -> Duration {
    Duration::from_secs(2)
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            safety_margin: default_safety_margin(),
            default_load_estimate: default_load_estimate(),
            starvation_threshold: default_starvation_threshold(),
            health_thresholds: HealthThresholds::default(),
        }
    }
}

impl BufferConfig {
    pub fn with_safety_margin(mut self, margin: Duration) -> Self {
        self.safety_margin = margin;
        self
    }

    pub fn with_default_load_estimate(mut self, estimate: Duration) -> Self {
        self.default_load_estimate = estimate;
        self
    }

    pub fn with_health_thresholds(mut self, thresholds: HealthThresholds) -> Self {
        self.health_thresholds = thresholds;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        let HealthThresholds { low, medium, high } = self.health_thresholds;
        for value in [low, medium, high] {
            if !(0.0..=100.0).contains(&value) {
                return Err(format!(
                    "health thresholds must be within 0-100, got {}",
                    value
                ));
            }
        }

        if self.default_load_estimate.is_zero() {
            return Err("default_load_estimate must be greater than 0".to_string());
        }

        Ok(())
    }
}
