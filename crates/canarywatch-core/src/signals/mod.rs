//! Risk signals and their weighting.
//!
//! Each collector produces a normalized value in \[0.0, 1.0\]; the entropy
//! engine combines them with fixed weights that must sum to exactly 1.0.
//! The weight partition is a configuration concern validated once at startup,
//! never re-checked per tick.

pub mod health;
pub mod status_map;

use serde::{Deserialize, Serialize};

use crate::error::{CanaryWatchError, Result};

/// Signal names as they appear in snapshot components and the weight table.
pub const SIGNAL_REPOSITORY_HEALTH: &str = "repository_health";
pub const SIGNAL_CANARY_STATUS: &str = "canary_status";
pub const SIGNAL_ACTIVITY: &str = "activity";
pub const SIGNAL_PROBE_LATENCY: &str = "probe_latency";

/// Tolerance for the weight-sum check. Weights are operator-supplied decimal
/// fractions; anything off by more than this is a configuration mistake.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// One collector's normalized contribution for a single tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSignal {
    pub name: String,
    /// Normalized risk in \[0.0, 1.0\], clamped at the collector boundary.
    pub value: f64,
    /// Fixed weight in (0.0, 1.0\].
    pub weight: f64,
}

impl RiskSignal {
    pub fn new(name: impl Into<String>, value: f64, weight: f64) -> Self {
        Self {
            name: name.into(),
            value: clamp_unit(value),
            weight,
        }
    }
}

/// The fixed weight partition over the four collected signals.
///
/// Repository health carries the heaviest weight: it is the leading
/// indicator of external distress. The partition is configurable but must
/// always sum to exactly 1.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SignalWeights {
    #[serde(default = "default_repository_health_weight")]
    pub repository_health: f64,
    #[serde(default = "default_canary_status_weight")]
    pub canary_status: f64,
    #[serde(default = "default_activity_weight")]
    pub activity: f64,
    #[serde(default = "default_probe_latency_weight")]
    pub probe_latency: f64,
}

fn default_repository_health_weight() -> f64 {
    0.45
}

fn default_canary_status_weight() -> f64 {
    0.20
}

fn default_activity_weight() -> f64 {
    0.15
}

fn default_probe_latency_weight() -> f64 {
    0.20
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            repository_health: default_repository_health_weight(),
            canary_status: default_canary_status_weight(),
            activity: default_activity_weight(),
            probe_latency: default_probe_latency_weight(),
        }
    }
}

impl SignalWeights {
    /// Validate the partition: every weight in (0, 1], sum exactly 1.0.
    /// A mismatched configuration is a fatal startup error, not a runtime one.
    pub fn validate(&self) -> Result<()> {
        for (name, weight) in [
            (SIGNAL_REPOSITORY_HEALTH, self.repository_health),
            (SIGNAL_CANARY_STATUS, self.canary_status),
            (SIGNAL_ACTIVITY, self.activity),
            (SIGNAL_PROBE_LATENCY, self.probe_latency),
        ] {
            if !weight.is_finite() || weight <= 0.0 || weight > 1.0 {
                return Err(CanaryWatchError::Configuration(format!(
                    "signal weight '{name}' must be in (0, 1], got {weight}"
                )));
            }
        }

        let sum = self.repository_health + self.canary_status + self.activity + self.probe_latency;
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(CanaryWatchError::Configuration(format!(
                "signal weights must sum to exactly 1.0, got {sum}"
            )));
        }
        Ok(())
    }
}

/// Clamp a signal value to \[0.0, 1.0\].
///
/// Non-finite input takes the fail-safe maximum: a collector that produces
/// NaN is broken, and an unknown state must never be scored as safe.
pub fn clamp_unit(value: f64) -> f64 {
    if !value.is_finite() {
        return 1.0;
    }
    value.clamp(0.0, 1.0)
}
