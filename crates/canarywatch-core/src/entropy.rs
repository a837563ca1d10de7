//! Composite entropy engine.
//!
//! Combines the normalized risk signals into one bounded composite score,
//! classifies it into a discrete chaos level, and evaluates the trigger
//! predicate. The engine owns no persistent state: it is a pure function
//! plus a classification table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use crate::signals::{clamp_unit, RiskSignal};

/// Discrete alert levels over the composite score.
///
/// Five contiguous, non-overlapping, half-open bins partitioning \[0, 1\];
/// the top bin is closed on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChaosLevel {
    /// \[0.0, 0.2)
    Stable,
    /// \[0.2, 0.4)
    LowChaos,
    /// \[0.4, 0.6)
    ModerateChaos,
    /// \[0.6, 0.8)
    HighChaos,
    /// \[0.8, 1.0\]
    CriticalChaos,
}

impl std::fmt::Display for ChaosLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ChaosLevel::Stable => "STABLE",
            ChaosLevel::LowChaos => "LOW_CHAOS",
            ChaosLevel::ModerateChaos => "MODERATE_CHAOS",
            ChaosLevel::HighChaos => "HIGH_CHAOS",
            ChaosLevel::CriticalChaos => "CRITICAL_CHAOS",
        };
        f.write_str(label)
    }
}

/// Immutable record of one scoring cycle. Produced once per tick, consumed
/// by the escalation channel and the snapshot log; never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntropySnapshot {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub components: Vec<RiskSignal>,
    pub composite: f64,
    pub level: ChaosLevel,
    pub triggered: bool,
}

/// Weighted combination of the signals, each value clamped before weighting
/// so a misbehaving collector cannot push the composite out of range.
///
/// With weights summing to 1 and clamped values ≤ 1, the composite is in
/// \[0, 1\] by construction. If that invariant is ever breached it is a
/// programming defect: fail safe by substituting the maximum score.
pub fn calculate_entropy(signals: &[RiskSignal]) -> f64 {
    let composite: f64 = signals
        .iter()
        .map(|s| clamp_unit(s.value) * s.weight)
        .sum();

    if !composite.is_finite() || !(0.0..=1.0).contains(&composite) {
        error!(
            composite,
            "composite score escaped [0, 1]; substituting maximum risk"
        );
        return 1.0;
    }
    composite
}

/// Classify a composite score into its chaos level.
pub fn classify_level(composite: f64) -> ChaosLevel {
    if composite < 0.2 {
        ChaosLevel::Stable
    } else if composite < 0.4 {
        ChaosLevel::LowChaos
    } else if composite < 0.6 {
        ChaosLevel::ModerateChaos
    } else if composite < 0.8 {
        ChaosLevel::HighChaos
    } else {
        ChaosLevel::CriticalChaos
    }
}

/// Trigger predicate: inclusive equality triggers. The threshold is
/// caller-supplied per invocation so deployments tune sensitivity without
/// code changes.
pub fn should_trigger(composite: f64, threshold: f64) -> bool {
    composite >= threshold
}

/// Run one full scoring cycle over the collected signals.
pub fn build_snapshot(components: Vec<RiskSignal>, threshold: f64) -> EntropySnapshot {
    let composite = calculate_entropy(&components);
    EntropySnapshot {
        id: Uuid::new_v4(),
        timestamp: Utc::now(),
        composite,
        level: classify_level(composite),
        triggered: should_trigger(composite, threshold),
        components,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_signals(value: f64) -> Vec<RiskSignal> {
        vec![
            RiskSignal::new("a", value, 0.45),
            RiskSignal::new("b", value, 0.20),
            RiskSignal::new("c", value, 0.15),
            RiskSignal::new("d", value, 0.20),
        ]
    }

    #[test]
    fn all_zero_signals_score_exactly_zero() {
        assert_eq!(calculate_entropy(&uniform_signals(0.0)), 0.0);
    }

    #[test]
    fn all_one_signals_score_exactly_one() {
        assert_eq!(calculate_entropy(&uniform_signals(1.0)), 1.0);
    }

    #[test]
    fn weighted_isolation() {
        // Exactly one signal at 1.0 yields that signal's weight.
        for (hot, expected) in [(0usize, 0.45), (1, 0.20), (2, 0.15), (3, 0.20)] {
            let mut signals = uniform_signals(0.0);
            signals[hot].value = 1.0;
            assert_eq!(calculate_entropy(&signals), expected);
        }
    }

    #[test]
    fn out_of_range_values_are_clamped_before_weighting() {
        let signals = vec![
            RiskSignal {
                name: "wild".to_string(),
                value: 5.0,
                weight: 0.5,
            },
            RiskSignal {
                name: "negative".to_string(),
                value: -2.0,
                weight: 0.5,
            },
        ];
        // value=5 behaves as value=1, value=-2 behaves as 0.
        assert_eq!(calculate_entropy(&signals), 0.5);
    }

    #[test]
    fn composite_never_exceeds_one_with_hostile_inputs() {
        let signals = vec![
            RiskSignal {
                name: "a".to_string(),
                value: f64::INFINITY,
                weight: 0.5,
            },
            RiskSignal {
                name: "b".to_string(),
                value: 100.0,
                weight: 0.5,
            },
        ];
        let composite = calculate_entropy(&signals);
        assert!((0.0..=1.0).contains(&composite));
        assert_eq!(composite, 1.0);
    }

    #[test]
    fn nan_signal_takes_failsafe_maximum() {
        let signals = vec![RiskSignal {
            name: "broken".to_string(),
            value: f64::NAN,
            weight: 1.0,
        }];
        assert_eq!(calculate_entropy(&signals), 1.0);
    }

    #[test]
    fn empty_signals_score_zero() {
        assert_eq!(calculate_entropy(&[]), 0.0);
    }

    #[test]
    fn level_boundaries_are_exact() {
        let cases = [
            (0.0, ChaosLevel::Stable),
            (0.199, ChaosLevel::Stable),
            (0.2, ChaosLevel::LowChaos),
            (0.399, ChaosLevel::LowChaos),
            (0.4, ChaosLevel::ModerateChaos),
            (0.599, ChaosLevel::ModerateChaos),
            (0.6, ChaosLevel::HighChaos),
            (0.799, ChaosLevel::HighChaos),
            (0.8, ChaosLevel::CriticalChaos),
            (1.0, ChaosLevel::CriticalChaos),
        ];
        for (composite, expected) in cases {
            assert_eq!(
                classify_level(composite),
                expected,
                "composite {composite} should classify as {expected}"
            );
        }
    }

    #[test]
    fn trigger_boundary_is_inclusive() {
        assert!(should_trigger(0.5, 0.5));
        assert!(!should_trigger(0.4999, 0.5));
        assert!(should_trigger(0.9, 0.5));
    }

    #[test]
    fn snapshot_carries_components_and_decision() {
        let snapshot = build_snapshot(uniform_signals(1.0), 0.5);
        assert_eq!(snapshot.composite, 1.0);
        assert_eq!(snapshot.level, ChaosLevel::CriticalChaos);
        assert!(snapshot.triggered);
        assert_eq!(snapshot.components.len(), 4);
    }

    #[test]
    fn snapshot_serializes_levels_as_wire_labels() {
        let snapshot = build_snapshot(uniform_signals(0.0), 0.5);
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"STABLE\""));
        assert!(json.contains("\"triggered\":false"));
    }
}
