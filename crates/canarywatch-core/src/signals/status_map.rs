//! Canary status → normalized risk mapping.
//!
//! The security posture lives in the named constants below; changing it is a
//! one-place edit. The mapping over [`CanaryStatus`] is a total `match`, so
//! the compiler enforces that a new status variant cannot fall through
//! silently.

use tracing::warn;

use crate::canary::CanaryStatus;

/// Nominal: record present, signature valid, recently written.
pub const OK_RISK: f64 = 0.0;

/// Suspicious neglect, not proven tamper: nobody has refreshed the canary
/// within the staleness window.
pub const STALE_RISK: f64 = 0.3;

/// Environment failure (permissions, disk error): precautionary elevation,
/// not evidence of tampering.
pub const ERROR_RISK: f64 = 0.6;

/// Strong evidence of interference: the file was deleted by a third party.
pub const MISSING_RISK: f64 = 0.8;

/// Proven tamper or corruption: maximum risk.
pub const TAMPERED_RISK: f64 = 1.0;

/// Fail-safe default for a status label this build does not recognize.
/// An unknown state must never be scored as safe, and never falls through
/// silently.
pub const UNRECOGNIZED_STATUS_RISK: f64 = 0.5;

/// Map a canary status to its normalized risk value.
pub fn status_risk(status: CanaryStatus) -> f64 {
    match status {
        CanaryStatus::Ok => OK_RISK,
        CanaryStatus::Stale => STALE_RISK,
        CanaryStatus::Error => ERROR_RISK,
        CanaryStatus::Missing => MISSING_RISK,
        CanaryStatus::TamperedHash | CanaryStatus::TamperedContent => TAMPERED_RISK,
    }
}

/// Score a status label read from an external record (e.g. a persisted
/// snapshot produced by a newer or older build). Unrecognized labels take
/// the fail-safe default.
pub fn risk_for_label(label: &str) -> f64 {
    match CanaryStatus::from_label(label) {
        Some(status) => status_risk(status),
        None => {
            warn!(label, "unrecognized canary status label, using fail-safe risk");
            UNRECOGNIZED_STATUS_RISK
        }
    }
}
