//! Tamper-evident canary record: signed payload, store, and status taxonomy.

pub mod record;
pub mod store;

pub use record::{CanaryRecord, SecretKey, NONCE_BYTES, SECRET_KEY_BYTES};
pub use store::CanaryStore;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification of the canary file produced by a single check.
///
/// A closed enumeration: the risk mapping over these variants is total and
/// enforced at compile time. Tamper findings are first-class values, not
/// errors: once observed they are never cleared by the subsystem itself,
/// only by an operator re-establishing trust with a fresh write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CanaryStatus {
    /// Record present, signature valid, freshly written.
    Ok,
    /// Signature valid but the record is older than the staleness threshold.
    /// Nobody has refreshed the canary recently, which is itself suspicious.
    Stale,
    /// An I/O failure other than "file absent" (permissions, disk error).
    /// Environmental failure, not evidence of tampering.
    Error,
    /// The canary file does not exist. Deletion by a third party is a
    /// detectable event.
    Missing,
    /// The record parses but the recomputed signature does not match.
    TamperedHash,
    /// The file exists but cannot be parsed into the expected record shape.
    TamperedContent,
}

impl CanaryStatus {
    /// Stable wire label, as emitted into snapshot records.
    pub fn label(&self) -> &'static str {
        match self {
            CanaryStatus::Ok => "OK",
            CanaryStatus::Stale => "STALE",
            CanaryStatus::Error => "ERROR",
            CanaryStatus::Missing => "MISSING",
            CanaryStatus::TamperedHash => "TAMPERED_HASH",
            CanaryStatus::TamperedContent => "TAMPERED_CONTENT",
        }
    }

    /// Parse a wire label back into a status. Returns `None` for anything
    /// unrecognized; callers that score labels fall back to the fail-safe
    /// default instead of guessing.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "OK" => Some(CanaryStatus::Ok),
            "STALE" => Some(CanaryStatus::Stale),
            "ERROR" => Some(CanaryStatus::Error),
            "MISSING" => Some(CanaryStatus::Missing),
            "TAMPERED_HASH" => Some(CanaryStatus::TamperedHash),
            "TAMPERED_CONTENT" => Some(CanaryStatus::TamperedContent),
            _ => None,
        }
    }

    /// True for the statuses that prove interference rather than neglect or
    /// environmental failure.
    pub fn is_tampered(&self) -> bool {
        matches!(
            self,
            CanaryStatus::TamperedHash | CanaryStatus::TamperedContent
        )
    }
}

impl fmt::Display for CanaryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip() {
        for status in [
            CanaryStatus::Ok,
            CanaryStatus::Stale,
            CanaryStatus::Error,
            CanaryStatus::Missing,
            CanaryStatus::TamperedHash,
            CanaryStatus::TamperedContent,
        ] {
            assert_eq!(CanaryStatus::from_label(status.label()), Some(status));
        }
        assert_eq!(CanaryStatus::from_label("SOMETHING_ELSE"), None);
    }

    #[test]
    fn serde_uses_wire_labels() {
        let json = serde_json::to_string(&CanaryStatus::TamperedHash).unwrap();
        assert_eq!(json, "\"TAMPERED_HASH\"");
        let parsed: CanaryStatus = serde_json::from_str("\"OK\"").unwrap();
        assert_eq!(parsed, CanaryStatus::Ok);
    }
}
