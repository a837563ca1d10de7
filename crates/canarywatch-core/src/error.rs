//! Error types for the CanaryWatch core.
//!
//! Integrity findings (`TAMPERED_*`, `MISSING`, ...) are deliberately *not*
//! represented here: tampering is an expected, handleable outcome and is
//! reported as a [`CanaryStatus`](crate::canary::CanaryStatus) value.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CanaryWatchError {
    /// Fatal startup-only error: bad or missing secret key, weights that do
    /// not sum to 1.0, unusable paths.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A canary rewrite was refused because the configured minimum rewrite
    /// interval has not yet elapsed.
    #[error("canary rewrite rate-limited: {remaining_secs}s until next write is allowed")]
    RateLimited { remaining_secs: u64 },

    /// Repository metadata could not be fetched or parsed. Callers map this
    /// to the fail-safe maximum risk, never past the probe boundary.
    #[error("metadata fetch error: {0}")]
    MetadataFetch(String),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CanaryWatchError>;
