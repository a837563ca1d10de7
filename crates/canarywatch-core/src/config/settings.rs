//! Application settings and TOML configuration parsing.
//!
//! The secret key is deliberately absent from this file format: it is
//! supplied out-of-band (environment or secret store) and validated once at
//! startup into an opaque [`SecretKey`](crate::canary::SecretKey).

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::signals::SignalWeights;

/// Top-level CanaryWatch configuration, loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Path of the canary record file.
    #[serde(default = "default_canary_path")]
    pub canary_path: PathBuf,

    /// Path of the JSON-lines snapshot log consumed by external dashboards.
    #[serde(default = "default_snapshot_log_path")]
    pub snapshot_log_path: PathBuf,

    /// Seconds between integrity ticks.
    #[serde(default = "default_integrity_interval")]
    pub integrity_interval_secs: u64,

    /// Canary records older than this are classified `STALE`.
    #[serde(default = "default_staleness_threshold")]
    pub staleness_threshold_secs: u64,

    /// Minimum seconds between canary rewrites. 0 disables the limit.
    /// When enabled, an early rewrite is refused so a compromised caller
    /// cannot mask a `STALE` finding by rewriting arbitrarily often.
    #[serde(default)]
    pub rewrite_min_interval_secs: u64,

    /// Composite score at or above which the escalation event fires.
    #[serde(default = "default_trigger_threshold")]
    pub trigger_threshold: f64,

    /// Weight partition over the collected signals. Must sum to exactly 1.0;
    /// validated at startup.
    #[serde(default)]
    pub weights: SignalWeights,

    /// Repository metadata source settings.
    #[serde(default)]
    pub metadata: MetadataConfig,

    /// Metabolic noise settings.
    #[serde(default)]
    pub noise: NoiseSettings,
}

/// Repository metadata source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// URL returning the repository metadata document. When unset, the
    /// health probe has nothing to fetch and scores fail-safe maximum risk.
    #[serde(default)]
    pub url: Option<String>,

    /// Hard deadline for one metadata fetch.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            url: None,
            fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

/// Metabolic noise settings. The noise schedule is independent of the
/// integrity tick; sharing a schedule would let an observer correlate noise
/// bursts with real checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseSettings {
    /// Base seconds between noise bursts.
    #[serde(default = "default_noise_interval")]
    pub interval_secs: u64,

    /// Upper bound of the random per-burst jitter added to the interval.
    #[serde(default = "default_noise_jitter")]
    pub jitter_secs: u64,

    /// Dummy reads per burst.
    #[serde(default = "default_dummy_reads")]
    pub dummy_reads: u32,

    /// Upper bound on padding bytes per burst.
    #[serde(default = "default_max_padding_bytes")]
    pub max_padding_bytes: usize,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_noise_interval(),
            jitter_secs: default_noise_jitter(),
            dummy_reads: default_dummy_reads(),
            max_padding_bytes: default_max_padding_bytes(),
        }
    }
}

fn default_canary_path() -> PathBuf {
    data_dir().join("canary.json")
}

fn default_snapshot_log_path() -> PathBuf {
    data_dir().join("snapshots.jsonl")
}

fn data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home).join(".local/share")
    });
    base.join("canarywatch")
}

fn default_integrity_interval() -> u64 {
    60
}

fn default_staleness_threshold() -> u64 {
    300
}

fn default_trigger_threshold() -> f64 {
    0.5
}

fn default_fetch_timeout() -> u64 {
    10
}

fn default_noise_interval() -> u64 {
    45
}

fn default_noise_jitter() -> u64 {
    20
}

fn default_dummy_reads() -> u32 {
    3
}

fn default_max_padding_bytes() -> usize {
    4096
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            canary_path: default_canary_path(),
            snapshot_log_path: default_snapshot_log_path(),
            integrity_interval_secs: default_integrity_interval(),
            staleness_threshold_secs: default_staleness_threshold(),
            rewrite_min_interval_secs: 0,
            trigger_threshold: default_trigger_threshold(),
            weights: SignalWeights::default(),
            metadata: MetadataConfig::default(),
            noise: NoiseSettings::default(),
        }
    }
}

impl WatchConfig {
    /// Load configuration from a TOML file, falling back to defaults when
    /// the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn staleness_threshold(&self) -> Duration {
        Duration::from_secs(self.staleness_threshold_secs)
    }

    pub fn integrity_interval(&self) -> Duration {
        Duration::from_secs(self.integrity_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata.fetch_timeout_secs)
    }

    /// The rewrite rate limit, `None` when disabled.
    pub fn rewrite_min_interval(&self) -> Option<Duration> {
        (self.rewrite_min_interval_secs > 0)
            .then(|| Duration::from_secs(self.rewrite_min_interval_secs))
    }
}
