//! Metabolic noise generator.
//!
//! Performs decoy read/write-shaped operations against the same storage
//! medium the canary store uses, so an observer watching file access cannot
//! tell genuine integrity checks from background chatter by timing or volume
//! alone. Runs on its own schedule, independent of the integrity tick.
//!
//! The statistics counters are advisory, not part of the trust boundary.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Scratch file name for padding writes, kept beside the canary file.
const DECOY_FILE_NAME: &str = "noise.pad";

/// Floor on dummy reads per run; a run that read nothing would be trivially
/// distinguishable from a genuine check.
const MIN_DUMMY_READS: u32 = 2;

/// Smallest padding payload per run.
const MIN_PADDING_BYTES: usize = 64;

/// Sentinel for "never ran" in the atomic timestamp.
const NEVER: i64 = i64::MIN;

/// Point-in-time view of the noise counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseStats {
    pub dummy_reads_total: u64,
    pub noise_generated_bytes: u64,
    pub last_run_at: Option<DateTime<Utc>>,
}

/// Generates decoy activity and exclusively owns its statistics.
///
/// A service object, not a global: independent instances (daemon, tests) do
/// not interfere with each other.
pub struct NoiseGenerator {
    /// The file genuine checks read; dummy reads target it too.
    canary_path: PathBuf,
    /// Scratch file receiving padding writes.
    decoy_path: PathBuf,
    dummy_reads: u32,
    max_padding_bytes: usize,
    reads_total: AtomicU64,
    bytes_total: AtomicU64,
    last_run_unix_ms: AtomicI64,
}

impl NoiseGenerator {
    /// Create a generator targeting the canary file's directory.
    pub fn new(canary_path: impl Into<PathBuf>, dummy_reads: u32, max_padding_bytes: usize) -> Self {
        let canary_path = canary_path.into();
        let decoy_path = canary_path
            .parent()
            .map(|p| p.join(DECOY_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(DECOY_FILE_NAME));
        Self {
            canary_path,
            decoy_path,
            dummy_reads: dummy_reads.max(MIN_DUMMY_READS),
            max_padding_bytes: max_padding_bytes.max(MIN_PADDING_BYTES),
            reads_total: AtomicU64::new(0),
            bytes_total: AtomicU64::new(0),
            last_run_unix_ms: AtomicI64::new(NEVER),
        }
    }

    /// Perform one burst of decoy activity: dummy reads against the canary's
    /// storage medium plus a bounded random padding write, then update the
    /// counters.
    pub fn run_metabolic_noise(&self) {
        let mut rng = rand::rng();

        // Read-shaped operations. The results are discarded; a failed read
        // still produced the observable access we want.
        for i in 0..self.dummy_reads {
            let target = if i % 2 == 0 {
                &self.canary_path
            } else {
                &self.decoy_path
            };
            let _ = fs::read(target);
            trace!(target = %target.display(), "dummy read");
        }
        self.reads_total
            .fetch_add(u64::from(self.dummy_reads), Ordering::Relaxed);

        // Write-shaped operation: bounded random padding to the decoy file.
        let padding_len = rng.random_range(MIN_PADDING_BYTES..=self.max_padding_bytes);
        let mut padding = vec![0u8; padding_len];
        rng.fill(&mut padding[..]);
        if let Err(e) = fs::write(&self.decoy_path, &padding) {
            debug!(error = %e, "decoy padding write failed");
        }
        self.bytes_total
            .fetch_add(padding_len as u64, Ordering::Relaxed);

        self.last_run_unix_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
        trace!(
            reads = self.dummy_reads,
            padding_bytes = padding_len,
            "metabolic noise emitted"
        );
    }

    /// Snapshot the counters.
    pub fn stats(&self) -> NoiseStats {
        let last = self.last_run_unix_ms.load(Ordering::Relaxed);
        NoiseStats {
            dummy_reads_total: self.reads_total.load(Ordering::Relaxed),
            noise_generated_bytes: self.bytes_total.load(Ordering::Relaxed),
            last_run_at: (last != NEVER)
                .then(|| Utc.timestamp_millis_opt(last).single())
                .flatten(),
        }
    }

    /// Reset the counters to zero. An explicit operator action, never
    /// performed automatically.
    pub fn reset_stats(&self) {
        self.reads_total.store(0, Ordering::Relaxed);
        self.bytes_total.store(0, Ordering::Relaxed);
        self.last_run_unix_ms.store(NEVER, Ordering::Relaxed);
        debug!("noise statistics reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator_in_tempdir(dir: &std::path::Path) -> NoiseGenerator {
        NoiseGenerator::new(dir.join("canary.json"), 3, 1024)
    }

    #[test]
    fn one_run_produces_reads_and_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let noise = generator_in_tempdir(dir.path());

        noise.run_metabolic_noise();

        let stats = noise.stats();
        assert!(stats.dummy_reads_total >= 2);
        assert!(stats.noise_generated_bytes > 0);
        assert!(stats.last_run_at.is_some());
    }

    #[test]
    fn reset_zeroes_all_counters() {
        let dir = tempfile::tempdir().unwrap();
        let noise = generator_in_tempdir(dir.path());

        noise.run_metabolic_noise();
        noise.reset_stats();

        let stats = noise.stats();
        assert_eq!(stats.dummy_reads_total, 0);
        assert_eq!(stats.noise_generated_bytes, 0);
        assert!(stats.last_run_at.is_none());
    }

    #[test]
    fn runs_accumulate() {
        let dir = tempfile::tempdir().unwrap();
        let noise = generator_in_tempdir(dir.path());

        noise.run_metabolic_noise();
        let first = noise.stats();
        noise.run_metabolic_noise();
        let second = noise.stats();

        assert_eq!(second.dummy_reads_total, first.dummy_reads_total * 2);
        assert!(second.noise_generated_bytes > first.noise_generated_bytes);
    }

    #[test]
    fn dummy_read_floor_is_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let noise = NoiseGenerator::new(dir.path().join("canary.json"), 0, 1024);

        noise.run_metabolic_noise();
        assert!(noise.stats().dummy_reads_total >= 2);
    }

    #[test]
    fn padding_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let noise = NoiseGenerator::new(dir.path().join("canary.json"), 2, 256);

        noise.run_metabolic_noise();
        let stats = noise.stats();
        assert!(stats.noise_generated_bytes >= MIN_PADDING_BYTES as u64);
        assert!(stats.noise_generated_bytes <= 256);
    }
}
