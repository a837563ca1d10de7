//! File-backed canary store.
//!
//! The store is the exclusive owner of the canary file and the signing key.
//! Writes are atomic (temp file + rename) so a crash mid-write can never
//! leave a half-old, half-new record on disk. Checks are pure read-classify
//! operations; a fresh write is the only transition back toward `OK`.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::record::{CanaryRecord, SecretKey, SignatureCheck};
use super::CanaryStatus;
use crate::error::{CanaryWatchError, Result};

/// Owns the canary file, the signing key, and the write counter.
pub struct CanaryStore {
    path: PathBuf,
    key: SecretKey,
    staleness: Duration,
    /// Optional operator-configured minimum interval between rewrites, so a
    /// compromised caller cannot mask a `STALE` finding by rewriting
    /// arbitrarily often. `None` disables the limit.
    rewrite_min_interval: Option<Duration>,
    sequence: u64,
    last_write: Option<Instant>,
}

impl CanaryStore {
    /// Create a store for the given path and key.
    ///
    /// If a validly signed record already exists at the path, its sequence
    /// counter is resumed so the monotonic invariant survives restarts. An
    /// unverifiable record is never trusted for resumption.
    pub fn new(
        path: impl Into<PathBuf>,
        key: SecretKey,
        staleness: Duration,
        rewrite_min_interval: Option<Duration>,
    ) -> Self {
        let path = path.into();
        let mut store = Self {
            path,
            key,
            staleness,
            rewrite_min_interval: rewrite_min_interval.filter(|d| !d.is_zero()),
            sequence: 0,
            last_write: None,
        };

        if let Some(record) = store.read_valid_record() {
            debug!(sequence = record.sequence, "resuming canary sequence");
            store.sequence = record.sequence;
        }
        store
    }

    /// Path of the canary file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current write counter.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Write a fresh canary record: new nonce, incremented sequence, new
    /// signature, atomic replace of the file.
    ///
    /// Calling this twice in immediate succession simply advances the counter
    /// further, unless the operator configured a minimum rewrite interval,
    /// in which case an early rewrite is refused with
    /// [`CanaryWatchError::RateLimited`].
    pub fn write_canary(&mut self) -> Result<CanaryRecord> {
        if let (Some(min), Some(last)) = (self.rewrite_min_interval, self.last_write) {
            let elapsed = last.elapsed();
            if elapsed < min {
                let remaining_secs = (min - elapsed).as_secs().max(1);
                return Err(CanaryWatchError::RateLimited { remaining_secs });
            }
        }

        self.sequence += 1;
        let record = CanaryRecord::signed(&self.key, self.sequence, Utc::now());
        self.persist(&record)?;
        self.last_write = Some(Instant::now());
        info!(
            sequence = record.sequence,
            path = %self.path.display(),
            "canary record written"
        );
        Ok(record)
    }

    /// Read and classify the current canary file. Pure: no state transition,
    /// and a tamper finding is never cleared by checking again.
    pub fn check_canary(&self) -> CanaryStatus {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return CanaryStatus::Missing,
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "canary read failed");
                return CanaryStatus::Error;
            }
        };

        let record: CanaryRecord = match serde_json::from_slice(&bytes) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "canary file does not parse as a record");
                return CanaryStatus::TamperedContent;
            }
        };

        match record.verify_signature(&self.key) {
            SignatureCheck::Malformed => CanaryStatus::TamperedContent,
            SignatureCheck::Mismatch => CanaryStatus::TamperedHash,
            SignatureCheck::Valid => {
                let age = Utc::now().signed_duration_since(record.written_at);
                // A threshold too large for chrono cannot be exceeded.
                let stale = chrono::Duration::from_std(self.staleness)
                    .map(|threshold| age > threshold)
                    .unwrap_or(false);
                if stale {
                    CanaryStatus::Stale
                } else {
                    CanaryStatus::Ok
                }
            }
        }
    }

    /// Swap the signing key and immediately rewrite the canary, so the next
    /// check does not spuriously report `TAMPERED_HASH` against a record
    /// signed with the old key. Bypasses the rewrite rate limit: a re-key is
    /// an explicit operator action.
    pub fn rekey(&mut self, key: SecretKey) -> Result<CanaryRecord> {
        self.key = key;
        self.last_write = None;
        info!("canary signing key rotated");
        self.write_canary()
    }

    fn read_valid_record(&self) -> Option<CanaryRecord> {
        let bytes = fs::read(&self.path).ok()?;
        let record: CanaryRecord = serde_json::from_slice(&bytes).ok()?;
        (record.verify_signature(&self.key) == SignatureCheck::Valid).then_some(record)
    }

    /// Atomic replace: serialize to a temp file in the same directory, then
    /// rename into place.
    fn persist(&self, record: &CanaryRecord) -> Result<()> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&parent)?;

        let mut tmp = NamedTempFile::new_in(&parent)?;
        serde_json::to_writer_pretty(&mut tmp, record)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        // The record is not itself secret, but there is no reason to let
        // other local users read the nonce ahead of an attacker probe.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }
}
