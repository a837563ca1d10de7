//! The signed canary record and its secret key.
//!
//! A canary record is a small signed payload kept on durable storage. Its
//! HMAC-SHA256 signature covers the canonical serialization of
//! `{nonce, sequence, written_at}`, so any alteration of the stored record by
//! a party without the secret key is detectable.

use std::fmt;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{CanaryWatchError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Required secret key length in bytes (256 bits, 64 hex characters).
pub const SECRET_KEY_BYTES: usize = 32;

/// Nonce length in bytes. Regenerated on every write to prevent replay of an
/// old valid record.
pub const NONCE_BYTES: usize = 16;

/// HMAC-SHA256 tag length in bytes.
const SIGNATURE_BYTES: usize = 32;

// ---------------------------------------------------------------------------
// Secret key
// ---------------------------------------------------------------------------

/// The canary signing key, validated once at construction.
///
/// Held as an opaque value: the `Debug` impl never reveals key material, and
/// there is no accessor that exposes the raw bytes outside this module.
#[derive(Clone)]
pub struct SecretKey([u8; SECRET_KEY_BYTES]);

impl SecretKey {
    /// Parse a hex-encoded key. Fails unless the input decodes to exactly
    /// 32 bytes. No default key is ever substituted; an absent or invalid
    /// key is a fatal startup error.
    pub fn from_hex(hex_key: &str) -> Result<Self> {
        let bytes = hex::decode(hex_key.trim()).map_err(|e| {
            CanaryWatchError::Configuration(format!("secret key is not valid hex: {e}"))
        })?;
        let key: [u8; SECRET_KEY_BYTES] = bytes.try_into().map_err(|b: Vec<u8>| {
            CanaryWatchError::Configuration(format!(
                "secret key must be exactly {SECRET_KEY_BYTES} bytes ({} hex chars), got {} bytes",
                SECRET_KEY_BYTES * 2,
                b.len()
            ))
        })?;
        Ok(Self(key))
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.0).expect("HMAC accepts keys of any length")
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

// ---------------------------------------------------------------------------
// Canary record
// ---------------------------------------------------------------------------

/// The signed payload stored in the canary file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanaryRecord {
    /// Random token, fresh on every write.
    pub nonce: String,
    /// Monotonically increasing write counter.
    pub sequence: u64,
    /// Timestamp of the last write.
    pub written_at: DateTime<Utc>,
    /// Hex-encoded HMAC-SHA256 over the canonical serialization of the
    /// other three fields.
    pub signature: String,
}

/// Outcome of verifying a stored record's signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    /// The recomputed tag matches the stored one.
    Valid,
    /// The stored tag is well-formed but does not match — proven tamper.
    Mismatch,
    /// The signature field is not a well-formed tag (shape violation).
    Malformed,
}

impl CanaryRecord {
    /// Build and sign a fresh record.
    pub fn signed(key: &SecretKey, sequence: u64, written_at: DateTime<Utc>) -> Self {
        let mut nonce_bytes = [0u8; NONCE_BYTES];
        rand::rng().fill(&mut nonce_bytes[..]);
        let nonce = hex::encode(nonce_bytes);

        let signature = compute_signature(key, &nonce, sequence, &written_at);
        Self {
            nonce,
            sequence,
            written_at,
            signature,
        }
    }

    /// Recompute the signature over the stored fields and compare it to the
    /// stored tag in constant time.
    pub fn verify_signature(&self, key: &SecretKey) -> SignatureCheck {
        let stored = match hex::decode(&self.signature) {
            Ok(bytes) if bytes.len() == SIGNATURE_BYTES => bytes,
            _ => return SignatureCheck::Malformed,
        };

        let expected = raw_signature(key, &self.nonce, self.sequence, &self.written_at);

        // Constant-time comparison: never short-circuit byte-by-byte, so an
        // attacker cannot refine a forged tag from timing.
        if bool::from(expected.as_slice().ct_eq(stored.as_slice())) {
            SignatureCheck::Valid
        } else {
            SignatureCheck::Mismatch
        }
    }
}

/// Canonical MAC input. Any change here invalidates all existing records.
fn canonical_message(nonce: &str, sequence: u64, written_at: &DateTime<Utc>) -> String {
    format!("{}:{}:{}", nonce, sequence, written_at.to_rfc3339())
}

fn raw_signature(
    key: &SecretKey,
    nonce: &str,
    sequence: u64,
    written_at: &DateTime<Utc>,
) -> Vec<u8> {
    let mut mac = key.mac();
    mac.update(canonical_message(nonce, sequence, written_at).as_bytes());
    mac.finalize().into_bytes().to_vec()
}

fn compute_signature(
    key: &SecretKey,
    nonce: &str,
    sequence: u64,
    written_at: &DateTime<Utc>,
) -> String {
    hex::encode(raw_signature(key, nonce, sequence, written_at))
}
