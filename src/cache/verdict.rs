//! Short-lived cache of confirmed-valid validation results.
//!
//! Disabled unless a TTL is configured. Entries are keyed by the SHA-256 of
//! the license key so raw keys never sit in the map. Only `valid == true`
//! results are stored; an invalid verdict always goes back to the authority.

use crate::clock::Clock;
use crate::validator::ValidationResult;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Compute a SHA-256 hash of the license key for use as cache key.
pub fn hash_license_key(license_key: &str) -> String {
    use sha2::{Digest, Sha256};
    let hash = Sha256::digest(license_key.as_bytes());
    hex::encode(hash)
}

/// Log-safe identifier for a license key (first 12 hex chars of its hash).
pub fn key_fingerprint(license_key: &str) -> String {
    let mut hash = hash_license_key(license_key);
    hash.truncate(12);
    hash
}

struct CachedVerdict {
    result: ValidationResult,
    stored_at: DateTime<Utc>,
}

/// TTL cache of valid verdicts.
pub struct VerdictCache {
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, CachedVerdict>>,
}

impl VerdictCache {
    /// Create a cache whose entries live for `ttl`.
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        Self {
            ttl,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch a still-fresh verdict for `license_key`.
    pub fn get(&self, license_key: &str) -> Option<ValidationResult> {
        let key_hash = hash_license_key(license_key);
        let now = self.clock.now_utc();
        let mut entries = self.entries.lock().ok()?;

        match entries.get(&key_hash) {
            Some(entry) if now - entry.stored_at < self.ttl => Some(entry.result.clone()),
            Some(_) => {
                entries.remove(&key_hash);
                None
            }
            None => None,
        }
    }

    /// Remember `result` if it is a valid verdict.
    pub fn insert(&self, license_key: &str, result: &ValidationResult) {
        if !result.valid {
            return;
        }
        let stored_at = self.clock.now_utc();
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                hash_license_key(license_key),
                CachedVerdict {
                    result: result.clone(),
                    stored_at,
                },
            );
        }
    }

    /// Drop the entry for `license_key`.
    pub fn invalidate(&self, license_key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(&hash_license_key(license_key));
        }
    }
}
