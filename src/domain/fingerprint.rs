use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintOutcome {
    Accepted,
    RejectedLowScore,
    Tombstoned,
}

/// Admission-cache entry keyed by a canonicalized URL. Collapses repeated
/// submissions of the same URL within its TTL so the scorer is only called
/// once per window (§4.2, §8 admission idempotence property).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlFingerprint {
    pub canonical_url: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub outcome: FingerprintOutcome,
    pub score: f64,
    pub expires_at: DateTime<Utc>,
}

impl UrlFingerprint {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
