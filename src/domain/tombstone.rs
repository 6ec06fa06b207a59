use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TombstoneReason {
    LowScore,
    TagBased,
    Manual,
}

impl TombstoneReason {
    pub fn as_key_str(&self) -> &'static str {
        match self {
            TombstoneReason::LowScore => "low-score",
            TombstoneReason::TagBased => "tag-based",
            TombstoneReason::Manual => "manual",
        }
    }
}

/// A time-bounded suppression marker. Append-only: once created, a
/// tombstone's `expires_at` is never mutated, even by a later tombstone of
/// the same reason (§4.5, §9 open question).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tombstone {
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub reason: TombstoneReason,
    pub tag: Option<String>,
    pub operator: Option<String>,
}

impl Tombstone {
    pub fn new(reason: TombstoneReason, duration: chrono::Duration) -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            expires_at: now + duration,
            reason,
            tag: None,
            operator: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = Some(operator.into());
        self
    }
}
