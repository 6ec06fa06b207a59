use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of work a Job drives through the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    FetchAndAnalyze,
    AnalyzeOnly,
    Rescore,
}

impl JobKind {
    pub fn as_key_str(&self) -> &'static str {
        match self {
            JobKind::FetchAndAnalyze => "fetch-and-analyze",
            JobKind::AnalyzeOnly => "analyze-only",
            JobKind::Rescore => "rescore",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
    Deadletter,
}

/// A durable, retryable unit of scheduled work for a Request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub request_id: String,
    pub kind: JobKind,
    pub state: JobState,
    pub attempt: u32,
    pub next_earliest_run: DateTime<Utc>,
    pub lease_expiry: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Inputs needed to resume this job (e.g. the source URL, or raw text).
    pub payload: serde_json::Value,
}

impl Job {
    pub fn new(request_id: impl Into<String>, kind: JobKind, payload: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            request_id: request_id.into(),
            kind,
            state: JobState::Pending,
            attempt: 0,
            next_earliest_run: now,
            lease_expiry: None,
            last_error: None,
            created_at: now,
            updated_at: now,
            payload,
        }
    }

    pub fn request_kind_key(request_id: &str, kind: JobKind) -> String {
        format!("{request_id}\0{}", kind.as_key_str())
    }
}
