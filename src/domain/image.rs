use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An image produced by the Fetcher and owned by exactly one Request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    pub request_id: String,
    pub url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Image {
    pub fn new(request_id: impl Into<String>, url: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            request_id: request_id.into(),
            url,
            tags: Vec::new(),
            created_at: Utc::now(),
        }
    }
}
