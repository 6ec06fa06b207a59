use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::tombstone::Tombstone;

/// How a submission entered the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Url,
    Text,
    Image,
}

/// Score returned by the admission gate's LLM scorer call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkScore {
    pub score: f64,
    pub reason: String,
    #[serde(default)]
    pub categories: Vec<String>,
    pub is_recommended: bool,
    #[serde(default)]
    pub malicious_indicators: Vec<String>,
}

/// Metadata produced by the Analyzer worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerMetadata {
    pub word_count: usize,
    pub sentiment: Option<String>,
    pub readability_score: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub quality_score: Option<f64>,
    pub synopsis: Option<String>,
    pub ai_detection: Option<f64>,
}

/// The free-form metadata document attached to a Request. Individual
/// fields are populated incrementally as the orchestration state machine
/// advances; nothing here is ever removed once set (forward-only
/// visibility, see `orchestrator`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub link_score: Option<LinkScore>,
    pub scraper_metadata: Option<serde_json::Value>,
    pub analyzer_metadata: Option<AnalyzerMetadata>,
    #[serde(default)]
    pub below_threshold: bool,
    #[serde(default)]
    pub tombstones: Vec<Tombstone>,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub cancelled: bool,
    /// Set once a job for this Request has been deadlettered or hit a
    /// non-retryable client error (§4.4 transitions 5 & 7).
    #[serde(default)]
    pub failed: bool,
    /// Present only for the `text` source type.
    pub text: Option<String>,
}

/// A user submission and its pipeline outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub source_type: SourceType,
    pub source_url: Option<String>,
    pub slug: Option<String>,
    pub scraper_uuid: Option<String>,
    pub textanalyzer_uuid: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub seo_enabled: bool,
    #[serde(default)]
    pub metadata: RequestMetadata,
}

impl Request {
    pub fn new(source_type: SourceType, source_url: Option<String>, seo_enabled: bool) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            created_at: Utc::now(),
            source_type,
            source_url,
            slug: None,
            scraper_uuid: None,
            textanalyzer_uuid: None,
            tags: Vec::new(),
            seo_enabled,
            metadata: RequestMetadata::default(),
        }
    }

    /// A Request is suppressed from public surfaces while any tombstone is
    /// still active. The effective expiry is the max across all tombstones
    /// ever recorded (§4.5): a single expired entry does not clear it while
    /// a later one is still live.
    pub fn is_tombstoned(&self, now: DateTime<Utc>) -> bool {
        self.metadata
            .tombstones
            .iter()
            .any(|t| now < t.expires_at)
    }

    pub fn effective_tombstone_expiry(&self) -> Option<DateTime<Utc>> {
        self.metadata.tombstones.iter().map(|t| t.expires_at).max()
    }

    /// Coarse progress label for the `fetch-and-analyze`/`analyze-only`
    /// state machine (§4.4), derived from which fields have been persisted
    /// so far rather than tracked as its own stored field.
    pub fn pipeline_state(&self) -> &'static str {
        if self.metadata.cancelled {
            return "cancelled";
        }
        if self.metadata.below_threshold {
            return "rejected";
        }
        if self.metadata.failed {
            return if self.scraper_uuid.is_none() && self.source_type == SourceType::Url {
                "failed-fetch"
            } else {
                "failed-analyze"
            };
        }
        if self.slug.is_some() {
            "completed"
        } else if self.textanalyzer_uuid.is_some() {
            "indexing"
        } else if self.scraper_uuid.is_some() {
            "analyzing"
        } else if self.metadata.link_score.is_some() {
            "fetching"
        } else {
            "received"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_state_progresses_as_fields_are_populated() {
        let mut request = Request::new(SourceType::Url, Some("https://example.com".to_string()), false);
        assert_eq!(request.pipeline_state(), "received");

        request.metadata.link_score = Some(LinkScore {
            score: 0.9,
            reason: "ok".to_string(),
            categories: vec![],
            is_recommended: true,
            malicious_indicators: vec![],
        });
        assert_eq!(request.pipeline_state(), "fetching");

        request.scraper_uuid = Some("scraper-1".to_string());
        assert_eq!(request.pipeline_state(), "analyzing");

        request.textanalyzer_uuid = Some("analyzer-1".to_string());
        assert_eq!(request.pipeline_state(), "indexing");

        request.slug = Some("example".to_string());
        assert_eq!(request.pipeline_state(), "completed");
    }

    #[test]
    fn pipeline_state_reports_failed_fetch_before_any_scraper_uuid() {
        let mut request = Request::new(SourceType::Url, Some("https://example.com".to_string()), false);
        request.metadata.failed = true;
        assert_eq!(request.pipeline_state(), "failed-fetch");
    }

    #[test]
    fn pipeline_state_reports_failed_analyze_once_fetch_succeeded() {
        let mut request = Request::new(SourceType::Url, Some("https://example.com".to_string()), false);
        request.scraper_uuid = Some("scraper-1".to_string());
        request.metadata.failed = true;
        assert_eq!(request.pipeline_state(), "failed-analyze");
    }

    #[test]
    fn cancelled_and_rejected_take_priority_over_field_based_inference() {
        let mut cancelled = Request::new(SourceType::Url, Some("https://example.com".to_string()), false);
        cancelled.metadata.cancelled = true;
        assert_eq!(cancelled.pipeline_state(), "cancelled");

        let mut rejected = Request::new(SourceType::Url, Some("https://example.com".to_string()), false);
        rejected.metadata.below_threshold = true;
        assert_eq!(rejected.pipeline_state(), "rejected");
    }
}
