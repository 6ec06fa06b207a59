//! Request/response DTOs for the HTTP surface (SPEC_FULL.md §4.1, §6).
//!
//! Entity responses serialize the domain `Request`/`Image` types directly
//! (the way the teacher's `JobSnapshot` is returned as-is); this module
//! only defines the shapes the entities themselves don't already cover.

use serde::{Deserialize, Serialize};

use crate::domain::{Image, LinkScore, Request};

#[derive(Debug, Deserialize)]
pub struct ScrapeRequestBody {
    pub url: String,
    #[serde(default)]
    pub seo_enabled: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequestBody {
    pub text: String,
    #[serde(default)]
    pub seo_enabled: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScoreRequestBody {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ScoreResponseBody {
    pub canonical_url: String,
    pub score: LinkScore,
}

#[derive(Debug, Serialize)]
pub struct RequestListResponse {
    pub requests: Vec<Request>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "ListQuery::default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

impl ListQuery {
    fn default_limit() -> usize {
        50
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchRequestBody {
    pub tag: String,
    #[serde(default = "SearchRequestBody::default_limit")]
    pub limit: usize,
    /// When set, matches any tag the query is a prefix of rather than the
    /// whole tag exactly (§4.1 "exact or fuzzy").
    #[serde(default)]
    pub fuzzy: bool,
}

impl SearchRequestBody {
    fn default_limit() -> usize {
        50
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub ids: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct ImageSearchResponse {
    pub images: Vec<Image>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct TombstoneRequestBody {
    pub operator: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// The `/api/scrape-requests/{id}` poll shape (§4.1 "state+progress"): the
/// Request snapshot plus a coarse state label so a caller doesn't have to
/// re-derive it from which metadata fields happen to be populated.
#[derive(Debug, Serialize)]
pub struct ScrapeStatusResponse {
    #[serde(flatten)]
    pub request: Request,
    pub state: &'static str,
}
