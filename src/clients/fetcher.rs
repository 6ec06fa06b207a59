use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::trace::RequestContext;
use super::{retry_with_backoff, ClientError, ClientRetryPolicy};

/// Score + reason returned by the Fetcher's scoring endpoint, consumed by
/// the admission gate (SPEC_FULL.md §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResponse {
    pub score: f64,
    pub reason: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub malicious_indicators: Vec<String>,
}

/// Result of a successful fetch, handed to the orchestrator to populate
/// `Request.scraper_uuid` and `metadata.scraper_metadata`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResponse {
    pub scraper_uuid: String,
    pub text: String,
    #[serde(default)]
    pub images: Vec<FetchedImage>,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedImage {
    pub url: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[async_trait]
pub trait FetcherClient: Send + Sync {
    async fn score(&self, ctx: &RequestContext, url: &str) -> Result<ScoreResponse, ClientError>;
    async fn fetch(&self, ctx: &RequestContext, url: &str) -> Result<FetchResponse, ClientError>;
}

pub struct HttpFetcherClient {
    client: reqwest::Client,
    base_url: String,
    fetch_timeout: Duration,
    scorer_timeout: Duration,
}

impl HttpFetcherClient {
    pub fn new(base_url: impl Into<String>, fetch_timeout: Duration, scorer_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            fetch_timeout,
            scorer_timeout,
        }
    }
}

#[async_trait]
impl FetcherClient for HttpFetcherClient {
    async fn score(&self, ctx: &RequestContext, url: &str) -> Result<ScoreResponse, ClientError> {
        retry_with_backoff("fetcher.score", ClientRetryPolicy::default(), || async {
            let response = ctx
                .apply(self.client.post(format!("{}/score", self.base_url)))
                .timeout(self.scorer_timeout)
                .json(&serde_json::json!({ "url": url }))
                .send()
                .await
                .map_err(ClientError::from)?;

            if !response.status().is_success() {
                return Err(ClientError::UpstreamStatus {
                    status: response.status().as_u16(),
                    body: response.text().await.unwrap_or_default(),
                });
            }
            response
                .json::<ScoreResponse>()
                .await
                .map_err(|e| ClientError::MalformedResponse(e.to_string()))
        })
        .await
    }

    async fn fetch(&self, ctx: &RequestContext, url: &str) -> Result<FetchResponse, ClientError> {
        retry_with_backoff("fetcher.fetch", ClientRetryPolicy::default(), || async {
            let response = ctx
                .apply(self.client.post(format!("{}/fetch", self.base_url)))
                .timeout(self.fetch_timeout)
                .json(&serde_json::json!({ "url": url }))
                .send()
                .await
                .map_err(ClientError::from)?;

            if !response.status().is_success() {
                return Err(ClientError::UpstreamStatus {
                    status: response.status().as_u16(),
                    body: response.text().await.unwrap_or_default(),
                });
            }
            response
                .json::<FetchResponse>()
                .await
                .map_err(|e| ClientError::MalformedResponse(e.to_string()))
        })
        .await
    }
}
