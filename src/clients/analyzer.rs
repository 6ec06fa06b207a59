use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::trace::RequestContext;
use super::{retry_with_backoff, ClientError, ClientRetryPolicy};
use crate::domain::AnalyzerMetadata;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub textanalyzer_uuid: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub metadata: AnalyzerMetadata,
}

#[async_trait]
pub trait AnalyzerClient: Send + Sync {
    async fn analyze(&self, ctx: &RequestContext, text: &str) -> Result<AnalyzeResponse, ClientError>;
}

pub struct HttpAnalyzerClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpAnalyzerClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl AnalyzerClient for HttpAnalyzerClient {
    async fn analyze(&self, ctx: &RequestContext, text: &str) -> Result<AnalyzeResponse, ClientError> {
        retry_with_backoff("analyzer.analyze", ClientRetryPolicy::default(), || async {
            let response = ctx
                .apply(self.client.post(format!("{}/analyze", self.base_url)))
                .timeout(self.timeout)
                .json(&serde_json::json!({ "text": text }))
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
                .json::<AnalyzeResponse>()
                .await
                .map_err(|e| ClientError::MalformedResponse(e.to_string()))
        })
        .await
    }
}
