use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::trace::RequestContext;
use super::{retry_with_backoff, ClientError, ClientRetryPolicy};

/// Notification sent to the Scheduler worker once a Request reaches
/// `completed`, so it can publish to SEO/sitemap surfaces. This call is
/// best-effort: its failure does not roll back the Request's own state
/// (forward-only visibility, SPEC_FULL.md §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishNotice {
    pub request_id: String,
    pub slug: String,
    pub seo_enabled: bool,
}

#[async_trait]
pub trait SchedulerClient: Send + Sync {
    async fn notify_completed(&self, ctx: &RequestContext, notice: &PublishNotice) -> Result<(), ClientError>;
}

pub struct HttpSchedulerClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpSchedulerClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl SchedulerClient for HttpSchedulerClient {
    async fn notify_completed(&self, ctx: &RequestContext, notice: &PublishNotice) -> Result<(), ClientError> {
        retry_with_backoff("scheduler.notify_completed", ClientRetryPolicy::default(), || async {
            let response = ctx
                .apply(self.client.post(format!("{}/publish", self.base_url)))
                .timeout(self.timeout)
                .json(notice)
                .send()
                .await
                .map_err(ClientError::from)?;

            if !response.status().is_success() {
                return Err(ClientError::UpstreamStatus {
                    status: response.status().as_u16(),
                    body: response.text().await.unwrap_or_default(),
                });
            }
            Ok(())
        })
        .await
    }
}
