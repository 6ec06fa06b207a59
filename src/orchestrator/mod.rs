//! Per-Request orchestration state machine (SPEC_FULL.md §4.4).
//!
//! The HTTP layer drives `received -> scoring` synchronously via
//! `admission::AdmissionGate` before a job ever exists; everything from
//! here on (`fetching -> analyzing -> indexing -> completed`, with
//! off-ramps) is driven by a dequeued `Job` inside the worker pool. Every
//! successful step persists immediately and is never rolled back by a
//! later failure (forward-only visibility).

pub mod slug;

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::admission::AdmissionGate;
use crate::clients::trace::RequestContext;
use crate::clients::{AnalyzerClient, ClientError, FetcherClient, SchedulerClient};
use crate::clients::scheduler::PublishNotice;
use crate::config::TombstoneConfig;
use crate::domain::{Job, JobKind, TombstoneReason};
use crate::store::{Store, StoreError};
use crate::telemetry::MetricsSink;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("request {0} not found")]
    RequestNotFound(String),

    #[error("fetch failed: {0}")]
    Fetch(ClientError),

    #[error("analyze failed: {0}")]
    Analyze(ClientError),

    #[error("request was cancelled")]
    Cancelled,
}

impl OrchestratorError {
    /// Whether the worker pool should nack this into the retry machinery or
    /// ack it as a terminal `failed-*` outcome (§4.4 transitions 5 & 7, §7).
    pub fn is_retryable(&self) -> bool {
        match self {
            OrchestratorError::Store(_) => true,
            OrchestratorError::RequestNotFound(_) => false,
            OrchestratorError::Fetch(e) | OrchestratorError::Analyze(e) => e.is_retryable(),
            OrchestratorError::Cancelled => false,
        }
    }
}

pub struct Orchestrator {
    store: Arc<Store>,
    fetcher: Arc<dyn FetcherClient>,
    analyzer: Arc<dyn AnalyzerClient>,
    scheduler: Arc<dyn SchedulerClient>,
    admission: Arc<AdmissionGate>,
    tombstones: TombstoneConfig,
    metrics: Arc<MetricsSink>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<Store>,
        fetcher: Arc<dyn FetcherClient>,
        analyzer: Arc<dyn AnalyzerClient>,
        scheduler: Arc<dyn SchedulerClient>,
        admission: Arc<AdmissionGate>,
        tombstones: TombstoneConfig,
        metrics: Arc<MetricsSink>,
    ) -> Self {
        Self {
            store,
            fetcher,
            analyzer,
            scheduler,
            admission,
            tombstones,
            metrics,
        }
    }

    /// Executes one lease of a job to completion, returning an error the
    /// worker pool should translate into a queue nack (retry) when
    /// retryable, or a terminal `failed-*` writeback otherwise.
    pub async fn drive(&self, job: &Job) -> Result<(), OrchestratorError> {
        let request = self
            .store
            .get_request(&job.request_id)?
            .ok_or_else(|| OrchestratorError::RequestNotFound(job.request_id.clone()))?;
        let ctx = RequestContext::new(&request.id);

        if request.metadata.cancelled {
            return Err(OrchestratorError::Cancelled);
        }

        match job.kind {
            JobKind::FetchAndAnalyze => self.run_fetch_and_analyze(&ctx, &job.request_id).await,
            JobKind::AnalyzeOnly => self.run_analyze_only(&ctx, &job.request_id).await,
            JobKind::Rescore => self.run_rescore(&ctx, &job.request_id).await,
        }
    }

    async fn run_fetch_and_analyze(&self, ctx: &RequestContext, request_id: &str) -> Result<(), OrchestratorError> {
        let request = self
            .store
            .get_request(request_id)?
            .ok_or_else(|| OrchestratorError::RequestNotFound(request_id.to_string()))?;
        let url = request
            .source_url
            .clone()
            .ok_or_else(|| OrchestratorError::RequestNotFound(request_id.to_string()))?;

        let fetched = self
            .fetcher
            .fetch(ctx, &url)
            .await
            .map_err(OrchestratorError::Fetch)?;

        if self.is_cancelled(request_id)? {
            return Err(OrchestratorError::Cancelled);
        }

        self.store
            .update_request(request_id, |r| {
                r.scraper_uuid = Some(fetched.scraper_uuid.clone());
                r.metadata.scraper_metadata = Some(fetched.metadata.clone());
            })
            .await?;
        info!(request_id, "fetch stage complete");

        for image in &fetched.images {
            let mut img = crate::domain::Image::new(request_id, Some(image.url.clone()));
            img.tags = image.tags.clone();
            self.store.put_image(&img)?;
        }

        self.analyze_and_index(ctx, request_id, &fetched.text).await
    }

    /// Also used directly by the `POST /api/analyze` synchronous handler,
    /// which runs this inline rather than via a queued job.
    pub async fn run_analyze_only(&self, ctx: &RequestContext, request_id: &str) -> Result<(), OrchestratorError> {
        let request = self
            .store
            .get_request(request_id)?
            .ok_or_else(|| OrchestratorError::RequestNotFound(request_id.to_string()))?;
        let text = request.metadata.text.clone().unwrap_or_default();
        self.analyze_and_index(ctx, request_id, &text).await
    }

    async fn analyze_and_index(&self, ctx: &RequestContext, request_id: &str, text: &str) -> Result<(), OrchestratorError> {
        let analyzed = self
            .analyzer
            .analyze(ctx, text)
            .await
            .map_err(OrchestratorError::Analyze)?;

        if self.is_cancelled(request_id)? {
            return Err(OrchestratorError::Cancelled);
        }

        let request = self
            .store
            .update_request(request_id, |r| {
                r.textanalyzer_uuid = Some(analyzed.textanalyzer_uuid.clone());
                r.metadata.analyzer_metadata = Some(analyzed.metadata.clone());
                for tag in &analyzed.tags {
                    if !r.tags.contains(tag) {
                        r.tags.push(tag.clone());
                    }
                }
            })
            .await?;
        info!(request_id, "analyze stage complete");

        if self.tag_triggers_tombstone(&request.tags) {
            let triggering = request
                .tags
                .iter()
                .find(|t| self.tombstones.tombstone_blocklist_tags.contains(*t))
                .cloned();
            let tombstone = crate::domain::Tombstone::new(
                TombstoneReason::TagBased,
                self.tombstones.duration_for(TombstoneReason::TagBased),
            );
            let tombstone = match triggering {
                Some(tag) => tombstone.with_tag(tag),
                None => tombstone,
            };
            self.store.add_tombstone(request_id, tombstone).await?;
            self.metrics.tombstones_created("tag-based");
            warn!(request_id, "tag-based tombstone created during indexing");
        }

        self.index(ctx, request_id).await
    }

    async fn index(&self, ctx: &RequestContext, request_id: &str) -> Result<(), OrchestratorError> {
        let request = self
            .store
            .get_request(request_id)?
            .ok_or_else(|| OrchestratorError::RequestNotFound(request_id.to_string()))?;

        let base = slug::base_slug_from(
            request
                .metadata
                .analyzer_metadata
                .as_ref()
                .and_then(|m| m.synopsis.clone())
                .or_else(|| request.source_url.clone())
                .unwrap_or_default()
                .as_str(),
        );
        let claimed = self.store.claim_slug(&base, request_id).await?;
        let request = self
            .store
            .update_request(request_id, |r| r.slug = Some(claimed.clone()))
            .await?;
        info!(request_id, slug = %claimed, "indexing complete");

        if request.seo_enabled && !request.is_tombstoned(chrono::Utc::now()) {
            let notice = PublishNotice {
                request_id: request_id.to_string(),
                slug: claimed,
                seo_enabled: true,
            };
            if let Err(err) = self.scheduler.notify_completed(ctx, &notice).await {
                // Best-effort: publish failure never rolls back the
                // completed Request (forward-only visibility).
                warn!(request_id, error = %err, "scheduler notification failed");
            }
        }
        Ok(())
    }

    /// Re-enters at `scoring` for an already-completed Request, bypassing
    /// the fingerprint cache, and only touches `link_score` metadata
    /// (SPEC_FULL.md §4.4) -- it never re-enqueues fetch/analyze.
    async fn run_rescore(&self, ctx: &RequestContext, request_id: &str) -> Result<(), OrchestratorError> {
        let request = self
            .store
            .get_request(request_id)?
            .ok_or_else(|| OrchestratorError::RequestNotFound(request_id.to_string()))?;
        let Some(url) = request.source_url.clone() else {
            return Ok(());
        };
        let (_, decision) = self
            .admission
            .evaluate_url(ctx, &url, true)
            .await
            .map_err(|e| OrchestratorError::Fetch(ClientError::MalformedResponse(e.to_string())))?;

        match decision {
            crate::admission::Decision::Admit(score) => {
                self.store
                    .update_request(request_id, |r| r.metadata.link_score = Some(score))
                    .await?;
            }
            crate::admission::Decision::Reject(score, tombstone) => {
                self.store
                    .update_request(request_id, |r| r.metadata.link_score = Some(score))
                    .await?;
                self.store.add_tombstone(request_id, tombstone).await?;
                self.metrics.tombstones_created("low-score");
            }
        }
        Ok(())
    }

    /// Records a terminal `failed-*` outcome on the Request (§4.4 transitions
    /// 5 & 7): last-error and a failed marker so an admin polling the status
    /// endpoint can tell a stalled request from one still in flight.
    pub async fn mark_failed(&self, request_id: &str, error: &str) -> Result<(), OrchestratorError> {
        self.store
            .update_request(request_id, |r| {
                r.metadata.last_error = Some(error.to_string());
                r.metadata.failed = true;
            })
            .await?;
        Ok(())
    }

    fn is_cancelled(&self, request_id: &str) -> Result<bool, OrchestratorError> {
        Ok(self
            .store
            .get_request(request_id)?
            .map(|r| r.metadata.cancelled)
            .unwrap_or(false))
    }

    fn tag_triggers_tombstone(&self, tags: &[String]) -> bool {
        tags.iter().any(|t| self.tombstones.tombstone_blocklist_tags.contains(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_4xx_is_terminal_but_5xx_and_connection_errors_retry() {
        let terminal = OrchestratorError::Fetch(ClientError::UpstreamStatus { status: 404, body: String::new() });
        assert!(!terminal.is_retryable());

        let retryable = OrchestratorError::Analyze(ClientError::UpstreamStatus { status: 503, body: String::new() });
        assert!(retryable.is_retryable());

        let connection = OrchestratorError::Fetch(ClientError::Connection("refused".to_string()));
        assert!(connection.is_retryable());
    }

    #[test]
    fn request_not_found_and_cancelled_are_not_retried() {
        assert!(!OrchestratorError::RequestNotFound("r1".to_string()).is_retryable());
        assert!(!OrchestratorError::Cancelled.is_retryable());
    }
}
