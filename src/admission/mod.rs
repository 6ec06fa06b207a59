//! Admission-control quality gate (SPEC_FULL.md §4.2). Decides whether an
//! inbound submission is worth enqueueing, using a URL fingerprint cache to
//! avoid repeat scorer calls within its TTL.

pub mod canonicalize;

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, warn};

use crate::clients::trace::RequestContext;
use crate::clients::{ClientError, FetcherClient};
use crate::config::{PipelineConfig, TombstoneConfig};
use crate::domain::{FingerprintOutcome, LinkScore, Tombstone, TombstoneReason, UrlFingerprint};
use crate::store::Store;
use crate::telemetry::MetricsSink;

/// One minute, per SPEC_FULL.md §4.2: scorer timeouts are cached briefly so
/// a transient outage isn't pinned for the normal low-score duration.
const SCORER_UNAVAILABLE_CACHE_SECONDS: i64 = 60;
const ACCEPTED_CACHE_SECONDS: i64 = 3600;

#[derive(Debug, Clone)]
pub enum Decision {
    Admit(LinkScore),
    Reject(LinkScore, Tombstone),
}

pub struct AdmissionGate {
    store: Arc<Store>,
    fetcher: Arc<dyn FetcherClient>,
    metrics: Arc<MetricsSink>,
    pipeline: PipelineConfig,
    tombstones: TombstoneConfig,
}

impl AdmissionGate {
    pub fn new(
        store: Arc<Store>,
        fetcher: Arc<dyn FetcherClient>,
        metrics: Arc<MetricsSink>,
        pipeline: PipelineConfig,
        tombstones: TombstoneConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            metrics,
            pipeline,
            tombstones,
        }
    }

    /// Evaluates a URL submission, consulting and refreshing the
    /// fingerprint cache, bypassing it only when `force_rescore` is set
    /// (used by the `rescore` job kind, SPEC_FULL.md §4.4).
    pub async fn evaluate_url(
        &self,
        ctx: &RequestContext,
        raw_url: &str,
        force_rescore: bool,
    ) -> Result<(String, Decision), url::ParseError> {
        let canonical_url = canonicalize::canonicalize(raw_url)?;
        let now = Utc::now();

        if !force_rescore {
            if let Ok(Some(fp)) = self.store.get_fingerprint(&canonical_url) {
                if !fp.is_expired(now) {
                    debug!(url = %canonical_url, "fingerprint cache hit, skipping scorer call");
                    return Ok((canonical_url, self.decision_from_cache(&fp)));
                }
            }
        }

        let score = match self.fetcher.score(ctx, &canonical_url).await {
            Ok(score) => LinkScore {
                score: score.score,
                reason: score.reason,
                categories: score.categories,
                is_recommended: score.score >= self.pipeline.link_score_threshold,
                malicious_indicators: score.malicious_indicators,
            },
            Err(err) => {
                warn!(url = %canonical_url, error = %err, "scorer unavailable, treating as score 0.0");
                LinkScore {
                    score: 0.0,
                    reason: "scorer-unavailable".to_string(),
                    categories: Vec::new(),
                    is_recommended: false,
                    malicious_indicators: Vec::new(),
                }
            }
        };

        let decision = self.decide(score);
        self.cache_decision(&canonical_url, &decision, now);
        Ok((canonical_url, decision))
    }

    fn decide(&self, score: LinkScore) -> Decision {
        let rejected = score.score < self.pipeline.link_score_threshold || !score.malicious_indicators.is_empty();
        if rejected {
            let tombstone = Tombstone::new(
                TombstoneReason::LowScore,
                self.tombstones.duration_for(TombstoneReason::LowScore),
            );
            self.metrics.request_rejected("low-score");
            Decision::Reject(score, tombstone)
        } else {
            self.metrics.request_admitted();
            Decision::Admit(score)
        }
    }

    fn decision_from_cache(&self, fp: &UrlFingerprint) -> Decision {
        let score = LinkScore {
            score: fp.score,
            reason: "cached".to_string(),
            categories: Vec::new(),
            is_recommended: fp.outcome == FingerprintOutcome::Accepted,
            malicious_indicators: Vec::new(),
        };
        match fp.outcome {
            FingerprintOutcome::Accepted => Decision::Admit(score),
            _ => {
                let tombstone = Tombstone::new(
                    TombstoneReason::LowScore,
                    self.tombstones.duration_for(TombstoneReason::LowScore),
                );
                Decision::Reject(score, tombstone)
            }
        }
    }

    fn cache_decision(&self, canonical_url: &str, decision: &Decision, now: chrono::DateTime<Utc>) {
        let (outcome, score, ttl) = match decision {
            Decision::Admit(score) if score.reason == "scorer-unavailable" => {
                (FingerprintOutcome::RejectedLowScore, score.score, Duration::seconds(SCORER_UNAVAILABLE_CACHE_SECONDS))
            }
            Decision::Admit(score) => (FingerprintOutcome::Accepted, score.score, Duration::seconds(ACCEPTED_CACHE_SECONDS)),
            Decision::Reject(score, _) if score.reason == "scorer-unavailable" => {
                (FingerprintOutcome::RejectedLowScore, score.score, Duration::seconds(SCORER_UNAVAILABLE_CACHE_SECONDS))
            }
            Decision::Reject(score, _) => (FingerprintOutcome::RejectedLowScore, score.score, Duration::days(self.tombstones.tombstone_days_low_score)),
        };
        let fp = UrlFingerprint {
            canonical_url: canonical_url.to_string(),
            first_seen: now,
            last_seen: now,
            outcome,
            score,
            expires_at: now + ttl,
        };
        if let Err(err) = self.store.put_fingerprint(&fp) {
            warn!(url = canonical_url, error = %err, "failed to persist url fingerprint");
        }
    }

    /// Backpressure check (§5): rejects before any scoring call is made.
    pub fn is_overloaded(&self, pending: usize) -> bool {
        pending >= self.pipeline.queue_high_water
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::fetcher::{FetchResponse, ScoreResponse};
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct StubFetcher {
        score: f64,
        malicious: Vec<String>,
    }

    #[async_trait]
    impl FetcherClient for StubFetcher {
        async fn score(&self, _ctx: &RequestContext, _url: &str) -> Result<ScoreResponse, ClientError> {
            Ok(ScoreResponse {
                score: self.score,
                reason: "stub".to_string(),
                categories: vec![],
                malicious_indicators: self.malicious.clone(),
            })
        }

        async fn fetch(&self, _ctx: &RequestContext, _url: &str) -> Result<FetchResponse, ClientError> {
            unimplemented!()
        }
    }

    fn gate(score: f64, malicious: Vec<String>) -> (AdmissionGate, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(Store::open(dir.path().join("store")).unwrap());
        let fetcher = Arc::new(StubFetcher { score, malicious });
        let metrics = Arc::new(MetricsSink::install());
        (
            AdmissionGate::new(store, fetcher, metrics, PipelineConfig::default(), TombstoneConfig::default()),
            dir,
        )
    }

    #[tokio::test]
    async fn score_at_threshold_is_admitted() {
        let (gate, _dir) = gate(0.5, vec![]);
        let ctx = RequestContext::new("req-1");
        let (_, decision) = gate.evaluate_url(&ctx, "https://example.com", false).await.unwrap();
        assert!(matches!(decision, Decision::Admit(_)));
    }

    #[tokio::test]
    async fn malicious_indicator_rejects_regardless_of_score() {
        let (gate, _dir) = gate(0.9, vec!["phishing".to_string()]);
        let ctx = RequestContext::new("req-1");
        let (_, decision) = gate.evaluate_url(&ctx, "https://example.com", false).await.unwrap();
        assert!(matches!(decision, Decision::Reject(..)));
    }

    #[tokio::test]
    async fn second_submission_within_ttl_does_not_call_scorer_again() {
        let (gate, _dir) = gate(0.9, vec![]);
        let ctx = RequestContext::new("req-1");
        let (canonical, _) = gate.evaluate_url(&ctx, "https://example.com/a?utm_source=x", false).await.unwrap();
        let fp_before = gate.store.get_fingerprint(&canonical).unwrap().unwrap();
        let (_, decision) = gate.evaluate_url(&ctx, "https://example.com/a?utm_source=y", false).await.unwrap();
        let fp_after = gate.store.get_fingerprint(&canonical).unwrap().unwrap();
        assert_eq!(fp_before.first_seen, fp_after.first_seen);
        assert!(matches!(decision, Decision::Admit(_)));
    }
}
