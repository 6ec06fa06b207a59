use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request as HttpRequest, StatusCode};
use axum::Router;
use tempfile::TempDir;
use tower::ServiceExt; // for `oneshot`

use ingestor::admission::AdmissionGate;
use ingestor::api::state::AppState;
use ingestor::api::{build_router, error::ErrorKind};
use ingestor::clients::analyzer::{AnalyzeResponse, AnalyzerClient};
use ingestor::clients::fetcher::{FetchResponse, FetcherClient, ScoreResponse};
use ingestor::clients::scheduler::{PublishNotice, SchedulerClient};
use ingestor::clients::trace::RequestContext;
use ingestor::clients::ClientError;
use ingestor::config::Config;
use ingestor::domain::AnalyzerMetadata;
use ingestor::orchestrator::Orchestrator;
use ingestor::queue::JobQueue;
use ingestor::store::Store;
use ingestor::telemetry::MetricsSink;

/// A `FetcherClient` whose score and availability are controlled by the
/// test, mirroring the `StubFetcher` pattern in `admission::tests`.
struct StubFetcher {
    score: f64,
    unavailable: AtomicBool,
}

impl StubFetcher {
    fn new(score: f64) -> Self {
        Self {
            score,
            unavailable: AtomicBool::new(false),
        }
    }

    fn fail_next(&self) {
        self.unavailable.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl FetcherClient for StubFetcher {
    async fn score(&self, _ctx: &RequestContext, _url: &str) -> Result<ScoreResponse, ClientError> {
        if self.unavailable.swap(false, Ordering::SeqCst) {
            return Err(ClientError::Connection("fetcher unreachable".to_string()));
        }
        Ok(ScoreResponse {
            score: self.score,
            reason: "stub".to_string(),
            categories: vec![],
            malicious_indicators: vec![],
        })
    }

    async fn fetch(&self, _ctx: &RequestContext, url: &str) -> Result<FetchResponse, ClientError> {
        Ok(FetchResponse {
            scraper_uuid: uuid::Uuid::new_v4().to_string(),
            text: format!("fetched content for {url}"),
            images: vec![],
            metadata: serde_json::json!({}),
        })
    }
}

struct StubAnalyzer;

#[async_trait]
impl AnalyzerClient for StubAnalyzer {
    async fn analyze(&self, _ctx: &RequestContext, text: &str) -> Result<AnalyzeResponse, ClientError> {
        Ok(AnalyzeResponse {
            textanalyzer_uuid: uuid::Uuid::new_v4().to_string(),
            tags: vec!["stub".to_string()],
            metadata: AnalyzerMetadata {
                word_count: text.split_whitespace().count(),
                sentiment: Some("neutral".to_string()),
                readability_score: Some(50.0),
                tags: vec!["stub".to_string()],
                quality_score: Some(0.8),
                synopsis: Some("a stub synopsis".to_string()),
                ai_detection: Some(0.1),
            },
        })
    }
}

struct StubScheduler;

#[async_trait]
impl SchedulerClient for StubScheduler {
    async fn notify_completed(&self, _ctx: &RequestContext, _notice: &PublishNotice) -> Result<(), ClientError> {
        Ok(())
    }
}

/// Builds a router over a temp-directory store and stub worker clients, the
/// way the teacher wires `FjallStore`/`StorageClient` into a test `AppState`.
fn build_test_app(fetcher_score: f64) -> (Router, Arc<StubFetcher>, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(Store::open(dir.path().join("store")).unwrap());
    let config = Arc::new(Config::default());
    let metrics = Arc::new(MetricsSink::install());

    let fetcher = Arc::new(StubFetcher::new(fetcher_score));
    let analyzer: Arc<dyn AnalyzerClient> = Arc::new(StubAnalyzer);
    let scheduler: Arc<dyn SchedulerClient> = Arc::new(StubScheduler);

    let admission = Arc::new(AdmissionGate::new(
        Arc::clone(&store),
        fetcher.clone() as Arc<dyn FetcherClient>,
        Arc::clone(&metrics),
        config.pipeline.clone(),
        config.tombstones.clone(),
    ));
    let queue = Arc::new(JobQueue::new(Arc::clone(&store), config.retry.clone()));
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&store),
        fetcher.clone() as Arc<dyn FetcherClient>,
        Arc::clone(&analyzer),
        Arc::clone(&scheduler),
        Arc::clone(&admission),
        config.tombstones.clone(),
        Arc::clone(&metrics),
    ));

    let state = AppState::new(
        config,
        store,
        queue,
        admission,
        orchestrator,
        fetcher.clone() as Arc<dyn FetcherClient>,
        analyzer,
        scheduler,
        metrics,
    );

    (build_router(state), fetcher, dir)
}

fn post(uri: &str, body: serde_json::Value) -> HttpRequest<Body> {
    HttpRequest::builder()
        .uri(uri)
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

#[tokio::test]
async fn health_endpoint_reports_healthy() {
    let (app, _fetcher, _dir) = build_test_app(0.9);

    let response = app
        .oneshot(HttpRequest::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn scrape_with_empty_url_is_rejected() {
    let (app, _fetcher, _dir) = build_test_app(0.9);

    let response = app
        .oneshot(post("/api/scrape", serde_json::json!({ "url": "" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["kind"], serde_json::to_value(ErrorKind::Validation).unwrap());
}

/// A well-scored URL is admitted, persisted and queued for fetch-and-analyze.
#[tokio::test]
async fn good_url_is_admitted_and_queued() {
    let (app, _fetcher, _dir) = build_test_app(0.9);

    let response = app
        .oneshot(post("/api/scrape", serde_json::json!({ "url": "https://example.com/article" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let request: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(request["metadata"]["below_threshold"], false);
    assert!(request["metadata"]["link_score"]["is_recommended"].as_bool().unwrap());
}

/// The async poll endpoint reports a coarse pipeline state alongside the
/// Request snapshot, so a caller can tell queued-but-not-yet-fetched apart
/// from a terminal outcome without inspecting metadata fields directly.
#[tokio::test]
async fn scrape_status_reports_fetching_state_before_worker_runs() {
    let (app, _fetcher, _dir) = build_test_app(0.9);

    let scrape_response = app
        .clone()
        .oneshot(post("/api/scrape", serde_json::json!({ "url": "https://example.com/poll-me" })))
        .await
        .unwrap();
    let body = axum::body::to_bytes(scrape_response.into_body(), usize::MAX).await.unwrap();
    let request: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let id = request["id"].as_str().unwrap();

    let status_response = app
        .oneshot(
            HttpRequest::builder()
                .uri(format!("/api/scrape-requests/{id}"))
                .method("GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(status_response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(status_response.into_body(), usize::MAX).await.unwrap();
    let status: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(status["state"], "fetching");
    assert_eq!(status["id"], id);
}

/// A low-scored URL is rejected and tombstoned rather than queued.
#[tokio::test]
async fn low_score_url_is_rejected_and_tombstoned() {
    let (app, _fetcher, _dir) = build_test_app(0.1);

    let response = app
        .oneshot(post("/api/scrape", serde_json::json!({ "url": "https://example.com/spam" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let request: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(request["metadata"]["below_threshold"], true);
    assert!(!request["metadata"]["tombstones"].as_array().unwrap().is_empty());
}

/// A fetcher outage on the scorer call is treated as score 0.0, not an error.
#[tokio::test]
async fn transient_fetcher_outage_degrades_to_rejection_not_failure() {
    let (app, fetcher, _dir) = build_test_app(0.9);
    fetcher.fail_next();

    let response = app
        .oneshot(post("/api/scrape", serde_json::json!({ "url": "https://example.com/flaky" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let request: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(request["metadata"]["below_threshold"], true);
    assert_eq!(request["metadata"]["link_score"]["reason"], "scorer-unavailable");
}

/// `POST /api/score` evaluates a URL without ever creating a Request.
#[tokio::test]
async fn score_endpoint_does_not_create_a_request() {
    let (app, _fetcher, _dir) = build_test_app(0.9);

    let response = app
        .oneshot(post("/api/score", serde_json::json!({ "url": "https://example.com/check" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let list_response = app
        .clone()
        .oneshot(HttpRequest::builder().uri("/api/requests").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = axum::body::to_bytes(list_response.into_body(), usize::MAX).await.unwrap();
    let listing: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(listing["total"], 0);
}

/// `POST /api/analyze` runs synchronously and returns the completed Request
/// inline, without going through the job queue.
#[tokio::test]
async fn analyze_sync_returns_completed_request() {
    let (app, _fetcher, _dir) = build_test_app(0.9);

    let response = app
        .oneshot(post("/api/analyze", serde_json::json!({ "text": "some raw text to analyze" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let request: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(request["textanalyzer_uuid"].is_string());
    assert!(request["slug"].is_string());
}

#[tokio::test]
async fn get_unknown_request_is_not_found() {
    let (app, _fetcher, _dir) = build_test_app(0.9);

    let response = app
        .oneshot(
            HttpRequest::builder()
                .uri("/api/requests/does-not-exist")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// A manually-applied tombstone suppresses the request from public content
/// immediately, independent of the admission gate's own tombstones.
#[tokio::test]
async fn manual_tombstone_suppresses_public_content() {
    let (app, _fetcher, _dir) = build_test_app(0.9);

    let scrape_response = app
        .clone()
        .oneshot(post(
            "/api/scrape",
            serde_json::json!({ "url": "https://example.com/to-tombstone", "seo_enabled": true }),
        ))
        .await
        .unwrap();
    let body = axum::body::to_bytes(scrape_response.into_body(), usize::MAX).await.unwrap();
    let request: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let id = request["id"].as_str().unwrap();

    let tombstone_response = app
        .clone()
        .oneshot(
            HttpRequest::builder()
                .uri(format!("/api/requests/{id}/tombstone"))
                .method("PUT")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&serde_json::json!({ "operator": "on-call" })).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(tombstone_response.status(), StatusCode::OK);

    let get_response = app
        .oneshot(
            HttpRequest::builder()
                .uri(format!("/api/requests/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = axum::body::to_bytes(get_response.into_body(), usize::MAX).await.unwrap();
    let refreshed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(refreshed["metadata"]["tombstones"].as_array().unwrap().len(), 1);
}

/// Cancelling a pending request is reflected immediately, ahead of any
/// worker ever picking up its queued job.
#[tokio::test]
async fn cancelling_a_pending_request_marks_it_cancelled() {
    let (app, _fetcher, _dir) = build_test_app(0.9);

    let scrape_response = app
        .clone()
        .oneshot(post("/api/scrape", serde_json::json!({ "url": "https://example.com/cancel-me" })))
        .await
        .unwrap();
    let body = axum::body::to_bytes(scrape_response.into_body(), usize::MAX).await.unwrap();
    let request: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let id = request["id"].as_str().unwrap();

    let cancel_response = app
        .oneshot(
            HttpRequest::builder()
                .uri(format!("/api/scrape-requests/{id}"))
                .method("DELETE")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(cancel_response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(cancel_response.into_body(), usize::MAX).await.unwrap();
    let cancelled: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(cancelled["metadata"]["cancelled"], true);
}
