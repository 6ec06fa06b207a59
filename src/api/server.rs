use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handlers::{analyze, health, requests, scrape, score, search, seo};
use super::state::AppState;
use crate::admission::AdmissionGate;
use crate::clients::analyzer::HttpAnalyzerClient;
use crate::clients::fetcher::HttpFetcherClient;
use crate::clients::scheduler::HttpSchedulerClient;
use crate::config::Config;
use crate::orchestrator::Orchestrator;
use crate::queue::JobQueue;
use crate::shutdown::wait_for_signal;
use crate::store::Store;
use crate::sweeper::spawn_sweeper;
use crate::telemetry::{serve_metrics, MetricsSink};
use crate::worker::{spawn_reaper, WorkerConfig, WorkerPool};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/scrape", post(scrape::submit_scrape))
        .route("/api/scrape-requests/{id}", get(scrape::get_scrape_status))
        .route("/api/scrape-requests/{id}", delete(scrape::cancel_scrape))
        .route("/api/analyze", post(analyze::submit_analyze_sync))
        .route("/api/analyze-requests", post(analyze::submit_analyze_async))
        .route("/api/score", post(score::score_url))
        .route("/api/requests/{id}", get(requests::get_request))
        .route("/api/requests", get(requests::list_requests))
        .route("/api/requests/{id}/tombstone", put(requests::tombstone_request))
        .route("/api/search", post(search::search_requests))
        .route("/api/images/search", post(search::search_images))
        .route("/api/documents/{uuid}/images", get(search::images_for_request))
        .route("/content/{slug}", get(seo::public_content))
        .route("/sitemap.xml", get(seo::sitemap))
        .route("/images-sitemap.xml", get(seo::images_sitemap))
        .route("/robots.txt", get(seo::robots))
        .route("/health", get(health::health))
        .with_state(state)
        .layer(RequestDecompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Boots the HTTP API, worker pool, reaper, sweeper and metrics endpoint
/// in one process, the "resident process" framing of SPEC_FULL.md §2.1.
pub async fn run(config: Config) -> Result<(), AnyError> {
    let config = Arc::new(config);

    info!(path = %config.server.store_path, "opening store");
    let store = Arc::new(Store::open(&config.server.store_path)?);

    let metrics = Arc::new(MetricsSink::install());

    let fetcher: Arc<dyn crate::clients::FetcherClient> = Arc::new(HttpFetcherClient::new(
        config.addresses.fetcher_base_url.clone(),
        Duration::from_secs(config.timeouts.fetcher_timeout_seconds),
        Duration::from_secs(config.timeouts.scorer_timeout_seconds),
    ));
    let analyzer: Arc<dyn crate::clients::AnalyzerClient> = Arc::new(HttpAnalyzerClient::new(
        config.addresses.analyzer_base_url.clone(),
        Duration::from_secs(config.timeouts.analyzer_timeout_seconds),
    ));
    let scheduler: Arc<dyn crate::clients::SchedulerClient> = Arc::new(HttpSchedulerClient::new(
        config.addresses.scheduler_base_url.clone(),
        Duration::from_secs(config.timeouts.analyzer_timeout_seconds),
    ));

    let admission = Arc::new(AdmissionGate::new(
        Arc::clone(&store),
        Arc::clone(&fetcher),
        Arc::clone(&metrics),
        config.pipeline.clone(),
        config.tombstones.clone(),
    ));
    let queue = Arc::new(JobQueue::new(Arc::clone(&store), config.retry.clone()));
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&store),
        Arc::clone(&fetcher),
        Arc::clone(&analyzer),
        Arc::clone(&scheduler),
        Arc::clone(&admission),
        config.tombstones.clone(),
        Arc::clone(&metrics),
    ));

    let state = AppState::new(
        Arc::clone(&config),
        Arc::clone(&store),
        Arc::clone(&queue),
        Arc::clone(&admission),
        Arc::clone(&orchestrator),
        fetcher,
        analyzer,
        scheduler,
        Arc::clone(&metrics),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker_pool = Arc::new(WorkerPool::new(
        Arc::clone(&queue),
        Arc::clone(&orchestrator),
        Arc::clone(&metrics),
        WorkerConfig {
            concurrency: config.pipeline.worker_concurrency,
            poll_interval_ms: config.pipeline.poll_interval_ms,
        },
    ));
    let worker_handle = tokio::spawn(Arc::clone(&worker_pool).run(shutdown_rx.clone()));
    let reaper_handle = spawn_reaper(
        Arc::clone(&queue),
        Arc::clone(&metrics),
        config.retry.reaper_interval_seconds,
        shutdown_rx.clone(),
    );
    let sweeper_handle = spawn_sweeper(
        Arc::clone(&store),
        Arc::clone(&metrics),
        config.sweep.clone(),
        shutdown_rx.clone(),
    );

    let metrics_addr = config.server.metrics_addr;
    let metrics_path = config.server.metrics_path.clone();
    let metrics_sink = (*metrics).clone();
    let metrics_handle = tokio::spawn(async move {
        if let Err(err) = serve_metrics(metrics_sink, metrics_path, metrics_addr).await {
            tracing::error!(error = %err, "metrics endpoint failed");
        }
    });

    let app = build_router(state);
    let listener = TcpListener::bind(config.server.bind_addr).await?;
    info!(addr = %config.server.bind_addr, "ingestor listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(wait_for_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    let drain_deadline = Duration::from_secs(config.server.drain_deadline_seconds);
    if tokio::time::timeout(drain_deadline, worker_handle).await.is_err() {
        tracing::warn!("worker pool did not drain within the deadline");
    }
    reaper_handle.abort();
    sweeper_handle.abort();
    metrics_handle.abort();
    store.persist()?;

    Ok(())
}
