//! Explicitly injected metrics sink, replacing the ambient/global metrics
//! registry pattern (SPEC_FULL.md §9 REDESIGN FLAG). The teacher's
//! `observability.rs` already injects an ad hoc `AtomicU64`-counter
//! `Metrics` struct via `AppState` rather than a process global; this
//! module keeps that injection discipline but backs it with the `metrics`
//! facade and renders Prometheus text the way
//! `doublewordai-control-layer/dwctl`'s `metrics/cache_info.rs` does.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Constructed once at startup and handed to every component that emits
/// metrics. Nothing reads from a process-global registry.
#[derive(Clone)]
pub struct MetricsSink {
    handle: Arc<PrometheusHandle>,
}

static RECORDER_HANDLE: OnceLock<Arc<PrometheusHandle>> = OnceLock::new();

impl MetricsSink {
    /// `metrics`'s global recorder can only be installed once per process;
    /// tests that build a fresh `AdmissionGate`/`AppState` per case all call
    /// this, so the actual install happens once and later calls just clone
    /// the cached handle.
    pub fn install() -> Self {
        let handle = RECORDER_HANDLE
            .get_or_init(|| {
                Arc::new(
                    PrometheusBuilder::new()
                        .install_recorder()
                        .expect("failed to install prometheus recorder"),
                )
            })
            .clone();
        Self { handle }
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }

    pub fn request_admitted(&self) {
        metrics::counter!("ingestor_requests_admitted_total").increment(1);
    }

    pub fn request_rejected(&self, reason: &'static str) {
        metrics::counter!("ingestor_requests_rejected_total", "reason" => reason).increment(1);
    }

    pub fn request_overloaded(&self) {
        metrics::counter!("ingestor_requests_overloaded_total").increment(1);
    }

    pub fn job_enqueued(&self, kind: &'static str) {
        metrics::counter!("ingestor_jobs_enqueued_total", "kind" => kind).increment(1);
    }

    pub fn job_completed(&self, kind: &'static str) {
        metrics::counter!("ingestor_jobs_completed_total", "kind" => kind).increment(1);
    }

    pub fn job_failed(&self, kind: &'static str, terminal: bool) {
        metrics::counter!(
            "ingestor_jobs_failed_total",
            "kind" => kind,
            "terminal" => if terminal { "true" } else { "false" }
        )
        .increment(1);
    }

    pub fn job_duration_seconds(&self, kind: &'static str, seconds: f64) {
        metrics::histogram!("ingestor_job_duration_seconds", "kind" => kind).record(seconds);
    }

    pub fn queue_depth(&self, depth: usize) {
        metrics::gauge!("ingestor_queue_depth").set(depth as f64);
    }

    pub fn leases_reclaimed(&self, count: usize) {
        if count > 0 {
            metrics::counter!("ingestor_leases_reclaimed_total").increment(count as u64);
        }
    }

    pub fn tombstones_created(&self, reason: &'static str) {
        metrics::counter!("ingestor_tombstones_created_total", "reason" => reason).increment(1);
    }

    /// Recorded by the sweeper for every tombstone it scans, not just newly
    /// created ones, so the count-by-reason gauge reflects the full record
    /// (§4.5).
    pub fn tombstone_active(&self, reason: &'static str) {
        metrics::counter!("ingestor_tombstones_active_total", "reason" => reason).increment(1);
    }

    pub fn tombstone_duration_seconds(&self, reason: &'static str, seconds: f64) {
        metrics::histogram!("ingestor_tombstone_duration_seconds", "reason" => reason).record(seconds);
    }

    pub fn fingerprint_evicted(&self, count: usize) {
        if count > 0 {
            metrics::counter!("ingestor_fingerprints_evicted_total").increment(count as u64);
        }
    }

    pub fn client_retry(&self, client: &'static str) {
        metrics::counter!("ingestor_worker_client_retries_total", "client" => client).increment(1);
    }
}

pub async fn serve_metrics(sink: MetricsSink, path: String, addr: SocketAddr) -> std::io::Result<()> {
    use axum::routing::get;
    use axum::Router;

    let app = Router::new().route(
        &path,
        get(move || {
            let sink = sink.clone();
            async move { sink.render() }
        }),
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, %path, "metrics endpoint listening");
    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_recorded_counters() {
        let sink = MetricsSink::install();
        sink.request_admitted();
        let output = sink.render();
        assert!(output.contains("ingestor_requests_admitted_total"));
    }
}
