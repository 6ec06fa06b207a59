use std::sync::Arc;

use crate::admission::AdmissionGate;
use crate::clients::{AnalyzerClient, FetcherClient, SchedulerClient};
use crate::config::Config;
use crate::orchestrator::Orchestrator;
use crate::queue::JobQueue;
use crate::store::Store;
use crate::telemetry::MetricsSink;

/// Shared, `Arc`-wrapped handles to every stateful component, the way the
/// teacher's `AppState` bundles `FjallStore`/`StorageClient`/`TaskBroker`
/// behind `Clone` for axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<Store>,
    pub queue: Arc<JobQueue>,
    pub admission: Arc<AdmissionGate>,
    pub orchestrator: Arc<Orchestrator>,
    pub fetcher: Arc<dyn FetcherClient>,
    pub analyzer: Arc<dyn AnalyzerClient>,
    pub scheduler: Arc<dyn SchedulerClient>,
    pub metrics: Arc<MetricsSink>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<Config>,
        store: Arc<Store>,
        queue: Arc<JobQueue>,
        admission: Arc<AdmissionGate>,
        orchestrator: Arc<Orchestrator>,
        fetcher: Arc<dyn FetcherClient>,
        analyzer: Arc<dyn AnalyzerClient>,
        scheduler: Arc<dyn SchedulerClient>,
        metrics: Arc<MetricsSink>,
    ) -> Self {
        Self {
            config,
            store,
            queue,
            admission,
            orchestrator,
            fetcher,
            analyzer,
            scheduler,
            metrics,
        }
    }
}
