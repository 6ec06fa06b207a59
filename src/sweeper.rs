//! Background sweep of tombstones, fingerprints, and grace-period Request
//! deletion (SPEC_FULL.md §4.5). The sweeper only ever emits metrics and
//! deletes a whole Request past its grace period -- it never shortens or
//! deletes an individual tombstone.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{error, info};

use crate::config::SweepConfig;
use crate::store::Store;
use crate::telemetry::MetricsSink;

pub fn spawn_sweeper(
    store: Arc<Store>,
    metrics: Arc<MetricsSink>,
    config: SweepConfig,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let interval = StdDuration::from_secs(config.sweep_interval_seconds);
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
            if *shutdown.borrow() {
                break;
            }
            run_sweep(&store, &metrics, &config).await;
        }
    })
}

async fn run_sweep(store: &Arc<Store>, metrics: &Arc<MetricsSink>, config: &SweepConfig) {
    let now = Utc::now();

    let evicted = match store.sweep_expired_fingerprints(now) {
        Ok(count) => count,
        Err(err) => {
            error!(error = %err, "failed to sweep expired fingerprints");
            0
        }
    };
    metrics.fingerprint_evicted(evicted);
    if evicted > 0 {
        info!(evicted, "swept expired url fingerprints");
    }

    let tombstones = match store.list_all_tombstones() {
        Ok(t) => t,
        Err(err) => {
            error!(error = %err, "failed to list tombstones");
            return;
        }
    };
    let active = tombstones
        .iter()
        .filter(|(_, t)| now < t.expires_at)
        .count();
    info!(
        active,
        total = tombstones.len(),
        "tombstone sweep: active vs recorded"
    );

    for (_, tombstone) in &tombstones {
        let reason = tombstone.reason.as_key_str();
        metrics.tombstone_active(reason);
        let assigned_seconds = (tombstone.expires_at - tombstone.created_at).num_seconds() as f64;
        metrics.tombstone_duration_seconds(reason, assigned_seconds);
    }

    let grace = chrono::Duration::days(config.deletion_grace_period_days);
    let mut request_ids: std::collections::HashSet<String> = std::collections::HashSet::new();
    for (request_id, _) in &tombstones {
        request_ids.insert(request_id.clone());
    }
    let mut deleted = 0usize;
    for request_id in request_ids {
        match store.delete_if_past_grace(&request_id, grace, now).await {
            Ok(true) => deleted += 1,
            Ok(false) => {}
            Err(err) => error!(request_id, error = %err, "failed to evaluate request for deletion"),
        }
    }
    if deleted > 0 {
        info!(deleted, "permanently deleted requests past deletion grace period");
    }
}
