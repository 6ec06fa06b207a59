use std::sync::Arc;
use std::time::Duration as StdDuration;

use tokio::sync::watch;
use tracing::{error, info};

use crate::queue::JobQueue;
use crate::telemetry::MetricsSink;

/// Periodically reclaims jobs whose lease expired without an ack/nack
/// (SPEC_FULL.md §4.3) -- the worker that held them is presumed dead.
pub fn spawn_reaper(
    queue: Arc<JobQueue>,
    metrics: Arc<MetricsSink>,
    interval_seconds: u64,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let interval = StdDuration::from_secs(interval_seconds);
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
            match queue.reap().await {
                Ok(count) if count > 0 => {
                    metrics.leases_reclaimed(count);
                    info!(count, "reclaimed expired job leases");
                }
                Ok(_) => {}
                Err(err) => error!(error = %err, "lease reaper failed"),
            }
        }
    })
}
