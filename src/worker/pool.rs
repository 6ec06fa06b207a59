use std::sync::Arc;
use std::time::Duration as StdDuration;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use super::WorkerConfig;
use crate::orchestrator::{Orchestrator, OrchestratorError};
use crate::queue::JobQueue;
use crate::telemetry::MetricsSink;

/// Polls `JobQueue::dequeue`, fans out onto at most `concurrency` concurrent
/// `Orchestrator::drive` calls, and acks/nacks based on the outcome.
pub struct WorkerPool {
    queue: Arc<JobQueue>,
    orchestrator: Arc<Orchestrator>,
    metrics: Arc<MetricsSink>,
    config: WorkerConfig,
}

impl WorkerPool {
    pub fn new(
        queue: Arc<JobQueue>,
        orchestrator: Arc<Orchestrator>,
        metrics: Arc<MetricsSink>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            orchestrator,
            metrics,
            config,
        }
    }

    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let permits = Arc::new(Semaphore::new(self.config.concurrency));
        let mut tasks = JoinSet::new();
        let poll_interval = StdDuration::from_millis(self.config.poll_interval_ms);

        loop {
            if *shutdown.borrow() {
                break;
            }

            let permit = match Arc::clone(&permits).try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    tokio::select! {
                        _ = tokio::time::sleep(poll_interval) => continue,
                        _ = shutdown.changed() => continue,
                    }
                }
            };

            let job = tokio::select! {
                res = self.queue.dequeue() => res,
                _ = shutdown.changed() => {
                    drop(permit);
                    continue;
                }
            };

            let job = match job {
                Ok(Some(job)) => job,
                Ok(None) => {
                    drop(permit);
                    tokio::select! {
                        _ = tokio::time::sleep(poll_interval) => continue,
                        _ = shutdown.changed() => continue,
                    }
                }
                Err(err) => {
                    drop(permit);
                    error!(error = %err, "failed to dequeue job");
                    tokio::time::sleep(poll_interval).await;
                    continue;
                }
            };

            let queue = Arc::clone(&self.queue);
            let orchestrator = Arc::clone(&self.orchestrator);
            let metrics = Arc::clone(&self.metrics);

            tasks.spawn(async move {
                let _permit = permit;
                let kind = job.kind.as_key_str();
                let started = std::time::Instant::now();

                match orchestrator.drive(&job).await {
                    Ok(()) => {
                        if let Err(err) = queue.ack(&job.id).await {
                            error!(job_id = %job.id, error = %err, "failed to ack completed job");
                        }
                        metrics.job_completed(kind);
                        metrics.job_duration_seconds(kind, started.elapsed().as_secs_f64());
                        info!(job_id = %job.id, kind, "job completed");
                    }
                    Err(OrchestratorError::Cancelled) => {
                        if let Err(err) = queue.ack(&job.id).await {
                            error!(job_id = %job.id, error = %err, "failed to ack cancelled job");
                        }
                        info!(job_id = %job.id, "job discarded, request cancelled");
                    }
                    Err(err) => {
                        let message = err.to_string();
                        if err.is_retryable() {
                            warn!(job_id = %job.id, kind, error = %message, "job failed, scheduling retry");
                            match queue.nack(&job, message.clone()).await {
                                Ok(state) => {
                                    let terminal = state == crate::domain::JobState::Deadletter;
                                    metrics.job_failed(kind, terminal);
                                    if terminal {
                                        if let Err(err) = orchestrator.mark_failed(&job.request_id, &message).await {
                                            error!(job_id = %job.id, error = %err, "failed to write back deadletter failure");
                                        }
                                    }
                                }
                                Err(err) => error!(job_id = %job.id, error = %err, "failed to record job failure"),
                            }
                        } else {
                            warn!(job_id = %job.id, kind, error = %message, "job failed with a non-retryable error, terminating without retry");
                            if let Err(err) = queue.fail(&job.id, message.clone()).await {
                                error!(job_id = %job.id, error = %err, "failed to deadletter job");
                            }
                            metrics.job_failed(kind, true);
                            if let Err(err) = orchestrator.mark_failed(&job.request_id, &message).await {
                                error!(job_id = %job.id, error = %err, "failed to write back terminal failure");
                            }
                        }
                    }
                }
            });

            while tasks.len() >= self.config.concurrency {
                tasks.join_next().await;
            }
        }

        while tasks.join_next().await.is_some() {}
    }
}
