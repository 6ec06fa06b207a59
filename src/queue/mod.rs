//! Durable job-queue contract on top of `store::Store` (SPEC_FULL.md §4.3).
//!
//! This module owns only the scheduling policy (backoff, attempt limits);
//! the durable dequeue/ack/nack/lease mechanics live in `store::Store`
//! itself, generalizing the teacher's `queue::broker::TaskBroker`
//! persist-then-distribute split into a pull-based lease model.

pub mod backoff;

use std::sync::Arc;

use chrono::Utc;

use crate::config::models::RetryConfig;
use crate::domain::{Job, JobKind, JobState};
use crate::store::{Result, Store};

#[derive(Clone)]
pub struct JobQueue {
    store: Arc<Store>,
    retry: RetryConfig,
}

impl JobQueue {
    pub fn new(store: Arc<Store>, retry: RetryConfig) -> Self {
        Self { store, retry }
    }

    pub async fn enqueue(
        &self,
        request_id: impl Into<String>,
        kind: JobKind,
        payload: serde_json::Value,
    ) -> Result<String> {
        let job = Job::new(request_id, kind, payload);
        self.store.enqueue_job(job).await
    }

    pub async fn dequeue(&self) -> Result<Option<Job>> {
        self.store
            .dequeue_job(chrono::Duration::seconds(self.retry.lease_duration_seconds as i64))
            .await
    }

    pub async fn ack(&self, job_id: &str) -> Result<()> {
        self.store.ack_job(job_id).await
    }

    /// Returns the job's terminal or retried state after recording the
    /// failure and computing the next backoff deadline.
    pub async fn nack(&self, job: &Job, error: impl Into<String>) -> Result<JobState> {
        let delay = backoff::next_delay(job.attempt, &self.retry);
        self.store
            .nack_job(&job.id, error, self.retry.max_attempts, Utc::now() + delay)
            .await
    }

    /// Deadletters a job immediately, bypassing the retry/backoff machinery,
    /// for errors §7 classifies as non-retryable (e.g. a 4xx from a worker
    /// client).
    pub async fn fail(&self, job_id: &str, error: impl Into<String>) -> Result<()> {
        self.store.fail_job(job_id, error).await
    }

    pub async fn reap(&self) -> Result<usize> {
        self.store.reap_expired_leases().await
    }

    pub async fn cancel_pending(&self, request_id: &str) -> Result<()> {
        self.store.cancel_pending_jobs(request_id).await
    }

    pub fn pending_count(&self) -> Result<usize> {
        self.store.pending_job_count()
    }

    pub fn is_overloaded(&self, high_water: usize) -> Result<bool> {
        Ok(self.pending_count()? >= high_water)
    }
}
