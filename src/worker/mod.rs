//! Bounded-concurrency worker pool that drains the job queue and drives
//! the orchestration state machine (SPEC_FULL.md §4.3, §5).
//!
//! Generalizes the teacher's `WorkerConfig`/Tower-Service intent (a
//! `max_inflight_tasks` knob over a task channel) into a semaphore-bounded
//! polling loop over `queue::JobQueue`, since this domain's work unit is a
//! leased, retryable `Job` rather than a one-shot channel message.

pub mod pool;
pub mod reaper;

pub use pool::WorkerPool;
pub use reaper::spawn_reaper;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub concurrency: usize,
    pub poll_interval_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            poll_interval_ms: 500,
        }
    }
}
