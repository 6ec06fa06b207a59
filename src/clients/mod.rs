//! External worker clients: Fetcher, Analyzer, Scheduler (SPEC_FULL.md
//! §1, §4.6). Each is a thin `reqwest`-backed struct sharing one retry
//! helper, generalized from the teacher's `worker::http::HttpClient::download`
//! retry loop with jitter added (`queue::backoff`) and W3C trace-context
//! propagation modeled on `other_examples`' `trace_context::propagate_trace_context`.

pub mod analyzer;
pub mod error;
pub mod fetcher;
pub mod scheduler;
pub mod trace;

pub use analyzer::AnalyzerClient;
pub use error::ClientError;
pub use fetcher::FetcherClient;
pub use scheduler::SchedulerClient;

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Per-client retry policy (SPEC_FULL.md §4.6): up to 3 attempts, base
/// backoff 1s, jitter +/-20%. Distinct from the job queue's own
/// `config::RetryConfig`, which governs whole-job retries rather than a
/// single outbound HTTP call.
#[derive(Debug, Clone, Copy)]
pub struct ClientRetryPolicy {
    pub max_attempts: u32,
    pub base_backoff_seconds: u64,
    pub jitter_fraction: f64,
}

impl Default for ClientRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_seconds: 1,
            jitter_fraction: 0.2,
        }
    }
}

/// Shared retry+backoff+jitter driver for all three worker clients.
/// Retries only on [`ClientError::is_retryable`] failures, up to
/// `policy.max_attempts`, generalized from the teacher's
/// `worker::http::HttpClient::download` loop with jitter added.
pub async fn retry_with_backoff<T, F, Fut>(
    operation_name: &str,
    policy: ClientRetryPolicy,
    mut operation: F,
) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_attempts && err.is_retryable() => {
                let delay = crate::queue::backoff::compute(
                    attempt,
                    policy.base_backoff_seconds,
                    policy.jitter_fraction,
                );
                let delay = Duration::from_millis(delay.num_milliseconds().max(0) as u64);
                warn!(operation = operation_name, attempt, error = %err, delay_ms = delay.as_millis() as u64, "retrying external call");
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
