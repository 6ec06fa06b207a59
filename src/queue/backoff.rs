//! Exponential backoff with jitter, shared by the job queue and the
//! external worker clients (SPEC_FULL.md §4.3, §4.6).
//!
//! Grounded in `fourthplaces-rootsignal`'s `fetchers/page.rs`, which pairs
//! an exponential base with `rand::rng().random_range(..)` jitter rather
//! than the teacher's un-jittered `2u64.pow(attempts - 1)` loop in
//! `worker::http::HttpClient::download`.

use chrono::Duration;
use rand::Rng;

use crate::config::models::RetryConfig;

/// `base * 2^(attempt-1) * (1 +/- jitter)`, per SPEC_FULL.md §4.3.
pub fn next_delay(attempt: u32, retry: &RetryConfig) -> Duration {
    compute(
        attempt,
        retry.base_backoff_seconds,
        retry.jitter_fraction,
    )
}

pub fn compute(attempt: u32, base_seconds: u64, jitter_fraction: f64) -> Duration {
    let exponent = attempt.saturating_sub(1).min(20);
    let base = base_seconds as f64 * 2f64.powi(exponent as i32);
    let jitter_fraction = jitter_fraction.clamp(0.0, 1.0);
    let jitter = rand::rng().random_range(-jitter_fraction..=jitter_fraction);
    let seconds = (base * (1.0 + jitter)).max(0.0);
    Duration::milliseconds((seconds * 1000.0) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_exponentially_on_average() {
        let short = compute(1, 30, 0.0);
        let long = compute(4, 30, 0.0);
        assert!(long > short);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        for attempt in 1..6 {
            let d = compute(attempt, 30, 0.2);
            let base = 30f64 * 2f64.powi((attempt - 1) as i32);
            assert!(d.num_milliseconds() as f64 <= base * 1.2 * 1000.0 + 1.0);
            assert!(d.num_milliseconds() as f64 >= base * 0.8 * 1000.0 - 1.0);
        }
    }
}
