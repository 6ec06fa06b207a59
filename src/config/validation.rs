use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("link_score_threshold must be within [0.0, 1.0], got {0}")]
    ThresholdOutOfRange(f64),

    #[error("worker_concurrency must be at least 1")]
    ZeroConcurrency,

    #[error(
        "lease_duration_seconds ({lease}) must exceed the longest configured worker-client \
         timeout ({max_timeout}) with slack, per SPEC_FULL.md §5"
    )]
    LeaseShorterThanTimeout { lease: u64, max_timeout: u64 },

    #[error("jitter_fraction must be within [0.0, 1.0], got {0}")]
    JitterOutOfRange(f64),
}

pub fn validate(config: &Config) -> Result<(), ValidationError> {
    if !(0.0..=1.0).contains(&config.pipeline.link_score_threshold) {
        return Err(ValidationError::ThresholdOutOfRange(
            config.pipeline.link_score_threshold,
        ));
    }
    if config.pipeline.worker_concurrency == 0 {
        return Err(ValidationError::ZeroConcurrency);
    }
    if !(0.0..=1.0).contains(&config.retry.jitter_fraction) {
        return Err(ValidationError::JitterOutOfRange(config.retry.jitter_fraction));
    }
    let max_timeout = config.timeouts.max_seconds();
    if config.retry.lease_duration_seconds <= max_timeout {
        return Err(ValidationError::LeaseShorterThanTimeout {
            lease: config.retry.lease_duration_seconds,
            max_timeout,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let mut config = Config::default();
        config.pipeline.link_score_threshold = 1.5;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::ThresholdOutOfRange(_))
        ));
    }

    #[test]
    fn rejects_lease_shorter_than_timeout() {
        let mut config = Config::default();
        config.retry.lease_duration_seconds = 10;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::LeaseShorterThanTimeout { .. })
        ));
    }
}
