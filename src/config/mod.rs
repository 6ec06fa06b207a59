//! Layered configuration for the ingestor Controller.
//!
//! Settings load from, in increasing priority: struct defaults, an optional
//! TOML file (`INGESTOR_CONFIG`, default `config/ingestor.toml`), a local
//! `.env` (via `dotenvy`), then `INGESTOR__<SECTION>__<KEY>` environment
//! variables. See `sources::load` for the exact precedence, grounded in the
//! teacher's `config::sources::load`.
//!
//! # Example
//! ```no_run
//! use ingestor::config::Config;
//! let config = Config::load().expect("failed to load configuration");
//! println!("listening on {}", config.server.bind_addr);
//! ```

pub mod models;
mod sources;
mod validation;

pub use models::{
    AddressesConfig, Config, LogFormat, LoggingConfig, PipelineConfig, RetryConfig, ServerConfig,
    SweepConfig, TimeoutsConfig, TombstoneConfig,
};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("configuration validation failed: {0}")]
    Validation(#[from] ValidationError),
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn load_from_path_validates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[retry]\nlease_duration_seconds = 1\n").unwrap();

        let result = Config::load_from_path(path);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
