use std::collections::HashSet;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

fn default_bind_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().unwrap()
}

fn default_metrics_addr() -> SocketAddr {
    "0.0.0.0:9090".parse().unwrap()
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_store_path() -> String {
    "data/store".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_drain_deadline_seconds() -> u64 {
    30
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Top-level configuration, assembled via `config::sources::load` from
/// struct defaults, an optional TOML file, and `INGESTOR__*` environment
/// overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub tombstones: TombstoneConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub addresses: AddressesConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            pipeline: PipelineConfig::default(),
            retry: RetryConfig::default(),
            tombstones: TombstoneConfig::default(),
            timeouts: TimeoutsConfig::default(),
            addresses: AddressesConfig::default(),
            sweep: SweepConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default = "default_metrics_addr")]
    pub metrics_addr: SocketAddr,
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,
    #[serde(default = "default_store_path")]
    pub store_path: String,
    #[serde(default = "default_drain_deadline_seconds")]
    pub drain_deadline_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            metrics_addr: default_metrics_addr(),
            metrics_path: default_metrics_path(),
            store_path: default_store_path(),
            drain_deadline_seconds: default_drain_deadline_seconds(),
        }
    }
}

/// Admission and worker-pool knobs (SPEC_FULL.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "PipelineConfig::default_threshold")]
    pub link_score_threshold: f64,
    #[serde(default = "PipelineConfig::default_concurrency")]
    pub worker_concurrency: usize,
    #[serde(default = "PipelineConfig::default_high_water")]
    pub queue_high_water: usize,
    #[serde(default = "PipelineConfig::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl PipelineConfig {
    fn default_threshold() -> f64 {
        0.5
    }
    fn default_concurrency() -> usize {
        10
    }
    fn default_high_water() -> usize {
        10_000
    }
    fn default_poll_interval_ms() -> u64 {
        500
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            link_score_threshold: Self::default_threshold(),
            worker_concurrency: Self::default_concurrency(),
            queue_high_water: Self::default_high_water(),
            poll_interval_ms: Self::default_poll_interval_ms(),
        }
    }
}

/// Retry/backoff/lease knobs shared by the queue and worker clients
/// (SPEC_FULL.md §4.3, §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "RetryConfig::default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "RetryConfig::default_base_backoff_seconds")]
    pub base_backoff_seconds: u64,
    #[serde(default = "RetryConfig::default_jitter_fraction")]
    pub jitter_fraction: f64,
    #[serde(default = "RetryConfig::default_lease_duration_seconds")]
    pub lease_duration_seconds: u64,
    #[serde(default = "RetryConfig::default_reaper_interval_seconds")]
    pub reaper_interval_seconds: u64,
}

impl RetryConfig {
    fn default_max_attempts() -> u32 {
        5
    }
    fn default_base_backoff_seconds() -> u64 {
        30
    }
    fn default_jitter_fraction() -> f64 {
        0.2
    }
    fn default_lease_duration_seconds() -> u64 {
        300
    }
    fn default_reaper_interval_seconds() -> u64 {
        30
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: Self::default_max_attempts(),
            base_backoff_seconds: Self::default_base_backoff_seconds(),
            jitter_fraction: Self::default_jitter_fraction(),
            lease_duration_seconds: Self::default_lease_duration_seconds(),
            reaper_interval_seconds: Self::default_reaper_interval_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TombstoneConfig {
    #[serde(default = "TombstoneConfig::default_low_score_days")]
    pub tombstone_days_low_score: i64,
    #[serde(default = "TombstoneConfig::default_tag_based_days")]
    pub tombstone_days_tag_based: i64,
    #[serde(default = "TombstoneConfig::default_manual_days")]
    pub tombstone_days_manual: i64,
    #[serde(default)]
    pub tombstone_blocklist_tags: HashSet<String>,
}

impl TombstoneConfig {
    fn default_low_score_days() -> i64 {
        30
    }
    fn default_tag_based_days() -> i64 {
        90
    }
    fn default_manual_days() -> i64 {
        90
    }

    pub fn duration_for(&self, reason: crate::domain::TombstoneReason) -> chrono::Duration {
        use crate::domain::TombstoneReason::*;
        let days = match reason {
            LowScore => self.tombstone_days_low_score,
            TagBased => self.tombstone_days_tag_based,
            Manual => self.tombstone_days_manual,
        };
        chrono::Duration::days(days)
    }
}

impl Default for TombstoneConfig {
    fn default() -> Self {
        Self {
            tombstone_days_low_score: Self::default_low_score_days(),
            tombstone_days_tag_based: Self::default_tag_based_days(),
            tombstone_days_manual: Self::default_manual_days(),
            tombstone_blocklist_tags: HashSet::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "TimeoutsConfig::default_fetcher")]
    pub fetcher_timeout_seconds: u64,
    #[serde(default = "TimeoutsConfig::default_analyzer")]
    pub analyzer_timeout_seconds: u64,
    #[serde(default = "TimeoutsConfig::default_scorer")]
    pub scorer_timeout_seconds: u64,
}

impl TimeoutsConfig {
    fn default_fetcher() -> u64 {
        120
    }
    fn default_analyzer() -> u64 {
        60
    }
    fn default_scorer() -> u64 {
        60
    }

    pub fn max_seconds(&self) -> u64 {
        self.fetcher_timeout_seconds
            .max(self.analyzer_timeout_seconds)
            .max(self.scorer_timeout_seconds)
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            fetcher_timeout_seconds: Self::default_fetcher(),
            analyzer_timeout_seconds: Self::default_analyzer(),
            scorer_timeout_seconds: Self::default_scorer(),
        }
    }
}

fn default_fetcher_base_url() -> String {
    "http://localhost:9001".to_string()
}
fn default_analyzer_base_url() -> String {
    "http://localhost:9002".to_string()
}
fn default_scheduler_base_url() -> String {
    "http://localhost:9003".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressesConfig {
    #[serde(default = "default_fetcher_base_url")]
    pub fetcher_base_url: String,
    #[serde(default = "default_analyzer_base_url")]
    pub analyzer_base_url: String,
    #[serde(default = "default_scheduler_base_url")]
    pub scheduler_base_url: String,
}

impl Default for AddressesConfig {
    fn default() -> Self {
        Self {
            fetcher_base_url: default_fetcher_base_url(),
            analyzer_base_url: default_analyzer_base_url(),
            scheduler_base_url: default_scheduler_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    #[serde(default = "SweepConfig::default_interval")]
    pub sweep_interval_seconds: u64,
    #[serde(default = "SweepConfig::default_grace_days")]
    pub deletion_grace_period_days: i64,
}

impl SweepConfig {
    fn default_interval() -> u64 {
        3600
    }
    fn default_grace_days() -> i64 {
        180
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            sweep_interval_seconds: Self::default_interval(),
            deletion_grace_period_days: Self::default_grace_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_toml() {
        let config = Config::default();
        let text = toml::to_string(&config).unwrap();
        let reloaded: Config = toml::from_str(&text).unwrap();
        assert_eq!(reloaded.pipeline.link_score_threshold, config.pipeline.link_score_threshold);
    }

    #[test]
    fn tombstone_duration_for_reason() {
        let cfg = TombstoneConfig::default();
        assert_eq!(
            cfg.duration_for(crate::domain::TombstoneReason::LowScore),
            chrono::Duration::days(30)
        );
        assert_eq!(
            cfg.duration_for(crate::domain::TombstoneReason::Manual),
            chrono::Duration::days(90)
        );
    }
}
