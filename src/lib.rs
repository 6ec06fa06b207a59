pub mod admission;
pub mod api;
pub mod clients;
pub mod config;
pub mod domain;
pub mod orchestrator;
pub mod queue;
pub mod shutdown;
pub mod store;
pub mod sweeper;
pub mod telemetry;
pub mod worker;
