//! Core entity types shared by the store, queue, orchestrator and API layers.

pub mod fingerprint;
pub mod image;
pub mod job;
pub mod request;
pub mod tombstone;

pub use fingerprint::{FingerprintOutcome, UrlFingerprint};
pub use image::Image;
pub use job::{Job, JobKind, JobState};
pub use request::{AnalyzerMetadata, LinkScore, Request, RequestMetadata, SourceType};
pub use tombstone::{Tombstone, TombstoneReason};
