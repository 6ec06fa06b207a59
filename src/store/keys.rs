//! Key layout and encoding utilities for the fjall partitions.
//!
//! Partition structure:
//! - `requests`: request_id -> Request (JSON)
//! - `requests_by_slug`: slug -> request_id
//! - `tag_index`: {tag}\0{request_id} -> () (range-scanned by tag prefix)
//! - `jobs`: job_id -> Job (JSON)
//! - `jobs_by_request_kind`: {request_id}\0{kind} -> job_id
//! - `jobs_ready`: {next_earliest_run_be}\0{job_id} -> job_id
//! - `jobs_processing`: job_id -> lease_expiry (RFC3339 bytes)
//! - `fingerprints`: canonical_url -> UrlFingerprint (JSON)
//! - `tombstone_index`: {request_id}\0{created_at_be} -> Tombstone (JSON)
//! - `images`: image_id -> Image (JSON)
//! - `images_by_request`: request_id -> Vec<image_id> (JSON)
//! - `images_tag_index`: {tag}\0{image_id} -> ()

use chrono::{DateTime, Utc};

pub fn tag_index_key(tag: &str, id: &str) -> Vec<u8> {
    let mut key = tag.as_bytes().to_vec();
    key.push(0);
    key.extend_from_slice(id.as_bytes());
    key
}

pub fn tag_index_prefix(tag: &str) -> Vec<u8> {
    let mut key = tag.as_bytes().to_vec();
    key.push(0);
    key
}

pub fn jobs_by_request_kind_key(request_id: &str, kind_key: &str) -> Vec<u8> {
    let mut key = request_id.as_bytes().to_vec();
    key.push(0);
    key.extend_from_slice(kind_key.as_bytes());
    key
}

/// Big-endian millisecond timestamp so lexicographic byte order matches
/// chronological order.
pub fn timestamp_be(ts: DateTime<Utc>) -> [u8; 8] {
    let millis = ts.timestamp_millis();
    // Shift into unsigned range so big-endian byte order stays monotonic
    // even for timestamps before the epoch.
    (millis as u64 ^ (1u64 << 63)).to_be_bytes()
}

pub fn jobs_ready_key(next_earliest_run: DateTime<Utc>, job_id: &str) -> Vec<u8> {
    let mut key = timestamp_be(next_earliest_run).to_vec();
    key.push(0);
    key.extend_from_slice(job_id.as_bytes());
    key
}

pub fn tombstone_index_key(request_id: &str, created_at: DateTime<Utc>) -> Vec<u8> {
    let mut key = request_id.as_bytes().to_vec();
    key.push(0);
    key.extend_from_slice(&timestamp_be(created_at));
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamp_be_is_monotonic() {
        let a = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        assert!(timestamp_be(a) < timestamp_be(b));
    }

    #[test]
    fn jobs_ready_key_orders_by_time_then_id() {
        let t = Utc::now();
        let k1 = jobs_ready_key(t, "aaa");
        let k2 = jobs_ready_key(t, "bbb");
        assert!(k1 < k2);
    }

    #[test]
    fn tag_index_prefix_is_prefix_of_key() {
        let key = tag_index_key("news", "req-1");
        let prefix = tag_index_prefix("news");
        assert!(key.starts_with(&prefix));
    }
}
