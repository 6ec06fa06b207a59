//! Embedded fjall-backed persistence for Requests, Jobs, UrlFingerprints,
//! Tombstones and Images (see SPEC_FULL.md §3.1).
//!
//! Every partition lives in one `Keyspace`; compound, multi-partition
//! transitions (e.g. "move a job from `jobs_ready` into `jobs_processing`")
//! are guarded by a process-wide `tokio::sync::Mutex` around the read-modify-
//! write window, mirroring the teacher's `Arc<RwLock<FjallQueue>>` pattern in
//! `queue/broker.rs`.

pub mod error;
pub mod keys;

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::domain::{Image, Job, JobKind, JobState, Request, Tombstone, UrlFingerprint};

pub use error::{Result, StoreError};

/// All fjall partitions plus the compound-transition lock.
#[derive(Clone)]
pub struct Store {
    keyspace: Keyspace,
    requests: PartitionHandle,
    requests_by_slug: PartitionHandle,
    tag_index: PartitionHandle,
    jobs: PartitionHandle,
    jobs_by_request_kind: PartitionHandle,
    jobs_ready: PartitionHandle,
    jobs_processing: PartitionHandle,
    fingerprints: PartitionHandle,
    tombstone_index: PartitionHandle,
    images: PartitionHandle,
    images_by_request: PartitionHandle,
    images_tag_index: PartitionHandle,
    lock: Arc<Mutex<()>>,
}

impl Store {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening store");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let keyspace = Config::new(path).open()?;
        let open = |name: &str| keyspace.open_partition(name, PartitionCreateOptions::default());
        let store = Self {
            requests: open("requests")?,
            requests_by_slug: open("requests_by_slug")?,
            tag_index: open("tag_index")?,
            jobs: open("jobs")?,
            jobs_by_request_kind: open("jobs_by_request_kind")?,
            jobs_ready: open("jobs_ready")?,
            jobs_processing: open("jobs_processing")?,
            fingerprints: open("fingerprints")?,
            tombstone_index: open("tombstone_index")?,
            images: open("images")?,
            images_by_request: open("images_by_request")?,
            images_tag_index: open("images_tag_index")?,
            keyspace,
            lock: Arc::new(Mutex::new(())),
        };
        info!("store opened");
        Ok(store)
    }

    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

    // ---- Requests ----------------------------------------------------

    pub fn put_request(&self, request: &Request) -> Result<()> {
        let value = serde_json::to_vec(request)?;
        self.requests.insert(request.id.as_bytes(), value)?;
        for tag in &request.tags {
            self.tag_index
                .insert(keys::tag_index_key(tag, &request.id), b"")?;
        }
        Ok(())
    }

    pub fn get_request(&self, id: &str) -> Result<Option<Request>> {
        match self.requests.get(id.as_bytes())? {
            Some(v) => Ok(Some(serde_json::from_slice(&v)?)),
            None => Ok(None),
        }
    }

    pub fn list_requests(&self, limit: usize, offset: usize) -> Result<(Vec<Request>, usize)> {
        let mut all = Vec::new();
        for item in self.requests.iter() {
            let (_, v) = item?;
            all.push(serde_json::from_slice::<Request>(&v)?);
        }
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = all.len();
        let page = all.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }

    /// Updates an existing request in place, adding newly-set tags to the
    /// tag index. Never removes identifying fields (forward-only visibility,
    /// SPEC_FULL.md §8).
    pub async fn update_request<F>(&self, id: &str, f: F) -> Result<Request>
    where
        F: FnOnce(&mut Request),
    {
        let _guard = self.lock.lock().await;
        let mut request = self
            .get_request(id)?
            .ok_or_else(|| StoreError::RequestNotFound(id.to_string()))?;
        let previous_tags = request.tags.clone();
        f(&mut request);
        self.put_request(&request)?;
        for tag in request.tags.iter().filter(|t| !previous_tags.contains(t)) {
            self.tag_index
                .insert(keys::tag_index_key(tag, &request.id), b"")?;
        }
        Ok(request)
    }

    /// Claims a slug atomically, appending `-2`, `-3`, ... on collision.
    /// Allocation only ever grows (no reuse of a freed suffix, DESIGN.md
    /// open-question decision).
    pub async fn claim_slug(&self, base_slug: &str, request_id: &str) -> Result<String> {
        let _guard = self.lock.lock().await;
        let mut candidate = base_slug.to_string();
        let mut suffix = 1u32;
        loop {
            if self.requests_by_slug.get(candidate.as_bytes())?.is_none() {
                self.requests_by_slug
                    .insert(candidate.as_bytes(), request_id.as_bytes())?;
                return Ok(candidate);
            }
            suffix += 1;
            candidate = format!("{base_slug}-{suffix}");
        }
    }

    pub fn get_request_by_slug(&self, slug: &str) -> Result<Option<Request>> {
        match self.requests_by_slug.get(slug.as_bytes())? {
            Some(id) => self.get_request(&String::from_utf8_lossy(&id)),
            None => Ok(None),
        }
    }

    /// Exact mode scans on `tag\0`, matching only that whole tag. Fuzzy mode
    /// scans on the bare tag bytes, so any tag the query is a prefix of also
    /// matches (§3.1: "range-scanned by tag prefix for exact and fuzzy tag
    /// search").
    pub fn search_by_tag(&self, tag: &str, limit: usize, fuzzy: bool) -> Result<Vec<String>> {
        let prefix: Vec<u8> = if fuzzy {
            tag.as_bytes().to_vec()
        } else {
            keys::tag_index_prefix(tag)
        };
        let mut ids = Vec::new();
        for item in self.tag_index.prefix(&prefix) {
            let (k, _) = item?;
            if let Some(pos) = k.iter().position(|&b| b == 0) {
                ids.push(String::from_utf8_lossy(&k[pos + 1..]).to_string());
            }
            if ids.len() >= limit {
                break;
            }
        }
        Ok(ids)
    }

    // ---- Jobs ----------------------------------------------------------

    /// Enqueues a job, unless one of the same (request_id, kind) is already
    /// pending/processing, in which case the existing job id is returned
    /// (§4.3 idempotent enqueue).
    pub async fn enqueue_job(&self, job: Job) -> Result<String> {
        let _guard = self.lock.lock().await;
        let rk_key = keys::jobs_by_request_kind_key(&job.request_id, job.kind.as_key_str());
        if let Some(existing) = self.jobs_by_request_kind.get(&rk_key)? {
            let existing_id = String::from_utf8_lossy(&existing).to_string();
            if let Some(existing_job) = self.get_job(&existing_id)? {
                if matches!(existing_job.state, JobState::Pending | JobState::Processing) {
                    return Ok(existing_id);
                }
            }
        }
        self.jobs_by_request_kind
            .insert(&rk_key, job.id.as_bytes())?;
        self.jobs_ready
            .insert(keys::jobs_ready_key(job.next_earliest_run, &job.id), job.id.as_bytes())?;
        self.jobs.insert(job.id.as_bytes(), serde_json::to_vec(&job)?)?;
        Ok(job.id)
    }

    pub fn get_job(&self, id: &str) -> Result<Option<Job>> {
        match self.jobs.get(id.as_bytes())? {
            Some(v) => Ok(Some(serde_json::from_slice(&v)?)),
            None => Ok(None),
        }
    }

    /// Atomically selects the earliest ready job (FIFO by next_earliest_run,
    /// tie-broken by job id) and leases it to a worker.
    pub async fn dequeue_job(&self, lease_duration: chrono::Duration) -> Result<Option<Job>> {
        let _guard = self.lock.lock().await;
        let now = Utc::now();
        for item in self.jobs_ready.iter() {
            let (ready_key, job_id_bytes) = item?;
            let job_id = String::from_utf8_lossy(&job_id_bytes).to_string();
            let Some(mut job) = self.get_job(&job_id)? else {
                self.jobs_ready.remove(&ready_key)?;
                continue;
            };
            if job.state != JobState::Pending || job.next_earliest_run > now {
                // jobs_ready is ordered by next_earliest_run; once we hit a
                // job whose time hasn't come yet, nothing further is ready.
                if job.next_earliest_run > now {
                    break;
                }
                continue;
            }
            self.jobs_ready.remove(&ready_key)?;
            job.state = JobState::Processing;
            job.attempt += 1;
            job.lease_expiry = Some(now + lease_duration);
            job.updated_at = now;
            self.jobs_processing
                .insert(job.id.as_bytes(), job.lease_expiry.unwrap().to_rfc3339().as_bytes())?;
            self.jobs.insert(job.id.as_bytes(), serde_json::to_vec(&job)?)?;
            return Ok(Some(job));
        }
        Ok(None)
    }

    pub async fn ack_job(&self, id: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut job = self
            .get_job(id)?
            .ok_or_else(|| StoreError::JobNotFound(id.to_string()))?;
        job.state = JobState::Completed;
        job.updated_at = Utc::now();
        self.jobs_processing.remove(id.as_bytes())?;
        self.jobs.insert(id.as_bytes(), serde_json::to_vec(&job)?)?;
        Ok(())
    }

    /// Returns a failed job to `pending` with backoff, or to `deadletter`
    /// once `max_attempts` is exhausted (§4.3).
    pub async fn nack_job(
        &self,
        id: &str,
        error: impl Into<String>,
        max_attempts: u32,
        next_earliest_run: DateTime<Utc>,
    ) -> Result<JobState> {
        let _guard = self.lock.lock().await;
        let mut job = self
            .get_job(id)?
            .ok_or_else(|| StoreError::JobNotFound(id.to_string()))?;
        job.last_error = Some(error.into());
        job.updated_at = Utc::now();
        self.jobs_processing.remove(id.as_bytes())?;
        if job.attempt >= max_attempts {
            job.state = JobState::Deadletter;
        } else {
            job.state = JobState::Pending;
            job.next_earliest_run = next_earliest_run;
            self.jobs_ready
                .insert(keys::jobs_ready_key(next_earliest_run, id), id.as_bytes())?;
        }
        self.jobs.insert(id.as_bytes(), serde_json::to_vec(&job)?)?;
        Ok(job.state)
    }

    /// Moves a job straight to `deadletter` regardless of remaining attempts,
    /// for errors §7 classifies as non-retryable (e.g. a 4xx upstream
    /// response). Unlike `nack_job`, never returns the job to `jobs_ready`.
    pub async fn fail_job(&self, id: &str, error: impl Into<String>) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut job = self
            .get_job(id)?
            .ok_or_else(|| StoreError::JobNotFound(id.to_string()))?;
        job.last_error = Some(error.into());
        job.state = JobState::Deadletter;
        job.updated_at = Utc::now();
        self.jobs_processing.remove(id.as_bytes())?;
        self.jobs.insert(id.as_bytes(), serde_json::to_vec(&job)?)?;
        Ok(())
    }

    /// Marks pending jobs for a request as cancelled-completed; in-flight
    /// jobs keep running but their writeback is discarded (§4.4).
    pub async fn cancel_pending_jobs(&self, request_id: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        for kind in [JobKind::FetchAndAnalyze, JobKind::AnalyzeOnly, JobKind::Rescore] {
            let rk_key = keys::jobs_by_request_kind_key(request_id, kind.as_key_str());
            let Some(job_id) = self.jobs_by_request_kind.get(&rk_key)? else {
                continue;
            };
            let job_id = String::from_utf8_lossy(&job_id).to_string();
            let Some(mut job) = self.get_job(&job_id)? else {
                continue;
            };
            if job.state == JobState::Pending {
                self.jobs_ready
                    .remove(keys::jobs_ready_key(job.next_earliest_run, &job_id))?;
                job.state = JobState::Completed;
                job.updated_at = Utc::now();
                self.jobs.insert(job_id.as_bytes(), serde_json::to_vec(&job)?)?;
            }
        }
        Ok(())
    }

    /// Reclaims jobs whose lease has expired without the owning worker
    /// acking or nacking them (crash recovery). Attempt count is NOT
    /// incremented, since the worker may have crashed before doing any work
    /// (§4.3 reaper contract).
    pub async fn reap_expired_leases(&self) -> Result<usize> {
        let _guard = self.lock.lock().await;
        let now = Utc::now();
        let mut reclaimed = 0usize;
        let expired: Vec<String> = self
            .jobs_processing
            .iter()
            .filter_map(|item| {
                let (k, v) = item.ok()?;
                let expiry = DateTime::parse_from_rfc3339(&String::from_utf8_lossy(&v)).ok()?;
                if expiry.with_timezone(&Utc) < now {
                    Some(String::from_utf8_lossy(&k).to_string())
                } else {
                    None
                }
            })
            .collect();
        for job_id in expired {
            let Some(mut job) = self.get_job(&job_id)? else { continue };
            if job.state != JobState::Processing {
                self.jobs_processing.remove(job_id.as_bytes())?;
                continue;
            }
            job.state = JobState::Pending;
            job.next_earliest_run = now;
            job.lease_expiry = None;
            job.updated_at = now;
            self.jobs_processing.remove(job_id.as_bytes())?;
            self.jobs_ready
                .insert(keys::jobs_ready_key(now, &job_id), job_id.as_bytes())?;
            self.jobs.insert(job_id.as_bytes(), serde_json::to_vec(&job)?)?;
            reclaimed += 1;
        }
        if reclaimed > 0 {
            debug!(reclaimed, "reaper reclaimed expired leases");
        }
        Ok(reclaimed)
    }

    pub fn pending_job_count(&self) -> Result<usize> {
        Ok(self.jobs_ready.iter().count())
    }

    // ---- Fingerprints ----------------------------------------------------

    pub fn get_fingerprint(&self, canonical_url: &str) -> Result<Option<UrlFingerprint>> {
        match self.fingerprints.get(canonical_url.as_bytes())? {
            Some(v) => Ok(Some(serde_json::from_slice(&v)?)),
            None => Ok(None),
        }
    }

    pub fn put_fingerprint(&self, fp: &UrlFingerprint) -> Result<()> {
        self.fingerprints
            .insert(fp.canonical_url.as_bytes(), serde_json::to_vec(fp)?)?;
        Ok(())
    }

    pub fn sweep_expired_fingerprints(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut removed = 0;
        let expired_keys: Vec<Vec<u8>> = self
            .fingerprints
            .iter()
            .filter_map(|item| {
                let (k, v) = item.ok()?;
                let fp: UrlFingerprint = serde_json::from_slice(&v).ok()?;
                if fp.is_expired(now) { Some(k.to_vec()) } else { None }
            })
            .collect();
        for key in expired_keys {
            self.fingerprints.remove(key)?;
            removed += 1;
        }
        Ok(removed)
    }

    // ---- Tombstones -------------------------------------------------------

    /// Appends a tombstone to a Request and to the derived sweep index. The
    /// Request's embedded array remains the source of truth for visibility
    /// decisions; `tombstone_index` exists only so the sweeper can scan
    /// tombstone history without loading every Request.
    pub async fn add_tombstone(&self, request_id: &str, tombstone: Tombstone) -> Result<Request> {
        let index_key = keys::tombstone_index_key(request_id, tombstone.created_at);
        self.tombstone_index
            .insert(index_key, serde_json::to_vec(&tombstone)?)?;
        self.update_request(request_id, |r| r.metadata.tombstones.push(tombstone))
            .await
    }

    pub fn list_all_tombstones(&self) -> Result<Vec<(String, Tombstone)>> {
        let mut out = Vec::new();
        for item in self.tombstone_index.iter() {
            let (k, v) = item?;
            if let Some(pos) = k.iter().position(|&b| b == 0) {
                let request_id = String::from_utf8_lossy(&k[..pos]).to_string();
                let tombstone: Tombstone = serde_json::from_slice(&v)?;
                out.push((request_id, tombstone));
            }
        }
        Ok(out)
    }

    /// Permanently deletes a Request only once every tombstone it carries
    /// has been expired for at least `grace_period` with nothing newer
    /// added since (§4.5 never-lose rule, §7).
    pub async fn delete_if_past_grace(
        &self,
        request_id: &str,
        grace_period: chrono::Duration,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let Some(request) = self.get_request(request_id)? else {
            return Ok(false);
        };
        let Some(expiry) = request.effective_tombstone_expiry() else {
            return Ok(false);
        };
        if now < expiry + grace_period {
            return Ok(false);
        }
        self.requests.remove(request_id.as_bytes())?;
        if let Some(slug) = &request.slug {
            self.requests_by_slug.remove(slug.as_bytes())?;
        }
        Ok(true)
    }

    // ---- Images -------------------------------------------------------

    pub fn put_image(&self, image: &Image) -> Result<()> {
        self.images.insert(image.id.as_bytes(), serde_json::to_vec(image)?)?;
        let mut ids = self.images_for_request(&image.request_id)?;
        if !ids.contains(&image.id) {
            ids.push(image.id.clone());
            self.images_by_request
                .insert(image.request_id.as_bytes(), serde_json::to_vec(&ids)?)?;
        }
        for tag in &image.tags {
            self.images_tag_index
                .insert(keys::tag_index_key(tag, &image.id), b"")?;
        }
        Ok(())
    }

    pub fn images_for_request(&self, request_id: &str) -> Result<Vec<String>> {
        match self.images_by_request.get(request_id.as_bytes())? {
            Some(v) => Ok(serde_json::from_slice(&v)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn get_image(&self, id: &str) -> Result<Option<Image>> {
        match self.images.get(id.as_bytes())? {
            Some(v) => Ok(Some(serde_json::from_slice(&v)?)),
            None => Ok(None),
        }
    }

    pub fn search_images_by_tag(&self, tag: &str, limit: usize, fuzzy: bool) -> Result<Vec<Image>> {
        let prefix: Vec<u8> = if fuzzy {
            tag.as_bytes().to_vec()
        } else {
            keys::tag_index_prefix(tag)
        };
        let mut out = Vec::new();
        for item in self.images_tag_index.prefix(&prefix) {
            let (k, _) = item?;
            if let Some(pos) = k.iter().position(|&b| b == 0) {
                if let Some(image) = self.get_image(&String::from_utf8_lossy(&k[pos + 1..]))? {
                    out.push(image);
                }
            }
            if out.len() >= limit {
                break;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SourceType;
    use tempfile::TempDir;

    fn open_store() -> (Store, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join("store")).unwrap();
        (store, dir)
    }

    #[test]
    fn put_and_get_request_round_trips() {
        let (store, _dir) = open_store();
        let request = Request::new(SourceType::Url, Some("https://example.com".into()), true);
        store.put_request(&request).unwrap();
        let fetched = store.get_request(&request.id).unwrap().unwrap();
        assert_eq!(fetched.id, request.id);
    }

    #[tokio::test]
    async fn enqueue_job_is_idempotent_per_request_kind() {
        let (store, _dir) = open_store();
        let job1 = Job::new("req-1", JobKind::FetchAndAnalyze, serde_json::json!({}));
        let job2 = Job::new("req-1", JobKind::FetchAndAnalyze, serde_json::json!({}));
        let id1 = store.enqueue_job(job1).await.unwrap();
        let id2 = store.enqueue_job(job2).await.unwrap();
        assert_eq!(id1, id2);
    }

    #[tokio::test]
    async fn dequeue_then_ack_clears_processing_index() {
        let (store, _dir) = open_store();
        let job = Job::new("req-2", JobKind::FetchAndAnalyze, serde_json::json!({}));
        store.enqueue_job(job).await.unwrap();
        let leased = store
            .dequeue_job(chrono::Duration::seconds(300))
            .await
            .unwrap()
            .expect("job ready");
        assert_eq!(leased.attempt, 1);
        store.ack_job(&leased.id).await.unwrap();
        let fetched = store.get_job(&leased.id).unwrap().unwrap();
        assert_eq!(fetched.state, JobState::Completed);
    }

    #[tokio::test]
    async fn nack_retries_then_deadletters() {
        let (store, _dir) = open_store();
        let job = Job::new("req-3", JobKind::FetchAndAnalyze, serde_json::json!({}));
        store.enqueue_job(job.clone()).await.unwrap();
        for _ in 0..2 {
            let leased = store
                .dequeue_job(chrono::Duration::seconds(300))
                .await
                .unwrap()
                .unwrap();
            store
                .nack_job(&leased.id, "boom", 2, Utc::now())
                .await
                .unwrap();
        }
        let final_state = store.get_job(&job.id).unwrap().unwrap();
        assert_eq!(final_state.state, JobState::Deadletter);
    }

    #[tokio::test]
    async fn reaper_reclaims_expired_lease() {
        let (store, _dir) = open_store();
        let job = Job::new("req-4", JobKind::FetchAndAnalyze, serde_json::json!({}));
        store.enqueue_job(job).await.unwrap();
        store
            .dequeue_job(chrono::Duration::milliseconds(1))
            .await
            .unwrap()
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let reclaimed = store.reap_expired_leases().await.unwrap();
        assert_eq!(reclaimed, 1);
    }

    #[test]
    fn tag_search_finds_tagged_requests() {
        let (store, _dir) = open_store();
        let mut request = Request::new(SourceType::Url, Some("https://example.com".into()), true);
        request.tags.push("news".to_string());
        store.put_request(&request).unwrap();
        let hits = store.search_by_tag("news", 10, false).unwrap();
        assert_eq!(hits, vec![request.id]);
    }

    #[test]
    fn exact_tag_search_does_not_match_a_longer_tag() {
        let (store, _dir) = open_store();
        let mut request = Request::new(SourceType::Url, Some("https://example.com".into()), true);
        request.tags.push("newsletter".to_string());
        store.put_request(&request).unwrap();
        assert!(store.search_by_tag("news", 10, false).unwrap().is_empty());
    }

    #[test]
    fn fuzzy_tag_search_matches_on_prefix() {
        let (store, _dir) = open_store();
        let mut request = Request::new(SourceType::Url, Some("https://example.com".into()), true);
        request.tags.push("newsletter".to_string());
        store.put_request(&request).unwrap();
        let hits = store.search_by_tag("news", 10, true).unwrap();
        assert_eq!(hits, vec![request.id]);
    }

    #[tokio::test]
    async fn claim_slug_appends_suffix_on_collision() {
        let (store, _dir) = open_store();
        let a = store.claim_slug("hello-world", "req-a").await.unwrap();
        let b = store.claim_slug("hello-world", "req-b").await.unwrap();
        assert_eq!(a, "hello-world");
        assert_eq!(b, "hello-world-2");
    }
}
