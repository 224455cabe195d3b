//! Engine-owned job storage.
//!
//! Jobs live in memory for their whole lifecycle: the engine is the only
//! writer (one runner task per job), external callers get cloned snapshots.
//! Each job sits behind its own lock so mutations are serialized per
//! `job_id` while unrelated jobs proceed in parallel.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::models::job::{Job, JobStatus};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("job {0} not found")]
    NotFound(Uuid),
}

#[derive(Default)]
struct StoreIndex {
    /// Caller-supplied idempotency key -> job id.
    idempotency: HashMap<String, Uuid>,
    /// Session id -> most recently created job in that session.
    session_latest: HashMap<String, Uuid>,
}

#[derive(Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<Uuid, Arc<Mutex<Job>>>>,
    index: Mutex<StoreIndex>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a job, deduplicating on the idempotency key: a duplicate
    /// submission returns the existing job's snapshot and `false` instead of
    /// creating anything. The index lock is held across the insert so two
    /// racing submissions with the same key cannot both create.
    pub async fn create(&self, job: Job, idempotency_key: Option<&str>) -> (Job, bool) {
        let mut index = self.index.lock().await;

        if let Some(key) = idempotency_key {
            if let Some(existing_id) = index.idempotency.get(key).copied() {
                if let Some(snapshot) = self.snapshot(existing_id).await {
                    return (snapshot, false);
                }
                // Key pointed at a swept job; fall through and recreate.
            }
        }

        let job_id = job.job_id;
        if let Some(key) = idempotency_key {
            index.idempotency.insert(key.to_string(), job_id);
        }
        if let Some(session) = job.session_id.clone() {
            index.session_latest.insert(session, job_id);
        }

        let snapshot = job.clone();
        self.jobs
            .write()
            .await
            .insert(job_id, Arc::new(Mutex::new(job)));
        (snapshot, true)
    }

    /// Read-only snapshot of a job.
    pub async fn get(&self, job_id: Uuid) -> Option<Job> {
        self.snapshot(job_id).await
    }

    async fn snapshot(&self, job_id: Uuid) -> Option<Job> {
        let handle = self.jobs.read().await.get(&job_id).cloned()?;
        let job = handle.lock().await;
        Some(job.clone())
    }

    /// Apply a mutation under the job's own lock.
    pub async fn with_job_mut<T>(
        &self,
        job_id: Uuid,
        f: impl FnOnce(&mut Job) -> T,
    ) -> Result<T, StoreError> {
        let handle = self
            .jobs
            .read()
            .await
            .get(&job_id)
            .cloned()
            .ok_or(StoreError::NotFound(job_id))?;
        let mut job = handle.lock().await;
        Ok(f(&mut job))
    }

    /// Flag a job for cancellation. The runner applies the transition at its
    /// next checkpoint. Returns the snapshot and whether the request was
    /// accepted (the job was still non-terminal).
    pub async fn request_cancel(&self, job_id: Uuid) -> Result<(Job, bool), StoreError> {
        self.with_job_mut(job_id, |job| {
            let accepted = !job.status.is_terminal();
            if accepted {
                job.cancel_requested = true;
            }
            (job.clone(), accepted)
        })
        .await
    }

    /// Most recently created job of a session, if any.
    pub async fn latest_in_session(&self, session_id: &str) -> Option<Job> {
        let job_id = self
            .index
            .lock()
            .await
            .session_latest
            .get(session_id)
            .copied()?;
        self.snapshot(job_id).await
    }

    /// Force a job into `failed` with an error message. No-op when the job
    /// is already terminal or gone.
    pub async fn finish_with_error(&self, job_id: Uuid, message: &str) {
        let _ = self
            .with_job_mut(job_id, |job| {
                if !job.status.is_terminal() && job.transition(JobStatus::Failed).is_ok() {
                    job.error = Some(message.to_string());
                }
            })
            .await;
    }

    /// Drop terminal jobs past their expiry, including their index entries.
    /// Jobs whose lock is held (still being driven) are left alone.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut index = self.index.lock().await;
        let mut jobs = self.jobs.write().await;

        let mut removed: HashSet<Uuid> = HashSet::new();
        jobs.retain(|id, handle| match handle.try_lock() {
            Ok(job) if job.status.is_terminal() && job.expires_at <= now => {
                removed.insert(*id);
                false
            }
            _ => true,
        });

        if !removed.is_empty() {
            index.idempotency.retain(|_, id| !removed.contains(id));
            index.session_latest.retain(|_, id| !removed.contains(id));
        }
        removed.len()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
