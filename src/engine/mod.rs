//! The generation–audit–correction job engine.
//!
//! `Engine` is the public facade: idempotent submission, read-only polling,
//! and cancellation. Each accepted job is driven by its own runner task; the
//! pure decision logic (budget policy, continuity, correction, scoring)
//! lives in the submodules.

pub mod continuity;
pub mod correction;
pub mod policy;
mod runner;
pub mod scoring;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::api::SubmitJobRequest;
use crate::models::job::{Job, NewJob, TransitionError};
use crate::services::auditor::{AuditorError, ComplianceAuditor};
use crate::services::brands::{BrandStore, BrandStoreError};
use crate::services::generator::{GeneratorError, ImageGenerator};
use crate::services::storage::DurableStore;
use crate::services::webhook::WebhookNotifier;
use crate::store::{JobStore, StoreError};

/// Engine-level configuration. Derived from `AppConfig` in the server, built
/// directly in tests.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Default generation-attempt ceiling; submissions may override.
    pub max_attempts: u32,
    /// Approval bar as a ratio of the 0–100 audit scale.
    pub compliance_threshold: f64,
    pub webhook_retry_max: u32,
    pub job_expiry_hours: i64,
    /// Timeout for one generation or audit call. Expiry counts as a step
    /// failure against the attempt budget.
    pub step_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            compliance_threshold: 0.80,
            webhook_retry_max: 5,
            job_expiry_hours: 24,
            step_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("job {0} not found")]
    JobMissing(Uuid),

    #[error("brand context unavailable: {0}")]
    Brand(#[from] BrandStoreError),

    #[error("generation failed: {0}")]
    Generation(#[from] GeneratorError),

    #[error("audit failed: {0}")]
    Audit(#[from] AuditorError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Synchronous rejection of a submission; no job is created.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("unknown brand: {0}")]
    UnknownBrand(Uuid),

    #[error("brand service unavailable: {0}")]
    BrandService(#[source] BrandStoreError),
}

/// One asset-generation request as accepted by the engine.
#[derive(Debug, Clone)]
pub struct JobSubmission {
    pub brand_id: Uuid,
    pub prompt: String,
    pub is_tweak: bool,
    pub user_tweak_instruction: Option<String>,
    pub session_id: Option<String>,
    pub idempotency_key: Option<String>,
    pub webhook_url: Option<String>,
    pub max_attempts: Option<u32>,
}

impl From<SubmitJobRequest> for JobSubmission {
    fn from(req: SubmitJobRequest) -> Self {
        Self {
            brand_id: req.brand_id,
            prompt: req.prompt,
            is_tweak: req.is_tweak,
            user_tweak_instruction: req.user_tweak_instruction,
            session_id: req.session_id,
            idempotency_key: req.idempotency_key,
            webhook_url: req.webhook_url,
            max_attempts: req.max_attempts,
        }
    }
}

pub(crate) struct EngineCore {
    pub(crate) store: JobStore,
    pub(crate) brands: Arc<dyn BrandStore>,
    pub(crate) generator: Arc<dyn ImageGenerator>,
    pub(crate) auditor: Arc<dyn ComplianceAuditor>,
    pub(crate) durable: Arc<dyn DurableStore>,
    pub(crate) webhooks: WebhookNotifier,
    pub(crate) settings: EngineSettings,
}

/// Handle to the job engine. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct Engine {
    core: Arc<EngineCore>,
}

impl Engine {
    pub fn new(
        brands: Arc<dyn BrandStore>,
        generator: Arc<dyn ImageGenerator>,
        auditor: Arc<dyn ComplianceAuditor>,
        durable: Arc<dyn DurableStore>,
        settings: EngineSettings,
    ) -> Self {
        let webhooks = WebhookNotifier::new(settings.webhook_retry_max);
        Self {
            core: Arc::new(EngineCore {
                store: JobStore::new(),
                brands,
                generator,
                auditor,
                durable,
                webhooks,
                settings,
            }),
        }
    }

    /// Accept a job and start driving it. Duplicate submissions with the
    /// same idempotency key return the existing job without spawning a
    /// second runner.
    pub async fn submit(&self, submission: JobSubmission) -> Result<Job, SubmitError> {
        let prompt = submission.prompt.trim();
        if prompt.is_empty() {
            return Err(SubmitError::Invalid("prompt must not be empty".to_string()));
        }

        // Unknown brands are rejected synchronously, before any job exists.
        match self.core.brands.fetch(submission.brand_id).await {
            Ok(_) => {}
            Err(BrandStoreError::NotFound(id)) => return Err(SubmitError::UnknownBrand(id)),
            Err(e) => return Err(SubmitError::BrandService(e)),
        }

        // A tweak continues the latest job of its session: the logo anchor
        // and the previous image carry over.
        let (inherited_had_logos, inherited_image_url) = match (
            submission.is_tweak,
            submission.session_id.as_deref(),
        ) {
            (true, Some(session)) => self
                .core
                .store
                .latest_in_session(session)
                .await
                .map(|prev| (prev.original_had_logos, prev.current_image_url))
                .unwrap_or((None, None)),
            _ => (None, None),
        };

        let job = Job::create(NewJob {
            brand_id: submission.brand_id,
            prompt: prompt.to_string(),
            max_attempts: submission
                .max_attempts
                .unwrap_or(self.core.settings.max_attempts)
                .max(1),
            is_tweak: submission.is_tweak,
            user_tweak_instruction: submission.user_tweak_instruction,
            session_id: submission.session_id,
            webhook_url: submission.webhook_url,
            expiry_hours: self.core.settings.job_expiry_hours,
            inherited_had_logos,
            inherited_image_url,
        });

        let (job, created) = self
            .core
            .store
            .create(job, submission.idempotency_key.as_deref())
            .await;

        if created {
            metrics::counter!("generation_jobs_total").increment(1);
            info!(
                job_id = %job.job_id,
                brand_id = %job.brand_id,
                is_tweak = job.is_tweak,
                "Job accepted"
            );
            tokio::spawn(runner::run_job(self.core.clone(), job.job_id));
        } else {
            debug!(
                job_id = %job.job_id,
                "Duplicate submission deduplicated by idempotency key"
            );
        }

        Ok(job)
    }

    /// Read-only snapshot for polling clients.
    pub async fn get_job(&self, job_id: Uuid) -> Option<Job> {
        self.core.store.get(job_id).await
    }

    /// Request cancellation. Returns the current snapshot and whether the
    /// request was accepted; the transition lands at the runner's next
    /// checkpoint.
    pub async fn cancel_job(&self, job_id: Uuid) -> Option<(Job, bool)> {
        self.core.store.request_cancel(job_id).await.ok()
    }

    pub async fn job_count(&self) -> usize {
        self.core.store.len().await
    }

    pub async fn brand_service_health(&self) -> Result<(), BrandStoreError> {
        self.core.brands.health_check().await
    }

    /// Background task dropping expired terminal jobs once an hour.
    pub fn spawn_expiry_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let core = self.core.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(3600));
            loop {
                interval.tick().await;
                let swept = core.store.sweep_expired(Utc::now()).await;
                if swept > 0 {
                    info!(swept = swept, "Expired terminal jobs swept");
                }
            }
        })
    }
}
