use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::audit::AuditResult;
use crate::models::job::{Job, JobStatus};

/// Request to submit an asset-generation job.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubmitJobRequest {
    #[garde(skip)]
    pub brand_id: Uuid,

    #[garde(length(min = 1, max = 2000))]
    pub prompt: String,

    #[garde(skip)]
    #[serde(default)]
    pub is_tweak: bool,

    #[garde(length(min = 1, max = 2000))]
    pub user_tweak_instruction: Option<String>,

    #[garde(length(min = 1, max = 128))]
    pub session_id: Option<String>,

    #[garde(length(min = 1, max = 128))]
    pub idempotency_key: Option<String>,

    #[garde(length(min = 1, max = 2000))]
    pub webhook_url: Option<String>,

    #[garde(range(min = 1, max = 10))]
    pub max_attempts: Option<u32>,
}

/// Response after submitting a job.
#[derive(Debug, Serialize)]
pub struct SubmitJobResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub message: String,
}

/// Read-only job snapshot for polling clients.
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub is_approved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Set when the final image was retained inline after a storage outage.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub storage_fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_audit: Option<AuditResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Job> for JobStatusResponse {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.job_id,
            status: job.status,
            attempt_count: job.attempt_count,
            max_attempts: job.max_attempts,
            is_approved: job.is_approved,
            image_url: job.current_image_url.clone(),
            storage_fallback: job.storage_fallback,
            latest_audit: job.audit_history.last().cloned(),
            error: job.error,
        }
    }
}

/// Response to a cancellation request.
#[derive(Debug, Serialize)]
pub struct CancelJobResponse {
    pub job_id: Uuid,
    /// Whether the request was accepted. Cancellation lands at the next
    /// state-machine checkpoint, so the status may lag briefly.
    pub cancelled: bool,
    pub status: JobStatus,
}
