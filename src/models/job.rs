use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::models::audit::AuditResult;

/// Lifecycle state of an asset-generation job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Generating,
    Auditing,
    Correcting,
    Completed,
    NeedsReview,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::NeedsReview | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Legal edges of the job state machine. `Failed` and `Cancelled` are
    /// reachable from every non-terminal state; `NeedsReview` from
    /// `generating` covers a provider failure on the final attempt.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (Pending, Generating) => true,
            (Generating, Auditing) => true,
            (Generating, NeedsReview) => true,
            (Auditing, Completed) => true,
            (Auditing, Correcting) => true,
            (Auditing, NeedsReview) => true,
            (Correcting, Generating) => true,
            (from, Failed) | (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("illegal job transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// Unit of work for one asset-generation request.
///
/// The record is exclusively owned by the engine while the job is active;
/// external callers only ever see cloned snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: Uuid,
    pub brand_id: Uuid,
    pub status: JobStatus,

    /// Current generation instruction, possibly amended by corrections.
    pub prompt: String,
    pub original_prompt: String,

    pub attempt_count: u32,
    pub max_attempts: u32,

    /// One entry per attempt, in strict attempt order. Append-only.
    pub audit_history: Vec<AuditResult>,

    /// Latest candidate: an inline `data:` URL until finalized, then the
    /// durable URL.
    pub current_image_url: Option<String>,
    pub is_approved: bool,

    /// Whether the brand context on the very first attempt contained logo
    /// assets. `None` until that attempt resolves; set once and never
    /// overwritten, including across tweaks in the same session.
    pub original_had_logos: Option<bool>,

    pub is_tweak: bool,
    pub user_tweak_instruction: Option<String>,
    pub session_id: Option<String>,

    pub webhook_url: Option<String>,
    /// Concluded delivery cycles, not individual HTTP attempts.
    pub webhook_attempts: u32,

    /// Durable upload failed; `current_image_url` holds the inline candidate.
    pub storage_fallback: bool,
    pub error: Option<String>,

    #[serde(skip)]
    pub cancel_requested: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Parameters for creating a job. Inherited fields come from the latest job
/// of the same session when the submission is a tweak.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub brand_id: Uuid,
    pub prompt: String,
    pub max_attempts: u32,
    pub is_tweak: bool,
    pub user_tweak_instruction: Option<String>,
    pub session_id: Option<String>,
    pub webhook_url: Option<String>,
    pub expiry_hours: i64,
    pub inherited_had_logos: Option<bool>,
    pub inherited_image_url: Option<String>,
}

impl Job {
    pub fn create(new: NewJob) -> Self {
        let now = Utc::now();
        Self {
            job_id: Uuid::new_v4(),
            brand_id: new.brand_id,
            status: JobStatus::Pending,
            original_prompt: new.prompt.clone(),
            prompt: new.prompt,
            attempt_count: 0,
            max_attempts: new.max_attempts,
            audit_history: Vec::new(),
            current_image_url: new.inherited_image_url,
            is_approved: false,
            original_had_logos: new.inherited_had_logos,
            is_tweak: new.is_tweak,
            user_tweak_instruction: new.user_tweak_instruction,
            session_id: new.session_id,
            webhook_url: new.webhook_url,
            webhook_attempts: 0,
            storage_fallback: false,
            error: None,
            cancel_requested: false,
            created_at: now,
            updated_at: now,
            expires_at: now + Duration::hours(new.expiry_hours),
        }
    }

    pub fn latest_audit(&self) -> Option<&AuditResult> {
        self.audit_history.last()
    }

    /// Apply a state transition, validating it against the transition table.
    /// Re-entering the current state is a no-op (provider retries loop back
    /// through `generating` without changing state).
    pub fn transition(&mut self, next: JobStatus) -> Result<(), TransitionError> {
        if self.status == next {
            return Ok(());
        }
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Capture the logo-presence anchor. Only the first call has any effect.
    pub fn mark_had_logos(&mut self, had_logos: bool) {
        if self.original_had_logos.is_none() {
            self.original_had_logos = Some(had_logos);
        }
    }
}
