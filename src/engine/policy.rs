use crate::models::job::Job;

/// Verdict of the attempt budget policy after an attempt concludes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptDecision {
    /// Loop back through correction and generation.
    Retry,
    /// Latest audit approved; persist the result.
    Finalize,
    /// Budget exhausted without approval; hand off to a human.
    NeedsReview,
}

/// Decide what happens after the current attempt. Pure and total: every
/// reachable job state maps to exactly one decision.
///
/// Only the most recent audit is consulted; an attempt whose generation or
/// audit step failed has no audit entry for it and therefore counts as
/// unapproved.
pub fn decide(job: &Job) -> AttemptDecision {
    let approved = job.latest_audit().map(|a| a.approved).unwrap_or(false);

    if approved {
        AttemptDecision::Finalize
    } else if job.attempt_count >= job.max_attempts {
        AttemptDecision::NeedsReview
    } else {
        AttemptDecision::Retry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::NewJob;
    use uuid::Uuid;

    fn job_with(attempts: u32, max: u32, last_approved: Option<bool>) -> Job {
        let mut job = Job::create(NewJob {
            brand_id: Uuid::new_v4(),
            prompt: "p".to_string(),
            max_attempts: max,
            is_tweak: false,
            user_tweak_instruction: None,
            session_id: None,
            webhook_url: None,
            expiry_hours: 24,
            inherited_had_logos: None,
            inherited_image_url: None,
        });
        job.attempt_count = attempts;
        if let Some(approved) = last_approved {
            job.audit_history.push(crate::models::audit::AuditResult {
                attempt: attempts,
                overall_score: if approved { 95.0 } else { 40.0 },
                approved,
                category_details: vec![],
                summary: None,
            });
        }
        job
    }

    #[test]
    fn test_approved_finalizes() {
        assert_eq!(decide(&job_with(1, 3, Some(true))), AttemptDecision::Finalize);
    }

    #[test]
    fn test_approved_finalizes_even_on_last_attempt() {
        assert_eq!(decide(&job_with(3, 3, Some(true))), AttemptDecision::Finalize);
    }

    #[test]
    fn test_unapproved_with_budget_left_retries() {
        assert_eq!(decide(&job_with(1, 3, Some(false))), AttemptDecision::Retry);
        assert_eq!(decide(&job_with(2, 3, Some(false))), AttemptDecision::Retry);
    }

    #[test]
    fn test_exhausted_budget_needs_review() {
        assert_eq!(
            decide(&job_with(3, 3, Some(false))),
            AttemptDecision::NeedsReview
        );
    }

    #[test]
    fn test_failed_step_without_audit_counts_as_unapproved() {
        assert_eq!(decide(&job_with(1, 3, None)), AttemptDecision::Retry);
        assert_eq!(decide(&job_with(3, 3, None)), AttemptDecision::NeedsReview);
    }

    #[test]
    fn test_totality_over_state_grid() {
        // Every combination of counters and audit outcomes yields exactly
        // one decision without panicking.
        for max in 1..=5u32 {
            for attempts in 0..=max {
                for last in [None, Some(false), Some(true)] {
                    let _ = decide(&job_with(attempts, max, last));
                }
            }
        }
    }
}
