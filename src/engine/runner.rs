//! Single-writer execution loop for one job.
//!
//! Drives `pending -> generating -> auditing -> (correcting -> generating)*`
//! until the attempt budget policy finalizes the job or routes it to human
//! review. Cancellation is applied at the checkpoints between steps; an
//! in-flight provider call is allowed to finish and its output discarded.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::engine::policy::AttemptDecision;
use crate::engine::{continuity, correction, policy, scoring, EngineCore, EngineError};
use crate::models::brand::LogoAsset;
use crate::models::job::JobStatus;
use crate::services::generator::GeneratedImage;
use crate::services::webhook::WebhookPayload;

/// What the runner does after a generation or audit step failed.
enum StepFollowup {
    RetryAttempt,
    Stop,
}

pub(crate) async fn run_job(core: Arc<EngineCore>, job_id: Uuid) {
    let started = Instant::now();

    if let Err(e) = drive(&core, job_id).await {
        error!(job_id = %job_id, error = %e, "Job failed with unrecoverable error");
        core.store.finish_with_error(job_id, &e.to_string()).await;
        metrics::counter!("generation_jobs_failed").increment(1);
    }

    metrics::histogram!("job_processing_seconds").record(started.elapsed().as_secs_f64());

    notify_terminal(&core, job_id).await;
}

async fn drive(core: &Arc<EngineCore>, job_id: Uuid) -> Result<(), EngineError> {
    let brand_id = core
        .store
        .get(job_id)
        .await
        .ok_or(EngineError::JobMissing(job_id))?
        .brand_id;

    // One brand-context fetch per job. Guidelines drive the audit weighting;
    // logo assets are supplied per-attempt as the resolver decides.
    let brand = core.brands.fetch(brand_id).await?;
    let threshold_pct = core.settings.compliance_threshold * 100.0;

    loop {
        if apply_cancel_checkpoint(core, job_id).await? {
            return Ok(());
        }

        // ── Generation ───────────────────────────────────────────────
        let (prompt, attempt, supply_logos) = core
            .store
            .with_job_mut(job_id, |job| {
                job.transition(JobStatus::Generating)?;
                let supply = continuity::needs_logos(job);
                job.mark_had_logos(brand.has_logos());
                job.attempt_count += 1;
                Ok::<_, EngineError>((job.prompt.clone(), job.attempt_count, supply))
            })
            .await??;

        metrics::counter!("generation_attempts_total").increment(1);
        info!(
            job_id = %job_id,
            attempt = attempt,
            supply_logos = supply_logos,
            "Starting generation attempt"
        );

        let references: &[LogoAsset] = if supply_logos { &brand.logos } else { &[] };

        let generated = match tokio::time::timeout(
            core.settings.step_timeout,
            core.generator.generate(&prompt, references),
        )
        .await
        {
            Err(_) => {
                warn!(job_id = %job_id, attempt = attempt, "Generation step timed out");
                match conclude_failed_step(core, job_id).await? {
                    StepFollowup::RetryAttempt => continue,
                    StepFollowup::Stop => return Ok(()),
                }
            }
            Ok(Err(e)) if e.is_retriable() => {
                warn!(job_id = %job_id, attempt = attempt, error = %e, "Generation attempt failed");
                match conclude_failed_step(core, job_id).await? {
                    StepFollowup::RetryAttempt => continue,
                    StepFollowup::Stop => return Ok(()),
                }
            }
            Ok(Err(e)) => return Err(EngineError::Generation(e)),
            Ok(Ok(image)) => image,
        };

        // A cancellation during the provider call discards the candidate.
        if apply_cancel_checkpoint(core, job_id).await? {
            return Ok(());
        }

        let inline_url = generated.to_data_url();
        core.store
            .with_job_mut(job_id, |job| {
                job.transition(JobStatus::Auditing)?;
                job.current_image_url = Some(inline_url);
                Ok::<_, EngineError>(())
            })
            .await??;

        // ── Audit ────────────────────────────────────────────────────
        let raw = match tokio::time::timeout(
            core.settings.step_timeout,
            core.auditor.audit(&generated, &brand.guidelines),
        )
        .await
        {
            Err(_) => {
                warn!(job_id = %job_id, attempt = attempt, "Audit step timed out");
                match conclude_failed_step(core, job_id).await? {
                    StepFollowup::RetryAttempt => continue,
                    StepFollowup::Stop => return Ok(()),
                }
            }
            Ok(Err(e)) if e.is_retriable() => {
                warn!(job_id = %job_id, attempt = attempt, error = %e, "Audit attempt failed");
                match conclude_failed_step(core, job_id).await? {
                    StepFollowup::RetryAttempt => continue,
                    StepFollowup::Stop => return Ok(()),
                }
            }
            Ok(Err(e)) => return Err(EngineError::Audit(e)),
            Ok(Ok(raw)) => raw,
        };

        let weighed = scoring::weigh(&raw, &brand.guidelines, threshold_pct, attempt);
        info!(
            job_id = %job_id,
            attempt = attempt,
            overall_score = weighed.overall_score,
            approved = weighed.approved,
            "Audit complete"
        );

        let decision = core
            .store
            .with_job_mut(job_id, |job| {
                job.audit_history.push(weighed.clone());
                policy::decide(job)
            })
            .await?;

        match decision {
            AttemptDecision::Finalize => {
                finalize(core, job_id, &generated, attempt).await?;
                metrics::counter!("generation_jobs_completed").increment(1);
                info!(job_id = %job_id, attempts = attempt, "Job completed");
                return Ok(());
            }
            AttemptDecision::NeedsReview => {
                core.store
                    .with_job_mut(job_id, |job| job.transition(JobStatus::NeedsReview))
                    .await??;
                metrics::counter!("generation_jobs_needs_review").increment(1);
                info!(
                    job_id = %job_id,
                    attempts = attempt,
                    "Attempt budget exhausted, routed to human review"
                );
                return Ok(());
            }
            AttemptDecision::Retry => {
                core.store
                    .with_job_mut(job_id, |job| {
                        job.transition(JobStatus::Correcting)?;
                        if let Some(fix) = correction::synthesize(&weighed) {
                            job.prompt = correction::amend_prompt(&job.prompt, &fix);
                            debug!(job_id = %job_id, "Applied prompt correction");
                        } else {
                            debug!(
                                job_id = %job_id,
                                "No actionable correction, retrying prompt unchanged"
                            );
                        }
                        Ok::<_, EngineError>(())
                    })
                    .await??;
            }
        }
    }
}

/// Apply the attempt budget policy after a step failure. The attempt was
/// already consumed and produced no audit, so the latest audit (if any) is
/// unapproved: an approved audit finalizes immediately and never reaches
/// this path. `Retry` re-enters generation with the prompt unchanged.
async fn conclude_failed_step(
    core: &Arc<EngineCore>,
    job_id: Uuid,
) -> Result<StepFollowup, EngineError> {
    let followup = core
        .store
        .with_job_mut(job_id, |job| {
            match policy::decide(job) {
                AttemptDecision::Retry => {
                    if job.status == JobStatus::Auditing {
                        job.transition(JobStatus::Correcting)?;
                    }
                    Ok::<_, EngineError>(StepFollowup::RetryAttempt)
                }
                AttemptDecision::Finalize | AttemptDecision::NeedsReview => {
                    job.transition(JobStatus::NeedsReview)?;
                    Ok(StepFollowup::Stop)
                }
            }
        })
        .await??;

    if matches!(followup, StepFollowup::Stop) {
        metrics::counter!("generation_jobs_needs_review").increment(1);
        info!(
            job_id = %job_id,
            "Attempt budget exhausted after step failure, routed to human review"
        );
    }
    Ok(followup)
}

/// Persist the approved candidate. A storage outage never discards a
/// compliant result: the job completes with the inline candidate retained
/// and the fallback flag set.
async fn finalize(
    core: &Arc<EngineCore>,
    job_id: Uuid,
    image: &GeneratedImage,
    attempt: u32,
) -> Result<(), EngineError> {
    let ext = match image.content_type.as_str() {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        _ => "bin",
    };
    let key = format!("assets/{job_id}/attempt-{attempt}.{ext}");

    let durable_url = match core
        .durable
        .upload(&key, &image.bytes, &image.content_type)
        .await
    {
        Ok(url) => Some(url),
        Err(e) => {
            warn!(
                job_id = %job_id,
                key = %key,
                error = %e,
                "Durable upload failed, retaining inline candidate"
            );
            metrics::counter!("finalization_fallbacks").increment(1);
            None
        }
    };

    core.store
        .with_job_mut(job_id, |job| {
            job.transition(JobStatus::Completed)?;
            job.is_approved = true;
            match &durable_url {
                Some(url) => {
                    job.current_image_url = Some(url.clone());
                    job.storage_fallback = false;
                }
                // The inline data: URL is already in place.
                None => job.storage_fallback = true,
            }
            Ok::<_, EngineError>(())
        })
        .await??;
    Ok(())
}

async fn apply_cancel_checkpoint(
    core: &Arc<EngineCore>,
    job_id: Uuid,
) -> Result<bool, EngineError> {
    let cancelled = core
        .store
        .with_job_mut(job_id, |job| {
            if job.cancel_requested && !job.status.is_terminal() {
                job.transition(JobStatus::Cancelled)?;
                Ok::<_, EngineError>(true)
            } else {
                Ok(false)
            }
        })
        .await??;

    if cancelled {
        metrics::counter!("generation_jobs_cancelled").increment(1);
        info!(job_id = %job_id, "Job cancelled at checkpoint");
    }
    Ok(cancelled)
}

/// Fire the terminal webhook, if one was registered. One delivery cycle per
/// terminal job; the cycle counter is the only field a terminal job still
/// accepts writes to.
async fn notify_terminal(core: &Arc<EngineCore>, job_id: Uuid) {
    let Some(job) = core.store.get(job_id).await else {
        return;
    };
    if !job.status.is_terminal() {
        return;
    }
    let Some(url) = job.webhook_url.clone() else {
        return;
    };

    let payload = WebhookPayload {
        job_id,
        status: job.status,
        result: serde_json::json!({
            "image_url": job.current_image_url,
            "is_approved": job.is_approved,
            "attempt_count": job.attempt_count,
            "overall_score": job.latest_audit().map(|a| a.overall_score),
            "error": job.error,
        }),
        timestamp: Utc::now(),
    };

    let delivered = core.webhooks.deliver(&url, &payload).await;

    let _ = core
        .store
        .with_job_mut(job_id, |job| job.webhook_attempts += 1)
        .await;

    if !delivered {
        warn!(job_id = %job_id, "Terminal notification could not be delivered");
    }
}
