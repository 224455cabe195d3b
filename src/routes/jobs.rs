use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::engine::SubmitError;
use crate::models::api::{
    CancelJobResponse, JobStatusResponse, SubmitJobRequest, SubmitJobResponse,
};

/// POST /api/v1/jobs — Submit an asset-generation job.
pub async fn submit_job(
    State(state): State<AppState>,
    Json(request): Json<SubmitJobRequest>,
) -> Result<(StatusCode, Json<SubmitJobResponse>), StatusCode> {
    request
        .validate()
        .map_err(|_| StatusCode::UNPROCESSABLE_ENTITY)?;

    let job = state
        .engine
        .submit(request.into())
        .await
        .map_err(|e| match e {
            SubmitError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            SubmitError::UnknownBrand(_) => StatusCode::NOT_FOUND,
            SubmitError::BrandService(_) => StatusCode::BAD_GATEWAY,
        })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitJobResponse {
            job_id: job.job_id,
            status: job.status,
            message: "Asset generation job accepted".to_string(),
        }),
    ))
}

/// GET /api/v1/jobs/{job_id} — Poll a job snapshot.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobStatusResponse>, StatusCode> {
    let job = state
        .engine
        .get_job(job_id)
        .await
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(job.into()))
}

/// POST /api/v1/jobs/{job_id}/cancel — Request cancellation.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<CancelJobResponse>, StatusCode> {
    let (job, cancelled) = state
        .engine
        .cancel_job(job_id)
        .await
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(CancelJobResponse {
        job_id: job.job_id,
        cancelled,
        status: job.status,
    }))
}
