use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use garde::Validate;
use serde::Serialize;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::job::{Job, QueuedJob};
use crate::models::submission::{JobStatusResponse, StartJobRequest, StartJobResponse};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Errors returned to API callers; never carries internal details.
#[derive(Debug)]
pub enum ApiError {
    InvalidRequest,
    Unavailable,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::InvalidRequest => (StatusCode::BAD_REQUEST, "Invalid request"),
            ApiError::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, "Job worker unavailable"),
        };
        (
            status,
            Json(ErrorResponse {
                error: error.to_string(),
            }),
        )
            .into_response()
    }
}

/// POST /start_job — queue a batch of keywords for counting.
pub async fn start_job(
    State(state): State<AppState>,
    payload: Result<Json<StartJobRequest>, JsonRejection>,
) -> Result<Json<StartJobResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| {
        tracing::debug!(error = %e, "Rejected malformed job submission");
        ApiError::InvalidRequest
    })?;

    request.validate().map_err(|e| {
        tracing::debug!(error = %e, "Rejected invalid job submission");
        ApiError::InvalidRequest
    })?;

    let job_id = Uuid::new_v4();
    let job = Job::from(request);
    let keyword_count = job.keywords.len();

    // Recorded before enqueueing so the worker's update always wins.
    state.store.insert_queued(job_id).await;

    if let Err(e) = state.queue.enqueue(QueuedJob { job_id, job }) {
        tracing::error!(job_id = %job_id, error = %e, "Failed to enqueue job");
        state.store.discard(job_id).await;
        return Err(ApiError::Unavailable);
    }

    metrics::counter!("product_counter_jobs_submitted_total").increment(1);
    tracing::info!(
        job_id = %job_id,
        keyword_count,
        queue_depth = state.queue.depth(),
        "Job queued"
    );

    Ok(Json(StartJobResponse {
        status: "success".to_string(),
        job_id,
    }))
}

/// GET /get_results/{job_id} — current status, and results once terminal.
pub async fn get_results(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Json<JobStatusResponse> {
    let Ok(job_id) = Uuid::parse_str(&job_id) else {
        return Json(JobStatusResponse::not_found());
    };

    match state.store.get(job_id).await {
        Some(record) => Json(record.into()),
        None => Json(JobStatusResponse::not_found()),
    }
}
