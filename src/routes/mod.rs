pub mod health;
pub mod jobs;
pub mod metrics;

use axum::routing::{get, post};
use axum::Router;

use crate::app_state::AppState;

/// Job API and health routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/start_job", post(jobs::start_job))
        .route("/get_results/{job_id}", get(jobs::get_results))
        .with_state(state)
}
