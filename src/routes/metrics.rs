use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder and describe the service's metrics.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    metrics::describe_counter!(
        "product_counter_jobs_submitted_total",
        "Total keyword count jobs accepted"
    );
    metrics::describe_counter!(
        "product_counter_jobs_completed_total",
        "Total jobs that reached the complete state"
    );
    metrics::describe_counter!(
        "product_counter_jobs_failed_total",
        "Total jobs that reached the failed state"
    );
    metrics::describe_counter!(
        "product_counter_keyword_failures_total",
        "Keywords recorded as failed after exhausting retries"
    );
    metrics::describe_histogram!(
        "product_counter_job_processing_seconds",
        "Time to process a keyword count job"
    );
    metrics::describe_gauge!(
        "product_counter_queue_depth",
        "Current number of jobs waiting for the worker"
    );

    Ok(handle)
}

/// Router serving `/metrics` from the given recorder handle.
pub fn router(handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/metrics", get(prometheus_metrics))
        .with_state(Arc::new(handle))
}

/// Prometheus metrics scrape endpoint.
/// Returns metrics in Prometheus text exposition format.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}
