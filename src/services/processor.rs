use std::sync::Arc;
use std::time::Instant;

use reqwest::Url;
use uuid::Uuid;

use crate::models::job::{Environment, Job, KEYWORD_FAILED};
use crate::services::fan_out;
use crate::services::fetcher::RetryPolicy;
use crate::services::search::{SearchConnector, SearchError};
use crate::services::store::JobStore;

/// How jobs reach the search backend.
#[derive(Debug, Clone)]
pub struct SearchSettings {
    /// Endpoint URL with an `{env}` placeholder.
    pub url_template: String,
    pub retry: RetryPolicy,
    pub max_concurrent_fetches: usize,
}

impl SearchSettings {
    /// Search endpoint for one (environment, shop) pair.
    pub fn target_url(&self, environment: Environment, shop_id: &str) -> Result<Url, ProcessError> {
        let raw = self.url_template.replace("{env}", &environment.to_string());
        let mut url =
            Url::parse(&raw).map_err(|e| ProcessError::InvalidTarget(format!("{raw}: {e}")))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ProcessError::InvalidTarget(format!(
                "{raw}: unsupported scheme {}",
                url.scheme()
            )));
        }

        url.query_pairs_mut().append_pair("shop_id", shop_id);
        Ok(url)
    }
}

/// Runs one job end to end and records its terminal state.
#[derive(Clone)]
pub struct JobProcessor {
    store: Arc<JobStore>,
    connector: Arc<dyn SearchConnector>,
    settings: Arc<SearchSettings>,
}

impl JobProcessor {
    pub fn new(
        store: Arc<JobStore>,
        connector: Arc<dyn SearchConnector>,
        settings: SearchSettings,
    ) -> Self {
        Self {
            store,
            connector,
            settings: Arc::new(settings),
        }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Process a dequeued job. Failures end up in the job record, not the caller.
    pub async fn process(&self, job_id: Uuid, job: &Job) {
        tracing::info!(
            job_id = %job_id,
            keyword_count = job.keywords.len(),
            shop_id = %job.shop_id,
            environment = %job.environment,
            "Processing keyword count job"
        );

        if let Err(e) = self.store.mark_processing(job_id).await {
            tracing::error!(job_id = %job_id, error = %e, "Failed to mark job as processing");
            return;
        }

        let start = Instant::now();
        let outcome = self.run(job).await;
        metrics::histogram!("product_counter_job_processing_seconds")
            .record(start.elapsed().as_secs_f64());

        match outcome {
            Ok(counts) => {
                let failed_keywords = counts.iter().filter(|&&c| c == KEYWORD_FAILED).count();
                if let Err(e) = self.store.complete(job_id, counts).await {
                    tracing::error!(job_id = %job_id, error = %e, "Failed to record job results");
                    return;
                }
                metrics::counter!("product_counter_jobs_completed_total").increment(1);
                tracing::info!(
                    job_id = %job_id,
                    failed_keywords,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Job completed"
                );
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Job processing failed");
                metrics::counter!("product_counter_jobs_failed_total").increment(1);
                if let Err(store_err) = self.store.fail(job_id, e.to_string()).await {
                    tracing::error!(job_id = %job_id, error = %store_err, "Failed to record job failure");
                }
            }
        }
    }

    /// The session is owned by this future and released when it completes or is dropped.
    async fn run(&self, job: &Job) -> Result<Vec<i64>, ProcessError> {
        let target = self.settings.target_url(job.environment, &job.shop_id)?;
        let backend = self.connector.open(&target).map_err(ProcessError::Connect)?;

        let counts = fan_out::run_all(
            backend.as_ref(),
            &job.keywords,
            &self.settings.retry,
            self.settings.max_concurrent_fetches,
        )
        .await;

        Ok(counts)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Invalid search target: {0}")]
    InvalidTarget(String),

    #[error("Could not open search session: {0}")]
    Connect(SearchError),
}
