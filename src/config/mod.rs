use serde::Deserialize;
use std::time::Duration;

use crate::services::fetcher::RetryPolicy;
use crate::services::processor::SearchSettings;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Search endpoint URL; `{env}` is replaced with the job's environment
    /// and `shop_id` is appended as a query parameter.
    #[serde(default = "default_search_url_template")]
    pub search_url_template: String,

    /// Keyword fetches in flight per job
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    /// Attempts per keyword before it is recorded as failed
    #[serde(default = "default_fetch_max_attempts")]
    pub fetch_max_attempts: u32,

    /// Timeout for a single search request, in seconds
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Lower bound of the randomized retry delay, in seconds
    #[serde(default = "default_backoff_min_secs")]
    pub backoff_min_secs: u64,

    /// Upper bound of the randomized retry delay, in seconds
    #[serde(default = "default_backoff_max_secs")]
    pub backoff_max_secs: u64,

    /// Maximum accepted request body size
    #[serde(default = "default_body_limit_bytes")]
    pub body_limit_bytes: usize,

    /// How long finished job results stay readable, in seconds
    #[serde(default = "default_job_retention_secs")]
    pub job_retention_secs: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_search_url_template() -> String {
    "https://search-{env}-dlp-adept-search.search-prod.adeptmind.app/search".to_string()
}

fn default_max_concurrent_fetches() -> usize {
    32
}

fn default_fetch_max_attempts() -> u32 {
    5
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_backoff_min_secs() -> u64 {
    1
}

fn default_backoff_max_secs() -> u64 {
    10
}

fn default_body_limit_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_job_retention_secs() -> u64 {
    24 * 60 * 60
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.fetch_max_attempts.max(1),
            attempt_timeout: Duration::from_secs(self.fetch_timeout_secs),
            backoff_min: Duration::from_secs(self.backoff_min_secs),
            backoff_max: Duration::from_secs(self.backoff_max_secs.max(self.backoff_min_secs)),
        }
    }

    pub fn job_retention(&self) -> Duration {
        Duration::from_secs(self.job_retention_secs)
    }

    pub fn search_settings(&self) -> SearchSettings {
        SearchSettings {
            url_template: self.search_url_template.clone(),
            retry: self.retry_policy(),
            max_concurrent_fetches: self.max_concurrent_fetches.max(1),
        }
    }
}
