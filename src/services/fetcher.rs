//! Per-keyword product counting with retry, backoff and field-projection fallback.
//!
//! A keyword is first queried with the `product_id`-only projection. An
//! empty answer to that query is ambiguous, so it is followed by exactly one
//! more step with the full projection, whose empty answer is final. Both
//! steps draw on one retry budget.

use std::time::Duration;

use tokio::time::{sleep, timeout};

use crate::models::search::{FieldProjection, SearchQuery, SearchResponse};
use crate::services::search::{SearchBackend, SearchError};

/// Retry schedule for a single keyword fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Failed attempts tolerated per keyword before giving up.
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub backoff_min: Duration,
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            attempt_timeout: Duration::from_secs(30),
            backoff_min: Duration::from_secs(1),
            backoff_max: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Randomized exponential delay after the `failures`-th failed attempt.
    ///
    /// Drawn uniformly from `[min, min * 2^(failures - 1)]`, capped at `max`.
    pub fn backoff(&self, failures: u32) -> Duration {
        let exp = 2u32.saturating_pow(failures.saturating_sub(1));
        let high = self
            .backoff_min
            .saturating_mul(exp)
            .min(self.backoff_max)
            .max(self.backoff_min);
        let spread = high.saturating_sub(self.backoff_min);
        self.backoff_min + spread.mul_f64(fastrand::f64())
    }
}

/// Why a keyword could not be counted.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum FetchError {
    #[error("gave up after {attempts} failed attempts: {last}")]
    Exhausted { attempts: u32, last: SearchError },

    #[error("search response rejected: {0}")]
    Rejected(SearchError),
}

/// Outcome of a single search request.
#[derive(Debug)]
enum Attempt {
    Found(u64),
    /// No products and no timeout marker.
    Empty,
    Retry(SearchError),
    Fatal(SearchError),
}

impl Attempt {
    fn classify(response: SearchResponse) -> Self {
        if response.product_count > 0 {
            Attempt::Found(response.product_count as u64)
        } else if response.timed_out {
            Attempt::Retry(SearchError::BackendTimedOut)
        } else {
            Attempt::Empty
        }
    }
}

/// Counts products for keywords against one search session.
pub struct KeywordFetcher<'a> {
    backend: &'a dyn SearchBackend,
    policy: &'a RetryPolicy,
}

impl<'a> KeywordFetcher<'a> {
    pub fn new(backend: &'a dyn SearchBackend, policy: &'a RetryPolicy) -> Self {
        Self { backend, policy }
    }

    /// Count products for `keyword`, starting with the `product_id`-only projection.
    pub async fn count(&self, keyword: &str) -> Result<u64, FetchError> {
        self.count_with(keyword, FieldProjection::IdOnly).await
    }

    /// Count products for `keyword`, starting with the given projection.
    ///
    /// Blank keywords count as 0 without issuing a request.
    pub async fn count_with(
        &self,
        keyword: &str,
        projection: FieldProjection,
    ) -> Result<u64, FetchError> {
        let query = keyword.trim();
        if query.is_empty() {
            return Ok(0);
        }

        let mut projection = projection;
        let mut failures = 0u32;

        loop {
            match self.attempt(query, projection).await {
                Attempt::Found(count) => return Ok(count),
                Attempt::Empty => match projection {
                    FieldProjection::IdOnly => {
                        tracing::debug!(keyword = %query, "Empty restricted result, retrying with full fields");
                        projection = FieldProjection::Full;
                    }
                    FieldProjection::Full => return Ok(0),
                },
                Attempt::Fatal(e) => return Err(FetchError::Rejected(e)),
                Attempt::Retry(e) => {
                    failures += 1;
                    if failures >= self.policy.max_attempts {
                        return Err(FetchError::Exhausted {
                            attempts: failures,
                            last: e,
                        });
                    }

                    let delay = self.policy.backoff(failures);
                    tracing::debug!(
                        keyword = %query,
                        attempt = failures,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Search attempt failed, backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    async fn attempt(&self, query: &str, projection: FieldProjection) -> Attempt {
        let request = SearchQuery::new(query, projection);

        match timeout(self.policy.attempt_timeout, self.backend.search(&request)).await {
            Err(_) => Attempt::Retry(SearchError::Timeout),
            Ok(Err(e)) if e.is_retryable() => Attempt::Retry(e),
            Ok(Err(e)) => Attempt::Fatal(e),
            Ok(Ok(response)) => Attempt::classify(response),
        }
    }
}
