use futures::future::join_all;
use tokio::sync::Semaphore;

use crate::models::job::{Keyword, KEYWORD_FAILED};
use crate::services::fetcher::{KeywordFetcher, RetryPolicy};
use crate::services::search::SearchBackend;

/// Count products for every keyword, at most `limit` searches at a time.
///
/// `result[i]` belongs to `keywords[i]`. A keyword whose fetch fails is
/// recorded as [`KEYWORD_FAILED`] without affecting the others, and so is
/// an entry that is neither text nor a number.
pub async fn run_all(
    backend: &dyn SearchBackend,
    keywords: &[Keyword],
    policy: &RetryPolicy,
    limit: usize,
) -> Vec<i64> {
    let semaphore = Semaphore::new(limit.max(1));
    let fetcher = KeywordFetcher::new(backend, policy);

    let fetches = keywords.iter().enumerate().map(|(index, keyword)| {
        let semaphore = &semaphore;
        let fetcher = &fetcher;
        async move {
            let Some(query) = keyword.as_query() else {
                tracing::warn!(index, keyword = ?keyword, "Keyword is not searchable text");
                metrics::counter!("product_counter_keyword_failures_total").increment(1);
                return KEYWORD_FAILED;
            };

            let Ok(_permit) = semaphore.acquire().await else {
                return KEYWORD_FAILED;
            };

            match fetcher.count(&query).await {
                Ok(count) => i64::try_from(count).unwrap_or(i64::MAX),
                Err(e) => {
                    tracing::warn!(index, keyword = %query, error = %e, "Keyword fetch failed");
                    metrics::counter!("product_counter_keyword_failures_total").increment(1);
                    KEYWORD_FAILED
                }
            }
        }
    });

    join_all(fetches).await
}
