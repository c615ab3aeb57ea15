use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client, Url};

use crate::models::search::{SearchQuery, SearchResponse};

/// One job's session with the search backend.
///
/// All keyword fetches of a job go through the same instance, which owns
/// the connection pool for the duration of the job.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SearchError>;
}

/// Opens a [`SearchBackend`] session for a job's target URL.
pub trait SearchConnector: Send + Sync {
    fn open(&self, target: &Url) -> Result<Box<dyn SearchBackend>, SearchError>;
}

/// Connector that opens a fresh reqwest client per job.
#[derive(Debug, Default, Clone)]
pub struct HttpConnector;

impl SearchConnector for HttpConnector {
    fn open(&self, target: &Url) -> Result<Box<dyn SearchBackend>, SearchError> {
        let http = Client::builder()
            .build()
            .map_err(|e| SearchError::Transport(e.to_string()))?;

        Ok(Box::new(HttpSearchBackend {
            http,
            url: target.clone(),
        }))
    }
}

/// Client for the product search API.
pub struct HttpSearchBackend {
    http: Client,
    url: Url,
}

#[async_trait]
impl SearchBackend for HttpSearchBackend {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SearchError> {
        let response = self
            .http
            .post(self.url.clone())
            .json(query)
            .send()
            .await
            .map_err(SearchError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status(status.as_u16()));
        }

        // Gateways answer 2xx with HTML error pages; those are worth retrying.
        if !is_json(response.headers()) {
            return Err(SearchError::Transport(format!(
                "unexpected content type {:?}",
                response.headers().get(CONTENT_TYPE)
            )));
        }

        let body: serde_json::Value = response.json().await.map_err(|e| {
            if e.is_decode() {
                SearchError::Decode(e.to_string())
            } else {
                SearchError::from_reqwest(e)
            }
        })?;

        SearchResponse::from_json(&body)
            .ok_or_else(|| SearchError::Decode("response body is not a JSON object".to_string()))
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|mime| {
            let mime = mime.trim().to_ascii_lowercase();
            mime == "application/json" || mime.ends_with("+json")
        })
        .unwrap_or(false)
}

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum SearchError {
    #[error("search backend returned HTTP {0}")]
    Status(u16),

    #[error("search request timed out")]
    Timeout,

    #[error("search backend reported timed out services")]
    BackendTimedOut,

    #[error("search request failed: {0}")]
    Transport(String),

    #[error("failed to decode search response: {0}")]
    Decode(String),
}

impl SearchError {
    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SearchError::Timeout
        } else if let Some(status) = e.status() {
            SearchError::Status(status.as_u16())
        } else {
            SearchError::Transport(e.to_string())
        }
    }

    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SearchError::Decode(_))
    }
}
