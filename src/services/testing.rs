//! Search backend doubles shared by the service unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;

use crate::models::search::{SearchQuery, SearchResponse};
use crate::services::fetcher::RetryPolicy;
use crate::services::search::{SearchBackend, SearchConnector, SearchError};

pub type Reply = Result<SearchResponse, SearchError>;

pub fn found(product_count: usize) -> Reply {
    Ok(SearchResponse {
        product_count,
        timed_out: false,
    })
}

/// Five attempts, no waiting between them.
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 5,
        attempt_timeout: Duration::from_secs(5),
        backoff_min: Duration::ZERO,
        backoff_max: Duration::ZERO,
    }
}

#[derive(Default)]
struct Script {
    replies: VecDeque<Reply>,
    repeat: Option<Reply>,
    calls: Vec<SearchQuery>,
}

/// Replays a fixed sequence of replies and records every query.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
    delay: Duration,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                replies: replies.into(),
                ..Default::default()
            })),
            delay: Duration::ZERO,
        }
    }

    /// Answers every query with the same reply.
    pub fn repeating(reply: Reply) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                repeat: Some(reply),
                ..Default::default()
            })),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<SearchQuery> {
        self.script.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl SearchBackend for ScriptedBackend {
    async fn search(&self, query: &SearchQuery) -> Reply {
        let reply = {
            let mut script = self.script.lock().unwrap();
            script.calls.push(query.clone());
            match script.replies.pop_front() {
                Some(reply) => reply,
                None => script
                    .repeat
                    .clone()
                    .unwrap_or_else(|| Err(SearchError::Transport("script exhausted".into()))),
            }
        };
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        reply
    }
}

/// Answers by keyword and tracks how many searches run at once.
#[derive(Clone)]
pub struct KeywordBackend {
    respond: Arc<dyn Fn(&str) -> Reply + Send + Sync>,
    delay: Arc<dyn Fn(&str) -> Duration + Send + Sync>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

impl KeywordBackend {
    pub fn new(respond: impl Fn(&str) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            respond: Arc::new(respond),
            delay: Arc::new(|_| Duration::from_millis(5)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: impl Fn(&str) -> Duration + Send + Sync + 'static) -> Self {
        self.delay = Arc::new(delay);
        self
    }

    /// Most searches observed in flight at the same time.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchBackend for KeywordBackend {
    async fn search(&self, query: &SearchQuery) -> Reply {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep((self.delay)(&query.query)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        (self.respond)(&query.query)
    }
}

/// Wraps a backend and counts how many of its copies have been dropped.
#[derive(Clone)]
pub struct DropTracked<B> {
    inner: B,
    drops: Arc<AtomicUsize>,
}

impl<B> DropTracked<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            drops: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn drops(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }
}

impl<B> Drop for DropTracked<B> {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl<B: SearchBackend> SearchBackend for DropTracked<B> {
    async fn search(&self, query: &SearchQuery) -> Reply {
        self.inner.search(query).await
    }
}

/// Hands out a shared backend and records the URLs jobs were opened against.
#[derive(Clone)]
pub struct FakeConnector<B> {
    backend: B,
    targets: Arc<Mutex<Vec<Url>>>,
    refuse: bool,
}

impl<B: SearchBackend + Clone + 'static> FakeConnector<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            targets: Arc::new(Mutex::new(Vec::new())),
            refuse: false,
        }
    }

    /// A connector whose sessions can never be opened.
    pub fn refusing(backend: B) -> Self {
        Self {
            refuse: true,
            ..Self::new(backend)
        }
    }

    pub fn targets(&self) -> Vec<Url> {
        self.targets.lock().unwrap().clone()
    }
}

impl<B: SearchBackend + Clone + 'static> SearchConnector for FakeConnector<B> {
    fn open(&self, target: &Url) -> Result<Box<dyn SearchBackend>, SearchError> {
        self.targets.lock().unwrap().push(target.clone());
        if self.refuse {
            return Err(SearchError::Transport("connection refused".into()));
        }
        Ok(Box::new(self.backend.clone()))
    }
}
