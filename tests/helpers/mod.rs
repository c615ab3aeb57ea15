//! Test helper utilities for end-to-end testing
//!
//! Starts the real router and worker on an ephemeral port, backed by a fake
//! product search service that answers according to the keyword it receives:
//!
//! - `error*`    always HTTP 500
//! - `html*`     HTTP 200 with an HTML error page, like a misbehaving gateway
//! - `zero*`     no products, with or without field restriction
//! - `fallback*` no products when restricted to `product_id`, 5 otherwise
//! - `slow*`     one product after 300ms
//! - anything else: as many products as the keyword has characters

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use product_counter::app_state::AppState;
use product_counter::models::submission::{JobStatusResponse, StartJobResponse};
use product_counter::routes;
use product_counter::services::fetcher::RetryPolicy;
use product_counter::services::processor::{JobProcessor, SearchSettings};
use product_counter::services::queue;
use product_counter::services::search::HttpConnector;
use product_counter::services::store::JobStore;
use product_counter::services::worker::Worker;

/// One request received by the fake search service.
#[derive(Debug, Clone)]
pub struct RecordedSearch {
    pub environment: String,
    pub shop_id: Option<String>,
    pub body: Value,
}

impl RecordedSearch {
    pub fn query(&self) -> &str {
        self.body["query"].as_str().unwrap_or_default()
    }

    pub fn restricted(&self) -> bool {
        self.body.get("include_fields").is_some()
    }
}

#[derive(Clone, Default)]
pub struct FakeSearch {
    requests: Arc<Mutex<Vec<RecordedSearch>>>,
}

impl FakeSearch {
    pub fn requests(&self) -> Vec<RecordedSearch> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_for(&self, keyword: &str) -> Vec<RecordedSearch> {
        self.requests()
            .into_iter()
            .filter(|r| r.query() == keyword)
            .collect()
    }
}

fn products(count: usize) -> Value {
    Value::Array((0..count).map(|i| json!({"product_id": i})).collect())
}

async fn fake_search(
    State(fake): State<FakeSearch>,
    Path(environment): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    let recorded = RecordedSearch {
        environment,
        shop_id: params.get("shop_id").cloned(),
        body,
    };
    let query = recorded.query().to_string();
    let restricted = recorded.restricted();
    fake.requests.lock().unwrap().push(recorded);

    if query.starts_with("error") {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    if query.starts_with("html") {
        return Html("<html><body>502 Bad Gateway</body></html>").into_response();
    }
    if query.starts_with("zero") {
        return Json(json!({"products": []})).into_response();
    }
    if query.starts_with("fallback") {
        let count = if restricted { 0 } else { 5 };
        return Json(json!({"products": products(count)})).into_response();
    }
    if query.starts_with("slow") {
        sleep(Duration::from_millis(300)).await;
        return Json(json!({"products": products(1)})).into_response();
    }

    Json(json!({"products": products(query.chars().count())})).into_response()
}

async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// A running product-counter instance.
pub struct TestApp {
    pub base_url: String,
    pub client: reqwest::Client,
    pub search: FakeSearch,
    shutdown: CancellationToken,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Start the fake search service and the app wired to it.
pub async fn spawn_app() -> TestApp {
    let search = FakeSearch::default();
    let search_addr = serve(
        Router::new()
            .route("/{env}/search", post(fake_search))
            .with_state(search.clone()),
    )
    .await;

    let settings = SearchSettings {
        url_template: format!("http://{search_addr}/{{env}}/search"),
        retry: RetryPolicy {
            max_attempts: 5,
            attempt_timeout: Duration::from_secs(5),
            backoff_min: Duration::from_millis(1),
            backoff_max: Duration::from_millis(5),
        },
        max_concurrent_fetches: 32,
    };

    let store = Arc::new(JobStore::new());
    let (queue, receiver) = queue::channel();
    let processor = JobProcessor::new(Arc::clone(&store), Arc::new(HttpConnector), settings);
    let shutdown = CancellationToken::new();
    Worker::new(receiver, processor, shutdown.clone()).spawn();

    let app_addr = serve(routes::router(AppState::new(store, queue))).await;

    TestApp {
        base_url: format!("http://{app_addr}"),
        client: reqwest::Client::new(),
        search,
        shutdown,
    }
}

impl TestApp {
    /// Submit a job payload; returns the raw response.
    pub async fn post_job(&self, payload: &Value) -> reqwest::Response {
        self.client
            .post(format!("{}/start_job", self.base_url))
            .json(payload)
            .send()
            .await
            .unwrap()
    }

    /// Submit a valid job and return its id.
    pub async fn submit(&self, keywords: &[&str], shop_id: &str) -> Uuid {
        let response = self
            .post_job(&json!({"keywords": keywords, "shop_id": shop_id}))
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.json::<StartJobResponse>().await.unwrap();
        assert_eq!(body.status, "success");
        body.job_id
    }

    pub async fn job_status(&self, job_id: &str) -> JobStatusResponse {
        let response = self
            .client
            .get(format!("{}/get_results/{}", self.base_url, job_id))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        response.json::<JobStatusResponse>().await.unwrap()
    }

    /// Poll job status until complete or failed (with timeout)
    pub async fn wait_for_job(&self, job_id: Uuid) -> JobStatusResponse {
        for _ in 0..200 {
            let status = self.job_status(&job_id.to_string()).await;
            match status.status.as_str() {
                "complete" | "failed" => return status,
                "queued" | "processing" => sleep(Duration::from_millis(25)).await,
                other => panic!("Unknown job status: {other}"),
            }
        }
        panic!("Job {job_id} did not finish in time");
    }
}
