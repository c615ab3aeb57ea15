use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use product_counter::app_state::AppState;
use product_counter::config::AppConfig;
use product_counter::routes;
use product_counter::services::{
    processor::JobProcessor, queue, search::HttpConnector, store::JobStore, worker::Worker,
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing product-counter server");

    let prometheus_handle =
        routes::metrics::install_recorder().expect("Failed to install Prometheus metrics recorder");

    let store = Arc::new(JobStore::with_retention(config.job_retention()));
    let (queue, receiver) = queue::channel();
    let processor = JobProcessor::new(
        Arc::clone(&store),
        Arc::new(HttpConnector),
        config.search_settings(),
    );

    // The worker lives as long as the server; both stop on the same token.
    let shutdown = CancellationToken::new();
    tracing::info!(
        max_concurrent_fetches = config.max_concurrent_fetches,
        fetch_max_attempts = config.fetch_max_attempts,
        "Launching background worker"
    );
    let worker = Worker::new(receiver, processor, shutdown.clone()).spawn();

    let state = AppState::new(store, queue);

    let app = routes::router(state)
        .merge(routes::metrics::router(prometheus_handle))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(config.body_limit_bytes));

    tracing::info!("Starting product-counter on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .expect("Server error");

    shutdown.cancel();
    if let Err(e) = worker.await {
        tracing::error!(error = %e, "Worker task ended abnormally");
    }

    tracing::info!("product-counter stopped");
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = shutdown.cancelled() => {},
    }

    tracing::info!("Shutdown signal received, draining");
    shutdown.cancel();
}
