mod app_state;
mod config;
mod engine;
mod models;
mod routes;
mod services;
mod store;

use axum::{routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use app_state::AppState;
use config::AppConfig;
use engine::Engine;
use services::{
    auditor::WorkersAiAuditor,
    brands::BrandServiceClient,
    generator::WorkersAiGenerator,
    storage::R2Client,
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

    tracing::info!("Initializing brandgen server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_counter!("generation_jobs_total", "Total asset-generation jobs submitted");
    metrics::describe_counter!("generation_jobs_completed", "Total jobs finalized with an approved image");
    metrics::describe_counter!(
        "generation_jobs_needs_review",
        "Total jobs that exhausted their attempt budget and await human review"
    );
    metrics::describe_counter!("generation_jobs_failed", "Total jobs that failed unrecoverably");
    metrics::describe_counter!("generation_jobs_cancelled", "Total jobs cancelled by callers");
    metrics::describe_counter!("generation_attempts_total", "Total generation attempts across all jobs");
    metrics::describe_counter!(
        "finalization_fallbacks",
        "Completed jobs whose durable upload failed and kept the inline image"
    );
    metrics::describe_counter!(
        "webhook_deliveries_abandoned",
        "Webhook delivery cycles abandoned after exhausting retries"
    );
    metrics::describe_histogram!("job_processing_seconds", "Time from first attempt to terminal state");

    // Initialize R2 storage client
    tracing::info!("Initializing R2 storage client");
    let r2_client = R2Client::new(
        &config.r2_bucket,
        &config.r2_endpoint,
        &config.r2_access_key,
        &config.r2_secret_key,
        &config.r2_public_base_url,
    )
    .expect("Failed to initialize R2 client");

    // Initialize brand guideline service client
    tracing::info!("Initializing brand service client");
    let brands = BrandServiceClient::new(&config.brand_service_url);

    // Initialize Workers AI clients
    tracing::info!("Initializing Cloudflare Workers AI clients");
    let generator = WorkersAiGenerator::new(&config.cf_account_id, &config.cf_api_token);
    let auditor = WorkersAiAuditor::new(&config.cf_account_id, &config.cf_api_token);

    // Assemble the job engine
    let engine = Engine::new(
        Arc::new(brands),
        Arc::new(generator),
        Arc::new(auditor),
        Arc::new(r2_client),
        config.engine_settings(),
    );

    // Background sweep of expired terminal jobs
    engine.spawn_expiry_sweeper();

    // Create shared application state
    let state = AppState::new(engine);

    // Build API routes
    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/v1/jobs", post(routes::jobs::submit_job))
        .route("/api/v1/jobs/{job_id}", get(routes::jobs::get_job_status))
        .route(
            "/api/v1/jobs/{job_id}/cancel",
            post(routes::jobs::cancel_job),
        )
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(1024 * 1024)); // 1 MB limit

    tracing::info!("Starting brandgen on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
