use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use image_labeler::app_state::AppState;
use image_labeler::config::AppConfig;
use image_labeler::db::{self, PgMetadataStore};
use image_labeler::routes;
use image_labeler::services::auth::JwtVerifier;
use image_labeler::services::queue::RedisWorkQueue;
use image_labeler::services::storage::S3ObjectStore;

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

    tracing::info!("Initializing image-labeler server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_histogram!(
        "labeling_job_seconds",
        "Time to process one labeling job end to end"
    );
    metrics::describe_counter!("labeling_jobs_processed", "Labeling jobs acknowledged");
    metrics::describe_counter!(
        "labeling_jobs_failed",
        "Labeling job attempts left unacknowledged for redelivery"
    );
    metrics::describe_counter!("api_requests_total", "Query API requests by action");
    metrics::describe_gauge!("labeling_queue_depth", "Jobs waiting in the work queue");
    metrics::describe_gauge!(
        "labeling_dead_letter_depth",
        "Jobs parked in the dead-letter queue"
    );

    // Initialize metadata store
    tracing::info!("Connecting to PostgreSQL metadata store");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    let metadata = Arc::new(PgMetadataStore::new(db_pool));

    // Initialize object store clients (one handle per bucket)
    tracing::info!("Initializing object store clients");
    let images = Arc::new(
        S3ObjectStore::new(
            &config.image_bucket,
            &config.s3_endpoint,
            &config.s3_access_key,
            &config.s3_secret_key,
        )
        .expect("Failed to initialize image bucket client"),
    );
    let thumbnails = Arc::new(
        S3ObjectStore::new(
            &config.thumbnail_bucket,
            &config.s3_endpoint,
            &config.s3_access_key,
            &config.s3_secret_key,
        )
        .expect("Failed to initialize thumbnail bucket client"),
    );

    // Initialize Redis work queue
    tracing::info!("Connecting to Redis work queue");
    let queue = Arc::new(RedisWorkQueue::new(&config.redis_url).expect("Failed to initialize work queue"));

    // Initialize bearer credential verifier
    let verifier = Arc::new(JwtVerifier::new(&config.jwt_secret));

    // Create shared application state
    let state = AppState::new(metadata, images, thumbnails, queue, verifier);

    // Build API routes
    let app = routes::router(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            axum::routing::get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(RequestBodyLimitLayer::new(1024 * 1024)); // 1 MB limit; bodies are notifications, not images

    tracing::info!("Starting image-labeler on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
