use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

use image_labeler::config::AppConfig;
use image_labeler::db::{self, PgMetadataStore};
use image_labeler::models::job::Delivery;
use image_labeler::services::detection::WorkersAiDetection;
use image_labeler::services::labeler::Labeler;
use image_labeler::services::queue::{RedisWorkQueue, WorkQueue};
use image_labeler::services::storage::S3ObjectStore;

const ERROR_BACKOFF: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting label worker");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");

    // Initialize metadata store
    tracing::info!("Connecting to PostgreSQL metadata store");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    let metadata = Arc::new(PgMetadataStore::new(db_pool));

    // Initialize services
    tracing::info!("Initializing services");
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

    let detector = Arc::new(WorkersAiDetection::new(
        &config.cf_account_id,
        &config.cf_api_token,
    ));

    let queue: Arc<dyn WorkQueue> =
        Arc::new(RedisWorkQueue::new(&config.redis_url).expect("Failed to initialize work queue"));

    let labeler = Labeler::new(images, thumbnails, detector, metadata);
    let operation_timeout = Duration::from_secs(config.worker_timeout_secs);

    tracing::info!(
        batch_size = config.worker_batch_size,
        timeout_secs = config.worker_timeout_secs,
        "Worker ready, starting job processing loop"
    );

    // Main processing loop. receive() long-polls, so an empty queue does not
    // spin.
    loop {
        let deliveries = match queue.receive(config.worker_batch_size).await {
            Ok(deliveries) => deliveries,
            Err(e) => {
                tracing::error!(error = %e, "Failed to receive from queue, backing off");
                sleep(ERROR_BACKOFF).await;
                continue;
            }
        };

        for delivery in deliveries {
            process_delivery(&labeler, queue.as_ref(), operation_timeout, delivery).await;
        }

        record_queue_gauges(queue.as_ref()).await;
    }
}

/// Run one delivery through the pipeline and acknowledge on success.
///
/// Any failure or timeout leaves the delivery unacknowledged; the queue
/// redelivers it after the visibility timeout, or dead-letters it once the
/// delivery budget is spent.
async fn process_delivery(
    labeler: &Labeler,
    queue: &dyn WorkQueue,
    operation_timeout: Duration,
    delivery: Delivery,
) {
    let job = &delivery.job;
    tracing::info!(
        source_key = %job.source_key,
        delivery_attempt = job.delivery_attempt,
        "Processing labeling job"
    );

    let started = Instant::now();
    match tokio::time::timeout(operation_timeout, labeler.process(job)).await {
        Ok(Ok(record)) => {
            if let Err(e) = queue.acknowledge(&delivery).await {
                // The record write already succeeded; redelivery will
                // converge on the same state.
                tracing::error!(source_key = %job.source_key, error = %e, "Failed to acknowledge job");
                return;
            }

            metrics::histogram!("labeling_job_seconds").record(started.elapsed().as_secs_f64());
            metrics::counter!("labeling_jobs_processed").increment(1);

            tracing::info!(
                source_key = %job.source_key,
                labels = record.labels.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Job completed and acknowledged"
            );
        }
        Ok(Err(e)) => {
            metrics::counter!("labeling_jobs_failed").increment(1);
            tracing::warn!(
                source_key = %job.source_key,
                delivery_attempt = job.delivery_attempt,
                error = %e,
                "Job failed, leaving unacknowledged for redelivery"
            );
        }
        Err(_) => {
            metrics::counter!("labeling_jobs_failed").increment(1);
            tracing::warn!(
                source_key = %job.source_key,
                delivery_attempt = job.delivery_attempt,
                timeout_secs = operation_timeout.as_secs(),
                "Job exceeded operation timeout, abandoning"
            );
        }
    }
}

async fn record_queue_gauges(queue: &dyn WorkQueue) {
    if let Ok(depth) = queue.depth().await {
        metrics::gauge!("labeling_queue_depth").set(depth as f64);
    }
    if let Ok(dead) = queue.dead_letters().await {
        metrics::gauge!("labeling_dead_letter_depth").set(dead.len() as f64);
    }
}
