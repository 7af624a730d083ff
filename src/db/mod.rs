use std::time::Duration;

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::models::record::ImageRecord;

pub mod queries;

/// Key-value store of image records, partitioned by image key.
///
/// `upsert` is last-writer-wins with no versioning; `delete` is idempotent.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn upsert(&self, record: &ImageRecord) -> Result<(), MetadataError>;
    async fn get(&self, image_key: &str) -> Result<Option<ImageRecord>, MetadataError>;
    async fn list_prefix(&self, prefix: &str) -> Result<Vec<ImageRecord>, MetadataError>;
    async fn delete(&self, image_key: &str) -> Result<(), MetadataError>;

    /// Connectivity check for health reporting.
    async fn ping(&self) -> Result<(), MetadataError>;
}

/// Initialize PostgreSQL connection pool
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .min_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))
}

/// PostgreSQL-backed [`MetadataStore`].
pub struct PgMetadataStore {
    pool: PgPool,
}

impl PgMetadataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    async fn upsert(&self, record: &ImageRecord) -> Result<(), MetadataError> {
        queries::upsert_record(&self.pool, record).await?;
        Ok(())
    }

    async fn get(&self, image_key: &str) -> Result<Option<ImageRecord>, MetadataError> {
        Ok(queries::get_record(&self.pool, image_key).await?)
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<ImageRecord>, MetadataError> {
        Ok(queries::list_records_with_prefix(&self.pool, prefix).await?)
    }

    async fn delete(&self, image_key: &str) -> Result<(), MetadataError> {
        queries::delete_record(&self.pool, image_key).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), MetadataError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Record encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Metadata store unavailable: {0}")]
    Unavailable(String),
}
