use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Optional for worker processes.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string for the work queue
    pub redis_url: String,

    /// Bucket holding original uploads
    pub image_bucket: String,

    /// Bucket holding generated thumbnails
    pub thumbnail_bucket: String,

    /// S3-compatible endpoint URL
    pub s3_endpoint: String,

    /// S3 access key ID
    pub s3_access_key: String,

    /// S3 secret access key
    pub s3_secret_key: String,

    /// Cloudflare account ID for the detection model
    pub cf_account_id: String,

    /// Cloudflare Workers AI API token
    pub cf_api_token: String,

    /// HS256 secret for verifying bearer tokens
    pub jwt_secret: String,

    /// Max deliveries pulled per receive call in the worker
    #[serde(default = "default_worker_batch_size")]
    pub worker_batch_size: usize,

    /// Overall per-job processing timeout in seconds; jobs over it are
    /// abandoned un-acknowledged and redelivered by the queue
    #[serde(default = "default_worker_timeout_secs")]
    pub worker_timeout_secs: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_worker_batch_size() -> usize {
    10
}

fn default_worker_timeout_secs() -> u64 {
    30
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}
