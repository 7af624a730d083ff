use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;
use crate::models::event::ObjectCreatedNotification;
use crate::models::job::Job;
use crate::routes::ApiError;
use crate::services::auth::PRIVATE_ROOT;
use crate::services::queue::WorkQueue as _;

#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    pub enqueued: usize,
}

/// POST /events — object-created notifications from the image bucket.
///
/// Keys under the private upload prefix are forwarded verbatim into the work
/// queue; anything else is skipped. Duplicate notifications for one key are
/// fine since downstream processing is idempotent.
pub async fn object_created(
    State(state): State<AppState>,
    Json(event): Json<ObjectCreatedNotification>,
) -> Result<Json<EnqueueResponse>, ApiError> {
    let mut enqueued = 0;

    for record in &event.records {
        let key = &record.s3.object.key;

        if !key.starts_with(PRIVATE_ROOT) {
            tracing::debug!(
                bucket = %record.s3.bucket.name,
                key = %key,
                "Skipping object outside the private prefix"
            );
            continue;
        }

        state
            .queue
            .enqueue(Job::new(key.clone()))
            .await
            .map_err(ApiError::internal)?;

        tracing::info!(bucket = %record.s3.bucket.name, key = %key, "Enqueued labeling job");
        enqueued += 1;
    }

    Ok(Json(EnqueueResponse { enqueued }))
}
