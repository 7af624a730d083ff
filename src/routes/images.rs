use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::Json;
use garde::Validate;
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::app_state::AppState;
use crate::db::MetadataStore as _;
use crate::routes::ApiError;
use crate::services::auth::{self, IdentityVerifier as _};
use crate::services::storage::ObjectStoreWrite as _;

/// The closed set of supported actions. Anything else fails query
/// deserialization and surfaces as a 400.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Action {
    List,
    Get,
    Delete,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ImageQuery {
    #[garde(skip)]
    pub action: Action,

    /// Target image key. Required for `get` and `delete`; `list` is scoped
    /// to the caller's prefix whether or not a key is sent.
    #[garde(inner(length(min = 1, max = 1024)))]
    pub key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: String,
}

/// GET /images?action=list|get&key=...
pub async fn query_images(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ImageQuery>,
) -> Result<Response, ApiError> {
    params
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let subject = authorize(&state, &headers).await?;
    metrics::counter!("api_requests_total", "action" => params.action.to_string()).increment(1);

    match params.action {
        Action::List => {
            // A key sent with list must still be in scope; the listing
            // itself is always bounded by the caller's prefix.
            if let Some(key) = &params.key {
                ensure_in_scope(&subject, key)?;
            }

            let prefix = auth::private_prefix(&subject);
            let records = state
                .metadata
                .list_prefix(&prefix)
                .await
                .map_err(ApiError::internal)?;

            tracing::debug!(subject = %subject, count = records.len(), "Listed image records");
            Ok(Json(records).into_response())
        }
        Action::Get => {
            let key = require_key(&params)?;
            ensure_in_scope(&subject, key)?;

            let record = state
                .metadata
                .get(key)
                .await
                .map_err(ApiError::internal)?
                .ok_or(ApiError::NotFound)?;

            Ok(Json(record).into_response())
        }
        Action::Delete => Err(ApiError::BadRequest(
            "action 'delete' requires the DELETE method".to_string(),
        )),
    }
}

/// DELETE /images?action=delete&key=...
///
/// Removes the record, the original object, and the thumbnail. Idempotent:
/// sub-resources that are already absent do not fail the request.
pub async fn delete_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ImageQuery>,
) -> Result<Response, ApiError> {
    params
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    if params.action != Action::Delete {
        return Err(ApiError::BadRequest(format!(
            "action '{}' requires the GET method",
            params.action
        )));
    }

    let subject = authorize(&state, &headers).await?;
    metrics::counter!("api_requests_total", "action" => "delete").increment(1);

    let key = require_key(&params)?;
    ensure_in_scope(&subject, key)?;

    state
        .metadata
        .delete(key)
        .await
        .map_err(ApiError::internal)?;
    state.images.delete(key).await.map_err(ApiError::internal)?;
    state
        .thumbnails
        .delete(key)
        .await
        .map_err(ApiError::internal)?;

    tracing::info!(subject = %subject, key = %key, "Deleted image");
    Ok(Json(DeleteResponse {
        deleted: key.clone(),
    })
    .into_response())
}

/// Resolve the caller's subject from the bearer credential.
async fn authorize(state: &AppState, headers: &HeaderMap) -> Result<String, ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    state.verifier.verify(token).await.map_err(|err| {
        tracing::debug!(error = %err, "Credential verification failed");
        ApiError::Unauthorized
    })
}

/// Prefix double-check: enforced here regardless of storage-layer policy.
fn ensure_in_scope(subject: &str, key: &str) -> Result<(), ApiError> {
    if auth::key_in_scope(subject, key) {
        Ok(())
    } else {
        tracing::warn!(subject = %subject, key = %key, "Key outside caller's prefix");
        Err(ApiError::Forbidden)
    }
}

fn require_key(params: &ImageQuery) -> Result<&String, ApiError> {
    params.key.as_ref().ok_or_else(|| {
        ApiError::BadRequest(format!("action '{}' requires a key", params.action))
    })
}
