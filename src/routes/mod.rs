use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;

use crate::app_state::AppState;

pub mod events;
pub mod health;
pub mod images;
pub mod metrics;

/// API routes over the shared state.
///
/// The permissive CORS layer is attached here so that every response,
/// including auth failures and extractor rejections, carries cross-origin
/// headers for browser clients.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route(
            "/images",
            get(images::query_images).delete(images::delete_image),
        )
        .route("/events", post(events::object_created))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Error surface of the API.
///
/// Validation and authorization failures carry their own message; anything
/// internal is collapsed to a generic 500 so no backend detail leaks.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Missing or invalid credential")]
    Unauthorized,

    #[error("Key is outside the caller's private prefix")]
    Forbidden,

    #[error("No record found for key")]
    NotFound,

    #[error("Internal error")]
    Internal,
}

impl ApiError {
    /// Log an internal failure and hide it behind the generic 500.
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        tracing::error!(error = %err, "Request failed internally");
        ApiError::Internal
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}
