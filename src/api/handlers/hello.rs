//! Greeting and fallback endpoints.

use axum::http::Uri;

use crate::api::middleware::error::ApiError;

/// Plain-text greeting.
pub async fn hello() -> &'static str {
    "hello!"
}

/// JSON 404 for unmatched routes.
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("no route for {}", uri.path()))
}
