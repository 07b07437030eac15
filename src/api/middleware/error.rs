//! Unified API error handling.
//!
//! Handlers report expected failures by returning [`ApiError`]. The response
//! carries a [`HandlerError`] extension so the request logger can list the
//! failure in the access entry's `errors` field.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use crate::api::models::ErrorResponse;

/// Private error attached to a response for the request logger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError(pub String);

/// API-specific error type.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Internal server error.
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message, detail) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), msg),
            Self::InternalError(msg) => {
                error!(error = %msg, "Internal error in API handler");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                    msg,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        let mut response = (status, body).into_response();
        response
            .extensions_mut()
            .insert(HandlerError(format!("{error_type}: {detail}")));
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_response() {
        let response = ApiError::NotFound("no route for /missing".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.extensions().get::<HandlerError>(),
            Some(&HandlerError("not_found: no route for /missing".to_string()))
        );
    }

    #[test]
    fn test_internal_error_hides_detail() {
        let response = ApiError::InternalError("pool exhausted".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.extensions().get::<HandlerError>(),
            Some(&HandlerError("internal_error: pool exhausted".to_string()))
        );
    }
}
