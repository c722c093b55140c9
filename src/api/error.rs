//! JSON rendering of [`Error`] for HTTP clients.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::errors::{Error, ErrorKind};

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Canonical reason of the status code
    pub error: String,
    pub kind: String,
    pub message: String,
    pub timestamp: String,
}

impl ErrorResponse {
    fn new(status: StatusCode, kind: &str, message: String) -> Self {
        Self {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            kind: kind.to_string(),
            message,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// HTTP status for each error category.
#[must_use]
pub const fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Authorization => StatusCode::FORBIDDEN,
        ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

const fn kind_name(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Validation => "VALIDATION",
        ErrorKind::Conflict => "CONFLICT",
        ErrorKind::NotFound => "NOT_FOUND",
        ErrorKind::Authorization => "AUTHORIZATION",
        ErrorKind::Storage => "STORAGE",
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = status_for(kind);

        // Storage details stay in the log
        let message = if kind == ErrorKind::Storage {
            tracing::error!("Request failed: {}", self);
            "Internal server error".to_string()
        } else {
            tracing::warn!("Request rejected: {}", self);
            self.to_string()
        };

        (status, Json(ErrorResponse::new(status, kind_name(kind), message))).into_response()
    }
}

/// Rejection for requests without usable identity headers.
#[derive(Debug)]
pub struct Unauthorized(pub String);

impl IntoResponse for Unauthorized {
    fn into_response(self) -> Response {
        let status = StatusCode::UNAUTHORIZED;
        (
            status,
            Json(ErrorResponse::new(status, "UNAUTHENTICATED", self.0)),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_status_follows_kind() {
        let closed = Error::ShopClosed {
            date: NaiveDate::from_ymd_opt(2030, 6, 2).unwrap(),
        };
        assert_eq!(closed.into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            Error::NoOpenSession.into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::not_found("Order", 9).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::forbidden("staff only").into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            Error::Database("locked".to_string()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_storage_message_is_generic() {
        let response = Error::Database("table orders is locked".to_string()).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let parsed: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.kind, "STORAGE");
        assert_eq!(parsed.message, "Internal server error");
        assert_eq!(parsed.error, "Internal Server Error");
    }
}
