use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::config::RunMode;
use crate::domain::DomainError;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    developer_details: Option<String>,
}

/// JSON error response: `{"error": ...}`, plus `developer_details` outside production.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    details: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    /// Attach internal detail; dropped in production.
    pub fn with_details(mut self, details: impl Into<String>, mode: RunMode) -> Self {
        if !mode.is_production() {
            self.details = Some(details.into());
        }
        self
    }

    pub fn not_configured(mode: RunMode) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "The Gemini model is not configured on the server",
        )
        .with_details("No API key could be resolved at startup; see the server logs", mode)
    }

    pub fn from_domain(error: &DomainError, mode: RunMode) -> Self {
        match error {
            DomainError::InvalidInput(msg) => Self::new(StatusCode::BAD_REQUEST, msg.clone()),
            DomainError::PayloadTooLarge(msg) => {
                Self::new(StatusCode::PAYLOAD_TOO_LARGE, msg.clone())
            }
            DomainError::Configuration(_) => Self::not_configured(mode),
            e if e.is_provider_error() => Self::new(
                StatusCode::BAD_GATEWAY,
                "Could not start a conversation with Gemini",
            )
            .with_details(error.to_string(), mode),
            _ => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal server error occurred",
            )
            .with_details(error.to_string(), mode),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
            developer_details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}
