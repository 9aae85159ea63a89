//! Error handling

use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
    Json,
};
use serde_json::json;

use crate::classifier::ClassifyError;
use crate::safe_browsing::LookupError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    // Request errors
    ValidationError(String),

    // Lookup not usable (missing API key)
    ConfigurationError(String),

    // External service errors
    ExternalServiceError(String),
    UpstreamTimeout(String),
    InvalidUpstreamResponse(String),

    // Generic errors
    InternalError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            AppError::ConfigurationError(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "Threat lookup is not configured")
            }
            AppError::ExternalServiceError(msg) => {
                tracing::error!("External service error: {}", msg);
                (StatusCode::BAD_GATEWAY, "Threat lookup service error")
            }
            AppError::UpstreamTimeout(msg) => {
                tracing::error!("Upstream timeout: {}", msg);
                (StatusCode::GATEWAY_TIMEOUT, "Threat lookup timed out")
            }
            AppError::InvalidUpstreamResponse(msg) => {
                tracing::error!("Invalid upstream response: {}", msg);
                (StatusCode::BAD_GATEWAY, "Threat lookup returned an invalid response")
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = Json(json!({
            "matches": [],
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<ClassifyError> for AppError {
    fn from(err: ClassifyError) -> Self {
        match err {
            ClassifyError::Configuration | ClassifyError::Lookup(LookupError::MissingApiKey) => {
                AppError::ConfigurationError(err.to_string())
            }
            ClassifyError::Lookup(e) if e.is_timeout() => AppError::UpstreamTimeout(e.to_string()),
            ClassifyError::Lookup(e @ LookupError::ResponseParse(_)) => {
                AppError::InvalidUpstreamResponse(e.to_string())
            }
            ClassifyError::Lookup(e) => AppError::ExternalServiceError(e.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}
