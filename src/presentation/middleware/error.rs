use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use crate::infrastructure::auth::AuthError;
use crate::infrastructure::backend::BackendError;

/// Application error types that can be converted to HTTP responses
///
/// The pipeline's policy is that an internal failure never aborts the HTTP
/// response: auth refresh failures are recovered locally (cookies cleared,
/// request continues unauthenticated), rate limiting is recovered through
/// the guard's cooldown and fallback values, and missing configuration
/// degrades to a warned no-op.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    #[error("Session refresh failed: {message}")]
    AuthRefreshFailed { message: String },

    #[error("Rate limit exceeded: {message}")]
    RateLimited { message: String },

    #[error("Service misconfigured: {message}")]
    Configuration { message: String },

    #[error("Invalid request: {message}")]
    BadRequest { message: String },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("External service error: {service}: {message}")]
    ExternalService { service: String, message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Authentication { .. } | AppError::AuthRefreshFailed { .. } => {
                StatusCode::UNAUTHORIZED
            }
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::ExternalService { .. } => StatusCode::BAD_GATEWAY,
            AppError::Configuration { .. } | AppError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get the error type for logging
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::Authentication { .. } => "authentication",
            AppError::AuthRefreshFailed { .. } => "auth_refresh",
            AppError::RateLimited { .. } => "rate_limit",
            AppError::Configuration { .. } => "configuration",
            AppError::BadRequest { .. } => "bad_request",
            AppError::NotFound { .. } => "not_found",
            AppError::ExternalService { .. } => "external_service",
            AppError::Internal { .. } => "internal",
        }
    }

    /// Check if this error should be logged as an error (vs warning)
    pub fn should_log_as_error(&self) -> bool {
        matches!(
            self,
            AppError::ExternalService { .. }
                | AppError::Internal { .. }
                | AppError::Configuration { .. }
        )
    }

    /// Create error response with proper structure
    pub fn to_error_response(&self, request_id: Option<&str>) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetail {
                id: Uuid::new_v4().to_string(),
                error_type: self.error_type().to_string(),
                message: self.to_string(),
                request_id: request_id.map(String::from),
                timestamp: chrono::Utc::now().to_rfc3339(),
            },
        }
    }
}

/// Structured error response
#[derive(serde::Serialize, Debug)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(serde::Serialize, Debug)]
pub struct ErrorDetail {
    pub id: String,
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = self.to_error_response(None);

        if self.should_log_as_error() {
            error!(
                error_type = self.error_type(),
                error_id = error_response.error.id,
                "Application error: {}",
                self
            );
        } else {
            warn!(
                error_type = self.error_type(),
                error_id = error_response.error.id,
                "Application warning: {}",
                self
            );
        }

        (status, Json(error_response)).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        if err.is_invalid_refresh() {
            return AppError::AuthRefreshFailed { message: err.to_string() };
        }
        AppError::ExternalService { service: "auth".to_string(), message: err.to_string() }
    }
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        // Keep the backend's message intact so rate-limit signatures stay
        // classifiable after the conversion
        AppError::ExternalService { service: "backend".to_string(), message: err.to_string() }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest { message: format!("Invalid JSON: {err}") }
    }
}
