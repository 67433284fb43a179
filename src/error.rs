use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Message returned to callers for errors whose detail stays in the logs
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Client input is malformed
    #[error("{0}")]
    Validation(String),

    /// Unique key already taken (email, username)
    #[error("{0}")]
    Duplicate(String),

    /// Bad credentials, missing or invalid bearer token
    #[error("{0}")]
    Authentication(String),

    /// Request exceeded the server timeout
    #[error("Request timed out")]
    Timeout,

    /// No scorer has been loaded
    #[error("Prediction model not available")]
    ModelUnavailable,

    /// Webhook dispatch exhausted every attempt
    #[error("Notification failed after {attempts} attempts: {message}")]
    NotificationFailed { attempts: u32, message: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Storage errors
    #[error("Database error: {0}")]
    Database(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Duplicate(_) => StatusCode::BAD_REQUEST,
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Timeout => StatusCode::REQUEST_TIMEOUT,
            AppError::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::NotificationFailed { .. } => StatusCode::BAD_GATEWAY,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Duplicate(_) => "DUPLICATE",
            AppError::Authentication(_) => "AUTHENTICATION_ERROR",
            AppError::Timeout => "REQUEST_TIMEOUT",
            AppError::ModelUnavailable => "MODEL_UNAVAILABLE",
            AppError::NotificationFailed { .. } => "NOTIFICATION_FAILED",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to hand back to the caller
    pub fn public_message(&self) -> String {
        if self.status_code().is_server_error() && !self.is_expected_outage() {
            GENERIC_ERROR_MESSAGE.to_string()
        } else {
            self.to_string()
        }
    }

    fn is_expected_outage(&self) -> bool {
        matches!(
            self,
            AppError::ModelUnavailable | AppError::NotificationFailed { .. }
        )
    }
}

/// Convert AppError to HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let detail = self.to_string();

        if status.is_server_error() {
            tracing::error!(
                error_code = error_code,
                status_code = status.as_u16(),
                message = %detail,
                "Request error"
            );
        } else {
            tracing::warn!(
                error_code = error_code,
                status_code = status.as_u16(),
                message = %detail,
                "Request rejected"
            );
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": self.public_message(),
                "status": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for AppError {
    fn from(err: bincode::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<sled::Error> for AppError {
    fn from(err: sled::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(err: bcrypt::BcryptError) -> Self {
        AppError::Internal(format!("Password hashing failed: {}", err))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("Background task failed: {}", err))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
