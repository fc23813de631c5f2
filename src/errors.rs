// src/errors.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failure taxonomy for outbound gateway calls. One variant per way a call
/// can go wrong, so callers can tell "could not authenticate" apart from
/// "authenticated but the operation failed". The original error text is
/// always carried along, never swallowed.
#[derive(Debug, Error)]
pub enum DarajaError {
    #[error("could not authenticate with the gateway: {0}")]
    Auth(#[source] Box<DarajaError>),

    #[error("{operation}: request to the gateway failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation}: could not decode the gateway response: {source} (body: {body})")]
    Decode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
        body: String,
    },

    #[error("{operation}: gateway rejected the request: {code} - {description}")]
    Upstream {
        operation: &'static str,
        code: String,
        description: String,
    },

    #[error("could not encrypt the initiator credential: {0}")]
    Credential(#[from] openssl::error::ErrorStack),
}

impl DarajaError {
    pub fn transport(operation: &'static str, source: reqwest::Error) -> Self {
        DarajaError::Transport { operation, source }
    }

    pub fn decode(operation: &'static str, source: serde_json::Error, body: String) -> Self {
        DarajaError::Decode {
            operation,
            source,
            body,
        }
    }

    pub fn upstream(
        operation: &'static str,
        code: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        DarajaError::Upstream {
            operation,
            code: code.into(),
            description: description.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("M-Pesa gateway error: {0}")]
    Daraja(#[from] DarajaError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::Daraja(DarajaError::Credential(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Credential encryption failed".to_string(),
            ),
            AppError::Daraja(_) => (StatusCode::BAD_GATEWAY, "M-Pesa gateway error".to_string()),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "Validation failed".to_string()),
            AppError::Configuration(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Configuration error".to_string(),
            ),
            AppError::ServiceUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service unavailable".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message,
            "message": self.to_string(),
            "success": false,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

// Manual From implementations
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

// Helper conversion functions
impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        AppError::Configuration(msg.into())
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        AppError::ServiceUnavailable(msg.into())
    }
}
