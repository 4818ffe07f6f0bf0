//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use study_path_core::{PipelineError, PortError, ProfileError};
use tracing::error;

use crate::config::ConfigError;
use crate::web::protocol::{ErrorBody, ENTRY_POINT};

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// A pipeline stage could not produce its result.
    #[error("Pipeline Error: {0}")]
    Pipeline(#[from] PipelineError),

    /// The submitted profile is incomplete.
    #[error("Invalid profile: {0}")]
    Profile(#[from] ProfileError),

    /// The request itself could not be understood (e.g. a broken multipart body).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl ApiError {
    fn status_and_redirect(&self) -> (StatusCode, bool) {
        match self {
            ApiError::Pipeline(e) if e.requires_restart() => (StatusCode::UNPROCESSABLE_ENTITY, true),
            ApiError::Pipeline(PipelineError::GenerationTimedOut { .. }) => {
                (StatusCode::GATEWAY_TIMEOUT, false)
            }
            ApiError::Pipeline(_) => (StatusCode::BAD_GATEWAY, false),
            ApiError::Port(PortError::NotFound(_)) => (StatusCode::NOT_FOUND, true),
            ApiError::Profile(_) | ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, false),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, false),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, redirect) = self.status_and_redirect();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        let body = ErrorBody {
            error: self.to_string(),
            redirect: redirect.then(|| ENTRY_POINT.to_string()),
        };
        (status, Json(body)).into_response()
    }
}
