//! Parley server error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use parley_core::error::ParleyError;
use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;

/// Startup and runtime errors for the server binary.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded or applied.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The scene services could not be started.
    #[error("scene error: {0}")]
    Scene(#[from] ParleyError),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

/// HTTP-layer wrapper around `ParleyError` that implements `IntoResponse`.
#[derive(Debug)]
pub struct ApiError(pub ParleyError);

impl From<ParleyError> for ApiError {
    fn from(err: ParleyError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self.0 {
            ParleyError::RpcTimeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "rpc_timeout"),
            ParleyError::UnexpectedResponse { .. } => {
                (StatusCode::BAD_GATEWAY, "unexpected_response")
            }
            ParleyError::SceneAlreadyLocked { .. } => (StatusCode::CONFLICT, "scene_locked"),
            ParleyError::HolderBeforeLock { .. } => (StatusCode::CONFLICT, "scene_not_locked"),
            ParleyError::Collaborator(_) => (StatusCode::BAD_GATEWAY, "collaborator_error"),
            ParleyError::Handler(_) => (StatusCode::INTERNAL_SERVER_ERROR, "handler_error"),
            ParleyError::Transport(_) => (StatusCode::SERVICE_UNAVAILABLE, "transport_error"),
        };

        let body = ErrorBody {
            error: error_code,
            message: self.0.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
