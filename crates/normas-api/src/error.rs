//! # API Error Type
//!
//! Structured error implementing `axum::response::IntoResponse`. Maps the
//! domain taxonomy to HTTP status codes and a single JSON error shape
//! `{"error": "<mensagem>"}` across every endpoint family. Store failures
//! are logged server-side and never surfaced verbatim to the caller.
//!
//! No operation retries anywhere: every store call is a single attempt, and
//! a failed reconciliation run is retried whole by the caller, never resumed.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use normas_core::ValidationError;

/// JSON error response body, identical for every endpoint family.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
}

/// Application-level error mapped to HTTP at the request boundary.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or invalid input (400).
    #[error("{0}")]
    Validation(String),

    /// Missing id (404).
    #[error("{0}")]
    NotFound(String),

    /// Missing, expired, or invalid credential, or inactive user (401).
    #[error("{0}")]
    Unauthorized(String),

    /// Insufficient role or self-delete attempt (403).
    #[error("{0}")]
    Forbidden(String),

    /// Underlying store failure (500). Logged, not surfaced.
    #[error("erro de banco de dados: {0}")]
    Store(#[from] sqlx::Error),

    /// Any other internal failure (500). Logged, not surfaced.
    #[error("erro interno: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Shorthand for the ubiquitous missing-norma case.
    pub fn norma_not_found() -> Self {
        Self::NotFound("Norma não encontrada".to_string())
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Store and internal failures are logged with full detail but the
        // client only sees a generic message.
        let message = match &self {
            Self::Store(e) => {
                tracing::error!(error = %e, "store failure");
                "Erro interno do servidor".to_string()
            }
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                "Erro interno do servidor".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
