//! Error types for sims-import
//!
//! Guard failures stop a request before any row is touched and map to a
//! distinct HTTP status. Failures inside the row loop never become an
//! `ApiError`; they are recorded in the per-row results instead.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing, invalid or expired token (401)
    #[error("{0}")]
    Unauthenticated(String),

    /// Caller is not an admin (403)
    #[error("{0}")]
    Forbidden(String),

    /// Empty or oversized batch, bad query parameter (400)
    #[error("{0}")]
    InvalidArgument(String),

    /// Anything outside the row loop that was not anticipated (500)
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorResponse {
            error: self.to_string(),
        });

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Failure reported by the identity provider or relational store
///
/// `Display` is the bare upstream message; it is embedded verbatim in
/// per-row error strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("{0}")]
    Network(String),

    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("{0}")]
    Parse(String),

    #[error("{0}")]
    Database(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            UpstreamError::Parse(err.to_string())
        } else {
            UpstreamError::Network(err.to_string())
        }
    }
}

impl From<sqlx::Error> for UpstreamError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => UpstreamError::Database(db.message().to_string()),
            other => UpstreamError::Database(other.to_string()),
        }
    }
}
