//! Error types for the application

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::models::RfcStatus;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Department step already decided: {0}")]
    StepAlreadyDecided(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// A transition outside the state-machine table
    pub fn transition(from: RfcStatus, to: RfcStatus) -> Self {
        AppError::InvalidTransition(format!(
            "cannot move from '{}' to '{}'",
            from.as_str(),
            to.as_str()
        ))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            AppError::NotFound(e) => (StatusCode::NOT_FOUND, e.clone()),
            AppError::PermissionDenied(e) => (StatusCode::FORBIDDEN, e.clone()),
            AppError::InvalidTransition(e) => {
                (StatusCode::CONFLICT, format!("Invalid transition: {}", e))
            }
            AppError::StepAlreadyDecided(e) => (
                StatusCode::CONFLICT,
                format!("Department step already decided: {}", e),
            ),
            AppError::Validation(e) => (StatusCode::BAD_REQUEST, e.clone()),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.clone())
            }
        };

        (status, message).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
