use crate::{analytics::AnalyticsError, mappings::MappingError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use utoipa::ToSchema;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Analytics cache failure: invalid subject, missing subject, or failed recompute
    #[error(transparent)]
    Analytics(#[from] AnalyticsError),

    /// Invalid request data
    #[error("{message}")]
    BadRequest { message: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },
}

/// JSON body of every error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Always false
    pub success: bool,
    /// Stable machine-readable code
    #[schema(example = "not_found")]
    pub error: String,
    pub message: String,
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Analytics(err) => match err {
                AnalyticsError::InvalidSubject { .. } => StatusCode::BAD_REQUEST,
                AnalyticsError::NotFound { .. } => StatusCode::NOT_FOUND,
                AnalyticsError::ComputeFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                AnalyticsError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable error code reported in the `error` field
    pub fn code(&self) -> &'static str {
        match self {
            Error::Analytics(err) => match err {
                AnalyticsError::InvalidSubject { .. } => "invalid_id",
                AnalyticsError::NotFound { .. } => "not_found",
                AnalyticsError::ComputeFailure { .. } => "compute_failed",
                AnalyticsError::Storage { .. } => "storage_error",
            },
            Error::BadRequest { .. } => "bad_request",
            Error::Internal { .. } => "internal_error",
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            // Analytics messages are meant for clients, including the failure text of a recompute
            Error::Analytics(err) => err.to_string(),
            Error::BadRequest { message } => message.clone(),
            Error::Internal { .. } => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Analytics(AnalyticsError::ComputeFailure { .. } | AnalyticsError::Storage { .. }) | Error::Internal { .. } => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Analytics(_) | Error::BadRequest { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let body = ErrorBody {
            success: false,
            error: self.code().to_string(),
            message: self.user_message(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

impl From<MappingError> for Error {
    fn from(err: MappingError) -> Self {
        Error::BadRequest { message: err.to_string() }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
