use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use sea_orm::error::{DbErr, RuntimeErr};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Standard error body returned to HTTP clients.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Conflict")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Additional error details (validation errors)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Unique request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// ISO 8601 timestamp when error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Batch with ID {0} not found")]
    BatchNotFound(i64),

    #[error("Reservation with ID {0} not found")]
    ReservationNotFound(i64),

    #[error("Batch {0} has been deleted")]
    BatchDeleted(i64),

    #[error("Batch {0} is already deleted")]
    AlreadyDeleted(i64),

    #[error("Batch {batch_id} expired on {expiry_date}")]
    BatchExpired {
        batch_id: i64,
        expiry_date: DateTime<Utc>,
    },

    #[error(
        "Insufficient volume in batch {batch_id}: available={available}L, requested={requested}L"
    )]
    InsufficientVolume {
        batch_id: i64,
        available: f64,
        requested: f64,
    },

    #[error("Batch code '{0}' already exists")]
    DuplicateBatchCode(String),

    #[error("Reservation {0} has already been released")]
    AlreadyReleased(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Wraps a storage error, routing transient failures (pool exhaustion,
    /// lock-wait timeouts, dropped connections) to `ServiceUnavailable` so
    /// callers can scope retry policies to them. Everything else stays a
    /// `DatabaseError`.
    pub fn db_error(error: DbErr) -> Self {
        if is_transient(&error) {
            ServiceError::ServiceUnavailable(error.to_string())
        } else {
            ServiceError::DatabaseError(error)
        }
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BatchNotFound(_) | Self::ReservationNotFound(_) => StatusCode::NOT_FOUND,
            Self::BatchDeleted(_)
            | Self::AlreadyDeleted(_)
            | Self::BatchExpired { .. }
            | Self::InsufficientVolume { .. }
            | Self::DuplicateBatchCode(_)
            | Self::AlreadyReleased(_) => StatusCode::CONFLICT,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::DatabaseError(_) | Self::EventError(_) | Self::InternalError(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::EventError(_) | Self::InternalError(_) | Self::Other(_) => {
                "Internal server error".to_string()
            }
            Self::ServiceUnavailable(_) => {
                "Service temporarily unavailable, retry later".to_string()
            }
            _ => self.to_string(),
        }
    }
}

fn is_transient(err: &DbErr) -> bool {
    match err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => true,
        DbErr::Query(RuntimeErr::SqlxError(sqlx_err))
        | DbErr::Exec(RuntimeErr::SqlxError(sqlx_err)) => {
            matches!(
                sqlx_err,
                sea_orm::sqlx::Error::PoolTimedOut | sea_orm::sqlx::Error::Io(_)
            )
        }
        _ => false,
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.response_message();

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message,
            details: None,
            request_id: current_request_id(),
            timestamp: Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}
