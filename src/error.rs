//! Error types for Librams server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Stable numeric error codes returned to API clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    DbFailure = 3,
    NoSuchData = 5,
    BadValue = 18,
    Duplicate = 8,
    BorrowerNotFound = 30,
    DuplicateActiveLoan = 31,
    NoCopiesAvailable = 32,
    InvalidDueDate = 33,
    LoanNotActiveOrMissing = 34,
    LoanNotActive = 35,
    Unavailable = 36,
    InventoryInconsistent = 37,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Borrower not found: {0}")]
    BorrowerNotFound(String),

    #[error("Borrower already has an active issue for this book")]
    DuplicateActiveLoan,

    #[error("No copies available")]
    NoCopiesAvailable,

    #[error("Invalid due date: {0}")]
    InvalidDueDate(String),

    #[error("Issue not found or already returned")]
    LoanNotActiveOrMissing,

    #[error("Active issue not found")]
    LoanNotActive,

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Inventory consistency fault: {0}")]
    Consistency(String),
}

impl AppError {
    /// Whether the failed transaction may succeed if run again from scratch.
    ///
    /// Only infrastructure failures qualify: serialization failures and
    /// deadlocks reported by PostgreSQL, pool exhaustion and broken connections.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Database(err) => match err {
                sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => true,
                sqlx::Error::Database(db) => {
                    matches!(db.code().as_deref(), Some("40001") | Some("40P01"))
                }
                _ => false,
            },
            _ => false,
        }
    }

    fn code(&self) -> ErrorCode {
        match self {
            AppError::NotFound(_) => ErrorCode::NoSuchData,
            AppError::Validation(_) => ErrorCode::BadValue,
            AppError::Database(_) => ErrorCode::DbFailure,
            AppError::Conflict(_) => ErrorCode::Duplicate,
            AppError::BorrowerNotFound(_) => ErrorCode::BorrowerNotFound,
            AppError::DuplicateActiveLoan => ErrorCode::DuplicateActiveLoan,
            AppError::NoCopiesAvailable => ErrorCode::NoCopiesAvailable,
            AppError::InvalidDueDate(_) => ErrorCode::InvalidDueDate,
            AppError::LoanNotActiveOrMissing => ErrorCode::LoanNotActiveOrMissing,
            AppError::LoanNotActive => ErrorCode::LoanNotActive,
            AppError::Unavailable(_) => ErrorCode::Unavailable,
            AppError::Consistency(_) => ErrorCode::InventoryInconsistent,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, message) = match &self {
            AppError::NotFound(_) | AppError::BorrowerNotFound(_) => {
                (StatusCode::NOT_FOUND, self.to_string())
            }
            AppError::Validation(_) | AppError::InvalidDueDate(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            AppError::Conflict(_)
            | AppError::DuplicateActiveLoan
            | AppError::NoCopiesAvailable
            | AppError::LoanNotActiveOrMissing
            | AppError::LoanNotActive => (StatusCode::CONFLICT, self.to_string()),
            AppError::Unavailable(msg) => {
                tracing::warn!("Request gave up on the store: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service temporarily unavailable, try again".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            AppError::Consistency(msg) => {
                tracing::error!("Inventory consistency fault: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
