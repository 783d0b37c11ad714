use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use outlay_core::{StorageError, SummaryOverflow, ValidationError};
use serde::Serialize;
use thiserror::Error;

use crate::{password::PasswordError, token::TokenError};

/// Every failure a handler can return. The `Display` text is exactly what
/// the client sees; internal details stay in the logs.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("Invalid request body")]
    InvalidBody,
    #[error("Invalid expense ID")]
    InvalidExpenseId,
    #[error("Not authenticated")]
    Unauthenticated,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("User not found")]
    UserNotFound,
    #[error("Expense not found")]
    ExpenseNotFound,
    #[error("Account with this email already exists")]
    EmailTaken,
    #[error("Internal server error")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::InvalidBody | ApiError::InvalidExpenseId => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthenticated | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::UserNotFound | ApiError::ExpenseNotFound => StatusCode::NOT_FOUND,
            ApiError::EmailTaken => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::EmailTaken(_) => ApiError::EmailTaken,
            StorageError::UserNotFound(_) => ApiError::UserNotFound,
            StorageError::ExpenseNotFound(_) => ApiError::ExpenseNotFound,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<SummaryOverflow> for ApiError {
    fn from(e: SummaryOverflow) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<PasswordError> for ApiError {
    fn from(e: PasswordError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<TokenError> for ApiError {
    fn from(e: TokenError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            tracing::error!(error = %detail, "Request failed");
        }
        let body = ErrorBody {
            success: false,
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
