//! Centralized API error handling for Homeward
//!
//! A unified error type for API responses with HTTP status code mapping and
//! JSON error bodies. Ledger rejections keep their own error codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use homeward_ledger::{LedgerError, RegistryError, TreasuryError};
use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthError;

/// API error type with HTTP status code mapping
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Too many requests")]
    TooManyRequests,

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// JSON error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

/// Error details in the response
#[derive(Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    /// Get the error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::TooManyRequests => "TOO_MANY_REQUESTS",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
            ApiError::Ledger(err) => err.code(),
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::Ledger(err) => ledger_status(err),
        }
    }
}

fn ledger_status(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::UnauthorizedCaller { .. } => StatusCode::FORBIDDEN,
        LedgerError::AlreadyListed(_) | LedgerError::NotListed(_) => StatusCode::CONFLICT,
        LedgerError::InspectionNotPassed(_)
        | LedgerError::MissingApprovals { .. }
        | LedgerError::InsufficientEscrowBalance { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        LedgerError::InvalidEscrowAmount { .. }
        | LedgerError::InvalidAmount
        | LedgerError::InvalidBuyer(_)
        | LedgerError::EarnestBelowRequired { .. }
        | LedgerError::ArithmeticOverflow => StatusCode::BAD_REQUEST,
        LedgerError::Registry(err) => match err {
            RegistryError::TokenNotFound(_) => StatusCode::NOT_FOUND,
            RegistryError::NotOwner { .. } => StatusCode::FORBIDDEN,
            RegistryError::NotApproved { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            RegistryError::EmptyTokenUri => StatusCode::BAD_REQUEST,
        },
        LedgerError::Treasury(err) => match err {
            TreasuryError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            TreasuryError::Overflow(_) => StatusCode::BAD_REQUEST,
        },
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        // Log server errors
        if status.is_server_error() {
            tracing::error!(error = %message, code = %error_code, "Server error occurred");
        } else {
            tracing::debug!(error = %message, code = %error_code, "Client error occurred");
        }

        let details = match &self {
            ApiError::Ledger(LedgerError::MissingApprovals { missing, .. }) => Some(
                missing
                    .iter()
                    .map(|role| role.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorDetails {
                code: error_code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

// Convenience conversions from common error types

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        ApiError::Ledger(err.into())
    }
}

impl From<TreasuryError> for ApiError {
    fn from(err: TreasuryError) -> Self {
        ApiError::Ledger(err.into())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidWalletAddress(_)
            | AuthError::NonceNotFound
            | AuthError::NonceExpired => ApiError::BadRequest(err.to_string()),
            AuthError::InvalidSignature(_) | AuthError::SessionNotFound => {
                ApiError::Unauthorized(err.to_string())
            }
            AuthError::TokenError(_) => ApiError::InternalError(err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::BadRequest(format!("Invalid JSON: {}", err))
    }
}

/// Result type alias using ApiError
pub type ApiResult<T> = Result<T, ApiError>;
