//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::{LedgerError, ValidationError};

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Ledger or guard failure, mapped to its natural status
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Rejection of `POST /transactions`: every business failure is a 400
    #[error(transparent)]
    TransactionRejected(LedgerError),

    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Missing required header: {0}")]
    MissingHeader(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Ledger(LedgerError::Validation(err))
    }
}

impl AppError {
    /// Wrap an engine failure raised while recording a transaction
    pub fn transaction_rejected(err: LedgerError) -> Self {
        AppError::TransactionRejected(err)
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

fn ledger_status(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::AccountNotFound { .. }
        | LedgerError::ClientNotFound(_)
        | LedgerError::TransactionNotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn ledger_details(err: &LedgerError) -> Option<String> {
    match err {
        LedgerError::Validation(v) => Some(v.field().to_string()),
        LedgerError::AccountNotFound { account_id, .. } => Some(account_id.to_string()),
        LedgerError::InsufficientFunds { required, available } => {
            Some(format!("required {}, available {}", required, available))
        }
        _ => None,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            AppError::Ledger(err) => (ledger_status(err), err.error_code(), ledger_details(err)),
            AppError::TransactionRejected(err) => {
                let status = match err {
                    LedgerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                    _ => StatusCode::BAD_REQUEST,
                };
                (status, err.error_code(), ledger_details(err))
            }

            // 400 Bad Request
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "INVALID_REQUEST", Some(msg.clone()))
            }
            AppError::InvalidHeader(header) => {
                (StatusCode::BAD_REQUEST, "INVALID_HEADER", Some(header.clone()))
            }

            // 401 Unauthorized
            AppError::MissingHeader(header) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", Some(header.clone()))
            }

            // 403 Forbidden
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", Some(msg.clone())),
        };

        // Never leak infrastructure detail to the dashboard
        let error = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            success: false,
            error,
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
