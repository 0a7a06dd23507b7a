//! Store Errors

use crate::domain::{AccountId, LedgerError};

use super::FaultPoint;

/// Errors that can occur in a ledger store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Another unit committed a change to this account first
    #[error("Concurrent modification of account {0}")]
    Conflict(AccountId),

    /// A write referenced a row that does not exist
    #[error("Row not found: {0}")]
    Missing(String),

    /// A persisted row violates a domain invariant
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Injected fault at {0:?}")]
    Injected(FaultPoint),
}

impl StoreError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict(_) | StoreError::Database(_))
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "Ledger persistence failure");
        LedgerError::Internal(err.to_string())
    }
}
