//! Domain Error Types
//!
//! Pure ledger errors that don't depend on infrastructure.

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use super::{AccountId, ClientId, TransactionId};

/// Which end of a transfer an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferSide {
    Source,
    Destination,
}

impl TransferSide {
    fn describe(side: &Option<TransferSide>) -> &'static str {
        match side {
            None => "Account",
            Some(TransferSide::Source) => "Source account",
            Some(TransferSide::Destination) => "Destination account",
        }
    }
}

/// Field-level failure produced by the request validators.
///
/// Each variant carries the wire name of the offending field. Validators
/// stop at the first failure, so a request yields at most one of these.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("The {0} field is required.")]
    Required(&'static str),

    #[error("The {0} field must be a string.")]
    NotAString(&'static str),

    #[error("The {0} field is not a valid date.")]
    InvalidDate(&'static str),

    #[error("The selected {0} is invalid.")]
    InvalidChoice(&'static str),

    #[error("The {0} field must be a number.")]
    NotNumeric(&'static str),

    #[error("The {0} field must be a positive integer identifier.")]
    NotAnId(&'static str),

    #[error("The {0} field must be at least 0.")]
    Negative(&'static str),

    #[error("The {0} field must not have more than 2 decimal places.")]
    TooPrecise(&'static str),

    #[error("The {0} field exceeds the maximum amount.")]
    TooLarge(&'static str),
}

impl ValidationError {
    /// Name of the field that failed
    pub fn field(&self) -> &'static str {
        match self {
            Self::Required(f)
            | Self::NotAString(f)
            | Self::InvalidDate(f)
            | Self::InvalidChoice(f)
            | Self::NotNumeric(f)
            | Self::NotAnId(f)
            | Self::Negative(f)
            | Self::TooPrecise(f)
            | Self::TooLarge(f) => f,
        }
    }
}

/// Errors reported by the ledger engine and account guard.
///
/// Every variant except `Internal` is a terminal business outcome: the
/// operation performed no writes and retrying it unchanged gives the same
/// answer. `Internal` also guarantees no partial state, so it may be retried.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    /// Malformed or missing request fields
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Account absent, soft-deleted, or owned by a soft-deleted client
    #[error("{} not found: {account_id}", TransferSide::describe(.side))]
    AccountNotFound {
        account_id: AccountId,
        side: Option<TransferSide>,
    },

    #[error("Account {0} is not active")]
    AccountNotActive(AccountId),

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Decimal, available: Decimal },

    #[error("Account {0} is already active")]
    AlreadyActive(AccountId),

    #[error("Unknown transaction type: {0}")]
    UnknownTransactionType(String),

    #[error("Cannot transfer to the same account")]
    SameAccountTransfer,

    /// Credit would push the balance past the storable maximum
    #[error("Balance limit exceeded for account {0}")]
    BalanceOverflow(AccountId),

    #[error("Client not found: {0}")]
    ClientNotFound(ClientId),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// Persistence or infrastructure failure. The atomic unit was rolled back.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    pub fn account_not_found(account_id: AccountId) -> Self {
        Self::AccountNotFound {
            account_id,
            side: None,
        }
    }

    pub fn insufficient_funds(required: Decimal, available: Decimal) -> Self {
        Self::InsufficientFunds {
            required,
            available,
        }
    }

    /// Tag an `AccountNotFound` with the transfer side it came from.
    pub fn on_side(self, side: TransferSide) -> Self {
        match self {
            Self::AccountNotFound { account_id, .. } => Self::AccountNotFound {
                account_id,
                side: Some(side),
            },
            other => other,
        }
    }

    /// Check if this is a client error (caller's fault or business rule)
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Internal(_))
    }

    /// Only infrastructure failures are worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Internal(_))
    }

    /// Stable machine-readable code surfaced to the dashboard
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::AccountNotFound {
                side: Some(TransferSide::Destination),
                ..
            } => "COMPTE_DESTINATAIRE_NOT_FOUND",
            Self::AccountNotFound { .. } => "COMPTE_NOT_FOUND",
            Self::AccountNotActive(_) => "COMPTE_NOT_YET_ACTIVE",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::AlreadyActive(_) => "COMPTE_ALREADY_ACTIVE",
            Self::UnknownTransactionType(_) => "NO_TRANSACTION_TYPE_SELECTED",
            Self::SameAccountTransfer => "SAME_ACCOUNT_TRANSFER",
            Self::BalanceOverflow(_) => "BALANCE_LIMIT_EXCEEDED",
            Self::ClientNotFound(_) => "CLIENT_NOT_FOUND",
            Self::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_insufficient_funds_error() {
        let err = LedgerError::insufficient_funds(dec!(2000.00), dec!(1500.00));

        assert!(err.is_client_error());
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("2000.00"));
        assert!(err.to_string().contains("1500.00"));
        assert_eq!(err.error_code(), "INSUFFICIENT_FUNDS");
    }

    #[test]
    fn test_account_not_found_reports_side() {
        let err = LedgerError::account_not_found(7);
        assert_eq!(err.to_string(), "Account not found: 7");

        let err = err.on_side(TransferSide::Destination);
        assert_eq!(err.to_string(), "Destination account not found: 7");
        assert_eq!(err.error_code(), "COMPTE_DESTINATAIRE_NOT_FOUND");

        let err = LedgerError::account_not_found(3).on_side(TransferSide::Source);
        assert_eq!(err.to_string(), "Source account not found: 3");
        assert_eq!(err.error_code(), "COMPTE_NOT_FOUND");
    }

    #[test]
    fn test_on_side_leaves_other_errors_alone() {
        let err = LedgerError::AccountNotActive(1).on_side(TransferSide::Source);
        assert_eq!(err, LedgerError::AccountNotActive(1));
    }

    #[test]
    fn test_internal_error_is_retryable() {
        let err = LedgerError::Internal("connection reset".into());

        assert!(!err.is_client_error());
        assert!(err.is_retryable());
    }

    #[test]
    fn test_validation_error_field() {
        let err = ValidationError::Required("montant_transaction");
        assert_eq!(err.field(), "montant_transaction");
        assert_eq!(err.to_string(), "The montant_transaction field is required.");

        let err: LedgerError = err.into();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }
}
