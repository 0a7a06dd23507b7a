//! Microfinance Ledger Library
//!
//! Balance-mutating core of a microfinance back-office: deposits,
//! withdrawals and transfers over savings accounts, each committed as one
//! atomic unit with an immutable before/after ledger entry.
//!
//! Re-exports modules for integration testing and external use.

pub mod api;
pub mod audit;
pub mod domain;
pub mod handlers;
pub mod jobs;
pub mod ledger;
pub mod store;

pub mod config;
pub mod db;
mod error;

pub use config::Config;
pub use error::{AppError, ErrorResponse};
pub use domain::{Amount, AmountError, Balance, LedgerError, OperationContext, ValidationError};
pub use ledger::{AccountGuard, LedgerEngine};
