//! Domain module
//!
//! Core ledger types and business rules.

pub mod account;
pub mod amount;
pub mod context;
pub mod error;
pub mod transaction;

pub type AccountId = i64;
pub type ClientId = i64;
pub type TransactionId = i64;
pub type LedgerEntryId = i64;

pub use account::{Account, AccountStatus, BalanceTransition, Client, NewAccount, NewClient};
pub use amount::{Amount, AmountError, Balance};
pub use context::{Actor, OperationContext, Role};
pub use error::{LedgerError, TransferSide, ValidationError};
pub use transaction::{
    HistoryFilter, HistoryRow, LedgerEntry, LedgerLine, NewLedgerEntry, NewTransaction,
    Transaction, TransactionMeta, TransactionType,
};
