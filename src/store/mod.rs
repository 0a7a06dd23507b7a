//! Ledger storage
//!
//! Persistence seam for the ledger. Reads go straight to the store; every
//! write happens inside an [`AtomicUnit`] obtained from [`LedgerStore::begin`].
//! A unit either commits all of its writes or none of them: dropping it
//! without calling [`AtomicUnit::commit`] rolls everything back.

mod error;
pub mod memory;
pub mod postgres;

use std::future::Future;

use crate::domain::{
    Account, AccountId, AccountStatus, Balance, Client, ClientId, HistoryFilter, HistoryRow,
    LedgerEntry, LedgerLine, NewAccount, NewLedgerEntry, NewTransaction, Transaction,
    TransactionId,
};

pub use error::StoreError;
pub use memory::{FaultPoint, MemoryStore};
pub use postgres::PgStore;

/// Read side of the ledger plus the entry point for atomic writes.
pub trait LedgerStore: Send + Sync + 'static {
    type Unit: AtomicUnit;

    /// Open a new atomic unit.
    fn begin(&self) -> impl Future<Output = Result<Self::Unit, StoreError>> + Send;

    /// Find an account by id, including soft-deleted ones.
    fn find_account(
        &self,
        id: AccountId,
    ) -> impl Future<Output = Result<Option<Account>, StoreError>> + Send;

    fn find_client(
        &self,
        id: ClientId,
    ) -> impl Future<Output = Result<Option<Client>, StoreError>> + Send;

    /// Ids of every account, ascending.
    fn account_ids(&self) -> impl Future<Output = Result<Vec<AccountId>, StoreError>> + Send;

    /// Ledger entries of one account joined with their transaction, in
    /// creation order.
    fn account_ledger(
        &self,
        account_id: AccountId,
    ) -> impl Future<Output = Result<Vec<LedgerLine>, StoreError>> + Send;

    /// Joined history rows, ordered by transaction id.
    fn history(
        &self,
        filter: &HistoryFilter,
    ) -> impl Future<Output = Result<Vec<HistoryRow>, StoreError>> + Send;
}

/// One all-or-nothing group of writes.
///
/// Only the ledger engine writes balances; the account guard uses the
/// status and soft-delete writes.
pub trait AtomicUnit: Send {
    /// Read an account and hold it exclusively until the unit ends.
    /// Lock several accounts in ascending id order.
    fn lock_account(
        &mut self,
        id: AccountId,
    ) -> impl Future<Output = Result<Option<Account>, StoreError>> + Send;

    /// Insert a new account. Accounts always start Inactive.
    fn insert_account(
        &mut self,
        account: NewAccount,
    ) -> impl Future<Output = Result<Account, StoreError>> + Send;

    fn insert_transaction(
        &mut self,
        transaction: NewTransaction,
    ) -> impl Future<Output = Result<Transaction, StoreError>> + Send;

    fn insert_ledger_entry(
        &mut self,
        entry: NewLedgerEntry,
    ) -> impl Future<Output = Result<LedgerEntry, StoreError>> + Send;

    fn update_balance(
        &mut self,
        id: AccountId,
        balance: Balance,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn update_status(
        &mut self,
        id: AccountId,
        status: AccountStatus,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn mark_deleted(&mut self, id: AccountId) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Delete a transaction and, by cascade, its ledger entry.
    /// Returns the deleted transaction, if it existed.
    fn delete_transaction(
        &mut self,
        id: TransactionId,
    ) -> impl Future<Output = Result<Option<Transaction>, StoreError>> + Send;

    /// Make every write of this unit visible at once.
    fn commit(self) -> impl Future<Output = Result<(), StoreError>> + Send;
}
