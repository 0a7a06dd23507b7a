//! Ledger Engine
//!
//! Deposits, withdrawals and transfers. Each operation:
//! 1. takes the per-account lock(s),
//! 2. opens an atomic unit and reads the account(s) under it,
//! 3. checks existence, status and funds,
//! 4. writes, then commits.
//!
//! Any failure before the commit drops the unit, which discards every write.
//! Audit records are emitted only after a successful commit.

use serde_json::json;
use std::sync::Arc;

use crate::audit::{AuditNotifier, AuditRecordBuilder};
use crate::domain::{
    Account, AccountId, Amount, Balance, BalanceTransition, HistoryFilter, HistoryRow, LedgerError,
    NewLedgerEntry, NewTransaction, OperationContext, Transaction, TransactionId, TransactionMeta,
    TransactionType, TransferSide,
};
use crate::store::{AtomicUnit, LedgerStore};

use super::locks::AccountLocks;
use super::replay::{replay, ReplayReport};

/// Result of a committed transfer
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TransferReceipt {
    pub source_account_id: AccountId,
    pub destination_account_id: AccountId,
    pub amount: Amount,
    pub source_balance: Balance,
    pub destination_balance: Balance,
}

/// Balance-mutating core of the ledger
pub struct LedgerEngine<S: LedgerStore> {
    store: Arc<S>,
    locks: Arc<AccountLocks>,
    audit: AuditNotifier,
}

impl<S: LedgerStore> LedgerEngine<S> {
    pub fn new(store: Arc<S>, audit: AuditNotifier) -> Self {
        Self::with_locks(store, Arc::new(AccountLocks::new()), audit)
    }

    /// Share a lock table with other components writing accounts
    pub fn with_locks(store: Arc<S>, locks: Arc<AccountLocks>, audit: AuditNotifier) -> Self {
        Self { store, locks, audit }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn locks(&self) -> &Arc<AccountLocks> {
        &self.locks
    }

    pub fn audit(&self) -> &AuditNotifier {
        &self.audit
    }

    // =========================================================================
    // Deposit / Withdrawal
    // =========================================================================

    pub async fn deposit(
        &self,
        account_id: AccountId,
        amount: Amount,
        meta: TransactionMeta,
        context: &OperationContext,
    ) -> Result<Transaction, LedgerError> {
        self.record(TransactionType::Deposit, account_id, amount, meta, context)
            .await
    }

    pub async fn withdraw(
        &self,
        account_id: AccountId,
        amount: Amount,
        meta: TransactionMeta,
        context: &OperationContext,
    ) -> Result<Transaction, LedgerError> {
        self.record(TransactionType::Withdrawal, account_id, amount, meta, context)
            .await
    }

    /// Record a deposit or withdrawal: one Transaction, one Ledger Entry and
    /// one balance update, committed together.
    pub async fn record(
        &self,
        kind: TransactionType,
        account_id: AccountId,
        amount: Amount,
        meta: TransactionMeta,
        context: &OperationContext,
    ) -> Result<Transaction, LedgerError> {
        let _lock = self.locks.acquire(&[account_id]).await;
        let mut unit = self.store.begin().await?;

        let account = find_active_account(&mut unit, account_id).await?;
        let transition = match kind {
            TransactionType::Deposit => account.credit(&amount),
            TransactionType::Withdrawal => account.debit(&amount),
        }
        .inspect_err(|e| {
            tracing::debug!(account_id, kind = %kind, amount = %amount, error = %e, "Transaction rejected")
        })?;

        let transaction = unit
            .insert_transaction(NewTransaction {
                meta,
                kind,
                amount,
                account_id,
            })
            .await?;

        let entry = unit
            .insert_ledger_entry(NewLedgerEntry {
                balance_before: transition.before,
                balance_after: transition.after,
                account_id,
                transaction_id: transaction.id,
            })
            .await?;

        unit.update_balance(account_id, transition.after).await?;
        unit.commit().await?;

        tracing::info!(
            account_id,
            transaction_id = transaction.id,
            kind = %kind,
            amount = %amount,
            balance_before = %transition.before,
            balance_after = %transition.after,
            "Transaction committed"
        );

        let reason = match kind {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
        };
        self.audit.notify(
            AuditRecordBuilder::created("Transaction", transaction.id)
                .reason(reason)
                .new_values(&transaction)
                .build(context),
        );
        self.audit.notify(
            AuditRecordBuilder::created("LedgerEntry", entry.id)
                .reason(reason)
                .new_values(&entry)
                .build(context),
        );
        self.notify_balance_change(&account, transition, reason, context);

        Ok(transaction)
    }

    // =========================================================================
    // Transfer
    // =========================================================================

    /// Move `amount` from one account to another.
    ///
    /// Only the two balances change: no Transaction or Ledger Entry is
    /// written, so both accounts show a gap in their ledger replay. Account
    /// status is not checked; soft-deleted accounts count as absent.
    pub async fn transfer(
        &self,
        source_id: AccountId,
        destination_id: AccountId,
        amount: Amount,
        context: &OperationContext,
    ) -> Result<TransferReceipt, LedgerError> {
        if source_id == destination_id {
            return Err(LedgerError::SameAccountTransfer);
        }

        let _lock = self.locks.acquire(&[source_id, destination_id]).await;
        let mut unit = self.store.begin().await?;

        // Row locks in ascending id order
        let (first, second) = if source_id < destination_id {
            (source_id, destination_id)
        } else {
            (destination_id, source_id)
        };
        let first_row = unit.lock_account(first).await?;
        let second_row = unit.lock_account(second).await?;
        let (source_row, destination_row) = if first == source_id {
            (first_row, second_row)
        } else {
            (second_row, first_row)
        };

        let source = Account::visible(source_row, source_id)
            .map_err(|e| e.on_side(TransferSide::Source))?;
        let destination = Account::visible(destination_row, destination_id)
            .map_err(|e| e.on_side(TransferSide::Destination))?;

        let debit = source.debit(&amount)?;
        let credit = destination.credit(&amount)?;

        unit.update_balance(source_id, debit.after).await?;
        unit.update_balance(destination_id, credit.after).await?;
        unit.commit().await?;

        tracing::info!(
            source_account_id = source_id,
            destination_account_id = destination_id,
            amount = %amount,
            source_balance = %debit.after,
            destination_balance = %credit.after,
            "Transfer committed"
        );

        self.notify_balance_change(&source, debit, "transfer", context);
        self.notify_balance_change(&destination, credit, "transfer", context);

        Ok(TransferReceipt {
            source_account_id: source_id,
            destination_account_id: destination_id,
            amount,
            source_balance: debit.after,
            destination_balance: credit.after,
        })
    }

    // =========================================================================
    // Administrative deletion
    // =========================================================================

    /// Delete a transaction and its ledger entry. Balances are left as they
    /// are; the deletion is not a reversal.
    pub async fn delete_transaction(
        &self,
        transaction_id: TransactionId,
        context: &OperationContext,
    ) -> Result<Transaction, LedgerError> {
        let mut unit = self.store.begin().await?;
        let deleted = unit
            .delete_transaction(transaction_id)
            .await?
            .ok_or(LedgerError::TransactionNotFound(transaction_id))?;
        unit.commit().await?;

        tracing::info!(transaction_id, account_id = deleted.account_id, "Transaction deleted");

        self.audit.notify(
            AuditRecordBuilder::deleted("Transaction", deleted.id)
                .old_values(&deleted)
                .build(context),
        );

        Ok(deleted)
    }

    // =========================================================================
    // Read side
    // =========================================================================

    /// Find an account that is neither soft-deleted nor owned by a
    /// soft-deleted client
    pub async fn visible_account(&self, account_id: AccountId) -> Result<Account, LedgerError> {
        Account::visible(self.store.find_account(account_id).await?, account_id)
    }

    pub async fn history(&self, filter: &HistoryFilter) -> Result<Vec<HistoryRow>, LedgerError> {
        Ok(self.store.history(filter).await?)
    }

    /// Replay an account's ledger and report discrepancies.
    ///
    /// Balance and entries are read under the account lock so no write
    /// lands between the two reads.
    pub async fn replay(&self, account_id: AccountId) -> Result<ReplayReport, LedgerError> {
        let _lock = self.locks.acquire(&[account_id]).await;
        let account = self
            .store
            .find_account(account_id)
            .await?
            .ok_or_else(|| LedgerError::account_not_found(account_id))?;
        let lines = self.store.account_ledger(account_id).await?;

        Ok(replay(account_id, account.balance().value(), &lines))
    }

    fn notify_balance_change(
        &self,
        account: &Account,
        transition: BalanceTransition,
        reason: &str,
        context: &OperationContext,
    ) {
        self.audit.notify(
            AuditRecordBuilder::updated("Account", account.id())
                .reason(reason)
                .old_values(&json!({ "solde_compte": transition.before }))
                .new_values(&json!({ "solde_compte": transition.after }))
                .build(context),
        );
    }
}

/// Load an account that may take ledger transactions
async fn find_active_account<U: AtomicUnit>(
    unit: &mut U,
    account_id: AccountId,
) -> Result<Account, LedgerError> {
    let found = unit.lock_account(account_id).await?;
    Account::active(found, account_id).inspect_err(|e| {
        tracing::debug!(account_id, error = %e, "Account not eligible")
    })
}
