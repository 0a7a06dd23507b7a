//! Account Guard
//!
//! Lifecycle changes that are not balance movements: opening, activating and
//! soft-deleting accounts. Shares the engine's lock table so these never
//! interleave with a transaction on the same account.

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

use crate::audit::{AuditNotifier, AuditRecordBuilder};
use crate::domain::{Account, AccountId, AccountStatus, LedgerError, NewAccount, OperationContext};
use crate::store::{AtomicUnit, LedgerStore};

use super::locks::AccountLocks;

pub struct AccountGuard<S: LedgerStore> {
    store: Arc<S>,
    locks: Arc<AccountLocks>,
    audit: AuditNotifier,
}

impl<S: LedgerStore> AccountGuard<S> {
    pub fn new(store: Arc<S>, locks: Arc<AccountLocks>, audit: AuditNotifier) -> Self {
        Self { store, locks, audit }
    }

    /// Open an Inactive account for an existing, non-deleted client
    pub async fn open(&self, account: NewAccount, context: &OperationContext) -> Result<Account, LedgerError> {
        let client_id = account.client_id;
        match self.store.find_client(client_id).await? {
            Some(client) if !client.deleted => {}
            _ => return Err(LedgerError::ClientNotFound(client_id)),
        }

        let mut unit = self.store.begin().await?;
        let account = unit.insert_account(account).await?;
        unit.commit().await?;

        tracing::info!(
            account_id = account.id(),
            client_id,
            opening_balance = %account.balance(),
            "Account opened"
        );

        self.audit.notify(
            AuditRecordBuilder::created("Account", account.id())
                .new_values(&account)
                .build(context),
        );

        Ok(account)
    }

    /// Activate an account so it can take ledger transactions
    pub async fn activate(&self, account_id: AccountId, context: &OperationContext) -> Result<Account, LedgerError> {
        let _lock = self.locks.acquire(&[account_id]).await;
        let mut unit = self.store.begin().await?;

        let mut account = Account::visible(unit.lock_account(account_id).await?, account_id)?;
        account.ensure_activatable()?;
        let previous = account.status();

        unit.update_status(account_id, AccountStatus::Active).await?;
        unit.commit().await?;

        tracing::info!(account_id, "Account activated");

        self.audit.notify(
            AuditRecordBuilder::updated("Account", account_id)
                .reason("activation")
                .old_values(&json!({ "statut_compte": previous }))
                .new_values(&json!({ "statut_compte": AccountStatus::Active }))
                .build(context),
        );

        account.set_status(AccountStatus::Active, Utc::now());
        Ok(account)
    }

    /// Soft-delete an account. The ledger treats it as absent from now on.
    pub async fn soft_delete(&self, account_id: AccountId, context: &OperationContext) -> Result<(), LedgerError> {
        let _lock = self.locks.acquire(&[account_id]).await;
        let mut unit = self.store.begin().await?;

        match unit.lock_account(account_id).await? {
            Some(account) if !account.is_deleted() => {}
            _ => return Err(LedgerError::account_not_found(account_id)),
        }

        unit.mark_deleted(account_id).await?;
        unit.commit().await?;

        tracing::info!(account_id, "Account soft-deleted");

        self.audit.notify(
            AuditRecordBuilder::updated("Account", account_id)
                .reason("soft_delete")
                .old_values(&json!({ "tag": false }))
                .new_values(&json!({ "tag": true }))
                .build(context),
        );

        Ok(())
    }
}
