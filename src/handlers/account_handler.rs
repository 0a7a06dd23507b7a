//! Account Handler
//!
//! Opening, lookup, activation and soft-deletion of accounts.

use std::sync::Arc;

use crate::domain::{Account, AccountId, OperationContext};
use crate::error::AppError;
use crate::ledger::{AccountGuard, LedgerEngine};
use crate::store::LedgerStore;

use super::validation::{validate_open_account, OpenAccountPayload};
use super::{require_actor, require_admin, require_teller};

pub struct AccountHandler<S: LedgerStore> {
    engine: Arc<LedgerEngine<S>>,
    guard: Arc<AccountGuard<S>>,
}

impl<S: LedgerStore> AccountHandler<S> {
    pub fn new(engine: Arc<LedgerEngine<S>>, guard: Arc<AccountGuard<S>>) -> Self {
        Self { engine, guard }
    }

    pub async fn open(
        &self,
        payload: &OpenAccountPayload,
        context: &OperationContext,
    ) -> Result<Account, AppError> {
        require_teller(context)?;

        let command = validate_open_account(payload)?;
        Ok(self.guard.open(command.into(), context).await?)
    }

    pub async fn get(&self, account_id: AccountId, context: &OperationContext) -> Result<Account, AppError> {
        require_actor(context)?;
        Ok(self.engine.visible_account(account_id).await?)
    }

    pub async fn activate(&self, account_id: AccountId, context: &OperationContext) -> Result<Account, AppError> {
        require_admin(context)?;
        Ok(self.guard.activate(account_id, context).await?)
    }

    pub async fn soft_delete(&self, account_id: AccountId, context: &OperationContext) -> Result<(), AppError> {
        require_admin(context)?;
        Ok(self.guard.soft_delete(account_id, context).await?)
    }
}
