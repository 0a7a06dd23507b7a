//! Transaction Handler
//!
//! Deposits and withdrawals posted by tellers, plus administrative deletion.

use std::sync::Arc;

use crate::domain::{LedgerError, OperationContext, Transaction, TransactionId};
use crate::error::AppError;
use crate::ledger::LedgerEngine;
use crate::store::LedgerStore;

use super::validation::{validate_transaction, TransactionPayload};
use super::{require_admin, require_teller};

/// Handler for `POST /transactions` and `DELETE /transactions/:id`
pub struct TransactionHandler<S: LedgerStore> {
    engine: Arc<LedgerEngine<S>>,
}

impl<S: LedgerStore> TransactionHandler<S> {
    pub fn new(engine: Arc<LedgerEngine<S>>) -> Self {
        Self { engine }
    }

    /// Validate and record a deposit or withdrawal.
    ///
    /// Every business rejection, including an unknown account, surfaces as
    /// [`AppError::TransactionRejected`] so the caller answers 400.
    pub async fn execute(
        &self,
        payload: &TransactionPayload,
        context: &OperationContext,
    ) -> Result<Transaction, AppError> {
        require_teller(context)?;

        let command = validate_transaction(payload)
            .map_err(|e| AppError::transaction_rejected(LedgerError::Validation(e)))?;

        self.engine
            .record(
                command.kind,
                command.account_id,
                command.amount,
                command.meta,
                context,
            )
            .await
            .map_err(AppError::transaction_rejected)
    }

    pub async fn delete(
        &self,
        transaction_id: TransactionId,
        context: &OperationContext,
    ) -> Result<Transaction, AppError> {
        require_admin(context)?;
        Ok(self.engine.delete_transaction(transaction_id, context).await?)
    }
}
