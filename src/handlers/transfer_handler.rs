//! Transfer Handler
//!
//! Moves funds between two accounts. Open to any authenticated actor.

use std::sync::Arc;

use crate::domain::OperationContext;
use crate::error::AppError;
use crate::ledger::{LedgerEngine, TransferReceipt};
use crate::store::LedgerStore;

use super::require_actor;
use super::validation::{validate_transfer, TransferPayload};

/// Handler for `POST /transferts`
pub struct TransferHandler<S: LedgerStore> {
    engine: Arc<LedgerEngine<S>>,
}

impl<S: LedgerStore> TransferHandler<S> {
    pub fn new(engine: Arc<LedgerEngine<S>>) -> Self {
        Self { engine }
    }

    /// Execute the transfer command
    pub async fn execute(
        &self,
        payload: &TransferPayload,
        context: &OperationContext,
    ) -> Result<TransferReceipt, AppError> {
        require_actor(context)?;

        let command = validate_transfer(payload)?;

        Ok(self
            .engine
            .transfer(
                command.source_account_id,
                command.destination_account_id,
                command.amount,
                context,
            )
            .await?)
    }
}
