//! History Handler
//!
//! Read side of the ledger: joined history rows and chain verification.

use std::sync::Arc;

use crate::domain::{
    AccountId, ClientId, HistoryFilter, HistoryRow, LedgerError, OperationContext, TransactionId,
};
use crate::error::AppError;
use crate::ledger::{LedgerEngine, ReplayReport};
use crate::store::LedgerStore;

use super::require_teller;

pub struct HistoryHandler<S: LedgerStore> {
    engine: Arc<LedgerEngine<S>>,
}

impl<S: LedgerStore> HistoryHandler<S> {
    pub fn new(engine: Arc<LedgerEngine<S>>) -> Self {
        Self { engine }
    }

    /// History rows matching `filter`. An account or client scope must name
    /// a visible account or a non-deleted client.
    pub async fn list(
        &self,
        filter: HistoryFilter,
        context: &OperationContext,
    ) -> Result<Vec<HistoryRow>, AppError> {
        require_teller(context)?;

        if let Some(account_id) = filter.account_id {
            self.engine.visible_account(account_id).await?;
        }
        if let Some(client_id) = filter.client_id {
            self.ensure_client(client_id).await?;
        }

        Ok(self.engine.history(&filter).await?)
    }

    /// The joined row of a single transaction
    pub async fn find(
        &self,
        transaction_id: TransactionId,
        context: &OperationContext,
    ) -> Result<HistoryRow, AppError> {
        require_teller(context)?;

        self.engine
            .history(&HistoryFilter::for_transaction(transaction_id))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::TransactionNotFound(transaction_id).into())
    }

    /// Replay an account's ledger chain
    pub async fn verify(
        &self,
        account_id: AccountId,
        context: &OperationContext,
    ) -> Result<ReplayReport, AppError> {
        require_teller(context)?;

        self.engine.visible_account(account_id).await?;
        Ok(self.engine.replay(account_id).await?)
    }

    async fn ensure_client(&self, client_id: ClientId) -> Result<(), LedgerError> {
        match self.engine.store().find_client(client_id).await? {
            Some(client) if !client.deleted => Ok(()),
            _ => Err(LedgerError::ClientNotFound(client_id)),
        }
    }
}
