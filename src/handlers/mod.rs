//! Command Handlers module
//!
//! Handlers sit between the HTTP layer and the ledger: they check the
//! actor's role, validate the raw payload into a command and invoke the
//! engine or the account guard.

mod account_handler;
mod commands;
mod history_handler;
mod transaction_handler;
mod transfer_handler;
pub mod validation;

#[cfg(test)]
mod tests;

pub use account_handler::AccountHandler;
pub use commands::*;
pub use history_handler::HistoryHandler;
pub use transaction_handler::TransactionHandler;
pub use transfer_handler::TransferHandler;
pub use validation::{OpenAccountPayload, TransactionPayload, TransferPayload};

use crate::domain::{Actor, OperationContext, Role};
use crate::error::AppError;

/// Any authenticated actor
pub(crate) fn require_actor(context: &OperationContext) -> Result<&Actor, AppError> {
    context
        .actor
        .as_ref()
        .ok_or_else(|| AppError::MissingHeader("X-Actor-Id".to_string()))
}

/// Admin or caissier
pub(crate) fn require_teller(context: &OperationContext) -> Result<&Actor, AppError> {
    let actor = require_actor(context)?;
    if !actor.role.is_teller() {
        return Err(AppError::Forbidden(format!("role {} may not perform this operation", actor.role)));
    }
    Ok(actor)
}

pub(crate) fn require_admin(context: &OperationContext) -> Result<&Actor, AppError> {
    let actor = require_actor(context)?;
    if actor.role != Role::Admin {
        return Err(AppError::Forbidden(format!("role {} may not perform this operation", actor.role)));
    }
    Ok(actor)
}
