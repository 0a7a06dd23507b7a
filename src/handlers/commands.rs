//! Command definitions
//!
//! Commands are validated intentions to change ledger state. They are only
//! built by the validators in `validation`, so every field already holds a
//! legal value.

use serde::{Deserialize, Serialize};

use crate::domain::{
    AccountId, Amount, Balance, ClientId, NewAccount, TransactionMeta, TransactionType,
};

// =========================================================================
// CreateTransactionCommand
// =========================================================================

/// Deposit or withdrawal requested by a teller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTransactionCommand {
    pub meta: TransactionMeta,
    pub kind: TransactionType,
    pub account_id: AccountId,
    pub amount: Amount,
}

impl CreateTransactionCommand {
    pub fn new(
        meta: TransactionMeta,
        kind: TransactionType,
        account_id: AccountId,
        amount: Amount,
    ) -> Self {
        Self {
            meta,
            kind,
            account_id,
            amount,
        }
    }
}

// =========================================================================
// TransferCommand
// =========================================================================

/// Move funds between two accounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferCommand {
    pub source_account_id: AccountId,
    pub destination_account_id: AccountId,
    pub amount: Amount,
}

impl TransferCommand {
    pub fn new(source_account_id: AccountId, destination_account_id: AccountId, amount: Amount) -> Self {
        Self {
            source_account_id,
            destination_account_id,
            amount,
        }
    }
}

// =========================================================================
// OpenAccountCommand
// =========================================================================

/// Open a new (Inactive) account for a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAccountCommand {
    pub client_id: ClientId,
    pub name: String,
    pub description: Option<String>,
    pub opening_balance: Balance,
}

impl OpenAccountCommand {
    pub fn new(client_id: ClientId, name: String) -> Self {
        Self {
            client_id,
            name,
            description: None,
            opening_balance: Balance::zero(),
        }
    }

    pub fn with_description(mut self, description: String) -> Self {
        self.description = Some(description);
        self
    }

    pub fn with_opening_balance(mut self, balance: Balance) -> Self {
        self.opening_balance = balance;
        self
    }
}

impl From<OpenAccountCommand> for NewAccount {
    fn from(command: OpenAccountCommand) -> Self {
        NewAccount {
            client_id: command.client_id,
            name: command.name,
            description: command.description,
            opening_balance: command.opening_balance,
        }
    }
}
