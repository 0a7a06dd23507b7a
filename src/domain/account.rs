//! Account and Client entities
//!
//! An account holds the current balance and activation status. Its balance
//! only changes through `credit`/`debit` transitions computed here and
//! persisted by the ledger engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{AccountId, Amount, Balance, ClientId, LedgerError};

/// Account activation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountStatus {
    Active,
    Inactive,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "Active",
            AccountStatus::Inactive => "Inactive",
        }
    }
}

impl Default for AccountStatus {
    fn default() -> Self {
        Self::Inactive
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(AccountStatus::Active),
            "Inactive" => Ok(AccountStatus::Inactive),
            other => Err(format!("unknown account status: {other}")),
        }
    }
}

/// A balance change computed for one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceTransition {
    pub before: Balance,
    pub after: Balance,
}

/// Savings account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    id: AccountId,
    name: String,
    description: Option<String>,
    balance: Balance,
    status: AccountStatus,
    client_id: ClientId,
    deleted: bool,
    /// Soft-delete flag of the owning client, captured at load time
    #[serde(skip)]
    client_deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Account {
    /// Rebuild an account from persisted state
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_store(
        id: AccountId,
        name: String,
        description: Option<String>,
        balance: Balance,
        status: AccountStatus,
        client_id: ClientId,
        deleted: bool,
        client_deleted: bool,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            description,
            balance,
            status,
            client_id,
            deleted,
            client_deleted,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn balance(&self) -> Balance {
        self.balance
    }

    pub fn status(&self) -> AccountStatus {
        self.status
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Visible accounts are neither soft-deleted nor owned by a soft-deleted
    /// client. Invisible accounts behave exactly like absent ones.
    pub fn is_visible(&self) -> bool {
        !self.deleted && !self.client_deleted
    }

    // =========================================================================
    // Eligibility
    // =========================================================================

    /// Resolve a lookup result into a visible account.
    pub fn visible(found: Option<Account>, id: AccountId) -> Result<Account, LedgerError> {
        match found {
            Some(account) if account.is_visible() => Ok(account),
            _ => Err(LedgerError::account_not_found(id)),
        }
    }

    /// Resolve a lookup result into an account that may take ledger
    /// transactions: visible and Active.
    pub fn active(found: Option<Account>, id: AccountId) -> Result<Account, LedgerError> {
        let account = Self::visible(found, id)?;
        if account.status != AccountStatus::Active {
            return Err(LedgerError::AccountNotActive(id));
        }
        Ok(account)
    }

    // =========================================================================
    // Balance transitions
    // =========================================================================

    pub fn credit(&self, amount: &Amount) -> Result<BalanceTransition, LedgerError> {
        let after = self
            .balance
            .credit(amount)
            .map_err(|_| LedgerError::BalanceOverflow(self.id))?;

        Ok(BalanceTransition {
            before: self.balance,
            after,
        })
    }

    pub fn debit(&self, amount: &Amount) -> Result<BalanceTransition, LedgerError> {
        if !self.balance.is_sufficient_for(amount) {
            return Err(LedgerError::insufficient_funds(
                amount.value(),
                self.balance.value(),
            ));
        }

        let after = self
            .balance
            .debit(amount)
            .map_err(|_| LedgerError::insufficient_funds(amount.value(), self.balance.value()))?;

        Ok(BalanceTransition {
            before: self.balance,
            after,
        })
    }

    /// Check that an activation is allowed
    pub fn ensure_activatable(&self) -> Result<(), LedgerError> {
        if self.status == AccountStatus::Active {
            return Err(LedgerError::AlreadyActive(self.id));
        }
        Ok(())
    }

    pub(crate) fn set_balance(&mut self, balance: Balance, at: DateTime<Utc>) {
        self.balance = balance;
        self.updated_at = at;
    }

    pub(crate) fn set_status(&mut self, status: AccountStatus, at: DateTime<Utc>) {
        self.status = status;
        self.updated_at = at;
    }

    pub(crate) fn mark_deleted(&mut self, at: DateTime<Utc>) {
        self.deleted = true;
        self.updated_at = at;
    }

    pub(crate) fn set_client_deleted(&mut self, client_deleted: bool) {
        self.client_deleted = client_deleted;
    }
}

/// Data needed to open an account. Accounts always open Inactive.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    pub client_id: ClientId,
    pub name: String,
    pub description: Option<String>,
    pub opening_balance: Balance,
}

/// Account holder. Managed elsewhere; the ledger reads it to decide
/// whether the client's accounts are visible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Client {
    pub id: ClientId,
    pub last_name: String,
    pub first_name: String,
    pub national_id: Option<String>,
    pub address: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub deleted: bool,
}

/// Data needed to register a client
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewClient {
    pub last_name: String,
    pub first_name: String,
    pub national_id: Option<String>,
    pub address: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}
