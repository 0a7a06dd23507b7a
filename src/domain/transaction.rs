//! Transactions, ledger entries and history rows
//!
//! Transactions and ledger entries are write-once. Exactly one ledger entry
//! exists per transaction, recording the account balance before and after it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{AccountId, AccountStatus, Amount, Balance, ClientId, LedgerEntryId, LedgerError, TransactionId};

/// Direction of a ledger transaction. Serialized with the dashboard codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    #[serde(rename = "DEPOT")]
    Deposit,
    #[serde(rename = "RETRAIT")]
    Withdrawal,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "DEPOT",
            TransactionType::Withdrawal => "RETRAIT",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEPOT" => Ok(TransactionType::Deposit),
            "RETRAIT" => Ok(TransactionType::Withdrawal),
            other => Err(LedgerError::UnknownTransactionType(other.to_string())),
        }
    }
}

/// Descriptive fields supplied by the teller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionMeta {
    pub name: String,
    pub description: String,
    pub date: NaiveDate,
}

impl TransactionMeta {
    pub fn new(name: impl Into<String>, description: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            date,
        }
    }
}

/// Committed deposit or withdrawal
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub name: String,
    pub description: String,
    pub date: NaiveDate,
    pub kind: TransactionType,
    pub amount: Amount,
    pub account_id: AccountId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub meta: TransactionMeta,
    pub kind: TransactionType,
    pub amount: Amount,
    pub account_id: AccountId,
}

/// Before/after balance snapshot ("historique")
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub balance_before: Balance,
    pub balance_after: Balance,
    pub account_id: AccountId,
    pub transaction_id: TransactionId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewLedgerEntry {
    pub balance_before: Balance,
    pub balance_after: Balance,
    pub account_id: AccountId,
    pub transaction_id: TransactionId,
}

/// A ledger entry together with the movement that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerLine {
    pub entry: LedgerEntry,
    pub kind: TransactionType,
    pub amount: Amount,
}

/// Filter for history queries. Empty filter means every row.
///
/// Date bounds are inclusive and apply to the transaction date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    pub account_id: Option<AccountId>,
    pub client_id: Option<ClientId>,
    pub transaction_id: Option<TransactionId>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl HistoryFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_account(account_id: AccountId) -> Self {
        Self {
            account_id: Some(account_id),
            ..Self::default()
        }
    }

    pub fn for_client(client_id: ClientId) -> Self {
        Self {
            client_id: Some(client_id),
            ..Self::default()
        }
    }

    pub fn for_transaction(transaction_id: TransactionId) -> Self {
        Self {
            transaction_id: Some(transaction_id),
            ..Self::default()
        }
    }

    pub fn since(mut self, date: NaiveDate) -> Self {
        self.from = Some(date);
        self
    }

    pub fn until(mut self, date: NaiveDate) -> Self {
        self.to = Some(date);
        self
    }

    pub fn matches_date(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

/// Joined client + account + transaction + ledger entry row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRow {
    pub client_id: ClientId,
    pub client_last_name: String,
    pub client_first_name: String,
    pub client_national_id: Option<String>,
    pub client_address: Option<String>,
    pub client_email: Option<String>,
    pub client_phone: Option<String>,

    pub account_id: AccountId,
    pub account_name: String,
    pub account_description: Option<String>,
    pub account_balance: Balance,
    pub account_status: AccountStatus,

    pub transaction_id: TransactionId,
    pub transaction_name: String,
    pub transaction_description: String,
    pub transaction_date: NaiveDate,
    pub transaction_kind: TransactionType,
    pub transaction_amount: Amount,

    pub entry_id: LedgerEntryId,
    pub balance_before: Balance,
    pub balance_after: Balance,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_type_codes() {
        assert_eq!("DEPOT".parse::<TransactionType>().unwrap(), TransactionType::Deposit);
        assert_eq!("RETRAIT".parse::<TransactionType>().unwrap(), TransactionType::Withdrawal);
        assert_eq!(
            "VIREMENT".parse::<TransactionType>(),
            Err(LedgerError::UnknownTransactionType("VIREMENT".into()))
        );

        let json = serde_json::to_string(&TransactionType::Withdrawal).unwrap();
        assert_eq!(json, "\"RETRAIT\"");
    }

    #[test]
    fn test_history_filter_dates_are_inclusive() {
        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        let filter = HistoryFilter::for_account(1).since(d("2024-01-10")).until(d("2024-01-20"));

        assert!(filter.matches_date(d("2024-01-10")));
        assert!(filter.matches_date(d("2024-01-20")));
        assert!(!filter.matches_date(d("2024-01-09")));
        assert!(!filter.matches_date(d("2024-01-21")));
        assert!(HistoryFilter::all().matches_date(d("1999-12-31")));
    }
}
