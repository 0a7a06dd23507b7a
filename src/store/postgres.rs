//! PostgreSQL ledger store
//!
//! An atomic unit is one database transaction. Accounts are read with
//! `SELECT ... FOR UPDATE`, so concurrent units on the same account wait for
//! each other even across processes.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction as PgTransaction};

use crate::domain::{
    Account, AccountId, AccountStatus, Amount, Balance, Client, ClientId, HistoryFilter,
    HistoryRow, LedgerEntry, LedgerLine, NewAccount, NewLedgerEntry, NewTransaction, Transaction,
    TransactionId, TransactionType,
};

use super::{AtomicUnit, LedgerStore, StoreError};

const ACCOUNT_COLUMNS: &str = r#"
    a.id, a.name, a.description, a.balance, a.status, a.client_id, a.tag,
    COALESCE(c.tag, TRUE) AS client_tag, a.created_at, a.updated_at
"#;

type AccountTuple = (
    i64,
    String,
    Option<String>,
    Decimal,
    String,
    i64,
    bool,
    bool,
    DateTime<Utc>,
    DateTime<Utc>,
);

type TransactionTuple = (
    i64,
    String,
    String,
    NaiveDate,
    String,
    Decimal,
    i64,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn balance(value: Decimal, what: &str) -> Result<Balance, StoreError> {
    Balance::new(value).map_err(|e| StoreError::Corrupt(format!("{what}: {e}")))
}

fn amount(value: Decimal, what: &str) -> Result<Amount, StoreError> {
    Amount::new(value).map_err(|e| StoreError::Corrupt(format!("{what}: {e}")))
}

fn kind(value: &str) -> Result<TransactionType, StoreError> {
    value
        .parse()
        .map_err(|e: crate::domain::LedgerError| StoreError::Corrupt(e.to_string()))
}

fn account_from_row(row: AccountTuple) -> Result<Account, StoreError> {
    let (id, name, description, raw_balance, status, client_id, tag, client_tag, created_at, updated_at) = row;

    let status: AccountStatus = status.parse().map_err(StoreError::Corrupt)?;

    Ok(Account::from_store(
        id,
        name,
        description,
        balance(raw_balance, &format!("account {id} balance"))?,
        status,
        client_id,
        tag,
        client_tag,
        created_at,
        updated_at,
    ))
}

fn transaction_from_row(row: TransactionTuple) -> Result<Transaction, StoreError> {
    let (id, name, description, date, raw_kind, raw_amount, account_id, created_at, updated_at) = row;

    Ok(Transaction {
        id,
        name,
        description,
        date,
        kind: kind(&raw_kind)?,
        amount: amount(raw_amount, &format!("transaction {id} amount"))?,
        account_id,
        created_at,
        updated_at,
    })
}

/// Joined history row as returned by PostgreSQL
#[derive(Debug, sqlx::FromRow)]
struct HistoryRecord {
    client_id: i64,
    client_last_name: String,
    client_first_name: String,
    client_national_id: Option<String>,
    client_address: Option<String>,
    client_email: Option<String>,
    client_phone: Option<String>,
    account_id: i64,
    account_name: String,
    account_description: Option<String>,
    account_balance: Decimal,
    account_status: String,
    transaction_id: i64,
    transaction_name: String,
    transaction_description: String,
    transaction_date: NaiveDate,
    transaction_kind: String,
    transaction_amount: Decimal,
    entry_id: i64,
    balance_before: Decimal,
    balance_after: Decimal,
    recorded_at: DateTime<Utc>,
}

impl TryFrom<HistoryRecord> for HistoryRow {
    type Error = StoreError;

    fn try_from(r: HistoryRecord) -> Result<Self, Self::Error> {
        Ok(HistoryRow {
            client_id: r.client_id,
            client_last_name: r.client_last_name,
            client_first_name: r.client_first_name,
            client_national_id: r.client_national_id,
            client_address: r.client_address,
            client_email: r.client_email,
            client_phone: r.client_phone,
            account_id: r.account_id,
            account_name: r.account_name,
            account_description: r.account_description,
            account_balance: balance(r.account_balance, "account balance")?,
            account_status: r.account_status.parse().map_err(StoreError::Corrupt)?,
            transaction_id: r.transaction_id,
            transaction_name: r.transaction_name,
            transaction_description: r.transaction_description,
            transaction_date: r.transaction_date,
            transaction_kind: kind(&r.transaction_kind)?,
            transaction_amount: amount(r.transaction_amount, "transaction amount")?,
            entry_id: r.entry_id,
            balance_before: balance(r.balance_before, "balance_before")?,
            balance_after: balance(r.balance_after, "balance_after")?,
            recorded_at: r.recorded_at,
        })
    }
}

/// PostgreSQL-backed ledger store
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new PgStore with a database pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl LedgerStore for PgStore {
    type Unit = PgUnit;

    async fn begin(&self) -> Result<PgUnit, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(PgUnit { tx })
    }

    async fn find_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts a LEFT JOIN clients c ON c.id = a.client_id WHERE a.id = $1"
        );
        let row: Option<AccountTuple> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(account_from_row).transpose()
    }

    async fn find_client(&self, id: ClientId) -> Result<Option<Client>, StoreError> {
        let row: Option<(i64, String, String, Option<String>, Option<String>, Option<String>, Option<String>, bool)> =
            sqlx::query_as(
                r#"
                SELECT id, last_name, first_name, national_id, address, email, phone, tag
                FROM clients
                WHERE id = $1
                "#,
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(
            |(id, last_name, first_name, national_id, address, email, phone, deleted)| Client {
                id,
                last_name,
                first_name,
                national_id,
                address,
                email,
                phone,
                deleted,
            },
        ))
    }

    async fn account_ids(&self) -> Result<Vec<AccountId>, StoreError> {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM accounts ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn account_ledger(&self, account_id: AccountId) -> Result<Vec<LedgerLine>, StoreError> {
        let rows: Vec<(i64, Decimal, Decimal, i64, i64, DateTime<Utc>, String, Decimal)> = sqlx::query_as(
            r#"
            SELECT e.id, e.balance_before, e.balance_after, e.account_id, e.transaction_id,
                   e.created_at, t.kind, t.amount
            FROM ledger_entries e
            JOIN transactions t ON t.id = e.transaction_id
            WHERE e.account_id = $1
            ORDER BY e.id ASC
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, before, after, account_id, transaction_id, created_at, raw_kind, raw_amount)| {
                Ok(LedgerLine {
                    entry: LedgerEntry {
                        id,
                        balance_before: balance(before, "balance_before")?,
                        balance_after: balance(after, "balance_after")?,
                        account_id,
                        transaction_id,
                        created_at,
                    },
                    kind: kind(&raw_kind)?,
                    amount: amount(raw_amount, "transaction amount")?,
                })
            })
            .collect()
    }

    async fn history(&self, filter: &HistoryFilter) -> Result<Vec<HistoryRow>, StoreError> {
        let records: Vec<HistoryRecord> = sqlx::query_as(
            r#"
            SELECT c.id AS client_id, c.last_name AS client_last_name,
                   c.first_name AS client_first_name, c.national_id AS client_national_id,
                   c.address AS client_address, c.email AS client_email, c.phone AS client_phone,
                   a.id AS account_id, a.name AS account_name,
                   a.description AS account_description, a.balance AS account_balance,
                   a.status AS account_status,
                   t.id AS transaction_id, t.name AS transaction_name,
                   t.description AS transaction_description, t.transaction_date,
                   t.kind AS transaction_kind, t.amount AS transaction_amount,
                   e.id AS entry_id, e.balance_before, e.balance_after, e.created_at AS recorded_at
            FROM transactions t
            JOIN ledger_entries e ON e.transaction_id = t.id
            JOIN accounts a ON a.id = t.account_id
            JOIN clients c ON c.id = a.client_id
            WHERE ($1::BIGINT IS NULL OR a.id = $1)
              AND ($2::BIGINT IS NULL OR c.id = $2)
              AND ($3::BIGINT IS NULL OR t.id = $3)
              AND ($4::DATE IS NULL OR t.transaction_date >= $4)
              AND ($5::DATE IS NULL OR t.transaction_date <= $5)
            ORDER BY t.id ASC
            "#,
        )
        .bind(filter.account_id)
        .bind(filter.client_id)
        .bind(filter.transaction_id)
        .bind(filter.from)
        .bind(filter.to)
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(HistoryRow::try_from).collect()
    }
}

/// One PostgreSQL transaction. Dropping it rolls back.
pub struct PgUnit {
    tx: PgTransaction<'static, Postgres>,
}

impl AtomicUnit for PgUnit {
    async fn lock_account(&mut self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts a LEFT JOIN clients c ON c.id = a.client_id \
             WHERE a.id = $1 FOR UPDATE OF a"
        );
        let row: Option<AccountTuple> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(account_from_row).transpose()
    }

    async fn insert_account(&mut self, account: NewAccount) -> Result<Account, StoreError> {
        let sql = format!(
            r#"
            WITH inserted AS (
                INSERT INTO accounts (name, description, balance, status, client_id)
                VALUES ($1, $2, $3, 'Inactive', $4)
                RETURNING *
            )
            SELECT {ACCOUNT_COLUMNS} FROM inserted a LEFT JOIN clients c ON c.id = a.client_id
            "#
        );
        let row: AccountTuple = sqlx::query_as(&sql)
            .bind(&account.name)
            .bind(&account.description)
            .bind(account.opening_balance.value())
            .bind(account.client_id)
            .fetch_one(&mut *self.tx)
            .await?;

        account_from_row(row)
    }

    async fn insert_transaction(&mut self, transaction: NewTransaction) -> Result<Transaction, StoreError> {
        let (id, created_at, updated_at): (i64, DateTime<Utc>, DateTime<Utc>) = sqlx::query_as(
            r#"
            INSERT INTO transactions (name, description, transaction_date, kind, amount, account_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, created_at, updated_at
            "#,
        )
        .bind(&transaction.meta.name)
        .bind(&transaction.meta.description)
        .bind(transaction.meta.date)
        .bind(transaction.kind.as_str())
        .bind(transaction.amount.value())
        .bind(transaction.account_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(Transaction {
            id,
            name: transaction.meta.name,
            description: transaction.meta.description,
            date: transaction.meta.date,
            kind: transaction.kind,
            amount: transaction.amount,
            account_id: transaction.account_id,
            created_at,
            updated_at,
        })
    }

    async fn insert_ledger_entry(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry, StoreError> {
        let (id, created_at): (i64, DateTime<Utc>) = sqlx::query_as(
            r#"
            INSERT INTO ledger_entries (balance_before, balance_after, account_id, transaction_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, created_at
            "#,
        )
        .bind(entry.balance_before.value())
        .bind(entry.balance_after.value())
        .bind(entry.account_id)
        .bind(entry.transaction_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(LedgerEntry {
            id,
            balance_before: entry.balance_before,
            balance_after: entry.balance_after,
            account_id: entry.account_id,
            transaction_id: entry.transaction_id,
            created_at,
        })
    }

    async fn update_balance(&mut self, id: AccountId, balance: Balance) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE accounts SET balance = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(balance.value())
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing(format!("account {id}")));
        }
        Ok(())
    }

    async fn update_status(&mut self, id: AccountId, status: AccountStatus) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE accounts SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing(format!("account {id}")));
        }
        Ok(())
    }

    async fn mark_deleted(&mut self, id: AccountId) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE accounts SET tag = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing(format!("account {id}")));
        }
        Ok(())
    }

    async fn delete_transaction(&mut self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        // ledger_entries.transaction_id cascades
        let row: Option<TransactionTuple> = sqlx::query_as(
            r#"
            DELETE FROM transactions
            WHERE id = $1
            RETURNING id, name, description, transaction_date, kind, amount, account_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(transaction_from_row).transpose()
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}
