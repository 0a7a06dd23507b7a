//! Common test utilities
#![allow(dead_code)]

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use std::sync::Arc;

use microfinance_ledger::api::AppState;
use microfinance_ledger::audit::{AuditNotifier, MemoryAuditSink};
use microfinance_ledger::domain::{
    AccountId, Actor, Amount, Balance, ClientId, NewAccount, NewClient, OperationContext, Role,
    TransactionMeta,
};
use microfinance_ledger::ledger::{AccountGuard, AccountLocks, LedgerEngine};
use microfinance_ledger::store::{LedgerStore, MemoryStore};

/// Engine, guard and audit sink over a fresh in-memory store with one client
pub struct TestLedger {
    pub store: Arc<MemoryStore>,
    pub engine: Arc<LedgerEngine<MemoryStore>>,
    pub guard: Arc<AccountGuard<MemoryStore>>,
    pub sink: MemoryAuditSink,
    pub client_id: ClientId,
}

impl TestLedger {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let locks = Arc::new(AccountLocks::new());
        let sink = MemoryAuditSink::new();
        let (audit, _worker) = AuditNotifier::spawn(sink.clone());

        let client_id = store
            .insert_client(NewClient {
                last_name: "Rasoa".into(),
                first_name: "Lalaina".into(),
                national_id: Some("101 211 456 789".into()),
                ..NewClient::default()
            })
            .id;

        Self {
            engine: Arc::new(LedgerEngine::with_locks(
                Arc::clone(&store),
                Arc::clone(&locks),
                audit.clone(),
            )),
            guard: Arc::new(AccountGuard::new(Arc::clone(&store), locks, audit)),
            store,
            sink,
            client_id,
        }
    }

    pub fn state(&self) -> AppState<MemoryStore> {
        AppState {
            engine: Arc::clone(&self.engine),
            guard: Arc::clone(&self.guard),
        }
    }

    /// Open and activate an account
    pub async fn account(&self, balance: Decimal) -> AccountId {
        let id = self.inactive_account(balance).await;
        self.guard.activate(id, &admin()).await.unwrap();
        id
    }

    pub async fn inactive_account(&self, balance: Decimal) -> AccountId {
        self.guard
            .open(
                NewAccount {
                    client_id: self.client_id,
                    name: "Compte epargne".into(),
                    description: Some("Livret".into()),
                    opening_balance: Balance::new(balance).unwrap(),
                },
                &admin(),
            )
            .await
            .unwrap()
            .id()
    }

    pub async fn balance(&self, id: AccountId) -> Decimal {
        self.store
            .find_account(id)
            .await
            .unwrap()
            .unwrap()
            .balance()
            .value()
    }
}

pub fn admin() -> OperationContext {
    OperationContext::new().with_actor(Actor::new(1, Role::Admin))
}

pub fn teller() -> OperationContext {
    OperationContext::new().with_actor(Actor::new(2, Role::Caissier))
}

pub fn meta() -> TransactionMeta {
    TransactionMeta::new(
        "Operation guichet",
        "Agence centrale",
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
    )
}

pub fn amount(value: Decimal) -> Amount {
    Amount::new(value).unwrap()
}

/// Setup test database - apply the schema, truncate tables and seed one client
pub async fn setup_test_db() -> (PgPool, i64) {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    pool.execute(include_str!("../../migrations/0001_init.sql"))
        .await
        .expect("Failed to apply schema");

    sqlx::query(
        "TRUNCATE TABLE audit_traces, ledger_entries, transactions, accounts, clients RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await
    .expect("Failed to clean up DB");

    let client_id: i64 = sqlx::query_scalar(
        "INSERT INTO clients (last_name, first_name) VALUES ('Rasoa', 'Lalaina') RETURNING id",
    )
    .fetch_one(&pool)
    .await
    .expect("Failed to seed client");

    (pool, client_id)
}
