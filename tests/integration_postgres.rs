//! PostgreSQL integration tests
//!
//! Need a live database: `DATABASE_URL=... cargo test -- --ignored`

mod common;

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sqlx::PgPool;
use tokio::sync::Barrier;

use common::{admin, amount, meta, setup_test_db, teller};
use microfinance_ledger::audit::{AuditNotifier, PgAuditSink};
use microfinance_ledger::domain::{AccountId, Balance, LedgerError, NewAccount};
use microfinance_ledger::ledger::{AccountGuard, AccountLocks, LedgerEngine};
use microfinance_ledger::store::PgStore;

struct PgLedger {
    pool: PgPool,
    engine: Arc<LedgerEngine<PgStore>>,
    guard: AccountGuard<PgStore>,
    audit: AuditNotifier,
    client_id: i64,
}

impl PgLedger {
    async fn new() -> Self {
        let (pool, client_id) = setup_test_db().await;
        let store = Arc::new(PgStore::new(pool.clone()));
        let locks = Arc::new(AccountLocks::new());
        let (audit, _worker) = AuditNotifier::spawn(PgAuditSink::new(pool.clone()));

        Self {
            engine: Arc::new(LedgerEngine::with_locks(
                Arc::clone(&store),
                Arc::clone(&locks),
                audit.clone(),
            )),
            guard: AccountGuard::new(store, locks, audit.clone()),
            audit,
            pool,
            client_id,
        }
    }

    async fn account(&self, balance: Decimal) -> AccountId {
        let account = self
            .guard
            .open(
                NewAccount {
                    client_id: self.client_id,
                    name: "Compte epargne".into(),
                    description: None,
                    opening_balance: Balance::new(balance).unwrap(),
                },
                &admin(),
            )
            .await
            .unwrap();
        self.guard.activate(account.id(), &admin()).await.unwrap();
        account.id()
    }

    async fn balance(&self, id: AccountId) -> Decimal {
        sqlx::query_scalar("SELECT balance FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }
}

#[tokio::test]
#[ignore]
async fn test_deposit_writes_transaction_entry_and_balance() {
    let ledger = PgLedger::new().await;
    let account = ledger.account(dec!(500.00)).await;

    let transaction = ledger
        .engine
        .deposit(account, amount(dec!(150.00)), meta(), &teller())
        .await
        .unwrap();

    assert_eq!(ledger.balance(account).await, dec!(650.00));
    assert_eq!(ledger.count("transactions").await, 1);

    let (before, after): (Decimal, Decimal) = sqlx::query_as(
        "SELECT balance_before, balance_after FROM ledger_entries WHERE transaction_id = $1",
    )
    .bind(transaction.id)
    .fetch_one(&ledger.pool)
    .await
    .unwrap();
    assert_eq!((before, after), (dec!(500.00), dec!(650.00)));
}

#[tokio::test]
#[ignore]
async fn test_rejected_withdrawal_leaves_no_rows() {
    let ledger = PgLedger::new().await;
    let account = ledger.account(dec!(100.00)).await;

    let err = ledger
        .engine
        .withdraw(account, amount(dec!(100.01)), meta(), &teller())
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
    assert_eq!(ledger.balance(account).await, dec!(100.00));
    assert_eq!(ledger.count("transactions").await, 0);
    assert_eq!(ledger.count("ledger_entries").await, 0);
}

#[tokio::test]
#[ignore]
async fn test_ledger_rows_are_immutable() {
    let ledger = PgLedger::new().await;
    let account = ledger.account(dec!(10.00)).await;
    ledger
        .engine
        .deposit(account, amount(dec!(5.00)), meta(), &teller())
        .await
        .unwrap();

    let result = sqlx::query("UPDATE ledger_entries SET balance_after = 0")
        .execute(&ledger.pool)
        .await;
    assert!(result.is_err(), "ledger entries must reject updates");
}

#[tokio::test]
#[ignore]
async fn test_transfer_moves_balances_only() {
    let ledger = PgLedger::new().await;
    let source = ledger.account(dec!(300.00)).await;
    let destination = ledger.account(dec!(50.00)).await;

    ledger
        .engine
        .transfer(source, destination, amount(dec!(200.00)), &teller())
        .await
        .unwrap();

    assert_eq!(ledger.balance(source).await, dec!(100.00));
    assert_eq!(ledger.balance(destination).await, dec!(250.00));
    assert_eq!(ledger.count("transactions").await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_concurrent_withdrawals_on_postgres() {
    let ledger = PgLedger::new().await;
    let account = ledger.account(dec!(400.00)).await;
    let workers = 5;
    let barrier = Arc::new(Barrier::new(workers));

    let mut tasks = Vec::new();
    for _ in 0..workers {
        let engine = Arc::clone(&ledger.engine);
        let barrier = Arc::clone(&barrier);
        tasks.push(tokio::spawn(async move {
            barrier.wait().await;
            engine
                .withdraw(account, amount(dec!(100.00)), meta(), &teller())
                .await
        }));
    }

    let mut committed = 0;
    for task in tasks {
        if task.await.unwrap().is_ok() {
            committed += 1;
        }
    }

    assert_eq!(committed, 4);
    assert_eq!(ledger.balance(account).await, dec!(0.00));
    assert!(ledger.engine.replay(account).await.unwrap().is_consistent());
}

#[tokio::test]
#[ignore]
async fn test_audit_traces_chain_in_database() {
    let ledger = PgLedger::new().await;
    let account = ledger.account(dec!(80.00)).await;
    ledger
        .engine
        .withdraw(account, amount(dec!(30.00)), meta(), &teller())
        .await
        .unwrap();
    ledger.audit.flush().await;

    // open, activate, then transaction + entry + balance
    assert_eq!(ledger.count("audit_traces").await, 5);

    let result = PgAuditSink::new(ledger.pool.clone())
        .verify_hash_chain(None)
        .await
        .unwrap();
    assert!(result.is_valid);
    assert_eq!(result.entries_checked, 5);
}
