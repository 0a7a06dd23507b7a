//! Load Testing Tool
//!
//! Hammers one account with concurrent deposits and withdrawals on the
//! in-memory store, then replays its ledger chain.
//!
//! Run with: cargo run --bin load_test --release -- --workers 16 --ops 1000

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rust_decimal::Decimal;

use microfinance_ledger::audit::AuditNotifier;
use microfinance_ledger::domain::{
    Actor, Amount, Balance, LedgerError, NewAccount, NewClient, OperationContext, Role,
    TransactionMeta, TransactionType,
};
use microfinance_ledger::ledger::{AccountGuard, AccountLocks, LedgerEngine};
use microfinance_ledger::store::{LedgerStore, MemoryStore};

fn arg(args: &[String], flag: &str, default: u64) -> anyhow::Result<u64> {
    match args.iter().position(|a| a == flag) {
        None => Ok(default),
        Some(i) => {
            let raw = args
                .get(i + 1)
                .ok_or_else(|| anyhow::anyhow!("{} needs a value", flag))?;
            Ok(raw.parse()?)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let workers = arg(&args, "--workers", 8)?;
    let ops = arg(&args, "--ops", 500)?;

    println!("Load Test - {} workers x {} operations", workers, ops);

    let store = Arc::new(MemoryStore::new());
    let locks = Arc::new(AccountLocks::new());
    let engine = Arc::new(LedgerEngine::with_locks(
        Arc::clone(&store),
        Arc::clone(&locks),
        AuditNotifier::disabled(),
    ));
    let guard = AccountGuard::new(Arc::clone(&store), locks, AuditNotifier::disabled());
    let context = OperationContext::new().with_actor(Actor::new(0, Role::Admin));

    let client = store.insert_client(NewClient {
        last_name: "Load".into(),
        first_name: "Test".into(),
        ..NewClient::default()
    });
    let opening = Decimal::new(100_000, 2);
    let account = guard
        .open(
            NewAccount {
                client_id: client.id,
                name: "Load test".into(),
                description: None,
                opening_balance: Balance::new(opening)?,
            },
            &context,
        )
        .await?;
    let account_id = account.id();
    guard.activate(account_id, &context).await?;

    let deposited = Arc::new(AtomicU64::new(0));
    let withdrawn = Arc::new(AtomicU64::new(0));
    let rejected = Arc::new(AtomicU64::new(0));

    let start = Instant::now();
    let mut tasks = Vec::new();
    for worker in 0..workers {
        let engine = Arc::clone(&engine);
        let context = context.clone();
        let (deposited, withdrawn, rejected) =
            (Arc::clone(&deposited), Arc::clone(&withdrawn), Arc::clone(&rejected));

        tasks.push(tokio::spawn(async move {
            for op in 0..ops {
                // centimes; withdrawals are larger so some of them bounce
                let (kind, cents) = if (worker + op) % 3 == 0 {
                    (TransactionType::Deposit, 500 + op % 700)
                } else {
                    (TransactionType::Withdrawal, 900 + op % 1100)
                };
                let amount = Amount::new(Decimal::new(cents as i64, 2))?;
                let meta = TransactionMeta::new("Load", format!("worker {}", worker), Utc::now().date_naive());

                match engine.record(kind, account_id, amount, meta, &context).await {
                    Ok(_) if kind == TransactionType::Deposit => {
                        deposited.fetch_add(cents, Ordering::Relaxed);
                    }
                    Ok(_) => {
                        withdrawn.fetch_add(cents, Ordering::Relaxed);
                    }
                    Err(LedgerError::InsufficientFunds { .. }) => {
                        rejected.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => return Err(anyhow::Error::from(e)),
                }
            }
            Ok::<_, anyhow::Error>(())
        }));
    }

    for task in tasks {
        task.await??;
    }
    let elapsed = start.elapsed();

    let report = engine.replay(account_id).await?;
    let expected = opening
        + Decimal::new(deposited.load(Ordering::Relaxed) as i64, 2)
        - Decimal::new(withdrawn.load(Ordering::Relaxed) as i64, 2);
    let balance = store
        .find_account(account_id)
        .await?
        .map(|a| a.balance().value())
        .ok_or_else(|| anyhow::anyhow!("account {} vanished", account_id))?;

    let total = workers * ops;
    println!("\n=== Load Test Results ===");
    println!("Operations: {}", total);
    println!("Committed: {}", store.transaction_count());
    println!("Rejected (insufficient funds): {}", rejected.load(Ordering::Relaxed));
    println!("Final balance: {} (expected {})", balance, expected);
    println!("Entries replayed: {}", report.entries_checked);
    println!("Time: {:.2}s", elapsed.as_secs_f64());
    println!("Rate: {:.0} ops/sec", total as f64 / elapsed.as_secs_f64());

    if !report.is_consistent() {
        anyhow::bail!("ledger chain inconsistent: {:?}", report.breaks);
    }
    if balance != expected {
        anyhow::bail!("balance drifted: {} != {}", balance, expected);
    }

    println!("Ledger chain consistent");
    Ok(())
}
