//! Scheduled Jobs
//!
//! Background jobs for periodic ledger maintenance.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

use crate::domain::{AccountId, LedgerError};
use crate::ledger::{AccountLocks, LedgerEngine};
use crate::store::LedgerStore;

// =========================================================================
// Ledger Chain Verification Job
// =========================================================================

/// Outcome of replaying every account chain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainSummary {
    pub accounts_checked: usize,
    pub entries_checked: usize,
    pub inconsistent_accounts: Vec<AccountId>,
}

/// Replay every account's ledger and log the ones whose chain is broken.
///
/// Transfers and administrative deletions leave gaps, so a break is a
/// finding to review rather than proof of corruption.
pub async fn verify_ledger_chains<S: LedgerStore>(
    engine: &LedgerEngine<S>,
) -> Result<ChainSummary, JobError> {
    let mut summary = ChainSummary::default();

    for account_id in engine.store().account_ids().await.map_err(LedgerError::from)? {
        let report = engine.replay(account_id).await?;
        summary.accounts_checked += 1;
        summary.entries_checked += report.entries_checked;

        if !report.is_consistent() {
            tracing::warn!(
                account_id,
                breaks = report.breaks.len(),
                account_balance = %report.account_balance,
                "Ledger chain inconsistent"
            );
            summary.inconsistent_accounts.push(account_id);
        }
    }

    tracing::info!(
        accounts_checked = summary.accounts_checked,
        entries_checked = summary.entries_checked,
        inconsistent = summary.inconsistent_accounts.len(),
        "Ledger chain verification finished"
    );

    Ok(summary)
}

// =========================================================================
// Account Lock Pruning Job
// =========================================================================

/// Drop lock slots no operation is holding
pub fn prune_account_locks(locks: &AccountLocks) -> usize {
    let pruned = locks.prune();
    if pruned > 0 {
        tracing::debug!(pruned, remaining = locks.len(), "Pruned idle account locks");
    }
    pruned
}

// =========================================================================
// Job Scheduler
// =========================================================================

/// Configuration for job scheduler
#[derive(Debug, Clone)]
pub struct JobSchedulerConfig {
    /// Interval for ledger chain verification; `None` disables it (default: 1 hour)
    pub chain_verification_interval: Option<Duration>,
    /// Interval for lock pruning (default: 1 minute)
    pub lock_prune_interval: Duration,
}

impl Default for JobSchedulerConfig {
    fn default() -> Self {
        Self {
            chain_verification_interval: Some(Duration::from_secs(3600)),
            lock_prune_interval: Duration::from_secs(60),
        }
    }
}

impl JobSchedulerConfig {
    /// Take the verification interval from `LEDGER_VERIFY_INTERVAL_SECS`
    pub fn from_verify_interval_secs(secs: u64) -> Self {
        Self {
            chain_verification_interval: (secs > 0).then(|| Duration::from_secs(secs)),
            ..Self::default()
        }
    }
}

/// Job Scheduler - runs periodic maintenance tasks
pub struct JobScheduler<S: LedgerStore> {
    engine: Arc<LedgerEngine<S>>,
    config: JobSchedulerConfig,
}

impl<S: LedgerStore> JobScheduler<S> {
    /// Create a new job scheduler
    pub fn new(engine: Arc<LedgerEngine<S>>) -> Self {
        Self {
            engine,
            config: JobSchedulerConfig::default(),
        }
    }

    /// Create with custom configuration
    pub fn with_config(engine: Arc<LedgerEngine<S>>, config: JobSchedulerConfig) -> Self {
        Self { engine, config }
    }

    /// Start the job scheduler in the background
    /// Returns a handle that can be used to abort the scheduler
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run the scheduler loop
    async fn run(&self) {
        tracing::info!(
            chain_verification_interval = ?self.config.chain_verification_interval,
            "Job scheduler started"
        );

        let mut prune_interval = interval(self.config.lock_prune_interval);
        let mut verify_interval = self.config.chain_verification_interval.map(interval);

        loop {
            tokio::select! {
                _ = prune_interval.tick() => {
                    prune_account_locks(self.engine.locks());
                }
                _ = tick(&mut verify_interval) => {
                    if let Err(e) = verify_ledger_chains(self.engine.as_ref()).await {
                        tracing::error!(error = %e, "Ledger chain verification failed");
                    }
                }
            }
        }
    }

    /// Run all maintenance jobs once (for manual trigger or testing)
    pub async fn run_all_once(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport {
            locks_pruned: prune_account_locks(self.engine.locks()),
            ..MaintenanceReport::default()
        };

        match verify_ledger_chains(self.engine.as_ref()).await {
            Ok(summary) => report.chains = summary,
            Err(e) => report.errors.push(format!("Chain verification: {}", e)),
        }

        report.completed_at = Utc::now();
        report
    }
}

/// Tick an optional interval; a disabled one never fires
async fn tick(interval: &mut Option<tokio::time::Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Report from running maintenance jobs
#[derive(Debug, Clone, Default)]
pub struct MaintenanceReport {
    pub locks_pruned: usize,
    pub chains: ChainSummary,
    pub errors: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

/// Job execution errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

// =========================================================================
// Tests
// =========================================================================
