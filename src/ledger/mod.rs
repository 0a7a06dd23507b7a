//! Ledger module
//!
//! The engine that moves balances, the guard that manages account
//! lifecycle, the lock table they share, and chain replay.

mod engine;
mod guard;
mod locks;
mod replay;

pub use engine::{LedgerEngine, TransferReceipt};
pub use guard::AccountGuard;
pub use locks::{AccountLockGuard, AccountLocks};
pub use replay::{replay, ChainBreak, ReplayReport};
