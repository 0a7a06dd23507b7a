//! Per-account mutual exclusion
//!
//! Every balance read-modify-write runs while holding the lock of each
//! account it touches. Locks of several accounts are always taken in
//! ascending id order, so two transfers in opposite directions cannot
//! deadlock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::AccountId;

/// Lock table keyed by account id
#[derive(Debug, Default)]
pub struct AccountLocks {
    slots: Mutex<HashMap<AccountId, Arc<AsyncMutex<()>>>>,
}

/// Held locks; released on drop
#[derive(Debug)]
pub struct AccountLockGuard {
    ids: Vec<AccountId>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl AccountLockGuard {
    /// Locked ids, ascending
    pub fn ids(&self) -> &[AccountId] {
        &self.ids
    }
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to every account in `ids`
    pub async fn acquire(&self, ids: &[AccountId]) -> AccountLockGuard {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let mut guards = Vec::with_capacity(ids.len());
        for id in &ids {
            let slot = self.slot(*id);
            guards.push(slot.lock_owned().await);
        }

        AccountLockGuard {
            ids,
            _guards: guards,
        }
    }

    fn slot(&self, id: AccountId) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(id).or_default())
    }

    /// Drop slots nobody holds or waits on. Returns how many were removed.
    pub fn prune(&self) -> usize {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let before = slots.len();
        slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        before - slots.len()
    }

    /// Number of tracked slots
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_ids_sorted_and_deduplicated() {
        let locks = AccountLocks::new();
        let guard = locks.acquire(&[9, 2, 9, 5]).await;
        assert_eq!(guard.ids(), &[2, 5, 9]);
    }

    #[tokio::test]
    async fn test_same_account_is_exclusive() {
        let locks = Arc::new(AccountLocks::new());
        let guard = locks.acquire(&[1]).await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _g = locks.acquire(&[1]).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_accounts_do_not_block() {
        let locks = AccountLocks::new();
        let _a = locks.acquire(&[1]).await;

        tokio::time::timeout(Duration::from_millis(100), locks.acquire(&[2]))
            .await
            .expect("unrelated account should not wait");
    }

    #[tokio::test]
    async fn test_opposite_transfers_do_not_deadlock() {
        let locks = Arc::new(AccountLocks::new());

        let tasks: Vec<_> = (0..50)
            .map(|i| {
                let locks = Arc::clone(&locks);
                tokio::spawn(async move {
                    let ids = if i % 2 == 0 { [1, 2] } else { [2, 1] };
                    let _g = locks.acquire(&ids).await;
                    tokio::task::yield_now().await;
                })
            })
            .collect();

        for task in tasks {
            tokio::time::timeout(Duration::from_secs(5), task)
                .await
                .unwrap()
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_prune_removes_idle_slots() {
        let locks = AccountLocks::new();
        let held = locks.acquire(&[1]).await;
        drop(locks.acquire(&[2, 3]).await);

        assert_eq!(locks.len(), 3);
        assert_eq!(locks.prune(), 2);
        assert_eq!(locks.len(), 1);

        drop(held);
        assert_eq!(locks.prune(), 1);
        assert!(locks.is_empty());
    }
}
