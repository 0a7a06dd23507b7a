//! In-memory ledger store
//!
//! Used by tests and the load-test binary. A unit stages its writes and
//! applies them at commit under a single table lock. Each account carries a
//! version; commit refuses to apply if an account the unit wrote was changed
//! by someone else after the unit read it.
//!
//! Faults can be injected at each write step to exercise rollback paths.

use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::{
    Account, AccountId, AccountStatus, Balance, Client, ClientId, HistoryFilter, HistoryRow,
    LedgerEntry, LedgerEntryId, LedgerLine, NewAccount, NewClient, NewLedgerEntry,
    NewTransaction, Transaction, TransactionId,
};

use super::{AtomicUnit, LedgerStore, StoreError};

/// Step at which an injected fault fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    Begin,
    LockAccount,
    InsertTransaction,
    InsertLedgerEntry,
    UpdateBalance,
    Commit,
}

#[derive(Debug, Clone)]
struct StoredAccount {
    account: Account,
    version: u64,
}

#[derive(Debug, Default)]
struct Tables {
    clients: BTreeMap<ClientId, Client>,
    accounts: BTreeMap<AccountId, StoredAccount>,
    transactions: BTreeMap<TransactionId, Transaction>,
    entries: BTreeMap<LedgerEntryId, LedgerEntry>,
}

impl Tables {
    fn hydrate(&self, stored: &StoredAccount) -> Account {
        let mut account = stored.account.clone();
        let client_deleted = self
            .clients
            .get(&account.client_id())
            .map_or(true, |client| client.deleted);
        account.set_client_deleted(client_deleted);
        account
    }
}

#[derive(Debug)]
struct Inner {
    tables: Mutex<Tables>,
    /// Armed faults with the number of hits to let through first
    faults: Mutex<Vec<(FaultPoint, usize)>>,
    next_client: AtomicI64,
    next_account: AtomicI64,
    next_transaction: AtomicI64,
    next_entry: AtomicI64,
}

impl Inner {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fire (and consume) a pending fault for this step
    fn trip(&self, point: FaultPoint) -> Result<(), StoreError> {
        let mut faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pos) = faults.iter().position(|(p, _)| *p == point) {
            if faults[pos].1 > 0 {
                faults[pos].1 -= 1;
                return Ok(());
            }
            faults.remove(pos);
            tracing::debug!(?point, "Injected store fault");
            return Err(StoreError::Injected(point));
        }
        Ok(())
    }
}

/// In-memory ledger store. Cheap to clone; clones share the same data.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                tables: Mutex::new(Tables::default()),
                faults: Mutex::new(Vec::new()),
                next_client: AtomicI64::new(1),
                next_account: AtomicI64::new(1),
                next_transaction: AtomicI64::new(1),
                next_entry: AtomicI64::new(1),
            }),
        }
    }

    // =========================================================================
    // Seeding
    // =========================================================================

    /// Register a client directly.
    pub fn insert_client(&self, client: NewClient) -> Client {
        let id = self.inner.next_client.fetch_add(1, Ordering::SeqCst);
        let client = Client {
            id,
            last_name: client.last_name,
            first_name: client.first_name,
            national_id: client.national_id,
            address: client.address,
            email: client.email,
            phone: client.phone,
            deleted: false,
        };
        self.inner.tables().clients.insert(id, client.clone());
        client
    }

    /// Soft-delete a client. Its accounts stop being visible to the ledger.
    pub fn tag_client(&self, id: ClientId) -> bool {
        match self.inner.tables().clients.get_mut(&id) {
            Some(client) => {
                client.deleted = true;
                true
            }
            None => false,
        }
    }

    /// Arm a one-shot fault. The next unit reaching `point` fails there.
    pub fn inject_fault(&self, point: FaultPoint) {
        self.inject_fault_after(point, 0);
    }

    /// Arm a one-shot fault that lets `skip` hits of `point` succeed first,
    /// e.g. to fail the second balance update of a transfer.
    pub fn inject_fault_after(&self, point: FaultPoint, skip: usize) {
        self.inner
            .faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((point, skip));
    }

    pub fn transaction_count(&self) -> usize {
        self.inner.tables().transactions.len()
    }

    pub fn ledger_entry_count(&self) -> usize {
        self.inner.tables().entries.len()
    }
}

impl LedgerStore for MemoryStore {
    type Unit = MemoryUnit;

    async fn begin(&self) -> Result<MemoryUnit, StoreError> {
        self.inner.trip(FaultPoint::Begin)?;
        Ok(MemoryUnit {
            inner: Arc::clone(&self.inner),
            read_versions: HashMap::new(),
            working: HashMap::new(),
            dirty: Vec::new(),
            new_accounts: Vec::new(),
            transactions: Vec::new(),
            entries: Vec::new(),
            deleted_transactions: Vec::new(),
        })
    }

    async fn find_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let tables = self.inner.tables();
        Ok(tables.accounts.get(&id).map(|stored| tables.hydrate(stored)))
    }

    async fn find_client(&self, id: ClientId) -> Result<Option<Client>, StoreError> {
        Ok(self.inner.tables().clients.get(&id).cloned())
    }

    async fn account_ids(&self) -> Result<Vec<AccountId>, StoreError> {
        Ok(self.inner.tables().accounts.keys().copied().collect())
    }

    async fn account_ledger(&self, account_id: AccountId) -> Result<Vec<LedgerLine>, StoreError> {
        let tables = self.inner.tables();
        tables
            .entries
            .values()
            .filter(|entry| entry.account_id == account_id)
            .map(|entry| {
                let transaction = tables.transactions.get(&entry.transaction_id).ok_or_else(|| {
                    StoreError::Corrupt(format!(
                        "ledger entry {} references missing transaction {}",
                        entry.id, entry.transaction_id
                    ))
                })?;
                Ok(LedgerLine {
                    entry: entry.clone(),
                    kind: transaction.kind,
                    amount: transaction.amount,
                })
            })
            .collect()
    }

    async fn history(&self, filter: &HistoryFilter) -> Result<Vec<HistoryRow>, StoreError> {
        let tables = self.inner.tables();

        let entries_by_transaction: HashMap<TransactionId, &LedgerEntry> = tables
            .entries
            .values()
            .map(|entry| (entry.transaction_id, entry))
            .collect();

        let mut rows = Vec::new();
        for transaction in tables.transactions.values() {
            if filter.transaction_id.is_some_and(|id| id != transaction.id)
                || filter.account_id.is_some_and(|id| id != transaction.account_id)
                || !filter.matches_date(transaction.date)
            {
                continue;
            }

            let (Some(entry), Some(stored)) = (
                entries_by_transaction.get(&transaction.id),
                tables.accounts.get(&transaction.account_id),
            ) else {
                continue;
            };
            let account = &stored.account;

            if filter.client_id.is_some_and(|id| id != account.client_id()) {
                continue;
            }
            let Some(client) = tables.clients.get(&account.client_id()) else {
                continue;
            };

            rows.push(HistoryRow {
                client_id: client.id,
                client_last_name: client.last_name.clone(),
                client_first_name: client.first_name.clone(),
                client_national_id: client.national_id.clone(),
                client_address: client.address.clone(),
                client_email: client.email.clone(),
                client_phone: client.phone.clone(),
                account_id: account.id(),
                account_name: account.name().to_string(),
                account_description: account.description().map(str::to_string),
                account_balance: account.balance(),
                account_status: account.status(),
                transaction_id: transaction.id,
                transaction_name: transaction.name.clone(),
                transaction_description: transaction.description.clone(),
                transaction_date: transaction.date,
                transaction_kind: transaction.kind,
                transaction_amount: transaction.amount,
                entry_id: entry.id,
                balance_before: entry.balance_before,
                balance_after: entry.balance_after,
                recorded_at: entry.created_at,
            });
        }

        Ok(rows)
    }
}

/// Staged writes of one in-memory unit
#[derive(Debug)]
pub struct MemoryUnit {
    inner: Arc<Inner>,
    read_versions: HashMap<AccountId, u64>,
    /// Working copies of accounts touched by this unit
    working: HashMap<AccountId, Account>,
    dirty: Vec<AccountId>,
    new_accounts: Vec<Account>,
    transactions: Vec<Transaction>,
    entries: Vec<LedgerEntry>,
    deleted_transactions: Vec<TransactionId>,
}

impl MemoryUnit {
    /// Load an account into the working set, remembering the version read
    fn load(&mut self, id: AccountId) -> Option<&mut Account> {
        if !self.working.contains_key(&id) {
            let tables = self.inner.tables();
            let stored = tables.accounts.get(&id)?;
            let account = tables.hydrate(stored);
            self.read_versions.insert(id, stored.version);
            drop(tables);
            self.working.insert(id, account);
        }
        self.working.get_mut(&id)
    }

    fn touch(&mut self, id: AccountId) -> Result<&mut Account, StoreError> {
        if !self.dirty.contains(&id) {
            self.dirty.push(id);
        }
        self.load(id)
            .ok_or_else(|| StoreError::Missing(format!("account {id}")))
    }
}

impl AtomicUnit for MemoryUnit {
    async fn lock_account(&mut self, id: AccountId) -> Result<Option<Account>, StoreError> {
        self.inner.trip(FaultPoint::LockAccount)?;
        Ok(self.load(id).map(|account| account.clone()))
    }

    async fn insert_account(&mut self, account: NewAccount) -> Result<Account, StoreError> {
        let client_deleted = match self.inner.tables().clients.get(&account.client_id) {
            Some(client) => client.deleted,
            None => return Err(StoreError::Missing(format!("client {}", account.client_id))),
        };

        let id = self.inner.next_account.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let account = Account::from_store(
            id,
            account.name,
            account.description,
            account.opening_balance,
            AccountStatus::Inactive,
            account.client_id,
            false,
            client_deleted,
            now,
            now,
        );
        self.new_accounts.push(account.clone());
        Ok(account)
    }

    async fn insert_transaction(&mut self, transaction: NewTransaction) -> Result<Transaction, StoreError> {
        self.inner.trip(FaultPoint::InsertTransaction)?;

        let id = self.inner.next_transaction.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let transaction = Transaction {
            id,
            name: transaction.meta.name,
            description: transaction.meta.description,
            date: transaction.meta.date,
            kind: transaction.kind,
            amount: transaction.amount,
            account_id: transaction.account_id,
            created_at: now,
            updated_at: now,
        };
        self.transactions.push(transaction.clone());
        Ok(transaction)
    }

    async fn insert_ledger_entry(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry, StoreError> {
        self.inner.trip(FaultPoint::InsertLedgerEntry)?;

        let id = self.inner.next_entry.fetch_add(1, Ordering::SeqCst);
        let entry = LedgerEntry {
            id,
            balance_before: entry.balance_before,
            balance_after: entry.balance_after,
            account_id: entry.account_id,
            transaction_id: entry.transaction_id,
            created_at: Utc::now(),
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }

    async fn update_balance(&mut self, id: AccountId, balance: Balance) -> Result<(), StoreError> {
        self.inner.trip(FaultPoint::UpdateBalance)?;
        self.touch(id)?.set_balance(balance, Utc::now());
        Ok(())
    }

    async fn update_status(&mut self, id: AccountId, status: AccountStatus) -> Result<(), StoreError> {
        self.touch(id)?.set_status(status, Utc::now());
        Ok(())
    }

    async fn mark_deleted(&mut self, id: AccountId) -> Result<(), StoreError> {
        self.touch(id)?.mark_deleted(Utc::now());
        Ok(())
    }

    async fn delete_transaction(&mut self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        let found = self.inner.tables().transactions.get(&id).cloned();
        if found.is_some() && !self.deleted_transactions.contains(&id) {
            self.deleted_transactions.push(id);
        }
        Ok(found)
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.inner.trip(FaultPoint::Commit)?;

        let mut tables = self.inner.tables();

        // Compare-and-swap: every written account must be unchanged since read
        for id in &self.dirty {
            let current = tables.accounts.get(id).map(|stored| stored.version);
            if current != self.read_versions.get(id).copied() {
                return Err(StoreError::Conflict(*id));
            }
        }

        for id in &self.dirty {
            if let (Some(stored), Some(account)) = (tables.accounts.get_mut(id), self.working.get(id)) {
                stored.account = account.clone();
                stored.version += 1;
            }
        }

        for account in self.new_accounts {
            tables.accounts.insert(account.id(), StoredAccount { account, version: 0 });
        }
        for transaction in self.transactions {
            tables.transactions.insert(transaction.id, transaction);
        }
        for entry in self.entries {
            tables.entries.insert(entry.id, entry);
        }
        for id in self.deleted_transactions {
            tables.transactions.remove(&id);
            tables.entries.retain(|_, entry| entry.transaction_id != id);
        }

        Ok(())
    }
}
