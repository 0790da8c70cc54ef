use crate::domain::account::Account;
use crate::domain::ports::{AccountCache, AccountStore, UnitOfWork};
use crate::error::{Result, TransferError};
use crate::locks::{KeyLock, LockTable};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// A thread-safe in-memory account store with transactional units of work.
///
/// Committed balances live in `Arc<RwLock<HashMap<String, i64>>>`. Every row
/// a unit reads for update or writes is locked until the unit ends, and its
/// writes are staged and applied in one step on commit. Strict two-phase
/// locking over the touched rows makes units serializable.
#[derive(Default, Clone)]
pub struct InMemoryAccountStore {
    accounts: Arc<RwLock<HashMap<String, i64>>>,
    rows: LockTable,
}

impl InMemoryAccountStore {
    /// Creates a new, empty in-memory account store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-provisioned with `accounts`.
    pub fn with_accounts(accounts: impl IntoIterator<Item = Account>) -> Self {
        let committed = accounts
            .into_iter()
            .map(|account| (account.id, account.balance))
            .collect();
        Self {
            accounts: Arc::new(RwLock::new(committed)),
            rows: LockTable::new(),
        }
    }

    /// Bounds how long a unit waits for a row held by another unit. Call
    /// before the store is cloned; clones share the row lock table.
    pub fn with_lock_timeout(self, timeout: Duration) -> Self {
        Self {
            rows: LockTable::with_timeout(Some(timeout)),
            ..self
        }
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn begin<'a>(&'a self) -> Result<Box<dyn UnitOfWork + 'a>> {
        Ok(Box::new(InMemoryUnit {
            accounts: Arc::clone(&self.accounts),
            rows: self.rows.clone(),
            locked: Vec::new(),
            staged: HashMap::new(),
        }))
    }

    async fn find(&self, id: &str) -> Result<Option<Account>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.get(id).map(|&balance| Account::new(id, balance)))
    }

    async fn all(&self) -> Result<Vec<Account>> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .iter()
            .map(|(id, &balance)| Account::new(id.clone(), balance))
            .collect())
    }
}

/// Unit of work over [`InMemoryAccountStore`]. Dropping it releases its rows
/// and forgets its staged writes.
struct InMemoryUnit {
    accounts: Arc<RwLock<HashMap<String, i64>>>,
    rows: LockTable,
    locked: Vec<KeyLock>,
    staged: HashMap<String, i64>,
}

impl InMemoryUnit {
    async fn lock_row(&mut self, id: &str) -> Result<()> {
        if !self.locked.iter().any(|row| row.id() == id) {
            let row = self.rows.lock(id).await?;
            self.locked.push(row);
        }
        Ok(())
    }

    fn finish(&mut self) {
        self.staged.clear();
        self.locked.clear();
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnit {
    async fn find_for_update(&mut self, id: &str) -> Result<Account> {
        self.lock_row(id).await?;

        if let Some(&balance) = self.staged.get(id) {
            return Ok(Account::new(id, balance));
        }

        let committed = self.accounts.read().await.get(id).copied();
        match committed {
            Some(balance) => Ok(Account::new(id, balance)),
            None => {
                self.locked.retain(|row| row.id() != id);
                Err(TransferError::NotFound(id.to_owned()))
            }
        }
    }

    async fn save(&mut self, account: &Account) -> Result<()> {
        self.lock_row(&account.id).await?;
        self.staged.insert(account.id.clone(), account.balance);
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        {
            let mut accounts = self.accounts.write().await;
            accounts.extend(self.staged.drain());
        }
        self.finish();
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.finish();
        Ok(())
    }
}

/// A thread-safe in-memory cache with per-entry expiry.
///
/// Expired entries are dropped lazily on read. Time is measured with
/// `tokio::time::Instant`, so tests can drive expiry with a paused clock.
/// A TTL too large to represent as an instant never expires.
#[derive(Default, Clone)]
pub struct InMemoryAccountCache {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self) -> bool {
        self.expires_at.is_none_or(|at| Instant::now() < at)
    }
}

impl InMemoryAccountCache {
    /// Creates a new, empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountCache for InMemoryAccountCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if entry.is_live() => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| !entry.is_live()) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.write().await;
        let entry = Entry {
            value,
            expires_at: Instant::now().checked_add(ttl),
        };
        entries.insert(key.to_owned(), entry);
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }
}
