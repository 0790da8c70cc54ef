#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use transfer_engine::application::engine::TransferEngine;
use transfer_engine::config::EngineConfig;
use transfer_engine::domain::account::Account;
use transfer_engine::domain::ports::{AccountCache, AccountStore, UnitOfWork};
use transfer_engine::error::{Result, TransferError};
use transfer_engine::infrastructure::in_memory::{InMemoryAccountCache, InMemoryAccountStore};

pub fn seeded_store(accounts: &[(&str, i64)]) -> InMemoryAccountStore {
    InMemoryAccountStore::with_accounts(
        accounts
            .iter()
            .map(|&(id, balance)| Account::new(id, balance)),
    )
}

pub fn engine_over(
    store: impl AccountStore + 'static,
    cache: impl AccountCache + 'static,
) -> TransferEngine {
    TransferEngine::new(Arc::new(store), Arc::new(cache), &EngineConfig::default())
}

pub fn engine_with_config(
    store: impl AccountStore + 'static,
    cache: impl AccountCache + 'static,
    config: &EngineConfig,
) -> TransferEngine {
    TransferEngine::new(Arc::new(store), Arc::new(cache), config)
}

pub fn engine(store: &InMemoryAccountStore) -> TransferEngine {
    engine_over(store.clone(), InMemoryAccountCache::new())
}

/// Committed balance, read straight from the store.
pub async fn balance_of(store: &impl AccountStore, id: &str) -> i64 {
    store
        .find(id)
        .await
        .unwrap()
        .unwrap_or_else(|| panic!("account {id} should exist"))
        .balance
}

fn injected(what: &str) -> TransferError {
    TransferError::persistence(std::io::Error::other(format!("injected {what} failure")))
}

/// Wraps an in-memory store and fails chosen operations on demand.
#[derive(Clone, Default)]
pub struct FaultyStore {
    inner: InMemoryAccountStore,
    fail_save_of: Arc<std::sync::Mutex<Option<String>>>,
    fail_commit: Arc<AtomicBool>,
    fail_rollback: Arc<AtomicBool>,
    rollbacks: Arc<AtomicUsize>,
}

impl FaultyStore {
    pub fn new(inner: InMemoryAccountStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn fail_save_of(&self, id: &str) {
        *self.fail_save_of.lock().unwrap() = Some(id.to_owned());
    }

    pub fn fail_commit(&self, fail: bool) {
        self.fail_commit.store(fail, Ordering::SeqCst);
    }

    pub fn fail_rollback(&self, fail: bool) {
        self.fail_rollback.store(fail, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        *self.fail_save_of.lock().unwrap() = None;
        self.fail_commit(false);
        self.fail_rollback(false);
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountStore for FaultyStore {
    async fn begin<'a>(&'a self) -> Result<Box<dyn UnitOfWork + 'a>> {
        Ok(Box::new(FaultyUnit {
            inner: self.inner.begin().await?,
            store: self,
        }))
    }

    async fn find(&self, id: &str) -> Result<Option<Account>> {
        self.inner.find(id).await
    }

    async fn all(&self) -> Result<Vec<Account>> {
        self.inner.all().await
    }
}

struct FaultyUnit<'a> {
    inner: Box<dyn UnitOfWork + 'a>,
    store: &'a FaultyStore,
}

#[async_trait]
impl<'a> UnitOfWork for FaultyUnit<'a> {
    async fn find_for_update(&mut self, id: &str) -> Result<Account> {
        self.inner.find_for_update(id).await
    }

    async fn save(&mut self, account: &Account) -> Result<()> {
        let doomed =
            self.store.fail_save_of.lock().unwrap().as_deref() == Some(account.id.as_str());
        if doomed {
            return Err(injected("save"));
        }
        self.inner.save(account).await
    }

    async fn commit(&mut self) -> Result<()> {
        if self.store.fail_commit.load(Ordering::SeqCst) {
            return Err(injected("commit"));
        }
        self.inner.commit().await
    }

    async fn rollback(&mut self) -> Result<()> {
        self.store.rollbacks.fetch_add(1, Ordering::SeqCst);
        self.inner.rollback().await?;
        if self.store.fail_rollback.load(Ordering::SeqCst) {
            return Err(injected("rollback"));
        }
        Ok(())
    }
}

/// Wraps an in-memory store and, once armed, parks the next `find` right
/// after it has read the row.
#[derive(Clone, Default)]
pub struct StallingStore {
    inner: InMemoryAccountStore,
    armed: Arc<AtomicBool>,
    parked: Arc<Notify>,
    resume: Arc<Notify>,
}

impl StallingStore {
    pub fn new(inner: InMemoryAccountStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Resolves once an armed `find` holds its row.
    pub async fn parked(&self) {
        self.parked.notified().await;
    }

    pub fn resume(&self) {
        self.resume.notify_one();
    }
}

#[async_trait]
impl AccountStore for StallingStore {
    async fn begin<'a>(&'a self) -> Result<Box<dyn UnitOfWork + 'a>> {
        self.inner.begin().await
    }

    async fn find(&self, id: &str) -> Result<Option<Account>> {
        let found = self.inner.find(id).await?;
        if self.armed.swap(false, Ordering::SeqCst) {
            self.parked.notify_one();
            self.resume.notified().await;
        }
        Ok(found)
    }

    async fn all(&self) -> Result<Vec<Account>> {
        self.inner.all().await
    }
}

/// Cache whose calls either fail outright or never complete.
#[derive(Clone, Copy)]
pub enum BrokenCache {
    Failing,
    Hanging,
}

#[async_trait]
impl AccountCache for BrokenCache {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        self.misbehave().await
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<()> {
        self.misbehave().await
    }

    async fn invalidate(&self, _key: &str) -> Result<()> {
        self.misbehave().await
    }
}

impl BrokenCache {
    async fn misbehave<T>(&self) -> Result<T> {
        match self {
            Self::Failing => Err(injected("cache")),
            Self::Hanging => std::future::pending().await,
        }
    }
}
