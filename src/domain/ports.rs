use super::account::Account;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Durable, transactional home of accounts.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Opens an isolated unit of work at the strongest isolation the backend
    /// offers.
    async fn begin<'a>(&'a self) -> Result<Box<dyn UnitOfWork + 'a>>;

    /// Reads committed state without taking any lock. Only for lookups that
    /// are not followed by a write.
    async fn find(&self, id: &str) -> Result<Option<Account>>;

    /// Committed snapshot of every account.
    async fn all(&self) -> Result<Vec<Account>>;
}

/// A transaction against an [`AccountStore`].
///
/// Dropping a unit that was neither committed nor rolled back discards its
/// writes and releases its row locks.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Reads the row and holds it exclusively until the unit ends.
    /// Fails with `NotFound` when no such account exists.
    async fn find_for_update(&mut self, id: &str) -> Result<Account>;

    /// Inserts or overwrites the account.
    async fn save(&mut self, account: &Account) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;

    /// Discards every write made under the unit. Safe to call at any time,
    /// including after a failed commit.
    async fn rollback(&mut self) -> Result<()>;
}

/// Key/blob cache with per-entry expiry.
#[async_trait]
pub trait AccountCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;
    async fn invalidate(&self, key: &str) -> Result<()>;
}

pub type AccountStoreRef = Arc<dyn AccountStore>;
pub type AccountCacheRef = Arc<dyn AccountCache>;
