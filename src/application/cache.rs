use super::guard::ConcurrencyGuard;
use crate::domain::account::Account;
use crate::domain::ports::{AccountCacheRef, AccountStoreRef};
use crate::error::{Result, TransferError};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Read-through, write-through cache in front of the account store.
///
/// Only [`CacheLayer::lookup`] may answer from the cache. Reads that precede
/// a write go through [`crate::domain::ports::UnitOfWork::find_for_update`]
/// instead, so a cached snapshot never feeds a balance mutation.
///
/// The layer shares the engine's [`ConcurrencyGuard`]. Transfers refresh the
/// cache under it, and a lookup miss reads and populates under it too, so
/// every write of an account's entry happens in commit order.
#[derive(Clone)]
pub struct CacheLayer {
    cache: AccountCacheRef,
    store: AccountStoreRef,
    guard: ConcurrencyGuard,
    ttl: Duration,
    timeout: Duration,
}

impl CacheLayer {
    pub fn new(
        cache: AccountCacheRef,
        store: AccountStoreRef,
        guard: ConcurrencyGuard,
        ttl: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            cache,
            store,
            guard,
            ttl,
            timeout,
        }
    }

    /// Returns the account for display purposes, preferring the cache.
    pub async fn lookup(&self, id: &str) -> Result<Account> {
        let key = cache_key(id);

        if let Some(bytes) = self.bounded(self.cache.get(&key)).await.flatten() {
            match serde_json::from_slice::<Account>(&bytes) {
                Ok(account) => return Ok(account),
                Err(e) => warn!(account = id, error = %e, "discarding undecodable cache entry"),
            }
        }

        let _permit = self.guard.acquire(id, id).await?;
        let account = self
            .store
            .find(id)
            .await?
            .ok_or_else(|| TransferError::NotFound(id.to_owned()))?;
        self.refresh(&account).await;
        Ok(account)
    }

    /// Stores a fresh snapshot. Falls back to dropping the entry when the
    /// write fails; never fails the caller.
    pub async fn refresh(&self, account: &Account) {
        let key = cache_key(&account.id);

        let stored = match serde_json::to_vec(account) {
            Ok(bytes) => self
                .bounded(self.cache.set(&key, bytes, self.ttl))
                .await
                .is_some(),
            Err(e) => {
                warn!(account = %account.id, error = %e, "failed to encode account snapshot");
                false
            }
        };

        if !stored && self.bounded(self.cache.invalidate(&key)).await.is_none() {
            warn!(account = %account.id, "cache entry may be stale until it expires");
        }
    }

    pub async fn invalidate(&self, id: &str) {
        if self.bounded(self.cache.invalidate(&cache_key(id))).await.is_none() {
            warn!(account = id, "failed to invalidate cache entry");
        }
    }

    /// Runs a cache call under the configured timeout. Errors and timeouts
    /// both come back as `None`.
    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Option<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!(error = %e, "cache call failed");
                None
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "cache call timed out");
                None
            }
        }
    }
}

pub fn cache_key(id: &str) -> String {
    format!("account:{id}")
}
