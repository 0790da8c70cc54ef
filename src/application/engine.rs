use super::cache::CacheLayer;
use super::guard::{ConcurrencyGuard, canonical_order};
use crate::config::EngineConfig;
use crate::domain::account::{self, Account};
use crate::domain::ports::{AccountCacheRef, AccountStoreRef, UnitOfWork};
use crate::domain::transfer::TransferRequest;
use crate::error::{Result, TransferError};

/// Executes point-to-point transfers.
///
/// Each call runs one sequential pipeline: validate, lock both accounts,
/// open a unit of work, load both rows for update, apply the arithmetic,
/// save, commit, refresh the cache, release. Every early exit rolls the unit
/// back, and the account locks are released on every path because they are
/// held by a scoped permit.
///
/// The engine is `Sync`; share it behind an `Arc` across request tasks.
pub struct TransferEngine {
    store: AccountStoreRef,
    cache: CacheLayer,
    guard: ConcurrencyGuard,
}

impl TransferEngine {
    /// Creates a new `TransferEngine`.
    ///
    /// # Arguments
    ///
    /// * `store` - The transactional source of truth.
    /// * `cache` - Snapshot cache placed in front of `store` for lookups.
    /// * `config` - Cache and lock tunables.
    pub fn new(store: AccountStoreRef, cache: AccountCacheRef, config: &EngineConfig) -> Self {
        let guard = ConcurrencyGuard::new(config.lock_timeout);
        Self {
            cache: CacheLayer::new(
                cache,
                store.clone(),
                guard.clone(),
                config.cache_ttl,
                config.cache_timeout,
            ),
            guard,
            store,
        }
    }

    /// Moves `amount` from `from` to `to`.
    ///
    /// A `PersistenceFailure` means the outcome is unknown: re-read balances
    /// before deciding whether to retry.
    pub async fn execute(&self, from: &str, to: &str, amount: i64) -> Result<()> {
        if amount <= 0 {
            return Err(TransferError::InvalidAmount(amount));
        }

        let _permit = self.guard.acquire(from, to).await?;
        let mut unit = self
            .store
            .begin()
            .await
            .map_err(TransferError::into_persistence)?;

        let updated = match apply(unit.as_mut(), from, to, amount).await {
            Ok(updated) => updated,
            Err(e) => return Err(abort(unit.as_mut(), e).await),
        };

        if let Err(e) = unit.commit().await {
            return Err(abort(unit.as_mut(), e.into_persistence()).await);
        }
        drop(unit);

        // Still under the permit, so concurrent transfers on the same account
        // refresh the cache in commit order.
        for account in &updated {
            self.cache.refresh(account).await;
        }
        Ok(())
    }

    pub async fn submit(&self, request: &TransferRequest) -> Result<()> {
        self.execute(&request.from, &request.to, request.amount).await
    }

    /// Read-only balance lookup. May be served from the cache; a miss waits
    /// for in-flight transfers on `id`.
    pub async fn balance(&self, id: &str) -> Result<i64> {
        Ok(self.cache.lookup(id).await?.balance)
    }
}

/// Rolls `unit` back after `error`. A failing rollback is attached to
/// `error`, which stays the primary failure.
async fn abort(unit: &mut (dyn UnitOfWork + '_), error: TransferError) -> TransferError {
    match unit.rollback().await {
        Ok(()) => error,
        Err(rollback) => error.with_failed_rollback(rollback),
    }
}

/// Loads, mutates and saves within `unit`. Returns the accounts whose new
/// state must reach the cache after commit.
async fn apply(
    unit: &mut (dyn UnitOfWork + '_),
    from: &str,
    to: &str,
    amount: i64,
) -> Result<Vec<Account>> {
    let (first, second) = canonical_order(from, to);

    let Some(second) = second else {
        // Self-transfer: the debit and credit cancel out, but the account
        // must exist and cover the amount. Nothing is written.
        let mut account = unit.find_for_update(first).await?;
        account.withdraw(amount)?;
        account.deposit(amount)?;
        return Ok(Vec::new());
    };

    // Rows are locked in the same order as the guard so engines sharing a
    // store cannot deadlock on them.
    let first = unit.find_for_update(first).await?;
    let second = unit.find_for_update(second).await?;
    let (mut source, mut target) = if first.id == from {
        (first, second)
    } else {
        (second, first)
    };

    account::transfer(&mut source, &mut target, amount)?;

    unit.save(&source)
        .await
        .map_err(TransferError::into_persistence)?;
    unit.save(&target)
        .await
        .map_err(TransferError::into_persistence)?;

    Ok(vec![source, target])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::AccountStore;
    use crate::infrastructure::in_memory::{InMemoryAccountCache, InMemoryAccountStore};
    use std::sync::Arc;

    fn engine(store: &InMemoryAccountStore) -> TransferEngine {
        TransferEngine::new(
            Arc::new(store.clone()),
            Arc::new(InMemoryAccountCache::new()),
            &EngineConfig::default(),
        )
    }

    async fn committed(store: &InMemoryAccountStore, id: &str) -> i64 {
        store.find(id).await.unwrap().unwrap().balance
    }

    #[tokio::test]
    async fn test_successful_transfer() {
        let store = InMemoryAccountStore::with_accounts([
            Account::new("acc1", 100),
            Account::new("acc2", 50),
        ]);
        let engine = engine(&store);

        engine.execute("acc1", "acc2", 30).await.unwrap();

        assert_eq!(committed(&store, "acc1").await, 70);
        assert_eq!(committed(&store, "acc2").await, 80);
    }

    #[tokio::test]
    async fn test_transfer_towards_smaller_id() {
        let store = InMemoryAccountStore::with_accounts([
            Account::new("acc1", 100),
            Account::new("acc2", 50),
        ]);
        let engine = engine(&store);

        engine.execute("acc2", "acc1", 50).await.unwrap();

        assert_eq!(committed(&store, "acc1").await, 150);
        assert_eq!(committed(&store, "acc2").await, 0);
    }

    #[tokio::test]
    async fn test_invalid_amount_touches_nothing() {
        let store = InMemoryAccountStore::new();
        let engine = engine(&store);

        // Neither account exists: validation must fire first.
        assert!(matches!(
            engine.execute("x", "y", 0).await,
            Err(TransferError::InvalidAmount(0))
        ));
        assert!(matches!(
            engine.execute("x", "y", -1).await,
            Err(TransferError::InvalidAmount(-1))
        ));
    }

    #[tokio::test]
    async fn test_missing_target_rolls_back() {
        let store = InMemoryAccountStore::with_accounts([Account::new("acc1", 100)]);
        let engine = engine(&store);

        assert!(matches!(
            engine.execute("acc1", "nobody", 10).await,
            Err(TransferError::NotFound(ref id)) if id == "nobody"
        ));
        assert_eq!(committed(&store, "acc1").await, 100);
        assert!(store.find("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_self_transfer_is_noop() {
        let store = InMemoryAccountStore::with_accounts([Account::new("acc1", 100)]);
        let engine = engine(&store);

        engine.execute("acc1", "acc1", 60).await.unwrap();
        assert_eq!(committed(&store, "acc1").await, 100);

        assert!(matches!(
            engine.execute("acc1", "acc1", 101).await,
            Err(TransferError::InsufficientBalance { .. })
        ));
        assert!(matches!(
            engine.execute("ghost", "ghost", 1).await,
            Err(TransferError::NotFound(_))
        ));
        assert_eq!(committed(&store, "acc1").await, 100);
    }

    #[tokio::test]
    async fn test_balance_reflects_committed_transfer() {
        let store = InMemoryAccountStore::with_accounts([
            Account::new("acc1", 100),
            Account::new("acc2", 50),
        ]);
        let engine = engine(&store);

        // Warm the cache with the pre-transfer balances.
        assert_eq!(engine.balance("acc1").await.unwrap(), 100);
        assert_eq!(engine.balance("acc2").await.unwrap(), 50);

        engine
            .submit(&TransferRequest::new("acc1", "acc2", 30))
            .await
            .unwrap();

        assert_eq!(engine.balance("acc1").await.unwrap(), 70);
        assert_eq!(engine.balance("acc2").await.unwrap(), 80);
    }
}
