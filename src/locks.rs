use crate::error::{Result, TransferError};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

type Slots = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Exclusive async locks keyed by account id.
///
/// Slots are created on first use and dropped again once nobody holds or
/// waits for them, so the table stays proportional to in-flight work.
#[derive(Clone, Default)]
pub struct LockTable {
    slots: Slots,
    timeout: Option<Duration>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds every wait; an expired wait fails with `LockTimeout`.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self {
            slots: Slots::default(),
            timeout,
        }
    }

    pub async fn lock(&self, id: &str) -> Result<KeyLock> {
        // The shard guard from `entry` must be gone before awaiting.
        let slot = self.slots.entry(id.to_owned()).or_default().value().clone();

        let guard = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, slot.lock_owned())
                .await
                .map_err(|_| TransferError::LockTimeout(id.to_owned()))?,
            None => slot.lock_owned().await,
        };

        Ok(KeyLock {
            id: id.to_owned(),
            slots: Arc::clone(&self.slots),
            guard: Some(guard),
        })
    }

    /// Number of live slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Held lock on one key. Released on drop.
pub struct KeyLock {
    id: String,
    slots: Slots,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyLock {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for KeyLock {
    fn drop(&mut self) {
        let guard = self.guard.take();
        // Two references left means the table and our guard: no waiter can
        // clone the slot while the shard is locked by `remove_if`.
        self.slots
            .remove_if(self.id.as_str(), |_, slot| Arc::strong_count(slot) == 2);
        drop(guard);
    }
}

impl std::fmt::Debug for KeyLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyLock").field("id", &self.id).finish()
    }
}
