use crate::error::Result;
use crate::locks::{KeyLock, LockTable};
use std::time::Duration;

/// Serializes transfers that share an account while letting disjoint ones
/// run in parallel.
///
/// Both accounts are locked in lexicographic order of their ids, so two
/// transfers over the same pair always contend on the same first lock and
/// circular waits cannot form.
#[derive(Clone, Default)]
pub struct ConcurrencyGuard {
    locks: LockTable,
}

impl ConcurrencyGuard {
    pub fn new(lock_timeout: Option<Duration>) -> Self {
        Self {
            locks: LockTable::with_timeout(lock_timeout),
        }
    }

    /// Takes exclusive access to both accounts. A self-transfer takes its
    /// single lock once.
    pub async fn acquire(&self, from: &str, to: &str) -> Result<TransferPermit> {
        let (first, second) = canonical_order(from, to);

        let first = self.locks.lock(first).await?;
        let second = match second {
            Some(id) => Some(self.locks.lock(id).await?),
            None => None,
        };

        Ok(TransferPermit {
            _first: first,
            _second: second,
        })
    }

    pub fn held_slots(&self) -> usize {
        self.locks.len()
    }
}

/// Proof that both accounts of one transfer are held. Dropping it releases
/// them.
#[derive(Debug)]
pub struct TransferPermit {
    _first: KeyLock,
    _second: Option<KeyLock>,
}

/// Orders two ids; the second is `None` when both name the same account.
pub fn canonical_order<'a>(a: &'a str, b: &'a str) -> (&'a str, Option<&'a str>) {
    match a.cmp(b) {
        std::cmp::Ordering::Less => (a, Some(b)),
        std::cmp::Ordering::Greater => (b, Some(a)),
        std::cmp::Ordering::Equal => (a, None),
    }
}
