use crate::domain::account::Account;
use crate::domain::ports::{AccountStore, UnitOfWork};
use crate::error::{Result, TransferError};
use async_trait::async_trait;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, ErrorKind, IteratorMode, Options, Transaction,
    TransactionDB, TransactionDBOptions, TransactionOptions, WriteOptions,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Column Family for storing account states.
pub const CF_ACCOUNTS: &str = "accounts";

/// A persistent account store on a RocksDB `TransactionDB`.
///
/// Units of work are pessimistic RocksDB transactions: `find_for_update`
/// takes an exclusive key lock that is held until commit or rollback, which
/// serializes every pair of units touching the same account. Rows are
/// JSON-encoded `Account` values keyed by the account id.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<TransactionDB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<TransactionDB>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    /// * `lock_timeout` - Bound on waiting for a key held by another
    ///   transaction. `None` waits indefinitely.
    pub fn open<P: AsRef<Path>>(path: P, lock_timeout: Option<Duration>) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let mut txn_db_opts = TransactionDBOptions::default();
        txn_db_opts.set_txn_lock_timeout(lock_timeout_millis(lock_timeout));

        let cf_accounts = ColumnFamilyDescriptor::new(CF_ACCOUNTS, Options::default());
        let db = TransactionDB::open_cf_descriptors(&opts, &txn_db_opts, path, vec![cf_accounts])?;

        Ok(Self { db: Arc::new(db) })
    }
}

/// RocksDB reads a negative lock timeout as "wait forever"; its own default
/// would give up after one second.
fn lock_timeout_millis(lock_timeout: Option<Duration>) -> i64 {
    lock_timeout.map_or(-1, |timeout| {
        i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX)
    })
}

fn accounts_cf(db: &TransactionDB) -> Result<&ColumnFamily> {
    db.cf_handle(CF_ACCOUNTS).ok_or_else(|| {
        TransferError::persistence(std::io::Error::other("Accounts column family not found"))
    })
}

fn encode(account: &Account) -> Result<Vec<u8>> {
    serde_json::to_vec(account).map_err(|e| {
        TransferError::persistence(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Serialization error: {}", e),
        ))
    })
}

fn decode(bytes: &[u8]) -> Result<Account> {
    serde_json::from_slice(bytes).map_err(|e| {
        TransferError::persistence(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Deserialization error: {}", e),
        ))
    })
}

/// Lock waits surface as `LockTimeout`; everything else is a persistence
/// failure.
fn key_error(id: &str, err: rocksdb::Error) -> TransferError {
    match err.kind() {
        ErrorKind::TimedOut | ErrorKind::Busy => TransferError::LockTimeout(id.to_owned()),
        _ => TransferError::persistence(err),
    }
}

#[async_trait]
impl AccountStore for RocksDBStore {
    async fn begin<'a>(&'a self) -> Result<Box<dyn UnitOfWork + 'a>> {
        let mut txn_opts = TransactionOptions::default();
        txn_opts.set_deadlock_detect(true);
        let txn = self.db.transaction_opt(&WriteOptions::default(), &txn_opts);

        Ok(Box::new(RocksDBUnit {
            db: self.db.as_ref(),
            txn: Some(txn),
        }))
    }

    async fn find(&self, id: &str) -> Result<Option<Account>> {
        let cf = accounts_cf(&self.db)?;
        match self.db.get_cf(cf, id.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn all(&self) -> Result<Vec<Account>> {
        let cf = accounts_cf(&self.db)?;

        let mut accounts = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            accounts.push(decode(&value)?);
        }
        Ok(accounts)
    }
}

/// A live RocksDB transaction. `None` once committed or rolled back.
struct RocksDBUnit<'db> {
    db: &'db TransactionDB,
    txn: Option<Transaction<'db, TransactionDB>>,
}

impl<'db> RocksDBUnit<'db> {
    fn txn(&self) -> Result<&Transaction<'db, TransactionDB>> {
        self.txn.as_ref().ok_or_else(|| {
            TransferError::persistence(std::io::Error::other("unit of work already finished"))
        })
    }
}

#[async_trait]
impl<'db> UnitOfWork for RocksDBUnit<'db> {
    async fn find_for_update(&mut self, id: &str) -> Result<Account> {
        let cf = accounts_cf(self.db)?;
        let bytes = self
            .txn()?
            .get_for_update_cf(cf, id.as_bytes(), true)
            .map_err(|e| key_error(id, e))?
            .ok_or_else(|| TransferError::NotFound(id.to_owned()))?;
        decode(&bytes)
    }

    async fn save(&mut self, account: &Account) -> Result<()> {
        let cf = accounts_cf(self.db)?;
        let value = encode(account)?;
        self.txn()?
            .put_cf(cf, account.id.as_bytes(), value)
            .map_err(|e| key_error(&account.id, e))
    }

    async fn commit(&mut self) -> Result<()> {
        let txn = self.txn.take().ok_or_else(|| {
            TransferError::persistence(std::io::Error::other("unit of work already finished"))
        })?;
        txn.commit()?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        // A consumed (committed or failed) transaction has nothing left to undo.
        if let Some(txn) = self.txn.take() {
            txn.rollback()?;
        }
        Ok(())
    }
}
