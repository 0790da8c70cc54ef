use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TransferError>;

/// Boxed cause carried by [`TransferError::PersistenceFailure`].
pub type StoreCause = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Diagnostic, Debug)]
pub enum TransferError {
    #[error("invalid amount: {0}")]
    #[diagnostic(code(transfer::invalid_amount), help("amounts must be positive"))]
    InvalidAmount(i64),

    #[error("insufficient balance in account {account}: balance {balance}, requested {requested}")]
    #[diagnostic(code(transfer::insufficient_balance))]
    InsufficientBalance {
        account: String,
        balance: i64,
        requested: i64,
    },

    #[error("account not found: {0}")]
    #[diagnostic(code(transfer::not_found))]
    NotFound(String),

    #[error("balance overflow in account {account}")]
    #[diagnostic(code(transfer::overflow))]
    Overflow { account: String },

    #[error("timed out waiting for the lock on account {0}")]
    #[diagnostic(code(transfer::lock_timeout), help("the account is busy, retry later"))]
    LockTimeout(String),

    #[error("persistence failure: {0}")]
    #[diagnostic(
        code(transfer::persistence_failure),
        help("the outcome is unknown, re-read balances before retrying")
    )]
    PersistenceFailure(#[source] StoreCause),

    #[error("CSV error: {0}")]
    #[diagnostic(code(transfer::csv))]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    #[diagnostic(code(transfer::io))]
    Io(#[from] std::io::Error),

    #[error("{error} (rollback also failed)")]
    #[diagnostic(code(transfer::rollback_failed))]
    RollbackFailed {
        #[source]
        error: Box<TransferError>,
        #[related]
        rollback: Vec<TransferError>,
    },
}

impl TransferError {
    pub fn persistence(cause: impl Into<StoreCause>) -> Self {
        Self::PersistenceFailure(cause.into())
    }

    /// Rewraps any store error raised while writing or committing as a
    /// persistence failure. Errors that already are one pass through.
    pub fn into_persistence(self) -> Self {
        match self {
            Self::PersistenceFailure(_) => self,
            other => Self::PersistenceFailure(Box::new(other)),
        }
    }

    /// Keeps `self` as the reported failure and attaches the error raised by
    /// the rollback that followed it.
    pub fn with_failed_rollback(self, rollback: TransferError) -> Self {
        Self::RollbackFailed {
            error: Box::new(self),
            rollback: vec![rollback],
        }
    }

    /// The failure that aborted the operation, looking past a failed
    /// rollback.
    pub fn primary(&self) -> &TransferError {
        match self {
            Self::RollbackFailed { error, .. } => error.primary(),
            other => other,
        }
    }

    /// Rejections caused by the request itself; retrying unchanged input
    /// yields the same answer.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.primary(),
            Self::InvalidAmount(_)
                | Self::InsufficientBalance { .. }
                | Self::NotFound(_)
                | Self::Overflow { .. }
        )
    }

    pub fn is_retriable(&self) -> bool {
        matches!(self.primary(), Self::LockTimeout(_))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for TransferError {
    fn from(err: rocksdb::Error) -> Self {
        Self::persistence(err)
    }
}
