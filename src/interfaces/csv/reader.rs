use crate::domain::account::Account;
use crate::domain::transfer::TransferRequest;
use crate::error::{Result, TransferError};
use serde::de::DeserializeOwned;
use std::io::Read;

/// Reads transfer requests or seed accounts from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record lengths,
/// and yields rows lazily so large inputs stream.
pub struct CsvSource<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CsvSource<R> {
    /// Creates a new `CsvSource` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Rows of `from,to,amount`.
    pub fn transfers(self) -> impl Iterator<Item = Result<TransferRequest>> {
        self.rows()
    }

    /// Rows of `id,balance`. Negative opening balances are rejected.
    pub fn accounts(self) -> impl Iterator<Item = Result<Account>> {
        self.rows::<Account>().map(|row| {
            let account = row?;
            if account.balance < 0 {
                return Err(TransferError::InvalidAmount(account.balance));
            }
            Ok(account)
        })
    }

    fn rows<T: DeserializeOwned>(self) -> impl Iterator<Item = Result<T>> {
        self.reader
            .into_deserialize::<T>()
            .map(|result| result.map_err(TransferError::from))
    }
}
