use crate::error::{Result, TransferError};
use serde::{Deserialize, Serialize};

/// A balance-bearing account.
///
/// Balances are kept in the smallest currency unit. Committed state never
/// holds a negative balance; the arithmetic below refuses to produce one.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Account {
    /// Stable identifier, immutable after creation.
    pub id: String,
    pub balance: i64,
}

impl Account {
    pub fn new(id: impl Into<String>, balance: i64) -> Self {
        Self {
            id: id.into(),
            balance,
        }
    }

    /// Credits `amount`. Fails with `Overflow` rather than saturating.
    pub fn deposit(&mut self, amount: i64) -> Result<()> {
        if amount <= 0 {
            return Err(TransferError::InvalidAmount(amount));
        }

        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or_else(|| TransferError::Overflow {
                account: self.id.clone(),
            })?;
        Ok(())
    }

    /// Debits `amount` if the balance covers it.
    ///
    /// The amount is validated before the balance, so a non-positive amount
    /// is always reported as `InvalidAmount`.
    pub fn withdraw(&mut self, amount: i64) -> Result<()> {
        if amount <= 0 {
            return Err(TransferError::InvalidAmount(amount));
        }

        if self.balance < amount {
            return Err(TransferError::InsufficientBalance {
                account: self.id.clone(),
                balance: self.balance,
                requested: amount,
            });
        }

        self.balance -= amount;
        Ok(())
    }
}

/// Moves `amount` from `from` to `to`.
///
/// Either both sides change or neither does: a failed withdrawal leaves both
/// untouched, and a failed deposit puts the withdrawn amount back.
pub fn transfer(from: &mut Account, to: &mut Account, amount: i64) -> Result<()> {
    from.withdraw(amount)?;

    if let Err(e) = to.deposit(amount) {
        from.balance += amount;
        return Err(e);
    }
    Ok(())
}
