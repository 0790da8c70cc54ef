use crate::domain::account::Account;
use crate::error::Result;
use std::io::Write;

/// Writes the final `id,balance` report.
pub struct AccountWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AccountWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Writes every account, ordered by id so reports are reproducible.
    pub fn write_accounts(&mut self, mut accounts: Vec<Account>) -> Result<()> {
        accounts.sort_by(|a, b| a.id.cmp(&b.id));
        for account in accounts {
            self.writer.serialize(account)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_sorts_by_id() {
        let mut out = Vec::new();
        AccountWriter::new(&mut out)
            .write_accounts(vec![Account::new("acc2", 80), Account::new("acc1", 70)])
            .unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "id,balance\nacc1,70\nacc2,80\n");
    }
}
