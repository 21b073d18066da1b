use serde::{Deserialize, Serialize};

use crate::models::errors::LedgerError;

pub type AccountId = u64;
pub type BusinessId = u64;

/// A user's currency holding. Created lazily on the first ledger mutation;
/// `version` increments on every successful balance change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct Account {
    pub balance: u64,
    pub version: u64,
}

impl Account {
    pub fn credit(&mut self, amount: u64) -> Result<u64, LedgerError> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::InvalidInput("balance overflow".to_string()))?;
        self.version += 1;
        Ok(self.balance)
    }

    pub fn debit(&mut self, amount: u64) -> Result<u64, LedgerError> {
        if self.balance < amount {
            return Err(LedgerError::InsufficientBalance {
                available: self.balance,
                required: amount,
            });
        }
        self.balance -= amount;
        self.version += 1;
        Ok(self.balance)
    }
}
