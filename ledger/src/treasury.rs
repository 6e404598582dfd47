//! Account balances backing escrow deposits and payouts.

use std::collections::HashMap;
use tracing::debug;

use crate::error::TreasuryError;
use crate::types::{Address, Amount};

/// Value-transfer collaborator consumed by the escrow ledger.
pub trait Treasury {
    fn balance_of(&self, account: &Address) -> Amount;

    /// Move `amount` between accounts. Fails without side effects.
    fn transfer(&mut self, from: &Address, to: &Address, amount: Amount)
        -> Result<(), TreasuryError>;
}

#[derive(Debug, Clone, Default)]
pub struct AccountBook {
    balances: HashMap<Address, Amount>,
}

impl AccountBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint `amount` into `account`, returning the new balance.
    pub fn credit(&mut self, account: &Address, amount: Amount) -> Result<Amount, TreasuryError> {
        let balance = self
            .balance_of(account)
            .checked_add(amount)
            .ok_or_else(|| TreasuryError::Overflow(account.clone()))?;
        self.balances.insert(account.clone(), balance);
        debug!(account = %account, amount = %amount, balance = %balance, "account credited");
        Ok(balance)
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&Address, Amount)> {
        self.balances.iter().map(|(account, balance)| (account, *balance))
    }
}

impl Treasury for AccountBook {
    fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), TreasuryError> {
        let from_balance = self.balance_of(from);
        if from_balance < amount {
            return Err(TreasuryError::InsufficientFunds {
                account: from.clone(),
                balance: from_balance,
                requested: amount,
            });
        }
        if amount == 0 || from == to {
            return Ok(());
        }

        let to_balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or_else(|| TreasuryError::Overflow(to.clone()))?;

        self.balances.insert(from.clone(), from_balance - amount);
        self.balances.insert(to.clone(), to_balance);
        debug!(from = %from, to = %to, amount = %amount, "funds transferred");
        Ok(())
    }
}
