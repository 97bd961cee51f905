#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Single mutable ledger of a simulation run.
///
/// The balance is debited by the stake of every position at entry and credited with
/// `stake + realized_pnl` at close, so at every step
/// `balance == initial_balance + Σ realized_pnl - staked`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct Account {
    // Initial balance used for reset and the drawdown guard
    initial_balance: f64,
    // Available balance
    balance: f64,
    // Notional multiplier applied to each stake
    leverage: f64,
    // Fraction of the balance staked per entry
    risk_per_trade: f64,
    // Stakes of the currently open positions
    staked: f64,
    // Sum of realized profit and loss
    realized_pnl: f64,
}

impl Account {
    /// Creates a new account.
    /// Non-positive balances, non-positive leverage and risk fractions outside `(0, 1]`
    /// are rejected.
    pub fn new(balance: f64, leverage: f64, risk_per_trade: f64) -> Result<Self> {
        if balance <= 0.0 || !balance.is_finite() {
            return Err(Error::NegZeroBalance(balance));
        }
        if leverage <= 0.0 || !leverage.is_finite() {
            return Err(Error::InvalidLeverage(leverage));
        }
        if risk_per_trade <= 0.0 || risk_per_trade > 1.0 || !risk_per_trade.is_finite() {
            return Err(Error::InvalidRiskPerTrade(risk_per_trade));
        }

        Ok(Self {
            balance,
            leverage,
            risk_per_trade,
            staked: 0.0,
            realized_pnl: 0.0,
            initial_balance: balance,
        })
    }

    /// Returns the initial balance.
    pub fn initial_balance(&self) -> f64 {
        self.initial_balance
    }

    /// Returns the balance.
    pub fn balance(&self) -> f64 {
        self.balance
    }

    /// Returns the leverage.
    pub fn leverage(&self) -> f64 {
        self.leverage
    }

    /// Returns the fraction of the balance staked per entry.
    pub fn risk_per_trade(&self) -> f64 {
        self.risk_per_trade
    }

    /// Returns the funds staked in open positions.
    pub fn staked(&self) -> f64 {
        self.staked
    }

    /// Returns the sum of realized profit and loss.
    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    /// Returns the stake of the next entry (`balance × risk_per_trade`).
    pub fn next_stake(&self) -> f64 {
        self.balance * self.risk_per_trade
    }

    /// Returns true while the drawdown guard allows new entries.
    ///
    /// The guard compares against `initial_balance - balance × 0.5`, i.e. half of the
    /// *current* balance.
    pub fn can_open(&self) -> bool {
        self.balance > self.initial_balance - self.balance * 0.5
    }

    /// Returns true once the drawdown guard has tripped.
    pub fn drawdown_tripped(&self) -> bool {
        self.balance < self.initial_balance - self.balance * 0.5
    }

    /// Stakes funds for a new position.
    pub(crate) fn stake(&mut self, amount: f64) -> Result<()> {
        if amount <= 0.0 || !amount.is_finite() {
            return Err(Error::NegZeroBalance(amount));
        }
        self.balance -= amount;
        self.staked += amount;
        Ok(())
    }

    /// Releases a stake and credits the realized profit or loss.
    pub(crate) fn settle(&mut self, stake: f64, pnl: f64) -> Result<()> {
        if stake <= 0.0 {
            return Err(Error::NegZeroBalance(stake));
        }
        // tolerate rounding left over from repeated subtractions
        if self.staked - stake < -1e-9 {
            return Err(Error::UnlockBalance(self.staked, stake));
        }
        self.staked = (self.staked - stake).max(0.0);
        self.balance += stake + pnl;
        self.realized_pnl += pnl;
        Ok(())
    }

    /// Resets the account to its initial balance.
    pub(crate) fn reset(&mut self) {
        self.staked = 0.0;
        self.realized_pnl = 0.0;
        self.balance = self.initial_balance;
    }
}

#[cfg(test)]
#[test]
fn new_account_valid() {
    let account = Account::new(100.0, 10.0, 0.01).unwrap();
    assert_eq!(account.balance(), 100.0);
    assert_eq!(account.leverage(), 10.0);
    assert_eq!(account.staked, 0.0);
    assert_eq!(account.next_stake(), 1.0);
}

#[cfg(test)]
#[test]
fn new_account_invalid() {
    let result = Account::new(0.0, 10.0, 0.01);
    assert!(matches!(result, Err(Error::NegZeroBalance(_))));

    let result = Account::new(-10.0, 10.0, 0.01);
    assert!(matches!(result, Err(Error::NegZeroBalance(_))));

    let result = Account::new(100.0, -1.0, 0.01);
    assert!(matches!(result, Err(Error::InvalidLeverage(_))));

    let result = Account::new(100.0, 1.0, 0.0);
    assert!(matches!(result, Err(Error::InvalidRiskPerTrade(_))));

    let result = Account::new(100.0, 1.0, 1.5);
    assert!(matches!(result, Err(Error::InvalidRiskPerTrade(_))));
}

#[cfg(test)]
#[test]
fn stake_and_settle_profit() {
    let mut account = Account::new(100.0, 10.0, 0.2).unwrap();

    account.stake(20.0).unwrap();
    assert_eq!(account.balance, 80.0);
    assert_eq!(account.staked, 20.0);

    // 20.0 (stake) + 10.0 (profit)
    account.settle(20.0, 10.0).unwrap();
    assert_eq!(account.balance, 110.0);
    assert_eq!(account.staked, 0.0);
    assert_eq!(account.realized_pnl(), 10.0);
}

#[cfg(test)]
#[test]
fn stake_and_settle_loss() {
    let mut account = Account::new(100.0, 10.0, 0.2).unwrap();

    account.stake(20.0).unwrap();
    // the whole stake is lost
    account.settle(20.0, -20.0).unwrap();
    assert_eq!(account.balance, 80.0);
    assert_eq!(account.staked, 0.0);
    assert_eq!(account.realized_pnl(), -20.0);
}

#[cfg(test)]
#[test]
fn settle_more_than_staked() {
    let mut account = Account::new(100.0, 1.0, 0.1).unwrap();
    account.stake(10.0).unwrap();
    let result = account.settle(20.0, 0.0);
    assert!(matches!(result, Err(Error::UnlockBalance(_, _))));
}

#[cfg(test)]
#[test]
fn stake_invalid_amount() {
    let mut account = Account::new(100.0, 1.0, 0.1).unwrap();
    let result = account.stake(-10.0);
    assert!(matches!(result, Err(Error::NegZeroBalance(_))));
}

#[cfg(test)]
#[test]
fn drawdown_guard_uses_current_balance() {
    let mut account = Account::new(10_000.0, 1.0, 0.5).unwrap();
    assert!(account.can_open());
    assert!(!account.drawdown_tripped());

    // 7000 > 10000 - 3500
    account.stake(3_000.0).unwrap();
    assert!(account.can_open());

    // 6000 < 10000 - 3000 = 7000 but 6000 > 5000 (a fixed half of the initial balance)
    account.stake(1_000.0).unwrap();
    assert!(!account.can_open());
    assert!(account.drawdown_tripped());
}

#[cfg(test)]
#[test]
fn drawdown_guard_boundary() {
    // balance == initial - balance * 0.5 <=> balance == 2/3 initial
    let mut account = Account::new(300.0, 1.0, 0.5).unwrap();
    account.stake(100.0).unwrap();
    assert_eq!(account.balance(), 200.0);
    assert!(!account.can_open());
    assert!(!account.drawdown_tripped());
}

#[cfg(test)]
#[test]
fn reset_account() {
    let mut account = Account::new(100.0, 1.0, 0.1).unwrap();
    account.stake(20.0).unwrap();
    account.settle(20.0, 5.0).unwrap();
    account.stake(10.0).unwrap();

    account.reset();
    assert_eq!(account.staked, 0.0);
    assert_eq!(account.realized_pnl, 0.0);
    assert_eq!(account.balance, 100.0);
}
