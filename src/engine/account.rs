//! Capital bookkeeping across the run.

use crate::errors::{Error, Result};

use super::ledger::ClosedTrade;

/// Tracks starting capital and everything realized against it.
///
/// No cash is reserved for pending orders or open shorts; only settled
/// trades move the balance, so the portfolio value is always the initial
/// capital plus realized net P&L.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug)]
pub struct CapitalAccount {
    // Initial capital used for reset
    initial_capital: f64,
    // Net P&L realized by settled trades
    realized_pnl: f64,
    // Cumulative commission paid
    commission: f64,
}

impl CapitalAccount {
    /// Creates an account with the given starting capital.
    /// Non-positive capital is rejected.
    pub fn new(capital: f64) -> Result<Self> {
        if capital <= 0.0 || !capital.is_finite() {
            return Err(Error::NonPositiveCapital(capital));
        }

        Ok(Self {
            initial_capital: capital,
            realized_pnl: 0.0,
            commission: 0.0,
        })
    }

    /// Returns the starting capital.
    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    /// Net P&L realized so far.
    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    /// Commission paid so far.
    pub fn commission_paid(&self) -> f64 {
        self.commission
    }

    /// Current portfolio value: starting capital plus realized net P&L.
    pub fn portfolio_value(&self) -> f64 {
        self.initial_capital + self.realized_pnl
    }

    /// Books a settled trade.
    pub(crate) fn settle(&mut self, trade: &ClosedTrade) {
        self.realized_pnl += trade.net_pnl();
        self.commission += trade.commission();
    }

    /// Resets the account to its starting capital.
    pub(crate) fn reset(&mut self) {
        self.realized_pnl = 0.0;
        self.commission = 0.0;
    }
}

#[cfg(test)]
#[test]
fn new_account_valid_capital() {
    let account = CapitalAccount::new(100_000.0).unwrap();
    assert_eq!(account.initial_capital(), 100_000.0);
    assert_eq!(account.portfolio_value(), 100_000.0);
    assert_eq!(account.realized_pnl(), 0.0);
}

#[cfg(test)]
#[test]
fn new_account_invalid_capital() {
    assert!(matches!(CapitalAccount::new(0.0), Err(Error::NonPositiveCapital(_))));
    assert!(matches!(CapitalAccount::new(-10.0), Err(Error::NonPositiveCapital(_))));
    assert!(matches!(CapitalAccount::new(f64::NAN), Err(Error::NonPositiveCapital(_))));
}

#[cfg(test)]
#[test]
fn settle_moves_the_balance() {
    use super::exit::ExitReason;
    use super::order::PendingOrder;
    use super::position::Position;
    use chrono::NaiveDate;

    let config = crate::config::sample_config();
    let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
    let order = PendingOrder::new("AAA", 104.0, 96.0, day(1));
    let position = Position::open(&order, day(2), 1, 2.0, &config);
    let trade = ClosedTrade::new(
        &position,
        day(4),
        99.5,
        2,
        0.002,
        ExitReason::ProfitTarget {
            target_price: 99.84,
            achieved_pct: 4.3,
        },
    );

    let mut account = CapitalAccount::new(100_000.0).unwrap();
    account.settle(&trade);
    assert!((account.portfolio_value() - (100_000.0 + trade.net_pnl())).abs() < 1e-9);
    assert!((account.commission_paid() - trade.commission()).abs() < 1e-12);

    account.reset();
    assert_eq!(account.portfolio_value(), 100_000.0);
    assert_eq!(account.commission_paid(), 0.0);
}
