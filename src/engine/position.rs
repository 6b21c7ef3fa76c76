//! Open short positions and the per-symbol registry.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::FracCalculus;
use crate::config::Config;
use crate::errors::{Error, Result};

use super::order::PendingOrder;

/// An open short position with its exit thresholds frozen at entry.
///
/// The stop distance is scaled by the ATR of the entry bar and never moves;
/// the profit target and the time-exit horizon are likewise fixed when the
/// fill happens. This replaces the usual drift of per-symbol lookup tables
/// with a single record per position.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    symbol: String,
    entry_date: NaiveDate,
    entry_index: usize,
    entry_price: f64,
    size: f64,
    stop_price: f64,
    target_price: f64,
    atr_at_entry: f64,
    time_exit_index: usize,
}

impl Position {
    /// Opens a position from a filled order.
    ///
    /// ### Arguments
    /// * `order` - The filled limit order; its limit price is the entry price.
    /// * `entry_date` - The fill date.
    /// * `entry_index` - Index of the fill date in the trading calendar.
    /// * `atr` - ATR of the entry bar, frozen for the position's lifetime.
    /// * `config` - Run parameters (stop multiplier, target, horizon).
    pub(crate) fn open(order: &PendingOrder, entry_date: NaiveDate, entry_index: usize, atr: f64, config: &Config) -> Self {
        let entry_price = order.limit_price();
        Self {
            symbol: order.symbol().to_owned(),
            entry_date,
            entry_index,
            entry_price,
            size: order.size(),
            stop_price: entry_price + config.atr_multiplier * atr,
            target_price: entry_price.sub_frac(config.profit_target_pct),
            atr_at_entry: atr,
            time_exit_index: entry_index + config.exit_time_days,
        }
    }

    /// Returns the ticker.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Returns the fill date.
    pub fn entry_date(&self) -> NaiveDate {
        self.entry_date
    }

    /// Returns the fill date's index in the trading calendar.
    pub fn entry_index(&self) -> usize {
        self.entry_index
    }

    /// Returns the entry (sale) price.
    pub fn entry_price(&self) -> f64 {
        self.entry_price
    }

    /// Returns the share quantity.
    pub fn size(&self) -> f64 {
        self.size
    }

    /// Short positions carry negative exposure.
    pub fn signed_size(&self) -> f64 {
        -self.size
    }

    /// Price at which the loss-cut triggers (close at or above it).
    pub fn stop_price(&self) -> f64 {
        self.stop_price
    }

    /// Price at which the profit target triggers (close at or below it).
    pub fn target_price(&self) -> f64 {
        self.target_price
    }

    /// ATR of the entry bar.
    pub fn atr_at_entry(&self) -> f64 {
        self.atr_at_entry
    }

    /// Calendar index at which the time exit triggers.
    pub fn time_exit_index(&self) -> usize {
        self.time_exit_index
    }

    /// Trading days held as of the calendar index `current_index`.
    pub fn days_held(&self, current_index: usize) -> usize {
        current_index.saturating_sub(self.entry_index)
    }
}

/// Tracks at most one open position per symbol.
#[derive(Debug, Default)]
pub struct PositionRegistry {
    open: BTreeMap<String, Position>,
}

impl PositionRegistry {
    /// Records a newly opened position.
    ///
    /// ### Returns
    /// Ok if recorded, or an error when the symbol already has one.
    pub fn open(&mut self, position: Position) -> Result<()> {
        if self.open.contains_key(position.symbol()) {
            return Err(Error::DuplicatePosition(position.symbol().to_owned()));
        }
        self.open.insert(position.symbol().to_owned(), position);
        Ok(())
    }

    /// Removes and returns the position for `symbol`.
    pub fn close(&mut self, symbol: &str) -> Result<Position> {
        self.open.remove(symbol).ok_or_else(|| Error::PositionNotFound(symbol.to_owned()))
    }

    /// True when `symbol` has an open position.
    pub fn has(&self, symbol: &str) -> bool {
        self.open.contains_key(symbol)
    }

    /// Returns the open position for `symbol`.
    pub fn get(&self, symbol: &str) -> Option<&Position> {
        self.open.get(symbol)
    }

    /// Returns the number of open positions.
    pub fn len(&self) -> usize {
        self.open.len()
    }

    /// True when no position is open.
    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    /// Iterates open positions in symbol order.
    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.open.values()
    }
}

#[cfg(test)]
fn sample_position(symbol: &str) -> Position {
    let config = crate::config::sample_config();
    let date = NaiveDate::from_ymd_opt(2024, 1, 9).unwrap();
    let order = PendingOrder::new(symbol, 104.0, 96.0, date.pred_opt().unwrap());
    Position::open(&order, date, 1, 2.0, &config)
}

#[cfg(test)]
#[test]
fn thresholds_frozen_at_entry() {
    let position = sample_position("AAA");
    assert_eq!(position.entry_price(), 104.0);
    assert_eq!(position.stop_price(), 110.0); // 104 + 3.0 * 2.0
    assert!((position.target_price() - 99.84).abs() < 1e-12); // 104 * 0.96
    assert_eq!(position.atr_at_entry(), 2.0);
    assert_eq!(position.time_exit_index(), 3); // entry index 1 + 2 days
    assert_eq!(position.signed_size(), -96.0);
}

#[cfg(test)]
#[test]
fn days_held_counts_trading_days() {
    let position = sample_position("AAA");
    assert_eq!(position.days_held(1), 0);
    assert_eq!(position.days_held(3), 2);
}

#[cfg(test)]
#[test]
fn one_position_per_symbol() {
    let mut registry = PositionRegistry::default();
    registry.open(sample_position("AAA")).unwrap();
    let result = registry.open(sample_position("AAA"));
    assert!(matches!(result, Err(Error::DuplicatePosition(_))));
    assert_eq!(registry.len(), 1);
}

#[cfg(test)]
#[test]
fn close_removes_the_position() {
    let mut registry = PositionRegistry::default();
    registry.open(sample_position("AAA")).unwrap();

    let position = registry.close("AAA").unwrap();
    assert_eq!(position.symbol(), "AAA");
    assert!(registry.is_empty());
    assert!(matches!(registry.close("AAA"), Err(Error::PositionNotFound(_))));
}
