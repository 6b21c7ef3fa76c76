//! Core simulation components.
//!
//! This module provides the fundamental types for the bar-driven run:
//! - `MarketData` / `PriceSeries`: per-symbol daily bars.
//! - `CandidateFeed`: ranked short candidates per date.
//! - `OrderBook`: one-bar limit orders and their resolution.
//! - `PositionRegistry`: open short positions with frozen exit thresholds.
//! - `EntryEngine` / `ExitEngine`: the per-date decision logic.
//! - `TradeLedger` / `CapitalAccount`: settled trades and cash.
//! - `Simulation`: the driver that walks the trading calendar.

mod account;
mod candidates;
mod entry;
mod exit;
mod ledger;
mod market;
mod order;
mod position;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::{debug, warn};

use crate::config::Config;
use crate::errors::{Error, Result};

pub use account::*;
pub use candidates::*;
pub use entry::*;
pub use exit::*;
pub use ledger::*;
pub use market::*;
pub use order::*;
pub use position::*;

#[cfg(test)]
mod sim;

/// Counters for recoverable conditions met during a run.
///
/// None of these halt the simulation; they are tallied here and reported
/// through the [`log`] facade as they happen.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SkipCounters {
    /// Symbol had no usable bar (entry, exit, or order resolution).
    pub data_gaps: u32,
    /// Computed order size rounded down to zero shares.
    pub zero_size: u32,
    /// Order filled but the ATR window was incomplete; dropped.
    pub atr_unavailable: u32,
    /// Orders that expired because the bar never reached the limit.
    pub unfilled_orders: u32,
    /// Fills dropped because the position cap was already reached.
    pub cap_blocked_fills: u32,
}

/// Signed position sizes per symbol at the end of one simulated date.
///
/// Positions closed during the date are still included: they were held over
/// the session, so the next date's P&L attribution needs them.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSnapshot {
    date: NaiveDate,
    signed_sizes: BTreeMap<String, f64>,
}

impl PositionSnapshot {
    #[cfg(test)]
    pub(crate) fn fixture(date: NaiveDate, signed_sizes: BTreeMap<String, f64>) -> Self {
        Self { date, signed_sizes }
    }

    /// Returns the snapshot date.
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Signed size per symbol (negative for shorts).
    pub fn signed_sizes(&self) -> &BTreeMap<String, f64> {
        &self.signed_sizes
    }

    /// Sum of signed sizes across symbols.
    pub fn aggregate(&self) -> f64 {
        self.signed_sizes.values().sum()
    }
}

/// The simulation driver.
///
/// Owns all run state and threads it through each simulated date in a fixed
/// order: resolve yesterday's orders, propose today's entries, evaluate
/// exits, settle closures, snapshot exposure. Dates advance strictly
/// forward; nothing revisits a past date.
#[derive(Debug)]
pub struct Simulation {
    config: Config,
    market: MarketData,
    candidates: CandidateFeed,
    calendar: Vec<NaiveDate>,
    cursor: usize,
    account: CapitalAccount,
    orders: OrderBook,
    registry: PositionRegistry,
    ledger: TradeLedger,
    snapshots: Vec<PositionSnapshot>,
    skips: SkipCounters,
}

impl Simulation {
    /// Creates a simulation over fully materialized inputs.
    ///
    /// ### Arguments
    /// * `config` - Validated run parameters (validation re-runs here).
    /// * `market` - Symbol universe with lead history for the ATR window.
    /// * `candidates` - Ranked candidate rows; dates outside the window are
    ///   simply never consulted.
    ///
    /// ### Returns
    /// The new simulation, or a fatal configuration/data error.
    pub fn new(config: Config, market: MarketData, candidates: CandidateFeed) -> Result<Self> {
        config.validate()?;
        if market.is_empty() {
            return Err(Error::MarketDataEmpty);
        }
        let calendar = market.calendar(config.start_date, config.end_date);
        if calendar.is_empty() {
            return Err(Error::EmptyCalendar(config.start_date, config.end_date));
        }
        let account = CapitalAccount::new(config.capital)?;

        Ok(Self {
            config,
            market,
            candidates,
            calendar,
            cursor: 0,
            account,
            orders: OrderBook::default(),
            registry: PositionRegistry::default(),
            ledger: TradeLedger::default(),
            snapshots: Vec::new(),
            skips: SkipCounters::default(),
        })
    }

    /// Runs the simulation over every date in the trading calendar.
    pub fn run(&mut self) -> Result<()> {
        while self.cursor < self.calendar.len() {
            self.step(self.cursor)?;
            self.cursor += 1;
        }
        Ok(())
    }

    /// Simulates one date.
    fn step(&mut self, index: usize) -> Result<()> {
        let date = self.calendar[index];

        // 1. resolve yesterday's pending orders
        let resolution = self.orders.resolve(date, index, &self.market, &self.config);
        for position in resolution.filled {
            if self.registry.len() >= self.config.active_positions_cap {
                warn!("{date} {}: fill dropped, position cap reached", position.symbol());
                self.skips.cap_blocked_fills += 1;
                continue;
            }
            self.registry.open(position)?;
        }
        for (symbol, kind) in resolution.expired {
            match kind {
                ExpiryKind::Unfilled => {
                    debug!("{date} {symbol}: order expired unfilled");
                    self.skips.unfilled_orders += 1;
                }
                ExpiryKind::MissingBar => {
                    warn!("{date} {symbol}: no bar on resolution date, order expired");
                    self.skips.data_gaps += 1;
                }
                ExpiryKind::AtrUnavailable => {
                    warn!("{date} {symbol}: ATR window incomplete, fill dropped");
                    self.skips.atr_unavailable += 1;
                }
            }
        }

        // 2. propose today's entries
        let proposals = EntryEngine::new(&self.config).propose(
            date,
            &self.market,
            &self.candidates,
            &self.orders,
            &self.registry,
            self.account.portfolio_value(),
            &mut self.skips,
        );
        for order in proposals {
            self.orders.place(order)?;
        }

        // 3. evaluate exits on existing positions
        let instructions = ExitEngine::new(&self.config).evaluate(
            date,
            index,
            &self.calendar,
            &self.market,
            &self.registry,
            &mut self.skips,
        );

        // 4. settle closures; closed symbols stay in today's snapshot
        let mut signed_sizes = BTreeMap::new();
        for instruction in instructions {
            let position = self.registry.close(&instruction.symbol)?;
            signed_sizes.insert(position.symbol().to_owned(), position.signed_size());
            let trade = ClosedTrade::new(
                &position,
                date,
                instruction.exit_price,
                position.days_held(index),
                self.config.commission_rate,
                instruction.reason,
            );
            self.account.settle(&trade);
            self.ledger.append(trade);
        }

        // 5. snapshot exposure for the analytics pass
        for position in self.registry.iter() {
            signed_sizes.insert(position.symbol().to_owned(), position.signed_size());
        }
        self.snapshots.push(PositionSnapshot { date, signed_sizes });

        Ok(())
    }

    /// Returns the run configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the symbol universe.
    pub fn market(&self) -> &MarketData {
        &self.market
    }

    /// Returns the candidate feed.
    pub fn candidates(&self) -> &CandidateFeed {
        &self.candidates
    }

    /// The trading calendar: every simulated date, ascending.
    pub fn calendar(&self) -> &[NaiveDate] {
        &self.calendar
    }

    /// Returns the capital account.
    pub fn account(&self) -> &CapitalAccount {
        &self.account
    }

    /// Returns the pending-order book.
    pub fn orders(&self) -> &OrderBook {
        &self.orders
    }

    /// Returns the open-position registry.
    pub fn registry(&self) -> &PositionRegistry {
        &self.registry
    }

    /// Returns the trade ledger.
    pub fn ledger(&self) -> &TradeLedger {
        &self.ledger
    }

    /// Per-date exposure snapshots, one per simulated date so far.
    pub fn snapshots(&self) -> &[PositionSnapshot] {
        &self.snapshots
    }

    /// Returns the recoverable-condition counters.
    pub fn skips(&self) -> &SkipCounters {
        &self.skips
    }

    /// Resets the simulation to its initial state.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.account.reset();
        self.orders = OrderBook::default();
        self.registry = PositionRegistry::default();
        self.ledger = TradeLedger::default();
        self.snapshots = Vec::new();
        self.skips = SkipCounters::default();
    }
}
