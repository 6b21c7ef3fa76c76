//! # SSB: Short-Sell Backtester for Daily Equity Data
//!
//! **SSB** is a Rust library for simulating short-selling strategies bar-by-bar across a
//! universe of equity symbols. Each simulated date it resolves pending limit orders,
//! proposes new short entries from a ranked candidate feed, evaluates every open position
//! against a stop-loss / profit-target / time-exit state machine, and records closed
//! trades for the analytics pass.
//!
//! ## Core Components
//! | Component | Description |
//! |-----------------------|------------------------------------------------------------------------------|
//! | **`Bar`** | One day of OHLCV data for a single symbol. |
//! | **`PriceSeries`** | A symbol's date-ordered bars, with ATR and previous-close lookups. |
//! | **`CandidateFeed`** | Per-date short candidates, ranked by an external trend-strength score. |
//! | **`OrderBook`** | At most one pending limit order per symbol, valid for a single bar. |
//! | **`PositionRegistry`** | At most one open short position per symbol, with frozen exit thresholds. |
//! | **`EntryEngine`** | Turns ranked candidates into limit orders under the concurrent-position cap. |
//! | **`ExitEngine`** | Closes positions on stop-loss, profit-target, or time-exit, in priority order.|
//! | **`TradeLedger`** | Append-only record of closed trades with full entry/exit provenance. |
//! | **`Metrics`** | Equity curve, Sharpe ratio, win rate, profit factor, drawdowns. |
//! | **`Simulation`** | The driver that threads all of the above through the trading calendar. |
//!
//! ## Exit Rules
//! | Rule | Trigger (short position) |
//! |-------------------|----------------------------------------------------------------|
//! | **Stop-Loss** | Close rises to `entry + atr_multiplier × ATR(entry)`. |
//! | **Profit-Target** | Close falls to `entry × (1 − profit_target_pct)`. |
//! | **Time-Exit** | Held for `exit_time_days` trading days without another trigger. |
//!
//! The evaluation order is configurable via [`ExitPriority`]; the default checks
//! stop-loss first, then profit-target, then time-exit. The first match wins.
//!
//! ## Getting Started
//! ```rust
//! use ssb::prelude::*;
//! use chrono::NaiveDate;
//!
//! fn main() -> ssb::errors::Result<()> {
//!     let d = |day: u32| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
//!
//!     // Seven flat lead-in bars (ATR warm-up), a spike that fills the
//!     // short limit order, then a sell-off that hits the profit target.
//!     let mut bars = Vec::new();
//!     for day in 1..=8 {
//!         bars.push(Bar::from((d(day), 100.0, 101.0, 99.0, 100.0, 1_000_000.0)));
//!     }
//!     bars.push(Bar::from((d(9), 100.0, 105.0, 99.0, 100.0, 1_000_000.0)));
//!     bars.push(Bar::from((d(10), 100.0, 100.0, 99.0, 99.5, 1_000_000.0)));
//!     bars.push(Bar::from((d(11), 99.5, 100.0, 99.0, 100.0, 1_000_000.0)));
//!     bars.push(Bar::from((d(12), 100.0, 100.5, 99.5, 100.0, 1_000_000.0)));
//!
//!     let mut market = MarketData::new();
//!     market.insert("ALGN", PriceSeries::new(bars)?);
//!
//!     // One candidate on the first simulated date, ranked by its ADX score.
//!     let mut candidates = CandidateFeed::new();
//!     candidates.push(Candidate::new(d(8), "ALGN", 40.0));
//!
//!     let config = Config {
//!         capital: 100_000.0,
//!         commission_rate: 0.002,
//!         start_date: d(8),
//!         end_date: d(12),
//!         active_positions_cap: 1,
//!         daily_entries_cap: 1,
//!         entry_limit_pct: 0.04,
//!         position_size_pct: 0.1,
//!         exit_time_days: 2,
//!         atr_period: 3,
//!         atr_multiplier: 3.0,
//!         profit_target_pct: 0.04,
//!         exit_priority: ExitPriority::default(),
//!     };
//!
//!     let mut sim = Simulation::new(config, market, candidates)?;
//!     sim.run()?;
//!
//!     // The order fills at 104.0 (prev close 100.0 + 4%), the profit target
//!     // closes it at 99.5 the next day.
//!     let trade = sim.ledger().trades().last().unwrap();
//!     assert_eq!(trade.entry_price(), 104.0);
//!     assert_eq!(trade.exit_price(), 99.5);
//!     assert!(matches!(trade.reason(), ExitReason::ProfitTarget { .. }));
//!
//!     let metrics = Metrics::from(&sim);
//!     println!("{metrics}");
//!     Ok(())
//! }
//! ```
//!
//! ## Inputs & Outputs
//! The engine consumes fully materialized inputs: a symbol → bar-series map
//! ([`MarketData`]), a per-date ranked candidate list ([`CandidateFeed`]), and a
//! validated [`Config`]. It produces a trade table ([`TradeLedger`]), per-date
//! position/P&L/return records, and a performance summary ([`Metrics`]). Data
//! acquisition, symbol screening, and report rendering live outside this crate.
//!
//! ## Error Handling
//! Configuration problems are fatal and reported before the first simulated date.
//! Local conditions (a symbol missing a bar, an order too small to size, a
//! zero-volatility Sharpe denominator) are logged via the [`log`] facade, counted
//! in [`SkipCounters`], and never halt the run.
//!
//! ## Integrations
//! | Crate | Purpose |
//! |----------------|----------------------------------------------------------|
//! | [`serde`](https://crates.io/crates/serde) | Serialize results, load config/bars/candidates from JSON. |
//! | [`rayon`](https://crates.io/crates/rayon) | Parallel parameter sweeps (`optimizer` feature). |
//! | [`log`](https://crates.io/crates/log) | Recoverable-condition reporting. |
//!
//! ## License
//! MIT
#![warn(missing_docs)]

/// Core simulation components: market data, orders, positions, engines, driver.
pub mod engine;

/// Error types for the library.
pub mod errors;

/// Configuration for a simulation run.
pub mod config;

/// Utility functions and helpers.
mod utils;

#[cfg(feature = "serde")]
pub use utils::{candidates_from_file, market_from_file};

/// Performance metrics: equity curve, drawdown, Sharpe ratio, win rate, etc.
pub mod metrics;

/// Configuration parameter sweeps.
#[cfg(feature = "optimizer")]
pub mod optimizer;

/// Re-exports of commonly used types and traits for convenience.
pub mod prelude {
    pub use super::*;
    pub use crate::config::*;
    pub use crate::engine::*;
    pub use crate::errors::*;
    pub use crate::metrics::*;

    #[cfg(feature = "optimizer")]
    pub use crate::optimizer::*;
}

use std::ops::{Add, Div, Mul, Sub};

/// Trait for fraction-based price calculations.
///
/// Strategy parameters in this crate are plain fractions (`0.04` for 4%), so
/// this trait provides the handful of adjustments the engines need: bumping a
/// close up by the entry-limit fraction, cutting an entry price down by the
/// profit-target fraction, and expressing a move as a fraction of its base.
pub trait FracCalculus<Rhs = Self> {
    /// Increases the value by a fraction of itself.
    ///
    /// ### Arguments
    /// * `rhs` - The fraction to add (e.g., 0.04 for 4%).
    ///
    /// ### Returns
    /// The value increased by the given fraction.
    fn add_frac(self, rhs: Rhs) -> Self;

    /// Decreases the value by a fraction of itself.
    ///
    /// ### Arguments
    /// * `rhs` - The fraction to subtract (e.g., 0.04 for 4%).
    ///
    /// ### Returns
    /// The value decreased by the given fraction.
    fn sub_frac(self, rhs: Rhs) -> Self;

    /// Expresses the change to a new value as a fraction of the original.
    ///
    /// ### Arguments
    /// * `new` - The new value to compare with.
    ///
    /// ### Returns
    /// The fractional change from the original value to the new value.
    fn frac_change(self, new: Self) -> Self;
}

impl FracCalculus for f64 {
    fn add_frac(self, frac: Self) -> Self {
        self.add(self.mul(frac))
    }

    fn sub_frac(self, frac: Self) -> Self {
        self.sub(self.mul(frac))
    }

    fn frac_change(self, new: Self) -> Self {
        new.sub(self).div(self)
    }
}

#[cfg(test)]
mod frac {
    use super::*;

    #[test]
    fn add() {
        assert_eq!(104.0, 100.0.add_frac(0.04))
    }

    #[test]
    fn sub() {
        assert_eq!(96.0, 100.0.sub_frac(0.04))
    }

    #[test]
    fn change() {
        assert_eq!(0.1, 100.0.frac_change(110.0))
    }
}
