//! Exit decisions: the per-position stop / target / time state machine.

use chrono::NaiveDate;
use log::warn;

use crate::config::Config;
use crate::errors::{Error, Result};

use super::SkipCounters;
use super::market::MarketData;
use super::position::{Position, PositionRegistry};

/// The three ways a position can leave the book.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitTrigger {
    /// Volatility stop above the entry price.
    StopLoss,
    /// Profit target below the entry price.
    ProfitTarget,
    /// Forced close after the holding horizon.
    TimeExit,
}

/// The order in which exit rules are checked; the first match wins.
///
/// Historical variants of this strategy disagreed on whether the time exit
/// outranks the price rules, so the order is an explicit run parameter
/// rather than a hard-coded chain.
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "[ExitTrigger; 3]", into = "[ExitTrigger; 3]")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitPriority([ExitTrigger; 3]);

impl Default for ExitPriority {
    fn default() -> Self {
        Self([ExitTrigger::StopLoss, ExitTrigger::ProfitTarget, ExitTrigger::TimeExit])
    }
}

impl TryFrom<[ExitTrigger; 3]> for ExitPriority {
    type Error = Error;

    fn try_from(order: [ExitTrigger; 3]) -> Result<Self> {
        for trigger in [ExitTrigger::StopLoss, ExitTrigger::ProfitTarget, ExitTrigger::TimeExit] {
            if order.iter().filter(|t| **t == trigger).count() != 1 {
                return Err(Error::InvalidExitPriority);
            }
        }
        Ok(Self(order))
    }
}

impl From<ExitPriority> for [ExitTrigger; 3] {
    fn from(priority: ExitPriority) -> Self {
        priority.0
    }
}

impl ExitPriority {
    /// Builds a priority from an explicit rule order.
    ///
    /// ### Returns
    /// The priority, or an error when a rule is missing or repeated.
    pub fn new(order: [ExitTrigger; 3]) -> Result<Self> {
        Self::try_from(order)
    }

    /// Returns the rules in evaluation order.
    pub fn order(&self) -> &[ExitTrigger; 3] {
        &self.0
    }
}

/// Why a position was closed, with the rule-specific evidence.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExitReason {
    /// The close rose through the volatility stop.
    StopLoss {
        /// The stop threshold that was breached.
        stop_price: f64,
        /// ATR of the entry bar the stop was scaled from.
        atr_at_entry: f64,
    },
    /// The close fell through the profit target.
    ProfitTarget {
        /// The target threshold that was reached.
        target_price: f64,
        /// Realized profit fraction of the entry price at the close.
        achieved_pct: f64,
    },
    /// The holding horizon elapsed without a price trigger.
    TimeExit {
        /// The calendar date the horizon pointed at.
        target_date: NaiveDate,
        /// Trading days actually held.
        days_held: usize,
    },
}

impl ExitReason {
    /// The rule kind behind this reason.
    pub fn trigger(&self) -> ExitTrigger {
        match self {
            Self::StopLoss { .. } => ExitTrigger::StopLoss,
            Self::ProfitTarget { .. } => ExitTrigger::ProfitTarget,
            Self::TimeExit { .. } => ExitTrigger::TimeExit,
        }
    }
}

/// A close instruction for the simulation driver.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitInstruction {
    /// Symbol of the position to close.
    pub symbol: String,
    /// Exit (cover) price: the evaluation bar's close.
    pub exit_price: f64,
    /// Why the position is being closed.
    pub reason: ExitReason,
}

/// Evaluates every open position against the exit rules for one date.
pub struct ExitEngine<'a> {
    config: &'a Config,
}

impl<'a> ExitEngine<'a> {
    /// Creates an exit engine over the run configuration.
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Checks each open position once, in symbol order.
    ///
    /// Positions filled on `date` are not evaluated until the next bar.
    /// A position whose symbol has no bar on `date` is skipped for the day
    /// (recoverable data gap). Exits close at the bar's close.
    ///
    /// ### Arguments
    /// * `date` - The date being simulated.
    /// * `calendar_index` - Index of `date` in the trading calendar.
    /// * `calendar` - The full trading calendar (time-exit target dates).
    /// * `market` - The symbol universe.
    /// * `registry` - Open positions.
    /// * `skips` - Recoverable-condition counters.
    pub fn evaluate(
        &self,
        date: NaiveDate,
        calendar_index: usize,
        calendar: &[NaiveDate],
        market: &MarketData,
        registry: &PositionRegistry,
        skips: &mut SkipCounters,
    ) -> Vec<ExitInstruction> {
        let mut instructions = Vec::new();

        for position in registry.iter() {
            if position.entry_date() == date {
                continue;
            }
            let Some(close) = market.close_on(position.symbol(), date) else {
                warn!("{date} {}: no bar, exit check skipped", position.symbol());
                skips.data_gaps += 1;
                continue;
            };

            let days_held = position.days_held(calendar_index);
            let reason = self
                .config
                .exit_priority
                .order()
                .iter()
                .find_map(|trigger| check(*trigger, position, close, days_held, self.config, calendar));

            if let Some(reason) = reason {
                instructions.push(ExitInstruction {
                    symbol: position.symbol().to_owned(),
                    exit_price: close,
                    reason,
                });
            }
        }

        instructions
    }
}

fn check(
    trigger: ExitTrigger,
    position: &Position,
    close: f64,
    days_held: usize,
    config: &Config,
    calendar: &[NaiveDate],
) -> Option<ExitReason> {
    match trigger {
        ExitTrigger::StopLoss => (close >= position.stop_price()).then(|| ExitReason::StopLoss {
            stop_price: position.stop_price(),
            atr_at_entry: position.atr_at_entry(),
        }),
        ExitTrigger::ProfitTarget => (close <= position.target_price()).then(|| ExitReason::ProfitTarget {
            target_price: position.target_price(),
            achieved_pct: (position.entry_price() - close) / position.entry_price() * 100.0,
        }),
        ExitTrigger::TimeExit => (days_held >= config.exit_time_days).then(|| ExitReason::TimeExit {
            target_date: calendar[position.time_exit_index().min(calendar.len() - 1)],
            days_held,
        }),
    }
}
