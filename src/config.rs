//! Run configuration.
//!
//! A [`Config`] is constructed once before the simulation starts and is
//! read-only for the whole run. Every range problem is a fatal error raised
//! by [`Config::validate`] before the first simulated date; with the `serde`
//! feature a missing required key fails JSON deserialization the same way.

use chrono::NaiveDate;

use crate::engine::ExitPriority;
use crate::errors::{Error, Result};

/// Parameters of a single backtest run.
///
/// Fractions are plain ratios (`0.04` for 4%), not percents. All fields are
/// required except [`exit_priority`](Config::exit_priority), which defaults
/// to stop-loss → profit-target → time-exit.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Starting cash, > 0.
    pub capital: f64,

    /// Commission as a fraction of traded notional, charged per leg.
    #[cfg_attr(feature = "serde", serde(alias = "commission"))]
    pub commission_rate: f64,

    /// First simulated date (inclusive).
    pub start_date: NaiveDate,

    /// Last simulated date (inclusive).
    pub end_date: NaiveDate,

    /// Maximum number of concurrently open positions, >= 1.
    pub active_positions_cap: usize,

    /// Maximum number of new entry orders issued per date, >= 1.
    #[cfg_attr(feature = "serde", serde(alias = "daily_tickers_entry_cap"))]
    pub daily_entries_cap: usize,

    /// Entry limit price premium over the previous close.
    pub entry_limit_pct: f64,

    /// Fraction of portfolio value allocated to each new position.
    pub position_size_pct: f64,

    /// Forced-exit horizon in trading days, >= 1.
    pub exit_time_days: usize,

    /// ATR window length in trading days, >= 1.
    pub atr_period: usize,

    /// Stop distance in ATR multiples above the entry price.
    pub atr_multiplier: f64,

    /// Profit target as a fraction of the entry price.
    #[cfg_attr(feature = "serde", serde(alias = "profit_target_percent"))]
    pub profit_target_pct: f64,

    /// Order in which exit rules are evaluated; first match wins.
    #[cfg_attr(feature = "serde", serde(default))]
    pub exit_priority: ExitPriority,
}

impl Config {
    /// Checks every parameter range.
    ///
    /// ### Returns
    /// Ok if the configuration can drive a run, or the first fatal error.
    pub fn validate(&self) -> Result<()> {
        if self.capital <= 0.0 || !self.capital.is_finite() {
            return Err(Error::NonPositiveCapital(self.capital));
        }
        if self.commission_rate < 0.0 || !self.commission_rate.is_finite() {
            return Err(Error::InvalidCommission(self.commission_rate));
        }
        if self.end_date < self.start_date {
            return Err(Error::InvalidDateWindow(self.start_date, self.end_date));
        }
        for (name, value) in [
            ("active_positions_cap", self.active_positions_cap),
            ("daily_entries_cap", self.daily_entries_cap),
            ("exit_time_days", self.exit_time_days),
            ("atr_period", self.atr_period),
        ] {
            if value == 0 {
                return Err(Error::ZeroCount(name, value));
            }
        }
        for (name, value) in [
            ("entry_limit_pct", self.entry_limit_pct),
            ("position_size_pct", self.position_size_pct),
            ("profit_target_pct", self.profit_target_pct),
        ] {
            if !value.is_finite() || value <= -1.0 {
                return Err(Error::InvalidFraction(name, value));
            }
        }
        if self.position_size_pct <= 0.0 {
            return Err(Error::InvalidFraction("position_size_pct", self.position_size_pct));
        }
        if self.atr_multiplier < 0.0 || !self.atr_multiplier.is_finite() {
            return Err(Error::InvalidAtrMultiplier(self.atr_multiplier));
        }
        Ok(())
    }

    /// Reads a configuration from a JSON file.
    ///
    /// A missing required key is a fatal error, as is any out-of-range value.
    #[cfg(feature = "serde")]
    pub fn from_json_file(filepath: std::path::PathBuf) -> Result<Self> {
        use std::{fs::File, io::BufReader};

        let file = File::open(filepath)?;
        let reader = BufReader::new(file);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
pub(crate) fn sample_config() -> Config {
    Config {
        capital: 100_000.0,
        commission_rate: 0.002,
        start_date: NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        active_positions_cap: 5,
        daily_entries_cap: 3,
        entry_limit_pct: 0.04,
        position_size_pct: 0.1,
        exit_time_days: 2,
        atr_period: 3,
        atr_multiplier: 3.0,
        profit_target_pct: 0.04,
        exit_priority: ExitPriority::default(),
    }
}

#[cfg(test)]
#[test]
fn valid_config() {
    assert!(sample_config().validate().is_ok());
}

#[cfg(test)]
#[test]
fn rejects_non_positive_capital() {
    let mut config = sample_config();
    config.capital = 0.0;
    assert!(matches!(config.validate(), Err(Error::NonPositiveCapital(_))));

    config.capital = -5_000.0;
    assert!(matches!(config.validate(), Err(Error::NonPositiveCapital(_))));
}

#[cfg(test)]
#[test]
fn rejects_negative_commission() {
    let mut config = sample_config();
    config.commission_rate = -0.001;
    assert!(matches!(config.validate(), Err(Error::InvalidCommission(_))));
}

#[cfg(test)]
#[test]
fn rejects_inverted_date_window() {
    let mut config = sample_config();
    config.end_date = config.start_date.pred_opt().unwrap();
    assert!(matches!(config.validate(), Err(Error::InvalidDateWindow(_, _))));
}

#[cfg(test)]
#[test]
fn rejects_zero_counts() {
    for field in 0..4 {
        let mut config = sample_config();
        match field {
            0 => config.active_positions_cap = 0,
            1 => config.daily_entries_cap = 0,
            2 => config.exit_time_days = 0,
            _ => config.atr_period = 0,
        }
        assert!(matches!(config.validate(), Err(Error::ZeroCount(_, 0))));
    }
}

#[cfg(test)]
#[test]
fn rejects_degenerate_fractions() {
    let mut config = sample_config();
    config.position_size_pct = 0.0;
    assert!(matches!(config.validate(), Err(Error::InvalidFraction(_, _))));

    let mut config = sample_config();
    config.entry_limit_pct = f64::NAN;
    assert!(matches!(config.validate(), Err(Error::InvalidFraction(_, _))));
}

#[cfg(test)]
#[test]
fn rejects_negative_atr_multiplier() {
    let mut config = sample_config();
    config.atr_multiplier = -1.0;
    assert!(matches!(config.validate(), Err(Error::InvalidAtrMultiplier(_))));
}
