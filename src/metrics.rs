//! Post-run analytics: equity curve, per-trade statistics, summary figures.
//!
//! Everything here is derived from the simulation's outputs (trade ledger,
//! trading calendar, exposure snapshots) and never feeds back into the run.
//! Degenerate denominators (zero volatility, no trades, no losses) yield 0
//! instead of surfacing an error.

use std::fmt;

use chrono::NaiveDate;

use crate::engine::{ClosedTrade, MarketData, PositionSnapshot, Simulation, TradeLedger};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Aggregate exposure and P&L for one simulated date.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct DailyRecord {
    date: NaiveDate,
    position: f64,
    pnl: f64,
    ret: f64,
}

impl DailyRecord {
    /// Returns the date.
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Aggregate signed position size at the end of the date.
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Portfolio P&L over the date, attributed to the prior date's exposure.
    pub fn pnl(&self) -> f64 {
        self.pnl
    }

    /// Daily P&L as a fraction of the initial capital.
    pub fn ret(&self) -> f64 {
        self.ret
    }
}

/// Per-trade derived figures, one row per ledger entry.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct TradeStats {
    seq: usize,
    symbol: String,
    net_pnl: f64,
    cumulative_pnl: f64,
    peak_pnl: f64,
    drawdown: f64,
    window_return_pct: f64,
    window_sharpe: f64,
}

impl TradeStats {
    /// One-based trade sequence number within the run.
    pub fn seq(&self) -> usize {
        self.seq
    }

    /// Returns the ticker.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// The trade's net P&L.
    pub fn net_pnl(&self) -> f64 {
        self.net_pnl
    }

    /// Cumulative net P&L up to and including this trade.
    pub fn cumulative_pnl(&self) -> f64 {
        self.cumulative_pnl
    }

    /// Running maximum of the cumulative net P&L.
    pub fn peak_pnl(&self) -> f64 {
        self.peak_pnl
    }

    /// Peak minus cumulative net P&L at this trade.
    pub fn drawdown(&self) -> f64 {
        self.drawdown
    }

    /// Sum of the portfolio's daily returns over the holding window, in
    /// percent of initial capital.
    pub fn window_return_pct(&self) -> f64 {
        self.window_return_pct
    }

    /// Annualized Sharpe of the daily returns inside the holding window;
    /// 0 when the window has no volatility.
    pub fn window_sharpe(&self) -> f64 {
        self.window_sharpe
    }
}

/// Performance summary of a finished run.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    initial_capital: f64,
    final_capital: f64,
    total_net_pnl: f64,
    commission_paid: f64,
    trade_count: usize,
    win_rate: f64,
    profit_factor: f64,
    avg_trade_pct: f64,
    best_trade_pct: f64,
    worst_trade_pct: f64,
    avg_holding_days: f64,
    annual_return: f64,
    annual_volatility: f64,
    sharpe: f64,
    max_drawdown: f64,
    max_drawdown_pct: f64,
    daily: Vec<DailyRecord>,
    trade_stats: Vec<TradeStats>,
}

impl Metrics {
    /// Computes the full summary from a run's outputs.
    ///
    /// Daily P&L on date `t` is attributed to the exposure held at the end
    /// of date `t−1`: for each symbol in that snapshot, the signed size
    /// times the close-to-close move. A symbol missing a bar on either date
    /// contributes 0 for that day.
    ///
    /// ### Arguments
    /// * `ledger` - Closed trades, in close order.
    /// * `calendar` - The trading calendar the run walked.
    /// * `market` - The symbol universe (close-to-close moves).
    /// * `snapshots` - End-of-date exposure, one per calendar date.
    /// * `initial_capital` - Starting capital, the return denominator.
    pub fn compute(
        ledger: &TradeLedger,
        calendar: &[NaiveDate],
        market: &MarketData,
        snapshots: &[PositionSnapshot],
        initial_capital: f64,
    ) -> Self {
        let daily = daily_records(calendar, market, snapshots, initial_capital);
        let returns: Vec<f64> = daily.iter().map(DailyRecord::ret).collect();

        let mean_ret = mean(&returns);
        let annual_return = mean_ret * TRADING_DAYS_PER_YEAR;
        let annual_volatility = sample_std(&returns) * TRADING_DAYS_PER_YEAR.sqrt();
        let sharpe = if annual_volatility == 0.0 {
            0.0
        } else {
            annual_return / annual_volatility
        };

        let trades = ledger.trades();
        let wins = trades.iter().filter(|t| t.net_pnl() > 0.0).count();
        let win_rate = if trades.is_empty() {
            0.0
        } else {
            wins as f64 / trades.len() as f64
        };
        let gains: f64 = trades.iter().map(ClosedTrade::net_pnl).filter(|p| *p > 0.0).sum();
        let losses: f64 = trades.iter().map(ClosedTrade::net_pnl).filter(|p| *p < 0.0).sum();
        let profit_factor = gains / losses.abs().max(1.0);

        let trade_pcts: Vec<f64> = trades.iter().map(ClosedTrade::return_pct).collect();
        let avg_trade_pct = mean(&trade_pcts);
        let best_trade_pct = trade_pcts.iter().copied().fold(f64::NAN, f64::max);
        let worst_trade_pct = trade_pcts.iter().copied().fold(f64::NAN, f64::min);
        let holding: Vec<f64> = trades.iter().map(|t| t.days_held() as f64).collect();

        let total_net_pnl = ledger.total_net_pnl();
        let commission_paid = trades.iter().map(ClosedTrade::commission).sum();

        Self {
            initial_capital,
            final_capital: initial_capital + total_net_pnl,
            total_net_pnl,
            commission_paid,
            trade_count: trades.len(),
            win_rate,
            profit_factor,
            avg_trade_pct,
            best_trade_pct: if best_trade_pct.is_nan() { 0.0 } else { best_trade_pct },
            worst_trade_pct: if worst_trade_pct.is_nan() { 0.0 } else { worst_trade_pct },
            avg_holding_days: mean(&holding),
            annual_return,
            annual_volatility,
            sharpe,
            max_drawdown: ledger.max_drawdown(),
            max_drawdown_pct: max_drawdown_pct(&returns),
            trade_stats: trade_stats(ledger, &daily),
            daily,
        }
    }

    /// Returns the starting capital.
    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    /// Starting capital plus total net P&L.
    pub fn final_capital(&self) -> f64 {
        self.final_capital
    }

    /// Net P&L summed over every closed trade.
    pub fn total_net_pnl(&self) -> f64 {
        self.total_net_pnl
    }

    /// Commission paid over every closed trade.
    pub fn commission_paid(&self) -> f64 {
        self.commission_paid
    }

    /// Number of closed trades.
    pub fn trade_count(&self) -> usize {
        self.trade_count
    }

    /// Fraction of trades with positive net P&L; 0 with no trades.
    pub fn win_rate(&self) -> f64 {
        self.win_rate
    }

    /// Gross gains over gross losses. The denominator is floored at 1 so a
    /// run without losers reports a finite factor.
    pub fn profit_factor(&self) -> f64 {
        self.profit_factor
    }

    /// Mean per-trade return, percent of entry price.
    pub fn avg_trade_pct(&self) -> f64 {
        self.avg_trade_pct
    }

    /// Best per-trade return, percent of entry price.
    pub fn best_trade_pct(&self) -> f64 {
        self.best_trade_pct
    }

    /// Worst per-trade return, percent of entry price.
    pub fn worst_trade_pct(&self) -> f64 {
        self.worst_trade_pct
    }

    /// Mean trading days held per trade.
    pub fn avg_holding_days(&self) -> f64 {
        self.avg_holding_days
    }

    /// Mean daily return scaled to a 252-day year.
    pub fn annual_return(&self) -> f64 {
        self.annual_return
    }

    /// Sample standard deviation of daily returns scaled by √252.
    pub fn annual_volatility(&self) -> f64 {
        self.annual_volatility
    }

    /// Annualized return over annualized volatility; 0 when volatility is 0.
    pub fn sharpe(&self) -> f64 {
        self.sharpe
    }

    /// Deepest drawdown in currency terms, over the trade sequence.
    pub fn max_drawdown(&self) -> f64 {
        self.max_drawdown
    }

    /// Deepest drawdown in percent terms, over the cumulative daily-return
    /// series.
    pub fn max_drawdown_pct(&self) -> f64 {
        self.max_drawdown_pct
    }

    /// Per-date exposure, P&L, and return records.
    pub fn daily(&self) -> &[DailyRecord] {
        &self.daily
    }

    /// Per-trade derived figures, in ledger order.
    pub fn trade_stats(&self) -> &[TradeStats] {
        &self.trade_stats
    }
}

impl From<&Simulation> for Metrics {
    fn from(sim: &Simulation) -> Self {
        Self::compute(
            sim.ledger(),
            sim.calendar(),
            sim.market(),
            sim.snapshots(),
            sim.account().initial_capital(),
        )
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Backtest Summary ===")?;
        writeln!(f, "Initial capital       : {:.2}", self.initial_capital)?;
        writeln!(f, "Final capital         : {:.2}", self.final_capital)?;
        writeln!(f, "Total net P&L         : {:.2}", self.total_net_pnl)?;
        writeln!(f, "Commission paid       : {:.2}", self.commission_paid)?;
        writeln!(f, "Trades                : {}", self.trade_count)?;
        writeln!(f, "Win rate              : {:.2}%", self.win_rate * 100.0)?;
        writeln!(f, "Profit factor         : {:.2}", self.profit_factor)?;
        writeln!(f, "Avg trade             : {:.2}%", self.avg_trade_pct)?;
        writeln!(f, "Best trade            : {:.2}%", self.best_trade_pct)?;
        writeln!(f, "Worst trade           : {:.2}%", self.worst_trade_pct)?;
        writeln!(f, "Avg holding days      : {:.1}", self.avg_holding_days)?;
        writeln!(f, "Annualized return     : {:.2}%", self.annual_return * 100.0)?;
        writeln!(f, "Annualized volatility : {:.2}%", self.annual_volatility * 100.0)?;
        writeln!(f, "Sharpe ratio          : {:.2}", self.sharpe)?;
        write!(
            f,
            "Max drawdown          : {:.2} ({:.2}%)",
            self.max_drawdown, self.max_drawdown_pct
        )
    }
}

fn daily_records(
    calendar: &[NaiveDate],
    market: &MarketData,
    snapshots: &[PositionSnapshot],
    initial_capital: f64,
) -> Vec<DailyRecord> {
    let mut records = Vec::with_capacity(snapshots.len());

    for (index, snapshot) in snapshots.iter().enumerate() {
        let mut pnl = 0.0;
        if index > 0 {
            let date = calendar[index];
            let prev_date = calendar[index - 1];
            for (symbol, signed_size) in snapshots[index - 1].signed_sizes() {
                let (Some(close), Some(prev_close)) =
                    (market.close_on(symbol, date), market.close_on(symbol, prev_date))
                else {
                    continue;
                };
                pnl += signed_size * (close - prev_close);
            }
        }

        records.push(DailyRecord {
            date: snapshot.date(),
            position: snapshot.aggregate(),
            pnl,
            ret: pnl / initial_capital,
        });
    }

    records
}

fn trade_stats(ledger: &TradeLedger, daily: &[DailyRecord]) -> Vec<TradeStats> {
    let cumulative = ledger.cumulative_pnl();
    let peaks = ledger.running_peak();
    let drawdowns = ledger.drawdown();

    ledger
        .trades()
        .iter()
        .enumerate()
        .map(|(i, trade)| {
            let window: Vec<f64> = daily
                .iter()
                .filter(|r| r.date() >= trade.entry_date() && r.date() <= trade.exit_date())
                .map(DailyRecord::ret)
                .collect();
            let std = sample_std(&window);
            let window_sharpe = if std == 0.0 {
                0.0
            } else {
                mean(&window) / std * TRADING_DAYS_PER_YEAR.sqrt()
            };

            TradeStats {
                seq: trade.seq(),
                symbol: trade.symbol().to_owned(),
                net_pnl: trade.net_pnl(),
                cumulative_pnl: cumulative[i],
                peak_pnl: peaks[i],
                drawdown: drawdowns[i],
                window_return_pct: window.iter().sum::<f64>() * 100.0,
                window_sharpe,
            }
        })
        .collect()
}

fn max_drawdown_pct(returns: &[f64]) -> f64 {
    let mut cumulative = 0.0;
    let mut peak = f64::MIN;
    let mut worst = 0.0_f64;
    for ret in returns {
        cumulative += ret;
        peak = peak.max(cumulative);
        worst = worst.max(peak - cumulative);
    }
    worst * 100.0
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

// Sample estimator (n − 1 denominator); 0 below two points.
fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}
