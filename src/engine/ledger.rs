//! Closed trades and the append-only ledger.

use chrono::NaiveDate;

use super::exit::ExitReason;
use super::position::Position;

/// A finished round trip: short entry to cover, with full provenance.
///
/// Immutable once appended to the ledger. Gross P&L is the short-side price
/// move times size; commission covers both legs of the round trip.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    seq: usize,
    symbol: String,
    entry_date: NaiveDate,
    entry_price: f64,
    exit_date: NaiveDate,
    exit_price: f64,
    size: f64,
    gross_pnl: f64,
    commission: f64,
    net_pnl: f64,
    days_held: usize,
    reason: ExitReason,
}

impl ClosedTrade {
    /// Settles a position into a trade record.
    ///
    /// ### Arguments
    /// * `position` - The position being closed.
    /// * `exit_date` - The cover date.
    /// * `exit_price` - The cover price (the bar's close).
    /// * `days_held` - Trading days between entry and exit.
    /// * `commission_rate` - Fraction of notional charged per leg.
    /// * `reason` - Why the position was closed.
    pub(crate) fn new(
        position: &Position,
        exit_date: NaiveDate,
        exit_price: f64,
        days_held: usize,
        commission_rate: f64,
        reason: ExitReason,
    ) -> Self {
        let size = position.size();
        let entry_price = position.entry_price();
        let gross_pnl = (entry_price - exit_price) * size;
        let commission = commission_rate * size * (entry_price + exit_price);
        Self {
            seq: 0, // assigned on append
            symbol: position.symbol().to_owned(),
            entry_date: position.entry_date(),
            entry_price,
            exit_date,
            exit_price,
            size,
            gross_pnl,
            commission,
            net_pnl: gross_pnl - commission,
            days_held,
            reason,
        }
    }

    /// One-based trade sequence number within the run.
    pub fn seq(&self) -> usize {
        self.seq
    }

    /// Returns the ticker.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Returns the entry (fill) date.
    pub fn entry_date(&self) -> NaiveDate {
        self.entry_date
    }

    /// Returns the entry (sale) price.
    pub fn entry_price(&self) -> f64 {
        self.entry_price
    }

    /// Returns the exit (cover) date.
    pub fn exit_date(&self) -> NaiveDate {
        self.exit_date
    }

    /// Returns the exit (cover) price.
    pub fn exit_price(&self) -> f64 {
        self.exit_price
    }

    /// Returns the share quantity.
    pub fn size(&self) -> f64 {
        self.size
    }

    /// P&L before commission.
    pub fn gross_pnl(&self) -> f64 {
        self.gross_pnl
    }

    /// Commission paid over both legs.
    pub fn commission(&self) -> f64 {
        self.commission
    }

    /// P&L net of commission.
    pub fn net_pnl(&self) -> f64 {
        self.net_pnl
    }

    /// Trading days between entry and exit.
    pub fn days_held(&self) -> usize {
        self.days_held
    }

    /// Why the position was closed, with rule-specific detail.
    pub fn reason(&self) -> &ExitReason {
        &self.reason
    }

    /// Entry-to-exit move as a percent of the entry price, positive when
    /// the short was profitable.
    pub fn return_pct(&self) -> f64 {
        (self.entry_price - self.exit_price) / self.entry_price * 100.0
    }
}

/// Append-only sequence of closed trades.
#[derive(Debug, Default)]
pub struct TradeLedger {
    trades: Vec<ClosedTrade>,
}

impl TradeLedger {
    /// Appends a trade and stamps its sequence number.
    pub(crate) fn append(&mut self, mut trade: ClosedTrade) {
        trade.seq = self.trades.len() + 1;
        self.trades.push(trade);
    }

    /// Returns the trades in close order.
    pub fn trades(&self) -> &[ClosedTrade] {
        &self.trades
    }

    /// Returns the number of closed trades.
    pub fn len(&self) -> usize {
        self.trades.len()
    }

    /// True when no trade has closed yet.
    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    /// Net P&L summed over every trade.
    pub fn total_net_pnl(&self) -> f64 {
        self.trades.iter().map(ClosedTrade::net_pnl).sum()
    }

    /// Running sum of net P&L, one value per trade.
    pub fn cumulative_pnl(&self) -> Vec<f64> {
        self.trades
            .iter()
            .scan(0.0, |acc, t| {
                *acc += t.net_pnl();
                Some(*acc)
            })
            .collect()
    }

    /// Running maximum of the cumulative P&L, one value per trade.
    pub fn running_peak(&self) -> Vec<f64> {
        self.cumulative_pnl()
            .into_iter()
            .scan(f64::MIN, |peak, v| {
                *peak = peak.max(v);
                Some(*peak)
            })
            .collect()
    }

    /// Peak minus cumulative P&L at each trade index.
    pub fn drawdown(&self) -> Vec<f64> {
        self.cumulative_pnl()
            .into_iter()
            .scan(f64::MIN, |peak, v| {
                *peak = peak.max(v);
                Some(*peak - v)
            })
            .collect()
    }

    /// Deepest drawdown in currency terms over the trade sequence.
    pub fn max_drawdown(&self) -> f64 {
        self.drawdown().into_iter().fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::super::order::PendingOrder;
    use super::*;
    use crate::config::sample_config;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn trade(net_target: f64) -> ClosedTrade {
        // commission-free so net equals the price move times size
        let config = sample_config();
        let order = PendingOrder::new("AAA", 100.0, 1.0, day(1));
        let position = Position::open(&order, day(2), 1, 2.0, &config);
        ClosedTrade::new(
            &position,
            day(4),
            100.0 - net_target,
            2,
            0.0,
            ExitReason::TimeExit {
                target_date: day(4),
                days_held: 2,
            },
        )
    }

    #[test]
    fn settles_short_pnl_and_commission() {
        let config = sample_config();
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

        assert_eq!(trade.gross_pnl(), (104.0 - 99.5) * 96.0);
        assert!((trade.commission() - 0.002 * 96.0 * (104.0 + 99.5)).abs() < 1e-12);
        assert!((trade.net_pnl() - (trade.gross_pnl() - trade.commission())).abs() < 1e-12);
        assert!((trade.return_pct() - (104.0 - 99.5) / 104.0 * 100.0).abs() < 1e-12);
        assert_eq!(trade.days_held(), 2);
    }

    #[test]
    fn append_stamps_sequence_numbers() {
        let mut ledger = TradeLedger::default();
        ledger.append(trade(10.0));
        ledger.append(trade(-5.0));
        let seqs: Vec<usize> = ledger.trades().iter().map(ClosedTrade::seq).collect();
        assert_eq!(seqs, vec![1, 2]);
    }

    #[test]
    fn running_series() {
        let mut ledger = TradeLedger::default();
        for net in [10.0, -4.0, 6.0, -12.0] {
            ledger.append(trade(net));
        }

        assert_eq!(ledger.cumulative_pnl(), vec![10.0, 6.0, 12.0, 0.0]);
        assert_eq!(ledger.running_peak(), vec![10.0, 10.0, 12.0, 12.0]);
        assert_eq!(ledger.drawdown(), vec![0.0, 4.0, 0.0, 12.0]);
        assert_eq!(ledger.max_drawdown(), 12.0);
        assert_eq!(ledger.total_net_pnl(), 0.0);
    }

    #[test]
    fn empty_ledger_has_no_drawdown() {
        let ledger = TradeLedger::default();
        assert_eq!(ledger.max_drawdown(), 0.0);
        assert_eq!(ledger.total_net_pnl(), 0.0);
    }
}
