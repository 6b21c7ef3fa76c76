//! Pending limit orders and their one-bar resolution.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::config::Config;
use crate::errors::{Error, Result};
use crate::utils::random_id;

use super::market::MarketData;
use super::position::Position;

/// A short-entry limit order, valid for a single trading day.
///
/// No capital is reserved while the order is pending; the fill creates the
/// position and the close settles the cash.
#[derive(Debug, Clone)]
pub struct PendingOrder {
    id: u32,
    symbol: String,
    limit_price: f64,
    size: f64,
    issued: NaiveDate,
}

impl PartialEq for PendingOrder {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl PendingOrder {
    /// Creates a pending short-entry order.
    ///
    /// ### Arguments
    /// * `symbol` - The ticker to short.
    /// * `limit_price` - Minimum acceptable sale price; also the fill price.
    /// * `size` - Whole-share quantity.
    /// * `issued` - The date the order was proposed.
    pub fn new(symbol: impl Into<String>, limit_price: f64, size: f64, issued: NaiveDate) -> Self {
        Self {
            id: random_id(),
            symbol: symbol.into(),
            limit_price,
            size,
            issued,
        }
    }

    /// Returns the order id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns the ticker.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Returns the limit price.
    pub fn limit_price(&self) -> f64 {
        self.limit_price
    }

    /// Returns the share quantity.
    pub fn size(&self) -> f64 {
        self.size
    }

    /// Returns the date the order was issued.
    pub fn issued(&self) -> NaiveDate {
        self.issued
    }
}

/// Why an order left the book without producing a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryKind {
    /// The bar's high never reached the limit price.
    Unfilled,
    /// The symbol had no bar on the resolution date.
    MissingBar,
    /// The ATR window was incomplete, so no stop could be set.
    AtrUnavailable,
}

/// Outcome of resolving one date's pending orders.
#[derive(Debug, Default)]
pub struct Resolution {
    /// Positions created by fills, in symbol order.
    pub filled: Vec<Position>,
    /// Symbols whose orders expired, with the expiry cause.
    pub expired: Vec<(String, ExpiryKind)>,
}

/// Tracks at most one pending order per symbol.
///
/// Every order placed on date `t` is resolved exactly once, against the bar
/// of date `t+1`: it either fills at its limit price or expires. Nothing
/// survives a resolution pass.
#[derive(Debug, Default)]
pub struct OrderBook {
    pending: BTreeMap<String, PendingOrder>,
}

impl OrderBook {
    /// Adds a pending order.
    ///
    /// ### Returns
    /// Ok if placed, or an error when the symbol already has one.
    pub fn place(&mut self, order: PendingOrder) -> Result<()> {
        if self.pending.contains_key(order.symbol()) {
            return Err(Error::DuplicateOrder(order.symbol().to_owned()));
        }
        self.pending.insert(order.symbol().to_owned(), order);
        Ok(())
    }

    /// True when `symbol` has a pending order.
    pub fn has(&self, symbol: &str) -> bool {
        self.pending.contains_key(symbol)
    }

    /// Returns the number of pending orders.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// True when no order is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Iterates pending orders in symbol order.
    pub fn iter(&self) -> impl Iterator<Item = &PendingOrder> {
        self.pending.values()
    }

    /// Resolves every pending order against the bars of `date`.
    ///
    /// A limit sell-short fills when the bar's high reaches the limit price,
    /// at the limit price. The fill freezes the stop from the ATR at the
    /// entry bar. Anything that cannot fill expires; the book is empty
    /// afterwards.
    ///
    /// ### Arguments
    /// * `date` - The resolution date.
    /// * `calendar_index` - Index of `date` in the trading calendar.
    /// * `market` - The symbol universe.
    /// * `config` - Run parameters (ATR window, stop multiplier, horizon).
    pub fn resolve(&mut self, date: NaiveDate, calendar_index: usize, market: &MarketData, config: &Config) -> Resolution {
        let mut resolution = Resolution::default();
        let pending = std::mem::take(&mut self.pending);

        for (symbol, order) in pending {
            let Some(series) = market.get(&symbol) else {
                resolution.expired.push((symbol, ExpiryKind::MissingBar));
                continue;
            };
            let Some(bar_index) = series.index_of(date) else {
                resolution.expired.push((symbol, ExpiryKind::MissingBar));
                continue;
            };

            let bar = &series.bars()[bar_index];
            if bar.high() < order.limit_price() {
                resolution.expired.push((symbol, ExpiryKind::Unfilled));
                continue;
            }

            match series.atr_at(bar_index, config.atr_period) {
                Some(atr) => {
                    resolution
                        .filled
                        .push(Position::open(&order, date, calendar_index, atr, config));
                }
                None => resolution.expired.push((symbol, ExpiryKind::AtrUnavailable)),
            }
        }

        resolution
    }
}

#[cfg(test)]
mod tests {
    use super::super::market::{Bar, PriceSeries};
    use super::*;
    use crate::config::sample_config;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn market_with(bars: Vec<Bar>) -> MarketData {
        let mut market = MarketData::new();
        market.insert("AAA", PriceSeries::new(bars).unwrap());
        market
    }

    fn lead_in(days: std::ops::RangeInclusive<u32>) -> Vec<Bar> {
        days.map(|d| Bar::from((day(d), 100.0, 101.0, 99.0, 100.0, 1_000.0))).collect()
    }

    #[test]
    fn one_order_per_symbol() {
        let mut book = OrderBook::default();
        book.place(PendingOrder::new("AAA", 104.0, 10.0, day(1))).unwrap();
        let result = book.place(PendingOrder::new("AAA", 105.0, 10.0, day(1)));
        assert!(matches!(result, Err(Error::DuplicateOrder(_))));
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn fills_at_limit_when_high_reaches_it() {
        let mut bars = lead_in(1..=5);
        bars.push(Bar::from((day(6), 100.0, 105.0, 99.0, 102.0, 1_000.0)));
        let market = market_with(bars);
        let config = sample_config();

        let mut book = OrderBook::default();
        book.place(PendingOrder::new("AAA", 104.0, 10.0, day(5))).unwrap();

        let resolution = book.resolve(day(6), 1, &market, &config);
        assert!(book.is_empty());
        assert!(resolution.expired.is_empty());
        assert_eq!(resolution.filled.len(), 1);
        let position = &resolution.filled[0];
        assert_eq!(position.entry_price(), 104.0);
        assert_eq!(position.entry_date(), day(6));
    }

    #[test]
    fn expires_when_high_stays_below_limit() {
        let market = market_with(lead_in(1..=6));
        let config = sample_config();

        let mut book = OrderBook::default();
        book.place(PendingOrder::new("AAA", 104.0, 10.0, day(5))).unwrap();

        let resolution = book.resolve(day(6), 1, &market, &config);
        assert!(book.is_empty());
        assert!(resolution.filled.is_empty());
        assert_eq!(resolution.expired, vec![("AAA".to_owned(), ExpiryKind::Unfilled)]);
    }

    #[test]
    fn expires_on_missing_bar() {
        let market = market_with(lead_in(1..=5));
        let config = sample_config();

        let mut book = OrderBook::default();
        book.place(PendingOrder::new("AAA", 104.0, 10.0, day(5))).unwrap();

        let resolution = book.resolve(day(9), 4, &market, &config);
        assert_eq!(resolution.expired, vec![("AAA".to_owned(), ExpiryKind::MissingBar)]);
    }

    #[test]
    fn expires_when_atr_window_is_incomplete() {
        // only two bars: the fill bar has no complete 3-bar ATR window
        let mut bars = lead_in(1..=1);
        bars.push(Bar::from((day(2), 100.0, 105.0, 99.0, 102.0, 1_000.0)));
        let market = market_with(bars);
        let config = sample_config();

        let mut book = OrderBook::default();
        book.place(PendingOrder::new("AAA", 104.0, 10.0, day(1))).unwrap();

        let resolution = book.resolve(day(2), 1, &market, &config);
        assert!(resolution.filled.is_empty());
        assert_eq!(resolution.expired, vec![("AAA".to_owned(), ExpiryKind::AtrUnavailable)]);
    }

    #[test]
    fn nothing_survives_a_resolution_pass() {
        let market = market_with(lead_in(1..=6));
        let config = sample_config();

        let mut book = OrderBook::default();
        book.place(PendingOrder::new("AAA", 104.0, 10.0, day(5))).unwrap();
        book.resolve(day(6), 1, &market, &config);
        assert!(book.is_empty());

        // a fresh order for the same symbol is accepted afterwards
        assert!(book.place(PendingOrder::new("AAA", 104.0, 10.0, day(6))).is_ok());
    }
}
