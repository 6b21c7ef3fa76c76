//! Entry decisions: ranked candidates → limit orders.

use chrono::NaiveDate;
use log::debug;

use crate::FracCalculus;
use crate::config::Config;

use super::SkipCounters;
use super::candidates::CandidateFeed;
use super::market::MarketData;
use super::order::{OrderBook, PendingOrder};
use super::position::PositionRegistry;

/// Proposes new short-entry orders for one date.
///
/// The engine is stateless; the simulation driver hands it the shared state
/// it may read and collects the orders it returns. It never reserves
/// capital, the sizing only consults the current portfolio value.
pub struct EntryEngine<'a> {
    config: &'a Config,
}

impl<'a> EntryEngine<'a> {
    /// Creates an entry engine over the run configuration.
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Selects candidates and prices their limit orders.
    ///
    /// Walks the date's candidates in ranking order and emits at most
    /// `min(daily_entries_cap, open slots)` orders, skipping symbols that
    /// already have a position or a pending order. A symbol whose computed
    /// size rounds to zero is skipped without consuming a slot, so a
    /// lower-ranked candidate can still take it.
    ///
    /// ### Arguments
    /// * `date` - The date being simulated.
    /// * `market` - The symbol universe (previous closes).
    /// * `candidates` - The ranked candidate feed.
    /// * `book` - Pending orders (per-symbol exclusion).
    /// * `registry` - Open positions (slot count and per-symbol exclusion).
    /// * `portfolio_value` - Current capital used for sizing.
    /// * `skips` - Recoverable-condition counters.
    ///
    /// ### Returns
    /// The new orders, in selection order.
    #[allow(clippy::too_many_arguments)]
    pub fn propose(
        &self,
        date: NaiveDate,
        market: &MarketData,
        candidates: &CandidateFeed,
        book: &OrderBook,
        registry: &PositionRegistry,
        portfolio_value: f64,
        skips: &mut SkipCounters,
    ) -> Vec<PendingOrder> {
        let open_slots = self.config.active_positions_cap.saturating_sub(registry.len());
        if open_slots == 0 {
            return Vec::new();
        }
        let budget = open_slots.min(self.config.daily_entries_cap);

        let mut orders = Vec::new();
        for candidate in candidates.ranked_on(date) {
            if orders.len() == budget {
                break;
            }
            let symbol = candidate.symbol();
            if registry.has(symbol) || book.has(symbol) {
                continue;
            }

            let Some(prev_close) = market.get(symbol).and_then(|s| s.close_before(date)) else {
                debug!("{date} {symbol}: no previous close, skipping entry");
                skips.data_gaps += 1;
                continue;
            };

            let limit_price = prev_close.add_frac(self.config.entry_limit_pct);
            let size = (self.config.position_size_pct * portfolio_value / limit_price).floor();
            if size < 1.0 {
                debug!("{date} {symbol}: allocation too small for one share, skipping entry");
                skips.zero_size += 1;
                continue;
            }

            orders.push(PendingOrder::new(symbol, limit_price, size, date));
        }

        orders
    }
}

#[cfg(test)]
mod tests {
    use super::super::candidates::Candidate;
    use super::super::market::{Bar, PriceSeries};
    use super::*;
    use crate::config::sample_config;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn market_of(symbols: &[&str]) -> MarketData {
        let mut market = MarketData::new();
        for symbol in symbols {
            let bars = (1..=9)
                .map(|d| Bar::from((day(d), 100.0, 101.0, 99.0, 100.0, 1_000.0)))
                .collect();
            market.insert(*symbol, PriceSeries::new(bars).unwrap());
        }
        market
    }

    fn feed_of(rows: &[(&str, f64)]) -> CandidateFeed {
        let mut feed = CandidateFeed::new();
        for (symbol, score) in rows {
            feed.push(Candidate::new(day(5), *symbol, *score));
        }
        feed
    }

    #[test]
    fn prices_limit_from_previous_close() {
        let config = sample_config();
        let market = market_of(&["AAA"]);
        let feed = feed_of(&[("AAA", 40.0)]);
        let mut skips = SkipCounters::default();

        let orders = EntryEngine::new(&config).propose(
            day(5),
            &market,
            &feed,
            &OrderBook::default(),
            &PositionRegistry::default(),
            100_000.0,
            &mut skips,
        );

        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].limit_price(), 104.0); // 100 * 1.04
        assert_eq!(orders[0].size(), 96.0); // floor(0.1 * 100_000 / 104)
        assert_eq!(orders[0].issued(), day(5));
    }

    #[test]
    fn respects_slot_budget_and_ranking() {
        let mut config = sample_config();
        config.active_positions_cap = 5;
        config.daily_entries_cap = 5;
        let symbols = ["AAA", "BBB", "CCC", "DDD", "EEE", "FFF", "GGG", "HHH"];
        let market = market_of(&symbols);
        let feed = feed_of(&[
            ("AAA", 48.0),
            ("BBB", 47.0),
            ("CCC", 46.0),
            ("DDD", 45.0),
            ("EEE", 44.0),
            ("FFF", 43.0),
            ("GGG", 42.0),
            ("HHH", 41.0),
        ]);
        let mut skips = SkipCounters::default();

        let orders = EntryEngine::new(&config).propose(
            day(5),
            &market,
            &feed,
            &OrderBook::default(),
            &PositionRegistry::default(),
            100_000.0,
            &mut skips,
        );

        let picked: Vec<&str> = orders.iter().map(|o| o.symbol()).collect();
        assert_eq!(picked, vec!["AAA", "BBB", "CCC", "DDD", "EEE"]);
    }

    #[test]
    fn daily_cap_limits_below_open_slots() {
        let mut config = sample_config();
        config.active_positions_cap = 5;
        config.daily_entries_cap = 2;
        let market = market_of(&["AAA", "BBB", "CCC"]);
        let feed = feed_of(&[("AAA", 48.0), ("BBB", 47.0), ("CCC", 46.0)]);
        let mut skips = SkipCounters::default();

        let orders = EntryEngine::new(&config).propose(
            day(5),
            &market,
            &feed,
            &OrderBook::default(),
            &PositionRegistry::default(),
            100_000.0,
            &mut skips,
        );
        assert_eq!(orders.len(), 2);
    }

    #[test]
    fn skips_symbols_already_engaged() {
        let config = sample_config();
        let market = market_of(&["AAA", "BBB", "CCC"]);
        let feed = feed_of(&[("AAA", 48.0), ("BBB", 47.0), ("CCC", 46.0)]);
        let mut skips = SkipCounters::default();

        let mut book = OrderBook::default();
        book.place(PendingOrder::new("AAA", 104.0, 10.0, day(4))).unwrap();
        let mut registry = PositionRegistry::default();
        let order = PendingOrder::new("BBB", 104.0, 10.0, day(4));
        registry
            .open(super::super::position::Position::open(&order, day(5), 0, 2.0, &config))
            .unwrap();

        let orders = EntryEngine::new(&config).propose(day(5), &market, &feed, &book, &registry, 100_000.0, &mut skips);
        let picked: Vec<&str> = orders.iter().map(|o| o.symbol()).collect();
        assert_eq!(picked, vec!["CCC"]);
    }

    #[test]
    fn zero_size_does_not_consume_a_slot() {
        let mut config = sample_config();
        config.active_positions_cap = 1;
        config.position_size_pct = 0.1;
        let market = market_of(&["AAA", "BBB"]);
        let feed = feed_of(&[("AAA", 48.0), ("BBB", 47.0)]);
        let mut skips = SkipCounters::default();

        // 0.1 * 500 = 50: less than one share at ~104, for either symbol
        let orders = EntryEngine::new(&config).propose(
            day(5),
            &market,
            &feed,
            &OrderBook::default(),
            &PositionRegistry::default(),
            500.0,
            &mut skips,
        );
        assert!(orders.is_empty());
        assert_eq!(skips.zero_size, 2);
    }

    #[test]
    fn no_slots_no_orders() {
        let mut config = sample_config();
        config.active_positions_cap = 1;
        let market = market_of(&["AAA", "BBB"]);
        let feed = feed_of(&[("AAA", 48.0), ("BBB", 47.0)]);
        let mut skips = SkipCounters::default();

        let mut registry = PositionRegistry::default();
        let order = PendingOrder::new("BBB", 104.0, 10.0, day(4));
        registry
            .open(super::super::position::Position::open(&order, day(5), 0, 2.0, &config))
            .unwrap();

        let orders =
            EntryEngine::new(&config).propose(day(5), &market, &feed, &OrderBook::default(), &registry, 100_000.0, &mut skips);
        assert!(orders.is_empty());
    }

    #[test]
    fn missing_previous_close_is_counted() {
        let config = sample_config();
        let market = market_of(&["AAA"]);
        let mut feed = feed_of(&[("AAA", 48.0)]);
        feed.push(Candidate::new(day(5), "ZZZ", 50.0)); // not in the universe
        let mut skips = SkipCounters::default();

        let orders = EntryEngine::new(&config).propose(
            day(5),
            &market,
            &feed,
            &OrderBook::default(),
            &PositionRegistry::default(),
            100_000.0,
            &mut skips,
        );

        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].symbol(), "AAA");
        assert_eq!(skips.data_gaps, 1);
    }
}
