//! End-to-end runs over small hand-built markets.

use chrono::NaiveDate;
use proptest::prelude::*;

use super::*;
use crate::config::sample_config;
use crate::metrics::Metrics;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

fn flat_bar(d: u32) -> Bar {
    Bar::from((day(d), 100.0, 101.0, 99.0, 100.0, 1_000.0))
}

// Eight flat lead-in bars, a spike on day 9 that fills a 104 limit order,
// then per-day close overrides. ATR on the spike bar (period 3) is
// (2 + 2 + 6) / 3 = 10/3, so the frozen stop is 104 + 3 × 10/3 = 114.
fn scenario_market(overrides: &[(u32, f64)]) -> MarketData {
    let mut bars: Vec<Bar> = (1..=8).map(flat_bar).collect();
    bars.push(Bar::from((day(9), 100.0, 105.0, 99.0, 100.0, 1_000.0)));
    for d in 10..=12 {
        let close = overrides
            .iter()
            .find(|(od, _)| *od == d)
            .map(|(_, c)| *c)
            .unwrap_or(100.0);
        bars.push(Bar::from((day(d), close, close.max(101.0), close.min(99.0), close, 1_000.0)));
    }

    let mut market = MarketData::new();
    market.insert("AAA", PriceSeries::new(bars).unwrap());
    market
}

fn scenario_candidates() -> CandidateFeed {
    let mut feed = CandidateFeed::new();
    feed.push(Candidate::new(day(8), "AAA", 40.0));
    feed
}

fn scenario_config() -> crate::config::Config {
    let mut config = sample_config();
    config.start_date = day(8);
    config.end_date = day(12);
    config
}

#[test]
fn entry_fills_at_limit_on_the_next_bar() {
    let mut config = scenario_config();
    config.exit_time_days = 30; // no exit inside the window
    let mut sim = Simulation::new(config, scenario_market(&[]), scenario_candidates()).unwrap();
    sim.run().unwrap();

    // prev close 100 + 4% → limit 104, filled by the day-9 high of 105
    let position = sim.registry().get("AAA").unwrap();
    assert_eq!(position.entry_price(), 104.0);
    assert_eq!(position.entry_date(), day(9));
    assert_eq!(position.size(), 96.0); // floor(0.1 × 100_000 / 104)
    assert!(sim.ledger().is_empty());
    assert!(sim.orders().is_empty());
}

#[test]
fn stop_loss_closes_at_the_breaching_close() {
    let mut config = scenario_config();
    config.exit_time_days = 30;
    let mut sim = Simulation::new(config, scenario_market(&[(10, 114.5)]), scenario_candidates()).unwrap();
    sim.run().unwrap();

    let trade = &sim.ledger().trades()[0];
    assert_eq!(trade.exit_date(), day(10));
    assert_eq!(trade.exit_price(), 114.5);
    assert!(trade.net_pnl() < 0.0);
    let ExitReason::StopLoss { stop_price, atr_at_entry } = trade.reason() else {
        panic!("expected a stop-loss exit");
    };
    assert!((stop_price - 114.0).abs() < 1e-9);
    assert!((atr_at_entry - 10.0 / 3.0).abs() < 1e-12);
    assert!(sim.registry().is_empty());
}

#[test]
fn profit_target_closes_at_the_reaching_close() {
    let mut config = scenario_config();
    config.exit_time_days = 30;
    let mut sim = Simulation::new(config, scenario_market(&[(10, 99.5)]), scenario_candidates()).unwrap();
    sim.run().unwrap();

    let trade = &sim.ledger().trades()[0];
    assert_eq!(trade.exit_price(), 99.5);
    assert!(matches!(trade.reason(), ExitReason::ProfitTarget { .. }));
    // (104 − 99.5) × 96 − 0.002 × 96 × (104 + 99.5)
    assert!((trade.net_pnl() - 392.928).abs() < 1e-9);
}

#[test]
fn time_exit_after_the_holding_horizon() {
    // flat closes: neither the stop at 114 nor the target at 99.84 triggers
    let mut sim = Simulation::new(scenario_config(), scenario_market(&[]), scenario_candidates()).unwrap();
    sim.run().unwrap();

    let trade = &sim.ledger().trades()[0];
    assert_eq!(trade.exit_date(), day(11)); // entry day 9 + 2 trading days
    assert_eq!(trade.exit_price(), 100.0);
    assert_eq!(
        trade.reason(),
        &ExitReason::TimeExit {
            target_date: day(11),
            days_held: 2
        }
    );
}

#[test]
fn priority_override_decides_conflicting_triggers() {
    // day 10: close 114.5 breaches the stop AND the 1-day horizon elapsed
    let mut config = scenario_config();
    config.exit_time_days = 1;
    let market = scenario_market(&[(10, 114.5)]);

    let mut sim = Simulation::new(config.clone(), market.clone(), scenario_candidates()).unwrap();
    sim.run().unwrap();
    assert_eq!(sim.ledger().trades()[0].reason().trigger(), ExitTrigger::StopLoss);

    config.exit_priority =
        ExitPriority::new([ExitTrigger::TimeExit, ExitTrigger::StopLoss, ExitTrigger::ProfitTarget]).unwrap();
    let mut sim = Simulation::new(config, market, scenario_candidates()).unwrap();
    sim.run().unwrap();
    assert_eq!(sim.ledger().trades()[0].reason().trigger(), ExitTrigger::TimeExit);
}

#[test]
fn capacity_limits_to_the_top_ranked_candidates() {
    let symbols = ["AAA", "BBB", "CCC", "DDD", "EEE", "FFF", "GGG", "HHH"];
    let mut market = MarketData::new();
    for symbol in symbols {
        let mut bars: Vec<Bar> = (1..=8).map(flat_bar).collect();
        bars.push(Bar::from((day(9), 100.0, 105.0, 99.0, 100.0, 1_000.0)));
        bars.push(flat_bar(10));
        market.insert(symbol, PriceSeries::new(bars).unwrap());
    }

    // DDD, EEE, and FFF are tied; feed order breaks the tie
    let mut candidates = CandidateFeed::new();
    for (symbol, score) in [
        ("AAA", 48.0),
        ("BBB", 47.0),
        ("CCC", 46.0),
        ("DDD", 45.0),
        ("EEE", 45.0),
        ("FFF", 45.0),
        ("GGG", 44.0),
        ("HHH", 43.0),
    ] {
        candidates.push(Candidate::new(day(8), symbol, score));
    }

    let mut config = scenario_config();
    config.end_date = day(10);
    config.exit_time_days = 30;
    let mut sim = Simulation::new(config, market, candidates).unwrap();
    sim.run().unwrap();

    assert_eq!(sim.registry().len(), 5);
    let held: Vec<&str> = sim.registry().iter().map(Position::symbol).collect();
    assert_eq!(held, vec!["AAA", "BBB", "CCC", "DDD", "EEE"]);
    assert!(sim.ledger().is_empty());
}

#[test]
fn degenerate_trade_window_sharpe_is_zero() {
    // flat closes throughout the holding window: every daily return is 0
    let mut sim = Simulation::new(scenario_config(), scenario_market(&[]), scenario_candidates()).unwrap();
    sim.run().unwrap();

    let metrics = Metrics::from(&sim);
    assert_eq!(metrics.trade_count(), 1);
    assert_eq!(metrics.trade_stats()[0].window_sharpe(), 0.0);
    assert_eq!(metrics.trade_stats()[0].window_return_pct(), 0.0);
}

#[test]
fn net_pnl_reconciles_with_the_account() {
    let mut sim = Simulation::new(scenario_config(), scenario_market(&[(10, 99.5)]), scenario_candidates()).unwrap();
    sim.run().unwrap();

    let total = sim.ledger().total_net_pnl();
    assert!((sim.account().portfolio_value() - (100_000.0 + total)).abs() < 1e-9);
    assert!((sim.account().realized_pnl() - total).abs() < 1e-9);
}

#[test]
fn rerun_on_identical_inputs_is_identical() {
    let run = || {
        let mut sim = Simulation::new(scenario_config(), scenario_market(&[(10, 99.5)]), scenario_candidates()).unwrap();
        sim.run().unwrap();
        sim
    };

    let first = run();
    let second = run();
    assert_eq!(first.ledger().trades(), second.ledger().trades());
    assert_eq!(first.snapshots(), second.snapshots());

    // reset clears every piece of run state
    let mut sim = run();
    sim.reset();
    assert!(sim.ledger().is_empty());
    assert!(sim.registry().is_empty());
    assert!(sim.orders().is_empty());
    assert!(sim.snapshots().is_empty());
    assert_eq!(sim.account().portfolio_value(), 100_000.0);
    sim.run().unwrap();
    assert_eq!(sim.ledger().trades(), first.ledger().trades());
}

fn series_from_closes(closes: &[f64]) -> PriceSeries {
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar::from((day(i as u32 + 1), close, close + 2.0, close - 2.0, close, 1_000.0)))
        .collect();
    PriceSeries::new(bars).unwrap()
}

fn random_walk() -> impl Strategy<Value = Vec<f64>> {
    proptest::collection::vec(50.0..150.0f64, 20)
}

proptest! {
    #[test]
    fn run_invariants_hold_on_random_walks(a in random_walk(), b in random_walk(), c in random_walk()) {
        let mut market = MarketData::new();
        market.insert("AAA", series_from_closes(&a));
        market.insert("BBB", series_from_closes(&b));
        market.insert("CCC", series_from_closes(&c));

        let mut candidates = CandidateFeed::new();
        for d in 5..=19 {
            for (i, symbol) in ["AAA", "BBB", "CCC"].iter().enumerate() {
                candidates.push(Candidate::new(day(d), *symbol, ((d as usize + i) % 7) as f64));
            }
        }

        let mut config = sample_config();
        config.start_date = day(5);
        config.end_date = day(20);
        config.active_positions_cap = 2;
        config.daily_entries_cap = 2;

        let mut sim = Simulation::new(config.clone(), market.clone(), candidates.clone()).unwrap();
        sim.run().unwrap();

        // cash identity: every realized cent is on the ledger
        let total = sim.ledger().total_net_pnl();
        prop_assert!((sim.account().portfolio_value() - (config.capital + total)).abs() < 1e-6);

        for trade in sim.ledger().trades() {
            prop_assert!(trade.exit_date() > trade.entry_date());
            prop_assert!(trade.days_held() >= 1);
            let expected = (trade.entry_price() - trade.exit_price()) * trade.size() - trade.commission();
            prop_assert!((trade.net_pnl() - expected).abs() < 1e-9);
        }

        // at most one position per symbol at any time: holding windows
        // of the same symbol never overlap
        for symbol in ["AAA", "BBB", "CCC"] {
            let mut windows: Vec<_> = sim
                .ledger()
                .trades()
                .iter()
                .filter(|t| t.symbol() == symbol)
                .map(|t| (t.entry_date(), t.exit_date()))
                .collect();
            windows.sort();
            for pair in windows.windows(2) {
                prop_assert!(pair[1].0 > pair[0].1);
            }
        }

        // open positions never exceed the cap; a snapshot also carries the
        // symbols closed that same date
        for snapshot in sim.snapshots() {
            let closed_today = sim
                .ledger()
                .trades()
                .iter()
                .filter(|t| t.exit_date() == snapshot.date())
                .count();
            prop_assert!(snapshot.signed_sizes().len() - closed_today <= config.active_positions_cap);
        }

        // determinism: the random order ids never leak into the outputs
        let mut second = Simulation::new(config, market, candidates).unwrap();
        second.run().unwrap();
        prop_assert_eq!(sim.ledger().trades(), second.ledger().trades());
        prop_assert_eq!(sim.snapshots(), second.snapshots());
    }
}
