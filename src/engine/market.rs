//! Price data: daily bars, per-symbol series, and the symbol universe.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;

use crate::errors::{Error, Result};

/// One day of OHLCV data for a single symbol.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    #[cfg_attr(feature = "serde", serde(alias = "Date"))]
    date: NaiveDate,
    #[cfg_attr(feature = "serde", serde(alias = "Open"))]
    open: f64,
    #[cfg_attr(feature = "serde", serde(alias = "High"))]
    high: f64,
    #[cfg_attr(feature = "serde", serde(alias = "Low"))]
    low: f64,
    #[cfg_attr(feature = "serde", serde(alias = "Close"))]
    close: f64,
    #[cfg_attr(feature = "serde", serde(alias = "Volume"))]
    volume: f64,
}

impl From<(NaiveDate, f64, f64, f64, f64, f64)> for Bar {
    fn from((date, open, high, low, close, volume): (NaiveDate, f64, f64, f64, f64, f64)) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

impl Bar {
    /// Returns the trading date.
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Returns the opening price.
    pub fn open(&self) -> f64 {
        self.open
    }

    /// Returns the session high.
    pub fn high(&self) -> f64 {
        self.high
    }

    /// Returns the session low.
    pub fn low(&self) -> f64 {
        self.low
    }

    /// Returns the closing price.
    pub fn close(&self) -> f64 {
        self.close
    }

    /// Returns the traded volume.
    pub fn volume(&self) -> f64 {
        self.volume
    }
}

/// A single symbol's bars, sorted ascending by date.
///
/// The series is expected to carry enough lead history before the backtest
/// start date to seed the ATR window.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    bars: Vec<Bar>,
    by_date: HashMap<NaiveDate, usize>,
}

impl PriceSeries {
    /// Builds a series from bars.
    ///
    /// ### Arguments
    /// * `bars` - Non-empty, strictly ascending by date, gap-free values.
    ///
    /// ### Returns
    /// The new series, or an error when the bars are empty or out of order.
    pub fn new(bars: Vec<Bar>) -> Result<Self> {
        if bars.is_empty() {
            return Err(Error::EmptySeries);
        }
        for pair in bars.windows(2) {
            if pair[1].date() <= pair[0].date() {
                return Err(Error::NonAscendingSeries(pair[1].date()));
            }
        }
        let by_date = bars.iter().enumerate().map(|(i, b)| (b.date(), i)).collect();
        Ok(Self { bars, by_date })
    }

    /// Returns the bars in date order.
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    /// Returns the index of the bar on `date`, if the symbol traded that day.
    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.by_date.get(&date).copied()
    }

    /// Returns the bar on `date`, if the symbol traded that day.
    pub fn bar_on(&self, date: NaiveDate) -> Option<&Bar> {
        self.index_of(date).map(|i| &self.bars[i])
    }

    /// Returns the close of the bar immediately before `date`.
    ///
    /// None when the symbol has no bar on `date` or `date` is its first bar.
    pub fn close_before(&self, date: NaiveDate) -> Option<f64> {
        let index = self.index_of(date)?;
        index.checked_sub(1).map(|i| self.bars[i].close())
    }

    /// True range at `index`: the greatest of high−low, |high−previous close|
    /// and |low−previous close|. None on the first bar.
    fn true_range(&self, index: usize) -> Option<f64> {
        let prev_close = self.bars.get(index.checked_sub(1)?)?.close();
        let bar = self.bars.get(index)?;
        let range = bar.high() - bar.low();
        Some(range.max((bar.high() - prev_close).abs()).max((bar.low() - prev_close).abs()))
    }

    /// Average true range over the `period` bars ending at `index`.
    ///
    /// A simple rolling mean of true range; None until the window is
    /// complete (every true range in it needs a previous close).
    pub fn atr_at(&self, index: usize, period: usize) -> Option<f64> {
        if period == 0 || index < period || index >= self.bars.len() {
            return None;
        }
        let mut sum = 0.0;
        for i in (index + 1 - period)..=index {
            sum += self.true_range(i)?;
        }
        Some(sum / period as f64)
    }
}

/// The symbol universe: symbol → price series.
///
/// Symbols are kept in a sorted map so every per-date pass over the universe
/// visits them in the same order, which keeps runs deterministic.
#[derive(Debug, Clone, Default)]
pub struct MarketData {
    series: BTreeMap<String, PriceSeries>,
}

impl MarketData {
    /// Creates an empty universe.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a symbol's series.
    pub fn insert(&mut self, symbol: impl Into<String>, series: PriceSeries) {
        self.series.insert(symbol.into(), series);
    }

    /// Returns a symbol's series.
    pub fn get(&self, symbol: &str) -> Option<&PriceSeries> {
        self.series.get(symbol)
    }

    /// Returns the number of symbols.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// True when the universe holds no symbols.
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Iterates symbols and their series in symbol order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &PriceSeries)> {
        self.series.iter()
    }

    /// Closing price of `symbol` on `date`, if it traded that day.
    pub fn close_on(&self, symbol: &str, date: NaiveDate) -> Option<f64> {
        self.get(symbol)?.bar_on(date).map(|b| b.close())
    }

    /// Union trading calendar: every date on which at least one symbol has a
    /// bar, clipped to `[start, end]`, ascending.
    pub fn calendar(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        let mut dates = BTreeSet::new();
        for series in self.series.values() {
            for bar in series.bars() {
                if bar.date() >= start && bar.date() <= end {
                    dates.insert(bar.date());
                }
            }
        }
        dates.into_iter().collect()
    }
}

#[cfg(test)]
fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

#[cfg(test)]
fn flat_bars(days: std::ops::RangeInclusive<u32>) -> Vec<Bar> {
    days.map(|d| Bar::from((day(d), 100.0, 101.0, 99.0, 100.0, 1_000.0))).collect()
}

#[cfg(test)]
#[test]
fn rejects_empty_series() {
    assert!(matches!(PriceSeries::new(vec![]), Err(Error::EmptySeries)));
}

#[cfg(test)]
#[test]
fn rejects_unsorted_series() {
    let mut bars = flat_bars(1..=3);
    bars.swap(0, 2);
    assert!(matches!(PriceSeries::new(bars), Err(Error::NonAscendingSeries(_))));
}

#[cfg(test)]
#[test]
fn rejects_duplicate_dates() {
    let mut bars = flat_bars(1..=2);
    bars.push(bars[1]);
    assert!(matches!(PriceSeries::new(bars), Err(Error::NonAscendingSeries(_))));
}

#[cfg(test)]
#[test]
fn date_lookups() {
    let series = PriceSeries::new(flat_bars(1..=5)).unwrap();
    assert_eq!(series.index_of(day(3)), Some(2));
    assert_eq!(series.bar_on(day(3)).unwrap().date(), day(3));
    assert_eq!(series.close_before(day(3)), Some(100.0));
    assert_eq!(series.close_before(day(1)), None);
    assert!(series.bar_on(day(9)).is_none());
}

#[cfg(test)]
#[test]
fn atr_flat_range() {
    // high-low is 2.0 on every bar and gaps are smaller, so ATR is 2.0.
    let series = PriceSeries::new(flat_bars(1..=10)).unwrap();
    assert_eq!(series.atr_at(5, 3), Some(2.0));
    assert_eq!(series.atr_at(9, 9), Some(2.0));
}

#[cfg(test)]
#[test]
fn atr_includes_gap_over_previous_close() {
    let mut bars = flat_bars(1..=4);
    // gap up: high 106 with previous close 100 gives a true range of 6
    bars.push(Bar::from((day(5), 104.0, 106.0, 103.0, 105.0, 1_000.0)));
    let series = PriceSeries::new(bars).unwrap();
    // window over days 3..=5: 2.0, 2.0, 6.0
    let atr = series.atr_at(4, 3).unwrap();
    assert!((atr - 10.0 / 3.0).abs() < 1e-12);
}

#[cfg(test)]
#[test]
fn atr_needs_full_window() {
    let series = PriceSeries::new(flat_bars(1..=5)).unwrap();
    assert_eq!(series.atr_at(2, 3), None);
    assert_eq!(series.atr_at(3, 3), Some(2.0));
    assert_eq!(series.atr_at(7, 3), None);
}

#[cfg(test)]
#[test]
fn union_calendar_is_clipped_and_sorted() {
    let mut market = MarketData::new();
    market.insert("AAA", PriceSeries::new(flat_bars(1..=4)).unwrap());
    market.insert("BBB", PriceSeries::new(flat_bars(3..=6)).unwrap());

    let calendar = market.calendar(day(2), day(5));
    assert_eq!(calendar, vec![day(2), day(3), day(4), day(5)]);
}
