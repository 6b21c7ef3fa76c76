//! Ranked short candidates, one batch per date.
//!
//! The ranking score is produced upstream (a trend-strength indicator such as
//! ADX); this crate only consumes it. A date with no rows simply yields no
//! entries that day.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::NaiveDate;

/// One candidate row: a symbol eligible for a short entry on a date.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    #[cfg_attr(feature = "serde", serde(alias = "Date"))]
    date: NaiveDate,
    #[cfg_attr(feature = "serde", serde(alias = "Ticker"))]
    symbol: String,
    #[cfg_attr(feature = "serde", serde(alias = "Score"))]
    score: f64,
}

impl Candidate {
    /// Creates a candidate row.
    ///
    /// ### Arguments
    /// * `date` - The date the symbol is eligible for entry.
    /// * `symbol` - The ticker.
    /// * `score` - External ranking score (higher ranks first).
    pub fn new(date: NaiveDate, symbol: impl Into<String>, score: f64) -> Self {
        Self {
            date,
            symbol: symbol.into(),
            score,
        }
    }

    /// Returns the eligibility date.
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Returns the ticker.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Returns the external ranking score.
    pub fn score(&self) -> f64 {
        self.score
    }
}

/// All candidate rows of a run, grouped by date in arrival order.
#[derive(Debug, Clone, Default)]
pub struct CandidateFeed {
    rows: BTreeMap<NaiveDate, Vec<Candidate>>,
}

impl CandidateFeed {
    /// Creates an empty feed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a candidate row, keeping its arrival position within the date.
    pub fn push(&mut self, candidate: Candidate) {
        self.rows.entry(candidate.date()).or_default().push(candidate);
    }

    /// Returns the number of rows across all dates.
    pub fn len(&self) -> usize {
        self.rows.values().map(Vec::len).sum()
    }

    /// True when the feed holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Candidates for `date`, ranked by score descending.
    ///
    /// The sort is stable, so rows with equal scores keep their feed order
    /// (the tie-break rule for slot allocation).
    pub fn ranked_on(&self, date: NaiveDate) -> Vec<&Candidate> {
        let mut ranked: Vec<&Candidate> = self.rows.get(&date).map(|v| v.iter().collect()).unwrap_or_default();
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        ranked
    }
}

#[cfg(test)]
fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

#[cfg(test)]
#[test]
fn ranks_by_score_descending() {
    let mut feed = CandidateFeed::new();
    feed.push(Candidate::new(day(2), "AAA", 31.0));
    feed.push(Candidate::new(day(2), "BBB", 44.0));
    feed.push(Candidate::new(day(2), "CCC", 38.5));

    let ranked = feed.ranked_on(day(2));
    let symbols: Vec<&str> = ranked.iter().map(|c| c.symbol()).collect();
    assert_eq!(symbols, vec!["BBB", "CCC", "AAA"]);
}

#[cfg(test)]
#[test]
fn equal_scores_keep_feed_order() {
    let mut feed = CandidateFeed::new();
    feed.push(Candidate::new(day(2), "ZZZ", 40.0));
    feed.push(Candidate::new(day(2), "AAA", 40.0));
    feed.push(Candidate::new(day(2), "MMM", 40.0));

    let ranked = feed.ranked_on(day(2));
    let symbols: Vec<&str> = ranked.iter().map(|c| c.symbol()).collect();
    assert_eq!(symbols, vec!["ZZZ", "AAA", "MMM"]);
}

#[cfg(test)]
#[test]
fn empty_date_yields_no_candidates() {
    let mut feed = CandidateFeed::new();
    feed.push(Candidate::new(day(2), "AAA", 40.0));
    assert!(feed.ranked_on(day(3)).is_empty());
}
