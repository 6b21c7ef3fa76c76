#[cfg(feature = "serde")]
use std::collections::BTreeMap;
#[cfg(feature = "serde")]
use std::path::PathBuf;

#[cfg(feature = "serde")]
use crate::engine::{Bar, Candidate, CandidateFeed, MarketData, PriceSeries};
#[cfg(feature = "serde")]
use crate::errors::Result;

/// Generates a random ID.
pub fn random_id() -> u32 {
    rand::random()
}

#[cfg(feature = "serde")]
/// Reads a `symbol → bars` JSON map from `filepath` into a [`MarketData`].
///
/// Each symbol's bars must be sorted ascending by date.
pub fn market_from_file(filepath: PathBuf) -> Result<MarketData> {
    use std::{fs::File, io::BufReader};

    let file = File::open(filepath)?;
    let reader = BufReader::new(file);
    let raw: BTreeMap<String, Vec<Bar>> = serde_json::from_reader(reader)?;

    let mut market = MarketData::new();
    for (symbol, bars) in raw {
        market.insert(symbol, PriceSeries::new(bars)?);
    }
    Ok(market)
}

#[cfg(feature = "serde")]
/// Reads an array of candidate rows from `filepath` into a [`CandidateFeed`].
pub fn candidates_from_file(filepath: PathBuf) -> Result<CandidateFeed> {
    use std::{fs::File, io::BufReader};

    let file = File::open(filepath)?;
    let reader = BufReader::new(file);
    let rows: Vec<Candidate> = serde_json::from_reader(reader)?;

    let mut feed = CandidateFeed::new();
    for row in rows {
        feed.push(row);
    }
    Ok(feed)
}
