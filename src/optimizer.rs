//! Strategy parameter optimization.
//!
//! This module provides tools to search the configuration space by rerunning
//! the simulation for each parameter combination. The `Optimizer` struct
//! handles the execution of the runs, while the `ParameterCombination` trait
//! defines how to generate parameter sets.

use std::marker::PhantomData;

use crate::config::Config;
use crate::engine::{CandidateFeed, MarketData, Simulation};
use crate::errors::Result;

use rayon::prelude::*;

/// Trait defining how to generate parameter combinations for optimization.
///
/// Implement this trait for your parameter types to define how combinations
/// should be generated. The associated type `Output` represents a single
/// parameter combination (e.g., a tuple of values).
pub trait ParameterCombination: Sync {
    /// Type representing a single parameter combination (e.g., `(usize, f64)`).
    type Output: Clone + Send + Sync;

    /// Generates all possible parameter combinations to test.
    ///
    /// # Returns
    /// A vector containing all parameter combinations.
    fn generate() -> Vec<Self::Output>;
}

/// Optimizer for sweeping a simulation over parameter combinations.
///
/// Holds the fixed inputs (market data and candidate feed) and reruns the
/// simulation once per combination, in parallel across chunks.
pub struct Optimizer<PC: ParameterCombination> {
    market: MarketData,
    candidates: CandidateFeed,
    _marker: PhantomData<PC>,
}

impl<PC: ParameterCombination> From<&Simulation> for Optimizer<PC> {
    fn from(value: &Simulation) -> Self {
        Self {
            _marker: PhantomData,
            market: value.market().clone(),
            candidates: value.candidates().clone(),
        }
    }
}

impl<PC: ParameterCombination> Optimizer<PC> {
    /// Creates a new `Optimizer` over fixed run inputs.
    ///
    /// ### Arguments
    /// * `market` - The symbol universe every run shares.
    /// * `candidates` - The ranked candidate feed every run shares.
    pub fn new(market: MarketData, candidates: CandidateFeed) -> Self {
        Self {
            market,
            candidates,
            _marker: PhantomData,
        }
    }

    /// Runs the simulation once per parameter combination.
    ///
    /// ### Arguments
    /// * `combinator` - Function that turns a parameter combination into a
    ///   run configuration.
    ///
    /// ### Returns
    /// A vector of tuples containing each parameter combination and the
    /// final portfolio value its run produced.
    ///
    /// ### Errors
    /// Returns an error if a configuration is rejected or a run fails.
    pub fn with<C>(&self, combinator: C) -> Result<Vec<(PC::Output, f64)>>
    where
        C: Fn(&PC::Output) -> Result<Config> + Sync,
    {
        let num_cpus = num_cpus::get();
        let combinations = PC::generate();
        let chunk_size = combinations.len().div_ceil(num_cpus).max(1);

        combinations
            .par_chunks(chunk_size)
            .map::<_, Result<_>>(|par_combinations| {
                let mut local_results = Vec::with_capacity(par_combinations.len());

                for param_set in par_combinations {
                    let config = combinator(param_set)?;
                    let mut simulation = Simulation::new(config, self.market.clone(), self.candidates.clone())?;
                    simulation.run()?;
                    local_results.push((param_set.clone(), simulation.account().portfolio_value()));
                }

                Ok(local_results)
            })
            .collect::<Result<Vec<_>>>()
            .map(|chunks| chunks.into_iter().flatten().collect())
    }
}

#[cfg(test)]
#[derive(Clone)]
struct Parameters;

#[cfg(test)]
impl ParameterCombination for Parameters {
    type Output = (usize, f64);

    fn generate() -> Vec<Self::Output> {
        let horizons = [1, 2, 3];
        horizons
            .iter()
            .flat_map(|&days| [0.02, 0.04].map(move |target| (days, target)))
            .collect()
    }
}

#[cfg(test)]
#[test]
fn sweep_over_exit_parameters() {
    use crate::config::sample_config;
    use crate::engine::{Bar, Candidate, PriceSeries};
    use chrono::NaiveDate;

    let day = |d: u32| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();

    let mut bars = Vec::new();
    for d in 1..=8 {
        bars.push(Bar::from((day(d), 100.0, 101.0, 99.0, 100.0, 1_000.0)));
    }
    bars.push(Bar::from((day(9), 100.0, 105.0, 99.0, 100.0, 1_000.0)));
    bars.push(Bar::from((day(10), 100.0, 100.0, 99.0, 99.5, 1_000.0)));
    bars.push(Bar::from((day(11), 99.5, 100.0, 99.0, 100.0, 1_000.0)));
    let mut market = MarketData::new();
    market.insert("AAA", PriceSeries::new(bars).unwrap());

    let mut candidates = CandidateFeed::new();
    candidates.push(Candidate::new(day(8), "AAA", 40.0));

    let optimizer = Optimizer::<Parameters>::new(market, candidates);
    let results = optimizer
        .with(|&(exit_time_days, profit_target_pct)| {
            let mut config = sample_config();
            config.start_date = day(8);
            config.end_date = day(11);
            config.exit_time_days = exit_time_days;
            config.profit_target_pct = profit_target_pct;
            Ok(config)
        })
        .unwrap();

    assert_eq!(results.len(), 6);
    for (_, portfolio_value) in &results {
        assert!(portfolio_value.is_finite());
        assert!(*portfolio_value > 0.0);
    }
}
