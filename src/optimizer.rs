//! Strategy parameter optimization.
//!
//! Runs are independent: every parameter combination gets its own [`Backtest`] over
//! the same candles, so combinations are spread over a `rayon` pool. The
//! `ParameterCombination` trait defines how to generate parameter sets and the
//! combinator turns one set into a [`Config`].

use std::marker::PhantomData;

use rayon::prelude::*;
use tracing::debug;

use crate::config::Config;
use crate::engine::{Backtest, Candle};
use crate::errors::{Error, Result};
use crate::stats::Report;

/// Trait defining how to generate parameter combinations for optimization.
///
/// The associated type `Output` represents a single parameter combination (e.g., a tuple of values).
pub trait ParameterCombination: Sync {
    /// Type representing a single parameter combination (e.g., `(usize, f64)`).
    type Output: Clone + Send + Sync;

    /// Generates all parameter combinations to test.
    fn generate() -> Vec<Self::Output>;
}

/// Replays the same candles once per parameter combination.
#[derive(Debug, Clone)]
pub struct Optimizer<PC: ParameterCombination> {
    data: Vec<Candle>,
    _marker: PhantomData<PC>,
}

impl<PC: ParameterCombination> Optimizer<PC> {
    /// Creates an optimizer over `data`.
    ///
    /// ### Returns
    /// [`Error::CandleDataEmpty`] when there is nothing to replay.
    pub fn new(data: Vec<Candle>) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::CandleDataEmpty);
        }
        Ok(Self {
            data,
            _marker: PhantomData,
        })
    }

    /// Runs one backtest per combination.
    ///
    /// ### Arguments
    /// * `combinator` - Builds the configuration of a combination.
    ///
    /// ### Returns
    /// Each combination with its report, in generation order. The first invalid
    /// configuration or out-of-order candle aborts the whole sweep.
    pub fn with<C>(&self, combinator: C) -> Result<Vec<(PC::Output, Report)>>
    where
        C: Fn(&PC::Output) -> Result<Config> + Sync,
    {
        let num_cpus = num_cpus::get();
        let combinations = PC::generate();
        let chunk_size = combinations.len().div_ceil(num_cpus).max(1);
        debug!(combinations = combinations.len(), chunk_size, "starting sweep");

        combinations
            .par_chunks(chunk_size)
            .map::<_, Result<_>>(|par_combinations| {
                let mut local_results = Vec::with_capacity(par_combinations.len());
                for param_set in par_combinations {
                    let mut backtest = Backtest::new(combinator(param_set)?)?;
                    let report = backtest.run(self.data.iter().copied())?;
                    local_results.push((param_set.clone(), report));
                }
                Ok(local_results)
            })
            .collect::<Result<Vec<_>>>()
            .map(|chunks| chunks.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng, rngs::StdRng};

    use super::*;
    use crate::config::{RuleBasedConfig, StrategyConfig};
    use crate::indicators::IndicatorParams;
    use crate::signals::{EntryRule, ExitRule};

    struct Periods;

    impl ParameterCombination for Periods {
        type Output = (usize, usize);

        fn generate() -> Vec<Self::Output> {
            (2..=6).flat_map(|ema| (8..=12).map(move |sma| (ema, sma))).collect()
        }
    }

    fn config(&(ema, sma): &(usize, usize)) -> Result<Config> {
        Ok(Config {
            leverage: 2.0,
            strategy: StrategyConfig::RuleBased(RuleBasedConfig {
                entry: vec![EntryRule::EmaSmaCrossUp],
                exit: vec![ExitRule::EmaSmaCrossDown],
                reentry_distance: None,
            }),
            indicators: IndicatorParams {
                ema,
                sma,
                ..Default::default()
            },
            ..Default::default()
        })
    }

    fn random_walk(len: usize) -> Vec<Candle> {
        let mut rng = StdRng::seed_from_u64(11);
        let mut close: f64 = 100.0;
        (0..len)
            .map(|i| {
                let open = close;
                close = (close * (1.0 + rng.random_range(-0.03..0.03))).max(5.0);
                Candle::try_from((i as i64 * 60_000, open, open.max(close) * 1.01, open.min(close) * 0.99, close, 1.0))
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn parallel_sweep_matches_sequential_runs() {
        let data = random_walk(200);
        let results = Optimizer::<Periods>::new(data.clone()).unwrap().with(config).unwrap();

        assert_eq!(results.len(), 25);
        for (params, report) in &results {
            let mut backtest = Backtest::new(config(params).unwrap()).unwrap();
            assert_eq!(&backtest.run(data.clone()).unwrap(), report);
        }
        assert_eq!(results[0].0, (2, 8));
        assert_eq!(results[24].0, (6, 12));
    }

    #[test]
    fn invalid_combination_aborts() {
        let optimizer = Optimizer::<Periods>::new(random_walk(20)).unwrap();
        let result = optimizer.with(|&(ema, _)| {
            Ok(Config {
                indicators: IndicatorParams {
                    ema: ema - 2,
                    ..Default::default()
                },
                ..Default::default()
            })
        });
        assert!(matches!(result, Err(Error::InvalidPeriod("ema"))));
        assert!(matches!(Optimizer::<Periods>::new(Vec::new()), Err(Error::CandleDataEmpty)));
    }
}
