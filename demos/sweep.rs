//! # Parallel EMA / SMA sweep
//!
//! Replays the same candles once per EMA/SMA period pair on every core and prints
//! the five best final balances.
mod utils;

use kline_bt::prelude::*;

const FAST: std::ops::RangeInclusive<usize> = 3..=9;
const SLOW: std::ops::RangeInclusive<usize> = 10..=30;

struct Periods;

impl ParameterCombination for Periods {
    type Output = (usize, usize);

    fn generate() -> Vec<Self::Output> {
        FAST.flat_map(|ema| SLOW.map(move |sma| (ema, sma))).collect()
    }
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let candles = utils::generate_sample_candles(5_000, 7, 100.0);
    let optimizer = Optimizer::<Periods>::new(candles)?;

    let mut results = optimizer.with(|&(ema, sma)| {
        Ok(Config {
            leverage: 5.0,
            pnl_model: PnlModel::Leveraged,
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
    })?;

    results.sort_by(|(_, a), (_, b)| b.final_balance.total_cmp(&a.final_balance));
    for ((ema, sma), report) in results.iter().take(5) {
        println!(
            "ema {ema:>2} / sma {sma:>2}: {:.2} ({:+.2}%), {} trades, win rate {}",
            report.final_balance, report.percent_change, report.total_trades, report.win_rate
        );
    }

    Ok(())
}
