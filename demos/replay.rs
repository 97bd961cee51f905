//! # Replay
//!
//! Runs the default rule-based strategy and a weighted-score strategy over the same
//! candles and prints both reports.
//!
//! With the `serde` feature, a JSON kline export can be passed as first argument:
//! `cargo run --example replay --features serde -- klines.json`
mod utils;

use kline_bt::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let candles = load()?;

    let mut rule_based = Backtest::new(Config {
        strategy: StrategyConfig::RuleBased(RuleBasedConfig {
            entry: vec![EntryRule::EmaSmaCrossUp, EntryRule::RsiBelowOverbought],
            ..Default::default()
        }),
        ..Default::default()
    })?;
    println!("=== rule-based ===\n{}", rule_based.run(candles.iter().copied())?);

    let mut weighted = Backtest::new(Config {
        leverage: 10.0,
        pnl_model: PnlModel::Leveraged,
        strategy: StrategyConfig::WeightedScore(WeightedScoreConfig::default()),
        ..Default::default()
    })?;
    println!("=== weighted score ===\n{}", weighted.run(candles.iter().copied())?);

    for position in weighted.positions().closed_positions().take(5) {
        if let Some(closure) = position.closure() {
            println!(
                "#{} {} @ {:.2} -> {} @ {:.2}: {:.2} ({:?})",
                position.id(),
                position.open_time(),
                position.entry_price(),
                closure.time,
                closure.price,
                closure.pnl,
                closure.reason
            );
        }
    }

    let look_ahead = weighted.look_ahead();
    if let Some(Some(span)) = look_ahead.senkou_a.last() {
        println!("last senkou span A (display only): {span:.2}");
    }

    Ok(())
}

#[cfg(feature = "serde")]
fn load() -> Result<Vec<Candle>> {
    match std::env::args().nth(1) {
        Some(path) => get_data_from_file(path),
        None => Ok(utils::generate_sample_candles(2_000, 3, 100.0)),
    }
}

#[cfg(not(feature = "serde"))]
fn load() -> Result<Vec<Candle>> {
    Ok(utils::generate_sample_candles(2_000, 3, 100.0))
}
