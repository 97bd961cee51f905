//! # kline-bt: candle replay backtesting
//!
//! **kline-bt** replays historical OHLCV klines through a technical-indicator pipeline
//! and a long-only position simulator, then aggregates the closed trades into a
//! performance report.
//!
//! ## Core Components
//! | Component            | Description                                                                      |
//! |----------------------|----------------------------------------------------------------------------------|
//! | **`Candle`**         | One validated OHLCV bar, identified by its open time.                            |
//! | **`CandleSeries`**   | Append-only history; out-of-order candles are rejected.                          |
//! | **`IndicatorEngine`**| Incremental indicators; each snapshot only depends on candles up to its own.     |
//! | **`Strategy`**       | Entry and exit decisions: rule-based conjunction or weighted score.              |
//! | **`PositionManager`**| Stop-loss, take-profit and indicator exits over every open position.             |
//! | **`Backtest`**       | Candle-by-candle driver with a drawdown guard.                                   |
//! | **`Report`**         | Win rate, PnL, profit factor, max drawdown and a monthly breakdown.              |
//! | **`Optimizer`**      | Runs many configurations over the same candles in parallel *(feature `optimizer`)*. |
//!
//! ## Getting Started
//! ```rust
//! use kline_bt::prelude::*;
//!
//! let candles = (0..60)
//!     .map(|i| {
//!         let close = 100.0 + (i as f64 / 5.0).sin() * 10.0;
//!         Candle::try_from((i * 60_000, close - 0.5, close + 1.0, close - 1.0, close, 10.0))
//!     })
//!     .collect::<Result<Vec<_>>>()
//!     .unwrap();
//!
//! let mut backtest = Backtest::new(Config::default()).unwrap();
//! let report = backtest.run(candles).unwrap();
//! println!("{report}");
//! ```
//!
//! ## Features
//! - `serde`: (de)serialization of configuration, candles, positions and reports, plus
//!   [`utils::get_data_from_file`] to load klines from JSON.
//! - `optimizer`: parallel parameter sweeps with `rayon`.
//!
//! ## Logging
//! The crate logs through [`tracing`] and never installs a subscriber.
#![warn(missing_docs)]

/// Run configuration: account, exits, strategy and indicator periods.
pub mod config;

/// Core replay components: candles, account, positions and the backtest driver.
pub mod engine;

/// Error types for the library.
pub mod errors;

/// Technical indicators computed candle by candle.
pub mod indicators;

/// Entry and exit strategies.
pub mod signals;

/// Trade statistics and the final report.
pub mod stats;

/// Kline loading helpers.
#[cfg(feature = "serde")]
pub mod utils;

/// Parallel parameter sweeps.
#[cfg(feature = "optimizer")]
pub mod optimizer;

/// Re-exports of commonly used types and traits for convenience.
pub mod prelude {
    pub use super::PercentCalculus;
    pub use crate::config::*;
    pub use crate::engine::*;
    pub use crate::errors::*;
    pub use crate::indicators::*;
    pub use crate::signals::*;
    pub use crate::stats::*;

    #[cfg(feature = "serde")]
    pub use crate::utils::*;

    #[cfg(feature = "optimizer")]
    pub use crate::optimizer::*;
}

use std::ops::{Add, Div, Mul, Sub};

/// Trait for performing percentage-based calculations.
///
/// This trait provides methods to add, subtract, and calculate percentages
/// for numeric types, used to place stop-loss and take-profit levels.
pub trait PercentCalculus<Rhs = Self> {
    /// Adds a percentage to the value.
    ///
    /// ### Arguments
    /// * `rhs` - The percentage to add (e.g., 10.0 for 10%).
    fn addpercent(self, rhs: Rhs) -> Self;

    /// Subtracts a percentage from the value.
    ///
    /// ### Arguments
    /// * `rhs` - The percentage to subtract (e.g., 10.0 for 10%).
    fn subpercent(self, rhs: Rhs) -> Self;

    /// Returns `percent` percent of the value.
    fn how_many(self, percent: Self) -> Self;

    /// Returns the percentage change from the value to `new`.
    fn change(self, new: Self) -> Self;
}

impl PercentCalculus for f64 {
    fn addpercent(self, percent: Self) -> Self {
        self.add(self.mul(percent.div(100.0)))
    }

    fn subpercent(self, percent: Self) -> Self {
        self.sub(self.mul(percent.div(100.0)))
    }

    fn how_many(self, percent: Self) -> Self {
        percent.mul(self.div(100.0))
    }

    fn change(self, new: Self) -> Self {
        new.sub(self).div(self).mul(100.0)
    }
}

#[cfg(test)]
mod percent {
    use super::*;

    #[test]
    fn stop_loss_and_take_profit_levels() {
        assert_eq!(95.0, 100.0.subpercent(5.0));
        assert_eq!(120.0, 100.0.addpercent(20.0));
    }

    #[test]
    fn how_many() {
        assert_eq!(1.0, 100.0.how_many(1.0))
    }

    #[test]
    fn change() {
        assert_eq!(-50.0, 10_000.0.change(5_000.0));
        assert_eq!(10.0, 100.0.change(110.0));
    }
}
