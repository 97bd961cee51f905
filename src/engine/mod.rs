//! Core replay components.
//!
//! This module provides the stateful part of a backtest:
//! - `Candle`: one validated OHLCV bar.
//! - `CandleSeries`: the append-only, strictly ordered history.
//! - `Account`: balance, staked funds and the drawdown guard.
//! - `Position` / `PositionManager`: the long-position lifecycle.
//! - `Backtest`: the candle-by-candle driver.

mod account;
mod backtest;
mod candle;
mod position;
mod series;

pub use account::*;
pub use backtest::*;
pub use candle::*;
pub use position::*;
pub use series::*;
