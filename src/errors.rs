/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while configuring or replaying a backtest.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The candle data provided is empty.
    #[error("Candle data is empty: replay requires at least one candle")]
    CandleDataEmpty,

    /// A candle was appended with a timestamp not strictly after the last one.
    /// This is fatal: the run must be aborted.
    #[error("Out of order candle: {next} is not after {previous}")]
    OutOfOrderCandle {
        /// Timestamp (ms) of the last accepted candle.
        previous: i64,
        /// Timestamp (ms) of the rejected candle.
        next: i64,
    },

    /// A candle field is missing, non-finite or inconsistent.
    #[error("Invalid candle: {0}")]
    InvalidCandle(String),

    /// The timestamp cannot be represented as a date.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(i64),

    /// The initial or current balance is not positive.
    #[error("Balance must be positive (got: {0})")]
    NegZeroBalance(f64),

    /// Leverage must be a positive, finite multiplier.
    #[error("Leverage must be positive (got: {0})")]
    InvalidLeverage(f64),

    /// Risk per trade must be a fraction in (0, 1].
    #[error("Risk per trade must be in (0, 1] (got: {0})")]
    InvalidRiskPerTrade(f64),

    /// Stop-loss fraction must be in (0, 1).
    #[error("Stop-loss fraction must be in (0, 1) (got: {0})")]
    InvalidStopLoss(f64),

    /// Take-profit fraction must be positive.
    #[error("Take-profit fraction must be positive (got: {0})")]
    InvalidTakeProfit(f64),

    /// Take-profit multiple of the fixed-multiple PnL model must be positive.
    #[error("Take-profit multiple must be positive (got: {0})")]
    InvalidMultiple(f64),

    /// An indicator period of zero (or a non-positive percentage) was configured.
    #[error("Invalid indicator parameter `{0}`")]
    InvalidPeriod(&'static str),

    /// Weighted-score weights must sum to 1.0.
    #[error("Weights must sum to 1.0 (got: {0})")]
    WeightsSum(f64),

    /// A weighted-score weight is negative or non-finite.
    #[error("Invalid weight for `{0}`: {1}")]
    InvalidWeight(String, f64),

    /// The weighted-score entry threshold is not finite.
    #[error("Invalid score threshold: {0}")]
    InvalidThreshold(f64),

    /// A rule-based strategy needs at least one entry condition.
    #[error("Rule-based strategy has no entry condition")]
    EmptyRuleSet,

    /// The position was not found.
    #[error("Position not found: {0}")]
    PositionNotFound(u32),

    /// The position is already closed.
    #[error("Position already closed: {0}")]
    PositionClosed(u32),

    /// Attempted to release more funds than are staked.
    #[error("Cannot release {1} from staked funds {0}")]
    UnlockBalance(f64, f64),

    /// I/O error occurred.
    // utils.rs
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error occurred.
    #[cfg(feature = "serde")]
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}
