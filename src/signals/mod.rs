//! Entry and exit signals.
//!
//! A [`Strategy`] only sees a [`SignalWindow`] (the current bar and a few previous
//! ones) and the positions it is asked about. It holds no mutable state, so the same
//! inputs always give the same decision.

mod rule_based;
mod weighted;

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::StrategyConfig;
use crate::engine::{Candle, ExitReason, Position};
use crate::indicators::IndicatorSnapshot;

pub use rule_based::RuleBased;
pub use weighted::WeightedScore;

/// RSI level above which a position is closed.
pub const RSI_OVERBOUGHT: f64 = 70.0;

/// A candle and its indicators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    /// The closed candle.
    pub candle: Candle,
    /// Indicators as of this candle.
    pub indicators: IndicatorSnapshot,
}

/// The bar being evaluated and up to [`Strategy::lookback`] bars before it.
#[derive(Debug, Clone, Copy)]
pub struct SignalWindow<'a> {
    current: &'a Bar,
    history: &'a [Bar],
}

impl<'a> SignalWindow<'a> {
    /// Builds a window over `bars`, oldest first; the last bar is the current one.
    pub fn new(bars: &'a [Bar]) -> Option<Self> {
        let (current, history) = bars.split_last()?;
        Some(Self { current, history })
    }

    /// Returns the bar being evaluated.
    pub fn current(&self) -> &'a Bar {
        self.current
    }

    /// Returns the bar `n` steps back (`previous(1)` is the one right before).
    pub fn previous(&self, n: usize) -> Option<&'a Bar> {
        self.history.len().checked_sub(n).and_then(|index| self.history.get(index))
    }
}

/// Whether to open a position on the current bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntryDecision {
    /// True to open a long position at the close.
    pub open: bool,
}

/// Whether to close one position on the current bar.
///
/// Built with [`ExitDecision::hold`] or [`ExitDecision::close`], so a close always
/// carries its reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExitDecision {
    reason: Option<ExitReason>,
}

impl ExitDecision {
    /// Keep the position open.
    pub fn hold() -> Self {
        Self::default()
    }

    /// Close the position for `reason`.
    pub fn close(reason: ExitReason) -> Self {
        Self { reason: Some(reason) }
    }

    /// Returns true when the position must be closed.
    pub fn should_close(&self) -> bool {
        self.reason.is_some()
    }

    /// Returns the exit trigger of a close.
    pub fn reason(&self) -> Option<ExitReason> {
        self.reason
    }
}

/// Trading strategy.
///
/// Stop-loss and take-profit are checked by the
/// [`PositionManager`](crate::engine::PositionManager) before [`Strategy::exit`] is
/// asked, so strategies only decide indicator-driven exits.
pub trait Strategy {
    /// Number of previous bars the strategy reads.
    fn lookback(&self) -> usize {
        3
    }

    /// Decides whether to open a position on the current bar.
    fn entry(&self, window: &SignalWindow<'_>, open: &[&Position]) -> EntryDecision;

    /// Decides whether to close `position` on the current bar.
    fn exit(&self, window: &SignalWindow<'_>, position: &Position) -> ExitDecision;
}

/// Builds the strategy described by `config`.
pub fn build(config: &StrategyConfig) -> Box<dyn Strategy> {
    match config {
        StrategyConfig::RuleBased(rules) => Box::new(RuleBased::new(rules.clone())),
        StrategyConfig::WeightedScore(score) => Box::new(WeightedScore::new(score.clone())),
    }
}

/// Entry conditions of the rule-based strategy.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryRule {
    /// EMA above SMA.
    Trend,
    /// EMA crosses above SMA.
    EmaSmaCrossUp,
    /// MACD crosses above its signal.
    MacdCrossUp,
    /// RSI in `(30, 50)`.
    RsiNeutral,
    /// RSI below the overbought level.
    RsiBelowOverbought,
    /// RSI above 50 and MACD above its signal.
    RsiMacdBullish,
    /// Positive momentum and MACD above its signal.
    MomentumConfirmation,
    /// Bull power rising over the three previous bars.
    BullPowerRising,
    /// Bear power falling over the three previous bars.
    BearPowerFalling,
    /// PPO of the previous bar below the one before.
    PpoFalling,
    /// Close above VWAP and OBV rising.
    VwapObvConfirmation,
    /// Volume above its rolling mean.
    VolumeAboveAverage,
    /// Close above the lower Bollinger band.
    BollingerBounce,
    /// Close strictly between the Bollinger bands.
    InsideBollinger,
    /// RSI below 70 and %K above %D.
    RsiStochastic,
    /// Positive ATR.
    AtrPositive,
    /// CCI in `(-100, 100)`.
    CciNeutral,
    /// Positive rate of change.
    RocPositive,
    /// Rate of change above PPO.
    RocAbovePpo,
    /// Open below the previous close and close above the previous open.
    BullishEngulfing,
}

/// Indicator exits shared by both strategy variants.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitRule {
    /// EMA crosses below SMA.
    EmaSmaCrossDown,
    /// MACD crosses below its signal.
    MacdCrossDown,
    /// RSI above the overbought level.
    RsiOverbought,
}

/// Scored conditions of the weighted strategy.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScoreCondition {
    /// RSI in `[30, 70)`.
    RsiCondition,
    /// MACD crosses above its signal.
    MacdMomentum,
    /// EMA crosses above SMA.
    EmaSmaTrend,
    /// `ATR / close` below the volatility ceiling adds the weight, otherwise subtracts it.
    VolatilityRisk,
}

impl fmt::Display for ScoreCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RsiCondition => "rsi_condition",
            Self::MacdMomentum => "macd_momentum",
            Self::EmaSmaTrend => "ema_sma_trend",
            Self::VolatilityRisk => "volatility_risk",
        };
        f.write_str(name)
    }
}

/// EMA crossed above SMA between `previous` and `current`.
pub(crate) fn ema_cross_up(current: &IndicatorSnapshot, previous: &IndicatorSnapshot) -> bool {
    matches!(
        (current.sma, previous.sma),
        (Some(sma), Some(prev_sma)) if current.ema > sma && previous.ema <= prev_sma
    )
}

/// MACD crossed above its signal between `previous` and `current`.
pub(crate) fn macd_cross_up(current: &IndicatorSnapshot, previous: &IndicatorSnapshot) -> bool {
    current.macd.macd > current.macd.signal && previous.macd.macd <= previous.macd.signal
}

/// Evaluates the indicator exits in order; the first that fires wins.
pub(crate) fn indicator_exit(rules: &[ExitRule], window: &SignalWindow<'_>) -> ExitDecision {
    let current = &window.current().indicators;
    let previous = window.previous(1).map(|bar| &bar.indicators);

    for rule in rules {
        let (fired, reason) = match rule {
            ExitRule::EmaSmaCrossDown => (
                previous.is_some_and(|previous| {
                    matches!(
                        (current.sma, previous.sma),
                        (Some(sma), Some(prev_sma)) if current.ema < sma && previous.ema >= prev_sma
                    )
                }),
                ExitReason::EmaSmaCross,
            ),
            ExitRule::MacdCrossDown => (
                previous.is_some_and(|previous| {
                    current.macd.macd < current.macd.signal && previous.macd.macd >= previous.macd.signal
                }),
                ExitReason::MacdCross,
            ),
            ExitRule::RsiOverbought => (
                current.rsi.is_some_and(|rsi| rsi > RSI_OVERBOUGHT),
                ExitReason::RsiOverbought,
            ),
        };
        if fired {
            return ExitDecision::close(reason);
        }
    }
    ExitDecision::hold()
}

/// Re-entry proximity filter: blocks an entry while the first open position's
/// `entry_price % open` is below `distance`.
pub(crate) fn reentry_blocked(distance: Option<f64>, candle: &Candle, open: &[&Position]) -> bool {
    match (distance, open.first()) {
        (Some(distance), Some(first)) => first.entry_price() % candle.open() < distance,
        _ => false,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::indicators::{IndicatorEngine, IndicatorParams};

    /// Bars of a close-only series; open is the previous close.
    pub(crate) fn bars(closes: &[f64], params: IndicatorParams) -> Vec<Bar> {
        let mut engine = IndicatorEngine::new(params).unwrap();
        let mut previous = closes[0];
        closes
            .iter()
            .enumerate()
            .map(|(i, close)| {
                let open = previous;
                previous = *close;
                let candle = Candle::try_from((
                    i as i64 * 60_000,
                    open,
                    open.max(*close) + 1.0,
                    open.min(*close) - 1.0,
                    *close,
                    10.0,
                ))
                .unwrap();
                Bar {
                    candle,
                    indicators: engine.next(&candle),
                }
            })
            .collect()
    }

    pub(crate) fn cross_params() -> IndicatorParams {
        IndicatorParams {
            ema: 2,
            sma: 3,
            ..Default::default()
        }
    }

    #[test]
    fn window_history() {
        let bars = bars(&[10.0, 11.0, 12.0, 13.0], cross_params());
        let window = SignalWindow::new(&bars).unwrap();
        assert_eq!(window.current().candle.close(), 13.0);
        assert_eq!(window.previous(1).unwrap().candle.close(), 12.0);
        assert_eq!(window.previous(3).unwrap().candle.close(), 10.0);
        assert!(window.previous(4).is_none());
        assert!(SignalWindow::new(&[]).is_none());
    }

    #[test]
    fn ema_sma_crosses() {
        // SMA(3) needs three closes; EMA(2) reacts faster to the jump
        let bars = bars(&[10.0, 10.0, 10.0, 10.0, 14.0, 14.0, 8.0], cross_params());
        assert!(!ema_cross_up(&bars[3].indicators, &bars[2].indicators));
        assert!(ema_cross_up(&bars[4].indicators, &bars[3].indicators));

        let window = SignalWindow::new(&bars[..7]).unwrap();
        let decision = indicator_exit(&[ExitRule::EmaSmaCrossDown], &window);
        assert_eq!(decision, ExitDecision::close(ExitReason::EmaSmaCross));
    }

    #[test]
    fn unavailable_indicators_cannot_fire() {
        let bars = bars(&[10.0, 12.0], cross_params());
        // SMA(3) is not available yet
        assert!(!ema_cross_up(&bars[1].indicators, &bars[0].indicators));
        let window = SignalWindow::new(&bars).unwrap();
        assert_eq!(
            indicator_exit(&[ExitRule::EmaSmaCrossDown, ExitRule::RsiOverbought], &window),
            ExitDecision::hold()
        );
    }

    #[test]
    fn exit_decision_carries_reason() {
        let hold = ExitDecision::hold();
        assert!(!hold.should_close());
        assert_eq!(hold.reason(), None);

        let close = ExitDecision::close(ExitReason::MacdCross);
        assert!(close.should_close());
        assert_eq!(close.reason(), Some(ExitReason::MacdCross));
    }

    #[test]
    fn score_condition_names() {
        assert_eq!(ScoreCondition::VolatilityRisk.to_string(), "volatility_risk");
        assert!(ScoreCondition::RsiCondition < ScoreCondition::VolatilityRisk);
    }
}
