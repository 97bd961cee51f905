use super::{
    EntryDecision, ExitDecision, RSI_OVERBOUGHT, ScoreCondition, SignalWindow, Strategy, ema_cross_up, indicator_exit,
    macd_cross_up, reentry_blocked,
};
use crate::config::WeightedScoreConfig;
use crate::engine::Position;

/// Enters when the weighted sum of [`ScoreCondition`]s exceeds a threshold.
#[derive(Debug, Clone)]
pub struct WeightedScore {
    config: WeightedScoreConfig,
}

impl WeightedScore {
    /// Creates the strategy.
    pub fn new(config: WeightedScoreConfig) -> Self {
        Self { config }
    }

    /// Returns the score of the current bar.
    ///
    /// `None` when an input of a weighted condition is not available yet; such a bar
    /// never enters.
    pub fn score(&self, window: &SignalWindow<'_>) -> Option<f64> {
        let bar = window.current();
        let now = &bar.indicators;
        let previous = &window.previous(1)?.indicators;

        let mut score = 0.0;
        for (condition, weight) in &self.config.weights {
            let contribution = match condition {
                ScoreCondition::RsiCondition => {
                    let rsi = now.rsi?;
                    if (30.0..RSI_OVERBOUGHT).contains(&rsi) { *weight } else { 0.0 }
                }
                ScoreCondition::MacdMomentum => {
                    if macd_cross_up(now, previous) { *weight } else { 0.0 }
                }
                ScoreCondition::EmaSmaTrend => {
                    now.sma?;
                    previous.sma?;
                    if ema_cross_up(now, previous) { *weight } else { 0.0 }
                }
                ScoreCondition::VolatilityRisk => {
                    if now.atr? / bar.candle.close() < self.config.volatility_ceiling {
                        *weight
                    } else {
                        -*weight
                    }
                }
            };
            score += contribution;
        }
        Some(score)
    }
}

impl Strategy for WeightedScore {
    fn lookback(&self) -> usize {
        1
    }

    fn entry(&self, window: &SignalWindow<'_>, open: &[&Position]) -> EntryDecision {
        let signal = self.score(window).is_some_and(|score| score > self.config.threshold);
        EntryDecision {
            open: signal && !reentry_blocked(self.config.reentry_distance, &window.current().candle, open),
        }
    }

    fn exit(&self, window: &SignalWindow<'_>, _position: &Position) -> ExitDecision {
        indicator_exit(&self.config.exit, window)
    }
}
