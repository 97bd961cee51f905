use super::{
    EntryDecision, EntryRule, ExitDecision, RSI_OVERBOUGHT, SignalWindow, Strategy, ema_cross_up, indicator_exit,
    macd_cross_up, reentry_blocked,
};
use crate::config::RuleBasedConfig;
use crate::engine::Position;

/// Enters when every configured [`EntryRule`] holds.
#[derive(Debug, Clone)]
pub struct RuleBased {
    config: RuleBasedConfig,
}

impl RuleBased {
    /// Creates the strategy.
    pub fn new(config: RuleBasedConfig) -> Self {
        Self { config }
    }

    fn holds(rule: EntryRule, window: &SignalWindow<'_>) -> bool {
        let bar = window.current();
        let (candle, now) = (&bar.candle, &bar.indicators);
        let prev = |n: usize| window.previous(n);

        match rule {
            EntryRule::Trend => now.sma.is_some_and(|sma| now.ema > sma),
            EntryRule::EmaSmaCrossUp => prev(1).is_some_and(|p| ema_cross_up(now, &p.indicators)),
            EntryRule::MacdCrossUp => prev(1).is_some_and(|p| macd_cross_up(now, &p.indicators)),
            EntryRule::RsiNeutral => now.rsi.is_some_and(|rsi| rsi > 30.0 && rsi < 50.0),
            EntryRule::RsiBelowOverbought => now.rsi.is_some_and(|rsi| rsi < RSI_OVERBOUGHT),
            EntryRule::RsiMacdBullish => now.rsi.is_some_and(|rsi| rsi > 50.0) && now.macd.macd > now.macd.signal,
            EntryRule::MomentumConfirmation => {
                now.momentum.is_some_and(|momentum| momentum > 0.0) && now.macd.macd > now.macd.signal
            }
            EntryRule::BullPowerRising => match (prev(3), prev(2), prev(1)) {
                (Some(p3), Some(p2), Some(p1)) => {
                    p3.indicators.elder_ray.bull_power < p2.indicators.elder_ray.bull_power
                        && p2.indicators.elder_ray.bull_power < p1.indicators.elder_ray.bull_power
                }
                _ => false,
            },
            EntryRule::BearPowerFalling => match (prev(3), prev(2), prev(1)) {
                (Some(p3), Some(p2), Some(p1)) => {
                    p3.indicators.elder_ray.bear_power > p2.indicators.elder_ray.bear_power
                        && p2.indicators.elder_ray.bear_power > p1.indicators.elder_ray.bear_power
                }
                _ => false,
            },
            EntryRule::PpoFalling => match (prev(2), prev(1)) {
                (Some(p2), Some(p1)) => p2.indicators.ppo.ppo > p1.indicators.ppo.ppo,
                _ => false,
            },
            EntryRule::VwapObvConfirmation => {
                now.vwap.is_some_and(|vwap| candle.close() > vwap)
                    && prev(1).is_some_and(|p| now.obv > p.indicators.obv)
            }
            EntryRule::VolumeAboveAverage => now.volume_avg.is_some_and(|avg| candle.volume() > avg),
            EntryRule::BollingerBounce => now.bollinger.is_some_and(|bands| candle.close() > bands.lower),
            EntryRule::InsideBollinger => now
                .bollinger
                .is_some_and(|bands| candle.close() > bands.lower && candle.close() < bands.upper),
            EntryRule::RsiStochastic => {
                now.rsi.is_some_and(|rsi| rsi < RSI_OVERBOUGHT)
                    && matches!((now.stoch_k, now.stoch_d), (Some(k), Some(d)) if k > d)
            }
            EntryRule::AtrPositive => now.atr.is_some_and(|atr| atr > 0.0),
            EntryRule::CciNeutral => now.cci.is_some_and(|cci| cci > -100.0 && cci < 100.0),
            EntryRule::RocPositive => now.roc.is_some_and(|roc| roc > 0.0),
            EntryRule::RocAbovePpo => now.roc.is_some_and(|roc| roc > now.ppo.ppo),
            EntryRule::BullishEngulfing => prev(1).is_some_and(|p| {
                candle.open() < p.candle.close() && candle.close() > p.candle.open()
            }),
        }
    }
}

impl Strategy for RuleBased {
    fn entry(&self, window: &SignalWindow<'_>, open: &[&Position]) -> EntryDecision {
        let signal = self.config.entry.iter().all(|rule| Self::holds(*rule, window));
        EntryDecision {
            open: signal && !reentry_blocked(self.config.reentry_distance, &window.current().candle, open),
        }
    }

    fn exit(&self, window: &SignalWindow<'_>, _position: &Position) -> ExitDecision {
        indicator_exit(&self.config.exit, window)
    }
}
