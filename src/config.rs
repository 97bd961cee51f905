//! Run configuration.
//!
//! Every option is validated by [`Config::validate`] before the first candle is
//! processed; [`crate::engine::Backtest::new`] calls it for you.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::engine::Account;
use crate::errors::{Error, Result};
use crate::indicators::IndicatorParams;
use crate::signals::{EntryRule, ExitRule, ScoreCondition};

/// Allowed distance of the weights sum from 1.0.
pub const WEIGHTS_TOLERANCE: f64 = 1e-6;

/// How stop-loss and take-profit exits realize profit and loss.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(tag = "model", rename_all = "kebab-case")
)]
#[derive(Debug, Clone, PartialEq)]
pub enum PnlModel {
    /// A stop-loss forfeits the stake, a take-profit credits `stake × multiple`.
    FixedMultiple {
        /// Amount credited on take-profit, in stakes.
        take_profit_multiple: f64,
    },
    /// Realize the price change applied to the leveraged notional.
    Leveraged,
}

impl Default for PnlModel {
    fn default() -> Self {
        Self::FixedMultiple {
            take_profit_multiple: 4.0,
        }
    }
}

/// Conjunction-of-rules strategy options.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct RuleBasedConfig {
    /// Conditions that must all hold to enter.
    pub entry: Vec<EntryRule>,
    /// Indicator exits; any one closes a position.
    pub exit: Vec<ExitRule>,
    /// Skip entries while the first open position's `entry_price % open` is below this.
    pub reentry_distance: Option<f64>,
}

impl Default for RuleBasedConfig {
    fn default() -> Self {
        Self {
            entry: vec![
                EntryRule::BullishEngulfing,
                EntryRule::EmaSmaCrossUp,
                EntryRule::RsiMacdBullish,
                EntryRule::InsideBollinger,
                EntryRule::VwapObvConfirmation,
            ],
            exit: vec![ExitRule::EmaSmaCrossDown, ExitRule::MacdCrossDown, ExitRule::RsiOverbought],
            reentry_distance: Some(100.0),
        }
    }
}

/// Weighted-score strategy options.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedScoreConfig {
    /// Weight of every scored condition; must sum to 1.0.
    pub weights: BTreeMap<ScoreCondition, f64>,
    /// Enter when the score is strictly above this.
    pub threshold: f64,
    /// `ATR / close` below this counts as low volatility.
    pub volatility_ceiling: f64,
    /// Indicator exits; any one closes a position.
    pub exit: Vec<ExitRule>,
    /// Skip entries while the first open position's `entry_price % open` is below this.
    pub reentry_distance: Option<f64>,
}

impl Default for WeightedScoreConfig {
    fn default() -> Self {
        Self {
            weights: BTreeMap::from([
                (ScoreCondition::RsiCondition, 0.25),
                (ScoreCondition::MacdMomentum, 0.25),
                (ScoreCondition::EmaSmaTrend, 0.25),
                (ScoreCondition::VolatilityRisk, 0.25),
            ]),
            threshold: 0.5,
            volatility_ceiling: 0.01,
            exit: Vec::new(),
            reentry_distance: Some(100.0),
        }
    }
}

/// Strategy variant selector.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(tag = "variant", rename_all = "kebab-case")
)]
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyConfig {
    /// Enter on a conjunction of boolean conditions.
    RuleBased(RuleBasedConfig),
    /// Enter when a weighted sum of conditions exceeds a threshold.
    WeightedScore(WeightedScoreConfig),
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self::RuleBased(RuleBasedConfig::default())
    }
}

/// Options of a simulation run.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Starting balance in quote currency.
    pub initial_balance: f64,
    /// Notional multiplier applied to each stake.
    pub leverage: f64,
    /// Fraction of the balance staked per entry.
    pub risk_per_trade: f64,
    /// Stop-loss offset below the entry price, as a fraction.
    pub stop_loss_pct: f64,
    /// Take-profit offset above the entry price, as a fraction.
    pub take_profit_pct: f64,
    /// Profit and loss realization.
    pub pnl_model: PnlModel,
    /// Strategy variant.
    pub strategy: StrategyConfig,
    /// Indicator periods.
    pub indicators: IndicatorParams,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_balance: 10_000.0,
            leverage: 50.0,
            risk_per_trade: 0.01,
            stop_loss_pct: 0.05,
            take_profit_pct: 0.15,
            pnl_model: PnlModel::default(),
            strategy: StrategyConfig::default(),
            indicators: IndicatorParams::default(),
        }
    }
}

impl Config {
    /// Rejects malformed configuration.
    pub fn validate(&self) -> Result<()> {
        Account::new(self.initial_balance, self.leverage, self.risk_per_trade)?;

        if !(self.stop_loss_pct > 0.0 && self.stop_loss_pct < 1.0) {
            return Err(Error::InvalidStopLoss(self.stop_loss_pct));
        }
        if !(self.take_profit_pct > 0.0 && self.take_profit_pct.is_finite()) {
            return Err(Error::InvalidTakeProfit(self.take_profit_pct));
        }
        if let PnlModel::FixedMultiple { take_profit_multiple } = self.pnl_model {
            if !(take_profit_multiple > 0.0 && take_profit_multiple.is_finite()) {
                return Err(Error::InvalidMultiple(take_profit_multiple));
            }
        }

        match &self.strategy {
            StrategyConfig::RuleBased(rules) => {
                if rules.entry.is_empty() {
                    return Err(Error::EmptyRuleSet);
                }
            }
            StrategyConfig::WeightedScore(score) => {
                let mut sum = 0.0;
                for (condition, weight) in &score.weights {
                    if !(weight.is_finite() && *weight >= 0.0) {
                        return Err(Error::InvalidWeight(condition.to_string(), *weight));
                    }
                    sum += weight;
                }
                if (sum - 1.0).abs() > WEIGHTS_TOLERANCE {
                    return Err(Error::WeightsSum(sum));
                }
                if !score.threshold.is_finite() {
                    return Err(Error::InvalidThreshold(score.threshold));
                }
            }
        }

        self.indicators.validate()
    }

    /// Reads and validates a JSON configuration file.
    #[cfg(feature = "serde")]
    pub fn from_file(filepath: impl AsRef<std::path::Path>) -> Result<Self> {
        use std::{fs::File, io::BufReader};

        let file = File::open(filepath)?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }
}
