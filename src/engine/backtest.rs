use std::collections::VecDeque;
use std::ops::Deref;

use tracing::{info, warn};

use crate::config::Config;
use crate::engine::{Account, Candle, CandleSeries, Position, PositionId, PositionManager};
use crate::errors::{Error, Result};
use crate::indicators::{IndicatorEngine, LookAhead};
use crate::signals::{self, Bar, SignalWindow, Strategy};
use crate::stats::{Report, Stats};

/// Outcome of [`Backtest::push`].
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// The first candle only seeds the indicators.
    Warmup,
    /// The drawdown guard tripped with no open position; the candle was ignored.
    Halted,
    /// The candle went through the exit check and the entry decision.
    Processed {
        /// Position opened on this candle.
        opened: Option<PositionId>,
        /// Positions closed on this candle, in entry order.
        closed: Vec<Position>,
    },
}

/// Candle-by-candle simulation of one strategy on one account.
///
/// Each candle is applied to completion before the next one is accepted:
/// 1. append to the series (out-of-order candles abort the run)
/// 2. fold into the indicators
/// 3. close positions hit by their stop-loss, take-profit or an indicator exit
/// 4. open a position if the strategy asks for it and the drawdown guard allows it
pub struct Backtest {
    config: Config,
    account: Account,
    series: CandleSeries,
    indicators: IndicatorEngine,
    bars: VecDeque<Bar>,
    strategy: Box<dyn Strategy>,
    positions: PositionManager,
    stats: Stats,
    halted: bool,
}

impl Deref for Backtest {
    type Target = Account;

    fn deref(&self) -> &Self::Target {
        &self.account
    }
}

impl std::fmt::Debug for Backtest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backtest")
            .field("account", &self.account)
            .field("candles", &self.series.len())
            .field("open_positions", &self.positions.open_count())
            .field("closed_positions", &self.positions.closed_count())
            .field("halted", &self.halted)
            .finish()
    }
}

impl Backtest {
    /// Creates a backtest running the strategy described by the configuration.
    ///
    /// ### Returns
    /// An error if the configuration is malformed.
    pub fn new(config: Config) -> Result<Self> {
        let strategy = signals::build(&config.strategy);
        Self::with_strategy(config, strategy)
    }

    /// Creates a backtest running a custom strategy.
    ///
    /// The `strategy` section of the configuration is still validated but otherwise
    /// unused.
    pub fn with_strategy(config: Config, strategy: Box<dyn Strategy>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            account: Account::new(config.initial_balance, config.leverage, config.risk_per_trade)?,
            series: CandleSeries::new(),
            indicators: IndicatorEngine::new(config.indicators.clone())?,
            bars: VecDeque::with_capacity(strategy.lookback() + 1),
            positions: PositionManager::new(),
            stats: Stats::new(config.initial_balance),
            halted: false,
            strategy,
            config,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the candles accepted so far.
    pub fn series(&self) -> &CandleSeries {
        &self.series
    }

    /// Returns every position, open and closed.
    pub fn positions(&self) -> &PositionManager {
        &self.positions
    }

    /// Returns the trade statistics.
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Returns the latest candle with its indicators.
    pub fn latest(&self) -> Option<&Bar> {
        self.bars.back()
    }

    /// Returns true once the drawdown guard stopped the run.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Computes the display-only look-ahead columns over the accepted candles.
    pub fn look_ahead(&self) -> LookAhead {
        LookAhead::compute(self.series.as_slice(), &self.config.indicators)
    }

    /// Applies one closed candle.
    ///
    /// ### Returns
    /// What happened on this candle, or [`Error::OutOfOrderCandle`] when its time is
    /// not after the previous one.
    pub fn push(&mut self, candle: Candle) -> Result<Step> {
        if self.halted {
            return Ok(Step::Halted);
        }
        if !self.series.is_empty() && self.account.drawdown_tripped() && self.positions.open_count() == 0 {
            self.halted = true;
            info!(
                time = %candle.time(),
                balance = self.account.balance(),
                initial_balance = self.account.initial_balance(),
                "drawdown guard tripped, stopping"
            );
            return Ok(Step::Halted);
        }

        self.series.append(candle)?;
        let indicators = self.indicators.next(&candle);
        self.bars.push_back(Bar { candle, indicators });
        while self.bars.len() > self.strategy.lookback() + 1 {
            self.bars.pop_front();
        }
        if self.series.len() == 1 {
            return Ok(Step::Warmup);
        }

        let Self {
            config,
            account,
            bars,
            strategy,
            positions,
            stats,
            ..
        } = self;
        let window = SignalWindow::new(bars.make_contiguous()).ok_or(Error::CandleDataEmpty)?;

        let mut balance = account.balance();
        let closed = positions.check(&candle, account, &config.pnl_model, |position| {
            strategy.exit(&window, position)
        })?;
        for position in &closed {
            balance += position.stake() + position.pnl().unwrap_or_default();
            stats.record(position, balance);
        }

        let mut opened = None;
        if strategy.entry(&window, &positions.open_positions()).open {
            if account.can_open() {
                opened = Some(positions.open(&candle, account, config.stop_loss_pct, config.take_profit_pct)?);
            } else {
                warn!(
                    time = %candle.time(),
                    balance = account.balance(),
                    "entry signal refused by the drawdown guard"
                );
            }
        }

        Ok(Step::Processed { opened, closed })
    }

    /// Applies every candle in order and returns the report.
    ///
    /// Stops consuming candles once the drawdown guard halts the run.
    pub fn run<I>(&mut self, candles: I) -> Result<Report>
    where
        I: IntoIterator<Item = Candle>,
    {
        for candle in candles {
            if self.push(candle)? == Step::Halted {
                break;
            }
        }
        if self.series.is_empty() {
            return Err(Error::CandleDataEmpty);
        }

        let report = self.report();
        info!(
            candles = self.series.len(),
            trades = report.total_trades,
            open_positions = report.open_positions,
            final_balance = report.final_balance,
            percent_change = report.percent_change,
            "backtest completed"
        );
        Ok(report)
    }

    /// Builds the report of the run so far.
    pub fn report(&self) -> Report {
        Report::new(
            &self.stats,
            self.account.balance(),
            self.positions.open_count(),
            self.halted,
        )
    }

    /// Resets the backtest to its initial state, keeping the configuration and strategy.
    pub fn reset(&mut self) -> Result<()> {
        self.account.reset();
        self.series = CandleSeries::new();
        self.indicators = IndicatorEngine::new(self.config.indicators.clone())?;
        self.bars.clear();
        self.positions.reset();
        self.stats.reset();
        self.halted = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::config::{PnlModel, RuleBasedConfig, StrategyConfig, WeightedScoreConfig};
    use crate::engine::ExitReason;
    use crate::signals::{EntryDecision, EntryRule, ExitDecision, ExitRule};
    use crate::stats::WinRate;

    const MINUTE: i64 = 60_000;

    /// Candles whose open is the previous close, one unit of wick on each side.
    fn candles(closes: &[f64]) -> Vec<Candle> {
        let mut previous = closes[0];
        closes
            .iter()
            .enumerate()
            .map(|(i, close)| {
                let open = previous;
                previous = *close;
                Candle::try_from((
                    i as i64 * MINUTE,
                    open,
                    open.max(*close) + 1.0,
                    open.min(*close) - 1.0,
                    *close,
                    10.0,
                ))
                .unwrap()
            })
            .collect()
    }

    fn random_walk(seed: u64, len: usize) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut close: f64 = 100.0;
        (0..len)
            .map(|_| {
                close = (close * (1.0 + rng.random_range(-0.04..0.04))).max(5.0);
                close
            })
            .collect()
    }

    fn cross_config() -> Config {
        let mut config = Config {
            stop_loss_pct: 0.5,
            take_profit_pct: 1.0,
            strategy: StrategyConfig::RuleBased(RuleBasedConfig {
                entry: vec![EntryRule::EmaSmaCrossUp],
                exit: vec![ExitRule::EmaSmaCrossDown],
                reentry_distance: None,
            }),
            ..Default::default()
        };
        config.indicators.ema = 5;
        config.indicators.sma = 10;
        config
    }

    /// Enters on every candle and never exits on indicators.
    struct Always;

    impl Strategy for Always {
        fn entry(&self, _window: &SignalWindow<'_>, _open: &[&Position]) -> EntryDecision {
            EntryDecision { open: true }
        }

        fn exit(&self, _window: &SignalWindow<'_>, _position: &Position) -> ExitDecision {
            ExitDecision::hold()
        }
    }

    #[test]
    fn cross_up_then_down() {
        let mut closes = vec![100.0; 12];
        closes.extend([110.0, 120.0, 130.0, 125.0, 115.0, 80.0, 70.0, 60.0]);
        let data = candles(&closes);

        let mut backtest = Backtest::new(cross_config()).unwrap();
        let mut opened_at = Vec::new();
        let mut closed_at = Vec::new();
        for (i, candle) in data.iter().enumerate() {
            match backtest.push(*candle).unwrap() {
                Step::Processed { opened, closed } => {
                    if opened.is_some() {
                        opened_at.push(i);
                    }
                    closed_at.extend(closed.iter().map(|_| i));
                }
                Step::Warmup => assert_eq!(i, 0),
                Step::Halted => panic!("unexpected halt"),
            }
        }
        assert_eq!(opened_at, vec![12]);
        assert_eq!(closed_at, vec![17]);

        let position = backtest.positions().get(1).unwrap();
        assert_eq!(position.entry_price(), 110.0);
        let closure = position.closure().unwrap();
        assert_eq!(closure.reason, ExitReason::EmaSmaCross);
        assert_eq!(closure.price, 80.0);
        assert!(closure.pnl < 0.0);

        let report = backtest.report();
        assert_eq!(report.total_trades, 1);
        assert_eq!(report.lost_trades, 1);
        assert!((report.final_balance - (10_000.0 + closure.pnl)).abs() < 1e-9);
    }

    /// Candles from `(open, close)` pairs, so opens can gap away from the previous close.
    fn gapped(bodies: &[(f64, f64)]) -> Vec<Candle> {
        bodies
            .iter()
            .enumerate()
            .map(|(i, (open, close))| {
                Candle::try_from((i as i64 * MINUTE, *open, open.max(*close) + 1.0, open.min(*close) - 1.0, *close, 10.0))
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn default_rules_open_and_close() {
        let mut config = Config::default();
        config.indicators.ema = 2;
        config.indicators.sma = 3;
        config.indicators.rsi = 3;
        config.indicators.macd_fast = 2;
        config.indicators.macd_slow = 3;
        config.indicators.macd_signal = 2;
        config.indicators.bollinger = 3;

        // bar 4 gaps down to 98 and engulfs the red bar 3; bar 5 falls back under the SMA
        let data = gapped(&[
            (100.0, 100.0),
            (100.0, 100.0),
            (100.0, 100.0),
            (101.0, 99.0),
            (98.0, 103.0),
            (103.0, 100.0),
        ]);

        let mut backtest = Backtest::new(config).unwrap();
        let mut steps = Vec::new();
        for candle in &data {
            steps.push(backtest.push(*candle).unwrap());
        }
        assert!(matches!(steps[4], Step::Processed { opened: Some(1), .. }));
        for step in &steps[1..4] {
            assert_eq!(step, &Step::Processed { opened: None, closed: Vec::new() });
        }

        let position = backtest.positions().get(1).unwrap();
        assert_eq!(position.entry_price(), 103.0);
        let closure = position.closure().unwrap();
        assert_eq!(closure.reason, ExitReason::EmaSmaCross);
        assert_eq!(closure.price, 100.0);
        // leveraged delta: -3/103 of a 5000 notional
        assert!((closure.pnl + 3.0 / 103.0 * 5_000.0).abs() < 1e-6);

        let report = backtest.report();
        assert_eq!(report.total_trades, 1);
        assert_eq!(report.open_positions, 0);
    }

    #[test]
    fn balance_invariant() {
        for seed in 0..4 {
            let mut config = Config {
                risk_per_trade: 0.05,
                leverage: 5.0,
                stop_loss_pct: 0.03,
                take_profit_pct: 0.04,
                pnl_model: PnlModel::Leveraged,
                strategy: StrategyConfig::RuleBased(RuleBasedConfig {
                    entry: vec![EntryRule::Trend],
                    exit: vec![ExitRule::MacdCrossDown],
                    reentry_distance: None,
                }),
                ..Default::default()
            };
            config.indicators.sma = 3;
            config.indicators.ema = 2;

            let mut backtest = Backtest::new(config).unwrap();
            let mut closed_before: Vec<Position> = Vec::new();
            for candle in candles(&random_walk(seed, 250)) {
                backtest.push(candle).unwrap();

                let staked: f64 = backtest.positions().open_positions().iter().map(|p| p.stake()).sum();
                let realized: f64 = backtest.positions().closed_positions().filter_map(Position::pnl).sum();
                let expected = backtest.initial_balance() + realized - staked;
                assert!((backtest.balance() - expected).abs() < 1e-6);

                // closed positions never change
                let closed: Vec<Position> = backtest.positions().closed_positions().copied().collect();
                for before in &closed_before {
                    assert!(closed.contains(before));
                }
                closed_before = closed;
            }
            assert!(backtest.positions().closed_count() > 0);
        }
    }

    #[test]
    fn out_of_order_is_fatal() {
        let mut backtest = Backtest::new(Config::default()).unwrap();
        let data = candles(&[100.0, 101.0]);
        backtest.push(data[1]).unwrap();
        let result = backtest.push(data[0]);
        assert!(matches!(result, Err(Error::OutOfOrderCandle { .. })));

        // duplicate timestamp
        let result = backtest.push(data[1]);
        assert!(matches!(result, Err(Error::OutOfOrderCandle { .. })));
    }

    #[test]
    fn drawdown_guard_halts() {
        let config = Config {
            risk_per_trade: 0.5,
            leverage: 1.0,
            ..Default::default()
        };
        let mut backtest = Backtest::with_strategy(config, Box::new(Always)).unwrap();
        // the third candle body crosses the stop-loss at 95
        let data = candles(&[100.0, 100.0, 90.0, 91.0, 92.0]);

        assert_eq!(backtest.push(data[0]).unwrap(), Step::Warmup);
        assert!(matches!(backtest.push(data[1]).unwrap(), Step::Processed { opened: Some(1), .. }));
        match backtest.push(data[2]).unwrap() {
            Step::Processed { opened, closed } => {
                // 5000 < 10000 - 2500: the guard refuses a new entry
                assert_eq!(opened, None);
                assert_eq!(closed.len(), 1);
                assert_eq!(closed[0].closure().unwrap().reason, ExitReason::StopLoss);
            }
            step => panic!("unexpected {step:?}"),
        }
        assert_eq!(backtest.push(data[3]).unwrap(), Step::Halted);
        assert_eq!(backtest.push(data[4]).unwrap(), Step::Halted);
        assert_eq!(backtest.series().len(), 3);

        let report = backtest.report();
        assert!(report.halted);
        assert_eq!(report.final_balance, 5_000.0);
        assert_eq!(report.percent_change, -50.0);
        assert_eq!(report.win_rate, WinRate::Rate(0.0));
    }

    #[test]
    fn take_profit_credits_multiple() {
        let config = Config {
            leverage: 1.0,
            ..Default::default()
        };
        let mut backtest = Backtest::with_strategy(config, Box::new(Always)).unwrap();
        // entry at 100, take-profit at 115 inside the last body
        let report = backtest.run(candles(&[100.0, 100.0, 120.0])).unwrap();

        let first = backtest.positions().get(1).unwrap();
        assert_eq!(first.closure().unwrap().reason, ExitReason::TakeProfit);
        // 100 staked, 400 credited
        assert_eq!(first.pnl(), Some(300.0));
        assert_eq!(report.win_trades, 1);
        // the entry on the last candle stays open
        assert_eq!(report.open_positions, 1);
    }

    #[test]
    fn run_matches_push() {
        let data = candles(&random_walk(9, 300));
        let config = Config {
            strategy: StrategyConfig::WeightedScore(WeightedScoreConfig {
                volatility_ceiling: 0.05,
                ..Default::default()
            }),
            ..Default::default()
        };

        let mut streamed = Backtest::new(config.clone()).unwrap();
        for candle in &data {
            streamed.push(*candle).unwrap();
        }

        let mut batch = Backtest::new(config).unwrap();
        let report = batch.run(data.clone()).unwrap();
        assert_eq!(report, streamed.report());
        assert_eq!(report.total_trades, batch.positions().closed_count());

        // same inputs, same outcome
        batch.reset().unwrap();
        assert_eq!(batch.balance(), batch.initial_balance());
        assert!(batch.series().is_empty());
        assert_eq!(batch.run(data).unwrap(), report);
    }

    #[test]
    fn empty_run() {
        let mut backtest = Backtest::new(Config::default()).unwrap();
        assert!(matches!(backtest.run(Vec::new()), Err(Error::CandleDataEmpty)));
    }

    #[test]
    fn reject_bad_config() {
        let config = Config {
            leverage: -1.0,
            ..Default::default()
        };
        assert!(matches!(Backtest::new(config), Err(Error::InvalidLeverage(_))));
    }

    #[test]
    fn look_ahead_stays_out_of_signals() {
        let data = candles(&random_walk(5, 80));
        let mut backtest = Backtest::new(Config::default()).unwrap();
        backtest.run(data.clone()).unwrap();

        let look_ahead = backtest.look_ahead();
        assert_eq!(look_ahead.chikou.len(), data.len());
        assert_eq!(look_ahead.chikou[0], Some(data[26].close()));
    }
}
