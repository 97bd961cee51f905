//! Technical indicators.
//!
//! [`IndicatorEngine`] folds candles one at a time into an [`IndicatorSnapshot`].
//! Each snapshot depends only on the candles up to and including its own, so running
//! the engine over a prefix yields exactly the snapshots of the full run for that
//! prefix. A field is `None` while its window is not yet full or when the value is
//! undefined (a zero denominator, for instance).
//!
//! Columns that read later candles live in [`LookAhead`] and are never part of a
//! snapshot.

mod display;
mod ema;
mod levels;
mod oscillators;
mod rolling;
mod trend;
mod volume;

pub use display::LookAhead;
pub use levels::{FIBONACCI_RATIOS, FibonacciOutput, HeikinAshiOutput, PivotsOutput, ZigZagOutput};
pub use trend::{BollingerOutput, ElderRayOutput, MacdOutput, PpoOutput};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::engine::Candle;
use crate::errors::{Error, Result};
use ema::Ema;
use levels::{Fibonacci, HeikinAshi, ZigZag};
use oscillators::{Cci, Lag, Rsi, Stochastic};
use rolling::{Window, finite};
use trend::{Atr, Bollinger, ElderRay, Macd, Midpoint, Ppo};
use volume::{AdLine, Obv, Vwap, Vwma};

/// Periods and parameters of every indicator.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorParams {
    /// EMA span.
    pub ema: usize,
    /// SMA window.
    pub sma: usize,
    /// RSI window.
    pub rsi: usize,
    /// MACD fast EMA span.
    pub macd_fast: usize,
    /// MACD slow EMA span.
    pub macd_slow: usize,
    /// MACD signal EMA span.
    pub macd_signal: usize,
    /// Bollinger window.
    pub bollinger: usize,
    /// Bollinger width in standard deviations.
    pub bollinger_width: f64,
    /// Stochastic %K window.
    pub stoch_k: usize,
    /// Stochastic %D smoothing window.
    pub stoch_d: usize,
    /// ATR window.
    pub atr: usize,
    /// CCI window.
    pub cci: usize,
    /// Momentum lag.
    pub momentum: usize,
    /// Standard deviation window.
    pub std_dev: usize,
    /// Fibonacci high/low window.
    pub fibonacci: usize,
    /// Rate of change lag.
    pub roc: usize,
    /// VWMA window.
    pub vwma: usize,
    /// PPO fast EMA span.
    pub ppo_fast: usize,
    /// PPO slow EMA span.
    pub ppo_slow: usize,
    /// PPO signal EMA span.
    pub ppo_signal: usize,
    /// Elder ray EMA span.
    pub elder: usize,
    /// Minimum zig-zag swing, in percent.
    pub zig_zag_pct: f64,
    /// Centered window of the support/resistance columns.
    pub support_resistance: usize,
    /// Average volume window.
    pub volume_avg: usize,
    /// Ichimoku conversion line window.
    pub tenkan: usize,
    /// Ichimoku base line window.
    pub kijun: usize,
    /// Ichimoku leading span B window.
    pub senkou_b: usize,
    /// Ichimoku displacement.
    pub ichimoku_shift: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            ema: 5,
            sma: 10,
            rsi: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bollinger: 20,
            bollinger_width: 2.0,
            stoch_k: 14,
            stoch_d: 3,
            atr: 14,
            cci: 20,
            momentum: 14,
            std_dev: 20,
            fibonacci: 14,
            roc: 14,
            vwma: 20,
            ppo_fast: 12,
            ppo_slow: 26,
            ppo_signal: 9,
            elder: 13,
            zig_zag_pct: 5.0,
            support_resistance: 14,
            volume_avg: 20,
            tenkan: 9,
            kijun: 26,
            senkou_b: 52,
            ichimoku_shift: 26,
        }
    }
}

impl IndicatorParams {
    /// Rejects zero periods and non-positive widths.
    pub fn validate(&self) -> Result<()> {
        let periods = [
            ("ema", self.ema),
            ("sma", self.sma),
            ("rsi", self.rsi),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal", self.macd_signal),
            ("bollinger", self.bollinger),
            ("stoch_k", self.stoch_k),
            ("stoch_d", self.stoch_d),
            ("atr", self.atr),
            ("cci", self.cci),
            ("momentum", self.momentum),
            ("std_dev", self.std_dev),
            ("fibonacci", self.fibonacci),
            ("roc", self.roc),
            ("vwma", self.vwma),
            ("ppo_fast", self.ppo_fast),
            ("ppo_slow", self.ppo_slow),
            ("ppo_signal", self.ppo_signal),
            ("elder", self.elder),
            ("support_resistance", self.support_resistance),
            ("volume_avg", self.volume_avg),
            ("tenkan", self.tenkan),
            ("kijun", self.kijun),
            ("senkou_b", self.senkou_b),
        ];
        if let Some((name, _)) = periods.iter().find(|(_, period)| *period == 0) {
            return Err(Error::InvalidPeriod(*name));
        }
        if !(self.bollinger_width > 0.0 && self.bollinger_width.is_finite()) {
            return Err(Error::InvalidPeriod("bollinger_width"));
        }
        if !(self.zig_zag_pct > 0.0 && self.zig_zag_pct.is_finite()) {
            return Err(Error::InvalidPeriod("zig_zag_pct"));
        }
        Ok(())
    }
}

/// Indicator values attached to one candle.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorSnapshot {
    /// Exponential moving average of closes.
    pub ema: f64,
    /// Simple moving average of closes.
    pub sma: Option<f64>,
    /// Relative strength index.
    pub rsi: Option<f64>,
    /// MACD line and its signal.
    pub macd: MacdOutput,
    /// Bollinger bands.
    pub bollinger: Option<BollingerOutput>,
    /// Volume-weighted average price of the current UTC day.
    pub vwap: Option<f64>,
    /// On-balance volume.
    pub obv: f64,
    /// Stochastic %K.
    pub stoch_k: Option<f64>,
    /// Stochastic %D, the mean of %K.
    pub stoch_d: Option<f64>,
    /// Average true range.
    pub atr: Option<f64>,
    /// Accumulation/distribution line.
    pub ad_line: f64,
    /// Commodity channel index.
    pub cci: Option<f64>,
    /// Pivots of the previous candle; absent on the first one.
    pub pivots: Option<PivotsOutput>,
    /// `close − close[n]`.
    pub momentum: Option<f64>,
    /// Sample standard deviation of closes.
    pub std_dev: Option<f64>,
    /// Fibonacci retracements of the rolling range.
    pub fibonacci: Option<FibonacciOutput>,
    /// `(close − close[n]) / close[n] × 100`.
    pub roc: Option<f64>,
    /// Volume-weighted moving average.
    pub vwma: Option<f64>,
    /// Percentage price oscillator and its signal.
    pub ppo: PpoOutput,
    /// Ichimoku conversion line.
    pub tenkan: Option<f64>,
    /// Ichimoku base line.
    pub kijun: Option<f64>,
    /// Heikin-Ashi candle.
    pub heikin_ashi: HeikinAshiOutput,
    /// Elder Ray bull and bear power.
    pub elder_ray: ElderRayOutput,
    /// Zig-zag pivot and forward-filled level.
    pub zig_zag: ZigZagOutput,
    /// Mean volume over the window.
    pub volume_avg: Option<f64>,
}

/// Incremental indicator computation.
///
/// Feed candles in series order; the engine does not reorder or check them.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    params: IndicatorParams,
    previous: Option<Candle>,
    ema: Ema,
    sma: Window,
    rsi: Rsi,
    macd: Macd,
    bollinger: Bollinger,
    vwap: Vwap,
    obv: Obv,
    stochastic: Stochastic,
    atr: Atr,
    ad_line: AdLine,
    cci: Cci,
    momentum: Lag,
    std_dev: Window,
    fibonacci: Fibonacci,
    roc: Lag,
    vwma: Vwma,
    ppo: Ppo,
    tenkan: Midpoint,
    kijun: Midpoint,
    heikin_ashi: HeikinAshi,
    elder_ray: ElderRay,
    zig_zag: ZigZag,
    volume_avg: Window,
}

impl IndicatorEngine {
    /// Creates an engine with no history.
    pub fn new(params: IndicatorParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            previous: None,
            ema: Ema::new(params.ema),
            sma: Window::new(params.sma),
            rsi: Rsi::new(params.rsi),
            macd: Macd::new(params.macd_fast, params.macd_slow, params.macd_signal),
            bollinger: Bollinger::new(params.bollinger, params.bollinger_width),
            vwap: Vwap::default(),
            obv: Obv::default(),
            stochastic: Stochastic::new(params.stoch_k, params.stoch_d),
            atr: Atr::new(params.atr),
            ad_line: AdLine::default(),
            cci: Cci::new(params.cci),
            momentum: Lag::new(params.momentum),
            std_dev: Window::new(params.std_dev),
            fibonacci: Fibonacci::new(params.fibonacci),
            roc: Lag::new(params.roc),
            vwma: Vwma::new(params.vwma),
            ppo: Ppo::new(params.ppo_fast, params.ppo_slow, params.ppo_signal),
            tenkan: Midpoint::new(params.tenkan),
            kijun: Midpoint::new(params.kijun),
            heikin_ashi: HeikinAshi::default(),
            elder_ray: ElderRay::new(params.elder),
            zig_zag: ZigZag::new(params.zig_zag_pct),
            volume_avg: Window::new(params.volume_avg),
            params,
        })
    }

    /// Returns the parameters.
    pub fn params(&self) -> &IndicatorParams {
        &self.params
    }

    /// Folds the next candle and returns its snapshot.
    pub fn next(&mut self, candle: &Candle) -> IndicatorSnapshot {
        let close = candle.close();
        self.sma.push(close);
        self.std_dev.push(close);
        self.volume_avg.push(candle.volume());
        let (stoch_k, stoch_d) = self.stochastic.next(candle);

        let snapshot = IndicatorSnapshot {
            ema: self.ema.next(close),
            sma: self.sma.mean(),
            rsi: self.rsi.next(close),
            macd: self.macd.next(close),
            bollinger: self.bollinger.next(close),
            vwap: self.vwap.next(candle),
            obv: self.obv.next(candle),
            stoch_k,
            stoch_d,
            atr: self.atr.next(candle),
            ad_line: self.ad_line.next(candle),
            cci: self.cci.next(candle),
            pivots: self.previous.as_ref().map(PivotsOutput::from_candle),
            momentum: self.momentum.next(close).map(|lagged| close - lagged),
            std_dev: self.std_dev.std().and_then(finite),
            fibonacci: self.fibonacci.next(candle),
            roc: self.roc.next(close).map(|lagged| (close - lagged) / lagged * 100.0),
            vwma: self.vwma.next(candle),
            ppo: self.ppo.next(close),
            tenkan: self.tenkan.next(candle),
            kijun: self.kijun.next(candle),
            heikin_ashi: self.heikin_ashi.next(candle),
            elder_ray: self.elder_ray.next(candle),
            zig_zag: self.zig_zag.next(close),
            volume_avg: self.volume_avg.mean(),
        };
        self.previous = Some(*candle);
        snapshot
    }

    /// Computes the snapshots of a whole series.
    pub fn compute(candles: &[Candle], params: IndicatorParams) -> Result<Vec<IndicatorSnapshot>> {
        let mut engine = Self::new(params)?;
        Ok(candles.iter().map(|candle| engine.next(candle)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_walk(seed: u64, len: usize) -> Vec<Candle> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut close: f64 = 100.0;
        (0..len)
            .map(|i| {
                let open = close;
                close = (close * (1.0 + rng.random_range(-0.03..0.03))).max(1.0);
                let high = open.max(close) * (1.0 + rng.random_range(0.0..0.01));
                let low = open.min(close) * (1.0 - rng.random_range(0.0..0.01));
                let volume = rng.random_range(0.0..50.0);
                Candle::try_from((i as i64 * 3_600_000, open, high, low, close, volume)).unwrap()
            })
            .collect()
    }

    #[test]
    fn prefix_purity() {
        let candles = random_walk(42, 300);
        let full = IndicatorEngine::compute(&candles, IndicatorParams::default()).unwrap();
        for len in [1, 13, 14, 52, 150, 299] {
            let prefix = IndicatorEngine::compute(&candles[..len], IndicatorParams::default()).unwrap();
            assert_eq!(prefix[..], full[..len]);
        }
    }

    #[test]
    fn warmup_lengths() {
        let candles = random_walk(3, 60);
        let snapshots = IndicatorEngine::compute(&candles, IndicatorParams::default()).unwrap();

        let first = |pick: fn(&IndicatorSnapshot) -> bool| snapshots.iter().position(pick);
        assert_eq!(first(|s| s.sma.is_some()), Some(9));
        assert_eq!(first(|s| s.bollinger.is_some()), Some(19));
        assert_eq!(first(|s| s.atr.is_some()), Some(13));
        assert_eq!(first(|s| s.momentum.is_some()), Some(14));
        assert_eq!(first(|s| s.stoch_d.is_some()), Some(15));
        assert_eq!(first(|s| s.kijun.is_some()), Some(25));
        assert_eq!(first(|s| s.pivots.is_some()), Some(1));
        assert_eq!(snapshots[0].obv, 0.0);
        assert_eq!(snapshots[0].ad_line, 0.0);
        assert_eq!(snapshots[0].ema, candles[0].close());
    }

    #[test]
    fn bounded_oscillators() {
        for seed in 0..5 {
            let candles = random_walk(seed, 400);
            for snapshot in IndicatorEngine::compute(&candles, IndicatorParams::default()).unwrap() {
                if let Some(rsi) = snapshot.rsi {
                    assert!((0.0..=100.0).contains(&rsi));
                }
                if let Some(k) = snapshot.stoch_k {
                    assert!((0.0..=100.0).contains(&k));
                }
                if let Some(bands) = snapshot.bollinger {
                    assert!(bands.lower <= bands.upper);
                }
                let ha = snapshot.heikin_ashi;
                assert!(ha.low <= ha.open.min(ha.close) && ha.high >= ha.open.max(ha.close));
            }
        }
    }

    #[test]
    fn sma_matches_ta() {
        use ta::Next;
        use ta::indicators::SimpleMovingAverage;

        let candles = random_walk(11, 100);
        let mut reference = SimpleMovingAverage::new(10).unwrap();
        for (i, snapshot) in IndicatorEngine::compute(&candles, IndicatorParams::default())
            .unwrap()
            .iter()
            .enumerate()
        {
            let expected = reference.next(candles[i].close());
            if let Some(sma) = snapshot.sma {
                assert!((sma - expected).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn reject_invalid_params() {
        let params = IndicatorParams {
            cci: 0,
            ..Default::default()
        };
        assert!(matches!(IndicatorEngine::new(params), Err(Error::InvalidPeriod("cci"))));

        let params = IndicatorParams {
            zig_zag_pct: -1.0,
            ..Default::default()
        };
        assert!(matches!(params.validate(), Err(Error::InvalidPeriod("zig_zag_pct"))));
    }
}
