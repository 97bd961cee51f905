use super::ema::Ema;
use super::rolling::{Window, finite};
use crate::engine::Candle;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// MACD line and its signal.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdOutput {
    /// `EMA(fast) − EMA(slow)`.
    pub macd: f64,
    /// EMA of the MACD line.
    pub signal: f64,
}

/// Percentage price oscillator and its signal.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PpoOutput {
    /// `(EMA(fast) − EMA(slow)) / EMA(slow) × 100`.
    pub ppo: f64,
    /// EMA of the PPO line.
    pub signal: f64,
}

/// Bollinger bands.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerOutput {
    /// `SMA + k·σ`.
    pub upper: f64,
    /// The simple moving average.
    pub middle: f64,
    /// `SMA − k·σ`.
    pub lower: f64,
}

/// Elder ray bull and bear power.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElderRayOutput {
    /// `high − EMA`.
    pub bull_power: f64,
    /// `low − EMA`.
    pub bear_power: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct Macd {
    fast: Ema,
    slow: Ema,
    signal: Ema,
}

impl Macd {
    pub(crate) fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self {
            fast: Ema::new(fast),
            slow: Ema::new(slow),
            signal: Ema::new(signal),
        }
    }

    pub(crate) fn next(&mut self, close: f64) -> MacdOutput {
        let macd = self.fast.next(close) - self.slow.next(close);
        MacdOutput {
            macd,
            signal: self.signal.next(macd),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Ppo {
    fast: Ema,
    slow: Ema,
    signal: Ema,
}

impl Ppo {
    pub(crate) fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self {
            fast: Ema::new(fast),
            slow: Ema::new(slow),
            signal: Ema::new(signal),
        }
    }

    pub(crate) fn next(&mut self, close: f64) -> PpoOutput {
        let fast = self.fast.next(close);
        let slow = self.slow.next(close);
        let ppo = (fast - slow) / slow * 100.0;
        PpoOutput {
            ppo,
            signal: self.signal.next(ppo),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ElderRay {
    ema: Ema,
}

impl ElderRay {
    pub(crate) fn new(period: usize) -> Self {
        Self { ema: Ema::new(period) }
    }

    pub(crate) fn next(&mut self, candle: &Candle) -> ElderRayOutput {
        let ema = self.ema.next(candle.close());
        ElderRayOutput {
            bull_power: candle.high() - ema,
            bear_power: candle.low() - ema,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Bollinger {
    closes: Window,
    width: f64,
}

impl Bollinger {
    pub(crate) fn new(period: usize, width: f64) -> Self {
        Self {
            closes: Window::new(period),
            width,
        }
    }

    pub(crate) fn next(&mut self, close: f64) -> Option<BollingerOutput> {
        self.closes.push(close);
        let middle = self.closes.mean()?;
        let deviation = finite(self.closes.std()?)? * self.width;
        Some(BollingerOutput {
            upper: middle + deviation,
            middle,
            lower: middle - deviation,
        })
    }
}

/// Average true range as a simple mean of true ranges.
#[derive(Debug, Clone)]
pub(crate) struct Atr {
    previous_close: Option<f64>,
    ranges: Window,
}

impl Atr {
    pub(crate) fn new(period: usize) -> Self {
        Self {
            previous_close: None,
            ranges: Window::new(period),
        }
    }

    pub(crate) fn next(&mut self, candle: &Candle) -> Option<f64> {
        let range = candle.high() - candle.low();
        let true_range = match self.previous_close {
            Some(close) => range
                .max((candle.high() - close).abs())
                .max((candle.low() - close).abs()),
            None => range,
        };
        self.previous_close = Some(candle.close());
        self.ranges.push(true_range);
        self.ranges.mean()
    }
}

/// Midpoint of the highest high and the lowest low over a window.
///
/// Drives the Ichimoku conversion and base lines.
#[derive(Debug, Clone)]
pub(crate) struct Midpoint {
    highs: Window,
    lows: Window,
}

impl Midpoint {
    pub(crate) fn new(period: usize) -> Self {
        Self {
            highs: Window::new(period),
            lows: Window::new(period),
        }
    }

    pub(crate) fn next(&mut self, candle: &Candle) -> Option<f64> {
        self.highs.push(candle.high());
        self.lows.push(candle.low());
        Some((self.highs.max()? + self.lows.min()?) / 2.0)
    }
}
