use super::rolling::{Window, finite};
use crate::engine::Candle;

/// Relative strength index over simple means of gains and losses.
///
/// The first bar has no delta and contributes a zero gain and loss. A window without
/// losses yields 100; a window without any movement yields nothing.
#[derive(Debug, Clone)]
pub(crate) struct Rsi {
    previous_close: Option<f64>,
    gains: Window,
    losses: Window,
}

impl Rsi {
    pub(crate) fn new(period: usize) -> Self {
        Self {
            previous_close: None,
            gains: Window::new(period),
            losses: Window::new(period),
        }
    }

    pub(crate) fn next(&mut self, close: f64) -> Option<f64> {
        let delta = self.previous_close.map_or(0.0, |previous| close - previous);
        self.previous_close = Some(close);
        self.gains.push(delta.max(0.0));
        self.losses.push((-delta).max(0.0));

        let gain = self.gains.mean()?;
        let loss = self.losses.mean()?;
        finite(100.0 - 100.0 / (1.0 + gain / loss))
    }
}

/// Stochastic oscillator %K and its smoothed %D.
#[derive(Debug, Clone)]
pub(crate) struct Stochastic {
    highs: Window,
    lows: Window,
    k: Window,
}

impl Stochastic {
    pub(crate) fn new(k_period: usize, d_period: usize) -> Self {
        Self {
            highs: Window::new(k_period),
            lows: Window::new(k_period),
            k: Window::new(d_period),
        }
    }

    pub(crate) fn next(&mut self, candle: &Candle) -> (Option<f64>, Option<f64>) {
        self.highs.push(candle.high());
        self.lows.push(candle.low());

        let k = match (self.highs.max(), self.lows.min()) {
            (Some(high), Some(low)) => finite(100.0 * (candle.close() - low) / (high - low)),
            _ => None,
        };
        self.k.push(k.unwrap_or(f64::NAN));
        (k, self.k.mean().and_then(finite))
    }
}

/// Commodity channel index on the typical price.
#[derive(Debug, Clone)]
pub(crate) struct Cci {
    typical: Window,
}

impl Cci {
    const CONSTANT: f64 = 0.015;

    pub(crate) fn new(period: usize) -> Self {
        Self {
            typical: Window::new(period),
        }
    }

    pub(crate) fn next(&mut self, candle: &Candle) -> Option<f64> {
        let typical = (candle.high() + candle.low() + candle.close()) / 3.0;
        self.typical.push(typical);
        let mean = self.typical.mean()?;
        let deviation = self.typical.mean_abs_dev()?;
        finite((typical - mean) / (Self::CONSTANT * deviation))
    }
}

/// Close price `period` bars ago, paired with the current one.
#[derive(Debug, Clone)]
pub(crate) struct Lag {
    closes: Window,
}

impl Lag {
    pub(crate) fn new(period: usize) -> Self {
        Self {
            closes: Window::new(period + 1),
        }
    }

    pub(crate) fn next(&mut self, close: f64) -> Option<f64> {
        self.closes.push(close);
        self.closes.oldest()
    }
}
