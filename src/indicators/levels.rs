use super::rolling::Window;
use crate::engine::Candle;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Retracement fractions of [`FibonacciOutput::levels`].
pub const FIBONACCI_RATIOS: [f64; 5] = [0.236, 0.382, 0.5, 0.618, 0.786];

/// Classic floor pivots of the previous candle.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PivotsOutput {
    /// `(H + L + C) / 3`.
    pub pivot: f64,
    /// `2·PP − L`.
    pub r1: f64,
    /// `2·PP − H`.
    pub s1: f64,
    /// `PP + (H − L)`.
    pub r2: f64,
    /// `PP − (H − L)`.
    pub s2: f64,
}

impl PivotsOutput {
    pub(crate) fn from_candle(candle: &Candle) -> Self {
        let (high, low) = (candle.high(), candle.low());
        let pivot = (high + low + candle.close()) / 3.0;
        Self {
            pivot,
            r1: 2.0 * pivot - low,
            s1: 2.0 * pivot - high,
            r2: pivot + (high - low),
            s2: pivot - (high - low),
        }
    }
}

/// Fibonacci retracements between the rolling high and low.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FibonacciOutput {
    /// Highest high of the window.
    pub high: f64,
    /// Lowest low of the window.
    pub low: f64,
    /// `high − (high − low) × ratio` for each of [`FIBONACCI_RATIOS`].
    pub levels: [f64; 5],
}

/// Heikin-Ashi candle.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeikinAshiOutput {
    /// Heikin-Ashi open.
    pub open: f64,
    /// Heikin-Ashi high.
    pub high: f64,
    /// Heikin-Ashi low.
    pub low: f64,
    /// Heikin-Ashi close.
    pub close: f64,
}

/// Zig-zag state at one candle.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZigZagOutput {
    /// Close recorded as a pivot on this candle.
    pub pivot: Option<f64>,
    /// Last recorded pivot, carried forward.
    pub level: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct Fibonacci {
    highs: Window,
    lows: Window,
}

impl Fibonacci {
    pub(crate) fn new(period: usize) -> Self {
        Self {
            highs: Window::new(period),
            lows: Window::new(period),
        }
    }

    pub(crate) fn next(&mut self, candle: &Candle) -> Option<FibonacciOutput> {
        self.highs.push(candle.high());
        self.lows.push(candle.low());
        let high = self.highs.max()?;
        let low = self.lows.min()?;
        Some(FibonacciOutput {
            high,
            low,
            levels: FIBONACCI_RATIOS.map(|ratio| high - (high - low) * ratio),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct HeikinAshi {
    previous: Option<HeikinAshiOutput>,
}

impl HeikinAshi {
    pub(crate) fn next(&mut self, candle: &Candle) -> HeikinAshiOutput {
        let close = (candle.open() + candle.high() + candle.low() + candle.close()) / 4.0;
        let open = match self.previous {
            Some(previous) => (previous.open + previous.close) / 2.0,
            None => candle.open(),
        };
        let output = HeikinAshiOutput {
            open,
            high: candle.high().max(open).max(close),
            low: candle.low().min(open).min(close),
            close,
        };
        self.previous = Some(output);
        output
    }
}

/// Zig-zag over closes.
///
/// The first close is the origin pivot. A later close becomes a pivot when it moves at
/// least `percentage` away from the last pivot and reverses the previous swing.
#[derive(Debug, Clone)]
pub(crate) struct ZigZag {
    percentage: f64,
    last: Option<f64>,
    direction: Swing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Swing {
    Flat,
    Up,
    Down,
}

impl ZigZag {
    pub(crate) fn new(percentage: f64) -> Self {
        Self {
            percentage,
            last: None,
            direction: Swing::Flat,
        }
    }

    pub(crate) fn next(&mut self, close: f64) -> ZigZagOutput {
        let Some(last) = self.last else {
            self.last = Some(close);
            return ZigZagOutput {
                pivot: Some(close),
                level: close,
            };
        };

        let change = (close - last) / last * 100.0;
        let swing = if change >= self.percentage && self.direction != Swing::Up {
            Some(Swing::Up)
        } else if change <= -self.percentage && self.direction != Swing::Down {
            Some(Swing::Down)
        } else {
            None
        };

        match swing {
            Some(direction) => {
                self.direction = direction;
                self.last = Some(close);
                ZigZagOutput {
                    pivot: Some(close),
                    level: close,
                }
            }
            None => ZigZagOutput { pivot: None, level: last },
        }
    }
}
