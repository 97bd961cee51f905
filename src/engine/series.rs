use std::slice::Iter;

use crate::engine::Candle;
use crate::errors::{Error, Result};

/// Append-only, strictly time-ordered sequence of candles.
///
/// Once a candle is appended it is never altered or removed, so any reader holding an
/// index `i` observes the same prefix `0..=i` for the rest of the run.
#[derive(Debug, Clone, Default)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Creates an empty series.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a candle.
    ///
    /// ### Returns
    /// The index of the new candle, or [`Error::OutOfOrderCandle`] if its timestamp is
    /// not strictly after the last one.
    pub fn append(&mut self, candle: Candle) -> Result<usize> {
        if let Some(last) = self.candles.last() {
            if candle.time() <= last.time() {
                return Err(Error::OutOfOrderCandle {
                    previous: last.timestamp(),
                    next: candle.timestamp(),
                });
            }
        }
        self.candles.push(candle);
        Ok(self.candles.len() - 1)
    }

    /// Returns the candle at `index`.
    pub fn get(&self, index: usize) -> Option<&Candle> {
        self.candles.get(index)
    }

    /// Returns candles `from..to`, clamped to the available range.
    pub fn slice(&self, from: usize, to: usize) -> &[Candle] {
        let to = to.min(self.candles.len());
        let from = from.min(to);
        &self.candles[from..to]
    }

    /// Returns the most recent candle.
    pub fn latest(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// Returns the number of candles.
    pub fn len(&self) -> usize {
        self.candles.len()
    }

    /// Returns true if no candle was appended yet.
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Returns an iterator over the candles in time order.
    pub fn iter(&self) -> Iter<'_, Candle> {
        self.candles.iter()
    }

    /// Returns all candles as a slice.
    pub fn as_slice(&self) -> &[Candle] {
        &self.candles
    }
}

impl TryFrom<Vec<Candle>> for CandleSeries {
    type Error = Error;

    fn try_from(candles: Vec<Candle>) -> Result<Self> {
        let mut series = Self::new();
        for candle in candles {
            series.append(candle)?;
        }
        Ok(series)
    }
}
