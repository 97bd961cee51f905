use chrono::NaiveDate;

use super::rolling::{Window, finite};
use crate::engine::Candle;

/// Volume-weighted average price, restarted on every UTC calendar day.
#[derive(Debug, Clone, Default)]
pub(crate) struct Vwap {
    day: Option<NaiveDate>,
    price_volume: f64,
    volume: f64,
}

impl Vwap {
    pub(crate) fn next(&mut self, candle: &Candle) -> Option<f64> {
        let day = candle.date();
        if self.day != Some(day) {
            self.day = Some(day);
            self.price_volume = 0.0;
            self.volume = 0.0;
        }
        self.price_volume += candle.close() * candle.volume();
        self.volume += candle.volume();
        finite(self.price_volume / self.volume)
    }
}

/// On-balance volume, starting at zero.
#[derive(Debug, Clone, Default)]
pub(crate) struct Obv {
    previous_close: Option<f64>,
    value: f64,
}

impl Obv {
    pub(crate) fn next(&mut self, candle: &Candle) -> f64 {
        if let Some(previous) = self.previous_close {
            if candle.close() > previous {
                self.value += candle.volume();
            } else if candle.close() < previous {
                self.value -= candle.volume();
            }
        }
        self.previous_close = Some(candle.close());
        self.value
    }
}

/// Accumulation/distribution line.
///
/// The first bar is the zero origin; a bar with `high == low` adds nothing.
#[derive(Debug, Clone, Default)]
pub(crate) struct AdLine {
    started: bool,
    value: f64,
}

impl AdLine {
    pub(crate) fn next(&mut self, candle: &Candle) -> f64 {
        if !self.started {
            self.started = true;
            return self.value;
        }
        let range = candle.high() - candle.low();
        if range > 0.0 {
            let multiplier = ((candle.close() - candle.low()) - (candle.high() - candle.close())) / range;
            self.value += multiplier * candle.volume();
        }
        self.value
    }
}

/// Volume-weighted moving average.
#[derive(Debug, Clone)]
pub(crate) struct Vwma {
    price_volume: Window,
    volume: Window,
}

impl Vwma {
    pub(crate) fn new(period: usize) -> Self {
        Self {
            price_volume: Window::new(period),
            volume: Window::new(period),
        }
    }

    pub(crate) fn next(&mut self, candle: &Candle) -> Option<f64> {
        self.price_volume.push(candle.close() * candle.volume());
        self.volume.push(candle.volume());
        finite(self.price_volume.sum()? / self.volume.sum()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: i64 = 3_600_000;

    fn candle(time: i64, high: f64, low: f64, close: f64, volume: f64) -> Candle {
        Candle::try_from((time, close, high, low, close, volume)).unwrap()
    }

    #[test]
    fn vwap_resets_daily() {
        let mut vwap = Vwap::default();
        assert_eq!(vwap.next(&candle(0, 11.0, 9.0, 10.0, 1.0)), Some(10.0));
        assert_eq!(vwap.next(&candle(HOUR, 21.0, 19.0, 20.0, 3.0)), Some(17.5));
        // next UTC day
        assert_eq!(vwap.next(&candle(24 * HOUR, 31.0, 29.0, 30.0, 2.0)), Some(30.0));
    }

    #[test]
    fn vwap_without_volume() {
        let mut vwap = Vwap::default();
        assert_eq!(vwap.next(&candle(0, 11.0, 9.0, 10.0, 0.0)), None);
    }

    #[test]
    fn obv() {
        let mut obv = Obv::default();
        assert_eq!(obv.next(&candle(0, 11.0, 9.0, 10.0, 5.0)), 0.0);
        assert_eq!(obv.next(&candle(1, 12.0, 10.0, 11.0, 2.0)), 2.0);
        assert_eq!(obv.next(&candle(2, 12.0, 10.0, 11.0, 9.0)), 2.0);
        assert_eq!(obv.next(&candle(3, 11.0, 9.0, 10.0, 3.0)), -1.0);
    }

    #[test]
    fn ad_line() {
        let mut ad = AdLine::default();
        assert_eq!(ad.next(&candle(0, 12.0, 8.0, 12.0, 10.0)), 0.0);
        // close at the high: multiplier 1
        assert_eq!(ad.next(&candle(1, 12.0, 8.0, 12.0, 10.0)), 10.0);
        // close at the low: multiplier -1
        assert_eq!(ad.next(&candle(2, 12.0, 8.0, 8.0, 4.0)), 6.0);
        // flat bar
        assert_eq!(ad.next(&candle(3, 8.0, 8.0, 8.0, 100.0)), 6.0);
    }

    #[test]
    fn vwma() {
        let mut vwma = Vwma::new(2);
        assert!(vwma.next(&candle(0, 11.0, 9.0, 10.0, 1.0)).is_none());
        assert_eq!(vwma.next(&candle(1, 21.0, 19.0, 20.0, 3.0)), Some(17.5));
    }
}
