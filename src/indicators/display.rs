//! Columns that read candles *after* the index they are attached to.
//!
//! They are only meant for charts and exports. Strategies receive an
//! [`IndicatorSnapshot`](super::IndicatorSnapshot), which has no field for any of them.

use super::IndicatorParams;
use super::trend::Midpoint;
use crate::engine::Candle;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Look-ahead columns, one entry per candle.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LookAhead {
    /// Ichimoku leading span A: midpoint of conversion and base lines, shifted forward.
    pub senkou_a: Vec<Option<f64>>,
    /// Ichimoku leading span B: long-window midpoint, shifted forward.
    pub senkou_b: Vec<Option<f64>>,
    /// Ichimoku lagging span: the close `shift` candles later.
    pub chikou: Vec<Option<f64>>,
    /// Last local low of a centered window, carried forward.
    pub support: Vec<Option<f64>>,
    /// Last local high of a centered window, carried forward.
    pub resistance: Vec<Option<f64>>,
}

impl LookAhead {
    /// Computes every look-ahead column over the whole series.
    pub fn compute(candles: &[Candle], params: &IndicatorParams) -> Self {
        let shift = params.ichimoku_shift;
        let len = candles.len();

        let mut tenkan = Midpoint::new(params.tenkan);
        let mut kijun = Midpoint::new(params.kijun);
        let mut long = Midpoint::new(params.senkou_b);
        let mut span_a = Vec::with_capacity(len);
        let mut span_b = Vec::with_capacity(len);
        for candle in candles {
            let conversion = tenkan.next(candle);
            let base = kijun.next(candle);
            span_a.push(conversion.zip(base).map(|(c, b)| (c + b) / 2.0));
            span_b.push(long.next(candle));
        }

        let (support, resistance) = centered_extremes(candles, params.support_resistance);
        Self {
            senkou_a: shift_forward(&span_a, shift),
            senkou_b: shift_forward(&span_b, shift),
            chikou: (0..len)
                .map(|i| candles.get(i + shift).map(Candle::close))
                .collect(),
            support,
            resistance,
        }
    }
}

fn shift_forward(values: &[Option<f64>], shift: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| i.checked_sub(shift).and_then(|j| values[j]))
        .collect()
}

/// Marks candle `i` when it holds the first extreme of the window
/// `[i − w/2, i + w − 1 − w/2]`, then carries the last mark forward.
fn centered_extremes(candles: &[Candle], window: usize) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let half = window / 2;
    let mut support = Vec::with_capacity(candles.len());
    let mut resistance = Vec::with_capacity(candles.len());
    let (mut last_support, mut last_resistance) = (None, None);

    for i in 0..candles.len() {
        let start = i.checked_sub(half);
        let end = i + window - 1 - half;
        if let Some(start) = start.filter(|_| end < candles.len()) {
            let span = &candles[start..=end];
            if first_extreme(span, Candle::high, |a, b| a > b) == half {
                last_resistance = Some(candles[i].high());
            }
            if first_extreme(span, Candle::low, |a, b| a < b) == half {
                last_support = Some(candles[i].low());
            }
        }
        support.push(last_support);
        resistance.push(last_resistance);
    }
    (support, resistance)
}

fn first_extreme(span: &[Candle], value: fn(&Candle) -> f64, better: fn(f64, f64) -> bool) -> usize {
    let mut best = 0;
    for (index, candle) in span.iter().enumerate().skip(1) {
        if better(value(candle), value(&span[best])) {
            best = index;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candles(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, close)| Candle::try_from((i as i64 * 60_000, *close, close + 1.0, close - 1.0, *close, 1.0)).unwrap())
            .collect()
    }

    fn params(window: usize, shift: usize) -> IndicatorParams {
        IndicatorParams {
            tenkan: 2,
            kijun: 3,
            senkou_b: 4,
            ichimoku_shift: shift,
            support_resistance: window,
            ..Default::default()
        }
    }

    #[test]
    fn chikou_reads_the_future() {
        let series = candles(&[10.0, 11.0, 12.0, 13.0]);
        let look_ahead = LookAhead::compute(&series, &params(4, 2));
        assert_eq!(look_ahead.chikou, vec![Some(12.0), Some(13.0), None, None]);
    }

    #[test]
    fn spans_are_shifted() {
        let series = candles(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0]);
        let look_ahead = LookAhead::compute(&series, &params(4, 2));
        // span A first exists at index 2 (kijun of 3) and lands on index 4
        assert_eq!(look_ahead.senkou_a[3], None);
        // tenkan (10 + 13) / 2 = 11.5, kijun (9 + 13) / 2 = 11
        assert_eq!(look_ahead.senkou_a[4], Some(11.25));
        // span B first exists at index 3 and lands on index 5
        assert_eq!(look_ahead.senkou_b[4], None);
        assert_eq!(look_ahead.senkou_b[5], Some(11.5));
    }

    #[test]
    fn support_and_resistance() {
        // window 4 covers [i - 2, i + 1]
        let series = candles(&[10.0, 12.0, 15.0, 11.0, 8.0, 9.0, 13.0]);
        let look_ahead = LookAhead::compute(&series, &params(4, 2));
        assert_eq!(
            look_ahead.resistance,
            vec![None, None, Some(16.0), Some(16.0), Some(16.0), Some(16.0), Some(16.0)]
        );
        assert_eq!(look_ahead.support, vec![None, None, None, None, Some(7.0), Some(7.0), Some(7.0)]);
    }

    #[test]
    fn ties_keep_the_first_extreme() {
        let series = candles(&[10.0, 10.0, 10.0, 10.0, 10.0]);
        let look_ahead = LookAhead::compute(&series, &params(3, 1));
        assert!(look_ahead.resistance.iter().all(Option::is_none));
        assert!(look_ahead.support.iter().all(Option::is_none));
    }
}
