use std::collections::VecDeque;

/// Fixed-size window over the most recent values.
///
/// Every statistic is `None` until exactly `period` values were pushed, and is
/// recomputed from the window contents (oldest first) on each call, so an incremental
/// run and a batch run over the same prefix produce identical bits.
///
/// A `NaN` pushed into the window marks an unavailable input; it poisons means and
/// deviations until it rolls out.
#[derive(Debug, Clone)]
pub(crate) struct Window {
    period: usize,
    values: VecDeque<f64>,
}

impl Window {
    pub(crate) fn new(period: usize) -> Self {
        Self {
            period,
            values: VecDeque::with_capacity(period + 1),
        }
    }

    pub(crate) fn push(&mut self, value: f64) {
        self.values.push_back(value);
        if self.values.len() > self.period {
            self.values.pop_front();
        }
    }

    pub(crate) fn is_full(&self) -> bool {
        self.period > 0 && self.values.len() == self.period
    }

    fn full(&self) -> Option<&VecDeque<f64>> {
        self.is_full().then_some(&self.values)
    }

    pub(crate) fn sum(&self) -> Option<f64> {
        self.full().map(|values| values.iter().sum())
    }

    pub(crate) fn mean(&self) -> Option<f64> {
        self.sum().map(|sum| sum / self.period as f64)
    }

    pub(crate) fn max(&self) -> Option<f64> {
        self.full().map(|values| values.iter().copied().fold(f64::NEG_INFINITY, f64::max))
    }

    pub(crate) fn min(&self) -> Option<f64> {
        self.full().map(|values| values.iter().copied().fold(f64::INFINITY, f64::min))
    }

    /// Sample standard deviation (n - 1 denominator).
    pub(crate) fn std(&self) -> Option<f64> {
        let mean = self.mean()?;
        let values = self.full()?;
        let squares = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
        Some((squares / (self.period as f64 - 1.0)).sqrt())
    }

    /// Mean absolute deviation around the window mean.
    pub(crate) fn mean_abs_dev(&self) -> Option<f64> {
        let mean = self.mean()?;
        let values = self.full()?;
        Some(values.iter().map(|v| (v - mean).abs()).sum::<f64>() / self.period as f64)
    }

    /// The value `period - 1` steps before the latest one.
    pub(crate) fn oldest(&self) -> Option<f64> {
        self.full().and_then(|values| values.front().copied())
    }
}

/// Maps `NaN` and infinities to the "not available" sentinel.
pub(crate) fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}
