/// Exponential moving average with `α = 2 / (span + 1)`.
///
/// Seeded by the first observation, with no warm-up average:
///   bar 0  → value = price
///   bar 1+ → value = α·price + (1 − α)·prev
#[derive(Debug, Clone)]
pub(crate) struct Ema {
    alpha: f64,
    value: Option<f64>,
}

impl Ema {
    pub(crate) fn new(span: usize) -> Self {
        Self {
            alpha: 2.0 / (span as f64 + 1.0),
            value: None,
        }
    }

    /// Feeds one value and returns the current average.
    pub(crate) fn next(&mut self, input: f64) -> f64 {
        let value = match self.value {
            Some(previous) => self.alpha * input + (1.0 - self.alpha) * previous,
            None => input,
        };
        self.value = Some(value);
        value
    }
}
