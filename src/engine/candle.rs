use chrono::{DateTime, NaiveDate, Utc};

#[cfg(feature = "serde")]
use chrono::serde::ts_milliseconds;

use crate::errors::{Error, Result};

/// One OHLCV bar, identified by its open time.
///
/// Candles are immutable once built. Use [`CandleBuilder`] to construct one: it rejects
/// non-finite or non-positive prices, negative volume and inconsistent high/low.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    #[cfg_attr(feature = "serde", serde(with = "ts_milliseconds"))]
    time: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl Candle {
    /// Returns the open time.
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// Returns the open time as epoch milliseconds.
    pub fn timestamp(&self) -> i64 {
        self.time.timestamp_millis()
    }

    /// Returns the UTC calendar date of the open time.
    pub fn date(&self) -> NaiveDate {
        self.time.date_naive()
    }

    /// Returns the open price.
    pub fn open(&self) -> f64 {
        self.open
    }

    /// Returns the high price.
    pub fn high(&self) -> f64 {
        self.high
    }

    /// Returns the low price.
    pub fn low(&self) -> f64 {
        self.low
    }

    /// Returns the close price.
    pub fn close(&self) -> f64 {
        self.close
    }

    /// Returns the traded volume.
    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Returns true when `price` lies between the open and the close (inclusive).
    ///
    /// Exit thresholds are checked against the candle body, not its wicks.
    pub fn brackets(&self, price: f64) -> bool {
        let lower = self.open.min(self.close);
        let upper = self.open.max(self.close);
        lower <= price && price <= upper
    }
}

impl TryFrom<(i64, f64, f64, f64, f64, f64)> for Candle {
    type Error = Error;

    fn try_from((time, open, high, low, close, volume): (i64, f64, f64, f64, f64, f64)) -> Result<Self> {
        CandleBuilder::builder()
            .timestamp(time)
            .open(open)
            .high(high)
            .low(low)
            .close(close)
            .volume(volume)
            .build()
    }
}

/// Builder for [`Candle`].
#[derive(Debug, Default)]
pub struct CandleBuilder {
    time: Option<DateTime<Utc>>,
    timestamp: Option<i64>,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<f64>,
}

impl CandleBuilder {
    /// Starts a new builder.
    pub fn builder() -> Self {
        Self::default()
    }

    /// Sets the open time.
    pub fn time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    /// Sets the open time from epoch milliseconds.
    pub fn timestamp(mut self, millis: i64) -> Self {
        self.timestamp = Some(millis);
        self
    }

    /// Sets the open price.
    pub fn open(mut self, open: f64) -> Self {
        self.open = Some(open);
        self
    }

    /// Sets the high price.
    pub fn high(mut self, high: f64) -> Self {
        self.high = Some(high);
        self
    }

    /// Sets the low price.
    pub fn low(mut self, low: f64) -> Self {
        self.low = Some(low);
        self
    }

    /// Sets the close price.
    pub fn close(mut self, close: f64) -> Self {
        self.close = Some(close);
        self
    }

    /// Sets the volume.
    pub fn volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }

    /// Validates the fields and builds the candle.
    pub fn build(self) -> Result<Candle> {
        let time = match (self.time, self.timestamp) {
            (Some(time), _) => time,
            (None, Some(millis)) => DateTime::from_timestamp_millis(millis).ok_or(Error::InvalidTimestamp(millis))?,
            (None, None) => return Err(Error::InvalidCandle("missing time".into())),
        };
        let open = required("open", self.open)?;
        let high = required("high", self.high)?;
        let low = required("low", self.low)?;
        let close = required("close", self.close)?;
        let volume = self.volume.unwrap_or(0.0);

        for (name, price) in [("open", open), ("high", high), ("low", low), ("close", close)] {
            if !price.is_finite() || price <= 0.0 {
                return Err(Error::InvalidCandle(format!("{name} must be positive (got: {price})")));
            }
        }
        if !volume.is_finite() || volume < 0.0 {
            return Err(Error::InvalidCandle(format!("volume must not be negative (got: {volume})")));
        }
        if high < open.max(close).max(low) || low > open.min(close) {
            return Err(Error::InvalidCandle(format!(
                "high/low ({high}/{low}) do not contain open/close ({open}/{close})"
            )));
        }

        Ok(Candle {
            time,
            open,
            high,
            low,
            close,
            volume,
        })
    }
}

fn required(name: &str, value: Option<f64>) -> Result<f64> {
    value.ok_or_else(|| Error::InvalidCandle(format!("missing {name}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_valid_candle() {
        let candle = Candle::try_from((1_700_000_000_000, 100.0, 110.0, 95.0, 105.0, 3.0)).unwrap();
        assert_eq!(candle.timestamp(), 1_700_000_000_000);
        assert_eq!(candle.open(), 100.0);
        assert_eq!(candle.high(), 110.0);
        assert_eq!(candle.low(), 95.0);
        assert_eq!(candle.close(), 105.0);
        assert_eq!(candle.volume(), 3.0);
        assert_eq!(candle.date(), NaiveDate::from_ymd_opt(2023, 11, 14).unwrap());
    }

    #[test]
    fn reject_inconsistent_range() {
        let result = Candle::try_from((0, 100.0, 99.0, 95.0, 105.0, 1.0));
        assert!(matches!(result, Err(Error::InvalidCandle(_))));

        let result = Candle::try_from((0, 100.0, 110.0, 101.0, 105.0, 1.0));
        assert!(matches!(result, Err(Error::InvalidCandle(_))));
    }

    #[test]
    fn reject_bad_values() {
        assert!(Candle::try_from((0, -1.0, 110.0, 95.0, 105.0, 1.0)).is_err());
        assert!(Candle::try_from((0, 100.0, f64::NAN, 95.0, 105.0, 1.0)).is_err());
        assert!(Candle::try_from((0, 100.0, 110.0, 95.0, 105.0, -2.0)).is_err());
    }

    #[test]
    fn missing_fields() {
        let result = CandleBuilder::builder().timestamp(0).open(1.0).high(1.0).low(1.0).build();
        assert!(matches!(result, Err(Error::InvalidCandle(_))));

        let result = CandleBuilder::builder().open(1.0).high(1.0).low(1.0).close(1.0).build();
        assert!(matches!(result, Err(Error::InvalidCandle(_))));
    }

    #[test]
    fn body_brackets() {
        let candle = Candle::try_from((0, 94.0, 117.0, 93.0, 116.0, 1.0)).unwrap();
        assert!(candle.brackets(95.0));
        assert!(candle.brackets(115.0));
        assert!(candle.brackets(94.0));
        assert!(!candle.brackets(93.5));
        assert!(!candle.brackets(116.5));

        // bearish body
        let candle = Candle::try_from((0, 116.0, 117.0, 93.0, 94.0, 1.0)).unwrap();
        assert!(candle.brackets(95.0));
        assert!(!candle.brackets(117.0));
    }
}
