use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;

use crate::engine::{Candle, CandleBuilder};
use crate::errors::{Error, Result};

// Binance-style kline export:
// "open_time": 1759813200000,
// "open_price": 124499.99,
// "high_price": 124640.76,
// "low_price": 124240.37,
// "close_price": 124414.17,
// "volume": 424.20697,
// "close_time": 1759816799999,
// ...

/// One raw kline as exported by an exchange. Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Kline {
    /// Open time, epoch milliseconds.
    #[serde(alias = "open_time", alias = "t")]
    pub time: i64,
    /// Open price.
    #[serde(alias = "open_price", alias = "o")]
    pub open: f64,
    /// High price.
    #[serde(alias = "high_price", alias = "h")]
    pub high: f64,
    /// Low price.
    #[serde(alias = "low_price", alias = "l")]
    pub low: f64,
    /// Close price.
    #[serde(alias = "close_price", alias = "c")]
    pub close: f64,
    /// Traded volume, 0 when absent.
    #[serde(default, alias = "v")]
    pub volume: f64,
}

impl TryFrom<Kline> for Candle {
    type Error = Error;

    fn try_from(kline: Kline) -> Result<Self> {
        CandleBuilder::builder()
            .timestamp(kline.time)
            .open(kline.open)
            .high(kline.high)
            .low(kline.low)
            .close(kline.close)
            .volume(kline.volume)
            .build()
    }
}

/// Parses a JSON array of klines and validates each into a [`Candle`].
///
/// Ordering is not checked here; [`CandleSeries`](crate::engine::CandleSeries) rejects
/// out-of-order candles when they are replayed.
pub fn parse_klines(json: &str) -> Result<Vec<Candle>> {
    let klines: Vec<Kline> = serde_json::from_str(json)?;
    klines.into_iter().map(Candle::try_from).collect()
}

/// Reads the JSON array of klines at `filepath`.
pub fn get_data_from_file(filepath: impl AsRef<Path>) -> Result<Vec<Candle>> {
    let file = File::open(filepath)?;
    let klines: Vec<Kline> = serde_json::from_reader(BufReader::new(file))?;
    klines.into_iter().map(Candle::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_field_names() {
        let json = r#"[
            {"open_time": 1759813200000, "open_price": 124499.99, "high_price": 124640.76,
             "low_price": 124240.37, "close_price": 124414.17, "volume": 424.20697,
             "close_time": 1759816799999, "number_of_trades": 102055},
            {"t": 1759816800000, "o": 124414.17, "h": 124500.0, "l": 124300.0, "c": 124450.0}
        ]"#;
        let candles = parse_klines(json).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].timestamp(), 1_759_813_200_000);
        assert_eq!(candles[0].close(), 124414.17);
        assert_eq!(candles[1].volume(), 0.0);
    }

    #[test]
    fn invalid_kline_is_rejected() {
        let json = r#"[{"time": 0, "open": 10.0, "high": 9.0, "low": 8.0, "close": 9.5, "volume": 1.0}]"#;
        assert!(matches!(parse_klines(json), Err(Error::InvalidCandle(_))));
        assert!(matches!(parse_klines("{"), Err(Error::JsonError(_))));
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            get_data_from_file("does/not/exist.json"),
            Err(Error::IoError(_))
        ));
    }
}
