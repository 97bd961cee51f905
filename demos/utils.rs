use chrono::{DateTime, Duration, Utc};
use kline_bt::engine::{Candle, CandleBuilder};

/// Generates deterministic hourly candles: an upward drift with a sine swing.
pub fn generate_sample_candles(max: i32, seed: i32, base_price: f64) -> Vec<Candle> {
    let mut time = DateTime::<Utc>::default();
    let mut open = base_price;

    (0..=max)
        .map(|i| {
            let trend = base_price + 0.05 * i as f64;
            let swing = 8.0 * (i as f64 * 0.07 + seed as f64).sin() + 2.0 * (i as f64 * 0.31).cos();
            let close = trend + swing;
            let high = open.max(close) + 0.4;
            let low = open.min(close) - 0.4;
            let volume = 1000.0 + 500.0 * (i as f64 * 0.2).sin().abs();

            let candle = CandleBuilder::builder()
                .time(time)
                .open(open)
                .high(high)
                .low(low)
                .close(close)
                .volume(volume)
                .build()
                .unwrap();

            time += Duration::hours(1);
            open = close;
            candle
        })
        .collect()
}
