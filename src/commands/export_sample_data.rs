use crate::market_data::SnapshotDataSource;
use crate::models::{Candle, Timeframe};
use anyhow::Result;
use chrono::{DateTime, Duration, TimeZone, Utc};
use log::info;
use std::path::Path;

/// Writes a deterministic synthetic snapshot (M15 strategy candles plus M1
/// fine candles) so the engine can be exercised without a data vendor.
pub async fn run(output: &Path, symbol: &str, days: u32) -> Result<()> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let minutes = days as i64 * 24 * 60;

    let fine_candles = synthetic_candles(start, minutes, 1);
    let candles = synthetic_candles(start, minutes, 15);

    let source = SnapshotDataSource::new(symbol, Timeframe::M15, candles, fine_candles)?;
    source.save_to_file(output)?;

    info!(
        "Wrote {} day synthetic snapshot for {} to {}",
        days,
        symbol,
        output.display()
    );
    Ok(())
}

fn synthetic_candles(start: DateTime<Utc>, total_minutes: i64, step: i64) -> Vec<Candle> {
    let mut candles = Vec::with_capacity((total_minutes / step) as usize);
    let mut previous_close = price_at(0);

    for minute in (0..total_minutes).step_by(step as usize) {
        let open = previous_close;
        let close = price_at(minute + step);
        let drift = (close - open).abs();
        let high = open.max(close) + drift * 0.3 + 0.0001;
        let low = open.min(close) - drift * 0.3 - 0.0001;
        candles.push(Candle {
            timestamp: start + Duration::minutes(minute),
            open,
            high,
            low,
            close,
            volume: 100.0 + (minute % 97) as f64,
        });
        previous_close = close;
    }

    candles
}

/// Two overlaid sine waves around a slowly trending base; enough texture to
/// trigger crossovers and RSI extremes.
fn price_at(minute: i64) -> f64 {
    let t = minute as f64;
    1.1000 + 0.0040 * (t / 720.0).sin() + 0.0012 * (t / 90.0).sin() + t * 2e-8
}
