use crate::models::Candle;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};

/// Verifies the ordering invariant every sequence handed to the core must
/// satisfy: strictly increasing timestamps, no duplicates.
pub fn ensure_chronological(candles: &[Candle], context: &str) -> Result<()> {
    for pair in candles.windows(2) {
        if pair[1].timestamp <= pair[0].timestamp {
            return Err(anyhow!(
                "{}: candle at {} is not strictly after {}",
                context,
                pair[1].timestamp,
                pair[0].timestamp
            ));
        }
    }
    Ok(())
}

/// Index of the first candle with `timestamp >= t`, if any. Candles must be
/// chronological.
pub fn first_at_or_after(candles: &[Candle], t: DateTime<Utc>) -> Option<usize> {
    let idx = candles.partition_point(|c| c.timestamp < t);
    if idx < candles.len() {
        Some(idx)
    } else {
        None
    }
}

/// End of the trading session containing `t`. The snapshot data carries no
/// exchange calendar, so the UTC day boundary stands in for the session
/// close.
pub fn session_end(t: DateTime<Utc>) -> DateTime<Utc> {
    let start_of_day = t
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always valid")
        .and_utc();
    start_of_day + Duration::days(1)
}
