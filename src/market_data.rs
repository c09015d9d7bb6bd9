use crate::candle_utils::{ensure_chronological, session_end};
use crate::models::{Candle, Timeframe};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Supplies candle history and, on demand, small finer-grained execution
/// windows around a signal. Implementations are the run's only suspension
/// points; everything downstream of them is synchronous.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn get_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>>;

    /// Finer-grained candles covering `[signal_time - pre_minutes,
    /// signal_time + window_minutes)`. `None` window minutes means the
    /// remainder of the signal's trading session.
    async fn get_execution_window(
        &self,
        symbol: &str,
        signal_time: DateTime<Utc>,
        window_minutes: Option<i64>,
        pre_minutes: i64,
    ) -> Result<Vec<Candle>>;
}

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct MarketDataSnapshot {
    version: u32,
    generated_at: DateTime<Utc>,
    symbol: String,
    timeframe: Timeframe,
    candles: Vec<Candle>,
    #[serde(default)]
    fine_candles: Vec<Candle>,
}

/// In-memory data source backed by a snapshot: one strategy-timeframe
/// candle sequence plus an optional finer sequence that execution windows
/// are sliced from.
pub struct SnapshotDataSource {
    symbol: String,
    timeframe: Timeframe,
    candles: Vec<Candle>,
    fine_candles: Vec<Candle>,
}

impl SnapshotDataSource {
    pub fn new(
        symbol: impl Into<String>,
        timeframe: Timeframe,
        candles: Vec<Candle>,
        fine_candles: Vec<Candle>,
    ) -> Result<Self> {
        ensure_chronological(&candles, "snapshot candles")?;
        ensure_chronological(&fine_candles, "snapshot fine candles")?;
        Ok(Self {
            symbol: symbol.into(),
            timeframe,
            candles,
            fine_candles,
        })
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open market data snapshot {}", path.display()))?;
        let snapshot: MarketDataSnapshot = bincode::deserialize_from(BufReader::new(file))
            .with_context(|| format!("Failed to decode market data snapshot {}", path.display()))?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(anyhow!(
                "Unsupported snapshot version {} (expected {})",
                snapshot.version,
                SNAPSHOT_VERSION
            ));
        }

        info!(
            "Loaded snapshot for {} {}: {} candles, {} fine candles",
            snapshot.symbol,
            snapshot.timeframe,
            snapshot.candles.len(),
            snapshot.fine_candles.len()
        );

        Self::new(
            snapshot.symbol,
            snapshot.timeframe,
            snapshot.candles,
            snapshot.fine_candles,
        )
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create snapshot file {}", path.display()))?;
        let snapshot = MarketDataSnapshot {
            version: SNAPSHOT_VERSION,
            generated_at: Utc::now(),
            symbol: self.symbol.clone(),
            timeframe: self.timeframe,
            candles: self.candles.clone(),
            fine_candles: self.fine_candles.clone(),
        };
        bincode::serialize_into(BufWriter::new(file), &snapshot)
            .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
        Ok(())
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

#[async_trait]
impl MarketDataSource for SnapshotDataSource {
    async fn get_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>> {
        if !symbol.eq_ignore_ascii_case(&self.symbol) || timeframe != self.timeframe {
            return Ok(Vec::new());
        }
        Ok(self
            .candles
            .iter()
            .filter(|c| c.timestamp >= start && c.timestamp < end)
            .cloned()
            .collect())
    }

    async fn get_execution_window(
        &self,
        symbol: &str,
        signal_time: DateTime<Utc>,
        window_minutes: Option<i64>,
        pre_minutes: i64,
    ) -> Result<Vec<Candle>> {
        if !symbol.eq_ignore_ascii_case(&self.symbol) {
            return Ok(Vec::new());
        }

        let start = signal_time - Duration::minutes(pre_minutes.max(0));
        let end = match window_minutes {
            Some(minutes) => signal_time + Duration::minutes(minutes.max(0)),
            None => session_end(signal_time),
        };

        Ok(self
            .fine_candles
            .iter()
            .filter(|c| c.timestamp >= start && c.timestamp < end)
            .cloned()
            .collect())
    }
}
