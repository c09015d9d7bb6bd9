use thiserror::Error;

/// Fatal failures that abort a backtest before or during setup. Expected
/// absences (no signal this candle, no window data for a signal) are not
/// errors; they surface as `Option`/empty values and a log line.
#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("no candle data for {symbol} {timeframe} in the requested range")]
    NoData { symbol: String, timeframe: String },

    #[error("strategy requires indicator '{name}' which the provider cannot supply")]
    MissingIndicator { name: String },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error(transparent)]
    DataSource(#[from] anyhow::Error),
}
