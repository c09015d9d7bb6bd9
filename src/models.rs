use anyhow::anyhow;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Buy => "buy",
            Direction::Sell => "sell",
        }
    }

    /// +1.0 for long exposure, -1.0 for short; favorable price moves carry this sign.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Buy => 1.0,
            Direction::Sell => -1.0,
        }
    }
}

impl FromStr for Direction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" | "long" => Ok(Direction::Buy),
            "sell" | "short" => Ok(Direction::Sell),
            other => Err(anyhow!("Unknown direction '{}'", other)),
        }
    }
}

/// A trade intent emitted by a strategy. Created only by the strategy,
/// consumed once by the execution simulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub direction: Direction,
    /// Price the strategy saw when deciding; may be stale at execution time
    /// and is never used as the fill price.
    pub reference_price: f64,
    pub timestamp: DateTime<Utc>,
    pub strength: f64,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Signal {
    pub fn new(direction: Direction, reference_price: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            direction,
            reference_price,
            timestamp,
            strength: 0.0,
            metadata: Map::new(),
        }
    }

    pub fn with_strength(mut self, strength: f64) -> Self {
        self.strength = strength;
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TradeResult {
    Win,
    Loss,
    Breakeven,
    EodClose,
}

impl TradeResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeResult::Win => "win",
            TradeResult::Loss => "loss",
            TradeResult::Breakeven => "breakeven",
            TradeResult::EodClose => "eod_close",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    TrailingStop,
    EndOfWindow,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::EndOfWindow => "end_of_window",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: String,
    pub symbol: String,
    pub direction: Direction,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub stop_loss: f64,
    /// Infinite sentinel when trailing mode replaces the fixed target.
    pub take_profit: f64,
    pub trailing_stop_level: Option<f64>,
    pub exit_time: Option<DateTime<Utc>>,
    pub exit_price: Option<f64>,
    pub pips: Option<f64>,
    pub result: Option<TradeResult>,
    pub exit_reason: Option<ExitReason>,
}

impl Trade {
    /// A trade is active at `t` iff `entry_time <= t < exit_time`; the exit
    /// timestamp itself is not active, so a new trade may open there.
    pub fn is_active_at(&self, t: DateTime<Utc>) -> bool {
        if t < self.entry_time {
            return false;
        }
        match self.exit_time {
            Some(exit) => t < exit,
            None => true,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.exit_time.is_some()
    }

    /// The level currently protecting the trade: the trailing level once it
    /// exists, the original stop before that.
    pub fn protective_level(&self) -> f64 {
        self.trailing_stop_level.unwrap_or(self.stop_loss)
    }

    pub fn resolve(
        &mut self,
        exit_time: DateTime<Utc>,
        exit_price: f64,
        pips: f64,
        result: TradeResult,
        exit_reason: ExitReason,
    ) {
        debug_assert!(exit_time > self.entry_time, "exit must follow entry");
        self.exit_time = Some(exit_time);
        self.exit_price = Some(exit_price);
        self.pips = Some(pips);
        self.result = Some(result);
        self.exit_reason = Some(exit_reason);
    }
}

pub fn generate_trade_id(symbol: &str, entry_time: DateTime<Utc>) -> String {
    format!("{}_{}", symbol, entry_time.format("%Y-%m-%dT%H:%M:%S"))
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
}

impl Timeframe {
    pub fn minutes(&self) -> i64 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
            Timeframe::D1 => 1440,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(self.minutes())
    }

    /// True when `t` sits on a bar boundary of this timeframe. Indicator
    /// series derived from coarser bars only change at these instants.
    pub fn is_boundary(&self, t: DateTime<Utc>) -> bool {
        t.timestamp() % (self.minutes() * 60) == 0
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
        }
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "M1" => Ok(Timeframe::M1),
            "M5" => Ok(Timeframe::M5),
            "M15" => Ok(Timeframe::M15),
            "M30" => Ok(Timeframe::M30),
            "H1" => Ok(Timeframe::H1),
            "H4" => Ok(Timeframe::H4),
            "D1" => Ok(Timeframe::D1),
            other => Err(anyhow!("Unknown timeframe '{}'", other)),
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSummary {
    pub total_trades: i32,
    pub win_rate: f64,
    pub total_pips: f64,
    pub profit_factor: f64,
    pub average_win: f64,
    pub average_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub max_drawdown: f64,
    pub max_consecutive_wins: i32,
    pub max_consecutive_losses: i32,
    pub sharpe_ratio: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestResults {
    pub id: String,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub trades: Vec<Trade>,
    pub performance: PerformanceSummary,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn trade_is_not_active_at_its_own_exit_time() {
        let entry = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        let exit = Utc.with_ymd_and_hms(2024, 3, 4, 9, 30, 0).unwrap();
        let mut trade = Trade {
            id: generate_trade_id("EURUSD", entry),
            symbol: "EURUSD".to_string(),
            direction: Direction::Buy,
            entry_time: entry,
            entry_price: 1.1,
            stop_loss: 1.099,
            take_profit: 1.1015,
            trailing_stop_level: None,
            exit_time: None,
            exit_price: None,
            pips: None,
            result: None,
            exit_reason: None,
        };
        assert!(trade.is_active_at(entry));

        trade.resolve(exit, 1.1015, 15.0, TradeResult::Win, ExitReason::TakeProfit);
        assert!(trade.is_active_at(exit - Duration::seconds(1)));
        assert!(!trade.is_active_at(exit));
        assert!(!trade.is_active_at(entry - Duration::seconds(1)));
    }

    #[test]
    fn timeframe_boundary_detection() {
        let tf = Timeframe::M5;
        let on = Utc.with_ymd_and_hms(2024, 3, 4, 9, 5, 0).unwrap();
        let off = Utc.with_ymd_and_hms(2024, 3, 4, 9, 5, 30).unwrap();
        assert!(tf.is_boundary(on));
        assert!(!tf.is_boundary(off));
        assert_eq!("H4".parse::<Timeframe>().unwrap(), Timeframe::H4);
        assert!("X7".parse::<Timeframe>().is_err());
    }
}
