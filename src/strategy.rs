use crate::models::{Candle, Signal, Timeframe, Trade};
use anyhow::Result;
use std::collections::HashMap;

/// Everything a strategy may look at for one candle. Rebuilt fresh each
/// candle; strategies must not retain it beyond the call.
pub struct StrategyContext<'a> {
    pub symbol: &'a str,
    pub timeframe: Timeframe,
    /// The candle being processed.
    pub candle: &'a Candle,
    /// All candles up to and including the current one.
    pub history: &'a [Candle],
    /// Indicator snapshot for the current timestamp (forward-filled).
    pub indicators: HashMap<String, f64>,
    /// The single active trade, if one exists right now.
    pub position: Option<&'a Trade>,
}

impl<'a> StrategyContext<'a> {
    pub fn indicator(&self, name: &str) -> Option<f64> {
        self.indicators.get(name).copied()
    }
}

/// The pluggable strategy seam. Decoration is explicit wrapping of this
/// trait; the engine never probes for wrapped inner objects.
pub trait StrategyPort: Send {
    fn template_id(&self) -> &str;

    /// Indicator names this strategy needs; validated before the run starts.
    fn required_indicators(&self) -> Vec<String>;

    /// Side-effect hook invoked for every candle, position or not.
    fn on_candle_processed(&mut self, _ctx: &StrategyContext) {}

    /// Called only when no trade is active (and, in tick mode, only at
    /// timeframe boundaries).
    fn generate_signal(&mut self, ctx: &StrategyContext) -> Option<Signal>;

    /// Notification only; the trade is already fully formed.
    fn on_trade_opened(&mut self, _trade: &Trade, _ctx: &StrategyContext) {}

    /// Notification only; the trade is already resolved and immutable.
    fn on_trade_closed(&mut self, _trade: &Trade, _ctx: &StrategyContext) {}

    /// Execution window length in minutes; `None` means the remainder of
    /// the trading session.
    fn execution_window_minutes(&self) -> Option<i64> {
        None
    }
}

#[path = "strategies/ma_crossover.rs"]
pub mod ma_crossover;

pub use ma_crossover::MaCrossoverStrategy;

#[path = "strategies/rsi_reversal.rs"]
pub mod rsi_reversal;

pub use rsi_reversal::RsiReversalStrategy;

pub fn create_strategy(
    template_id: &str,
    parameters: HashMap<String, f64>,
) -> Result<Box<dyn StrategyPort>> {
    match template_id {
        "ma_crossover" => Ok(Box::new(MaCrossoverStrategy::new(parameters))),
        "rsi_reversal" => Ok(Box::new(RsiReversalStrategy::new(parameters))),
        _ => Err(anyhow::anyhow!(
            "Unknown strategy template: {}",
            template_id
        )),
    }
}
