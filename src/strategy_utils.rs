use crate::models::{Direction, Signal};
use crate::strategy::StrategyContext;

/// Builds a buy signal priced and timed off the context's current candle.
pub fn buy_signal(ctx: &StrategyContext, strength: f64) -> Signal {
    Signal::new(Direction::Buy, ctx.candle.close, ctx.candle.timestamp).with_strength(strength)
}

/// Builds a sell signal priced and timed off the context's current candle.
pub fn sell_signal(ctx: &StrategyContext, strength: f64) -> Signal {
    Signal::new(Direction::Sell, ctx.candle.close, ctx.candle.timestamp).with_strength(strength)
}

pub fn meets_strength_threshold(strength: f64, minimum: f64) -> bool {
    strength.is_finite() && strength >= minimum
}
