use crate::models::Signal;
use crate::param_utils::{get_param_f64, get_param_usize_min};
use crate::strategy::{StrategyContext, StrategyPort};
use crate::strategy_utils::{buy_signal, meets_strength_threshold, sell_signal};
use std::collections::HashMap;

/// Mean-reversion off RSI extremes: buy oversold, sell overbought.
pub struct RsiReversalStrategy {
    template_id: String,
    rsi_name: String,
    oversold_level: f64,
    overbought_level: f64,
    min_strength: f64,
    window_minutes: Option<i64>,
}

impl RsiReversalStrategy {
    pub fn new(parameters: HashMap<String, f64>) -> Self {
        let period = get_param_usize_min(&parameters, "period", 14, 2);
        let oversold_level = get_param_f64(&parameters, "oversoldLevel", 30.0);
        let overbought_level = get_param_f64(&parameters, "overboughtLevel", 70.0);
        let min_strength = get_param_f64(&parameters, "minStrength", 0.6);
        let window_minutes = match get_param_usize_min(&parameters, "executionWindowMinutes", 0, 0)
        {
            0 => None,
            minutes => Some(minutes as i64),
        };
        Self {
            template_id: "rsi_reversal".to_string(),
            rsi_name: format!("rsi_{}", period),
            oversold_level,
            overbought_level,
            min_strength,
            window_minutes,
        }
    }
}

impl StrategyPort for RsiReversalStrategy {
    fn template_id(&self) -> &str {
        &self.template_id
    }

    fn required_indicators(&self) -> Vec<String> {
        vec![self.rsi_name.clone()]
    }

    fn generate_signal(&mut self, ctx: &StrategyContext) -> Option<Signal> {
        let rsi = ctx.indicator(&self.rsi_name)?;

        if rsi < self.oversold_level {
            let strength =
                ((self.oversold_level - rsi) / self.oversold_level + 0.5).min(1.0);
            if meets_strength_threshold(strength, self.min_strength) {
                return Some(buy_signal(ctx, strength));
            }
        }

        if rsi > self.overbought_level {
            let strength = ((rsi - self.overbought_level) / (100.0 - self.overbought_level)
                + 0.5)
                .min(1.0);
            if meets_strength_threshold(strength, self.min_strength) {
                return Some(sell_signal(ctx, strength));
            }
        }

        None
    }

    fn execution_window_minutes(&self) -> Option<i64> {
        self.window_minutes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candle, Direction, Timeframe};
    use chrono::{TimeZone, Utc};

    fn context_with_rsi<'a>(candle: &'a Candle, history: &'a [Candle], rsi: f64) -> StrategyContext<'a> {
        let mut indicators = HashMap::new();
        indicators.insert("rsi_14".to_string(), rsi);
        StrategyContext {
            symbol: "USDJPY",
            timeframe: Timeframe::H1,
            candle,
            history,
            indicators,
            position: None,
        }
    }

    #[test]
    fn signals_at_extremes_and_holds_in_between() {
        let candle = Candle {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap(),
            open: 150.0,
            high: 150.2,
            low: 149.8,
            close: 150.0,
            volume: 80.0,
        };
        let history = [candle.clone()];
        let mut strategy = RsiReversalStrategy::new(HashMap::new());

        let buy = strategy
            .generate_signal(&context_with_rsi(&candle, &history, 12.0))
            .expect("deep oversold should signal");
        assert_eq!(buy.direction, Direction::Buy);
        assert!(buy.strength >= 0.5);

        let sell = strategy
            .generate_signal(&context_with_rsi(&candle, &history, 92.0))
            .expect("deep overbought should signal");
        assert_eq!(sell.direction, Direction::Sell);

        assert!(strategy
            .generate_signal(&context_with_rsi(&candle, &history, 55.0))
            .is_none());

        // Barely past the level fails the strength threshold.
        assert!(strategy
            .generate_signal(&context_with_rsi(&candle, &history, 29.9))
            .is_none());
    }
}
