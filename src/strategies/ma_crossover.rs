use crate::param_utils::{get_param_f64, get_param_usize_min};
use crate::strategy::{StrategyContext, StrategyPort};
use crate::strategy_utils::{buy_signal, meets_strength_threshold, sell_signal};
use crate::models::Signal;
use std::collections::HashMap;

/// Classic two-average crossover: long on a golden cross, short on a death
/// cross. Cross detection compares the current snapshot against the one
/// recorded on the previous candle, so it never reads ahead.
pub struct MaCrossoverStrategy {
    template_id: String,
    fast_name: String,
    slow_name: String,
    min_strength: f64,
    window_minutes: Option<i64>,
    previous: Option<(f64, f64)>,
    current: Option<(f64, f64)>,
}

impl MaCrossoverStrategy {
    pub fn new(parameters: HashMap<String, f64>) -> Self {
        let fast_period = get_param_usize_min(&parameters, "fastPeriod", 10, 1);
        let slow_period = get_param_usize_min(&parameters, "slowPeriod", 30, 2);
        let min_strength = get_param_f64(&parameters, "minStrength", 0.0);
        let window_minutes = match get_param_usize_min(&parameters, "executionWindowMinutes", 0, 0)
        {
            0 => None,
            minutes => Some(minutes as i64),
        };
        Self {
            template_id: "ma_crossover".to_string(),
            fast_name: format!("sma_{}", fast_period),
            slow_name: format!("sma_{}", slow_period),
            min_strength,
            window_minutes,
            previous: None,
            current: None,
        }
    }
}

impl StrategyPort for MaCrossoverStrategy {
    fn template_id(&self) -> &str {
        &self.template_id
    }

    fn required_indicators(&self) -> Vec<String> {
        vec![self.fast_name.clone(), self.slow_name.clone()]
    }

    fn on_candle_processed(&mut self, ctx: &StrategyContext) {
        if let (Some(fast), Some(slow)) =
            (ctx.indicator(&self.fast_name), ctx.indicator(&self.slow_name))
        {
            self.previous = self.current;
            self.current = Some((fast, slow));
        }
    }

    fn generate_signal(&mut self, ctx: &StrategyContext) -> Option<Signal> {
        let (prev_fast, prev_slow) = self.previous?;
        let (fast, slow) = self.current?;

        let crossed_up = prev_fast <= prev_slow && fast > slow;
        let crossed_down = prev_fast >= prev_slow && fast < slow;
        if !crossed_up && !crossed_down {
            return None;
        }

        // Separation relative to price as a rough conviction measure.
        let strength = ((fast - slow).abs() / ctx.candle.close.abs().max(f64::EPSILON)
            * 10_000.0)
            .min(1.0);
        if !meets_strength_threshold(strength, self.min_strength) {
            return None;
        }

        if crossed_up {
            Some(buy_signal(ctx, strength))
        } else {
            Some(sell_signal(ctx, strength))
        }
    }

    fn execution_window_minutes(&self) -> Option<i64> {
        self.window_minutes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candle, Direction, Timeframe};
    use chrono::{Duration, TimeZone, Utc};

    fn context_with<'a>(
        candle: &'a Candle,
        history: &'a [Candle],
        fast: f64,
        slow: f64,
    ) -> StrategyContext<'a> {
        let mut indicators = HashMap::new();
        indicators.insert("sma_10".to_string(), fast);
        indicators.insert("sma_30".to_string(), slow);
        StrategyContext {
            symbol: "EURUSD",
            timeframe: Timeframe::M15,
            candle,
            history,
            indicators,
            position: None,
        }
    }

    #[test]
    fn emits_buy_on_golden_cross_only() {
        let base = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        let history: Vec<Candle> = (0..2)
            .map(|i| Candle {
                timestamp: base + Duration::minutes(15 * i),
                open: 1.1,
                high: 1.101,
                low: 1.099,
                close: 1.1,
                volume: 50.0,
            })
            .collect();

        let mut strategy = MaCrossoverStrategy::new(HashMap::new());

        // Fast below slow: records state, no cross yet.
        let ctx = context_with(&history[0], &history[..1], 1.0995, 1.1000);
        strategy.on_candle_processed(&ctx);
        assert!(strategy.generate_signal(&ctx).is_none());

        // Fast moves above slow: golden cross.
        let ctx = context_with(&history[1], &history, 1.1006, 1.1000);
        strategy.on_candle_processed(&ctx);
        let signal = strategy.generate_signal(&ctx).expect("expected a signal");
        assert_eq!(signal.direction, Direction::Buy);
        assert_eq!(signal.timestamp, history[1].timestamp);

        // Staying above slow afterwards is not a new cross.
        let ctx = context_with(&history[1], &history, 1.1010, 1.1000);
        strategy.on_candle_processed(&ctx);
        assert!(strategy.generate_signal(&ctx).is_none());
    }
}
