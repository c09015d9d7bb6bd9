use crate::candle_utils::ensure_chronological;
use crate::config::BacktestConfiguration;
use crate::error::BacktestError;
use crate::execution::ExecutionSimulator;
use crate::indicators::{value_at, IndicatorSeries};
use crate::market_data::MarketDataSource;
use crate::models::{Candle, Trade};
use crate::strategy::{StrategyContext, StrategyPort};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::collections::HashMap;

/// Drives chronological iteration over strategy-timeframe candles, owns the
/// single-active-position invariant, and hands fired signals to the
/// execution simulator with a freshly fetched window.
pub struct SignalScheduler<'a> {
    config: &'a BacktestConfiguration,
    data_source: &'a dyn MarketDataSource,
}

impl<'a> SignalScheduler<'a> {
    pub fn new(config: &'a BacktestConfiguration, data_source: &'a dyn MarketDataSource) -> Self {
        Self {
            config,
            data_source,
        }
    }

    pub async fn run(
        &self,
        candles: &[Candle],
        indicator_series: &IndicatorSeries,
        strategy: &mut dyn StrategyPort,
    ) -> Result<Vec<Trade>, BacktestError> {
        ensure_chronological(candles, "strategy candles")?;

        let simulator = ExecutionSimulator::new(self.config);
        let mut resolved: Vec<Trade> = Vec::new();
        let mut active: Option<Trade> = None;

        for (index, candle) in candles.iter().enumerate() {
            let now = candle.timestamp;

            // A trade stops being active at its own exit timestamp, so a
            // signal firing exactly then may open the next position.
            if let Some(trade) = active.take() {
                if trade.exit_time.map_or(false, |exit| exit <= now) {
                    resolved.push(trade);
                } else {
                    active = Some(trade);
                }
            }

            let ctx = StrategyContext {
                symbol: &self.config.symbol,
                timeframe: self.config.timeframe,
                candle,
                history: &candles[..=index],
                indicators: snapshot_at(indicator_series, now),
                position: active.as_ref(),
            };
            strategy.on_candle_processed(&ctx);

            if active.is_some() {
                continue;
            }

            // In tick mode the indicator series only changes at timeframe
            // boundaries; evaluating between them would compare values
            // against their own forward-fill.
            if self.config.use_tick_data && !self.config.timeframe.is_boundary(now) {
                continue;
            }

            let Some(signal) = strategy.generate_signal(&ctx) else {
                continue;
            };
            debug!(
                "{} signal for {} at {} (strength {:.2})",
                signal.direction.as_str(),
                self.config.symbol,
                signal.timestamp,
                signal.strength
            );

            let window = self
                .data_source
                .get_execution_window(
                    &self.config.symbol,
                    signal.timestamp,
                    strategy.execution_window_minutes(),
                    self.config.execution_window_pre_minutes,
                )
                .await?;
            if window.is_empty() {
                warn!(
                    "No execution window data for {} signal at {}; dropping signal",
                    signal.direction.as_str(),
                    signal.timestamp
                );
                continue;
            }
            ensure_chronological(&window, "execution window")?;

            if let Some(trade) = simulator.execute(&signal, &window, strategy, &ctx) {
                active = Some(trade);
            }
        }

        if let Some(trade) = active.take() {
            resolved.push(trade);
        }
        Ok(resolved)
    }
}

fn snapshot_at(series: &IndicatorSeries, t: DateTime<Utc>) -> HashMap<String, f64> {
    series
        .iter()
        .filter_map(|(name, values)| value_at(values, t).map(|value| (name.clone(), value)))
        .collect()
}
