use crate::candle_utils::ensure_chronological;
use crate::config::BacktestConfiguration;
use crate::error::BacktestError;
use crate::indicators::IndicatorProvider;
use crate::market_data::MarketDataSource;
use crate::models::BacktestResults;
use crate::performance::PerformanceAggregator;
use crate::scheduler::SignalScheduler;
use crate::strategy::StrategyPort;
use chrono::Utc;
use log::info;
use uuid::Uuid;

/// Orchestrates one backtest run: fetch, validate, schedule, aggregate.
/// All collaborators are injected; the backtester holds no global state and
/// a partially completed run leaves nothing behind.
pub struct Backtester<'a> {
    config: &'a BacktestConfiguration,
    data_source: &'a dyn MarketDataSource,
    indicator_provider: &'a dyn IndicatorProvider,
}

impl<'a> Backtester<'a> {
    pub fn new(
        config: &'a BacktestConfiguration,
        data_source: &'a dyn MarketDataSource,
        indicator_provider: &'a dyn IndicatorProvider,
    ) -> Self {
        Self {
            config,
            data_source,
            indicator_provider,
        }
    }

    pub async fn run(
        &self,
        strategy: &mut dyn StrategyPort,
    ) -> Result<BacktestResults, BacktestError> {
        self.config.validate()?;

        let candles = self
            .data_source
            .get_candles(
                &self.config.symbol,
                self.config.timeframe,
                self.config.start_date,
                self.config.end_date,
            )
            .await?;
        if candles.is_empty() {
            return Err(BacktestError::NoData {
                symbol: self.config.symbol.clone(),
                timeframe: self.config.timeframe.to_string(),
            });
        }
        ensure_chronological(&candles, "backtest candles")?;
        info!(
            "Backtesting {} on {} {}: {} candles from {} to {}",
            strategy.template_id(),
            self.config.symbol,
            self.config.timeframe,
            candles.len(),
            candles[0].timestamp,
            candles[candles.len() - 1].timestamp
        );

        // Fail fast on unsatisfiable indicator requirements; a misconfigured
        // strategy must never die halfway through a run.
        let required = strategy.required_indicators();
        let indicator_series = self.indicator_provider.compute(&candles, &required)?;
        for name in &required {
            if !indicator_series.contains_key(name) {
                return Err(BacktestError::MissingIndicator { name: name.clone() });
            }
        }

        let scheduler = SignalScheduler::new(self.config, self.data_source);
        let trades = scheduler.run(&candles, &indicator_series, strategy).await?;

        let performance = PerformanceAggregator::reduce(&trades);
        info!(
            "Completed backtest for {}: {} trades, {:.1} total pips, win rate {:.1}%",
            self.config.symbol,
            performance.total_trades,
            performance.total_pips,
            performance.win_rate * 100.0
        );

        Ok(BacktestResults {
            id: Uuid::new_v4().to_string(),
            symbol: self.config.symbol.clone(),
            timeframe: self.config.timeframe,
            start_date: self.config.start_date,
            end_date: self.config.end_date,
            trades,
            performance,
            created_at: Utc::now(),
        })
    }
}
