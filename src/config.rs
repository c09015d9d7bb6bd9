use crate::error::BacktestError;
use crate::models::Timeframe;
use crate::param_utils::{get_param_bool, get_param_f64, get_param_usize_min};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Trailing-stop settings. Presence of the struct enables trailing mode,
/// which replaces the fixed take-profit with an unreachable sentinel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrailingStopConfig {
    /// Unrealized profit (in pips, measured from the lagged close) required
    /// before the trailing level starts moving.
    pub activation_pips: f64,
    /// Distance the trailing level sits behind the reference close.
    pub trail_distance_pips: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestConfiguration {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub stop_loss_pips: f64,
    pub take_profit_pips: f64,
    #[serde(default)]
    pub trailing_stop: Option<TrailingStopConfig>,
    #[serde(default = "default_max_open_trades")]
    pub max_open_trades: usize,
    /// Set when the candle stream is finer-grained than `timeframe` (e.g.
    /// per-second bars built from ticks); gates signal evaluation to
    /// timeframe boundaries.
    #[serde(default)]
    pub use_tick_data: bool,
    /// How far before the signal timestamp the execution window starts.
    #[serde(default = "default_pre_minutes")]
    pub execution_window_pre_minutes: i64,
}

fn default_max_open_trades() -> usize {
    1
}

fn default_pre_minutes() -> i64 {
    1
}

impl BacktestConfiguration {
    /// Build a configuration from a flat parameter map; missing keys fall
    /// back to defaults, non-finite values are ignored.
    pub fn from_parameters(
        symbol: &str,
        timeframe: Timeframe,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        parameters: &HashMap<String, f64>,
    ) -> Self {
        let trailing_stop = if get_param_bool(parameters, "trailingStopEnabled", false) {
            Some(TrailingStopConfig {
                activation_pips: get_param_f64(parameters, "trailingActivationPips", 10.0),
                trail_distance_pips: get_param_f64(parameters, "trailingDistancePips", 10.0),
            })
        } else {
            None
        };

        Self {
            symbol: symbol.to_string(),
            timeframe,
            start_date,
            end_date,
            stop_loss_pips: get_param_f64(parameters, "stopLossPips", 20.0),
            take_profit_pips: get_param_f64(parameters, "takeProfitPips", 40.0),
            trailing_stop,
            max_open_trades: get_param_usize_min(parameters, "maxOpenTrades", 1, 1),
            use_tick_data: get_param_bool(parameters, "useTickData", false),
            execution_window_pre_minutes: get_param_usize_min(
                parameters,
                "executionWindowPreMinutes",
                1,
                0,
            ) as i64,
        }
    }

    pub fn trailing_enabled(&self) -> bool {
        self.trailing_stop.is_some()
    }

    pub fn validate(&self) -> Result<(), BacktestError> {
        if self.symbol.trim().is_empty() {
            return Err(BacktestError::InvalidConfiguration(
                "symbol must not be empty".to_string(),
            ));
        }
        if self.end_date <= self.start_date {
            return Err(BacktestError::InvalidConfiguration(format!(
                "endDate {} must be after startDate {}",
                self.end_date, self.start_date
            )));
        }
        if !(self.stop_loss_pips.is_finite() && self.stop_loss_pips > 0.0) {
            return Err(BacktestError::InvalidConfiguration(format!(
                "stopLossPips must be a positive number (value: {})",
                self.stop_loss_pips
            )));
        }
        if !(self.take_profit_pips.is_finite() && self.take_profit_pips > 0.0) {
            return Err(BacktestError::InvalidConfiguration(format!(
                "takeProfitPips must be a positive number (value: {})",
                self.take_profit_pips
            )));
        }
        if let Some(trailing) = &self.trailing_stop {
            if !(trailing.activation_pips.is_finite() && trailing.activation_pips >= 0.0) {
                return Err(BacktestError::InvalidConfiguration(format!(
                    "trailing activationPips must be >= 0 (value: {})",
                    trailing.activation_pips
                )));
            }
            if !(trailing.trail_distance_pips.is_finite() && trailing.trail_distance_pips > 0.0) {
                return Err(BacktestError::InvalidConfiguration(format!(
                    "trailing trailDistancePips must be > 0 (value: {})",
                    trailing.trail_distance_pips
                )));
            }
        }
        if self.max_open_trades != 1 {
            return Err(BacktestError::InvalidConfiguration(format!(
                "maxOpenTrades must be 1; overlapping positions are not supported (value: {})",
                self.max_open_trades
            )));
        }
        if self.execution_window_pre_minutes < 0 {
            return Err(BacktestError::InvalidConfiguration(format!(
                "executionWindowPreMinutes must be >= 0 (value: {})",
                self.execution_window_pre_minutes
            )));
        }
        Ok(())
    }
}
