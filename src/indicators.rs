use crate::error::BacktestError;
use crate::models::Candle;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

/// Indicator series keyed by name, each a timestamp-ordered map aligned to
/// the candles they were computed from.
pub type IndicatorSeries = HashMap<String, BTreeMap<DateTime<Utc>, f64>>;

/// Computes named indicator series for a candle sequence. Implementations
/// own the numeric guards (degenerate ranges, warmup padding); the core
/// treats returned values as well-formed.
pub trait IndicatorProvider {
    fn compute(&self, candles: &[Candle], names: &[String]) -> Result<IndicatorSeries, BacktestError>;
}

pub fn calculate_sma(prices: &[f64], period: usize) -> Vec<f64> {
    if prices.is_empty() {
        return Vec::new();
    }
    if period <= 1 || prices.len() < period {
        return prices.to_vec();
    }

    let mut sma_values = Vec::with_capacity(prices.len());
    for _ in 0..period - 1 {
        sma_values.push(prices[0]);
    }

    let mut window_sum: f64 = prices[..period].iter().sum();
    sma_values.push(window_sum / period as f64);
    for i in period..prices.len() {
        window_sum += prices[i] - prices[i - period];
        sma_values.push(window_sum / period as f64);
    }

    sma_values
}

pub fn calculate_ema(prices: &[f64], period: usize) -> Vec<f64> {
    if prices.is_empty() {
        return Vec::new();
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut ema_values = Vec::with_capacity(prices.len());
    ema_values.push(prices[0]);

    for i in 1..prices.len() {
        let ema = (prices[i] * multiplier) + (ema_values[i - 1] * (1.0 - multiplier));
        ema_values.push(ema);
    }

    ema_values
}

fn rsi_from_avgs(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else if avg_gain == 0.0 {
        0.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }
}

pub fn calculate_rsi(prices: &[f64], period: usize) -> Vec<f64> {
    if prices.is_empty() {
        return Vec::new();
    }
    if period == 0 || prices.len() < period + 1 {
        return vec![50.0; prices.len()];
    }

    let mut rsi_values = vec![50.0; prices.len()];
    let mut sum_gain = 0.0f64;
    let mut sum_loss = 0.0f64;
    for i in 1..=period {
        let delta = prices[i] - prices[i - 1];
        if delta >= 0.0 {
            sum_gain += delta;
        } else {
            sum_loss += -delta;
        }
    }

    let mut avg_gain = sum_gain / period as f64;
    let mut avg_loss = sum_loss / period as f64;
    rsi_values[period] = rsi_from_avgs(avg_gain, avg_loss);

    for i in (period + 1)..prices.len() {
        let delta = prices[i] - prices[i - 1];
        let gain = if delta > 0.0 { delta } else { 0.0 };
        let loss = if delta < 0.0 { -delta } else { 0.0 };
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
        rsi_values[i] = rsi_from_avgs(avg_gain, avg_loss);
    }

    rsi_values
}

/// ATR as an SMA of true ranges, padded at the front so the output stays
/// aligned with the input candles.
pub fn calculate_atr(candles: &[Candle], period: usize) -> Vec<f64> {
    if candles.is_empty() {
        return Vec::new();
    }
    if period == 0 {
        return vec![0.0; candles.len()];
    }

    let mut tr_values = Vec::with_capacity(candles.len());
    tr_values.push(candles[0].high - candles[0].low);
    for i in 1..candles.len() {
        let prev_close = candles[i - 1].close;
        let tr = (candles[i].high - candles[i].low)
            .max((candles[i].high - prev_close).abs())
            .max((candles[i].low - prev_close).abs());
        tr_values.push(tr);
    }

    let mut atr_values = Vec::with_capacity(candles.len());
    for i in 0..tr_values.len() {
        let start = (i + 1).saturating_sub(period);
        let window = &tr_values[start..=i];
        atr_values.push(window.iter().sum::<f64>() / window.len() as f64);
    }

    atr_values
}

/// Default provider. Recognizes `sma_N`, `ema_N`, `rsi_N` and `atr_N` names
/// and computes them over candle closes (ATR over the full bars). Unknown
/// names fail fast so a misconfigured strategy never reaches the simulator.
#[derive(Debug, Default)]
pub struct BuiltinIndicatorProvider;

impl BuiltinIndicatorProvider {
    pub fn new() -> Self {
        Self
    }

    fn parse_name(name: &str) -> Option<(&str, usize)> {
        let (kind, raw_period) = name.split_once('_')?;
        let period: usize = raw_period.parse().ok()?;
        if period == 0 {
            return None;
        }
        match kind {
            "sma" | "ema" | "rsi" | "atr" => Some((kind, period)),
            _ => None,
        }
    }
}

impl IndicatorProvider for BuiltinIndicatorProvider {
    fn compute(
        &self,
        candles: &[Candle],
        names: &[String],
    ) -> Result<IndicatorSeries, BacktestError> {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let mut series = IndicatorSeries::new();

        for name in names {
            let (kind, period) = Self::parse_name(name).ok_or_else(|| {
                BacktestError::MissingIndicator {
                    name: name.clone(),
                }
            })?;

            let values = match kind {
                "sma" => calculate_sma(&closes, period),
                "ema" => calculate_ema(&closes, period),
                "rsi" => calculate_rsi(&closes, period),
                "atr" => calculate_atr(candles, period),
                _ => unreachable!("parse_name only yields known kinds"),
            };

            let aligned: BTreeMap<DateTime<Utc>, f64> = candles
                .iter()
                .zip(values)
                .map(|(candle, value)| (candle.timestamp, value))
                .collect();
            series.insert(name.clone(), aligned);
        }

        Ok(series)
    }
}

/// Latest value at or before `t` (forward fill). Series computed from
/// coarser bars hold their last value between boundaries.
pub fn value_at(series: &BTreeMap<DateTime<Utc>, f64>, t: DateTime<Utc>) -> Option<f64> {
    series.range(..=t).next_back().map(|(_, v)| *v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        let base = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                timestamp: base + Duration::minutes(i as i64),
                open: close,
                high: close + 0.5,
                low: close - 0.5,
                close,
                volume: 100.0,
            })
            .collect()
    }

    #[test]
    fn sma_matches_rolling_mean_once_warm() {
        let prices = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let sma = calculate_sma(&prices, 3);
        assert_eq!(sma.len(), prices.len());
        assert!((sma[2] - 2.0).abs() < 1e-9);
        assert!((sma[4] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn rsi_saturates_on_one_sided_moves() {
        let rising: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let rsi = calculate_rsi(&rising, 14);
        assert!(rsi[29] > 99.0);

        let falling: Vec<f64> = (0..30).map(|i| 100.0 - i as f64).collect();
        let rsi = calculate_rsi(&falling, 14);
        assert!(rsi[29] < 1.0);
    }

    #[test]
    fn builtin_provider_computes_requested_names() {
        let candles = candles_from_closes(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let provider = BuiltinIndicatorProvider::new();
        let names = vec!["sma_3".to_string(), "rsi_2".to_string(), "atr_3".to_string()];
        let series = provider.compute(&candles, &names).unwrap();

        assert_eq!(series.len(), 3);
        for name in &names {
            assert_eq!(series[name].len(), candles.len(), "{} misaligned", name);
        }
    }

    #[test]
    fn builtin_provider_rejects_unknown_names() {
        let candles = candles_from_closes(&[1.0, 2.0, 3.0]);
        let provider = BuiltinIndicatorProvider::new();
        let err = provider
            .compute(&candles, &["vwap_14".to_string()])
            .unwrap_err();
        assert!(matches!(err, BacktestError::MissingIndicator { .. }));
    }

    #[test]
    fn value_at_forward_fills_between_points() {
        let candles = candles_from_closes(&[1.0, 2.0, 3.0]);
        let provider = BuiltinIndicatorProvider::new();
        let series = provider
            .compute(&candles, &["sma_2".to_string()])
            .unwrap();
        let sma = &series["sma_2"];

        let between = candles[1].timestamp + Duration::seconds(30);
        assert_eq!(value_at(sma, between), value_at(sma, candles[1].timestamp));
        assert_eq!(value_at(sma, candles[0].timestamp - Duration::seconds(1)), None);
    }
}
