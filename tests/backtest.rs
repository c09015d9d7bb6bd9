use chrono::{DateTime, Duration, TimeZone, Utc};
use fxengine::backtester::Backtester;
use fxengine::config::{BacktestConfiguration, TrailingStopConfig};
use fxengine::error::BacktestError;
use fxengine::indicators::BuiltinIndicatorProvider;
use fxengine::market_data::SnapshotDataSource;
use fxengine::models::{Candle, Signal, Timeframe};
use fxengine::strategy::{create_strategy, StrategyContext, StrategyPort};
use std::sync::Once;

fn ensure_test_env() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Two overlaid sine waves; produces regular crossovers and reversals.
fn price_at(minute: i64) -> f64 {
    let t = minute as f64;
    1.1000 + 0.0040 * (t / 720.0).sin() + 0.0012 * (t / 90.0).sin()
}

fn synthetic_candles(total_minutes: i64, step: i64) -> Vec<Candle> {
    let mut candles = Vec::new();
    let mut previous_close = price_at(0);
    for minute in (0..total_minutes).step_by(step as usize) {
        let open = previous_close;
        let close = price_at(minute + step);
        let drift = (close - open).abs();
        candles.push(Candle {
            timestamp: start_time() + Duration::minutes(minute),
            open,
            high: open.max(close) + drift * 0.3 + 0.0001,
            low: open.min(close) - drift * 0.3 - 0.0001,
            close,
            volume: 100.0,
        });
        previous_close = close;
    }
    candles
}

fn snapshot(days: i64) -> SnapshotDataSource {
    let minutes = days * 24 * 60;
    SnapshotDataSource::new(
        "EURUSD",
        Timeframe::M15,
        synthetic_candles(minutes, 15),
        synthetic_candles(minutes, 1),
    )
    .expect("synthetic candles are chronological")
}

fn configuration(trailing: Option<TrailingStopConfig>, days: i64) -> BacktestConfiguration {
    BacktestConfiguration {
        symbol: "EURUSD".to_string(),
        timeframe: Timeframe::M15,
        start_date: start_time(),
        end_date: start_time() + Duration::days(days),
        stop_loss_pips: 12.0,
        take_profit_pips: 18.0,
        trailing_stop: trailing,
        max_open_trades: 1,
        use_tick_data: false,
        execution_window_pre_minutes: 1,
    }
}

#[tokio::test]
async fn full_pipeline_produces_consistent_results() {
    ensure_test_env();
    let source = snapshot(3);
    let provider = BuiltinIndicatorProvider::new();
    let config = configuration(None, 3);

    let parameters = serde_json::from_str(
        r#"{"fastPeriod": 4, "slowPeriod": 12, "executionWindowMinutes": 120}"#,
    )
    .unwrap();
    let mut strategy = create_strategy("ma_crossover", parameters).unwrap();

    let backtester = Backtester::new(&config, &source, &provider);
    let results = backtester.run(strategy.as_mut()).await.unwrap();

    assert!(
        !results.trades.is_empty(),
        "crossover strategy should trade on oscillating data"
    );
    assert_eq!(
        results.performance.total_trades as usize,
        results.trades.len()
    );

    for trade in &results.trades {
        assert_eq!(trade.symbol, "EURUSD");
        assert!(trade.is_resolved(), "every trade must be resolved");
        assert!(
            trade.exit_time.unwrap() > trade.entry_time,
            "exit must strictly follow entry"
        );
        assert!(trade.exit_reason.is_some());
        assert!(trade.result.is_some());
        // Fixed-target mode keeps the protective levels on the correct
        // sides of the entry.
        match trade.direction {
            fxengine::models::Direction::Buy => {
                assert!(trade.stop_loss < trade.entry_price);
                assert!(trade.take_profit > trade.entry_price);
            }
            fxengine::models::Direction::Sell => {
                assert!(trade.stop_loss > trade.entry_price);
                assert!(trade.take_profit < trade.entry_price);
            }
        }
    }

    // No two trades may ever be active at the same instant.
    for pair in results.trades.windows(2) {
        assert!(pair[1].entry_time >= pair[0].exit_time.unwrap());
    }

    // The aggregate total must equal the direct sum over the trade list.
    let direct_sum: f64 = results.trades.iter().map(|t| t.pips.unwrap()).sum();
    assert!((results.performance.total_pips - direct_sum).abs() < 1e-6);

    let winners = results
        .trades
        .iter()
        .filter(|t| t.pips.unwrap() > 0.0)
        .count();
    let expected_win_rate = winners as f64 / results.trades.len() as f64;
    assert!((results.performance.win_rate - expected_win_rate).abs() < 1e-9);
}

#[tokio::test]
async fn trailing_mode_replaces_target_and_stays_monotonic() {
    ensure_test_env();
    let source = snapshot(3);
    let provider = BuiltinIndicatorProvider::new();
    let config = configuration(
        Some(TrailingStopConfig {
            activation_pips: 4.0,
            trail_distance_pips: 6.0,
        }),
        3,
    );

    let parameters = serde_json::from_str(
        r#"{"fastPeriod": 4, "slowPeriod": 12, "executionWindowMinutes": 180}"#,
    )
    .unwrap();
    let mut strategy = create_strategy("ma_crossover", parameters).unwrap();

    let backtester = Backtester::new(&config, &source, &provider);
    let results = backtester.run(strategy.as_mut()).await.unwrap();

    assert!(!results.trades.is_empty());
    for trade in &results.trades {
        assert!(
            trade.take_profit.is_infinite(),
            "trailing mode must disable the fixed target"
        );
        assert_ne!(
            trade.exit_reason,
            Some(fxengine::models::ExitReason::TakeProfit)
        );
        if let Some(level) = trade.trailing_stop_level {
            // The trailing level only ever moves favorably off the stop.
            match trade.direction {
                fxengine::models::Direction::Buy => assert!(level >= trade.stop_loss),
                fxengine::models::Direction::Sell => assert!(level <= trade.stop_loss),
            }
        }
    }
}

#[tokio::test]
async fn empty_candle_range_aborts_with_no_data() {
    ensure_test_env();
    let source = snapshot(3);
    let provider = BuiltinIndicatorProvider::new();
    // A range entirely after the snapshot's data.
    let mut config = configuration(None, 3);
    config.start_date = start_time() + Duration::days(30);
    config.end_date = start_time() + Duration::days(31);

    let mut strategy = create_strategy("ma_crossover", Default::default()).unwrap();
    let backtester = Backtester::new(&config, &source, &provider);
    let err = backtester.run(strategy.as_mut()).await.unwrap_err();

    assert!(matches!(err, BacktestError::NoData { .. }));
}

/// Declares an indicator the builtin provider cannot supply and records
/// whether the scheduler ever reached it.
struct UnsatisfiableStrategy {
    evaluations: usize,
}

impl StrategyPort for UnsatisfiableStrategy {
    fn template_id(&self) -> &str {
        "unsatisfiable"
    }

    fn required_indicators(&self) -> Vec<String> {
        vec!["vwap_14".to_string()]
    }

    fn generate_signal(&mut self, _ctx: &StrategyContext) -> Option<Signal> {
        self.evaluations += 1;
        None
    }
}

#[tokio::test]
async fn unsupported_indicator_fails_before_simulation_starts() {
    ensure_test_env();
    let source = snapshot(1);
    let provider = BuiltinIndicatorProvider::new();
    let config = configuration(None, 1);

    let mut strategy = UnsatisfiableStrategy { evaluations: 0 };
    let backtester = Backtester::new(&config, &source, &provider);
    let err = backtester.run(&mut strategy).await.unwrap_err();

    match err {
        BacktestError::MissingIndicator { name } => assert_eq!(name, "vwap_14"),
        other => panic!("expected MissingIndicator, got {other:?}"),
    }
    assert_eq!(
        strategy.evaluations, 0,
        "validation must fail before any candle is processed"
    );
}
