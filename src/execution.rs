use crate::candle_utils::first_at_or_after;
use crate::config::BacktestConfiguration;
use crate::instruments::{pip_size, pips_to_price};
use crate::models::{
    generate_trade_id, Candle, Direction, ExitReason, Signal, Trade, TradeResult,
};
use crate::strategy::{StrategyContext, StrategyPort};
use log::{debug, warn};

const PIPS_EPSILON: f64 = 1e-9;

/// Resolves one signal into a finished trade using a window of finer
/// candles. Owns the level arithmetic and the exit walk; the scheduler owns
/// which signals reach it.
pub struct ExecutionSimulator<'a> {
    config: &'a BacktestConfiguration,
}

impl<'a> ExecutionSimulator<'a> {
    pub fn new(config: &'a BacktestConfiguration) -> Self {
        Self { config }
    }

    /// Entry is the first window candle at or after the signal; the fill is
    /// that candle's open, never the signal's (possibly stale) reference
    /// price. Returns `None` when the window cannot produce an exit strictly
    /// after the entry.
    pub fn execute(
        &self,
        signal: &Signal,
        window: &[Candle],
        strategy: &mut dyn StrategyPort,
        ctx: &StrategyContext,
    ) -> Option<Trade> {
        let symbol = &self.config.symbol;
        let entry_index = match first_at_or_after(window, signal.timestamp) {
            Some(index) => index,
            None => {
                warn!(
                    "Execution window for {} signal at {} ends before the signal; dropping",
                    signal.direction.as_str(),
                    signal.timestamp
                );
                return None;
            }
        };
        if entry_index + 1 >= window.len() {
            warn!(
                "Execution window for {} signal at {} has no candle after entry; dropping",
                signal.direction.as_str(),
                signal.timestamp
            );
            return None;
        }

        let entry_candle = &window[entry_index];
        let entry_price = entry_candle.open;
        let direction = signal.direction;
        let sign = direction.sign();
        let pip = pip_size(symbol);

        let stop_loss = entry_price - sign * pips_to_price(symbol, self.config.stop_loss_pips);
        let take_profit = if self.config.trailing_enabled() {
            // Unreachable sentinel: only the trailing mechanism can win.
            sign * f64::INFINITY
        } else {
            entry_price + sign * pips_to_price(symbol, self.config.take_profit_pips)
        };

        let mut trade = Trade {
            id: generate_trade_id(symbol, entry_candle.timestamp),
            symbol: symbol.clone(),
            direction,
            entry_time: entry_candle.timestamp,
            entry_price,
            stop_loss,
            take_profit,
            trailing_stop_level: None,
            exit_time: None,
            exit_price: None,
            pips: None,
            result: None,
            exit_reason: None,
        };
        debug!(
            "Opening {} {} at {} ({}), stop {} target {}",
            direction.as_str(),
            symbol,
            entry_price,
            trade.entry_time,
            stop_loss,
            take_profit
        );
        strategy.on_trade_opened(&trade, ctx);

        for n in (entry_index + 1)..window.len() {
            // The trailing level is derived from the PRIOR bar's close. An
            // OHLC bar does not reveal whether its favorable extreme came
            // before its adverse one, so updating from bar N and testing
            // bar N against the result would assume favorable-first.
            if let Some(trailing) = &self.config.trailing_stop {
                let prior = &window[n - 1];
                let profit_pips = sign * (prior.close - entry_price) / pip;
                if profit_pips >= trailing.activation_pips {
                    let candidate =
                        prior.close - sign * pips_to_price(symbol, trailing.trail_distance_pips);
                    let floor = trade.protective_level();
                    let advanced = if direction == Direction::Buy {
                        candidate.max(floor)
                    } else {
                        candidate.min(floor)
                    };
                    trade.trailing_stop_level = Some(advanced);
                }
            }

            let candle = &window[n];
            let level = trade.protective_level();
            let stop_hit = match direction {
                Direction::Buy => candle.low <= level,
                Direction::Sell => candle.high >= level,
            };

            if stop_hit {
                if take_profit.is_finite() {
                    let target_also_hit = match direction {
                        Direction::Buy => candle.high >= take_profit,
                        Direction::Sell => candle.low <= take_profit,
                    };
                    if target_also_hit {
                        warn!(
                            "Bar at {} spans both stop {} and target {}; intra-bar order is unknowable, assuming the stop filled first",
                            candle.timestamp, level, take_profit
                        );
                    }
                }

                // A bar that opens beyond the level gapped through it; the
                // fill is the open, not the level.
                let exit_price = match direction {
                    Direction::Buy if candle.open <= level => candle.open,
                    Direction::Sell if candle.open >= level => candle.open,
                    _ => level,
                };
                let reason = if trade
                    .trailing_stop_level
                    .map_or(false, |trailing| trailing != trade.stop_loss)
                {
                    ExitReason::TrailingStop
                } else {
                    ExitReason::StopLoss
                };
                return Some(self.close_trade(
                    trade,
                    candle.timestamp,
                    exit_price,
                    reason,
                    strategy,
                    ctx,
                ));
            }

            if take_profit.is_finite() {
                let target_hit = match direction {
                    Direction::Buy => candle.high >= take_profit,
                    Direction::Sell => candle.low <= take_profit,
                };
                if target_hit {
                    return Some(self.close_trade(
                        trade,
                        candle.timestamp,
                        take_profit,
                        ExitReason::TakeProfit,
                        strategy,
                        ctx,
                    ));
                }
            }
        }

        // Nothing triggered before the data ran out; close on the last bar.
        let last = window
            .last()
            .expect("window has at least one candle past the entry");
        Some(self.close_trade(
            trade,
            last.timestamp,
            last.close,
            ExitReason::EndOfWindow,
            strategy,
            ctx,
        ))
    }

    fn close_trade(
        &self,
        mut trade: Trade,
        exit_time: chrono::DateTime<chrono::Utc>,
        exit_price: f64,
        reason: ExitReason,
        strategy: &mut dyn StrategyPort,
        ctx: &StrategyContext,
    ) -> Trade {
        let pips = trade.direction.sign() * (exit_price - trade.entry_price)
            / pip_size(&trade.symbol);
        let result = match reason {
            ExitReason::EndOfWindow => TradeResult::EodClose,
            _ => classify_pips(pips),
        };
        trade.resolve(exit_time, exit_price, pips, result, reason);
        debug!(
            "Closed {} {} at {} ({}): {:.1} pips, {}",
            trade.direction.as_str(),
            trade.symbol,
            exit_price,
            exit_time,
            pips,
            result.as_str()
        );
        strategy.on_trade_closed(&trade, ctx);
        trade
    }
}

fn classify_pips(pips: f64) -> TradeResult {
    if pips.abs() <= PIPS_EPSILON {
        TradeResult::Breakeven
    } else if pips > 0.0 {
        TradeResult::Win
    } else {
        TradeResult::Loss
    }
}
