use crate::models::{PerformanceSummary, Trade, TradeResult};
use statrs::statistics::Statistics;

pub struct PerformanceAggregator;

impl PerformanceAggregator {
    /// Pure reduction of a chronological trade list into summary
    /// statistics. Every trade contributes its pips to the totals,
    /// including end-of-window closes.
    pub fn reduce(trades: &[Trade]) -> PerformanceSummary {
        let total_trades = trades.len() as i32;

        let trade_pips: Vec<f64> = trades
            .iter()
            .map(|trade| trade.pips.unwrap_or(0.0))
            .collect();
        let winning_pips: Vec<f64> = trade_pips.iter().copied().filter(|&p| p > 0.0).collect();
        let losing_pips: Vec<f64> = trade_pips.iter().copied().filter(|&p| p < 0.0).collect();

        let total_pips: f64 = trade_pips.iter().sum();
        let win_rate = if total_trades > 0 {
            winning_pips.len() as f64 / total_trades as f64
        } else {
            0.0
        };

        let gross_wins: f64 = winning_pips.iter().sum();
        let gross_losses: f64 = losing_pips.iter().map(|p| p.abs()).sum();
        let profit_factor = if winning_pips.is_empty() {
            0.0
        } else if gross_losses == 0.0 {
            f64::INFINITY
        } else {
            gross_wins / gross_losses
        };

        let average_win = Self::average(&winning_pips);
        let average_loss = Self::average(&losing_pips);
        let largest_win = winning_pips.iter().copied().fold(0.0, f64::max);
        let largest_loss = losing_pips.iter().copied().fold(0.0, f64::min);

        let max_drawdown = Self::max_drawdown(&trade_pips);
        let (max_consecutive_wins, max_consecutive_losses) = Self::longest_streaks(trades);
        let sharpe_ratio = Self::sharpe_ratio(&trade_pips);

        PerformanceSummary {
            total_trades,
            win_rate,
            total_pips,
            profit_factor,
            average_win,
            average_loss,
            largest_win,
            largest_loss,
            max_drawdown,
            max_consecutive_wins,
            max_consecutive_losses,
            sharpe_ratio,
        }
    }

    fn average(values: &[f64]) -> f64 {
        if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        }
    }

    /// Drawdown over the running cumulative-pips series against its running
    /// peak. This is a pips-based measure, not an equity curve.
    fn max_drawdown(trade_pips: &[f64]) -> f64 {
        let mut cumulative = 0.0;
        let mut peak = 0.0;
        let mut max_drawdown = 0.0;

        for pips in trade_pips {
            cumulative += pips;
            if cumulative > peak {
                peak = cumulative;
            }
            let drawdown = peak - cumulative;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
            }
        }

        max_drawdown
    }

    /// Longest runs of WIN-classified and LOSS-classified trades in
    /// chronological order. Breakeven and end-of-window closes reset both
    /// running counters.
    fn longest_streaks(trades: &[Trade]) -> (i32, i32) {
        let mut current_wins = 0;
        let mut current_losses = 0;
        let mut max_wins = 0;
        let mut max_losses = 0;

        for trade in trades {
            match trade.result {
                Some(TradeResult::Win) => {
                    current_wins += 1;
                    current_losses = 0;
                }
                Some(TradeResult::Loss) => {
                    current_losses += 1;
                    current_wins = 0;
                }
                _ => {
                    current_wins = 0;
                    current_losses = 0;
                }
            }
            max_wins = max_wins.max(current_wins);
            max_losses = max_losses.max(current_losses);
        }

        (max_wins, max_losses)
    }

    fn sharpe_ratio(trade_pips: &[f64]) -> f64 {
        if trade_pips.len() < 2 {
            return 0.0;
        }
        let mean = trade_pips.to_vec().mean();
        let std_dev = trade_pips.to_vec().std_dev();
        if std_dev == 0.0 || !std_dev.is_finite() {
            return 0.0;
        }
        mean / std_dev
    }
}
