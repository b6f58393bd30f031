//! Backtest summary statistics.
//!
//! Every ratio is guarded: with no trades the per-trade statistics are 0.

use super::position::Trade;
use chrono::NaiveDateTime;

/// Upper bound for the Kelly fraction.
pub const KELLY_CAP: f64 = 100.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResults {
    pub initial_cash: f64,
    pub cash_final: f64,
    pub pnl: f64,
    pub pnl_percentage: f64,
    pub normalized_pnl: f64,
    pub win_rate: f64,
    pub average_return: f64,
    /// Worst single-trade return, not an equity-curve drawdown.
    pub max_drawdown: f64,
    pub buy_and_hold_pnl: f64,
    pub excess: f64,
    pub kelly_criterion: f64,
    pub trade_number: usize,
    pub wins: usize,
    pub losses: usize,
    pub value_history: Vec<f64>,
    pub benchmark_history: Vec<f64>,
    pub trades: Vec<Trade>,
}

impl BacktestResults {
    pub fn compute(
        initial_cash: f64,
        cash_final: f64,
        buy_and_hold_pnl: f64,
        trades: Vec<Trade>,
        value_history: Vec<f64>,
        benchmark_history: Vec<f64>,
    ) -> Self {
        let returns: Vec<f64> = trades.iter().map(|t| t.variation).collect();
        let trade_number = trades.len();
        let wins = trades.iter().filter(|t| t.is_win()).count();
        let losses = trade_number - wins;

        let pnl = cash_final - initial_cash;
        let per_cash = |x: f64| {
            if initial_cash != 0.0 {
                x / initial_cash
            } else {
                0.0
            }
        };
        let per_trade = |x: f64| {
            if trade_number > 0 {
                x / trade_number as f64
            } else {
                0.0
            }
        };

        let max_drawdown = if returns.is_empty() {
            0.0
        } else {
            returns.iter().copied().fold(f64::INFINITY, f64::min)
        };

        BacktestResults {
            initial_cash,
            cash_final,
            pnl,
            pnl_percentage: per_cash(pnl),
            normalized_pnl: per_trade(pnl),
            win_rate: per_trade(wins as f64),
            average_return: per_trade(returns.iter().sum()),
            max_drawdown,
            buy_and_hold_pnl,
            excess: per_cash(pnl - buy_and_hold_pnl),
            kelly_criterion: kelly_criterion(&returns),
            trade_number,
            wins,
            losses,
            value_history,
            benchmark_history,
            trades,
        }
    }

    pub fn entry_dates(&self) -> Vec<NaiveDateTime> {
        self.trades.iter().map(|t| t.entry_time).collect()
    }

    pub fn entry_prices(&self) -> Vec<f64> {
        self.trades.iter().map(|t| t.entry_price).collect()
    }

    pub fn exit_dates(&self) -> Vec<NaiveDateTime> {
        self.trades.iter().map(|t| t.exit_time).collect()
    }

    pub fn exit_prices(&self) -> Vec<f64> {
        self.trades.iter().map(|t| t.exit_price).collect()
    }

    pub fn final_value(&self) -> f64 {
        self.value_history.last().copied().unwrap_or(self.cash_final)
    }
}

/// `W / avg_loss - (1 - W) / avg_win` over fractional trade returns, capped
/// at [`KELLY_CAP`]. 0 without trades or winners, the cap without losers.
pub fn kelly_criterion(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let (gains, losses): (Vec<f64>, Vec<f64>) = returns.iter().copied().partition(|&r| r > 0.0);
    if gains.is_empty() {
        return 0.0;
    }
    let avg_loss = mean(&losses).abs();
    if losses.is_empty() || avg_loss == 0.0 {
        return KELLY_CAP;
    }
    let avg_win = mean(&gains);
    let win_rate = gains.len() as f64 / returns.len() as f64;
    (win_rate / avg_loss - (1.0 - win_rate) / avg_win).min(KELLY_CAP)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
