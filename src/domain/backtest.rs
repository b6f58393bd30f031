//! Backtest engine: bar-by-bar replay of one strategy over one series.
//!
//! The engine is long-only and all-in: an entry commits the whole cash
//! balance, an exit converts the position back to cash at the bar's close.
//! Bars `[cutoff_begin, cutoff_end)` form the trading window; indicator
//! columns are computed on everything before `cutoff_end`, so a window that
//! starts late still sees warmed-up indicators.

use super::metrics::BacktestResults;
use super::ohlcv::PriceBar;
use super::position::{Position, Trade};
use super::series::PriceSeries;
use super::strategy::{Strategy, StrategyState};
use tracing::debug;

/// Bars at the start of the window that only serve as lookback.
pub const LOOKBACK_BARS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_cash: f64,
    pub cutoff_begin: usize,
    /// Bars at or after this index are invisible to the run.
    pub cutoff_end: Option<usize>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_cash: 1000.0,
            cutoff_begin: 0,
            cutoff_end: None,
        }
    }
}

impl BacktestConfig {
    pub fn with_cash(initial_cash: f64) -> Self {
        BacktestConfig {
            initial_cash,
            ..Self::default()
        }
    }
}

/// Cash, exposure and histories for one run.
struct Ledger {
    initial_cash: f64,
    cash: f64,
    bet: f64,
    position: Position,
    trades: Vec<Trade>,
    value_history: Vec<f64>,
    benchmark_history: Vec<f64>,
}

impl Ledger {
    fn new(initial_cash: f64) -> Self {
        Ledger {
            initial_cash,
            cash: initial_cash,
            bet: 0.0,
            position: Position::Flat,
            trades: Vec::new(),
            value_history: Vec::new(),
            benchmark_history: Vec::new(),
        }
    }

    fn seed(&mut self) {
        self.value_history.push(self.initial_cash);
        self.benchmark_history.push(self.initial_cash);
    }

    fn open(&mut self, bar: &PriceBar, index: usize) {
        self.position = Position::Long {
            entry_price: bar.close,
            entry_time: bar.close_time,
            entry_index: index,
        };
        self.bet = self.cash;
        self.cash = 0.0;
        debug!(index, price = bar.close, time = %bar.close_time, "entered position");
    }

    fn close(&mut self, bar: &PriceBar, index: usize) {
        let Position::Long {
            entry_price,
            entry_time,
            entry_index,
        } = self.position
        else {
            return;
        };
        let variation = self.position.variation(bar.close);
        let profit = self.bet * variation;
        self.cash = (1.0 + variation) * self.bet;
        self.bet = 0.0;
        self.position = Position::Flat;
        self.trades.push(Trade {
            entry_time,
            entry_price,
            entry_index,
            exit_time: bar.close_time,
            exit_price: bar.close,
            exit_index: index,
            variation,
            profit,
        });
        debug!(index, price = bar.close, variation, "exited position");
    }

    /// Append the mark-to-market value and the buy-and-hold benchmark.
    fn mark(&mut self, close: f64, previous_close: f64) {
        let value = self.cash + (1.0 + self.position.variation(close)) * self.bet;
        self.value_history.push(value);
        let benchmark = self
            .benchmark_history
            .last()
            .copied()
            .unwrap_or(self.initial_cash);
        self.benchmark_history
            .push(benchmark * (1.0 + (close - previous_close) / previous_close));
    }
}

/// Run `strategy` over `series`. Never fails: an empty or too-short window
/// simply produces no trades.
pub fn run_backtest(
    strategy: &Strategy,
    series: &PriceSeries,
    config: &BacktestConfig,
) -> BacktestResults {
    let end = config
        .cutoff_end
        .map_or(series.len(), |cut| cut.min(series.len()));
    let series = strategy.augment(&series.truncated(end));
    let bars = series.bars();
    let begin = config.cutoff_begin;

    let mut ledger = Ledger::new(config.initial_cash);
    let mut state = StrategyState::default();
    if begin < end {
        ledger.seed();
    }

    for cursor in begin + LOOKBACK_BARS..=end {
        let view = series.view(cursor);
        let j = cursor - 1;
        let bar = &bars[j];
        if ledger.position.is_flat() {
            if strategy.is_enter(&view, &mut state) {
                ledger.open(bar, j);
            }
        } else if strategy.is_exit(&view, &mut state) {
            ledger.close(bar, j);
            state.reset();
        }
        ledger.mark(bar.close, bars[j - 1].close);
    }

    if ledger.position.is_long() {
        if let Some(last) = bars.last() {
            debug!("closing open position at the final bar");
            ledger.close(last, end - 1);
            state.reset();
        }
    }

    let buy_and_hold_pnl = if begin < end {
        let first = bars[begin].close;
        config.initial_cash * ((bars[end - 1].close - first) / first)
    } else {
        0.0
    };

    debug!(
        strategy = %strategy,
        trades = ledger.trades.len(),
        cash = ledger.cash,
        "backtest finished"
    );

    BacktestResults::compute(
        ledger.initial_cash,
        ledger.cash,
        buy_and_hold_pnl,
        ledger.trades,
        ledger.value_history,
        ledger.benchmark_history,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::Column;
    use crate::domain::params::ParameterSet;
    use crate::domain::strategy::StrategyKind;
    use chrono::NaiveDate;

    fn make_series(closes: &[f64]) -> PriceSeries {
        let t = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        PriceSeries::new(
            closes
                .iter()
                .enumerate()
                .map(|(i, &close)| PriceBar {
                    open_time: t + chrono::Duration::days(i as i64),
                    close_time: t + chrono::Duration::days(i as i64 + 1),
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: 1.0,
                })
                .collect(),
        )
    }

    /// Renko strategy driven by a hand-written direction column.
    fn scripted(closes: &[f64], directions: &[f64]) -> (Strategy, PriceSeries) {
        let strategy = StrategyKind::Renko.build(&ParameterSet::new()).unwrap();
        let column = Column::RenkoDirection {
            atr_window: 14,
            factor_x100: 100,
        };
        let series = make_series(closes).with_column(column, directions.to_vec());
        (strategy, series)
    }

    #[test]
    fn default_config() {
        let c = BacktestConfig::default();
        assert!((c.initial_cash - 1000.0).abs() < f64::EPSILON);
        assert_eq!(c.cutoff_begin, 0);
        assert_eq!(c.cutoff_end, None);
        let c = BacktestConfig::with_cash(50.0);
        assert!((c.initial_cash - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn single_round_trip() {
        let (strategy, series) = scripted(
            &[10.0, 10.0, 10.0, 12.0, 15.0, 15.0],
            &[0.0, 0.0, 1.0, 1.0, -1.0, 0.0],
        );
        let r = run_backtest(&strategy, &series, &BacktestConfig::default());
        assert_eq!(r.trade_number, 1);
        let trade = &r.trades[0];
        assert_eq!(trade.entry_index, 2);
        assert_eq!(trade.exit_index, 4);
        assert!((trade.variation - 0.5).abs() < 1e-12);
        assert!((trade.profit - 500.0).abs() < 1e-9);
        assert!((r.cash_final - 1500.0).abs() < 1e-9);
        assert!((r.pnl - 500.0).abs() < 1e-9);
        assert!((r.buy_and_hold_pnl - 500.0).abs() < 1e-9);
        assert!(r.excess.abs() < 1e-12);
        assert!((r.win_rate - 1.0).abs() < f64::EPSILON);
        assert_eq!(
            r.value_history,
            vec![1000.0, 1000.0, 1000.0, 1200.0, 1500.0, 1500.0]
        );
        assert_eq!(r.benchmark_history.len(), 6);
        assert!((r.benchmark_history[5] - 1500.0).abs() < 1e-9);
        assert_eq!(trade.entry_time, series.bars()[2].close_time);
    }

    #[test]
    fn open_position_is_closed_at_the_last_bar() {
        let (strategy, series) = scripted(&[10.0, 10.0, 10.0, 11.0, 12.0], &[0.0, 0.0, 1.0, 1.0, 1.0]);
        let r = run_backtest(&strategy, &series, &BacktestConfig::default());
        assert_eq!(r.trade_number, 1);
        assert_eq!(r.entry_dates().len(), r.exit_dates().len());
        assert_eq!(r.trades[0].exit_index, 4);
        assert!((r.cash_final - 1200.0).abs() < 1e-9);
        assert!((r.final_value() - 1200.0).abs() < 1e-9);
    }

    #[test]
    fn entry_needs_two_lookback_bars() {
        let (strategy, series) = scripted(&[10.0, 20.0, 30.0], &[1.0, 1.0, 1.0]);
        let r = run_backtest(&strategy, &series, &BacktestConfig::default());
        // first decision is on bar 1
        assert_eq!(r.trades[0].entry_index, 1);
        assert!((r.trades[0].variation - 0.5).abs() < 1e-12);
    }

    #[test]
    fn zero_return_trade_is_a_loss() {
        let (strategy, series) = scripted(&[10.0, 10.0, 10.0, 10.0], &[0.0, 0.0, 1.0, -1.0]);
        let r = run_backtest(&strategy, &series, &BacktestConfig::default());
        assert_eq!(r.trade_number, 1);
        assert_eq!(r.wins, 0);
        assert_eq!(r.losses, 1);
        assert!(r.win_rate.abs() < f64::EPSILON);
    }

    #[test]
    fn empty_series_is_empty_result() {
        let strategy = StrategyKind::MaCross.build(&ParameterSet::new()).unwrap();
        let r = run_backtest(&strategy, &PriceSeries::empty(), &BacktestConfig::default());
        assert_eq!(r.trade_number, 0);
        assert!(r.value_history.is_empty());
        assert!(r.benchmark_history.is_empty());
        assert!(r.pnl.abs() < f64::EPSILON);
        assert!(r.excess.abs() < f64::EPSILON);
    }

    #[test]
    fn single_bar_window_seeds_histories() {
        let (strategy, series) = scripted(&[10.0], &[1.0]);
        let r = run_backtest(&strategy, &series, &BacktestConfig::default());
        assert_eq!(r.value_history, vec![1000.0]);
        assert_eq!(r.benchmark_history, vec![1000.0]);
        assert_eq!(r.trade_number, 0);
    }

    #[test]
    fn cutoffs_bound_the_window() {
        let (strategy, series) = scripted(
            &[10.0, 10.0, 10.0, 12.0, 15.0, 15.0, 20.0, 20.0],
            &[0.0, 0.0, 1.0, 1.0, -1.0, 0.0, 1.0, 1.0],
        );
        let config = BacktestConfig {
            cutoff_end: Some(6),
            ..BacktestConfig::default()
        };
        let r = run_backtest(&strategy, &series, &config);
        assert_eq!(r.value_history.len(), 6);
        assert_eq!(r.trade_number, 1);

        let config = BacktestConfig {
            cutoff_begin: 4,
            ..BacktestConfig::default()
        };
        let r = run_backtest(&strategy, &series, &config);
        assert_eq!(r.value_history.len(), 4);
        assert_eq!(r.trade_number, 1);
        assert_eq!(r.trades[0].entry_index, 6);
        assert_eq!(r.trades[0].exit_index, 7);
        // buy and hold from bar 4 (15) to bar 7 (20)
        assert!((r.buy_and_hold_pnl - 1000.0 / 3.0).abs() < 1e-9);

        let config = BacktestConfig {
            cutoff_begin: 20,
            ..BacktestConfig::default()
        };
        let r = run_backtest(&strategy, &series, &config);
        assert!(r.value_history.is_empty());
        assert_eq!(r.trade_number, 0);
    }

    #[test]
    fn flat_prices_never_break_out() {
        let strategy = StrategyKind::Keltner.build(&ParameterSet::new()).unwrap();
        let series = make_series(&[100.0; 40]);
        let r = run_backtest(&strategy, &series, &BacktestConfig::default());
        assert_eq!(r.trade_number, 0);
        assert_eq!(r.value_history.len(), 40);
        assert!(r.value_history.iter().all(|v| (v - 1000.0).abs() < 1e-9));
    }
}
