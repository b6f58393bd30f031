//! Grid-search training with a held-out test window.
//!
//! Every combination of the grid is backtested on the training window
//! `[0, cutoff)`; the combination with the highest excess return over
//! buy-and-hold is then re-run on the test window `[cutoff, len)`. Each trial
//! augments its own copy of the series, so trials share nothing and can run
//! in parallel (`parallel` feature) without changing the selection.

use super::backtest::{run_backtest, BacktestConfig};
use super::error::BarlabError;
use super::metrics::BacktestResults;
use super::params::{ParameterGrid, ParameterSet};
use super::series::PriceSeries;
use super::strategy::{Strategy, StrategyKind};
use tracing::{debug, info};

/// Where the training window ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Split {
    /// Fraction of the bars used for training.
    Fraction(f64),
    /// Number of trailing bars held out for testing.
    TestSize(usize),
}

impl Split {
    pub fn cutoff(&self, len: usize) -> usize {
        match *self {
            Split::Fraction(f) => ((len as f64 * f).floor().max(0.0) as usize).min(len),
            Split::TestSize(n) => len.saturating_sub(n),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub parameters: ParameterSet,
    pub strategy: Strategy,
    pub cutoff: usize,
    pub train_results: BacktestResults,
    pub test_results: BacktestResults,
    pub train_slice: PriceSeries,
    pub test_slice: PriceSeries,
}

/// Search `grid` for the best `kind` parameters on `series`.
///
/// Returns `Ok(None)` when the grid has no combinations. Fails only when a
/// combination does not build a valid strategy, before anything is run.
pub fn train(
    series: &PriceSeries,
    kind: StrategyKind,
    grid: &ParameterGrid,
    split: Split,
    initial_cash: f64,
) -> Result<Option<TrainingOutcome>, BarlabError> {
    let combinations = grid.combinations();
    if combinations.is_empty() {
        debug!(strategy = %kind, "empty parameter grid, nothing to train");
        return Ok(None);
    }
    let strategies = combinations
        .iter()
        .map(|params| kind.build(params))
        .collect::<Result<Vec<_>, _>>()?;

    let cutoff = split.cutoff(series.len());
    info!(
        strategy = %kind,
        combinations = strategies.len(),
        bars = series.len(),
        cutoff,
        "training"
    );

    let train_config = BacktestConfig {
        initial_cash,
        cutoff_begin: 0,
        cutoff_end: Some(cutoff),
    };
    let mut results = evaluate(&strategies, series, &train_config);

    let mut best = 0;
    for (i, result) in results.iter().enumerate() {
        debug!(params = %combinations[i], excess = result.excess, "trial finished");
        if beats(result.excess, results[best].excess) {
            best = i;
        }
    }

    let strategy = strategies[best].clone();
    let test_config = BacktestConfig {
        initial_cash,
        cutoff_begin: cutoff,
        cutoff_end: None,
    };
    let test_results = run_backtest(&strategy, series, &test_config);
    info!(
        params = %combinations[best],
        train_excess = results[best].excess,
        test_excess = test_results.excess,
        "selected parameters"
    );

    let train_results = results.swap_remove(best);

    Ok(Some(TrainingOutcome {
        parameters: combinations[best].clone(),
        strategy,
        cutoff,
        train_results,
        test_results,
        train_slice: series.slice(0, cutoff),
        test_slice: series.slice(cutoff, series.len()),
    }))
}

/// Strictly greater wins; `NaN` never wins but is always beaten.
fn beats(candidate: f64, incumbent: f64) -> bool {
    candidate > incumbent || (incumbent.is_nan() && !candidate.is_nan())
}

#[cfg(not(feature = "parallel"))]
fn evaluate(
    strategies: &[Strategy],
    series: &PriceSeries,
    config: &BacktestConfig,
) -> Vec<BacktestResults> {
    strategies
        .iter()
        .map(|strategy| run_backtest(strategy, series, config))
        .collect()
}

#[cfg(feature = "parallel")]
fn evaluate(
    strategies: &[Strategy],
    series: &PriceSeries,
    config: &BacktestConfig,
) -> Vec<BacktestResults> {
    use rayon::prelude::*;

    strategies
        .par_iter()
        .map(|strategy| run_backtest(strategy, series, config))
        .collect()
}
