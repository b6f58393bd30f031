//! Walk-forward validation over expanding training windows.
//!
//! The series is cut into `k + 1` equal segments (the last boundary is the
//! final bar). For each boundary from the third onward the trainer runs on
//! everything before it, holding out exactly one segment for testing, so
//! every step is tested on bars none of its trials has seen.

use super::error::BarlabError;
use super::metrics::BacktestResults;
use super::params::{ParameterGrid, ParameterSet};
use super::series::PriceSeries;
use super::strategy::StrategyKind;
use super::trainer::{train, Split};
use tracing::info;

/// Boundaries skipped so the first step has two segments of history.
const SKIPPED_BOUNDARIES: usize = 2;

#[derive(Debug, Clone)]
pub struct WalkForwardStep {
    /// End of the training + test window.
    pub boundary: usize,
    pub test_start: usize,
    pub test_slice: PriceSeries,
    /// `None` when the grid is empty.
    pub parameters: Option<ParameterSet>,
    pub test_results: Option<BacktestResults>,
}

/// `[0, size, 2·size, .., (k-1)·size, len-1]` with `size = len / (k + 1)`.
pub fn segment_boundaries(len: usize, segments: usize) -> Vec<usize> {
    let size = len / (segments + 1);
    let mut boundaries: Vec<usize> = (0..segments).map(|i| i * size).collect();
    boundaries.push(len.saturating_sub(1));
    boundaries
}

/// Run `k - 1` train/test steps. `segments < 2` is rejected, as is a series
/// shorter than `segments + 1` bars, whose segments would be empty.
pub fn walk_forward(
    series: &PriceSeries,
    kind: StrategyKind,
    grid: &ParameterGrid,
    segments: usize,
    initial_cash: f64,
) -> Result<Vec<WalkForwardStep>, BarlabError> {
    if segments < 2 {
        return Err(BarlabError::InvalidSegments { segments });
    }
    let size = series.len() / (segments + 1);
    if size == 0 {
        return Err(BarlabError::SegmentsTooShort {
            bars: series.len(),
            segments,
        });
    }
    let boundaries = segment_boundaries(series.len(), segments);
    info!(
        strategy = %kind,
        bars = series.len(),
        segments,
        segment_size = size,
        "walk-forward"
    );

    let mut steps = Vec::with_capacity(segments - 1);
    for &boundary in &boundaries[SKIPPED_BOUNDARIES..] {
        let window = series.truncated(boundary);
        let test_start = boundary.saturating_sub(size);
        let outcome = train(&window, kind, grid, Split::TestSize(size), initial_cash)?;
        let (parameters, test_results) = match outcome {
            Some(o) => (Some(o.parameters), Some(o.test_results)),
            None => (None, None),
        };
        info!(
            boundary,
            test_start,
            params = ?parameters.as_ref().map(|p| p.to_string()),
            excess = ?test_results.as_ref().map(|r| r.excess),
            "walk-forward step"
        );
        steps.push(WalkForwardStep {
            boundary,
            test_start,
            test_slice: window.slice(test_start, boundary),
            parameters,
            test_results,
        });
    }
    Ok(steps)
}
