//! Report generation port trait.

use crate::domain::error::BarlabError;
use crate::domain::metrics::BacktestResults;
use crate::domain::strategy::Strategy;

/// Port for exporting the trades of a backtest.
pub trait ReportPort {
    fn write(
        &self,
        results: &BacktestResults,
        strategy: &Strategy,
        output_path: &str,
    ) -> Result<(), BarlabError>;
}
