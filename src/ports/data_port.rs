//! Price data port trait.

use crate::domain::error::BarlabError;
use crate::domain::series::PriceSeries;
use tracing::warn;

pub trait DataPort {
    /// Bars for `symbol`, sorted ascending by open time.
    fn fetch_series(&self, symbol: &str) -> Result<PriceSeries, BarlabError>;

    /// Like [`DataPort::fetch_series`], but an acquisition failure yields an
    /// empty series, which every engine treats as a valid no-trade input.
    fn fetch_or_empty(&self, symbol: &str) -> PriceSeries {
        match self.fetch_series(symbol) {
            Ok(series) => series,
            Err(e) => {
                warn!(symbol, error = %e, "price data unavailable, using an empty series");
                PriceSeries::empty()
            }
        }
    }
}
