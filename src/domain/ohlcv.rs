//! Price bar representation.

use chrono::NaiveDateTime;

/// One OHLCV bar. Decisions on a bar are taken at `close_time`.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub open_time: NaiveDateTime,
    pub close_time: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    /// (open + high + low + close) / 4
    pub fn mean_price(&self) -> f64 {
        (self.open + self.high + self.low + self.close) / 4.0
    }
}
