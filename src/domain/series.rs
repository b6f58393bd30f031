//! Ordered price series with derived indicator columns.
//!
//! A [`PriceSeries`] owns its bars plus any number of derived columns keyed by
//! [`Column`]. Every column holds exactly one value per bar; `NaN` marks bars
//! with insufficient history. Strategies only ever see a [`SeriesView`], a
//! borrowed prefix of the series ending at the bar being decided on.

use crate::domain::indicator::Column;
use crate::domain::ohlcv::PriceBar;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    bars: Vec<PriceBar>,
    columns: HashMap<Column, Vec<f64>>,
}

impl PriceSeries {
    pub fn new(bars: Vec<PriceBar>) -> Self {
        Self {
            bars,
            columns: HashMap::new(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn bar(&self, index: usize) -> Option<&PriceBar> {
        self.bars.get(index)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn column(&self, column: &Column) -> Option<&[f64]> {
        self.columns.get(column).map(|v| v.as_slice())
    }

    pub fn has_column(&self, column: &Column) -> bool {
        self.columns.contains_key(column)
    }

    /// Attach a derived column. Values are padded with `NaN` or cut so the
    /// column always matches the bar count.
    pub fn with_column(mut self, column: Column, mut values: Vec<f64>) -> Self {
        values.resize(self.bars.len(), f64::NAN);
        self.columns.insert(column, values);
        self
    }

    /// First `len` bars (all of them when `len` exceeds the series length).
    pub fn truncated(&self, len: usize) -> Self {
        self.slice(0, len)
    }

    /// Bars in `[begin, end)`, clamped to the series bounds, columns included.
    pub fn slice(&self, begin: usize, end: usize) -> Self {
        let end = end.min(self.bars.len());
        let begin = begin.min(end);
        Self {
            bars: self.bars[begin..end].to_vec(),
            columns: self
                .columns
                .iter()
                .map(|(k, v)| (k.clone(), v[begin..end].to_vec()))
                .collect(),
        }
    }

    /// Prefix view over the first `len` bars.
    pub fn view(&self, len: usize) -> SeriesView<'_> {
        SeriesView {
            series: self,
            len: len.min(self.bars.len()),
        }
    }
}

/// Values a strategy can read from a view.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    Open,
    High,
    Low,
    Close,
    Volume,
    Column(Column),
}

impl From<Column> for Operand {
    fn from(column: Column) -> Self {
        Operand::Column(column)
    }
}

/// Read-only prefix of a [`PriceSeries`]. `back == 0` is the most recent bar.
#[derive(Debug, Clone, Copy)]
pub struct SeriesView<'a> {
    series: &'a PriceSeries,
    len: usize,
}

impl<'a> SeriesView<'a> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn index(&self, back: usize) -> Option<usize> {
        self.len.checked_sub(back + 1)
    }

    pub fn bar(&self, back: usize) -> Option<&'a PriceBar> {
        self.index(back).and_then(|i| self.series.bars.get(i))
    }

    /// Value of `operand` `back` bars before the last one, `NaN` when out of
    /// range or when the column was never computed.
    pub fn value(&self, operand: &Operand, back: usize) -> f64 {
        let Some(i) = self.index(back) else {
            return f64::NAN;
        };
        match operand {
            Operand::Column(column) => self
                .series
                .columns
                .get(column)
                .and_then(|v| v.get(i))
                .copied()
                .unwrap_or(f64::NAN),
            price => match self.series.bars.get(i) {
                Some(bar) => match price {
                    Operand::Open => bar.open,
                    Operand::High => bar.high,
                    Operand::Low => bar.low,
                    Operand::Close => bar.close,
                    Operand::Volume => bar.volume,
                    Operand::Column(_) => f64::NAN,
                },
                None => f64::NAN,
            },
        }
    }

    pub fn close(&self, back: usize) -> f64 {
        self.value(&Operand::Close, back)
    }

    pub fn column(&self, column: &Column, back: usize) -> f64 {
        match self.index(back) {
            Some(i) => self
                .series
                .columns
                .get(column)
                .and_then(|v| v.get(i))
                .copied()
                .unwrap_or(f64::NAN),
            None => f64::NAN,
        }
    }
}
