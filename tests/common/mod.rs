#![allow(dead_code)]

use barlab::domain::error::BarlabError;
pub use barlab::domain::ohlcv::PriceBar;
use barlab::domain::params::ParameterSet;
pub use barlab::domain::series::PriceSeries;
use barlab::domain::strategy::{Strategy, StrategyKind};
use barlab::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

pub struct MockDataPort {
    pub data: HashMap<String, PriceSeries>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_series(mut self, symbol: &str, series: PriceSeries) -> Self {
        self.data.insert(symbol.to_string(), series);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_series(&self, symbol: &str) -> Result<PriceSeries, BarlabError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(BarlabError::Data {
                reason: reason.clone(),
            });
        }
        self.data.get(symbol).cloned().ok_or_else(|| BarlabError::Data {
            reason: format!("unknown symbol {symbol}"),
        })
    }
}

pub fn day(offset: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2020, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + chrono::Duration::days(offset as i64)
}

/// `num` evenly spaced points from `start` to `stop`, both included.
pub fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    if num == 1 {
        return vec![start];
    }
    let step = (stop - start) / (num - 1) as f64;
    let mut out: Vec<f64> = (0..num).map(|i| start + i as f64 * step).collect();
    if let Some(last) = out.last_mut() {
        *last = stop;
    }
    out
}

/// Daily bars from 2020-01-01 whose opens follow the concatenated segments.
/// Each bar closes at the next bar's open, so `n` points give `n - 1` bars.
pub fn swings(segments: &[(f64, f64, usize)]) -> PriceSeries {
    let opens: Vec<f64> = segments
        .iter()
        .flat_map(|&(start, stop, num)| linspace(start, stop, num))
        .collect();
    let bars = opens
        .windows(2)
        .enumerate()
        .map(|(i, pair)| PriceBar {
            open_time: day(i),
            close_time: day(i + 1),
            open: pair[0],
            high: pair[0].max(pair[1]),
            low: pair[0].min(pair[1]),
            close: pair[1],
            volume: pair[0] * 10.0,
        })
        .collect();
    PriceSeries::new(bars)
}

/// Down, up, down: 149 bars.
pub fn three_swings() -> PriceSeries {
    swings(&[(110.0, 100.0, 50), (100.0, 110.0, 50), (110.0, 100.0, 50)])
}

/// Down, up: 99 bars ending on the rise.
pub fn two_swings() -> PriceSeries {
    swings(&[(110.0, 100.0, 50), (100.0, 110.0, 50)])
}

/// Down, up, down, up: 199 bars.
pub fn four_swings() -> PriceSeries {
    swings(&[
        (110.0, 100.0, 50),
        (100.0, 110.0, 50),
        (110.0, 100.0, 50),
        (100.0, 110.0, 50),
    ])
}

/// `a` followed by `b`, bar for bar.
pub fn concat(a: &PriceSeries, b: &PriceSeries) -> PriceSeries {
    let bars = a.bars().iter().chain(b.bars()).cloned().collect();
    PriceSeries::new(bars)
}

pub fn ma_cross(short: i64, long: i64) -> Strategy {
    StrategyKind::MaCross
        .build(
            &ParameterSet::new()
                .with("short_ma", short)
                .with("long_ma", long),
        )
        .unwrap()
}

/// Kline CSV with epoch-millisecond open and close times.
pub fn write_csv(path: &Path, series: &PriceSeries) {
    let mut out = String::from("Open Time,Open,High,Low,Close,Volume,Close Time\n");
    for bar in series.bars() {
        writeln!(
            out,
            "{},{},{},{},{},{},{}",
            bar.open_time.and_utc().timestamp_millis(),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume,
            bar.close_time.and_utc().timestamp_millis()
        )
        .unwrap();
    }
    std::fs::write(path, out).unwrap();
}
