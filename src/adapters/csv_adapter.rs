//! CSV file price data adapter.
//!
//! Files hold one bar per row with the exchange kline header
//! `Open Time, Open, High, Low, Close, Volume, Close Time`. Columns are found
//! by header name, so extra columns are ignored and order does not matter.
//! `Close Time` may be omitted, in which case each bar closes when the next
//! one opens.

use crate::domain::error::BarlabError;
use crate::domain::ohlcv::PriceBar;
use crate::domain::series::PriceSeries;
use crate::ports::data_port::DataPort;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

const OPEN_TIME: &str = "Open Time";
const CLOSE_TIME: &str = "Close Time";
const PRICE_COLUMNS: [&str; 5] = ["Open", "High", "Low", "Close", "Volume"];

pub struct CsvDataAdapter {
    base_path: PathBuf,
}

impl CsvDataAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// `BTCUSDT` reads `<base>/BTCUSDT.csv`; a symbol that already names a
    /// `.csv` file is taken relative to the base path as is.
    fn csv_path(&self, symbol: &str) -> PathBuf {
        if symbol.ends_with(".csv") {
            self.base_path.join(symbol)
        } else {
            self.base_path.join(format!("{}.csv", symbol))
        }
    }
}

impl DataPort for CsvDataAdapter {
    fn fetch_series(&self, symbol: &str) -> Result<PriceSeries, BarlabError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path).map_err(|e| BarlabError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        let bars = parse_bars(&content)?;
        debug!(symbol, path = %path.display(), bars = bars.len(), "loaded price data");
        Ok(PriceSeries::new(bars))
    }
}

/// Parse CSV text into bars sorted by open time.
pub fn parse_bars(content: &str) -> Result<Vec<PriceBar>, BarlabError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = rdr
        .headers()
        .map_err(|e| BarlabError::Data {
            reason: format!("CSV header error: {}", e),
        })?
        .clone();
    let index_of = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let open_time_idx = index_of(OPEN_TIME).ok_or_else(|| missing(OPEN_TIME))?;
    let close_time_idx = index_of(CLOSE_TIME);
    let mut price_idx = [0usize; 5];
    for (slot, name) in price_idx.iter_mut().zip(PRICE_COLUMNS) {
        *slot = index_of(name).ok_or_else(|| missing(name))?;
    }

    let mut rows = Vec::new();
    for (line, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| BarlabError::Data {
            reason: format!("CSV parse error: {}", e),
        })?;
        let field = |idx: usize| record.get(idx).unwrap_or("");

        let open_time = parse_time(field(open_time_idx)).ok_or_else(|| BarlabError::Data {
            reason: format!("row {}: invalid open time '{}'", line + 1, field(open_time_idx)),
        })?;
        let close_time = match close_time_idx {
            Some(idx) => Some(parse_time(field(idx)).ok_or_else(|| BarlabError::Data {
                reason: format!("row {}: invalid close time '{}'", line + 1, field(idx)),
            })?),
            None => None,
        };

        let mut values = [0.0f64; 5];
        for ((value, &idx), name) in values.iter_mut().zip(&price_idx).zip(PRICE_COLUMNS) {
            *value = field(idx).parse().map_err(|e| BarlabError::Data {
                reason: format!("row {}: invalid {} value: {}", line + 1, name, e),
            })?;
        }
        let [open, high, low, close, volume] = values;
        rows.push((open_time, close_time, open, high, low, close, volume));
    }

    rows.sort_by_key(|r| r.0);

    let open_times: Vec<NaiveDateTime> = rows.iter().map(|r| r.0).collect();
    let bars = rows
        .into_iter()
        .enumerate()
        .map(|(i, (open_time, close_time, open, high, low, close, volume))| PriceBar {
            open_time,
            close_time: close_time.unwrap_or_else(|| implied_close_time(&open_times, i)),
            open,
            high,
            low,
            close,
            volume,
        })
        .collect();
    Ok(bars)
}

fn missing(column: &str) -> BarlabError {
    BarlabError::Data {
        reason: format!("missing {} column", column),
    }
}

/// Next bar's open, or the last bar's open plus the previous interval.
fn implied_close_time(open_times: &[NaiveDateTime], i: usize) -> NaiveDateTime {
    match open_times.get(i + 1) {
        Some(&next) => next,
        None if i > 0 => open_times[i] + (open_times[i] - open_times[i - 1]),
        None => open_times[i],
    }
}

/// RFC 3339, `%Y-%m-%d %H:%M:%S`, `%Y-%m-%d` or epoch milliseconds.
pub fn parse_time(value: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    if let Ok(d) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }
    value
        .parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .map(|dt| dt.naive_utc())
}
