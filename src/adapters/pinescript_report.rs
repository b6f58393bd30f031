//! Pine Script export of backtest trades.
//!
//! Produces a TradingView indicator that labels every entry below the bar and
//! every exit above it. Bars are addressed by their close time in epoch
//! milliseconds.

use crate::domain::error::BarlabError;
use crate::domain::metrics::BacktestResults;
use crate::domain::strategy::Strategy;
use crate::ports::report_port::ReportPort;
use chrono::NaiveDateTime;
use std::fs;
use tracing::info;

const HEADER: &str = r#"//@version=5
indicator("Manual Trades", overlay=true)

var int[] entryDates = array.new_int()
var int[] exitDates = array.new_int()
"#;

const LABELS: &str = r#"for i = 0 to array.size(exitDates) - 1
    label.new(x=array.get(entryDates, i), xloc=xloc.bar_time, y=close, yloc=yloc.belowbar, color=color.green, textcolor=color.white, style=label.style_label_up)
    label.new(x=array.get(exitDates, i), xloc=xloc.bar_time, y=close, yloc=yloc.abovebar, color=color.red, textcolor=color.white, style=label.style_label_down)
"#;

pub struct PineScriptReport;

impl PineScriptReport {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PineScriptReport {
    fn default() -> Self {
        Self::new()
    }
}

pub fn epoch_millis(time: NaiveDateTime) -> i64 {
    time.and_utc().timestamp_millis()
}

/// Render the indicator source for the given entry and exit timestamps.
pub fn render(title: &str, entry_dates: &[i64], exit_dates: &[i64]) -> String {
    let mut out = String::new();
    if !title.is_empty() {
        out.push_str(&format!("// {}\n", title));
    }
    out.push_str(HEADER);
    out.push('\n');
    for ts in entry_dates {
        out.push_str(&format!("array.push(entryDates, {})\n", ts));
    }
    for ts in exit_dates {
        out.push_str(&format!("array.push(exitDates, {})\n", ts));
    }
    out.push('\n');
    out.push_str(LABELS);
    out
}

impl ReportPort for PineScriptReport {
    fn write(
        &self,
        results: &BacktestResults,
        strategy: &Strategy,
        output_path: &str,
    ) -> Result<(), BarlabError> {
        let entries: Vec<i64> = results.entry_dates().into_iter().map(epoch_millis).collect();
        let exits: Vec<i64> = results.exit_dates().into_iter().map(epoch_millis).collect();
        let script = render(&strategy.to_string(), &entries, &exits);
        fs::write(output_path, script)?;
        info!(path = output_path, trades = results.trade_number, "wrote pine script");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::Trade;
    use crate::domain::strategy::StrategyKind;
    use chrono::DateTime;

    fn at(ms: i64) -> NaiveDateTime {
        DateTime::from_timestamp_millis(ms).unwrap().naive_utc()
    }

    #[test]
    fn render_lists_entries_then_exits() {
        let script = render(
            "",
            &[1513555199999, 1517788799999],
            &[1519603199999, 1520812799999],
        );
        let expected = r#"//@version=5
indicator("Manual Trades", overlay=true)

var int[] entryDates = array.new_int()
var int[] exitDates = array.new_int()

array.push(entryDates, 1513555199999)
array.push(entryDates, 1517788799999)
array.push(exitDates, 1519603199999)
array.push(exitDates, 1520812799999)

for i = 0 to array.size(exitDates) - 1
    label.new(x=array.get(entryDates, i), xloc=xloc.bar_time, y=close, yloc=yloc.belowbar, color=color.green, textcolor=color.white, style=label.style_label_up)
    label.new(x=array.get(exitDates, i), xloc=xloc.bar_time, y=close, yloc=yloc.abovebar, color=color.red, textcolor=color.white, style=label.style_label_down)
"#;
        assert_eq!(script, expected);
    }

    #[test]
    fn render_titles_the_script() {
        let script = render("ma_cross(short_ma=3)", &[], &[]);
        assert!(script.starts_with("// ma_cross(short_ma=3)\n//@version=5"));
        assert!(!script.contains("array.push"));
    }

    #[test]
    fn epoch_millis_of_close_time() {
        assert_eq!(epoch_millis(at(1513555199999)), 1513555199999);
    }

    #[test]
    fn write_exports_trade_close_times() {
        let trade = Trade {
            entry_time: at(1513555199999),
            entry_price: 100.0,
            entry_index: 3,
            exit_time: at(1519603199999),
            exit_price: 110.0,
            exit_index: 9,
            variation: 0.1,
            profit: 100.0,
        };
        let results = BacktestResults::compute(
            1000.0,
            1100.0,
            50.0,
            vec![trade],
            vec![1000.0, 1100.0],
            vec![1000.0, 1050.0],
        );
        let strategy = StrategyKind::HeikinAshi.build(&Default::default()).unwrap();

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("trades.pine");
        PineScriptReport::new()
            .write(&results, &strategy, path.to_str().unwrap())
            .unwrap();

        let script = fs::read_to_string(&path).unwrap();
        assert!(script.contains("array.push(entryDates, 1513555199999)"));
        assert!(script.contains("array.push(exitDates, 1519603199999)"));
        assert!(script.starts_with(&format!("// {}\n", strategy)));
    }

    #[test]
    fn write_to_missing_directory_fails() {
        let results = BacktestResults::compute(1000.0, 1000.0, 0.0, vec![], vec![], vec![]);
        let strategy = StrategyKind::HeikinAshi.build(&Default::default()).unwrap();
        let err = PineScriptReport::new()
            .write(&results, &strategy, "/nonexistent/dir/trades.pine")
            .unwrap_err();
        assert!(matches!(err, BarlabError::Io(_)));
    }
}
