//! Volume-driven indicators: OBV, anchored OBV, Volume Zone Oscillator.

use super::moving_average::ema;
use crate::domain::ohlcv::PriceBar;
use chrono::Datelike;

fn direction(bars: &[PriceBar], i: usize) -> f64 {
    if i == 0 {
        return 0.0;
    }
    let change = bars[i].close - bars[i - 1].close;
    if change > 0.0 {
        1.0
    } else if change < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// On-balance volume, starting at 0 on the first bar.
pub fn obv(bars: &[PriceBar]) -> Vec<f64> {
    let mut total = 0.0;
    (0..bars.len())
        .map(|i| {
            total += direction(bars, i) * bars[i].volume;
            total
        })
        .collect()
}

/// OBV that restarts from 0 every `months` calendar months, counted from the
/// first bar's month.
pub fn anchored_obv(bars: &[PriceBar], months: u32) -> Vec<f64> {
    let Some(first) = bars.first() else {
        return Vec::new();
    };
    let months = months.max(1) as i32;
    let month_index = |bar: &PriceBar| bar.open_time.year() * 12 + bar.open_time.month0() as i32;
    let origin = month_index(first);

    let mut anchor = 0;
    let mut total = 0.0;
    (0..bars.len())
        .map(|i| {
            let period = (month_index(&bars[i]) - origin) / months;
            if period != anchor {
                anchor = period;
                total = 0.0;
            } else {
                total += direction(bars, i) * bars[i].volume;
            }
            total
        })
        .collect()
}

/// Volume Zone Oscillator: `100 * EMA(sign(dclose) * volume) / EMA(volume)`.
pub fn vzo(bars: &[PriceBar], span: usize) -> Vec<f64> {
    let signed: Vec<f64> = (0..bars.len())
        .map(|i| direction(bars, i) * bars[i].volume)
        .collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
    let up = ema(&signed, span);
    let total = ema(&volumes, span);
    up.iter()
        .zip(&total)
        .map(|(u, t)| if *t == 0.0 { f64::NAN } else { 100.0 * u / t })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_bars(rows: &[(&str, f64, f64)]) -> Vec<PriceBar> {
        rows.iter()
            .map(|&(date, close, volume)| {
                let t = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap();
                PriceBar {
                    open_time: t,
                    close_time: t,
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume,
                }
            })
            .collect()
    }

    #[test]
    fn obv_accumulates_signed_volume() {
        let bars = make_bars(&[
            ("2024-01-01", 10.0, 100.0),
            ("2024-01-02", 11.0, 50.0),
            ("2024-01-03", 11.0, 70.0),
            ("2024-01-04", 9.0, 30.0),
        ]);
        assert_eq!(obv(&bars), vec![0.0, 50.0, 50.0, 20.0]);
    }

    #[test]
    fn obv_empty() {
        assert!(obv(&[]).is_empty());
    }

    #[test]
    fn anchored_obv_resets_each_period() {
        let bars = make_bars(&[
            ("2024-01-10", 10.0, 100.0),
            ("2024-01-20", 11.0, 50.0),
            ("2024-02-10", 12.0, 40.0),
            ("2024-03-10", 13.0, 30.0),
            ("2024-03-20", 12.0, 10.0),
        ]);
        let out = anchored_obv(&bars, 2);
        assert_eq!(out, vec![0.0, 50.0, 90.0, 0.0, -10.0]);
    }

    #[test]
    fn anchored_obv_single_month_period() {
        let bars = make_bars(&[
            ("2024-01-30", 10.0, 1.0),
            ("2024-01-31", 11.0, 5.0),
            ("2024-02-01", 12.0, 7.0),
        ]);
        assert_eq!(anchored_obv(&bars, 1), vec![0.0, 5.0, 0.0]);
    }

    #[test]
    fn vzo_all_up_moves_approach_100() {
        let bars = make_bars(&[
            ("2024-01-01", 10.0, 10.0),
            ("2024-01-02", 11.0, 10.0),
            ("2024-01-03", 12.0, 10.0),
        ]);
        let out = vzo(&bars, 1);
        assert!(out[0].abs() < f64::EPSILON);
        assert!((out[2] - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn vzo_zero_volume_is_nan() {
        let bars = make_bars(&[("2024-01-01", 10.0, 0.0), ("2024-01-02", 11.0, 0.0)]);
        assert!(vzo(&bars, 3).iter().all(|v| v.is_nan()));
    }
}
