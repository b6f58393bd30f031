//! Volatility bands: ATR, Keltner channel, Bollinger bands.
//!
//! ATR uses Wilder smoothing seeded with the mean of the first n true ranges,
//! so the first (n-1) values are `NaN`. Keltner bands sit at `EMA(span) ± 2·ATR`.
//! Bollinger bands use the population standard deviation (divide by N).

use super::moving_average::{ema, sma};
use crate::domain::ohlcv::PriceBar;

const KELTNER_MULTIPLIER: f64 = 2.0;

pub fn true_ranges(bars: &[PriceBar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                bar.high - bar.low
            } else {
                bar.true_range(bars[i - 1].close)
            }
        })
        .collect()
}

pub fn atr(bars: &[PriceBar], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; bars.len()];
    if period == 0 || bars.len() < period {
        return out;
    }
    let tr = true_ranges(bars);
    let n = period as f64;
    let mut value = tr[..period].iter().sum::<f64>() / n;
    out[period - 1] = value;
    for i in period..bars.len() {
        value = (value * (n - 1.0) + tr[i]) / n;
        out[i] = value;
    }
    out
}

/// Keltner channel as `(high, low)`.
pub fn keltner(bars: &[PriceBar], span: usize, atr_window: usize) -> (Vec<f64>, Vec<f64>) {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let mid = ema(&closes, span);
    let range = atr(bars, atr_window);
    mid.iter()
        .zip(&range)
        .map(|(m, r)| (m + KELTNER_MULTIPLIER * r, m - KELTNER_MULTIPLIER * r))
        .unzip()
}

/// Bollinger bands as `(high, mid, low)`.
pub fn bollinger(closes: &[f64], window: usize, deviations: f64) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let mid = sma(closes, window);
    let mut high = vec![f64::NAN; closes.len()];
    let mut low = vec![f64::NAN; closes.len()];
    for (i, &m) in mid.iter().enumerate() {
        if m.is_nan() {
            continue;
        }
        let slice = &closes[i + 1 - window..=i];
        let variance = slice.iter().map(|c| (c - m) * (c - m)).sum::<f64>() / window as f64;
        let band = deviations * variance.sqrt();
        high[i] = m + band;
        low[i] = m - band;
    }
    (high, mid, low)
}
