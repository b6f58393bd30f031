//! Synthetic candle constructions: Heikin-Ashi and Renko bricks.

use super::volatility::atr;
use crate::domain::ohlcv::PriceBar;

/// Heikin-Ashi `(open, close)` per bar.
///
/// `ha_close = (o + h + l + c) / 4`; the first `ha_open` is `(o + c) / 2`,
/// later ones average the previous Heikin-Ashi open and close.
pub fn heikin_ashi(bars: &[PriceBar]) -> (Vec<f64>, Vec<f64>) {
    let mut opens = Vec::with_capacity(bars.len());
    let mut closes = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        let ha_open = if i == 0 {
            (bar.open + bar.close) / 2.0
        } else {
            (opens[i - 1] + closes[i - 1]) / 2.0
        };
        opens.push(ha_open);
        closes.push(bar.mean_price());
    }
    (opens, closes)
}

/// Direction of the latest Renko brick: `1.0` up, `-1.0` down, `0.0` before
/// the first brick. Brick size is `factor * ATR(atr_window)`.
pub fn renko_direction(bars: &[PriceBar], atr_window: usize, factor: f64) -> Vec<f64> {
    let ranges = atr(bars, atr_window);
    let mut out = Vec::with_capacity(bars.len());
    let mut base = bars.first().map(|b| b.close).unwrap_or(0.0);
    let mut direction = 0.0;
    for (bar, range) in bars.iter().zip(ranges) {
        let brick = factor * range;
        if brick.is_finite() && brick > 0.0 {
            let bricks = ((bar.close - base) / brick).trunc();
            if bricks >= 1.0 {
                direction = 1.0;
                base += bricks * brick;
            } else if bricks <= -1.0 {
                direction = -1.0;
                base += bricks * brick;
            }
        }
        out.push(direction);
    }
    out
}
