//! Moving averages over plain value slices.
//!
//! All functions return one value per input. Windowed averages are `NaN` until
//! the window is full, and any `NaN` inside a window poisons that output.
//! The exponential average is recursive (`alpha = 2 / (span + 1)`) and is
//! seeded with the first finite input, so it has no warm-up gap.

/// Simple moving average.
pub fn sma(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 {
        return vec![f64::NAN; values.len()];
    }
    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                f64::NAN
            } else {
                values[i + 1 - window..=i].iter().sum::<f64>() / window as f64
            }
        })
        .collect()
}

/// Recursive exponential moving average with smoothing `alpha`.
pub fn ewm(values: &[f64], alpha: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let mut state: Option<f64> = None;
    for &x in values {
        if x.is_nan() {
            out.push(f64::NAN);
            continue;
        }
        let next = match state {
            None => x,
            Some(prev) => alpha * x + (1.0 - alpha) * prev,
        };
        state = Some(next);
        out.push(next);
    }
    out
}

/// Exponential moving average with `alpha = 2 / (span + 1)`.
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    if span == 0 {
        return vec![f64::NAN; values.len()];
    }
    ewm(values, 2.0 / (span as f64 + 1.0))
}

/// Linearly weighted moving average, newest value weighted `window`.
pub fn wma(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 {
        return vec![f64::NAN; values.len()];
    }
    let denom = (window * (window + 1)) as f64 / 2.0;
    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                return f64::NAN;
            }
            values[i + 1 - window..=i]
                .iter()
                .enumerate()
                .map(|(k, v)| v * (k + 1) as f64)
                .sum::<f64>()
                / denom
        })
        .collect()
}

fn half(window: usize) -> usize {
    (window / 2).max(1)
}

fn root(window: usize) -> usize {
    ((window as f64).sqrt().floor() as usize).max(1)
}

/// Hull moving average: `WMA(2 * WMA(n/2) - WMA(n), sqrt(n))`.
pub fn hma(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 {
        return vec![f64::NAN; values.len()];
    }
    let fast = wma(values, half(window));
    let slow = wma(values, window);
    let raw: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| 2.0 * f - s).collect();
    wma(&raw, root(window))
}

/// Exponential Hull average: the Hull construction over EMAs.
pub fn ehma(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 {
        return vec![f64::NAN; values.len()];
    }
    let fast = ema(values, half(window));
    let slow = ema(values, window);
    let raw: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| 2.0 * f - s).collect();
    ema(&raw, root(window))
}

/// Volume-weighted moving average: `sum(close * volume) / sum(volume)`.
pub fn vwma(closes: &[f64], volumes: &[f64], window: usize) -> Vec<f64> {
    let n = closes.len().min(volumes.len());
    if window == 0 {
        return vec![f64::NAN; closes.len()];
    }
    let mut out: Vec<f64> = (0..n)
        .map(|i| {
            if i + 1 < window {
                return f64::NAN;
            }
            let range = i + 1 - window..=i;
            let weighted: f64 = range.clone().map(|k| closes[k] * volumes[k]).sum();
            let volume: f64 = volumes[range].iter().sum();
            if volume == 0.0 {
                f64::NAN
            } else {
                weighted / volume
            }
        })
        .collect();
    out.resize(closes.len(), f64::NAN);
    out
}
