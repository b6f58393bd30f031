//! Weighted momentum score used by the momentum rebalancer.

const LAGS: [(usize, f64); 4] = [(1, 12.0), (3, 4.0), (6, 2.0), (12, 1.0)];

/// `12·r1 + 4·r3 + 2·r6 + r12` where `r_n = close / close[n bars ago] - 1`.
/// `NaN` until 12 bars of history exist.
pub fn vaa_momentum(closes: &[f64]) -> Vec<f64> {
    (0..closes.len())
        .map(|i| {
            LAGS.iter()
                .map(|&(lag, weight)| match i.checked_sub(lag) {
                    Some(j) => weight * (closes[i] / closes[j] - 1.0),
                    None => f64::NAN,
                })
                .sum()
        })
        .collect()
}
