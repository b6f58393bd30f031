//! Periodically rebalanced multi-asset portfolio.
//!
//! Between rebalances each asset's notional drifts with its own close; at the
//! first bar of every new calendar period the drifted values are summed and
//! redistributed according to the target weights. The momentum variant picks
//! its target at each rebalance: everything goes to the non-cash asset with
//! the best positive VAA momentum, or to the cash asset when none qualifies.

use super::error::BarlabError;
use super::indicator::{self, Column};
use super::series::PriceSeries;
use chrono::{Datelike, NaiveDateTime};
use std::str::FromStr;
use tracing::debug;

const WEIGHT_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Monthly,
    Weekly,
}

impl Frequency {
    /// Calendar period containing `time`: `(year, month)` or ISO `(year, week)`.
    pub fn period(self, time: NaiveDateTime) -> (i32, u32) {
        match self {
            Frequency::Monthly => (time.year(), time.month()),
            Frequency::Weekly => {
                let week = time.iso_week();
                (week.year(), week.week())
            }
        }
    }
}

impl FromStr for Frequency {
    type Err = BarlabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "M" => Ok(Frequency::Monthly),
            "W" => Ok(Frequency::Weekly),
            other => Err(BarlabError::UnsupportedFrequency {
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioResults {
    pub final_value: f64,
    pub value_history: Vec<f64>,
    pub date_history: Vec<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq)]
enum Allocation {
    /// Fractions summing to 1.
    Fixed(Vec<f64>),
    Momentum { cash_asset: usize },
}

#[derive(Debug, Clone)]
pub struct PortfolioRebalance {
    assets: Vec<PriceSeries>,
    frequency: Frequency,
    initial_value: f64,
    allocation: Allocation,
}

impl PortfolioRebalance {
    /// Fixed target weights in percent; they must sum to 100.
    pub fn new(
        assets: Vec<PriceSeries>,
        weights: &[f64],
        frequency: Frequency,
        initial_value: f64,
    ) -> Result<Self, BarlabError> {
        if assets.len() != weights.len() {
            return Err(BarlabError::WeightCountMismatch {
                assets: assets.len(),
                weights: weights.len(),
            });
        }
        if let Some((index, &weight)) = weights
            .iter()
            .enumerate()
            .find(|(_, w)| !(w.is_finite() && **w >= 0.0))
        {
            return Err(BarlabError::InvalidWeight { index, weight });
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 100.0).abs() > WEIGHT_TOLERANCE {
            return Err(BarlabError::WeightSum { sum });
        }
        validate_assets(&assets)?;
        Ok(PortfolioRebalance {
            assets,
            frequency,
            initial_value,
            allocation: Allocation::Fixed(weights.iter().map(|w| w / 100.0).collect()),
        })
    }

    /// Winner-take-all on momentum. `cash_asset` defaults to the last asset
    /// and is never scored.
    pub fn on_momentum(
        assets: Vec<PriceSeries>,
        frequency: Frequency,
        initial_value: f64,
        cash_asset: Option<usize>,
    ) -> Result<Self, BarlabError> {
        validate_assets(&assets)?;
        let cash_asset = cash_asset.unwrap_or(assets.len() - 1);
        if cash_asset >= assets.len() {
            return Err(BarlabError::ConfigInvalid {
                section: "portfolio".to_string(),
                key: "cash_asset".to_string(),
                reason: format!("index {cash_asset} out of range for {} assets", assets.len()),
            });
        }
        let assets = assets
            .iter()
            .enumerate()
            .map(|(i, asset)| {
                if i == cash_asset {
                    asset.clone()
                } else {
                    indicator::augment(asset, &[Column::VaaMomentum])
                }
            })
            .collect();
        Ok(PortfolioRebalance {
            assets,
            frequency,
            initial_value,
            allocation: Allocation::Momentum { cash_asset },
        })
    }

    pub fn run(&self) -> PortfolioResults {
        let reference = self.assets[0].bars();
        let first = &reference[0];

        let mut weights = self.initial_weights();
        let mut values: Vec<f64> = weights.iter().map(|w| w * self.initial_value).collect();
        let mut ticks = self.closes_at(0);
        let mut period = self.frequency.period(first.open_time);
        let mut value_history = vec![self.initial_value];
        let mut date_history = vec![first.open_time];

        for (i, bar) in reference.iter().enumerate() {
            let current = self.frequency.period(bar.open_time);
            if current == period {
                continue;
            }
            let closes = self.closes_at(i);
            let total: f64 = values
                .iter()
                .zip(ticks.iter().zip(&closes))
                .map(|(value, (tick, close))| value * (1.0 + (close - tick) / tick))
                .sum();
            if let Allocation::Momentum { cash_asset } = self.allocation {
                weights = self.momentum_weights(i, cash_asset);
            }
            values = weights.iter().map(|w| w * total).collect();
            ticks = closes;
            period = current;
            debug!(time = %bar.open_time, total, "rebalanced");
            value_history.push(total);
            date_history.push(bar.open_time);
        }

        PortfolioResults {
            final_value: value_history.last().copied().unwrap_or(self.initial_value),
            value_history,
            date_history,
        }
    }

    fn initial_weights(&self) -> Vec<f64> {
        match &self.allocation {
            Allocation::Fixed(weights) => weights.clone(),
            Allocation::Momentum { .. } => {
                let n = self.assets.len();
                vec![1.0 / n as f64; n]
            }
        }
    }

    fn closes_at(&self, index: usize) -> Vec<f64> {
        self.assets.iter().map(|a| a.bars()[index].close).collect()
    }

    fn momentum_weights(&self, index: usize, cash_asset: usize) -> Vec<f64> {
        let mut best = cash_asset;
        let mut best_score = 0.0;
        for (i, asset) in self.assets.iter().enumerate() {
            if i == cash_asset {
                continue;
            }
            let score = asset
                .column(&Column::VaaMomentum)
                .and_then(|v| v.get(index))
                .copied()
                .unwrap_or(f64::NAN);
            if score.is_finite() && score > best_score {
                best = i;
                best_score = score;
            }
        }
        let mut weights = vec![0.0; self.assets.len()];
        weights[best] = 1.0;
        weights
    }
}

fn validate_assets(assets: &[PriceSeries]) -> Result<(), BarlabError> {
    let Some(first) = assets.first() else {
        return Err(BarlabError::EmptyAsset { index: 0 });
    };
    for (index, asset) in assets.iter().enumerate() {
        if asset.is_empty() {
            return Err(BarlabError::EmptyAsset { index });
        }
        if asset.len() < first.len() {
            return Err(BarlabError::AssetLengthMismatch {
                index,
                bars: asset.len(),
                minimum: first.len(),
            });
        }
    }
    Ok(())
}
