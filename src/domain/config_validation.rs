//! Configuration validation and typed access.
//!
//! Every section is validated before any simulation runs. The typed getters
//! below are what the CLI uses to turn a validated config into domain values.

use crate::domain::backtest::BacktestConfig;
use crate::domain::error::BarlabError;
use crate::domain::params::{parse_axis, ParamValue, ParameterGrid, ParameterSet};
use crate::domain::portfolio::Frequency;
use crate::domain::strategy::StrategyKind;
use crate::domain::trainer::Split;
use crate::ports::config_port::ConfigPort;
use std::str::FromStr;

pub const DEFAULT_INITIAL_CASH: f64 = 1000.0;
pub const DEFAULT_SPLIT: f64 = 0.8;
pub const DEFAULT_SEGMENTS: usize = 5;

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> BarlabError {
    BarlabError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn required(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, BarlabError> {
    match config.get_string(section, key) {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(BarlabError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

/// Parse an optional key; a present but malformed value is an error.
fn optional<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, BarlabError> {
    match config.get_string(section, key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(section, key, format!("cannot parse '{}'", raw.trim()))),
        _ => Ok(None),
    }
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), BarlabError> {
    required(config, "data", "path")?;
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), BarlabError> {
    validate_data_config(config)?;
    backtest_config(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), BarlabError> {
    let kind = strategy_kind(config)?;
    kind.build(&strategy_parameters(config)?)?;
    Ok(())
}

pub fn validate_training_config(config: &dyn ConfigPort) -> Result<(), BarlabError> {
    let kind = strategy_kind(config)?;
    let grid = parameter_grid(config, kind)?;
    for combination in grid.combinations() {
        kind.build(&combination)?;
    }
    split(config)?;
    Ok(())
}

pub fn validate_walk_forward_config(config: &dyn ConfigPort) -> Result<(), BarlabError> {
    let kind = strategy_kind(config)?;
    parameter_grid(config, kind)?;
    segments(config)?;
    Ok(())
}

pub fn validate_portfolio_config(config: &dyn ConfigPort) -> Result<(), BarlabError> {
    portfolio_settings(config)?;
    Ok(())
}

/// `[backtest] initial_cash, cutoff_begin, cutoff_end`.
pub fn backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, BarlabError> {
    let initial_cash = initial_cash(config)?;
    let cutoff_begin: usize = optional(config, "backtest", "cutoff_begin")?.unwrap_or(0);
    let cutoff_end: Option<usize> = optional(config, "backtest", "cutoff_end")?;
    if let Some(end) = cutoff_end {
        if end <= cutoff_begin {
            return Err(invalid(
                "backtest",
                "cutoff_end",
                "cutoff_end must be greater than cutoff_begin",
            ));
        }
    }
    Ok(BacktestConfig {
        initial_cash,
        cutoff_begin,
        cutoff_end,
    })
}

pub fn initial_cash(config: &dyn ConfigPort) -> Result<f64, BarlabError> {
    let value: f64 = optional(config, "backtest", "initial_cash")?.unwrap_or(DEFAULT_INITIAL_CASH);
    if !(value.is_finite() && value > 0.0) {
        return Err(invalid(
            "backtest",
            "initial_cash",
            "initial_cash must be positive",
        ));
    }
    Ok(value)
}

pub fn strategy_kind(config: &dyn ConfigPort) -> Result<StrategyKind, BarlabError> {
    required(config, "strategy", "kind")?.parse()
}

/// Every `[strategy]` key except `kind`, as typed parameter values.
pub fn strategy_parameters(config: &dyn ConfigPort) -> Result<ParameterSet, BarlabError> {
    let mut params = ParameterSet::new();
    for key in config.section_keys("strategy") {
        if key == "kind" {
            continue;
        }
        if let Some(raw) = config.get_string("strategy", &key) {
            let value: ParamValue = match raw.parse() {
                Ok(v) => v,
                Err(never) => match never {},
            };
            params.insert(&key, value);
        }
    }
    Ok(params)
}

/// `[grid]` axes, ordered like the strategy's parameter list.
pub fn parameter_grid(
    config: &dyn ConfigPort,
    kind: StrategyKind,
) -> Result<ParameterGrid, BarlabError> {
    let names = kind.parameter_names();
    let keys = config.section_keys("grid");
    if let Some(unknown) = keys.iter().find(|k| !names.contains(&k.as_str())) {
        return Err(BarlabError::UnknownParameter {
            strategy: kind.name().to_string(),
            key: unknown.clone(),
        });
    }
    let mut grid = ParameterGrid::new();
    for name in names {
        if let Some(raw) = config.get_string("grid", name) {
            grid = grid.with_axis(name, parse_axis(name, &raw)?);
        }
    }
    Ok(grid)
}

/// `[train] split` or `[train] test_size`, never both. Defaults to an 80% split.
pub fn split(config: &dyn ConfigPort) -> Result<Split, BarlabError> {
    let fraction: Option<f64> = optional(config, "train", "split")?;
    let test_size: Option<usize> = optional(config, "train", "test_size")?;
    match (fraction, test_size) {
        (Some(_), Some(_)) => Err(invalid(
            "train",
            "test_size",
            "set either split or test_size, not both",
        )),
        (Some(f), None) if !(f > 0.0 && f < 1.0) => {
            Err(invalid("train", "split", "split must be between 0 and 1"))
        }
        (Some(f), None) => Ok(Split::Fraction(f)),
        (None, Some(n)) => Ok(Split::TestSize(n)),
        (None, None) => Ok(Split::Fraction(DEFAULT_SPLIT)),
    }
}

/// `[walk_forward] k`, at least 2.
pub fn segments(config: &dyn ConfigPort) -> Result<usize, BarlabError> {
    let k: usize = optional(config, "walk_forward", "k")?.unwrap_or(DEFAULT_SEGMENTS);
    if k < 2 {
        return Err(BarlabError::InvalidSegments { segments: k });
    }
    Ok(k)
}

/// Comma-separated percentages.
pub fn parse_weights(raw: &str) -> Result<Vec<f64>, BarlabError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s.parse::<f64>() {
            Ok(w) if w.is_finite() && w >= 0.0 => Ok(w),
            _ => Err(invalid("portfolio", "weights", format!("bad weight '{s}'"))),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSettings {
    pub assets: Vec<String>,
    /// Empty for the momentum variant.
    pub weights: Vec<f64>,
    pub frequency: Frequency,
    pub initial_value: f64,
    pub momentum: bool,
    pub cash_asset: Option<usize>,
}

/// `[portfolio] assets, weights, frequency, initial_value, momentum, cash_asset`.
pub fn portfolio_settings(config: &dyn ConfigPort) -> Result<PortfolioSettings, BarlabError> {
    let assets: Vec<String> = required(config, "portfolio", "assets")?
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    let momentum = config.get_bool("portfolio", "momentum", false);
    let weights = if momentum {
        Vec::new()
    } else {
        parse_weights(&required(config, "portfolio", "weights")?)?
    };
    let frequency: Frequency = config
        .get_string("portfolio", "frequency")
        .unwrap_or_else(|| "M".to_string())
        .parse()?;
    let initial_value: f64 =
        optional(config, "portfolio", "initial_value")?.unwrap_or(DEFAULT_INITIAL_CASH);
    if !(initial_value.is_finite() && initial_value > 0.0) {
        return Err(invalid(
            "portfolio",
            "initial_value",
            "initial_value must be positive",
        ));
    }
    let cash_asset: Option<usize> = optional(config, "portfolio", "cash_asset")?;
    if let Some(i) = cash_asset {
        if i >= assets.len() {
            return Err(invalid(
                "portfolio",
                "cash_asset",
                format!("index {i} out of range for {} assets", assets.len()),
            ));
        }
    }
    if !momentum && assets.len() != weights.len() {
        return Err(BarlabError::WeightCountMismatch {
            assets: assets.len(),
            weights: weights.len(),
        });
    }
    Ok(PortfolioSettings {
        assets,
        weights,
        frequency,
        initial_value,
        momentum,
        cash_asset,
    })
}
