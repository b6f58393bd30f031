//! Indicator provider.
//!
//! This module provides:
//! - `MaKind`: the moving-average families selectable by strategies
//! - `Column`: indicator identity + parameters (serves as HashMap key)
//! - `augment`: derives missing columns onto a copy of a price series
//!
//! Every column is causal (value at bar i only depends on bars 0..=i), so
//! computing on the whole series and reading a prefix is the same as
//! computing on the prefix.

pub mod candles;
pub mod momentum;
pub mod moving_average;
pub mod rsi;
pub mod volatility;
pub mod volume;

use crate::domain::error::BarlabError;
use crate::domain::ohlcv::PriceBar;
use crate::domain::series::PriceSeries;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaKind {
    Ema,
    Sma,
    Wma,
    Hma,
    Vwma,
    Ehma,
}

impl MaKind {
    /// Average `values`; `volumes` is only read by VWMA.
    pub fn apply(self, values: &[f64], volumes: &[f64], window: usize) -> Vec<f64> {
        match self {
            MaKind::Ema => moving_average::ema(values, window),
            MaKind::Sma => moving_average::sma(values, window),
            MaKind::Wma => moving_average::wma(values, window),
            MaKind::Hma => moving_average::hma(values, window),
            MaKind::Vwma => moving_average::vwma(values, volumes, window),
            MaKind::Ehma => moving_average::ehma(values, window),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MaKind::Ema => "ema",
            MaKind::Sma => "sma",
            MaKind::Wma => "wma",
            MaKind::Hma => "hma",
            MaKind::Vwma => "vwma",
            MaKind::Ehma => "ehma",
        }
    }
}

impl FromStr for MaKind {
    type Err = BarlabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ema" => Ok(MaKind::Ema),
            "sma" => Ok(MaKind::Sma),
            "wma" => Ok(MaKind::Wma),
            "hma" => Ok(MaKind::Hma),
            "vwma" => Ok(MaKind::Vwma),
            "ehma" => Ok(MaKind::Ehma),
            other => Err(BarlabError::InvalidParameter {
                key: "ma_type".into(),
                reason: format!("unknown moving average type '{other}'"),
            }),
        }
    }
}

impl fmt::Display for MaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Column {
    Ma {
        kind: MaKind,
        window: usize,
    },
    MaOnRsi {
        kind: MaKind,
        window: usize,
        rsi_window: usize,
    },
    HmaOnObv(usize),
    Rsi(usize),
    Vzo(usize),
    Atr(usize),
    KeltnerHigh {
        span: usize,
        atr_window: usize,
    },
    KeltnerLow {
        span: usize,
        atr_window: usize,
    },
    BollingerHigh {
        window: usize,
        dev_x100: u32,
    },
    BollingerMid(usize),
    BollingerLow {
        window: usize,
        dev_x100: u32,
    },
    Obv,
    AnchoredObv {
        months: u32,
    },
    HeikinAshiOpen,
    HeikinAshiClose,
    RenkoDirection {
        atr_window: usize,
        factor_x100: u32,
    },
    VaaMomentum,
}

/// Store a float parameter as a hashable hundredths value.
pub fn to_x100(value: f64) -> u32 {
    (value * 100.0).round().max(0.0) as u32
}

fn from_x100(value: u32) -> f64 {
    value as f64 / 100.0
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Column::Ma { kind, window } => write!(f, "{}_{}", kind, window),
            Column::MaOnRsi {
                kind,
                window,
                rsi_window,
            } => write!(f, "{}_{}_on_RSI_{}", kind, window, rsi_window),
            Column::HmaOnObv(window) => write!(f, "hma_{}_on_OBV", window),
            Column::Rsi(window) => write!(f, "RSI_{}", window),
            Column::Vzo(span) => write!(f, "VZO_{}", span),
            Column::Atr(window) => write!(f, "ATR_{}", window),
            Column::KeltnerHigh { span, atr_window } => {
                write!(f, "keltner_high_{}_{}", span, atr_window)
            }
            Column::KeltnerLow { span, atr_window } => {
                write!(f, "keltner_low_{}_{}", span, atr_window)
            }
            Column::BollingerHigh { window, dev_x100 } => {
                write!(f, "BB_hband_{}_{}", window, from_x100(*dev_x100))
            }
            Column::BollingerMid(window) => write!(f, "BB_mavg_{}", window),
            Column::BollingerLow { window, dev_x100 } => {
                write!(f, "BB_lband_{}_{}", window, from_x100(*dev_x100))
            }
            Column::Obv => write!(f, "OBV"),
            Column::AnchoredObv { months } => write!(f, "Anchored_OBV_{}M", months),
            Column::HeikinAshiOpen => write!(f, "ha_Open"),
            Column::HeikinAshiClose => write!(f, "ha_Close"),
            Column::RenkoDirection {
                atr_window,
                factor_x100,
            } => write!(f, "Direction_{}_{}", atr_window, from_x100(*factor_x100)),
            Column::VaaMomentum => write!(f, "VAA_momentum"),
        }
    }
}

/// Values of `column` for every bar.
pub fn compute(bars: &[PriceBar], column: &Column) -> Vec<f64> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
    match column {
        Column::Ma { kind, window } => kind.apply(&closes, &volumes, *window),
        Column::MaOnRsi {
            kind,
            window,
            rsi_window,
        } => kind.apply(&rsi::rsi(&closes, *rsi_window), &volumes, *window),
        Column::HmaOnObv(window) => moving_average::hma(&volume::obv(bars), *window),
        Column::Rsi(window) => rsi::rsi(&closes, *window),
        Column::Vzo(span) => volume::vzo(bars, *span),
        Column::Atr(window) => volatility::atr(bars, *window),
        Column::KeltnerHigh { span, atr_window } => volatility::keltner(bars, *span, *atr_window).0,
        Column::KeltnerLow { span, atr_window } => volatility::keltner(bars, *span, *atr_window).1,
        Column::BollingerHigh { window, dev_x100 } => {
            volatility::bollinger(&closes, *window, from_x100(*dev_x100)).0
        }
        Column::BollingerMid(window) => moving_average::sma(&closes, *window),
        Column::BollingerLow { window, dev_x100 } => {
            volatility::bollinger(&closes, *window, from_x100(*dev_x100)).2
        }
        Column::Obv => volume::obv(bars),
        Column::AnchoredObv { months } => volume::anchored_obv(bars, *months),
        Column::HeikinAshiOpen => candles::heikin_ashi(bars).0,
        Column::HeikinAshiClose => candles::heikin_ashi(bars).1,
        Column::RenkoDirection {
            atr_window,
            factor_x100,
        } => candles::renko_direction(bars, *atr_window, from_x100(*factor_x100)),
        Column::VaaMomentum => momentum::vaa_momentum(&closes),
    }
}

/// Return a copy of `series` carrying every requested column. Rows are never
/// reordered or dropped; columns already present are left untouched.
pub fn augment(series: &PriceSeries, columns: &[Column]) -> PriceSeries {
    let mut out = series.clone();
    for column in columns {
        if out.has_column(column) {
            continue;
        }
        let values = compute(out.bars(), column);
        debug!(column = %column, bars = values.len(), "computed indicator column");
        out = out.with_column(column.clone(), values);
    }
    out
}
