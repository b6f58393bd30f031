//! Trading strategies.
//!
//! A strategy is a pair of predicates over a [`SeriesView`]: `is_enter` is
//! asked while flat, `is_exit` while holding. Each variant carries its typed
//! parameters and declares the indicator columns it reads; the only mutable
//! state is the trailing stop kept in [`StrategyState`], owned by the caller
//! and reset after every exit.
//!
//! Predicates never fail: short prefixes and `NaN` warm-up values make every
//! comparison false.

use crate::domain::error::BarlabError;
use crate::domain::indicator::{self, to_x100, Column, MaKind};
use crate::domain::params::{ParamValue, ParameterSet};
use crate::domain::series::{Operand, PriceSeries, SeriesView};
use std::fmt;
use std::str::FromStr;

/// Bars a trailing-stop strategy needs before it will act.
const STOP_WARMUP: usize = 30;
/// Bars needed for a two-bar crossover with one bar of slack.
const CROSS_WARMUP: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    MaCross,
    MaCrossPriceAbove,
    ThreeMa,
    ThreeMaRetest,
    MaAtr,
    MaOnRsiCross,
    VzoRsi,
    VzoRsiLetGrey,
    Keltner,
    Bollinger,
    BollingerBands,
    Renko,
    RenkoHmaCross,
    HeikinAshi,
    HeikinAshiHmaCross,
    ObvHmaCross,
    ObvMaCross,
    AnchoredObv,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 18] = [
        StrategyKind::MaCross,
        StrategyKind::MaCrossPriceAbove,
        StrategyKind::ThreeMa,
        StrategyKind::ThreeMaRetest,
        StrategyKind::MaAtr,
        StrategyKind::MaOnRsiCross,
        StrategyKind::VzoRsi,
        StrategyKind::VzoRsiLetGrey,
        StrategyKind::Keltner,
        StrategyKind::Bollinger,
        StrategyKind::BollingerBands,
        StrategyKind::Renko,
        StrategyKind::RenkoHmaCross,
        StrategyKind::HeikinAshi,
        StrategyKind::HeikinAshiHmaCross,
        StrategyKind::ObvHmaCross,
        StrategyKind::ObvMaCross,
        StrategyKind::AnchoredObv,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::MaCross => "ma_cross",
            StrategyKind::MaCrossPriceAbove => "ma_cross_price_above",
            StrategyKind::ThreeMa => "three_ma",
            StrategyKind::ThreeMaRetest => "three_ma_retest",
            StrategyKind::MaAtr => "ma_atr",
            StrategyKind::MaOnRsiCross => "ma_on_rsi_cross",
            StrategyKind::VzoRsi => "vzo_rsi",
            StrategyKind::VzoRsiLetGrey => "vzo_rsi_let_grey",
            StrategyKind::Keltner => "keltner",
            StrategyKind::Bollinger => "bollinger",
            StrategyKind::BollingerBands => "bollinger_bands",
            StrategyKind::Renko => "renko",
            StrategyKind::RenkoHmaCross => "renko_hma_cross",
            StrategyKind::HeikinAshi => "heikin_ashi",
            StrategyKind::HeikinAshiHmaCross => "heikin_ashi_hma_cross",
            StrategyKind::ObvHmaCross => "obv_hma_cross",
            StrategyKind::ObvMaCross => "obv_ma_cross",
            StrategyKind::AnchoredObv => "anchored_obv",
        }
    }

    /// Parameter keys accepted by [`StrategyKind::build`].
    pub fn parameter_names(self) -> &'static [&'static str] {
        match self {
            StrategyKind::MaCross | StrategyKind::MaCrossPriceAbove | StrategyKind::MaAtr => {
                &["short_ma", "long_ma", "ma_type"]
            }
            StrategyKind::ThreeMa => &["short_ma", "mid_ma", "long_ma", "ma_type"],
            StrategyKind::ThreeMaRetest => {
                &["short_ma", "mid_ma", "long_ma", "distance_retest", "ma_type"]
            }
            StrategyKind::MaOnRsiCross => &["short_ma", "long_ma", "ma_type", "rsi_window"],
            StrategyKind::VzoRsi | StrategyKind::VzoRsiLetGrey => {
                &["span", "grey_zone_rsi", "grey_zone_vzo"]
            }
            StrategyKind::Keltner => &["span", "window_atr"],
            StrategyKind::Bollinger | StrategyKind::BollingerBands => &["window", "window_dev"],
            StrategyKind::Renko => &["span_atr", "brick_size_factor"],
            StrategyKind::RenkoHmaCross => {
                &["short_ma", "long_ma", "span_atr", "brick_size_factor"]
            }
            StrategyKind::HeikinAshi => &[],
            StrategyKind::HeikinAshiHmaCross | StrategyKind::ObvHmaCross => {
                &["short_ma", "long_ma"]
            }
            StrategyKind::ObvMaCross => &["long_ma"],
            StrategyKind::AnchoredObv => &["reset_months"],
        }
    }

    /// Build a strategy from named parameters. Missing keys take their
    /// defaults; unknown keys are rejected.
    pub fn build(self, params: &ParameterSet) -> Result<Strategy, BarlabError> {
        let allowed = self.parameter_names();
        if let Some(key) = params.keys().find(|k| !allowed.contains(k)) {
            return Err(BarlabError::UnknownParameter {
                strategy: self.name().to_string(),
                key: key.to_string(),
            });
        }
        let p = Params(params);

        let strategy = match self {
            StrategyKind::MaCross => Strategy::MaCross(p.pair(5, 10)?),
            StrategyKind::MaCrossPriceAbove => Strategy::MaCrossPriceAbove(p.pair(4, 6)?),
            StrategyKind::MaAtr => Strategy::MaAtr(p.pair(5, 10)?),
            StrategyKind::ThreeMa => Strategy::ThreeMa(p.triple()?),
            StrategyKind::ThreeMaRetest => Strategy::ThreeMaRetest {
                averages: p.triple()?,
                distance: p.float("distance_retest", 5.0)?,
            },
            StrategyKind::MaOnRsiCross => Strategy::MaOnRsiCross {
                averages: p.pair(5, 10)?,
                rsi_window: p.window("rsi_window", 14)?,
            },
            StrategyKind::VzoRsi => Strategy::VzoRsi(p.zones()?),
            StrategyKind::VzoRsiLetGrey => Strategy::VzoRsiLetGrey(p.zones()?),
            StrategyKind::Keltner => Strategy::Keltner(KeltnerParams {
                span: p.window("span", 20)?,
                atr_window: p.window("window_atr", 10)?,
            }),
            StrategyKind::Bollinger => Strategy::Bollinger(p.bands()?),
            StrategyKind::BollingerBands => Strategy::BollingerBands(p.bands()?),
            StrategyKind::Renko => Strategy::Renko(p.renko()?),
            StrategyKind::RenkoHmaCross => Strategy::RenkoHmaCross {
                averages: p.hma_pair()?,
                renko: p.renko()?,
            },
            StrategyKind::HeikinAshi => Strategy::HeikinAshi,
            StrategyKind::HeikinAshiHmaCross => Strategy::HeikinAshiHmaCross(p.hma_pair()?),
            StrategyKind::ObvHmaCross => Strategy::ObvHmaCross(p.hma_pair()?),
            StrategyKind::ObvMaCross => Strategy::ObvMaCross {
                long: p.window("long_ma", 10)?,
            },
            StrategyKind::AnchoredObv => Strategy::AnchoredObv {
                months: p.window("reset_months", 3)? as u32,
            },
        };
        Ok(strategy)
    }
}

impl FromStr for StrategyKind {
    type Err = BarlabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        StrategyKind::ALL
            .into_iter()
            .find(|k| k.name() == wanted)
            .ok_or(BarlabError::UnknownStrategy { name: wanted })
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

struct Params<'a>(&'a ParameterSet);

impl Params<'_> {
    fn window(&self, key: &str, default: usize) -> Result<usize, BarlabError> {
        let value = match self.0.get(key) {
            Some(v) => v.as_usize(key)?,
            None => default,
        };
        if value == 0 {
            return Err(BarlabError::InvalidParameter {
                key: key.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(value)
    }

    fn float(&self, key: &str, default: f64) -> Result<f64, BarlabError> {
        match self.0.get(key) {
            Some(v) => v.as_f64(key),
            None => Ok(default),
        }
    }

    /// A float that must be finite and at least `min` (exclusive when `strict`).
    fn bounded(&self, key: &str, default: f64, min: f64, strict: bool) -> Result<f64, BarlabError> {
        let value = self.float(key, default)?;
        let in_range = if strict { value > min } else { value >= min };
        if !(value.is_finite() && in_range) {
            let bound = if strict { "above" } else { "at least" };
            return Err(BarlabError::InvalidParameter {
                key: key.to_string(),
                reason: format!("must be finite and {bound} {min}, got {value}"),
            });
        }
        Ok(value)
    }

    fn ma_kind(&self) -> Result<MaKind, BarlabError> {
        match self.0.get("ma_type") {
            Some(ParamValue::Text(s)) => s.parse(),
            Some(other) => other.as_text().parse(),
            None => Ok(MaKind::Ema),
        }
    }

    fn pair(&self, short: usize, long: usize) -> Result<MaPair, BarlabError> {
        Ok(MaPair {
            kind: self.ma_kind()?,
            short: self.window("short_ma", short)?,
            long: self.window("long_ma", long)?,
        })
    }

    fn hma_pair(&self) -> Result<MaPair, BarlabError> {
        Ok(MaPair {
            kind: MaKind::Hma,
            short: self.window("short_ma", 5)?,
            long: self.window("long_ma", 10)?,
        })
    }

    fn triple(&self) -> Result<MaTriple, BarlabError> {
        Ok(MaTriple {
            kind: self.ma_kind()?,
            short: self.window("short_ma", 5)?,
            mid: self.window("mid_ma", 10)?,
            long: self.window("long_ma", 15)?,
        })
    }

    fn zones(&self) -> Result<ZoneParams, BarlabError> {
        Ok(ZoneParams {
            span: self.window("span", 14)?,
            grey_zone_rsi: self.float("grey_zone_rsi", 5.0)?,
            grey_zone_vzo: self.float("grey_zone_vzo", 5.0)?,
        })
    }

    fn bands(&self) -> Result<BandParams, BarlabError> {
        Ok(BandParams {
            window: self.window("window", 20)?,
            deviations: self.bounded("window_dev", 2.0, 0.0, false)?,
        })
    }

    fn renko(&self) -> Result<RenkoParams, BarlabError> {
        Ok(RenkoParams {
            atr_window: self.window("span_atr", 14)?,
            brick_factor: self.bounded("brick_size_factor", 1.0, 0.0, true)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaPair {
    pub kind: MaKind,
    pub short: usize,
    pub long: usize,
}

impl MaPair {
    pub fn short_column(&self) -> Column {
        Column::Ma {
            kind: self.kind,
            window: self.short,
        }
    }

    pub fn long_column(&self) -> Column {
        Column::Ma {
            kind: self.kind,
            window: self.long,
        }
    }

    fn on_rsi(&self, rsi_window: usize) -> (Column, Column) {
        let average = |window| Column::MaOnRsi {
            kind: self.kind,
            window,
            rsi_window,
        };
        (average(self.short), average(self.long))
    }

    fn on_obv(&self) -> (Column, Column) {
        (Column::HmaOnObv(self.short), Column::HmaOnObv(self.long))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaTriple {
    pub kind: MaKind,
    pub short: usize,
    pub mid: usize,
    pub long: usize,
}

impl MaTriple {
    fn column(&self, window: usize) -> Column {
        Column::Ma {
            kind: self.kind,
            window,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneParams {
    pub span: usize,
    pub grey_zone_rsi: f64,
    pub grey_zone_vzo: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeltnerParams {
    pub span: usize,
    pub atr_window: usize,
}

impl KeltnerParams {
    /// Channel used by `ma_atr` for its trailing stop.
    pub const DEFAULT: KeltnerParams = KeltnerParams {
        span: 20,
        atr_window: 10,
    };

    fn high(&self) -> Column {
        Column::KeltnerHigh {
            span: self.span,
            atr_window: self.atr_window,
        }
    }

    fn low(&self) -> Column {
        Column::KeltnerLow {
            span: self.span,
            atr_window: self.atr_window,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandParams {
    pub window: usize,
    pub deviations: f64,
}

impl BandParams {
    fn high(&self) -> Column {
        Column::BollingerHigh {
            window: self.window,
            dev_x100: to_x100(self.deviations),
        }
    }

    fn mid(&self) -> Column {
        Column::BollingerMid(self.window)
    }

    fn low(&self) -> Column {
        Column::BollingerLow {
            window: self.window,
            dev_x100: to_x100(self.deviations),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenkoParams {
    pub atr_window: usize,
    pub brick_factor: f64,
}

impl RenkoParams {
    fn direction(&self) -> Column {
        Column::RenkoDirection {
            atr_window: self.atr_window,
            factor_x100: to_x100(self.brick_factor),
        }
    }
}

/// Per-run mutable strategy state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StrategyState {
    pub trailing_stop: f64,
}

impl StrategyState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    MaCross(MaPair),
    MaCrossPriceAbove(MaPair),
    ThreeMa(MaTriple),
    ThreeMaRetest { averages: MaTriple, distance: f64 },
    MaAtr(MaPair),
    MaOnRsiCross { averages: MaPair, rsi_window: usize },
    VzoRsi(ZoneParams),
    VzoRsiLetGrey(ZoneParams),
    Keltner(KeltnerParams),
    Bollinger(BandParams),
    BollingerBands(BandParams),
    Renko(RenkoParams),
    RenkoHmaCross { averages: MaPair, renko: RenkoParams },
    HeikinAshi,
    HeikinAshiHmaCross(MaPair),
    ObvHmaCross(MaPair),
    ObvMaCross { long: usize },
    AnchoredObv { months: u32 },
}

fn col(c: Column) -> Operand {
    Operand::Column(c)
}

/// `a` moved strictly above `b` on the last bar.
fn crosses_above(view: &SeriesView<'_>, a: &Operand, b: &Operand) -> bool {
    view.value(a, 0) > view.value(b, 0) && view.value(a, 1) <= view.value(b, 1)
}

/// `a` moved strictly below `b` on the last bar.
fn crosses_below(view: &SeriesView<'_>, a: &Operand, b: &Operand) -> bool {
    view.value(a, 0) < view.value(b, 0) && view.value(a, 1) >= view.value(b, 1)
}

fn above(view: &SeriesView<'_>, a: &Operand, b: &Operand) -> bool {
    view.value(a, 0) > view.value(b, 0)
}

fn below(view: &SeriesView<'_>, a: &Operand, b: &Operand) -> bool {
    view.value(a, 0) < view.value(b, 0)
}

/// Raise the trailing stop to `level` and report whether the close broke it.
/// A `NaN` level leaves the stop unchanged.
fn trailing_stop_hit(view: &SeriesView<'_>, state: &mut StrategyState, level: &Column) -> bool {
    state.trailing_stop = state.trailing_stop.max(view.column(level, 0));
    if view.close(0) < state.trailing_stop {
        state.reset();
        return true;
    }
    false
}

impl Strategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::MaCross(_) => StrategyKind::MaCross,
            Strategy::MaCrossPriceAbove(_) => StrategyKind::MaCrossPriceAbove,
            Strategy::ThreeMa(_) => StrategyKind::ThreeMa,
            Strategy::ThreeMaRetest { .. } => StrategyKind::ThreeMaRetest,
            Strategy::MaAtr(_) => StrategyKind::MaAtr,
            Strategy::MaOnRsiCross { .. } => StrategyKind::MaOnRsiCross,
            Strategy::VzoRsi(_) => StrategyKind::VzoRsi,
            Strategy::VzoRsiLetGrey(_) => StrategyKind::VzoRsiLetGrey,
            Strategy::Keltner(_) => StrategyKind::Keltner,
            Strategy::Bollinger(_) => StrategyKind::Bollinger,
            Strategy::BollingerBands(_) => StrategyKind::BollingerBands,
            Strategy::Renko(_) => StrategyKind::Renko,
            Strategy::RenkoHmaCross { .. } => StrategyKind::RenkoHmaCross,
            Strategy::HeikinAshi => StrategyKind::HeikinAshi,
            Strategy::HeikinAshiHmaCross(_) => StrategyKind::HeikinAshiHmaCross,
            Strategy::ObvHmaCross(_) => StrategyKind::ObvHmaCross,
            Strategy::ObvMaCross { .. } => StrategyKind::ObvMaCross,
            Strategy::AnchoredObv { .. } => StrategyKind::AnchoredObv,
        }
    }

    /// Indicator columns read by the predicates.
    pub fn columns(&self) -> Vec<Column> {
        match self {
            Strategy::MaCross(p) | Strategy::MaCrossPriceAbove(p) => {
                vec![p.short_column(), p.long_column()]
            }
            Strategy::MaAtr(p) => vec![p.short_column(), p.long_column(), KeltnerParams::DEFAULT.low()],
            Strategy::ThreeMa(t) | Strategy::ThreeMaRetest { averages: t, .. } => {
                vec![t.column(t.short), t.column(t.mid), t.column(t.long)]
            }
            Strategy::MaOnRsiCross {
                averages,
                rsi_window,
            } => {
                let (short, long) = averages.on_rsi(*rsi_window);
                vec![short, long]
            }
            Strategy::VzoRsi(z) | Strategy::VzoRsiLetGrey(z) => {
                vec![Column::Rsi(z.span), Column::Vzo(z.span)]
            }
            Strategy::Keltner(k) => vec![k.high(), k.low()],
            Strategy::Bollinger(b) | Strategy::BollingerBands(b) => vec![b.high(), b.mid(), b.low()],
            Strategy::Renko(r) => vec![r.direction()],
            Strategy::RenkoHmaCross { averages, renko } => {
                vec![averages.short_column(), averages.long_column(), renko.direction()]
            }
            Strategy::HeikinAshi => vec![Column::HeikinAshiOpen, Column::HeikinAshiClose],
            Strategy::HeikinAshiHmaCross(p) => vec![
                Column::HeikinAshiOpen,
                Column::HeikinAshiClose,
                p.short_column(),
                p.long_column(),
            ],
            Strategy::ObvHmaCross(p) => {
                let (short, long) = p.on_obv();
                vec![short, long]
            }
            Strategy::ObvMaCross { long } => vec![Column::Obv, Column::HmaOnObv(*long)],
            Strategy::AnchoredObv { months } => vec![Column::AnchoredObv { months: *months }],
        }
    }

    /// Copy of `series` carrying every column this strategy reads.
    pub fn augment(&self, series: &PriceSeries) -> PriceSeries {
        indicator::augment(series, &self.columns())
    }

    /// The parameters this strategy was built from, defaults filled in.
    pub fn parameters(&self) -> ParameterSet {
        let pair = |p: &MaPair| {
            ParameterSet::new()
                .with("short_ma", p.short as i64)
                .with("long_ma", p.long as i64)
        };
        let triple = |t: &MaTriple| {
            ParameterSet::new()
                .with("short_ma", t.short as i64)
                .with("mid_ma", t.mid as i64)
                .with("long_ma", t.long as i64)
        };
        match self {
            Strategy::MaCross(p) | Strategy::MaCrossPriceAbove(p) | Strategy::MaAtr(p) => {
                pair(p).with("ma_type", p.kind.as_str())
            }
            Strategy::ThreeMa(t) => triple(t).with("ma_type", t.kind.as_str()),
            Strategy::ThreeMaRetest { averages, distance } => triple(averages)
                .with("distance_retest", *distance)
                .with("ma_type", averages.kind.as_str()),
            Strategy::MaOnRsiCross {
                averages,
                rsi_window,
            } => pair(averages)
                .with("ma_type", averages.kind.as_str())
                .with("rsi_window", *rsi_window as i64),
            Strategy::VzoRsi(z) | Strategy::VzoRsiLetGrey(z) => ParameterSet::new()
                .with("span", z.span as i64)
                .with("grey_zone_rsi", z.grey_zone_rsi)
                .with("grey_zone_vzo", z.grey_zone_vzo),
            Strategy::Keltner(k) => ParameterSet::new()
                .with("span", k.span as i64)
                .with("window_atr", k.atr_window as i64),
            Strategy::Bollinger(b) | Strategy::BollingerBands(b) => ParameterSet::new()
                .with("window", b.window as i64)
                .with("window_dev", b.deviations),
            Strategy::Renko(r) => ParameterSet::new()
                .with("span_atr", r.atr_window as i64)
                .with("brick_size_factor", r.brick_factor),
            Strategy::RenkoHmaCross { averages, renko } => pair(averages)
                .with("span_atr", renko.atr_window as i64)
                .with("brick_size_factor", renko.brick_factor),
            Strategy::HeikinAshi => ParameterSet::new(),
            Strategy::HeikinAshiHmaCross(p) | Strategy::ObvHmaCross(p) => pair(p),
            Strategy::ObvMaCross { long } => ParameterSet::new().with("long_ma", *long as i64),
            Strategy::AnchoredObv { months } => {
                ParameterSet::new().with("reset_months", *months as i64)
            }
        }
    }

    /// Whether to open a position at the last bar's close.
    pub fn is_enter(&self, view: &SeriesView<'_>, _state: &mut StrategyState) -> bool {
        let len = view.len();
        match self {
            Strategy::MaCross(p) => {
                len >= CROSS_WARMUP
                    && crosses_above(view, &col(p.short_column()), &col(p.long_column()))
            }
            Strategy::MaCrossPriceAbove(p) => {
                let long = col(p.long_column());
                len >= CROSS_WARMUP
                    && crosses_above(view, &col(p.short_column()), &long)
                    && above(view, &Operand::Close, &long)
            }
            Strategy::ThreeMa(t) => {
                len >= CROSS_WARMUP
                    && above(view, &col(t.column(t.short)), &col(t.column(t.mid)))
                    && above(view, &col(t.column(t.mid)), &col(t.column(t.long)))
            }
            Strategy::ThreeMaRetest { averages: t, distance } => {
                if len < CROSS_WARMUP {
                    return false;
                }
                let long = view.column(&t.column(t.long), 0);
                let retest = (view.close(0) - long) / long < *distance;
                retest && above(view, &col(t.column(t.mid)), &col(t.column(t.long)))
            }
            Strategy::MaAtr(p) => {
                len >= STOP_WARMUP
                    && crosses_above(view, &col(p.short_column()), &col(p.long_column()))
            }
            Strategy::MaOnRsiCross {
                averages,
                rsi_window,
            } => {
                let (short, long) = averages.on_rsi(*rsi_window);
                len >= CROSS_WARMUP && crosses_above(view, &col(short), &col(long))
            }
            Strategy::ObvHmaCross(p) => {
                let (short, long) = p.on_obv();
                len >= CROSS_WARMUP && crosses_above(view, &col(short), &col(long))
            }
            Strategy::VzoRsi(z) => Self::vzo_rsi_enter(view, z, 2.0),
            Strategy::VzoRsiLetGrey(z) => Self::vzo_rsi_enter(view, z, 1.0),
            Strategy::Keltner(k) => {
                len >= STOP_WARMUP && crosses_above(view, &Operand::Close, &col(k.high()))
            }
            Strategy::Bollinger(b) => {
                len >= STOP_WARMUP && crosses_above(view, &Operand::Close, &col(b.high()))
            }
            Strategy::BollingerBands(b) => {
                len >= STOP_WARMUP
                    && [b.low(), b.mid(), b.high()]
                        .into_iter()
                        .any(|band| crosses_above(view, &Operand::Close, &col(band)))
            }
            Strategy::Renko(r) => view.column(&r.direction(), 0) == 1.0,
            Strategy::RenkoHmaCross { averages, renko } => {
                len >= CROSS_WARMUP
                    && view.column(&renko.direction(), 0) == 1.0
                    && crosses_above(
                        view,
                        &col(averages.short_column()),
                        &col(averages.long_column()),
                    )
            }
            Strategy::HeikinAshi => green_candle(view),
            Strategy::HeikinAshiHmaCross(p) => {
                green_candle(view)
                    && above(view, &col(p.short_column()), &col(p.long_column()))
            }
            Strategy::ObvMaCross { long } => {
                len >= CROSS_WARMUP
                    && crosses_above(view, &col(Column::Obv), &col(Column::HmaOnObv(*long)))
            }
            Strategy::AnchoredObv { months } => {
                let anchored = Column::AnchoredObv { months: *months };
                len >= CROSS_WARMUP
                    && view.column(&anchored, 0) > 0.0
                    && view.column(&anchored, 1) <= 0.0
            }
        }
    }

    /// Whether to close the open position at the last bar's close.
    pub fn is_exit(&self, view: &SeriesView<'_>, state: &mut StrategyState) -> bool {
        let len = view.len();
        match self {
            Strategy::MaCross(p) => {
                len >= CROSS_WARMUP
                    && crosses_below(view, &col(p.short_column()), &col(p.long_column()))
            }
            Strategy::MaCrossPriceAbove(p) => {
                len >= CROSS_WARMUP && below(view, &Operand::Close, &col(p.long_column()))
            }
            Strategy::ThreeMa(t) => {
                len >= CROSS_WARMUP
                    && crosses_below(view, &col(t.column(t.short)), &col(t.column(t.long)))
            }
            Strategy::ThreeMaRetest { averages: t, .. } => {
                len >= CROSS_WARMUP
                    && (crosses_below(view, &Operand::Close, &col(t.column(t.short)))
                        || below(view, &col(t.column(t.mid)), &col(t.column(t.long))))
            }
            Strategy::MaAtr(_) => {
                len >= STOP_WARMUP && trailing_stop_hit(view, state, &KeltnerParams::DEFAULT.low())
            }
            Strategy::MaOnRsiCross {
                averages,
                rsi_window,
            } => {
                let (short, long) = averages.on_rsi(*rsi_window);
                len >= CROSS_WARMUP && below(view, &col(short), &col(long))
            }
            Strategy::ObvHmaCross(p) => {
                let (short, long) = p.on_obv();
                len >= CROSS_WARMUP && below(view, &col(short), &col(long))
            }
            Strategy::VzoRsi(z) => len >= CROSS_WARMUP && !Self::vzo_rsi_enter(view, z, 2.0),
            Strategy::VzoRsiLetGrey(z) => {
                len >= CROSS_WARMUP
                    && view.column(&Column::Vzo(z.span), 0) < -z.grey_zone_vzo
                    && view.column(&Column::Rsi(z.span), 0) < 50.0 - z.grey_zone_rsi
            }
            Strategy::Keltner(k) => len >= STOP_WARMUP && trailing_stop_hit(view, state, &k.low()),
            Strategy::Bollinger(b) => {
                len >= STOP_WARMUP && trailing_stop_hit(view, state, &b.low())
            }
            Strategy::BollingerBands(b) => {
                len >= STOP_WARMUP
                    && [b.high(), b.mid(), b.low()]
                        .into_iter()
                        .any(|band| crosses_below(view, &Operand::Close, &col(band)))
            }
            Strategy::Renko(r) => view.column(&r.direction(), 0) == -1.0,
            Strategy::RenkoHmaCross { averages, .. } => {
                len >= CROSS_WARMUP
                    && below(view, &col(averages.short_column()), &col(averages.long_column()))
            }
            Strategy::HeikinAshi => red_candle(view),
            Strategy::HeikinAshiHmaCross(p) => {
                red_candle(view) && below(view, &col(p.short_column()), &col(p.long_column()))
            }
            Strategy::ObvMaCross { long } => {
                len >= CROSS_WARMUP
                    && below(view, &col(Column::Obv), &col(Column::HmaOnObv(*long)))
            }
            Strategy::AnchoredObv { months } => {
                len >= CROSS_WARMUP && view.column(&Column::AnchoredObv { months: *months }, 0) < 0.0
            }
        }
    }

    fn vzo_rsi_enter(view: &SeriesView<'_>, z: &ZoneParams, vzo_multiple: f64) -> bool {
        view.len() >= CROSS_WARMUP
            && view.column(&Column::Vzo(z.span), 0) > z.grey_zone_vzo * vzo_multiple
            && view.column(&Column::Rsi(z.span), 0) > 50.0 + z.grey_zone_rsi
    }
}

fn green_candle(view: &SeriesView<'_>) -> bool {
    above(view, &col(Column::HeikinAshiClose), &col(Column::HeikinAshiOpen))
}

fn red_candle(view: &SeriesView<'_>) -> bool {
    view.column(&Column::HeikinAshiClose, 0) <= view.column(&Column::HeikinAshiOpen, 0)
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.parameters())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::PriceBar;
    use chrono::NaiveDate;

    fn series_with(closes: &[f64], columns: Vec<(Column, Vec<f64>)>) -> PriceSeries {
        let t = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar {
                open_time: t + chrono::Duration::days(i as i64),
                close_time: t + chrono::Duration::days(i as i64 + 1),
                open: close,
                high: close,
                low: close,
                close,
                volume: 100.0,
            })
            .collect();
        columns
            .into_iter()
            .fold(PriceSeries::new(bars), |s, (c, v)| s.with_column(c, v))
    }

    fn ma_cross(short: i64, long: i64) -> Strategy {
        StrategyKind::MaCross
            .build(
                &ParameterSet::new()
                    .with("short_ma", short)
                    .with("long_ma", long),
            )
            .unwrap()
    }

    #[test]
    fn kind_from_name() {
        assert_eq!("MA_CROSS".parse::<StrategyKind>().unwrap(), StrategyKind::MaCross);
        for kind in StrategyKind::ALL {
            assert_eq!(kind.name().parse::<StrategyKind>().unwrap(), kind);
        }
        assert!(matches!(
            "martingale".parse::<StrategyKind>(),
            Err(BarlabError::UnknownStrategy { .. })
        ));
    }

    #[test]
    fn build_uses_defaults() {
        let strategy = StrategyKind::MaCross.build(&ParameterSet::new()).unwrap();
        assert_eq!(
            strategy,
            Strategy::MaCross(MaPair {
                kind: MaKind::Ema,
                short: 5,
                long: 10
            })
        );
    }

    #[test]
    fn build_rejects_unknown_key() {
        let params = ParameterSet::new().with("short_ma", 3i64).with("lookback", 7i64);
        let err = StrategyKind::MaCross.build(&params).unwrap_err();
        assert!(matches!(err, BarlabError::UnknownParameter { ref key, .. } if key == "lookback"));
    }

    #[test]
    fn build_rejects_bad_values() {
        let zero = ParameterSet::new().with("short_ma", 0i64);
        assert!(StrategyKind::MaCross.build(&zero).is_err());
        let kind = ParameterSet::new().with("ma_type", "tema");
        assert!(StrategyKind::MaCross.build(&kind).is_err());
        let text = ParameterSet::new().with("window_dev", "wide");
        assert!(StrategyKind::Bollinger.build(&text).is_err());
    }

    #[test]
    fn build_rejects_negative_band_and_brick_factors() {
        let negative_dev = ParameterSet::new().with("window_dev", -1.5);
        for kind in [StrategyKind::Bollinger, StrategyKind::BollingerBands] {
            let err = kind.build(&negative_dev).unwrap_err();
            assert!(
                matches!(err, BarlabError::InvalidParameter { ref key, .. } if key == "window_dev"),
                "{kind}"
            );
        }
        assert!(StrategyKind::Bollinger
            .build(&ParameterSet::new().with("window_dev", 0.0))
            .is_ok());

        for factor in [-0.5, 0.0, f64::NAN] {
            let params = ParameterSet::new().with("brick_size_factor", factor);
            let err = StrategyKind::Renko.build(&params).unwrap_err();
            assert!(
                matches!(err, BarlabError::InvalidParameter { ref key, .. } if key == "brick_size_factor"),
                "{factor}"
            );
        }
    }

    #[test]
    fn parameters_rebuild_the_same_strategy() {
        for kind in StrategyKind::ALL {
            let strategy = kind.build(&ParameterSet::new()).unwrap();
            let rebuilt = kind.build(&strategy.parameters()).unwrap();
            assert_eq!(strategy, rebuilt, "{kind}");
            assert_eq!(strategy.kind(), kind);
        }
    }

    #[test]
    fn display_names_kind_and_parameters() {
        assert_eq!(
            ma_cross(3, 20).to_string(),
            "ma_cross(short_ma=3, long_ma=20, ma_type=ema)"
        );
    }

    #[test]
    fn ma_cross_needs_three_bars() {
        let strategy = ma_cross(3, 20);
        let p = MaPair {
            kind: MaKind::Ema,
            short: 3,
            long: 20,
        };
        let series = series_with(
            &[1.0, 1.0, 1.0],
            vec![
                (p.short_column(), vec![1.0, 1.0, 3.0]),
                (p.long_column(), vec![2.0, 2.0, 2.0]),
            ],
        );
        let mut state = StrategyState::default();
        assert!(strategy.is_enter(&series.view(3), &mut state));
        assert!(!strategy.is_enter(&series.view(2), &mut state));
        assert!(!strategy.is_exit(&series.view(3), &mut state));
    }

    #[test]
    fn crossover_requires_previous_bar_at_or_below() {
        let strategy = ma_cross(3, 20);
        let Strategy::MaCross(p) = strategy else {
            unreachable!()
        };
        let series = series_with(
            &[1.0; 4],
            vec![
                (p.short_column(), vec![1.0, 2.0, 3.0, 1.0]),
                (p.long_column(), vec![2.0, 2.0, 2.0, 2.0]),
            ],
        );
        let mut state = StrategyState::default();
        // equal on the previous bar still counts as uncrossed
        assert!(strategy.is_enter(&series.view(3), &mut state));
        assert!(strategy.is_exit(&series.view(4), &mut state));
    }

    #[test]
    fn nan_values_never_trigger() {
        let strategy = ma_cross(3, 20);
        let Strategy::MaCross(p) = strategy else {
            unreachable!()
        };
        let series = series_with(
            &[1.0; 3],
            vec![
                (p.short_column(), vec![f64::NAN, f64::NAN, 3.0]),
                (p.long_column(), vec![f64::NAN, f64::NAN, 2.0]),
            ],
        );
        let mut state = StrategyState::default();
        assert!(!strategy.is_enter(&series.view(3), &mut state));
        assert!(!strategy.is_exit(&series.view(3), &mut state));
    }

    #[test]
    fn missing_columns_never_trigger() {
        let series = series_with(&[1.0, 2.0, 3.0, 4.0], vec![]);
        let mut state = StrategyState::default();
        for kind in StrategyKind::ALL {
            let strategy = kind.build(&ParameterSet::new()).unwrap();
            assert!(!strategy.is_enter(&series.view(4), &mut state), "{kind}");
        }
    }

    #[test]
    fn keltner_trailing_stop_ratchets_and_resets() {
        let strategy = StrategyKind::Keltner.build(&ParameterSet::new()).unwrap();
        let Strategy::Keltner(k) = strategy else {
            unreachable!()
        };
        let mut closes = vec![100.0; 32];
        closes[31] = 94.0;
        let mut lows = vec![90.0; 32];
        lows[30] = 95.0;
        lows[31] = 92.0;
        let series = series_with(&closes, vec![(k.low(), lows)]);
        let mut state = StrategyState::default();

        assert!(!strategy.is_exit(&series.view(29), &mut state));
        assert_eq!(state.trailing_stop, 0.0);
        assert!(!strategy.is_exit(&series.view(30), &mut state));
        assert!(!strategy.is_exit(&series.view(31), &mut state));
        assert_eq!(state.trailing_stop, 95.0);
        // stop stays at 95 even though the band fell to 92
        assert!(strategy.is_exit(&series.view(32), &mut state));
        assert_eq!(state.trailing_stop, 0.0);
    }

    #[test]
    fn vzo_rsi_exit_is_negated_entry_after_warmup() {
        let strategy = StrategyKind::VzoRsi.build(&ParameterSet::new()).unwrap();
        let series = series_with(
            &[1.0; 3],
            vec![
                (Column::Vzo(14), vec![0.0, 0.0, 11.0]),
                (Column::Rsi(14), vec![50.0, 50.0, 56.0]),
            ],
        );
        let mut state = StrategyState::default();
        assert!(strategy.is_enter(&series.view(3), &mut state));
        assert!(!strategy.is_exit(&series.view(3), &mut state));
        assert!(!strategy.is_exit(&series.view(2), &mut state));
        assert!(!strategy.is_exit(&series.view(1), &mut state));
        assert!(!strategy.is_exit(&series.view(0), &mut state));
    }

    #[test]
    fn vzo_rsi_let_grey_needs_both_zones_to_exit() {
        let strategy = StrategyKind::VzoRsiLetGrey
            .build(&ParameterSet::new().with("span", 2i64))
            .unwrap();
        let series = series_with(
            &[1.0; 3],
            vec![
                (Column::Vzo(2), vec![0.0, 0.0, -6.0]),
                (Column::Rsi(2), vec![50.0, 50.0, 46.0]),
            ],
        );
        let mut state = StrategyState::default();
        assert!(!strategy.is_exit(&series.view(3), &mut state));
        let series = series_with(
            &[1.0; 3],
            vec![
                (Column::Vzo(2), vec![0.0, 0.0, -6.0]),
                (Column::Rsi(2), vec![50.0, 50.0, 44.0]),
            ],
        );
        assert!(strategy.is_exit(&series.view(3), &mut state));
    }

    #[test]
    fn heikin_ashi_doji_is_red() {
        let series = series_with(
            &[1.0],
            vec![
                (Column::HeikinAshiOpen, vec![5.0]),
                (Column::HeikinAshiClose, vec![5.0]),
            ],
        );
        let mut state = StrategyState::default();
        assert!(!Strategy::HeikinAshi.is_enter(&series.view(1), &mut state));
        assert!(Strategy::HeikinAshi.is_exit(&series.view(1), &mut state));
    }

    #[test]
    fn bollinger_bands_exit_on_any_band_cross_below() {
        let strategy = StrategyKind::BollingerBands
            .build(&ParameterSet::new())
            .unwrap();
        let Strategy::BollingerBands(b) = strategy else {
            unreachable!()
        };
        let mut closes = vec![100.0; 30];
        closes[29] = 89.0;
        let series = series_with(
            &closes,
            vec![
                (b.high(), vec![120.0; 30]),
                (b.mid(), vec![110.0; 30]),
                (b.low(), vec![90.0; 30]),
            ],
        );
        let mut state = StrategyState::default();
        assert!(strategy.is_exit(&series.view(30), &mut state));
        assert!(!strategy.is_exit(&series.view(29), &mut state));
    }

    #[test]
    fn renko_follows_direction() {
        let strategy = StrategyKind::Renko.build(&ParameterSet::new()).unwrap();
        let Strategy::Renko(r) = strategy else {
            unreachable!()
        };
        let series = series_with(&[1.0; 3], vec![(r.direction(), vec![0.0, 1.0, -1.0])]);
        let mut state = StrategyState::default();
        assert!(!strategy.is_enter(&series.view(1), &mut state));
        assert!(strategy.is_enter(&series.view(2), &mut state));
        assert!(strategy.is_exit(&series.view(3), &mut state));
    }

    #[test]
    fn anchored_obv_enters_when_turning_positive() {
        let strategy = StrategyKind::AnchoredObv.build(&ParameterSet::new()).unwrap();
        let column = Column::AnchoredObv { months: 3 };
        let series = series_with(&[1.0; 4], vec![(column, vec![0.0, -5.0, 0.0, 10.0])]);
        let mut state = StrategyState::default();
        assert!(!strategy.is_enter(&series.view(3), &mut state));
        assert!(strategy.is_enter(&series.view(4), &mut state));
        assert!(!strategy.is_exit(&series.view(2), &mut state));
        assert!(!strategy.is_exit(&series.view(3), &mut state));
    }

    #[test]
    fn augment_adds_declared_columns() {
        let strategy = ma_cross(2, 3);
        let series = series_with(&[1.0, 2.0, 3.0, 4.0], vec![]);
        let augmented = strategy.augment(&series);
        for column in strategy.columns() {
            assert!(augmented.has_column(&column));
        }
        assert!(!series.has_column(&strategy.columns()[0]));
    }
}
