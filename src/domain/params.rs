//! Strategy parameters and parameter grids.
//!
//! A [`ParameterSet`] is an ordered name → value mapping used to build one
//! strategy instance. A [`ParameterGrid`] holds an ordered list of axes, each
//! with its candidate values; its Cartesian product is enumerated with the
//! last axis varying fastest.

use crate::domain::error::BarlabError;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_usize(&self, key: &str) -> Result<usize, BarlabError> {
        match self {
            ParamValue::Int(v) if *v >= 0 => Ok(*v as usize),
            ParamValue::Float(v) if *v >= 0.0 && v.fract() == 0.0 => Ok(*v as usize),
            other => Err(BarlabError::InvalidParameter {
                key: key.to_string(),
                reason: format!("expected a non-negative integer, got {other}"),
            }),
        }
    }

    pub fn as_f64(&self, key: &str) -> Result<f64, BarlabError> {
        match self {
            ParamValue::Int(v) => Ok(*v as f64),
            ParamValue::Float(v) => Ok(*v),
            ParamValue::Text(s) => Err(BarlabError::InvalidParameter {
                key: key.to_string(),
                reason: format!("expected a number, got '{s}'"),
            }),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            ParamValue::Text(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl FromStr for ParamValue {
    type Err = std::convert::Infallible;

    /// Integers first, then floats, anything else is text.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(v) = s.parse::<i64>() {
            return Ok(ParamValue::Int(v));
        }
        if let Ok(v) = s.parse::<f64>() {
            return Ok(ParamValue::Float(v));
        }
        Ok(ParamValue::Text(s.to_string()))
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    entries: Vec<(String, ParamValue)>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value.into());
        self
    }

    /// Insert or replace, keeping the original position of an existing key.
    pub fn insert(&mut self, key: &str, value: ParamValue) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(k, v)| format!("{k}={v}")).collect();
        write!(f, "{}", parts.join(", "))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterGrid {
    axes: Vec<(String, Vec<ParamValue>)>,
}

impl ParameterGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_axis<V: Into<ParamValue>>(mut self, key: &str, values: Vec<V>) -> Self {
        self.axes
            .push((key.to_string(), values.into_iter().map(Into::into).collect()));
        self
    }

    /// Integer axis over `start..end` (end exclusive).
    pub fn with_range(self, key: &str, start: i64, end: i64) -> Self {
        self.with_axis(key, (start..end).collect::<Vec<i64>>())
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.axes.iter().map(|(k, _)| k.as_str())
    }

    /// Number of combinations; 0 for an empty grid or any empty axis.
    pub fn combination_count(&self) -> usize {
        if self.axes.is_empty() {
            return 0;
        }
        self.axes.iter().map(|(_, v)| v.len()).product()
    }

    /// Every combination, last axis varying fastest.
    pub fn combinations(&self) -> Vec<ParameterSet> {
        let total = self.combination_count();
        let mut out = Vec::with_capacity(total);
        for mut n in 0..total {
            let mut picks = Vec::with_capacity(self.axes.len());
            for (_, values) in self.axes.iter().rev() {
                picks.push(&values[n % values.len()]);
                n /= values.len();
            }
            let mut set = ParameterSet::new();
            for ((key, _), value) in self.axes.iter().zip(picks.into_iter().rev()) {
                set.insert(key, value.clone());
            }
            out.push(set);
        }
        out
    }
}

/// Parse one axis: a comma list (`3,5,8`), an integer range `a..b` with the
/// end exclusive, or a stepped range `a..b:step`.
pub fn parse_axis(key: &str, raw: &str) -> Result<Vec<ParamValue>, BarlabError> {
    let raw = raw.trim();
    if let Some((start, rest)) = raw.split_once("..") {
        let (end, step) = match rest.split_once(':') {
            Some((end, step)) => (end, step),
            None => (rest, "1"),
        };
        let invalid = |reason: &str| BarlabError::InvalidParameter {
            key: key.to_string(),
            reason: format!("{reason} in range '{raw}'"),
        };
        let start: i64 = start.trim().parse().map_err(|_| invalid("bad start"))?;
        let end: i64 = end.trim().parse().map_err(|_| invalid("bad end"))?;
        let step: usize = step.trim().parse().map_err(|_| invalid("bad step"))?;
        if step == 0 {
            return Err(invalid("zero step"));
        }
        return Ok((start..end).step_by(step).map(ParamValue::Int).collect());
    }
    Ok(raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<ParamValue>().ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_value_parse() {
        assert_eq!("5".parse::<ParamValue>().unwrap(), ParamValue::Int(5));
        assert_eq!("2.5".parse::<ParamValue>().unwrap(), ParamValue::Float(2.5));
        assert_eq!(
            "ema".parse::<ParamValue>().unwrap(),
            ParamValue::Text("ema".into())
        );
    }

    #[test]
    fn param_value_conversions() {
        assert_eq!(ParamValue::Int(7).as_usize("k").unwrap(), 7);
        assert_eq!(ParamValue::Float(3.0).as_usize("k").unwrap(), 3);
        assert!(ParamValue::Int(-1).as_usize("k").is_err());
        assert!(ParamValue::Float(2.5).as_usize("k").is_err());
        assert!((ParamValue::Int(2).as_f64("k").unwrap() - 2.0).abs() < f64::EPSILON);
        assert!(ParamValue::Text("x".into()).as_f64("k").is_err());
    }

    #[test]
    fn parameter_set_replaces_in_place() {
        let mut set = ParameterSet::new().with("a", 1i64).with("b", 2i64);
        set.insert("a", ParamValue::Int(9));
        let keys: Vec<&str> = set.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(set.get("a"), Some(&ParamValue::Int(9)));
        assert_eq!(set.to_string(), "a=9, b=2");
    }

    #[test]
    fn grid_product_last_axis_fastest() {
        let grid = ParameterGrid::new()
            .with_axis("short_ma", vec![2i64, 3])
            .with_axis("long_ma", vec![10i64, 20]);
        let combos: Vec<String> = grid.combinations().iter().map(|c| c.to_string()).collect();
        assert_eq!(
            combos,
            vec![
                "short_ma=2, long_ma=10",
                "short_ma=2, long_ma=20",
                "short_ma=3, long_ma=10",
                "short_ma=3, long_ma=20",
            ]
        );
    }

    #[test]
    fn empty_grid_has_no_combinations() {
        assert!(ParameterGrid::new().combinations().is_empty());
        let grid = ParameterGrid::new()
            .with_range("a", 1, 3)
            .with_axis::<i64>("b", vec![]);
        assert_eq!(grid.combination_count(), 0);
        assert!(grid.combinations().is_empty());
    }

    #[test]
    fn parse_axis_forms() {
        assert_eq!(
            parse_axis("k", "3, 5,8").unwrap(),
            vec![ParamValue::Int(3), ParamValue::Int(5), ParamValue::Int(8)]
        );
        assert_eq!(
            parse_axis("k", "1..4").unwrap(),
            vec![ParamValue::Int(1), ParamValue::Int(2), ParamValue::Int(3)]
        );
        assert_eq!(
            parse_axis("k", "10..30:10").unwrap(),
            vec![ParamValue::Int(10), ParamValue::Int(20)]
        );
        assert!(parse_axis("k", "5..x").is_err());
        assert!(parse_axis("k", "1..5:0").is_err());
        assert_eq!(
            parse_axis("k", "ema,hma").unwrap(),
            vec![ParamValue::from("ema"), ParamValue::from("hma")]
        );
    }
}
