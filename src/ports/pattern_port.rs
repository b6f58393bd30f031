//! Chart-pattern oracle port.
//!
//! Detectors are independent of the backtest engine; the crate only fixes
//! the shape of a match.

use crate::domain::error::BarlabError;
use crate::domain::series::PriceSeries;

/// A cup-and-handle formation. Bar indices satisfy `begin < pivot < end`.
#[derive(Debug, Clone, PartialEq)]
pub struct CupAndHandle {
    resistance_level: f64,
    setup_size: f64,
    touches: usize,
    breakout_volume_ratio: f64,
    pivot: usize,
    begin: usize,
    end: usize,
}

impl CupAndHandle {
    pub fn new(
        resistance_level: f64,
        setup_size: f64,
        touches: usize,
        breakout_volume_ratio: f64,
        (begin, pivot, end): (usize, usize, usize),
    ) -> Result<Self, BarlabError> {
        if !(begin < pivot && pivot < end) {
            return Err(BarlabError::InvalidParameter {
                key: "pivot".to_string(),
                reason: format!("need begin < pivot < end, got {begin}, {pivot}, {end}"),
            });
        }
        Ok(CupAndHandle {
            resistance_level,
            setup_size,
            touches,
            breakout_volume_ratio,
            pivot,
            begin,
            end,
        })
    }

    pub fn resistance_level(&self) -> f64 {
        self.resistance_level
    }

    pub fn setup_size(&self) -> f64 {
        self.setup_size
    }

    pub fn touches(&self) -> usize {
        self.touches
    }

    pub fn breakout_volume_ratio(&self) -> f64 {
        self.breakout_volume_ratio
    }

    pub fn pivot(&self) -> usize {
        self.pivot
    }

    pub fn begin(&self) -> usize {
        self.begin
    }

    pub fn end(&self) -> usize {
        self.end
    }

    /// Bars from the first touch to the pivot.
    pub fn cup_len(&self) -> usize {
        self.pivot - self.begin
    }

    /// Bars from the pivot to the breakout.
    pub fn handle_len(&self) -> usize {
        self.end - self.pivot
    }
}

pub trait PatternPort {
    /// `None` when the series holds no formation.
    fn detect(&self, series: &PriceSeries) -> Option<CupAndHandle>;
}
