//! Exposure state and the trade ledger entry.

use chrono::NaiveDateTime;

/// Current exposure. Long-only, at most one open position.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Position {
    #[default]
    Flat,
    Long {
        entry_price: f64,
        entry_time: NaiveDateTime,
        entry_index: usize,
    },
}

impl Position {
    pub fn is_flat(&self) -> bool {
        matches!(self, Position::Flat)
    }

    pub fn is_long(&self) -> bool {
        !self.is_flat()
    }

    /// Fractional return of the open position at `price`; 0 when flat.
    pub fn variation(&self, price: f64) -> f64 {
        match self {
            Position::Flat => 0.0,
            Position::Long { entry_price, .. } => (price - entry_price) / entry_price,
        }
    }
}

/// A completed entry/exit pair. Never mutated once appended to the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    pub entry_index: usize,
    pub exit_time: NaiveDateTime,
    pub exit_price: f64,
    pub exit_index: usize,
    pub variation: f64,
    pub profit: f64,
}

impl Trade {
    /// Zero-return trades count as losses.
    pub fn is_win(&self) -> bool {
        self.variation > 0.0
    }

    pub fn bars_held(&self) -> usize {
        self.exit_index.saturating_sub(self.entry_index)
    }
}
