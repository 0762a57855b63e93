//! Generic two-threshold state holder.
//!
//! Every per-domain "is dark / needs water / too humid" decision in this
//! crate is this primitive with domain-specific bounds and signal.

use anyhow::{ensure, Result};

/// Dual-threshold band. State flips to `true` only when the value crosses
/// `high` from below, back to `false` only when it crosses `low` from above.
/// Values strictly inside `(low, high)` hold the prior state.
#[derive(Debug, Clone)]
pub struct HysteresisBand {
    low: f64,
    high: f64,
    state: bool,
}

impl HysteresisBand {
    /// Build a band starting in the `false` state. Rejects `low >= high`.
    pub fn new(low: f64, high: f64) -> Result<Self> {
        Self::with_state(low, high, false)
    }

    /// Build a band with an explicit initial state.
    pub fn with_state(low: f64, high: f64, state: bool) -> Result<Self> {
        ensure!(
            low < high,
            "hysteresis band requires low < high, got low={low} high={high}"
        );
        Ok(Self { low, high, state })
    }

    /// Feed one value; returns the (possibly unchanged) state.
    pub fn update(&mut self, value: f64) -> bool {
        if !self.state && value > self.high {
            self.state = true;
        } else if self.state && value < self.low {
            self.state = false;
        }
        self.state
    }

    pub fn state(&self) -> bool {
        self.state
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_inverted_bounds() {
        assert!(HysteresisBand::new(60.0, 30.0).is_err());
        assert!(HysteresisBand::new(30.0, 30.0).is_err());
    }

    #[test]
    fn rises_only_above_high() {
        let mut band = HysteresisBand::new(30.0, 60.0).unwrap();
        assert!(!band.update(59.0));
        assert!(!band.update(60.0)); // boundary is not a crossing
        assert!(band.update(61.0));
    }

    #[test]
    fn falls_only_below_low() {
        let mut band = HysteresisBand::with_state(30.0, 60.0, true).unwrap();
        assert!(band.update(31.0));
        assert!(band.update(30.0)); // boundary is not a crossing
        assert!(!band.update(29.0));
    }

    #[test]
    fn constant_value_inside_band_never_changes_state() {
        let mut low_start = HysteresisBand::new(30.0, 60.0).unwrap();
        let mut high_start = HysteresisBand::with_state(30.0, 60.0, true).unwrap();
        for _ in 0..100 {
            assert!(!low_start.update(45.0));
            assert!(high_start.update(45.0));
        }
    }

    #[test]
    fn full_cycle_crosses_both_ways() {
        let mut band = HysteresisBand::new(30.0, 60.0).unwrap();
        assert!(band.update(70.0));
        assert!(band.update(45.0)); // deadband holds
        assert!(!band.update(20.0));
        assert!(!band.update(45.0)); // deadband holds the other way
    }
}
