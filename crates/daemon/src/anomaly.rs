//! Plausibility-envelope stand-in for the anomaly-detection model.
//!
//! The real model runs out-of-process; the core only ever consumes a
//! boolean. This implementation flags readings outside a physical envelope
//! or a temperature jump too steep for one cycle.

use std::ops::RangeInclusive;

use greenhouse_core::traits::{AnomalyFeatures, AnomalyOracle};

pub struct EnvelopeOracle {
    temp_range: RangeInclusive<f64>,
    hum_range: RangeInclusive<f64>,
    rain_range: RangeInclusive<f64>,
    /// Largest credible temperature change between consecutive cycles.
    max_temp_step: f64,
    last_temp: Option<f64>,
}

impl Default for EnvelopeOracle {
    fn default() -> Self {
        Self {
            temp_range: -10.0..=55.0,
            hum_range: 0.0..=100.0,
            rain_range: 0.0..=100.0,
            max_temp_step: 10.0,
            last_temp: None,
        }
    }
}

impl AnomalyOracle for EnvelopeOracle {
    fn check(&mut self, features: &AnomalyFeatures) -> bool {
        let mut anomalous = false;

        if let Some(t) = features.temp {
            if !self.temp_range.contains(&t) {
                anomalous = true;
            }
            if let Some(prev) = self.last_temp {
                if (t - prev).abs() > self.max_temp_step {
                    anomalous = true;
                }
            }
            self.last_temp = Some(t);
        }
        if let Some(h) = features.hum {
            if !self.hum_range.contains(&h) {
                anomalous = true;
            }
        }
        if let Some(r) = features.rain_pct {
            if !self.rain_range.contains(&r) {
                anomalous = true;
            }
        }

        anomalous
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn features(temp: Option<f64>, hum: Option<f64>, rain: Option<f64>) -> AnomalyFeatures {
        AnomalyFeatures {
            temp,
            hum,
            rain_pct: rain,
            lux: 500,
        }
    }

    #[test]
    fn nominal_readings_pass() {
        let mut oracle = EnvelopeOracle::default();
        assert!(!oracle.check(&features(Some(24.0), Some(60.0), Some(10.0))));
    }

    #[test]
    fn out_of_envelope_temperature_flags() {
        let mut oracle = EnvelopeOracle::default();
        assert!(oracle.check(&features(Some(80.0), Some(60.0), Some(10.0))));
    }

    #[test]
    fn temperature_jump_flags() {
        let mut oracle = EnvelopeOracle::default();
        assert!(!oracle.check(&features(Some(20.0), Some(60.0), Some(10.0))));
        assert!(oracle.check(&features(Some(35.0), Some(60.0), Some(10.0))));
    }

    #[test]
    fn gradual_change_does_not_flag() {
        let mut oracle = EnvelopeOracle::default();
        for t in [20.0, 24.0, 28.0, 32.0] {
            assert!(!oracle.check(&features(Some(t), Some(60.0), Some(10.0))));
        }
    }

    #[test]
    fn absent_readings_do_not_flag() {
        // Missing sensors are the failure counter's concern, not the
        // oracle's.
        let mut oracle = EnvelopeOracle::default();
        assert!(!oracle.check(&features(None, None, None)));
    }
}
