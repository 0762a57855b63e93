//! Sensor sample types shared across the pipeline.

use serde::Serialize;

/// Which physical quantity a sample describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Temperature,
    Humidity,
    RainPct,
    RainDigital,
    SoilMoisture,
    Light,
}

/// One scalar reading from a bus channel.
///
/// `value: None` encodes a failed read. Absence travels through the whole
/// pipeline as-is; it is never coerced to 0.
#[derive(Debug, Clone, Serialize)]
pub struct SensorSample {
    pub kind: SensorKind,
    pub value: Option<f64>,
    /// Unix timestamp (seconds).
    pub ts: i64,
}

impl SensorSample {
    pub fn new(kind: SensorKind, value: Option<f64>, ts: i64) -> Self {
        Self { kind, value, ts }
    }

    pub fn is_absent(&self) -> bool {
        self.value.is_none()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_sample_stays_absent() {
        let s = SensorSample::new(SensorKind::Temperature, None, 1_700_000_000);
        assert!(s.is_absent());
        assert_eq!(s.value, None);
    }

    #[test]
    fn present_sample_keeps_value() {
        let s = SensorSample::new(SensorKind::Humidity, Some(61.5), 1_700_000_000);
        assert!(!s.is_absent());
        assert_eq!(s.value, Some(61.5));
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_value(SensorKind::SoilMoisture).unwrap();
        assert_eq!(json, "soil_moisture");
    }
}
