//! Capability traits for injected hardware access.
//!
//! One small trait per role: controllers and estimators own a value of the
//! trait, the daemon decides whether the implementation is a real driver or
//! a simulator. Nothing in the core ever inherits from a driver.

/// Status LED colors. Mutually exclusive: a sink switches the others off
/// when one is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LedColor {
    Green,
    Orange,
    Red,
}

/// One analog-to-digital channel producing 8-bit raw samples.
pub trait AdcChannel {
    /// Read one raw sample (0–255).
    fn read(&mut self) -> anyhow::Result<u8>;

    /// One-shot bus recovery attempt after a failed read.
    fn reinit(&mut self) -> anyhow::Result<()>;
}

/// The GPIO line used for RC charge-timing light measurement.
pub trait RcPin {
    /// Drive the line low to discharge the capacitor.
    fn discharge(&mut self);
    /// Release the line to input so the capacitor charges through the LDR.
    fn release(&mut self);
    /// Whether the line has charged past the digital threshold.
    fn is_high(&mut self) -> bool;
}

/// Combined temperature/humidity sensor (DHT11-class).
pub trait TempHumSource {
    /// Returns (temperature °C, relative humidity %). Either side is `None`
    /// when the read failed.
    fn read(&mut self) -> (Option<f64>, Option<f64>);
}

/// Rain sensor: analog intensity plus a digital wet/dry line.
pub trait RainSource {
    /// Rain intensity in percent, `None` on a failed read.
    fn read_pct(&mut self) -> Option<f64>;
    /// Normalized digital line: `true` means rain detected. Drivers hide
    /// the active-low wire encoding behind this.
    fn is_wet(&mut self) -> bool;
}

/// Soil moisture sensor, percent.
pub trait MoistureSource {
    fn read(&mut self) -> Option<f64>;
}

/// Pump relay.
pub trait PumpSink {
    fn set(&mut self, on: bool);
}

/// Dimmable grow light, 0–100 %.
pub trait LightSink {
    fn set_intensity(&mut self, pct: u8);
}

/// Status LED bank.
pub trait LedSink {
    fn set(&mut self, color: LedColor);
}

/// Two-line text display.
pub trait DisplaySink {
    fn show(&mut self, line1: &str, line2: &str);
}

/// Wall-clock hour accessor, injectable for tests.
pub trait Clock {
    /// Local hour of day, 0–23.
    fn hour(&self) -> u8;
}

/// Feature vector handed to the anomaly oracle each cycle.
#[derive(Debug, Clone, Copy)]
pub struct AnomalyFeatures {
    pub temp: Option<f64>,
    pub hum: Option<f64>,
    pub rain_pct: Option<f64>,
    pub lux: u16,
}

/// The anomaly-detection model, reduced to a boolean oracle.
pub trait AnomalyOracle {
    fn check(&mut self, features: &AnomalyFeatures) -> bool;
}
