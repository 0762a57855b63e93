//! TOML config file loading and validation.
//!
//! Every threshold the controllers use lives here rather than in code;
//! deployed units have disagreed about rain/soil bounds often enough that
//! hard-wiring any one set would be wrong. Defaults match the reference
//! hardware wiring.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

use greenhouse_core::alerts::AlertThresholds;
use greenhouse_core::light::LightTuning;
use greenhouse_core::lighting::LightSchedule;

// ---------------------------------------------------------------------------
// Config file structures
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cycle: CycleConfig,
    pub irrigation: IrrigationConfig,
    pub lighting: LightingConfig,
    pub alerts: AlertsConfig,
    pub light_sensor: LightSensorConfig,
    pub gpio: GpioConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    pub interval_sec: u64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self { interval_sec: 5 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct IrrigationConfig {
    /// Pump starts below this soil moisture (%).
    pub moisture_low_pct: f64,
    /// Pump stops above this soil moisture (%).
    pub moisture_high_pct: f64,
}

impl Default for IrrigationConfig {
    fn default() -> Self {
        Self {
            moisture_low_pct: 30.0,
            moisture_high_pct: 60.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    /// Full intensity from this hour.
    pub high_start_hour: u8,
    /// Half intensity from this hour.
    pub med_start_hour: u8,
    /// Lights out from this hour.
    pub off_start_hour: u8,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            high_start_hour: 5,
            med_start_hour: 12,
            off_start_hour: 17,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    pub humidity_warn_on_pct: f64,
    pub humidity_warn_off_pct: f64,
    pub rain_warn_on_pct: f64,
    pub rain_warn_off_pct: f64,
    /// Missing-reading cycles before the sensor counts as failed.
    pub failure_threshold: u32,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            humidity_warn_on_pct: 80.0,
            humidity_warn_off_pct: 75.0,
            rain_warn_on_pct: 60.0,
            rain_warn_off_pct: 40.0,
            failure_threshold: 5,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LightSensorConfig {
    pub delta_on: f64,
    pub delta_off: f64,
    pub baseline_floor: f64,
    pub dark_lux: u16,
    pub calibration_samples: u32,
    pub rc_timeout_count: u32,
}

impl Default for LightSensorConfig {
    fn default() -> Self {
        Self {
            delta_on: 0.30,
            delta_off: 0.15,
            baseline_floor: 10.0,
            dark_lux: 100,
            calibration_samples: 10,
            rc_timeout_count: 50_000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GpioConfig {
    pub pump_pin: u8,
    /// Most relay boards are active-low.
    pub pump_active_low: bool,
    pub grow_light_pin: u8,
    pub led_green_pin: u8,
    pub led_orange_pin: u8,
    pub led_red_pin: u8,
    pub dht_pin: u8,
    pub rain_digital_pin: u8,
    pub rc_pin: u8,
    pub adc_address: u16,
    pub adc_rain_channel: u8,
    pub adc_soil_channel: u8,
    pub adc_light_channel: u8,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            pump_pin: 18,
            pump_active_low: true,
            grow_light_pin: 27,
            led_green_pin: 16,
            led_orange_pin: 6,
            led_red_pin: 5,
            dht_pin: 4,
            rain_digital_pin: 17,
            rc_pin: 25,
            adc_address: 0x4B,
            adc_rain_channel: 0,
            adc_soil_channel: 1,
            adc_light_channel: 2,
        }
    }
}

// ---------------------------------------------------------------------------
// GPIO whitelist
// ---------------------------------------------------------------------------

/// BCM GPIO pins available on the Raspberry Pi 40-pin header for general
/// use. GPIO 0-1 are reserved for the ID EEPROM and must never be used.
const VALID_GPIO_PINS: &[u8] = &[
    2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27,
];

/// Maximum valid channel index on the 8-channel ADC.
const ADC_MAX_CHANNEL: u8 = 7;

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl Config {
    /// Validate all config entries. Returns `Ok(())` or an error describing
    /// every violation found (not just the first one).
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if self.cycle.interval_sec == 0 {
            errors.push("cycle: interval_sec must be positive".to_string());
        }

        self.validate_irrigation(&mut errors);
        self.validate_lighting(&mut errors);
        self.validate_alerts(&mut errors);
        self.validate_light_sensor(&mut errors);
        self.validate_gpio(&mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "config validation failed ({} error{}):\n  - {}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" },
                errors.join("\n  - ")
            );
        }
    }

    fn validate_irrigation(&self, errors: &mut Vec<String>) {
        let i = &self.irrigation;
        if !(0.0..=100.0).contains(&i.moisture_low_pct) {
            errors.push(format!(
                "irrigation: moisture_low_pct {} out of range [0, 100]",
                i.moisture_low_pct
            ));
        }
        if !(0.0..=100.0).contains(&i.moisture_high_pct) {
            errors.push(format!(
                "irrigation: moisture_high_pct {} out of range [0, 100]",
                i.moisture_high_pct
            ));
        }
        if i.moisture_high_pct <= i.moisture_low_pct {
            errors.push(format!(
                "irrigation: moisture_high_pct ({}) must be greater than moisture_low_pct ({})",
                i.moisture_high_pct, i.moisture_low_pct
            ));
        }
    }

    fn validate_lighting(&self, errors: &mut Vec<String>) {
        let l = &self.lighting;
        if l.off_start_hour >= 24 {
            errors.push(format!(
                "lighting: off_start_hour {} out of range [0, 23]",
                l.off_start_hour
            ));
        }
        if !(l.high_start_hour < l.med_start_hour && l.med_start_hour < l.off_start_hour) {
            errors.push(format!(
                "lighting: schedule hours must be strictly increasing, got {}/{}/{}",
                l.high_start_hour, l.med_start_hour, l.off_start_hour
            ));
        }
    }

    fn validate_alerts(&self, errors: &mut Vec<String>) {
        let a = &self.alerts;
        for (name, value) in [
            ("humidity_warn_on_pct", a.humidity_warn_on_pct),
            ("humidity_warn_off_pct", a.humidity_warn_off_pct),
            ("rain_warn_on_pct", a.rain_warn_on_pct),
            ("rain_warn_off_pct", a.rain_warn_off_pct),
        ] {
            if !(0.0..=100.0).contains(&value) {
                errors.push(format!("alerts: {name} {value} out of range [0, 100]"));
            }
        }
        if a.humidity_warn_on_pct <= a.humidity_warn_off_pct {
            errors.push(format!(
                "alerts: humidity_warn_on_pct ({}) must be greater than humidity_warn_off_pct ({})",
                a.humidity_warn_on_pct, a.humidity_warn_off_pct
            ));
        }
        if a.rain_warn_on_pct <= a.rain_warn_off_pct {
            errors.push(format!(
                "alerts: rain_warn_on_pct ({}) must be greater than rain_warn_off_pct ({})",
                a.rain_warn_on_pct, a.rain_warn_off_pct
            ));
        }
        if a.failure_threshold == 0 {
            errors.push("alerts: failure_threshold must be positive".to_string());
        }
    }

    fn validate_light_sensor(&self, errors: &mut Vec<String>) {
        let s = &self.light_sensor;
        if s.delta_off <= 0.0 || s.delta_on <= s.delta_off {
            errors.push(format!(
                "light_sensor: requires delta_on > delta_off > 0, got on={} off={}",
                s.delta_on, s.delta_off
            ));
        }
        if s.baseline_floor <= 0.0 {
            errors.push(format!(
                "light_sensor: baseline_floor must be positive, got {}",
                s.baseline_floor
            ));
        }
        if s.dark_lux > 1000 {
            errors.push(format!(
                "light_sensor: dark_lux {} out of range [0, 1000]",
                s.dark_lux
            ));
        }
        if s.calibration_samples < 10 {
            errors.push(format!(
                "light_sensor: calibration_samples must be at least 10, got {}",
                s.calibration_samples
            ));
        }
        if s.rc_timeout_count == 0 {
            errors.push("light_sensor: rc_timeout_count must be positive".to_string());
        }
    }

    fn validate_gpio(&self, errors: &mut Vec<String>) {
        let g = &self.gpio;
        let pins = [
            ("pump_pin", g.pump_pin),
            ("grow_light_pin", g.grow_light_pin),
            ("led_green_pin", g.led_green_pin),
            ("led_orange_pin", g.led_orange_pin),
            ("led_red_pin", g.led_red_pin),
            ("dht_pin", g.dht_pin),
            ("rain_digital_pin", g.rain_digital_pin),
            ("rc_pin", g.rc_pin),
        ];

        let mut seen: HashSet<u8> = HashSet::new();
        for (name, pin) in pins {
            if !VALID_GPIO_PINS.contains(&pin) {
                errors.push(format!(
                    "gpio: {name} {pin} is not a valid BCM GPIO pin (allowed: 2-27)"
                ));
            } else if !seen.insert(pin) {
                errors.push(format!("gpio: {name} {pin} is already used by another role"));
            }
        }

        // 7-bit I2C address range, reserved blocks excluded.
        if !(0x08..=0x77).contains(&g.adc_address) {
            errors.push(format!(
                "gpio: adc_address {:#04x} outside the 7-bit I2C range [0x08, 0x77]",
                g.adc_address
            ));
        }

        let mut seen_ch: HashSet<u8> = HashSet::new();
        for (name, ch) in [
            ("adc_rain_channel", g.adc_rain_channel),
            ("adc_soil_channel", g.adc_soil_channel),
            ("adc_light_channel", g.adc_light_channel),
        ] {
            if ch > ADC_MAX_CHANNEL {
                errors.push(format!(
                    "gpio: {name} {ch} exceeds maximum ({ADC_MAX_CHANNEL})"
                ));
            } else if !seen_ch.insert(ch) {
                errors.push(format!("gpio: {name} {ch} is already used by another sensor"));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Conversions into core types
// ---------------------------------------------------------------------------

impl Config {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle.interval_sec)
    }

    pub fn light_tuning(&self) -> LightTuning {
        let s = &self.light_sensor;
        LightTuning {
            delta_on: s.delta_on,
            delta_off: s.delta_off,
            baseline_floor: s.baseline_floor,
            dark_lux: s.dark_lux,
            calibration_samples: s.calibration_samples,
            rc_timeout_count: s.rc_timeout_count,
            ..LightTuning::default()
        }
    }

    pub fn schedule(&self) -> Result<LightSchedule> {
        LightSchedule::new(
            self.lighting.high_start_hour,
            self.lighting.med_start_hour,
            self.lighting.off_start_hour,
        )
    }

    pub fn alert_thresholds(&self) -> AlertThresholds {
        let a = &self.alerts;
        AlertThresholds {
            humidity_warn_on: a.humidity_warn_on_pct,
            humidity_warn_off: a.humidity_warn_off_pct,
            rain_warn_on: a.rain_warn_on_pct,
            rain_warn_off: a.rain_warn_off_pct,
            failure_threshold: a.failure_threshold,
        }
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Read, parse, and validate a TOML config file.
pub fn load(path: &str) -> Result<Config> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("failed to read config: {path}"))?;
    let config: Config =
        toml::from_str(&contents).with_context(|| format!("failed to parse config: {path}"))?;
    config
        .validate()
        .with_context(|| format!("invalid config: {path}"))?;
    Ok(config)
}

/// Like [`load`], but a missing file falls back to built-in defaults.
pub fn load_or_default(path: &str) -> Result<Config> {
    if std::path::Path::new(path).exists() {
        load(path)
    } else {
        tracing::info!(path, "no config file — using built-in defaults");
        Ok(Config::default())
    }
}

// ===========================================================================
// Tests
// ===========================================================================
