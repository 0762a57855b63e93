//! Stateful sensor/actuator simulators for local development.
//!
//! One shared environment evolves per cycle: temporal coherence via a
//! random walk with mean reversion, per-reading noise, an occasional failed
//! temperature read, and a closed loop from the pump back into soil
//! moisture so automatic watering visibly converges.

use std::sync::{Arc, Mutex};

use tracing::info;

use greenhouse_core::traits::{
    AdcChannel, DisplaySink, LedColor, LedSink, LightSink, MoistureSource, PumpSink, RainSource,
    RcPin, TempHumSource,
};

#[cfg(not(feature = "gpio"))]
use super::Hal;

// ---------------------------------------------------------------------------
// Gaussian approximation (no extra dependency)
// ---------------------------------------------------------------------------

/// Approximate a sample from N(0,1) using the Irwin-Hall method:
/// sum of 12 uniform [0,1) values minus 6.
fn approx_std_normal() -> f64 {
    let mut sum: f64 = 0.0;
    for _ in 0..12 {
        sum += fastrand::f64();
    }
    sum - 6.0
}

/// Sample from N(mean, sigma).
fn gaussian(mean: f64, sigma: f64) -> f64 {
    mean + sigma * approx_std_normal()
}

// ---------------------------------------------------------------------------
// Shared environment
// ---------------------------------------------------------------------------

struct EnvState {
    /// Ambient light as a raw 8-bit ADC level.
    light_raw: f64,
    temp_c: f64,
    hum_pct: f64,
    rain_pct: f64,
    soil_pct: f64,
    pump_on: bool,
    /// Probability that one temp/hum read fails.
    dht_fail_prob: f64,
}

impl EnvState {
    fn new() -> Self {
        Self {
            light_raw: 180.0,
            temp_c: 24.0,
            hum_pct: 55.0,
            rain_pct: 10.0,
            soil_pct: 50.0,
            pump_on: false,
            dht_fail_prob: 0.01,
        }
    }

    /// Advance the world by one cycle.
    fn step(&mut self) {
        self.light_raw = walk(self.light_raw, 180.0, 4.0, 0.0, 255.0);
        self.temp_c = walk(self.temp_c, 24.0, 0.3, -5.0, 45.0);
        self.hum_pct = walk(self.hum_pct, 55.0, 1.0, 0.0, 100.0);
        self.rain_pct = walk(self.rain_pct, 10.0, 2.0, 0.0, 100.0);

        // Soil dries slowly and re-wets while the pump runs.
        let drift = if self.pump_on { 4.0 } else { -0.3 };
        self.soil_pct = (self.soil_pct + drift + gaussian(0.0, 0.5)).clamp(0.0, 100.0);
    }
}

/// Mean-reverting random walk step, clamped to `[min, max]`.
fn walk(value: f64, center: f64, sigma: f64, min: f64, max: f64) -> f64 {
    let reverted = value + (center - value) * 0.05;
    (reverted + gaussian(0.0, sigma)).clamp(min, max)
}

/// Cloneable handle to the shared simulated environment.
#[derive(Clone)]
pub struct SimEnv {
    state: Arc<Mutex<EnvState>>,
}

impl SimEnv {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(EnvState::new())),
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut EnvState) -> T) -> T {
        let mut state = self.state.lock().expect("sim env mutex poisoned");
        f(&mut state)
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Sensors
// ---------------------------------------------------------------------------

/// Ambient-light ADC channel.
pub struct SimAdc {
    env: SimEnv,
}

impl AdcChannel for SimAdc {
    fn read(&mut self) -> anyhow::Result<u8> {
        Ok(self.env.with(|s| s.light_raw.round().clamp(0.0, 255.0) as u8))
    }

    fn reinit(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// RC charge-timing line. Darker ambient light means a higher LDR
/// resistance, so the simulated charge count grows as the light level drops.
pub struct SimRcPin {
    env: SimEnv,
    remaining: u32,
}

impl SimRcPin {
    fn charge_count(light_raw: f64) -> u32 {
        let noisy = gaussian(40.0 + (255.0 - light_raw) * 8.0, 5.0);
        noisy.max(1.0) as u32
    }
}

impl RcPin for SimRcPin {
    fn discharge(&mut self) {}

    fn release(&mut self) {
        self.remaining = self.env.with(|s| Self::charge_count(s.light_raw));
    }

    fn is_high(&mut self) -> bool {
        if self.remaining == 0 {
            true
        } else {
            self.remaining -= 1;
            false
        }
    }
}

/// Temperature/humidity sensor. Reading it steps the whole environment;
/// it is the first sensor each cycle touches.
pub struct SimTempHum {
    env: SimEnv,
}

impl TempHumSource for SimTempHum {
    fn read(&mut self) -> (Option<f64>, Option<f64>) {
        self.env.with(|s| {
            s.step();
            if fastrand::f64() < s.dht_fail_prob {
                (None, None)
            } else {
                (Some(s.temp_c), Some(s.hum_pct))
            }
        })
    }
}

pub struct SimRain {
    env: SimEnv,
}

impl RainSource for SimRain {
    fn read_pct(&mut self) -> Option<f64> {
        Some(self.env.with(|s| s.rain_pct))
    }

    fn is_wet(&mut self) -> bool {
        self.env.with(|s| s.rain_pct) > 60.0
    }
}

pub struct SimMoisture {
    env: SimEnv,
}

impl MoistureSource for SimMoisture {
    fn read(&mut self) -> Option<f64> {
        Some(self.env.with(|s| s.soil_pct))
    }
}

// ---------------------------------------------------------------------------
// Actuators
// ---------------------------------------------------------------------------

/// Pump that feeds back into the simulated soil moisture.
pub struct SimPump {
    env: SimEnv,
}

impl PumpSink for SimPump {
    fn set(&mut self, on: bool) {
        info!("[sim] pump {}", if on { "ON" } else { "OFF" });
        self.env.with(|s| s.pump_on = on);
    }
}

pub struct SimGrowLight;

impl LightSink for SimGrowLight {
    fn set_intensity(&mut self, pct: u8) {
        info!("[sim] grow light {pct}%");
    }
}

pub struct SimLeds;

impl LedSink for SimLeds {
    fn set(&mut self, color: LedColor) {
        info!("[sim] led {color:?}");
    }
}

pub struct SimDisplay;

impl DisplaySink for SimDisplay {
    fn show(&mut self, line1: &str, line2: &str) {
        info!("[sim] lcd: {line1} | {line2}");
    }
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

#[cfg(not(feature = "gpio"))]
pub fn build() -> Hal {
    let env = SimEnv::new();
    Hal {
        light_adc: SimAdc { env: env.clone() },
        rc_pin: SimRcPin {
            env: env.clone(),
            remaining: 0,
        },
        temp_hum: SimTempHum { env: env.clone() },
        rain: SimRain { env: env.clone() },
        moisture: SimMoisture { env: env.clone() },
        pump: SimPump { env },
        grow_light: SimGrowLight,
        leds: SimLeds,
        display: SimDisplay,
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
#[cfg(not(feature = "gpio"))]
mod tests {
    use super::*;

    #[test]
    fn readings_stay_in_range() {
        let mut hal = build();
        for _ in 0..50 {
            let (temp, hum) = hal.temp_hum.read();
            if let Some(t) = temp {
                assert!((-5.0..=45.0).contains(&t));
            }
            if let Some(h) = hum {
                assert!((0.0..=100.0).contains(&h));
            }
            assert!((0.0..=100.0).contains(&hal.rain.read_pct().unwrap()));
            assert!((0.0..=100.0).contains(&hal.moisture.read().unwrap()));
            let raw = hal.light_adc.read().unwrap();
            let _ = raw; // u8: range is the type
        }
    }

    #[test]
    fn pump_feedback_wets_the_soil() {
        let mut hal = build();
        let before = hal.moisture.read().unwrap();
        hal.pump.set(true);
        for _ in 0..30 {
            let _ = hal.temp_hum.read(); // steps the environment
        }
        let after = hal.moisture.read().unwrap();
        assert!(
            after > before,
            "soil should wet while pump runs: {before} -> {after}"
        );
    }

    #[test]
    fn rc_count_rises_when_light_drops() {
        let bright = SimRcPin::charge_count(250.0);
        let dark = SimRcPin::charge_count(10.0);
        assert!(dark > bright, "dark={dark} bright={bright}");
    }

    #[test]
    fn rc_pin_eventually_reads_high() {
        let mut hal = build();
        hal.rc_pin.release();
        let mut iterations = 0u32;
        while !hal.rc_pin.is_high() {
            iterations += 1;
            assert!(iterations < 1_000_000, "rc line never charged");
        }
        assert!(iterations > 0);
    }
}
