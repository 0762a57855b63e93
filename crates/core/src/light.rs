//! Dual-method ambient-light estimator.
//!
//! Fuses an 8-bit ADC sample (absolute lux scale) with an RC charge-timing
//! measurement (self-calibrated day/night decision). The RC baseline is
//! measured once at startup; declaring "dark" requires the charge time to
//! rise 30 % above baseline while clearing it only requires falling back
//! under +15 %, which is the hysteresis guarantee against day/night chatter.
//! If calibration produces an implausibly small baseline the estimator
//! degrades permanently to a fixed ADC threshold instead of failing.

use std::thread;
use std::time::Duration;

use anyhow::{ensure, Result};
use tracing::{debug, info, warn};

use crate::hysteresis::HysteresisBand;
use crate::traits::{AdcChannel, RcPin};

/// Tuning knobs for the estimator. Defaults match the deployed hardware
/// (LDR + capacitor on a GPIO line, 8-bit ADC).
#[derive(Debug, Clone)]
pub struct LightTuning {
    /// Relative rise over baseline that declares darkness.
    pub delta_on: f64,
    /// Relative rise under which darkness clears. Must be below `delta_on`.
    pub delta_off: f64,
    /// Baselines below this raw count mark calibration as failed.
    pub baseline_floor: f64,
    /// Fixed fallback threshold: lux below this means dark.
    pub dark_lux: u16,
    /// RC samples averaged during calibration.
    pub calibration_samples: u32,
    /// Fast RC samples averaged per `read()`.
    pub read_samples: u32,
    /// Iteration cap for one RC sample; a stuck line returns this count.
    pub rc_timeout_count: u32,
    /// Capacitor discharge settle time during calibration.
    pub calibration_settle: Duration,
    /// Shorter settle for the fast per-cycle samples.
    pub read_settle: Duration,
}

impl Default for LightTuning {
    fn default() -> Self {
        Self {
            delta_on: 0.30,
            delta_off: 0.15,
            baseline_floor: 10.0,
            dark_lux: 100,
            calibration_samples: 10,
            read_samples: 5,
            rc_timeout_count: 50_000,
            calibration_settle: Duration::from_millis(100),
            read_settle: Duration::from_millis(5),
        }
    }
}

/// Result of one `read()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightReading {
    /// Approximate illuminance, 0–1000.
    pub lux: u16,
    pub is_dark: bool,
}

/// Outcome of the one-time RC calibration.
#[derive(Debug, Clone)]
pub struct CalibrationState {
    pub baseline: f64,
    pub threshold_on: f64,
    pub threshold_off: f64,
    pub calibrated: bool,
}

impl CalibrationState {
    fn uncalibrated() -> Self {
        Self {
            baseline: 0.0,
            threshold_on: 0.0,
            threshold_off: 0.0,
            calibrated: false,
        }
    }
}

pub struct LightEstimator<A: AdcChannel, R: RcPin> {
    adc: A,
    rc: R,
    tuning: LightTuning,
    calibration: CalibrationState,
    /// Present only while calibrated; holds the is_dark state.
    band: Option<HysteresisBand>,
    last: LightReading,
}

impl<A: AdcChannel, R: RcPin> LightEstimator<A, R> {
    pub fn new(adc: A, rc: R, tuning: LightTuning) -> Result<Self> {
        ensure!(
            tuning.delta_off > 0.0 && tuning.delta_on > tuning.delta_off,
            "light tuning requires delta_on > delta_off > 0, got on={} off={}",
            tuning.delta_on,
            tuning.delta_off
        );
        ensure!(
            tuning.calibration_samples >= 10,
            "calibration needs at least 10 RC samples, got {}",
            tuning.calibration_samples
        );
        ensure!(tuning.read_samples >= 1, "read_samples must be at least 1");
        Ok(Self {
            adc,
            rc,
            tuning,
            calibration: CalibrationState::uncalibrated(),
            band: None,
            last: LightReading {
                lux: 0,
                is_dark: false,
            },
        })
    }

    /// One-time blocking baseline measurement (~2 s). Must run before the
    /// cycle loop starts; never recomputed unless called again explicitly.
    pub fn calibrate(&mut self) {
        let n = self.tuning.calibration_samples;
        let mut total: u64 = 0;
        for _ in 0..n {
            total += u64::from(self.rc_sample(self.tuning.calibration_settle));
        }
        let baseline = total as f64 / f64::from(n);

        if baseline < self.tuning.baseline_floor {
            warn!(
                baseline,
                floor = self.tuning.baseline_floor,
                "RC baseline below sanity floor — falling back to fixed ADC threshold"
            );
            self.calibration = CalibrationState {
                baseline,
                ..CalibrationState::uncalibrated()
            };
            self.band = None;
            return;
        }

        let threshold_on = baseline * (1.0 + self.tuning.delta_on);
        let threshold_off = baseline * (1.0 + self.tuning.delta_off);
        self.band = Some(
            HysteresisBand::new(threshold_off, threshold_on)
                .expect("delta_on > delta_off keeps the band ordered"),
        );
        self.calibration = CalibrationState {
            baseline,
            threshold_on,
            threshold_off,
            calibrated: true,
        };
        info!(
            baseline,
            threshold_on, threshold_off, "light sensor calibrated"
        );
    }

    /// Read ambient light. Never returns an error: a transient bus fault is
    /// recovered with one re-init attempt, after which the previous reading
    /// is returned instead.
    pub fn read(&mut self) -> LightReading {
        let raw = match self.read_adc_recovering() {
            Some(raw) => raw,
            None => return self.last,
        };
        let lux = (f64::from(raw) / 255.0 * 1000.0).round() as u16;

        let is_dark = match self.band.take() {
            Some(mut band) => {
                let avg = self.rc_average();
                let dark = band.update(avg);
                debug!(avg, dark, "rc light sample");
                self.band = Some(band);
                dark
            }
            None => lux < self.tuning.dark_lux,
        };

        self.last = LightReading { lux, is_dark };
        self.last
    }

    pub fn calibration(&self) -> &CalibrationState {
        &self.calibration
    }

    pub fn last(&self) -> LightReading {
        self.last
    }

    /// Average of `read_samples` fast RC samples.
    fn rc_average(&mut self) -> f64 {
        let n = self.tuning.read_samples;
        let mut total: u64 = 0;
        for _ in 0..n {
            total += u64::from(self.rc_sample(self.tuning.read_settle));
        }
        total as f64 / f64::from(n)
    }

    /// One RC charge-timing sample: discharge the capacitor, release the
    /// line, count loop iterations until it reads high. A stuck line
    /// returns the capped count instead of blocking.
    fn rc_sample(&mut self, settle: Duration) -> u32 {
        self.rc.discharge();
        if !settle.is_zero() {
            thread::sleep(settle);
        }
        self.rc.release();

        let mut count: u32 = 0;
        while !self.rc.is_high() {
            count += 1;
            if count >= self.tuning.rc_timeout_count {
                break;
            }
        }
        count
    }

    fn read_adc_recovering(&mut self) -> Option<u8> {
        match self.adc.read() {
            Ok(raw) => Some(raw),
            Err(e) => {
                warn!("light adc read failed: {e} — attempting bus re-init");
                if let Err(e) = self.adc.reinit() {
                    warn!("light adc re-init failed: {e}");
                    return None;
                }
                match self.adc.read() {
                    Ok(raw) => Some(raw),
                    Err(e) => {
                        warn!("light adc read still failing after re-init: {e}");
                        None
                    }
                }
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
