//! Sensor-health and alert classification.
//!
//! Priority-ordered, first match wins: persistent sensor failure, anomaly,
//! banded environmental warnings, all-clear. The classifier is the sole
//! owner of the LED bank and the display; sinks are only written when the
//! alert actually changes, so a borderline signal can never flicker them.

use anyhow::Result;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::hysteresis::HysteresisBand;
use crate::traits::{DisplaySink, LedColor, LedSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Ok,
    Warn,
    Error,
    Critical,
}

/// One classification result: status level, two display lines, LED color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub status: Status,
    pub line1: String,
    pub line2: String,
    pub led: LedColor,
}

/// Debounce counter for missing readings: increments per missing cycle,
/// resets on the first valid one, fires only once the threshold is reached.
#[derive(Debug, Clone)]
pub struct FailureCounter {
    count: u32,
    threshold: u32,
}

impl FailureCounter {
    pub fn new(threshold: u32) -> Self {
        Self {
            count: 0,
            threshold,
        }
    }

    /// Record one missing reading; returns whether the failure is now
    /// considered persistent.
    pub fn record_missing(&mut self) -> bool {
        self.count += 1;
        self.count >= self.threshold
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

/// Classification thresholds; all configurable (see the daemon config).
#[derive(Debug, Clone)]
pub struct AlertThresholds {
    /// Air humidity % band for the fungus-risk warning.
    pub humidity_warn_off: f64,
    pub humidity_warn_on: f64,
    /// Rain intensity % band for the heavy-rain warning.
    pub rain_warn_off: f64,
    pub rain_warn_on: f64,
    /// Missing-reading cycles before a sensor counts as failed.
    pub failure_threshold: u32,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            humidity_warn_off: 75.0,
            humidity_warn_on: 80.0,
            rain_warn_off: 40.0,
            rain_warn_on: 60.0,
            failure_threshold: 5,
        }
    }
}

pub struct AlertClassifier<L: LedSink, D: DisplaySink> {
    leds: L,
    display: D,
    failures: FailureCounter,
    humidity: HysteresisBand,
    rain: HysteresisBand,
    last: Alert,
}

impl<L: LedSink, D: DisplaySink> AlertClassifier<L, D> {
    pub fn new(leds: L, display: D, thresholds: AlertThresholds) -> Result<Self> {
        let humidity =
            HysteresisBand::new(thresholds.humidity_warn_off, thresholds.humidity_warn_on)?;
        let rain = HysteresisBand::new(thresholds.rain_warn_off, thresholds.rain_warn_on)?;
        Ok(Self {
            leds,
            display,
            failures: FailureCounter::new(thresholds.failure_threshold),
            humidity,
            rain,
            last: Alert {
                status: Status::Ok,
                line1: "T:--C H:--%".to_string(),
                line2: "Starting".to_string(),
                led: LedColor::Green,
            },
        })
    }

    /// Classify one cycle's readings and drive the LED bank and display.
    ///
    /// `rain_wet` is the normalized digital rain line (`true` = rain).
    /// Below the failure-debounce threshold the previous alert is returned
    /// unchanged and no sink is touched.
    pub fn update(
        &mut self,
        temp: Option<f64>,
        hum: Option<f64>,
        rain_pct: Option<f64>,
        rain_wet: bool,
        is_dark: bool,
        has_anomaly: bool,
    ) -> Alert {
        let Some(alert) = self.classify(temp, hum, rain_pct, rain_wet, is_dark, has_anomaly)
        else {
            return self.last.clone();
        };

        if alert != self.last {
            match alert.status {
                Status::Ok => info!(line1 = %alert.line1, "alerts: all clear"),
                Status::Warn => warn!(line2 = %alert.line2, "alerts: warning"),
                Status::Error | Status::Critical => {
                    error!(status = ?alert.status, line2 = %alert.line2, "alerts: raised")
                }
            }
            self.leds.set(alert.led);
            self.display.show(&alert.line1, &alert.line2);
            self.last = alert.clone();
        }
        alert
    }

    /// `None` means "inside the debounce window, hold the previous alert".
    fn classify(
        &mut self,
        temp: Option<f64>,
        hum: Option<f64>,
        rain_pct: Option<f64>,
        rain_wet: bool,
        is_dark: bool,
        has_anomaly: bool,
    ) -> Option<Alert> {
        // 1. Sensor failure, debounced against a single glitch.
        let (Some(t), Some(h)) = (temp, hum) else {
            if self.failures.record_missing() {
                return Some(Alert {
                    status: Status::Error,
                    line1: "ERROR".to_string(),
                    line2: "E01: temp/hum".to_string(),
                    led: LedColor::Red,
                });
            }
            return None;
        };
        self.failures.reset();

        let readings = format!("T:{t:.1}C H:{h:.0}%");

        // 2. Anomaly oracle.
        if has_anomaly {
            return Some(Alert {
                status: Status::Critical,
                line1: readings,
                line2: "Anomaly detected".to_string(),
                led: LedColor::Red,
            });
        }

        // 3. Banded environmental warnings.
        if rain_wet {
            let pct = rain_pct.map_or_else(|| "--".to_string(), |p| format!("{p:.0}%"));
            return Some(Alert {
                status: Status::Warn,
                line1: readings,
                line2: format!("Rain {pct}"),
                led: LedColor::Orange,
            });
        }
        if let Some(p) = rain_pct {
            if self.rain.update(p) {
                return Some(Alert {
                    status: Status::Warn,
                    line1: readings,
                    line2: "Warn: heavy rain".to_string(),
                    led: LedColor::Orange,
                });
            }
        }
        if self.humidity.update(h) {
            return Some(Alert {
                status: Status::Warn,
                line1: readings,
                line2: "Warn: humidity".to_string(),
                led: LedColor::Orange,
            });
        }

        // 4. All clear.
        let phase = if is_dark { "Night" } else { "Day" };
        Some(Alert {
            status: Status::Ok,
            line1: readings,
            line2: format!("Lux:OK {phase}"),
            led: LedColor::Green,
        })
    }

    pub fn failure_count(&self) -> u32 {
        self.failures.count()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    struct TestLeds {
        color: Arc<Mutex<Option<LedColor>>>,
        writes: Arc<AtomicU32>,
    }

    impl LedSink for TestLeds {
        fn set(&mut self, color: LedColor) {
            *self.color.lock().unwrap() = Some(color);
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct TestDisplay {
        lines: Arc<Mutex<(String, String)>>,
    }

    impl DisplaySink for TestDisplay {
        fn show(&mut self, line1: &str, line2: &str) {
            *self.lines.lock().unwrap() = (line1.to_string(), line2.to_string());
        }
    }

    struct Fixture {
        classifier: AlertClassifier<TestLeds, TestDisplay>,
        color: Arc<Mutex<Option<LedColor>>>,
        led_writes: Arc<AtomicU32>,
        lines: Arc<Mutex<(String, String)>>,
    }

    fn fixture() -> Fixture {
        let color = Arc::new(Mutex::new(None));
        let led_writes = Arc::new(AtomicU32::new(0));
        let lines = Arc::new(Mutex::new((String::new(), String::new())));
        let classifier = AlertClassifier::new(
            TestLeds {
                color: Arc::clone(&color),
                writes: Arc::clone(&led_writes),
            },
            TestDisplay {
                lines: Arc::clone(&lines),
            },
            AlertThresholds::default(),
        )
        .unwrap();
        Fixture {
            classifier,
            color,
            led_writes,
            lines,
        }
    }

    /// A nominal all-clear cycle: 23.5 °C, 60 % RH, light rain percent, dry
    /// line, daytime, no anomaly.
    fn ok_cycle(f: &mut Fixture) -> Alert {
        f.classifier
            .update(Some(23.5), Some(60.0), Some(10.0), false, false, false)
    }

    // -- FailureCounter ---------------------------------------------------

    #[test]
    fn failure_counter_fires_at_threshold() {
        let mut c = FailureCounter::new(3);
        assert!(!c.record_missing());
        assert!(!c.record_missing());
        assert!(c.record_missing());
        assert!(c.record_missing()); // stays fired while missing
    }

    #[test]
    fn failure_counter_resets_to_zero() {
        let mut c = FailureCounter::new(3);
        c.record_missing();
        c.record_missing();
        c.reset();
        assert_eq!(c.count(), 0);
        assert!(!c.record_missing());
    }

    // -- Debounce ---------------------------------------------------------

    #[test]
    fn four_missing_cycles_do_not_raise_error() {
        let mut f = fixture();
        for _ in 0..4 {
            let alert = f
                .classifier
                .update(None, Some(60.0), Some(10.0), false, false, false);
            assert_ne!(alert.status, Status::Error);
        }
        // Inside the debounce window no sink is touched.
        assert_eq!(f.led_writes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn fifth_missing_cycle_raises_error() {
        let mut f = fixture();
        for _ in 0..4 {
            f.classifier
                .update(None, None, Some(10.0), false, false, false);
        }
        let alert = f
            .classifier
            .update(None, None, Some(10.0), false, false, false);
        assert_eq!(alert.status, Status::Error);
        assert_eq!(*f.color.lock().unwrap(), Some(LedColor::Red));
        assert_eq!(f.lines.lock().unwrap().1, "E01: temp/hum");
    }

    #[test]
    fn valid_reading_resets_the_counter() {
        let mut f = fixture();
        for _ in 0..4 {
            f.classifier
                .update(None, None, Some(10.0), false, false, false);
        }
        ok_cycle(&mut f);
        assert_eq!(f.classifier.failure_count(), 0);

        // Four more misses still stay below the threshold.
        for _ in 0..4 {
            let alert = f
                .classifier
                .update(None, None, Some(10.0), false, false, false);
            assert_ne!(alert.status, Status::Error);
        }
    }

    // -- Priority order ---------------------------------------------------

    #[test]
    fn anomaly_is_critical_and_red() {
        let mut f = fixture();
        let alert = f
            .classifier
            .update(Some(23.5), Some(60.0), Some(10.0), false, false, true);
        assert_eq!(alert.status, Status::Critical);
        assert_eq!(alert.led, LedColor::Red);
    }

    #[test]
    fn anomaly_outranks_rain() {
        let mut f = fixture();
        let alert = f
            .classifier
            .update(Some(23.5), Some(60.0), Some(90.0), true, false, true);
        assert_eq!(alert.status, Status::Critical);
    }

    #[test]
    fn digital_rain_line_warns() {
        let mut f = fixture();
        let alert = f
            .classifier
            .update(Some(23.5), Some(60.0), Some(42.0), true, false, false);
        assert_eq!(alert.status, Status::Warn);
        assert_eq!(alert.led, LedColor::Orange);
        assert_eq!(alert.line2, "Rain 42%");
    }

    #[test]
    fn heavy_rain_band_warns_and_clears_with_hysteresis() {
        let mut f = fixture();
        let heavy = f
            .classifier
            .update(Some(23.5), Some(60.0), Some(70.0), false, false, false);
        assert_eq!(heavy.status, Status::Warn);
        assert_eq!(heavy.line2, "Warn: heavy rain");

        // Inside the band: warning holds.
        let holding = f
            .classifier
            .update(Some(23.5), Some(60.0), Some(50.0), false, false, false);
        assert_eq!(holding.status, Status::Warn);

        // Below the clear threshold: back to OK.
        let cleared = f
            .classifier
            .update(Some(23.5), Some(60.0), Some(20.0), false, false, false);
        assert_eq!(cleared.status, Status::Ok);
    }

    #[test]
    fn high_humidity_warns_with_hysteresis() {
        let mut f = fixture();
        let warn = f
            .classifier
            .update(Some(23.5), Some(85.0), Some(10.0), false, false, false);
        assert_eq!(warn.status, Status::Warn);
        assert_eq!(warn.line2, "Warn: humidity");

        let holding = f
            .classifier
            .update(Some(23.5), Some(77.0), Some(10.0), false, false, false);
        assert_eq!(holding.status, Status::Warn);

        let cleared = f
            .classifier
            .update(Some(23.5), Some(70.0), Some(10.0), false, false, false);
        assert_eq!(cleared.status, Status::Ok);
    }

    // -- All clear --------------------------------------------------------

    #[test]
    fn ok_summarizes_readings_and_phase() {
        let mut f = fixture();
        let alert = ok_cycle(&mut f);
        assert_eq!(alert.status, Status::Ok);
        assert_eq!(alert.led, LedColor::Green);
        assert_eq!(alert.line1, "T:23.5C H:60%");
        assert_eq!(alert.line2, "Lux:OK Day");

        let night = f
            .classifier
            .update(Some(18.0), Some(55.0), Some(5.0), false, true, false);
        assert_eq!(night.line2, "Lux:OK Night");
    }

    #[test]
    fn sinks_written_only_on_alert_change() {
        let mut f = fixture();
        ok_cycle(&mut f);
        ok_cycle(&mut f);
        ok_cycle(&mut f);
        assert_eq!(f.led_writes.load(Ordering::SeqCst), 1);
        assert_eq!(*f.color.lock().unwrap(), Some(LedColor::Green));
    }
}
