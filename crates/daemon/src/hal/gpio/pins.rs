//! GPIO-backed actuator sinks and the RC charge-timing pin.

use rppal::gpio::{IoPin, Mode, OutputPin};
use tracing::{error, info};

use greenhouse_core::traits::{LedColor, LedSink, LightSink, PumpSink, RcPin};

// ---------------------------------------------------------------------------
// Pump relay
// ---------------------------------------------------------------------------

/// Relay-driven pump. Many relay boards are active-low; the constructor
/// forces the fail-safe OFF level either way.
pub struct RelayPump {
    pin: OutputPin,
    active_low: bool,
}

impl RelayPump {
    pub fn new(mut pin: OutputPin, active_low: bool) -> Self {
        if active_low {
            pin.set_high();
        } else {
            pin.set_low();
        }
        Self { pin, active_low }
    }
}

impl PumpSink for RelayPump {
    fn set(&mut self, on: bool) {
        if on == self.active_low {
            self.pin.set_low();
        } else {
            self.pin.set_high();
        }
        info!("pump {}", if on { "ON" } else { "OFF" });
    }
}

// ---------------------------------------------------------------------------
// Grow light
// ---------------------------------------------------------------------------

/// Software-PWM dimmed grow light.
pub struct PwmGrowLight {
    pin: OutputPin,
}

/// Slow enough for software PWM jitter not to matter on an LED driver.
const PWM_HZ: f64 = 100.0;

impl PwmGrowLight {
    pub fn new(pin: OutputPin) -> Self {
        Self { pin }
    }
}

impl LightSink for PwmGrowLight {
    fn set_intensity(&mut self, pct: u8) {
        let result = if pct == 0 {
            self.pin.clear_pwm().map(|()| self.pin.set_low())
        } else {
            self.pin.set_pwm_frequency(PWM_HZ, f64::from(pct) / 100.0)
        };
        match result {
            Ok(()) => info!("grow light {pct}%"),
            Err(e) => error!("grow light pwm failed: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Status LEDs
// ---------------------------------------------------------------------------

/// Three-LED status bank; exactly one LED is lit at a time.
pub struct LedBank {
    green: OutputPin,
    orange: OutputPin,
    red: OutputPin,
}

impl LedBank {
    pub fn new(mut green: OutputPin, mut orange: OutputPin, mut red: OutputPin) -> Self {
        green.set_low();
        orange.set_low();
        red.set_low();
        Self { green, orange, red }
    }
}

impl LedSink for LedBank {
    fn set(&mut self, color: LedColor) {
        self.green.set_low();
        self.orange.set_low();
        self.red.set_low();
        match color {
            LedColor::Green => self.green.set_high(),
            LedColor::Orange => self.orange.set_high(),
            LedColor::Red => self.red.set_high(),
        }
        info!("led {color:?}");
    }
}

// ---------------------------------------------------------------------------
// RC timing line
// ---------------------------------------------------------------------------

/// The LDR + capacitor line: output-low to discharge, input to charge.
pub struct RcTimingPin {
    pin: IoPin,
}

impl RcTimingPin {
    pub fn new(pin: IoPin) -> Self {
        Self { pin }
    }
}

impl RcPin for RcTimingPin {
    fn discharge(&mut self) {
        self.pin.set_mode(Mode::Output);
        self.pin.set_low();
    }

    fn release(&mut self) {
        self.pin.set_mode(Mode::Input);
    }

    fn is_high(&mut self) -> bool {
        self.pin.is_high()
    }
}
