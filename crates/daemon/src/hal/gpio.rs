//! Real rppal-backed drivers (Raspberry Pi, `gpio` feature).

pub mod adc;
pub mod dht11;
pub mod lcd;
pub mod pins;

use anyhow::{Context, Result};
use rppal::gpio::{Gpio, InputPin, Mode};
use tracing::warn;

use greenhouse_core::traits::{AdcChannel, MoistureSource, RainSource};

use super::Hal;
use crate::config::GpioConfig;

use self::adc::{AdcBoard, AdcChannelHandle};

// ---------------------------------------------------------------------------
// Composite sensors on top of the shared ADC
// ---------------------------------------------------------------------------

/// Rain sensor: analog intensity channel plus the digital wet/dry line.
/// The wire is active-low (low = rain); callers only ever see `is_wet`.
pub struct RainSensor {
    channel: AdcChannelHandle,
    digital: InputPin,
}

impl RainSource for RainSensor {
    fn read_pct(&mut self) -> Option<f64> {
        match self.channel.read() {
            Ok(raw) => Some(f64::from(raw) / 255.0 * 100.0),
            Err(e) => {
                warn!("rain adc read failed: {e}");
                None
            }
        }
    }

    fn is_wet(&mut self) -> bool {
        self.digital.is_low()
    }
}

/// Capacitive soil moisture probe on one ADC channel. Raw counts drop as
/// the soil gets wetter, so the percentage is the inverted scale.
pub struct MoistureSensor {
    channel: AdcChannelHandle,
}

impl MoistureSource for MoistureSensor {
    fn read(&mut self) -> Option<f64> {
        match self.channel.read() {
            Ok(raw) => Some((255.0 - f64::from(raw)) / 255.0 * 100.0),
            Err(e) => {
                warn!("soil adc read failed: {e}");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

pub fn build(cfg: &GpioConfig) -> Result<Hal> {
    let gpio = Gpio::new().context("failed to open GPIO")?;
    let board = AdcBoard::new(cfg.adc_address)?;

    let rain = RainSensor {
        channel: board.channel(cfg.adc_rain_channel),
        digital: gpio
            .get(cfg.rain_digital_pin)
            .context("rain digital pin")?
            .into_input_pullup(),
    };
    let moisture = MoistureSensor {
        channel: board.channel(cfg.adc_soil_channel),
    };

    Ok(Hal {
        light_adc: board.channel(cfg.adc_light_channel),
        rc_pin: pins::RcTimingPin::new(
            gpio.get(cfg.rc_pin).context("rc pin")?.into_io(Mode::Input),
        ),
        temp_hum: dht11::Dht11::new(
            gpio.get(cfg.dht_pin).context("dht pin")?.into_io(Mode::Input),
        ),
        rain,
        moisture,
        pump: pins::RelayPump::new(
            gpio.get(cfg.pump_pin).context("pump pin")?.into_output(),
            cfg.pump_active_low,
        ),
        grow_light: pins::PwmGrowLight::new(
            gpio.get(cfg.grow_light_pin)
                .context("grow light pin")?
                .into_output(),
        ),
        leds: pins::LedBank::new(
            gpio.get(cfg.led_green_pin).context("green led pin")?.into_output(),
            gpio.get(cfg.led_orange_pin).context("orange led pin")?.into_output(),
            gpio.get(cfg.led_red_pin).context("red led pin")?.into_output(),
        ),
        display: lcd::Lcd1602::new(lcd::DEFAULT_ADDR)?,
    })
}
