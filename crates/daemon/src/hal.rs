//! Hardware selection.
//!
//! The `gpio` feature wires the real rppal-backed drivers; the default
//! `sim` feature substitutes stateful simulators so the daemon runs on any
//! development machine. Concrete types are chosen at compile time through
//! the aliases below; the controllers only ever see the capability traits.

use anyhow::Result;
use time::OffsetDateTime;

use greenhouse_core::traits::Clock;

use crate::config::GpioConfig;

#[cfg(feature = "gpio")]
pub mod gpio;
#[cfg(feature = "sim")]
pub mod sim;

#[cfg(not(any(feature = "sim", feature = "gpio")))]
compile_error!("greenhouse-daemon needs at least one of the `sim` or `gpio` features");

// ---------------------------------------------------------------------------
// Concrete implementation aliases
// ---------------------------------------------------------------------------

#[cfg(feature = "gpio")]
mod impls {
    pub type LightAdcImpl = super::gpio::adc::AdcChannelHandle;
    pub type RcPinImpl = super::gpio::pins::RcTimingPin;
    pub type TempHumImpl = super::gpio::dht11::Dht11;
    pub type RainImpl = super::gpio::RainSensor;
    pub type MoistureImpl = super::gpio::MoistureSensor;
    pub type PumpImpl = super::gpio::pins::RelayPump;
    pub type GrowLightImpl = super::gpio::pins::PwmGrowLight;
    pub type LedsImpl = super::gpio::pins::LedBank;
    pub type DisplayImpl = super::gpio::lcd::Lcd1602;
}

#[cfg(all(feature = "sim", not(feature = "gpio")))]
mod impls {
    pub type LightAdcImpl = super::sim::SimAdc;
    pub type RcPinImpl = super::sim::SimRcPin;
    pub type TempHumImpl = super::sim::SimTempHum;
    pub type RainImpl = super::sim::SimRain;
    pub type MoistureImpl = super::sim::SimMoisture;
    pub type PumpImpl = super::sim::SimPump;
    pub type GrowLightImpl = super::sim::SimGrowLight;
    pub type LedsImpl = super::sim::SimLeds;
    pub type DisplayImpl = super::sim::SimDisplay;
}

pub use impls::*;

// ---------------------------------------------------------------------------
// The assembled hardware bundle
// ---------------------------------------------------------------------------

pub struct Hal {
    pub light_adc: LightAdcImpl,
    pub rc_pin: RcPinImpl,
    pub temp_hum: TempHumImpl,
    pub rain: RainImpl,
    pub moisture: MoistureImpl,
    pub pump: PumpImpl,
    pub grow_light: GrowLightImpl,
    pub leds: LedsImpl,
    pub display: DisplayImpl,
}

#[cfg(feature = "gpio")]
pub fn build(cfg: &GpioConfig) -> Result<Hal> {
    gpio::build(cfg)
}

#[cfg(all(feature = "sim", not(feature = "gpio")))]
pub fn build(_cfg: &GpioConfig) -> Result<Hal> {
    tracing::info!("simulated hardware in use — build with --features gpio for real drivers");
    Ok(sim::build())
}

// ---------------------------------------------------------------------------
// Wall clock
// ---------------------------------------------------------------------------

/// Local wall-clock hour; falls back to UTC when the local offset cannot be
/// determined (containers without tzdata).
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn hour(&self) -> u8 {
        OffsetDateTime::now_local()
            .unwrap_or_else(|_| OffsetDateTime::now_utc())
            .hour()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_returns_valid_hour() {
        let hour = SystemClock.hour();
        assert!(hour < 24);
    }
}
