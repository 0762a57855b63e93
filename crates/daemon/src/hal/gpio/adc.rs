//! 8-bit I2C ADC driver (ADS7830-compatible) for the rain, soil, and light
//! channels. One bus handle is shared behind a mutex so concurrent channel
//! owners never interleave a command byte with another channel's read.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use rppal::i2c::I2c;
use tracing::info;

use greenhouse_core::traits::AdcChannel;

/// Command byte base: single-ended input, internal reference and converter
/// powered on.
const CMD_SINGLE_ENDED: u8 = 0x84;

/// Channel select bits live in [6:4].
fn command_for_channel(channel: u8) -> u8 {
    CMD_SINGLE_ENDED | ((channel & 0x07) << 4)
}

// ---------------------------------------------------------------------------
// Board + per-channel handles
// ---------------------------------------------------------------------------

pub struct AdcBoard {
    bus: Arc<Mutex<I2c>>,
    addr: u16,
}

impl AdcBoard {
    pub fn new(addr: u16) -> Result<Self> {
        let mut i2c = I2c::new().context("failed to open I2C bus")?;
        i2c.set_slave_address(addr)
            .with_context(|| format!("failed to address ADC at {addr:#04x}"))?;

        info!(addr = format_args!("0x{addr:02x}"), "adc initialised");

        Ok(Self {
            bus: Arc::new(Mutex::new(i2c)),
            addr,
        })
    }

    /// A handle for one input channel, sharing this board's bus.
    pub fn channel(&self, channel: u8) -> AdcChannelHandle {
        AdcChannelHandle {
            bus: Arc::clone(&self.bus),
            addr: self.addr,
            channel,
        }
    }
}

pub struct AdcChannelHandle {
    bus: Arc<Mutex<I2c>>,
    addr: u16,
    channel: u8,
}

impl AdcChannel for AdcChannelHandle {
    fn read(&mut self) -> Result<u8> {
        let mut bus = self.bus.lock().expect("adc bus mutex poisoned");
        bus.write(&[command_for_channel(self.channel)])
            .with_context(|| format!("adc channel {} select failed", self.channel))?;
        let mut buf = [0u8; 1];
        bus.read(&mut buf)
            .with_context(|| format!("adc channel {} read failed", self.channel))?;
        Ok(buf[0])
    }

    /// Reopen the bus in place. All sibling channel handles pick up the
    /// fresh handle through the shared mutex.
    fn reinit(&mut self) -> Result<()> {
        let mut bus = self.bus.lock().expect("adc bus mutex poisoned");
        let mut i2c = I2c::new().context("i2c re-init failed")?;
        i2c.set_slave_address(self.addr)
            .context("i2c re-init: set address failed")?;
        *bus = i2c;
        info!("adc bus re-initialised");
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================
