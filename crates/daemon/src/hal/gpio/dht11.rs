//! DHT11 single-wire temperature/humidity driver.
//!
//! The protocol is timing-based: the host pulls the line low for 18 ms,
//! releases it, then the sensor answers with an 80 µs/80 µs preamble and
//! 40 data bits where the high-pulse width encodes the bit value. The
//! DHT11 routinely misses the first attempt, so reads retry up to 3 times.
//! A failed read surfaces as `(None, None)`, never as a stale value.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use rppal::gpio::{IoPin, Level, Mode};
use tracing::{debug, warn};

const READ_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Host start signal: hold low at least 18 ms.
const START_LOW: Duration = Duration::from_millis(18);

/// Upper bound for any single protocol phase.
const PHASE_TIMEOUT: Duration = Duration::from_micros(120);

/// High pulses longer than this encode a 1 (nominal: 26–28 µs for 0,
/// 70 µs for 1).
const BIT_ONE_THRESHOLD: Duration = Duration::from_micros(48);

pub struct Dht11 {
    pin: IoPin,
}

impl Dht11 {
    pub fn new(pin: IoPin) -> Self {
        Self { pin }
    }

    fn read_once(&mut self) -> Result<(f64, f64)> {
        // Host start signal, then release the line to the sensor.
        self.pin.set_mode(Mode::Output);
        self.pin.set_low();
        thread::sleep(START_LOW);
        self.pin.set_high();
        self.pin.set_mode(Mode::Input);

        // Sensor preamble: ~80 µs low, ~80 µs high.
        self.wait_for(Level::Low, PHASE_TIMEOUT)?;
        self.wait_for(Level::High, PHASE_TIMEOUT)?;
        self.wait_for(Level::Low, PHASE_TIMEOUT)?;

        let mut data = [0u8; 5];
        for bit in 0..40 {
            // 50 µs low separator, then the width-coded high pulse.
            self.wait_for(Level::High, PHASE_TIMEOUT)?;
            let width = self.wait_for(Level::Low, PHASE_TIMEOUT)?;
            if width > BIT_ONE_THRESHOLD {
                data[bit / 8] |= 1 << (7 - bit % 8);
            }
        }

        let sum = data[0]
            .wrapping_add(data[1])
            .wrapping_add(data[2])
            .wrapping_add(data[3]);
        if sum != data[4] {
            bail!("dht11 checksum mismatch: {data:02x?}");
        }

        let hum = f64::from(data[0]) + f64::from(data[1]) / 10.0;
        let temp = f64::from(data[2]) + f64::from(data[3]) / 10.0;
        Ok((temp, hum))
    }

    /// Busy-wait until the line reads `level`; returns how long it took.
    fn wait_for(&mut self, level: Level, timeout: Duration) -> Result<Duration> {
        let start = Instant::now();
        while self.pin.read() != level {
            if start.elapsed() > timeout {
                bail!("dht11 timed out waiting for {level:?}");
            }
        }
        Ok(start.elapsed())
    }
}

impl greenhouse_core::traits::TempHumSource for Dht11 {
    fn read(&mut self) -> (Option<f64>, Option<f64>) {
        for attempt in 1..=READ_ATTEMPTS {
            match self.read_once() {
                Ok((temp, hum)) => {
                    debug!(temp, hum, "dht11 read");
                    return (Some(temp), Some(hum));
                }
                Err(e) => {
                    warn!("dht11 read failed (attempt {attempt}/{READ_ATTEMPTS}): {e}");
                    if attempt < READ_ATTEMPTS {
                        thread::sleep(RETRY_DELAY);
                    }
                }
            }
        }
        (None, None)
    }
}
