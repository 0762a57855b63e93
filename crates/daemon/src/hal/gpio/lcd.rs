//! 16×2 HD44780 character LCD behind a PCF8574 I2C backpack.
//!
//! The backpack maps the expander bits to RS/RW/EN/backlight plus the high
//! data nibble, so every byte goes out as two enable-pulsed nibbles.

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use rppal::i2c::I2c;
use tracing::{error, info};

use greenhouse_core::traits::DisplaySink;

/// Common PCF8574 backpack address.
pub const DEFAULT_ADDR: u16 = 0x27;

const COLS: usize = 16;

// PCF8574 bit assignments.
const BACKLIGHT: u8 = 0x08;
const ENABLE: u8 = 0x04;
const REGISTER_SELECT: u8 = 0x01; // 0 = command, 1 = data

// HD44780 commands.
const CMD_CLEAR: u8 = 0x01;
const CMD_FUNCTION_4BIT_2LINE: u8 = 0x28;
const CMD_DISPLAY_ON: u8 = 0x0C;
const CMD_ENTRY_LEFT_TO_RIGHT: u8 = 0x06;
const LINE_ADDR: [u8; 2] = [0x80, 0xC0];

pub struct Lcd1602 {
    i2c: I2c,
}

impl Lcd1602 {
    pub fn new(addr: u16) -> Result<Self> {
        let mut i2c = I2c::new().context("failed to open I2C bus for LCD")?;
        i2c.set_slave_address(addr)
            .with_context(|| format!("failed to address LCD at {addr:#04x}"))?;

        let mut lcd = Self { i2c };
        lcd.init()?;
        info!(addr = format_args!("0x{addr:02x}"), "lcd initialised");
        Ok(lcd)
    }

    fn init(&mut self) -> Result<()> {
        // 4-bit mode handshake per the HD44780 datasheet.
        thread::sleep(Duration::from_millis(50));
        self.write_nibble(0x30, false)?;
        thread::sleep(Duration::from_millis(5));
        self.write_nibble(0x30, false)?;
        thread::sleep(Duration::from_millis(1));
        self.write_nibble(0x30, false)?;
        self.write_nibble(0x20, false)?;

        self.command(CMD_FUNCTION_4BIT_2LINE)?;
        self.command(CMD_DISPLAY_ON)?;
        self.command(CMD_ENTRY_LEFT_TO_RIGHT)?;
        self.clear()
    }

    fn clear(&mut self) -> Result<()> {
        self.command(CMD_CLEAR)?;
        // Clear needs ~1.5 ms, longer than ordinary commands.
        thread::sleep(Duration::from_millis(2));
        Ok(())
    }

    fn command(&mut self, byte: u8) -> Result<()> {
        self.write_byte(byte, false)
    }

    fn write_text(&mut self, line: usize, text: &str) -> Result<()> {
        self.command(LINE_ADDR[line])?;
        // Pad to the full width so leftovers from the previous frame vanish.
        for ch in text
            .chars()
            .chain(std::iter::repeat(' '))
            .take(COLS)
        {
            let byte = if ch.is_ascii() { ch as u8 } else { b'?' };
            self.write_byte(byte, true)?;
        }
        Ok(())
    }

    fn write_byte(&mut self, byte: u8, data: bool) -> Result<()> {
        self.write_nibble(byte & 0xF0, data)?;
        self.write_nibble(byte << 4, data)
    }

    /// Put one nibble on D4–D7 and pulse the enable line.
    fn write_nibble(&mut self, nibble: u8, data: bool) -> Result<()> {
        let rs = if data { REGISTER_SELECT } else { 0 };
        let frame = (nibble & 0xF0) | BACKLIGHT | rs;

        self.i2c.write(&[frame | ENABLE]).context("lcd i2c write")?;
        thread::sleep(Duration::from_micros(1));
        self.i2c.write(&[frame]).context("lcd i2c write")?;
        thread::sleep(Duration::from_micros(50));
        Ok(())
    }
}

impl DisplaySink for Lcd1602 {
    fn show(&mut self, line1: &str, line2: &str) {
        for (i, text) in [line1, line2].into_iter().enumerate() {
            if let Err(e) = self.write_text(i, text) {
                error!("lcd write failed: {e}");
                return;
            }
        }
    }
}
