//! Bit-banged 74HC595 serial-in/parallel-out writer.

use tracing::{info, trace};

use crate::error::{MotorError, Result};
use crate::traits::pin_port::{Level, Pin, PinPort};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BusPins {
    latch: Pin,
    clock: Pin,
    serial: Pin,
}

/// Three-wire (latch, clock, serial) direction bus.
#[derive(Debug, Default)]
pub struct ShiftRegisterBus {
    pins: Option<BusPins>,
}

impl ShiftRegisterBus {
    /// Bus with no pins assigned.
    pub const fn new() -> Self {
        Self { pins: None }
    }

    /// Assign the bus pins and configure them as outputs.
    ///
    /// The pins are only recorded once all three were configured.
    pub fn configure<P: PinPort>(&mut self, port: &mut P, latch: Pin, clock: Pin, serial: Pin) -> Result<()> {
        for pin in [latch, clock, serial] {
            port.configure_output(pin)?;
        }
        self.pins = Some(BusPins { latch, clock, serial });
        info!(latch, clock, serial, "Direction bus configured");
        Ok(())
    }

    /// Whether all three pins are assigned.
    pub fn is_configured(&self) -> bool {
        self.pins.is_some()
    }

    /// Shift `value` out MSB first and latch it.
    ///
    /// # Errors
    ///
    /// [`MotorError::BusNotConfigured`] before any pin is touched when the bus
    /// was never configured; port failures propagate unchanged.
    pub fn write<P: PinPort>(&self, port: &mut P, value: u8) -> Result<()> {
        let BusPins { latch, clock, serial } = self.pins.ok_or(MotorError::BusNotConfigured)?;

        port.write_level(latch, Level::Low)?;
        let mut shifted = value;
        for _ in 0..8 {
            port.write_level(clock, Level::Low)?;
            port.write_level(serial, Level::from(shifted & 0x80 == 0x80))?;
            port.write_level(clock, Level::High)?;
            shifted <<= 1;
        }
        port.write_level(latch, Level::High)?;
        trace!(value = format_args!("{value:#010b}"), "Direction byte latched");
        Ok(())
    }
}
