//! Dry-run pin port
//!
//! Stands in for GPIO hardware: every call is logged through `tracing` and
//! the last level of each pin is remembered.

use std::collections::BTreeMap;

use tracing::{debug, info, trace};

use crate::traits::pin_port::{Level, NumberingMode, Pin, PinPort, PortError, PwmChannel};

/// Pin port that only logs.
#[derive(Debug, Default)]
pub struct DryRunPort {
    levels: BTreeMap<Pin, Level>,
}

impl DryRunPort {
    /// Port with no configured pins.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last level written to `pin`, if it is configured.
    pub fn level(&self, pin: Pin) -> Option<Level> {
        self.levels.get(&pin).copied()
    }
}

impl PinPort for DryRunPort {
    type Pwm = DryRunPwm;

    fn set_numbering_mode(&mut self, mode: NumberingMode) -> Result<(), PortError> {
        info!(%mode, "PIN numbering");
        Ok(())
    }

    fn configure_output(&mut self, pin: Pin) -> Result<(), PortError> {
        debug!(pin, "Configured output");
        self.levels.insert(pin, Level::Low);
        Ok(())
    }

    fn write_level(&mut self, pin: Pin, level: Level) -> Result<(), PortError> {
        let slot = self.levels.get_mut(&pin).ok_or(PortError::NotAnOutput(pin))?;
        trace!(pin, ?level, "Write");
        *slot = level;
        Ok(())
    }

    fn create_pwm(&mut self, pin: Pin, frequency_hz: u32) -> Result<Self::Pwm, PortError> {
        if !self.levels.contains_key(&pin) {
            return Err(PortError::NotAnOutput(pin));
        }
        if frequency_hz == 0 {
            return Err(PortError::InvalidFrequency(frequency_hz));
        }
        Ok(DryRunPwm { pin, frequency_hz })
    }

    fn release_all(&mut self) -> Result<(), PortError> {
        info!(pins = self.levels.len(), "Releasing all pins");
        self.levels.clear();
        Ok(())
    }
}

/// PWM channel of [`DryRunPort`].
#[derive(Debug)]
pub struct DryRunPwm {
    pin: Pin,
    frequency_hz: u32,
}

impl PwmChannel for DryRunPwm {
    fn start(&mut self, duty_cycle: u8) -> Result<(), PortError> {
        debug!(pin = self.pin, frequency_hz = self.frequency_hz, duty_cycle, "PWM start");
        Ok(())
    }

    fn change_duty_cycle(&mut self, duty_cycle: u8) -> Result<(), PortError> {
        debug!(pin = self.pin, duty_cycle, "PWM duty cycle");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PortError> {
        debug!(pin = self.pin, "PWM stop");
        Ok(())
    }
}
