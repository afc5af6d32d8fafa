//! Raspberry Pi pin port backed by `rppal`.
//!
//! PWM is rppal's software PWM on the enable pin itself, so any GPIO can carry
//! a motor's speed. rppal addresses pins by BCM number only.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rppal::gpio::{self, Gpio, OutputPin};
use tracing::{debug, info};

use crate::traits::pin_port::{Level, NumberingMode, Pin, PinPort, PortError, PwmChannel};

type SharedPin = Arc<Mutex<OutputPin>>;

/// GPIO header of the host Raspberry Pi.
pub struct RppalPort {
    gpio: Gpio,
    outputs: BTreeMap<Pin, SharedPin>,
}

impl RppalPort {
    /// Open the GPIO peripheral.
    pub fn new() -> Result<Self, PortError> {
        let gpio = Gpio::new().map_err(port_error)?;
        Ok(Self {
            gpio,
            outputs: BTreeMap::new(),
        })
    }

    fn output(&self, pin: Pin) -> Result<&SharedPin, PortError> {
        self.outputs.get(&pin).ok_or(PortError::NotAnOutput(pin))
    }
}

impl PinPort for RppalPort {
    type Pwm = RppalPwm;

    fn set_numbering_mode(&mut self, mode: NumberingMode) -> Result<(), PortError> {
        match mode {
            NumberingMode::Bcm => {
                info!(%mode, "PIN numbering");
                Ok(())
            }
            NumberingMode::Board => Err(PortError::Platform("rppal only supports BCM numbering".to_string())),
        }
    }

    fn configure_output(&mut self, pin: Pin) -> Result<(), PortError> {
        if self.outputs.contains_key(&pin) {
            return Ok(());
        }
        let output = self.gpio.get(pin).map_err(port_error)?.into_output_low();
        debug!(pin, "Configured output");
        self.outputs.insert(pin, Arc::new(Mutex::new(output)));
        Ok(())
    }

    fn write_level(&mut self, pin: Pin, level: Level) -> Result<(), PortError> {
        let mut output = self.output(pin)?.lock();
        match level {
            Level::Low => output.set_low(),
            Level::High => output.set_high(),
        }
        Ok(())
    }

    fn create_pwm(&mut self, pin: Pin, frequency_hz: u32) -> Result<Self::Pwm, PortError> {
        if frequency_hz == 0 {
            return Err(PortError::InvalidFrequency(frequency_hz));
        }
        Ok(RppalPwm {
            pin,
            frequency_hz: f64::from(frequency_hz),
            output: Arc::clone(self.output(pin)?),
        })
    }

    fn release_all(&mut self) -> Result<(), PortError> {
        info!(pins = self.outputs.len(), "Releasing all pins");
        for output in self.outputs.values() {
            let mut output = output.lock();
            output.clear_pwm().map_err(port_error)?;
            output.set_low();
        }
        // Dropped pins are reset to inputs by rppal.
        self.outputs.clear();
        Ok(())
    }
}

/// Software PWM on one enable pin.
pub struct RppalPwm {
    pin: Pin,
    frequency_hz: f64,
    output: SharedPin,
}

impl RppalPwm {
    fn apply(&mut self, duty_cycle: u8) -> Result<(), PortError> {
        self.output
            .lock()
            .set_pwm_frequency(self.frequency_hz, f64::from(duty_cycle) / 100.0)
            .map_err(port_error)
    }
}

impl PwmChannel for RppalPwm {
    fn start(&mut self, duty_cycle: u8) -> Result<(), PortError> {
        debug!(pin = self.pin, frequency_hz = self.frequency_hz, duty_cycle, "PWM start");
        self.apply(duty_cycle)
    }

    fn change_duty_cycle(&mut self, duty_cycle: u8) -> Result<(), PortError> {
        debug!(pin = self.pin, duty_cycle, "PWM duty cycle");
        self.apply(duty_cycle)
    }

    fn stop(&mut self) -> Result<(), PortError> {
        debug!(pin = self.pin, "PWM stop");
        self.output.lock().clear_pwm().map_err(port_error)
    }
}

fn port_error(err: gpio::Error) -> PortError {
    match err {
        gpio::Error::PinNotAvailable(pin) => PortError::PinUnavailable(pin),
        other => PortError::Platform(other.to_string()),
    }
}
