//! Recording pin port for testing
//!
//! Journals every call so tests can assert on the exact pin traffic,
//! including the bit-level shift register protocol.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::traits::pin_port::{Level, NumberingMode, Pin, PinPort, PortError, PwmChannel};

/// One call observed by [`RecordingPort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum PortEvent {
    NumberingMode(NumberingMode),
    ConfigureOutput(Pin),
    Write(Pin, Level),
    PwmCreated { pin: Pin, frequency_hz: u32 },
    PwmStarted { pin: Pin, duty_cycle: u8 },
    PwmDutyChanged { pin: Pin, duty_cycle: u8 },
    PwmStopped { pin: Pin },
    ReleaseAll,
}

type Journal = Arc<Mutex<Vec<PortEvent>>>;

/// Mock port
///
/// Rejects writes to pins that were never configured as outputs, the way a
/// real GPIO layer would.
#[derive(Debug, Default)]
pub struct RecordingPort {
    journal: Journal,
    outputs: BTreeSet<Pin>,
    failing: BTreeSet<Pin>,
    failing_pwm_stops: BTreeSet<Pin>,
}

impl RecordingPort {
    /// Port with an empty journal and no outputs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `configure_output(pin)` fail with [`PortError::PinUnavailable`].
    pub fn fail_pin(&mut self, pin: Pin) {
        self.failing.insert(pin);
    }

    /// Make `stop()` fail on every PWM channel later created for `pin`.
    pub fn fail_pwm_stop(&mut self, pin: Pin) {
        self.failing_pwm_stops.insert(pin);
    }

    /// Copy of the journal so far.
    pub fn events(&self) -> Vec<PortEvent> {
        self.journal.lock().clone()
    }

    /// Read-only view of the journal that outlives the port.
    pub fn observer(&self) -> PortObserver {
        PortObserver {
            journal: Arc::clone(&self.journal),
        }
    }

    /// Drop all journaled events.
    pub fn clear(&self) {
        self.journal.lock().clear();
    }

    /// Events concerning PWM channels only.
    pub fn pwm_events(&self) -> Vec<PortEvent> {
        self.journal
            .lock()
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    PortEvent::PwmCreated { .. }
                        | PortEvent::PwmStarted { .. }
                        | PortEvent::PwmDutyChanged { .. }
                        | PortEvent::PwmStopped { .. }
                )
            })
            .copied()
            .collect()
    }

    /// Last level written to `pin`, if any.
    pub fn level(&self, pin: Pin) -> Option<Level> {
        self.journal.lock().iter().rev().find_map(|e| match *e {
            PortEvent::Write(p, level) if p == pin => Some(level),
            _ => None,
        })
    }

    /// Bytes latched into the shift register so far, see [`decode_bus_writes`].
    pub fn bus_writes(&self, latch: Pin, clock: Pin, serial: Pin) -> Vec<u8> {
        decode_bus_writes(&self.journal.lock(), latch, clock, serial)
    }

    fn record(&self, event: PortEvent) {
        self.journal.lock().push(event);
    }
}

impl PinPort for RecordingPort {
    type Pwm = RecordingPwm;

    fn set_numbering_mode(&mut self, mode: NumberingMode) -> Result<(), PortError> {
        self.record(PortEvent::NumberingMode(mode));
        Ok(())
    }

    fn configure_output(&mut self, pin: Pin) -> Result<(), PortError> {
        if self.failing.contains(&pin) {
            return Err(PortError::PinUnavailable(pin));
        }
        self.outputs.insert(pin);
        self.record(PortEvent::ConfigureOutput(pin));
        Ok(())
    }

    fn write_level(&mut self, pin: Pin, level: Level) -> Result<(), PortError> {
        if !self.outputs.contains(&pin) {
            return Err(PortError::NotAnOutput(pin));
        }
        self.record(PortEvent::Write(pin, level));
        Ok(())
    }

    fn create_pwm(&mut self, pin: Pin, frequency_hz: u32) -> Result<Self::Pwm, PortError> {
        if !self.outputs.contains(&pin) {
            return Err(PortError::NotAnOutput(pin));
        }
        if frequency_hz == 0 {
            return Err(PortError::InvalidFrequency(frequency_hz));
        }
        self.record(PortEvent::PwmCreated { pin, frequency_hz });
        Ok(RecordingPwm {
            pin,
            stop_fails: self.failing_pwm_stops.contains(&pin),
            journal: Arc::clone(&self.journal),
        })
    }

    fn release_all(&mut self) -> Result<(), PortError> {
        self.outputs.clear();
        self.record(PortEvent::ReleaseAll);
        Ok(())
    }
}

/// Journal view returned by [`RecordingPort::observer`].
#[derive(Debug, Clone)]
pub struct PortObserver {
    journal: Journal,
}

impl PortObserver {
    /// Copy of the journal so far.
    pub fn events(&self) -> Vec<PortEvent> {
        self.journal.lock().clone()
    }

    /// Same as [`RecordingPort::bus_writes`].
    pub fn bus_writes(&self, latch: Pin, clock: Pin, serial: Pin) -> Vec<u8> {
        decode_bus_writes(&self.journal.lock(), latch, clock, serial)
    }
}

/// Reassemble the bytes latched into the shift register.
///
/// A byte is the serial level sampled on every rising clock edge between a
/// latch LOW and the following latch HIGH.
pub fn decode_bus_writes(events: &[PortEvent], latch: Pin, clock: Pin, serial: Pin) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut shifting = false;
    let mut data = Level::Low;
    let mut value = 0u8;
    let mut bits = 0;

    for event in events {
        let PortEvent::Write(pin, level) = *event else {
            continue;
        };
        if pin == latch {
            match level {
                Level::Low => {
                    shifting = true;
                    value = 0;
                    bits = 0;
                }
                Level::High if shifting => {
                    shifting = false;
                    if bits == 8 {
                        bytes.push(value);
                    }
                }
                Level::High => {}
            }
        } else if shifting && pin == serial {
            data = level;
        } else if shifting && pin == clock && level == Level::High {
            value = (value << 1) | u8::from(data == Level::High);
            bits += 1;
        }
    }
    bytes
}

/// PWM handle handed out by [`RecordingPort`]; shares the port's journal.
#[derive(Debug)]
pub struct RecordingPwm {
    pin: Pin,
    stop_fails: bool,
    journal: Journal,
}

impl PwmChannel for RecordingPwm {
    fn start(&mut self, duty_cycle: u8) -> Result<(), PortError> {
        self.journal.lock().push(PortEvent::PwmStarted { pin: self.pin, duty_cycle });
        Ok(())
    }

    fn change_duty_cycle(&mut self, duty_cycle: u8) -> Result<(), PortError> {
        self.journal.lock().push(PortEvent::PwmDutyChanged { pin: self.pin, duty_cycle });
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PortError> {
        if self.stop_fails {
            return Err(PortError::Platform(format!("PWM on pin {} did not stop", self.pin)));
        }
        self.journal.lock().push(PortEvent::PwmStopped { pin: self.pin });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_requires_output() {
        let mut port = RecordingPort::new();
        assert_eq!(port.write_level(3, Level::High), Err(PortError::NotAnOutput(3)));
        port.configure_output(3).unwrap();
        port.write_level(3, Level::High).unwrap();
        assert_eq!(port.level(3), Some(Level::High));
    }

    #[test]
    fn test_failing_pin() {
        let mut port = RecordingPort::new();
        port.fail_pin(7);
        assert_eq!(port.configure_output(7), Err(PortError::PinUnavailable(7)));
        assert!(port.events().is_empty());
    }

    #[test]
    fn test_pwm_shares_journal() {
        let mut port = RecordingPort::new();
        port.configure_output(6).unwrap();
        let mut pwm = port.create_pwm(6, 50).unwrap();
        pwm.start(30).unwrap();
        pwm.change_duty_cycle(60).unwrap();
        pwm.stop().unwrap();
        assert_eq!(
            port.pwm_events(),
            vec![
                PortEvent::PwmCreated { pin: 6, frequency_hz: 50 },
                PortEvent::PwmStarted { pin: 6, duty_cycle: 30 },
                PortEvent::PwmDutyChanged { pin: 6, duty_cycle: 60 },
                PortEvent::PwmStopped { pin: 6 },
            ]
        );
    }

    #[test]
    fn test_bus_decoder_ignores_incomplete_frames() {
        let mut port = RecordingPort::new();
        for pin in [1, 2, 3] {
            port.configure_output(pin).unwrap();
        }
        port.write_level(1, Level::Low).unwrap();
        port.write_level(3, Level::High).unwrap();
        port.write_level(2, Level::High).unwrap();
        port.write_level(1, Level::High).unwrap();
        assert!(port.bus_writes(1, 2, 3).is_empty());
    }
}
