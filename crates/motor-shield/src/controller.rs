//! The four-motor controller: run/stop commands, PWM settings and teardown.

use std::collections::BTreeMap;

use tracing::{debug, error, info, warn};

use crate::devices::direction::{DirectionTable, Intent, StopMode};
use crate::devices::motor::{MotorId, MotorPhase, MotorState};
use crate::devices::shift_register::ShiftRegisterBus;
use crate::error::{MotorError, Result};
use crate::pwm;
use crate::registry::MotorRegistry;
use crate::traits::pin_port::{NumberingMode, Pin, PinPort};

/// Outcome of a successful [`MotorController::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Motor that was started.
    pub motor: MotorId,
    /// Byte latched into the direction register.
    pub register: u8,
    /// A rejected speed; the motor runs at its previous duty cycle.
    pub warning: Option<MotorError>,
}

impl RunReport {
    /// `true` when the command was applied exactly as requested.
    pub fn is_clean(&self) -> bool {
        self.warning.is_none()
    }
}

/// Four DC motors behind one shift register and four enable pins.
///
/// Every command recomputes the whole register from the registry, so each
/// call needs exclusive access (`&mut self`). Share the controller behind a
/// mutex held for the full call.
///
/// Dropping the controller (including during unwinding) stops every motor and
/// releases the port; [`MotorController::shutdown`] does the same and
/// reports failures.
pub struct MotorController<P: PinPort> {
    port: P,
    bus: ShiftRegisterBus,
    registry: MotorRegistry<P::Pwm>,
    register: u8,
    torn_down: bool,
}

impl<P: PinPort> MotorController<P> {
    /// Controller for the L293D shield wiring, coasting on stop.
    pub fn new(port: P, numbering: NumberingMode) -> Result<Self> {
        Self::with_options(port, numbering, DirectionTable::L293D_SHIELD, StopMode::Coast)
    }

    /// Controller with an explicit direction table and stop behaviour.
    pub fn with_options(mut port: P, numbering: NumberingMode, table: DirectionTable, stop_mode: StopMode) -> Result<Self> {
        table.validate()?;
        port.set_numbering_mode(numbering)?;
        info!(%numbering, ?stop_mode, "Motor controller initialized");

        Ok(Self {
            port,
            bus: ShiftRegisterBus::new(),
            registry: MotorRegistry::new(&table, stop_mode),
            register: 0,
            torn_down: false,
        })
    }

    /// Wire the 74HC595 latch, clock and serial lines.
    pub fn configure_direction_bus(&mut self, latch: Pin, clock: Pin, serial: Pin) -> Result<()> {
        self.bus.configure(&mut self.port, latch, clock, serial)
    }

    /// Assign enable pins in motor order; `None` leaves a motor unusable.
    ///
    /// Nothing is assigned unless every given pin could be configured.
    ///
    /// # Errors
    ///
    /// [`MotorError::MotorRunning`] when the assignment of a running motor would change.
    pub fn configure_motor_pins(&mut self, pins: [Option<Pin>; 4]) -> Result<()> {
        for id in MotorId::ALL {
            let motor = self.registry.get(id);
            if motor.is_running() && motor.enable_pin() != pins[id.index()] {
                warn!(motor = %id, "Refusing to reassign the pin of a running motor");
                return Err(MotorError::MotorRunning(id));
            }
        }
        for pin in pins.iter().flatten() {
            self.port.configure_output(*pin)?;
        }
        for id in MotorId::ALL {
            self.registry.get_mut(id).enable_pin = pins[id.index()];
        }
        info!(?pins, "Motor enable pins configured");
        Ok(())
    }

    /// Spin `motor` in the given direction.
    ///
    /// `speed` is a duty cycle in percent; `None` drives the enable pin fully
    /// HIGH without PWM. A speed above 100 is reported in
    /// [`RunReport::warning`] while the direction still changes and the motor
    /// keeps its previous duty cycle.
    ///
    /// # Errors
    ///
    /// - [`MotorError::MotorNotConfigured`] if the enable pin is missing.
    /// - [`MotorError::BusNotConfigured`] if the direction bus is missing.
    ///
    /// Neither touches the hardware or the registry.
    pub fn run(&mut self, motor: MotorId, clockwise: bool, speed: Option<u8>) -> Result<RunReport> {
        if self.registry.get(motor).enable_pin().is_none() {
            warn!(motor = %motor, "Pin for motor is not set, can not run motor");
            return Err(MotorError::MotorNotConfigured(motor));
        }
        if !self.bus.is_configured() {
            warn!(motor = %motor, "Direction bus pins were not set");
            return Err(MotorError::BusNotConfigured);
        }

        let (register, value) = self.registry.resolve(motor, Intent::run(clockwise));
        self.bus.write(&mut self.port, register)?;
        self.register = register;

        let record = self.registry.get_mut(motor);
        let warning = match pwm::apply_speed(&mut self.port, record, speed) {
            Ok(()) => None,
            Err(err @ MotorError::InvalidSpeedRange { .. }) => {
                warn!(motor = %motor, %err, "Keeping previous speed");
                Some(err)
            }
            Err(err) => return Err(err),
        };
        record.running = true;
        record.direction_value = value;

        debug!(
            motor = %motor,
            clockwise,
            ?speed,
            register = format_args!("{register:#010b}"),
            "Motor running"
        );
        Ok(RunReport { motor, register, warning })
    }

    /// Run each motor in turn. A failing motor does not prevent the others.
    pub fn run_many(&mut self, motors: &[MotorId], clockwise: bool, speed: Option<u8>) -> Vec<Result<RunReport>> {
        motors.iter().map(|&motor| self.run(motor, clockwise, speed)).collect()
    }

    /// Stop `motor`, leaving every other motor's direction bits untouched.
    ///
    /// # Errors
    ///
    /// [`MotorError::MotorNotConfigured`] for a motor without an enable pin.
    /// An unwired motor is not an operational fault, so this is only logged at
    /// debug level.
    pub fn stop(&mut self, motor: MotorId) -> Result<()> {
        if self.registry.get(motor).enable_pin().is_none() {
            debug!(motor = %motor, "Pin for motor is not set, nothing to stop");
            return Err(MotorError::MotorNotConfigured(motor));
        }
        if !self.bus.is_configured() {
            warn!(motor = %motor, "Direction bus pins were not set");
            return Err(MotorError::BusNotConfigured);
        }

        let (register, _) = self.registry.resolve(motor, Intent::Stop);
        self.bus.write(&mut self.port, register)?;
        self.register = register;

        let record = self.registry.get_mut(motor);
        pwm::release(&mut self.port, record)?;
        record.running = false;
        record.direction_value = 0;

        debug!(motor = %motor, register = format_args!("{register:#010b}"), "Motor stopped");
        Ok(())
    }

    /// Stop motors in order, giving up at the first failure.
    pub fn stop_many(&mut self, motors: &[MotorId]) -> Result<()> {
        for &motor in motors {
            self.stop(motor)?;
        }
        Ok(())
    }

    /// Configured PWM frequency of every motor, in Hz.
    pub fn pwm_frequencies(&self) -> BTreeMap<MotorId, u32> {
        self.registry.iter().map(|m| (m.id(), m.pwm_frequency_hz())).collect()
    }

    /// Update PWM frequencies keyed by raw motor identity.
    ///
    /// The update is all-or-nothing. A motor already running on PWM keeps its
    /// channel; the new frequency applies the next time a channel is created.
    ///
    /// # Errors
    ///
    /// [`MotorError::UnknownMotorIdentity`] for a key outside `1..=4`,
    /// [`MotorError::InvalidFrequency`] for a zero frequency.
    pub fn set_pwm_frequencies<I>(&mut self, frequencies: I) -> Result<()>
    where
        I: IntoIterator<Item = (u8, u32)>,
    {
        let updates = frequencies
            .into_iter()
            .map(|(raw, hz)| {
                let id = MotorId::try_from(raw)?;
                if hz == 0 {
                    return Err(MotorError::InvalidFrequency(id));
                }
                Ok((id, hz))
            })
            .collect::<Result<Vec<_>>>()
            .inspect_err(|err| warn!(%err, "Rejected PWM frequency update"))?;

        for (id, hz) in updates {
            let motor = self.registry.get_mut(id);
            motor.pwm_frequency_hz = hz;
            if motor.has_pwm() {
                debug!(motor = %id, hz, "PWM frequency deferred until the channel is recreated");
            }
        }
        Ok(())
    }

    /// Last applied duty cycle of every motor, in percent.
    pub fn pwm_duty_cycles(&self) -> BTreeMap<MotorId, u8> {
        self.registry.iter().map(|m| (m.id(), m.duty_cycle())).collect()
    }

    /// Snapshot of `motor`.
    pub fn state(&self, motor: MotorId) -> MotorState {
        self.registry.get(motor).state()
    }

    /// Lifecycle position of `motor`.
    pub fn phase(&self, motor: MotorId) -> MotorPhase {
        self.registry.get(motor).phase()
    }

    /// Last byte latched into the direction register.
    pub fn register(&self) -> u8 {
        self.register
    }

    /// The injected pin port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Stop everything and release the port, reporting the first failure.
    pub fn shutdown(mut self) -> Result<()> {
        self.teardown()
    }

    fn teardown(&mut self) -> Result<()> {
        if self.torn_down {
            return Ok(());
        }
        self.torn_down = true;
        info!("Shutting down motor controller");

        let mut first_error = None;
        let mut note = |result: Result<()>| {
            if let Err(err) = result {
                error!(%err, "Teardown step failed");
                first_error.get_or_insert(err);
            }
        };

        if self.bus.is_configured() {
            let written = self.bus.write(&mut self.port, 0);
            if written.is_ok() {
                self.register = 0;
            }
            note(written);
        }
        for id in MotorId::ALL {
            let motor = self.registry.get_mut(id);
            if motor.enable_pin().is_none() {
                continue;
            }
            note(pwm::release(&mut self.port, motor));
            motor.running = false;
            motor.direction_value = 0;
        }
        note(self.port.release_all().map_err(MotorError::from));

        first_error.map_or(Ok(()), Err)
    }
}

impl<P: PinPort> Drop for MotorController<P> {
    fn drop(&mut self) {
        if let Err(err) = self.teardown() {
            error!(%err, "Motor controller teardown failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{PortEvent, RecordingPort};
    use crate::traits::pin_port::Level;

    const LATCH: Pin = 21;
    const CLOCK: Pin = 20;
    const SERIAL: Pin = 16;

    fn controller(stop_mode: StopMode) -> MotorController<RecordingPort> {
        let mut c = MotorController::with_options(
            RecordingPort::new(),
            NumberingMode::Bcm,
            DirectionTable::L293D_SHIELD,
            stop_mode,
        )
        .unwrap();
        c.configure_direction_bus(LATCH, CLOCK, SERIAL).unwrap();
        c.configure_motor_pins([Some(5), Some(6), Some(13), Some(19)]).unwrap();
        c.port().clear();
        c
    }

    fn writes(c: &MotorController<RecordingPort>) -> Vec<u8> {
        c.port().bus_writes(LATCH, CLOCK, SERIAL)
    }

    #[test]
    fn test_construction_sets_numbering() {
        let c = MotorController::new(RecordingPort::new(), NumberingMode::Board).unwrap();
        assert_eq!(c.port().events(), vec![PortEvent::NumberingMode(NumberingMode::Board)]);
        for id in MotorId::ALL {
            assert_eq!(c.phase(id), MotorPhase::Unconfigured);
        }
    }

    #[test]
    fn test_opposite_directions_compose() {
        let mut c = controller(StopMode::Coast);
        let r1 = c.run(MotorId::M1, true, None).unwrap();
        let r3 = c.run(MotorId::M3, false, None).unwrap();
        assert_eq!(r1.register, 4);
        assert_eq!(r3.register, 4 | 128);
        c.stop(MotorId::M1).unwrap();
        assert_eq!(writes(&c), vec![4, 4 | 128, 128]);
        assert_eq!(c.register(), 128);
        assert_eq!(c.phase(MotorId::M3), MotorPhase::RunningDigital);
    }

    #[test]
    fn test_reverse_running_motor() {
        let mut c = controller(StopMode::Coast);
        c.run(MotorId::M2, true, Some(40)).unwrap();
        c.run(MotorId::M2, false, Some(60)).unwrap();
        assert_eq!(writes(&c), vec![2, 16]);
        assert_eq!(c.state(MotorId::M2).direction_value, 16);
        assert_eq!(
            c.port().pwm_events(),
            vec![
                PortEvent::PwmCreated { pin: 6, frequency_hz: 10 },
                PortEvent::PwmStarted { pin: 6, duty_cycle: 40 },
                PortEvent::PwmDutyChanged { pin: 6, duty_cycle: 60 },
            ]
        );
    }

    #[test]
    fn test_full_speed_after_pwm_releases_handle() {
        let mut c = controller(StopMode::Coast);
        c.run(MotorId::M1, true, Some(50)).unwrap();
        assert_eq!(c.phase(MotorId::M1), MotorPhase::RunningPwm);
        c.run(MotorId::M1, true, None).unwrap();
        assert_eq!(c.phase(MotorId::M1), MotorPhase::RunningDigital);
        assert!(!c.state(MotorId::M1).pwm_active);
        assert_eq!(c.port().level(5), Some(Level::High));
        assert_eq!(c.port().pwm_events().last(), Some(&PortEvent::PwmStopped { pin: 5 }));
    }

    #[test]
    fn test_invalid_speed_is_a_warning() {
        let mut c = controller(StopMode::Coast);
        c.run(MotorId::M4, true, Some(30)).unwrap();
        let report = c.run(MotorId::M4, true, Some(150)).unwrap();
        assert!(!report.is_clean());
        assert!(matches!(
            report.warning,
            Some(MotorError::InvalidSpeedRange { requested: 150, retained: 30, .. })
        ));
        assert_eq!(c.pwm_duty_cycles()[&MotorId::M4], 30);
        assert_eq!(c.phase(MotorId::M4), MotorPhase::RunningPwm);
    }

    #[test]
    fn test_run_unconfigured_motor() {
        let mut c = controller(StopMode::Coast);
        c.configure_motor_pins([Some(5), None, Some(13), Some(19)]).unwrap();
        c.port().clear();
        assert_eq!(c.run(MotorId::M2, true, None), Err(MotorError::MotorNotConfigured(MotorId::M2)));
        assert!(c.port().events().is_empty());
        assert!(!c.state(MotorId::M2).running);
    }

    #[test]
    fn test_stop_unconfigured_motor_writes_nothing() {
        let mut c = MotorController::new(RecordingPort::new(), NumberingMode::Bcm).unwrap();
        c.configure_direction_bus(LATCH, CLOCK, SERIAL).unwrap();
        c.port().clear();
        assert_eq!(c.stop(MotorId::M3), Err(MotorError::MotorNotConfigured(MotorId::M3)));
        assert!(writes(&c).is_empty());
        assert!(c.port().events().is_empty());
    }

    #[test]
    fn test_bus_not_configured() {
        let mut c = MotorController::new(RecordingPort::new(), NumberingMode::Bcm).unwrap();
        c.configure_motor_pins([Some(5), None, None, None]).unwrap();
        c.port().clear();
        assert_eq!(c.run(MotorId::M1, true, None), Err(MotorError::BusNotConfigured));
        assert_eq!(c.stop(MotorId::M1), Err(MotorError::BusNotConfigured));
        assert!(c.port().events().is_empty());
        assert_eq!(c.phase(MotorId::M1), MotorPhase::Stopped);
    }

    #[test]
    fn test_run_many_continues_past_failures() {
        let mut c = controller(StopMode::Coast);
        c.configure_motor_pins([Some(5), None, Some(13), Some(19)]).unwrap();
        let results = c.run_many(&[MotorId::M1, MotorId::M2, MotorId::M3], true, None);
        assert!(results[0].is_ok());
        assert_eq!(results[1], Err(MotorError::MotorNotConfigured(MotorId::M2)));
        assert!(results[2].is_ok());
        assert_eq!(c.register(), 4 | 32);
    }

    #[test]
    fn test_stop_many_is_fail_fast() {
        let mut c = controller(StopMode::Coast);
        c.run_many(&[MotorId::M1, MotorId::M3, MotorId::M4], true, None);
        // Running motors keep their pins, so only motor 2 changes.
        c.configure_motor_pins([Some(5), None, Some(13), Some(19)]).unwrap();
        let result = c.stop_many(&[MotorId::M1, MotorId::M2, MotorId::M3]);
        assert_eq!(result, Err(MotorError::MotorNotConfigured(MotorId::M2)));
        assert!(!c.state(MotorId::M1).running);
        assert!(c.state(MotorId::M3).running);
    }

    #[test]
    fn test_reassign_running_motor_rejected() {
        let mut c = controller(StopMode::Coast);
        c.run(MotorId::M1, true, None).unwrap();
        let result = c.configure_motor_pins([Some(7), Some(6), Some(13), Some(19)]);
        assert_eq!(result, Err(MotorError::MotorRunning(MotorId::M1)));
        assert_eq!(c.state(MotorId::M1).enable_pin, Some(5));
    }

    #[test]
    fn test_pin_failure_assigns_nothing() {
        let mut port = RecordingPort::new();
        port.fail_pin(13);
        let mut c = MotorController::new(port, NumberingMode::Bcm).unwrap();
        let result = c.configure_motor_pins([Some(5), Some(6), Some(13), Some(19)]);
        assert!(matches!(result, Err(MotorError::Port(_))));
        assert!(!result.unwrap_err().is_recoverable());
        assert_eq!(c.phase(MotorId::M1), MotorPhase::Unconfigured);
    }

    #[test]
    fn test_set_frequencies_is_atomic() {
        let mut c = controller(StopMode::Coast);
        c.set_pwm_frequencies([(1, 50), (2, 60)]).unwrap();
        let before = c.pwm_frequencies();

        assert_eq!(c.set_pwm_frequencies([(3, 70), (5, 20)]), Err(MotorError::UnknownMotorIdentity(5)));
        assert_eq!(c.set_pwm_frequencies([(4, 0)]), Err(MotorError::InvalidFrequency(MotorId::M4)));
        assert_eq!(c.pwm_frequencies(), before);
        assert_eq!(before[&MotorId::M1], 50);
        assert_eq!(before[&MotorId::M3], 10);
    }

    #[test]
    fn test_frequency_used_for_next_channel() {
        let mut c = controller(StopMode::Coast);
        c.run(MotorId::M3, true, Some(20)).unwrap();
        c.set_pwm_frequencies([(3, 200)]).unwrap();
        c.run(MotorId::M3, true, Some(30)).unwrap();
        c.stop(MotorId::M3).unwrap();
        c.run(MotorId::M3, true, Some(40)).unwrap();
        let created: Vec<_> = c
            .port()
            .pwm_events()
            .into_iter()
            .filter(|e| matches!(e, PortEvent::PwmCreated { .. }))
            .collect();
        assert_eq!(
            created,
            vec![
                PortEvent::PwmCreated { pin: 13, frequency_hz: 10 },
                PortEvent::PwmCreated { pin: 13, frequency_hz: 200 },
            ]
        );
    }

    #[test]
    fn test_brake_mode_stop_write() {
        let mut c = controller(StopMode::Brake);
        c.run(MotorId::M1, true, None).unwrap();
        c.run(MotorId::M2, false, None).unwrap();
        c.stop(MotorId::M1).unwrap();
        c.run(MotorId::M4, true, None).unwrap();
        assert_eq!(writes(&c), vec![4, 4 | 16, 4 | 8 | 16, 16 | 1]);
        assert_eq!(c.state(MotorId::M1).direction_value, 0);
    }

    #[test]
    fn test_teardown_releases_everything() {
        let mut c = controller(StopMode::Coast);
        c.run(MotorId::M1, true, None).unwrap();
        c.run(MotorId::M2, false, Some(75)).unwrap();
        c.port().clear();

        c.teardown().unwrap();
        let events = c.port().events();
        assert_eq!(writes(&c), vec![0]);
        assert!(events.contains(&PortEvent::PwmStopped { pin: 6 }));
        assert!(events.contains(&PortEvent::Write(5, Level::Low)));
        assert_eq!(events.last(), Some(&PortEvent::ReleaseAll));
        for id in MotorId::ALL {
            assert!(!c.state(id).running);
            assert!(!c.state(id).pwm_active);
        }

        // The second pass (from Drop) is a no-op.
        c.port().clear();
        c.teardown().unwrap();
        assert!(c.port().events().is_empty());
    }

    #[test]
    fn test_teardown_without_bus_still_releases() {
        let mut c = MotorController::new(RecordingPort::new(), NumberingMode::Bcm).unwrap();
        c.configure_motor_pins([None, None, Some(13), None]).unwrap();
        c.port().clear();
        c.teardown().unwrap();
        assert_eq!(
            c.port().events(),
            vec![PortEvent::Write(13, Level::Low), PortEvent::ReleaseAll]
        );
    }
}
