//! Enable-pin drive: digital full speed or a PWM channel per motor.

use tracing::debug;

use crate::devices::motor::Motor;
use crate::error::{MotorError, Result};
use crate::traits::pin_port::{Level, PinPort, PwmChannel};

/// Upper bound of a duty cycle, in percent.
pub const MAX_DUTY_CYCLE: u8 = 100;

/// Drive the enable pin of a running motor at `speed`.
///
/// - `None`: full speed. Any PWM channel is stopped and dropped, then the pin is held HIGH.
/// - `Some(duty)` with `duty <= 100`: a PWM channel is created at the motor's
///   configured frequency and started, or the existing one gets a new duty cycle.
/// - anything else is rejected with [`MotorError::InvalidSpeedRange`] and nothing changes.
pub(crate) fn apply_speed<P: PinPort>(port: &mut P, motor: &mut Motor<P::Pwm>, speed: Option<u8>) -> Result<()> {
    let id = motor.id();
    let pin = motor.enable_pin.ok_or(MotorError::MotorNotConfigured(id))?;

    let Some(duty) = speed else {
        if let Some(pwm) = motor.pwm.as_mut() {
            debug!(motor = %id, pin, "Stopping PWM for full speed drive");
            pwm.stop()?;
            motor.pwm = None;
        }
        port.write_level(pin, Level::High)?;
        return Ok(());
    };

    if duty > MAX_DUTY_CYCLE {
        return Err(MotorError::InvalidSpeedRange {
            motor: id,
            requested: duty,
            retained: motor.duty_cycle,
        });
    }

    match motor.pwm.as_mut() {
        Some(pwm) => {
            debug!(motor = %id, pin, duty, "Changing PWM duty cycle");
            pwm.change_duty_cycle(duty)?;
        }
        None => {
            let frequency_hz = motor.pwm_frequency_hz;
            debug!(motor = %id, pin, frequency_hz, duty, "Starting PWM");
            let mut pwm = port.create_pwm(pin, frequency_hz)?;
            pwm.start(duty)?;
            motor.pwm = Some(pwm);
        }
    }
    motor.duty_cycle = duty;
    Ok(())
}

/// Cut the drive of a motor: stop its PWM channel, or pull the pin LOW when
/// it was driven digitally.
///
/// A channel that fails to stop stays attached to the motor.
pub(crate) fn release<P: PinPort>(port: &mut P, motor: &mut Motor<P::Pwm>) -> Result<()> {
    let id = motor.id();
    let pin = motor.enable_pin.ok_or(MotorError::MotorNotConfigured(id))?;
    match motor.pwm.as_mut() {
        Some(pwm) => {
            debug!(motor = %id, pin, "Stopping PWM");
            pwm.stop()?;
            motor.pwm = None;
        }
        None => port.write_level(pin, Level::Low)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::direction::{DirectionTable, StopMode};
    use crate::devices::motor::{MotorId, MotorPhase};
    use crate::mock::{PortEvent, RecordingPort, RecordingPwm};

    const PIN: u8 = 6;

    fn setup() -> (RecordingPort, Motor<RecordingPwm>) {
        let mut port = RecordingPort::new();
        port.configure_output(PIN).unwrap();
        port.clear();
        let mut motor = Motor::new(MotorId::M2, DirectionTable::L293D_SHIELD.masks(MotorId::M2, StopMode::Coast));
        motor.enable_pin = Some(PIN);
        (port, motor)
    }

    #[test]
    fn test_full_speed_is_digital() {
        let (mut port, mut motor) = setup();
        apply_speed(&mut port, &mut motor, None).unwrap();
        assert_eq!(port.events(), vec![PortEvent::Write(PIN, Level::High)]);
        assert!(!motor.has_pwm());
        assert_eq!(motor.duty_cycle(), 100);
    }

    #[test]
    fn test_pwm_created_then_updated_in_place() {
        let (mut port, mut motor) = setup();
        motor.pwm_frequency_hz = 40;
        apply_speed(&mut port, &mut motor, Some(30)).unwrap();
        apply_speed(&mut port, &mut motor, Some(80)).unwrap();
        assert_eq!(
            port.pwm_events(),
            vec![
                PortEvent::PwmCreated { pin: PIN, frequency_hz: 40 },
                PortEvent::PwmStarted { pin: PIN, duty_cycle: 30 },
                PortEvent::PwmDutyChanged { pin: PIN, duty_cycle: 80 },
            ]
        );
        assert_eq!(motor.duty_cycle(), 80);
    }

    #[test]
    fn test_switch_pwm_to_full_speed() {
        let (mut port, mut motor) = setup();
        motor.running = true;
        apply_speed(&mut port, &mut motor, Some(50)).unwrap();
        assert_eq!(motor.phase(), MotorPhase::RunningPwm);
        apply_speed(&mut port, &mut motor, None).unwrap();
        assert_eq!(motor.phase(), MotorPhase::RunningDigital);
        assert_eq!(port.level(PIN), Some(Level::High));
        assert_eq!(port.pwm_events().last(), Some(&PortEvent::PwmStopped { pin: PIN }));
    }

    #[test]
    fn test_out_of_range_keeps_previous_duty() {
        let (mut port, mut motor) = setup();
        apply_speed(&mut port, &mut motor, Some(40)).unwrap();
        let before = port.events();
        let err = apply_speed(&mut port, &mut motor, Some(150)).unwrap_err();
        assert_eq!(
            err,
            MotorError::InvalidSpeedRange { motor: MotorId::M2, requested: 150, retained: 40 }
        );
        assert_eq!(motor.duty_cycle(), 40);
        assert_eq!(port.events(), before);
    }

    #[test]
    fn test_boundaries_accepted() {
        let (mut port, mut motor) = setup();
        apply_speed(&mut port, &mut motor, Some(0)).unwrap();
        apply_speed(&mut port, &mut motor, Some(100)).unwrap();
        assert_eq!(motor.duty_cycle(), 100);
    }

    #[test]
    fn test_release_digital_pulls_low() {
        let (mut port, mut motor) = setup();
        apply_speed(&mut port, &mut motor, None).unwrap();
        release(&mut port, &mut motor).unwrap();
        assert_eq!(port.level(PIN), Some(Level::Low));
    }

    #[test]
    fn test_release_pwm_stops_channel() {
        let (mut port, mut motor) = setup();
        apply_speed(&mut port, &mut motor, Some(20)).unwrap();
        release(&mut port, &mut motor).unwrap();
        assert!(!motor.has_pwm());
        assert_eq!(port.pwm_events().last(), Some(&PortEvent::PwmStopped { pin: PIN }));
        assert_eq!(port.level(PIN), None);
    }

    #[test]
    fn test_failed_stop_keeps_channel() {
        let (mut port, mut motor) = setup();
        port.fail_pwm_stop(PIN);
        apply_speed(&mut port, &mut motor, Some(20)).unwrap();

        assert!(matches!(release(&mut port, &mut motor), Err(MotorError::Port(_))));
        assert!(motor.has_pwm());
        assert!(matches!(apply_speed(&mut port, &mut motor, None), Err(MotorError::Port(_))));
        assert!(motor.has_pwm());
        assert_eq!(port.level(PIN), None);
    }
}
