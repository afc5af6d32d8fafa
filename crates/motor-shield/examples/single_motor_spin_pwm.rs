use std::thread;
use std::time::Duration;

use motor_shield::sim::DryRunPort;
use motor_shield::{MotorController, MotorId, NumberingMode};
use tracing::info;
use tracing_subscriber::EnvFilter;

const PWM_FREQ: u32 = 50; // PWM frequency in Hz
const STEP_TIME_MS: u64 = 200; // Time between speed changes
const MAX_SPEED: u8 = 100; // Maximum speed (100%)
const MIN_SPEED: u8 = 0; // Minimum speed (0%)

fn main() -> motor_shield::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()))
        .init();

    info!("Starting PWM motor spin on the dry-run port...");

    let mut motors = MotorController::new(DryRunPort::new(), NumberingMode::Bcm)?;
    motors.configure_direction_bus(21, 20, 16)?;
    motors.configure_motor_pins([Some(5), None, None, None])?;
    motors.set_pwm_frequencies([(MotorId::M1.number(), PWM_FREQ)])?;
    info!("Motor initialized with PWM capabilities");

    for clockwise in [true, false] {
        info!(clockwise, "Setting direction");
        for speed in (MIN_SPEED..=MAX_SPEED).step_by(20) {
            let report = motors.run(MotorId::M1, clockwise, Some(speed))?;
            let state = motors.state(MotorId::M1);
            info!(
                register = format_args!("{:#010b}", report.register),
                duty_cycle = state.duty_cycle,
                pwm = state.pwm_active,
                "Motor state"
            );
            thread::sleep(Duration::from_millis(STEP_TIME_MS));
        }

        info!("Stopping motor");
        motors.stop(MotorId::M1)?;
        thread::sleep(Duration::from_millis(STEP_TIME_MS));
    }

    motors.shutdown()
}
