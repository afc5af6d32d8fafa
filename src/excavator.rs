//! Excavator gestures on top of the four-motor shield.
//!
//! Each gesture starts its motors and remembers them; [`Excavator::finish`]
//! stops whatever the previous gestures started.

use motor_shield::{MotorController, MotorId, PinPort};
use tracing::{debug, warn};

pub const LEFT_CHAIN: MotorId = MotorId::M1;
pub const RIGHT_CHAIN: MotorId = MotorId::M2;
pub const BODY: MotorId = MotorId::M3;
pub const SHOVEL: MotorId = MotorId::M4;

pub struct Excavator<P: PinPort> {
    motors: MotorController<P>,
    speed: Option<u8>,
    memo: Vec<MotorId>,
}

impl<P: PinPort> Excavator<P> {
    /// `motors` must already have its direction bus and enable pins configured.
    pub fn new(motors: MotorController<P>, speed: Option<u8>) -> Self {
        Self {
            motors,
            speed,
            memo: Vec::new(),
        }
    }

    pub fn controller(&self) -> &MotorController<P> {
        &self.motors
    }

    /// Motors started since the last [`finish`](Self::finish).
    pub fn remembered(&self) -> &[MotorId] {
        &self.memo
    }

    pub fn forward_left_chain(&mut self) -> motor_shield::Result<()> {
        self.drive(LEFT_CHAIN, true)
    }

    pub fn backward_left_chain(&mut self) -> motor_shield::Result<()> {
        self.drive(LEFT_CHAIN, false)
    }

    pub fn forward_right_chain(&mut self) -> motor_shield::Result<()> {
        self.drive(RIGHT_CHAIN, true)
    }

    pub fn backward_right_chain(&mut self) -> motor_shield::Result<()> {
        self.drive(RIGHT_CHAIN, false)
    }

    pub fn move_forward(&mut self) -> motor_shield::Result<()> {
        self.forward_left_chain()?;
        self.forward_right_chain()
    }

    pub fn move_backward(&mut self) -> motor_shield::Result<()> {
        self.backward_left_chain()?;
        self.backward_right_chain()
    }

    pub fn turn_left_body(&mut self) -> motor_shield::Result<()> {
        self.drive(BODY, true)
    }

    pub fn turn_right_body(&mut self) -> motor_shield::Result<()> {
        self.drive(BODY, false)
    }

    pub fn move_up_shovel(&mut self) -> motor_shield::Result<()> {
        self.drive(SHOVEL, true)
    }

    pub fn move_down_shovel(&mut self) -> motor_shield::Result<()> {
        self.drive(SHOVEL, false)
    }

    /// Stop every remembered motor and forget them.
    pub fn finish(&mut self) -> motor_shield::Result<()> {
        let memo = std::mem::take(&mut self.memo);
        debug!(motors = ?memo, "Finishing gesture");
        self.motors.stop_many(&memo)
    }

    pub fn stop_all_motors(&mut self) -> motor_shield::Result<()> {
        self.memo.clear();
        self.motors.stop_many(&MotorId::ALL)
    }

    pub fn shutdown(self) -> motor_shield::Result<()> {
        self.motors.shutdown()
    }

    fn drive(&mut self, motor: MotorId, clockwise: bool) -> motor_shield::Result<()> {
        let report = self.motors.run(motor, clockwise, self.speed)?;
        if let Some(warning) = report.warning {
            warn!(%motor, %warning, "Gesture ran with a degraded speed");
        }
        if !self.memo.contains(&motor) {
            self.memo.push(motor);
        }
        Ok(())
    }
}
