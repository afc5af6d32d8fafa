//! Shield components: motors, direction masks and the shift register.

pub mod direction;
pub mod motor;
pub mod shift_register;

pub use direction::{DirectionMasks, DirectionTable, Intent, StopMode};
pub use motor::{Motor, MotorId, MotorPhase, MotorState};
pub use shift_register::ShiftRegisterBus;
