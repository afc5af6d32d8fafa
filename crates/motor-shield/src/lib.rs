#![warn(missing_docs)]
#![doc = "Driver for four DC motors on an L293D motor shield."]
#![doc = ""]
#![doc = "The direction of all four motors is multiplexed onto one 74HC595 shift"]
#![doc = "register, while each motor has its own enable pin that is either held HIGH"]
#![doc = "or driven by a PWM channel. Any command for one motor rewrites the whole"]
#![doc = "register without disturbing the other three."]
#![doc = ""]
#![doc = "Hardware access goes through the [`PinPort`] trait, injected at construction."]

pub mod controller;
pub mod devices;
pub mod error;
pub mod mock;
pub mod pwm;
pub mod registry;
#[cfg(feature = "rppal")]
pub mod rpi;
pub mod sim;
pub mod traits;

pub use controller::{MotorController, RunReport};
pub use devices::{DirectionTable, MotorId, MotorPhase, MotorState, StopMode};
pub use error::{MotorError, Result};
pub use traits::{Level, NumberingMode, Pin, PinPort, PortError, PwmChannel};
