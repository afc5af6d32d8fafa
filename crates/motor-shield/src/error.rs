//! Error types for the motor shield driver.
//!
//! Everything except [`MotorError::Port`] is a local, recoverable condition:
//! one unwired or misconfigured motor never prevents driving the others.

use crate::devices::motor::MotorId;
use crate::traits::pin_port::PortError;

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, MotorError>;

/// Errors reported by [`MotorController`](crate::MotorController).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MotorError {
    /// The latch, clock and serial pins of the direction register were never set.
    #[error("direction bus pins (latch, clock, serial) are not configured")]
    BusNotConfigured,

    /// The enable pin of the motor was never assigned.
    #[error("enable pin for {0} is not configured")]
    MotorNotConfigured(MotorId),

    /// A speed outside `0..=100` was requested. The motor keeps `retained`.
    #[error("speed for {motor} must be in range 0-100, got {requested}; keeping {retained}")]
    InvalidSpeedRange {
        /// Motor the speed was meant for.
        motor: MotorId,
        /// Rejected value.
        requested: u8,
        /// Duty cycle that stays in effect.
        retained: u8,
    },

    /// A bulk update referenced an identity outside `1..=4`.
    #[error("unknown motor identity {0}")]
    UnknownMotorIdentity(u8),

    /// A PWM frequency of zero was requested.
    #[error("PWM frequency for {0} must be non-zero")]
    InvalidFrequency(MotorId),

    /// Pin assignment attempted while the motor is running.
    #[error("{0} is running; stop it before reassigning its pin")]
    MotorRunning(MotorId),

    /// The direction mask table does not tile the register.
    #[error("invalid direction table: {0}")]
    InvalidDirectionTable(&'static str),

    /// The platform refused a pin operation.
    #[error(transparent)]
    Port(#[from] PortError),
}

impl MotorError {
    /// `true` for conditions that the caller may log and carry on from.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, MotorError::Port(_))
    }
}
