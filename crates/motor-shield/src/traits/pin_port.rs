//! Pin-level capability supplied by the host platform.
//!
//! Implementations map their HAL-specific failures onto [`PortError`].

use core::fmt;

/// Platform pin number (interpretation depends on [`NumberingMode`]).
pub type Pin = u8;

/// Logic level of a digital output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Logic 0.
    Low,
    /// Logic 1.
    High,
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high { Level::High } else { Level::Low }
    }
}

/// Pin numbering scheme used by the platform.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumberingMode {
    /// Physical header positions.
    Board,
    /// Broadcom GPIO numbers.
    #[default]
    Bcm,
}

impl fmt::Display for NumberingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumberingMode::Board => f.write_str("BOARD"),
            NumberingMode::Bcm => f.write_str("BCM"),
        }
    }
}

/// Failures raised by a [`PinPort`] or [`PwmChannel`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    /// The pin does not exist or is reserved on this platform.
    #[error("pin {0} is not available")]
    PinUnavailable(Pin),
    /// A level was written to a pin that was never configured as an output.
    #[error("pin {0} is not configured as an output")]
    NotAnOutput(Pin),
    /// The platform rejected the PWM frequency.
    #[error("PWM frequency {0} Hz is not supported")]
    InvalidFrequency(u32),
    /// Any other platform failure.
    #[error("platform failure: {0}")]
    Platform(String),
}

/// A running (or startable) PWM channel bound to one pin.
pub trait PwmChannel {
    /// Start generating pulses at `duty_cycle` percent.
    fn start(&mut self, duty_cycle: u8) -> Result<(), PortError>;

    /// Change the duty cycle without touching the frequency.
    fn change_duty_cycle(&mut self, duty_cycle: u8) -> Result<(), PortError>;

    /// Stop generating pulses. The channel is dropped afterwards.
    fn stop(&mut self) -> Result<(), PortError>;
}

/// Digital output and PWM capability for the motor shield.
///
/// # Invariants
///
/// - A pin must be passed to [`PinPort::configure_output`] before any level is written.
/// - The driver is the single owner of every pin it configures.
pub trait PinPort {
    /// PWM handle type produced by [`PinPort::create_pwm`].
    type Pwm: PwmChannel;

    /// Select the pin numbering scheme. Called once at construction.
    fn set_numbering_mode(&mut self, mode: NumberingMode) -> Result<(), PortError>;

    /// Configure `pin` as a push-pull digital output.
    fn configure_output(&mut self, pin: Pin) -> Result<(), PortError>;

    /// Drive `pin` to `level`.
    fn write_level(&mut self, pin: Pin, level: Level) -> Result<(), PortError>;

    /// Create a (not yet started) PWM channel on `pin`.
    fn create_pwm(&mut self, pin: Pin, frequency_hz: u32) -> Result<Self::Pwm, PortError>;

    /// Return every configured pin to its reset state.
    fn release_all(&mut self) -> Result<(), PortError>;
}
