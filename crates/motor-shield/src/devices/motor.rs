//! Motor identities, per-motor records and their snapshots.

use core::fmt;

use crate::devices::direction::DirectionMasks;
use crate::error::MotorError;
use crate::traits::pin_port::Pin;

/// Default PWM frequency of a freshly constructed motor, in Hz.
pub const DEFAULT_PWM_FREQUENCY_HZ: u32 = 10;

/// Default (and "full speed") duty cycle, in percent.
pub const DEFAULT_DUTY_CYCLE: u8 = 100;

/// One of the four DC motor channels on the shield.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MotorId {
    /// DC motor 1.
    M1 = 1,
    /// DC motor 2.
    M2 = 2,
    /// DC motor 3.
    M3 = 3,
    /// DC motor 4.
    M4 = 4,
}

impl MotorId {
    /// All motors in identity order.
    pub const ALL: [MotorId; 4] = [MotorId::M1, MotorId::M2, MotorId::M3, MotorId::M4];

    /// Zero-based slot in the registry.
    pub const fn index(self) -> usize {
        self as usize - 1
    }

    /// Numeric identity (`1..=4`).
    pub const fn number(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for MotorId {
    type Error = MotorError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(MotorId::M1),
            2 => Ok(MotorId::M2),
            3 => Ok(MotorId::M3),
            4 => Ok(MotorId::M4),
            other => Err(MotorError::UnknownMotorIdentity(other)),
        }
    }
}

impl From<MotorId> for u8 {
    fn from(id: MotorId) -> Self {
        id.number()
    }
}

impl fmt::Display for MotorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DC_Motor_{}", self.number())
    }
}

/// Live record of one motor, owned by the registry.
///
/// `H` is the PWM handle type of the platform port.
#[derive(Debug)]
pub struct Motor<H> {
    id: MotorId,
    masks: DirectionMasks,
    pub(crate) enable_pin: Option<Pin>,
    pub(crate) running: bool,
    pub(crate) direction_value: u8,
    pub(crate) pwm_frequency_hz: u32,
    pub(crate) duty_cycle: u8,
    pub(crate) pwm: Option<H>,
}

impl<H> Motor<H> {
    pub(crate) fn new(id: MotorId, masks: DirectionMasks) -> Self {
        Self {
            id,
            masks,
            enable_pin: None,
            running: false,
            direction_value: 0,
            pwm_frequency_hz: DEFAULT_PWM_FREQUENCY_HZ,
            duty_cycle: DEFAULT_DUTY_CYCLE,
            pwm: None,
        }
    }

    /// Identity of this motor.
    pub fn id(&self) -> MotorId {
        self.id
    }

    /// Direction masks assigned at construction.
    pub fn masks(&self) -> DirectionMasks {
        self.masks
    }

    /// Assigned enable pin, if any.
    pub fn enable_pin(&self) -> Option<Pin> {
        self.enable_pin
    }

    /// Whether the motor is currently running.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Mask this motor currently contributes to the shared register.
    pub fn direction_value(&self) -> u8 {
        self.direction_value
    }

    /// Frequency for the next PWM channel, in Hz.
    pub fn pwm_frequency_hz(&self) -> u32 {
        self.pwm_frequency_hz
    }

    /// Last applied duty cycle, in percent.
    pub fn duty_cycle(&self) -> u8 {
        self.duty_cycle
    }

    /// Whether a PWM channel drives the enable pin.
    pub fn has_pwm(&self) -> bool {
        self.pwm.is_some()
    }

    /// Current lifecycle position.
    pub fn phase(&self) -> MotorPhase {
        match (self.enable_pin, self.running, self.pwm.is_some()) {
            (None, _, _) => MotorPhase::Unconfigured,
            (Some(_), false, _) => MotorPhase::Stopped,
            (Some(_), true, false) => MotorPhase::RunningDigital,
            (Some(_), true, true) => MotorPhase::RunningPwm,
        }
    }

    /// Detached copy of this record.
    pub fn state(&self) -> MotorState {
        MotorState {
            id: self.id,
            enable_pin: self.enable_pin,
            running: self.running,
            direction_value: self.direction_value,
            pwm_frequency_hz: self.pwm_frequency_hz,
            duty_cycle: self.duty_cycle,
            pwm_active: self.pwm.is_some(),
        }
    }
}

/// Lifecycle position of a motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorPhase {
    /// No enable pin assigned; `run` and `stop` fail.
    Unconfigured,
    /// Pin assigned, not contributing to the register.
    Stopped,
    /// Enable pin held HIGH, no PWM channel.
    RunningDigital,
    /// Enable pin driven by a PWM channel.
    RunningPwm,
}

/// Snapshot of a motor record.
///
/// Detached from the registry, so it can be logged or sent across threads
/// without holding the controller.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorState {
    /// Motor identity.
    pub id: MotorId,
    /// Assigned enable pin, if any.
    pub enable_pin: Option<Pin>,
    /// Whether the motor is running.
    pub running: bool,
    /// Mask contributed to the shared register (`0` when stopped).
    pub direction_value: u8,
    /// Frequency used the next time a PWM channel is created.
    pub pwm_frequency_hz: u32,
    /// Last applied duty cycle in percent.
    pub duty_cycle: u8,
    /// Whether a PWM channel currently drives the enable pin.
    pub pwm_active: bool,
}
