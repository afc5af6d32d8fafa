//! Per-motor direction masks inside the shared 8-bit register.

use crate::devices::motor::MotorId;
use crate::error::MotorError;

/// What a motor is asked to do with its direction bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Spin clockwise.
    Clockwise,
    /// Spin counterclockwise.
    Counterclockwise,
    /// Release the motor.
    Stop,
}

impl Intent {
    /// Run intent for the `clockwise` flag.
    pub fn run(clockwise: bool) -> Self {
        if clockwise {
            Intent::Clockwise
        } else {
            Intent::Counterclockwise
        }
    }
}

/// How a stopped motor's direction bits are written.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopMode {
    /// Both direction bits low; the motor freewheels.
    #[default]
    Coast,
    /// Both direction bits high for the stop write (L293D short brake).
    Brake,
}

/// Masks of one motor: `[clockwise, counterclockwise, stop]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectionMasks {
    /// Bit set while running clockwise.
    pub clockwise: u8,
    /// Bit set while running counterclockwise.
    pub counterclockwise: u8,
    /// Bits written by the stop command.
    pub stop: u8,
}

impl DirectionMasks {
    /// Mask for `intent`.
    pub fn for_intent(&self, intent: Intent) -> u8 {
        match intent {
            Intent::Clockwise => self.clockwise,
            Intent::Counterclockwise => self.counterclockwise,
            Intent::Stop => self.stop,
        }
    }
}

/// Clockwise/counterclockwise bit pairs for all four motors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectionTable {
    pairs: [(u8, u8); 4],
}

impl DirectionTable {
    /// 74HC595 wiring of the Arduino L293D motor shield.
    pub const L293D_SHIELD: DirectionTable = DirectionTable {
        pairs: [(4, 8), (2, 16), (32, 128), (1, 64)],
    };

    /// Build a table from `(clockwise, counterclockwise)` pairs in motor order.
    ///
    /// # Errors
    ///
    /// Returns [`MotorError::InvalidDirectionTable`] unless the eight masks are
    /// single, distinct bits.
    pub fn new(pairs: [(u8, u8); 4]) -> Result<Self, MotorError> {
        let table = DirectionTable { pairs };
        table.validate()?;
        Ok(table)
    }

    /// Check that the non-stop masks tile the register exactly once.
    pub fn validate(&self) -> Result<(), MotorError> {
        let mut seen = 0u8;
        for &(cw, ccw) in &self.pairs {
            for mask in [cw, ccw] {
                if mask.count_ones() != 1 {
                    return Err(MotorError::InvalidDirectionTable("each mask must be a single bit"));
                }
                if seen & mask != 0 {
                    return Err(MotorError::InvalidDirectionTable("masks overlap"));
                }
                seen |= mask;
            }
        }
        // Eight distinct single bits always cover the byte.
        debug_assert_eq!(seen, u8::MAX);
        Ok(())
    }

    /// Masks of `motor`, with the stop mask chosen by `stop_mode`.
    pub fn masks(&self, motor: MotorId, stop_mode: StopMode) -> DirectionMasks {
        let (clockwise, counterclockwise) = self.pairs[motor.index()];
        let stop = match stop_mode {
            StopMode::Coast => 0,
            StopMode::Brake => clockwise | counterclockwise,
        };
        DirectionMasks { clockwise, counterclockwise, stop }
    }
}

impl Default for DirectionTable {
    fn default() -> Self {
        DirectionTable::L293D_SHIELD
    }
}
