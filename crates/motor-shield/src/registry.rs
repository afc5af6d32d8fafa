//! Owner of the four motor records and the composite-value resolver.

use crate::devices::direction::{DirectionTable, Intent, StopMode};
use crate::devices::motor::{Motor, MotorId};

/// The four motor records, indexed by [`MotorId`].
#[derive(Debug)]
pub struct MotorRegistry<H> {
    motors: [Motor<H>; 4],
}

impl<H> MotorRegistry<H> {
    /// Records for all four motors, at rest, with masks from `table`.
    pub fn new(table: &DirectionTable, stop_mode: StopMode) -> Self {
        Self {
            motors: MotorId::ALL.map(|id| Motor::new(id, table.masks(id, stop_mode))),
        }
    }

    /// Record of `id`.
    pub fn get(&self, id: MotorId) -> &Motor<H> {
        &self.motors[id.index()]
    }

    pub(crate) fn get_mut(&mut self, id: MotorId) -> &mut Motor<H> {
        &mut self.motors[id.index()]
    }

    /// Records in identity order.
    pub fn iter(&self) -> impl Iterator<Item = &Motor<H>> {
        self.motors.iter()
    }

    /// Register value implied by the running motors.
    pub fn composite(&self) -> u8 {
        self.motors
            .iter()
            .filter(|m| m.running)
            .fold(0, |acc, m| acc | m.direction_value)
    }

    /// Byte to latch when `target` switches to `intent`, and the target's own
    /// contribution.
    ///
    /// Every other running motor keeps its current bits, so the write never
    /// disturbs them.
    pub fn resolve(&self, target: MotorId, intent: Intent) -> (u8, u8) {
        let value = self.get(target).masks().for_intent(intent);
        let others = self
            .motors
            .iter()
            .filter(|m| m.id() != target && m.running)
            .fold(0, |acc, m| acc | m.direction_value);
        (value | others, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(stop_mode: StopMode) -> MotorRegistry<()> {
        MotorRegistry::new(&DirectionTable::L293D_SHIELD, stop_mode)
    }

    fn set_running(reg: &mut MotorRegistry<()>, id: MotorId, clockwise: bool) {
        let (_, value) = reg.resolve(id, Intent::run(clockwise));
        let m = reg.get_mut(id);
        m.running = true;
        m.direction_value = value;
    }

    #[test]
    fn test_resolve_alone() {
        let reg = registry(StopMode::Coast);
        assert_eq!(reg.resolve(MotorId::M1, Intent::Clockwise), (4, 4));
        assert_eq!(reg.resolve(MotorId::M2, Intent::Counterclockwise), (16, 16));
        assert_eq!(reg.resolve(MotorId::M3, Intent::Stop), (0, 0));
    }

    #[test]
    fn test_resolve_preserves_other_motors() {
        let mut reg = registry(StopMode::Coast);
        set_running(&mut reg, MotorId::M1, true);
        set_running(&mut reg, MotorId::M4, false);
        assert_eq!(reg.composite(), 4 | 64);

        assert_eq!(reg.resolve(MotorId::M2, Intent::Clockwise), (4 | 64 | 2, 2));
        assert_eq!(reg.resolve(MotorId::M1, Intent::Stop), (64, 0));
        // Reversing a running motor replaces its own bits instead of OR-ing them.
        assert_eq!(reg.resolve(MotorId::M1, Intent::Counterclockwise), (8 | 64, 8));
    }

    #[test]
    fn test_stopped_motor_bits_ignored() {
        let mut reg = registry(StopMode::Coast);
        set_running(&mut reg, MotorId::M3, true);
        reg.get_mut(MotorId::M3).running = false;
        assert_eq!(reg.resolve(MotorId::M1, Intent::Clockwise), (4, 4));
    }

    #[test]
    fn test_brake_stop_sets_both_bits() {
        let mut reg = registry(StopMode::Brake);
        set_running(&mut reg, MotorId::M2, false);
        assert_eq!(reg.resolve(MotorId::M1, Intent::Stop), (4 | 8 | 16, 4 | 8));
    }
}
