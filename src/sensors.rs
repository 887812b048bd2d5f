// sensors.rs
use bevy::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorSide {
    Front,
    /// Deeper into the screen (+z).
    Far,
    /// Toward the viewer (-z).
    Near,
}

/// Occupancy counts of the three volumes around the hero that veto jumps
/// into scenery.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JumpSensors {
    front: u32,
    far: u32,
    near: u32,
}

impl JumpSensors {
    fn slot(&mut self, side: SensorSide) -> &mut u32 {
        match side {
            SensorSide::Front => &mut self.front,
            SensorSide::Far => &mut self.far,
            SensorSide::Near => &mut self.near,
        }
    }

    pub fn enter(&mut self, side: SensorSide) {
        *self.slot(side) += 1;
    }

    pub fn exit(&mut self, side: SensorSide) {
        let slot = self.slot(side);
        *slot = slot.saturating_sub(1);
    }

    pub fn is_triggered(&self, side: SensorSide) -> bool {
        match side {
            SensorSide::Front => self.front > 0,
            SensorSide::Far => self.far > 0,
            SensorSide::Near => self.near > 0,
        }
    }

    pub fn can_jump(&self, direction: Vec3, front: Vec3) -> bool {
        if direction.z > 0.0 && self.is_triggered(SensorSide::Far) {
            return false;
        }
        if direction.z < 0.0 && self.is_triggered(SensorSide::Near) {
            return false;
        }
        !(front.x * direction.x > 0.0 && self.is_triggered(SensorSide::Front))
    }
}
