// controls.rs
use crate::prelude::*;

const STICK_DEAD_ZONE: f32 = 0.2;

#[derive(Actionlike, PartialEq, Eq, Hash, Clone, Copy, Debug, Reflect)]
pub enum Action {
    /// Scroll axis, right is positive.
    #[actionlike(Axis)]
    MoveX,
    /// Depth axis, up (into the screen) is positive.
    #[actionlike(Axis)]
    MoveZ,
    Jump,
    Attack,
}

pub fn default_input_map() -> InputMap<Action> {
    InputMap::default()
        .with_axis(Action::MoveX, VirtualAxis::horizontal_arrow_keys())
        .with_axis(Action::MoveX, VirtualAxis::ad())
        .with_axis(Action::MoveX, GamepadControlAxis::new(GamepadAxis::LeftStickX))
        .with_axis(Action::MoveZ, VirtualAxis::vertical_arrow_keys())
        .with_axis(Action::MoveZ, VirtualAxis::ws())
        .with_axis(Action::MoveZ, GamepadControlAxis::new(GamepadAxis::LeftStickY))
        .with(Action::Jump, KeyCode::Space)
        .with(Action::Jump, GamepadButton::South)
        .with(Action::Attack, KeyCode::KeyJ)
        .with(Action::Attack, GamepadButton::West)
}

/// What the hero controller reads each frame.
pub trait InputSource {
    fn horizontal_axis(&self) -> f32;
    fn vertical_axis(&self) -> f32;
    /// Edge-triggered: true only on the frame the button went down.
    fn jump_pressed(&self) -> bool;
    fn attack_pressed(&self) -> bool;
}

impl InputSource for ActionState<Action> {
    fn horizontal_axis(&self) -> f32 {
        dead_zone(self.value(&Action::MoveX))
    }

    fn vertical_axis(&self) -> f32 {
        dead_zone(self.value(&Action::MoveZ))
    }

    fn jump_pressed(&self) -> bool {
        self.just_pressed(&Action::Jump)
    }

    fn attack_pressed(&self) -> bool {
        self.just_pressed(&Action::Attack)
    }
}

fn dead_zone(v: f32) -> f32 {
    if v.abs() < STICK_DEAD_ZONE { 0.0 } else { v.clamp(-1.0, 1.0) }
}

/// A single frame of input, for scripted control and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputFrame {
    pub horizontal: f32,
    pub vertical: f32,
    pub jump: bool,
    pub attack: bool,
}

impl InputFrame {
    pub fn moving(horizontal: f32, vertical: f32) -> Self {
        Self {
            horizontal,
            vertical,
            ..Default::default()
        }
    }

    pub fn attack() -> Self {
        Self {
            attack: true,
            ..Default::default()
        }
    }

    pub fn jump() -> Self {
        Self {
            jump: true,
            ..Default::default()
        }
    }
}

impl InputSource for InputFrame {
    fn horizontal_axis(&self) -> f32 {
        self.horizontal
    }

    fn vertical_axis(&self) -> f32 {
        self.vertical
    }

    fn jump_pressed(&self) -> bool {
        self.jump
    }

    fn attack_pressed(&self) -> bool {
        self.attack
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_stick_values_are_ignored() {
        assert_eq!(dead_zone(0.1), 0.0);
        assert_eq!(dead_zone(-0.5), -0.5);
        assert_eq!(dead_zone(1.4), 1.0);
    }

    #[test]
    fn idle_action_state_reads_as_no_input() {
        let state = ActionState::<Action>::default();
        assert_eq!(state.horizontal_axis(), 0.0);
        assert_eq!(state.vertical_axis(), 0.0);
        assert!(!state.jump_pressed());
        assert!(!state.attack_pressed());
    }
}
