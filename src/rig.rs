// rig.rs
//! Collaborator contracts between the combat core and the engine.
//!
//! The core never touches Bevy components directly. Everything it needs from
//! the animation graph, the physics body, the sprite and the HUD goes through
//! the traits in this file, so the same rules run against `EcsRig` in the game
//! and against the recording `FakeRig` in tests.

use bevy::math::Vec3;

// ──────────────────────────────────────────────────────────────────────────────
// Animation tags
// ──────────────────────────────────────────────────────────────────────────────

/// Logical animation states the core reads back from the animator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AnimState {
    #[default]
    Idle,
    Walk,
    Run,
    Attack1,
    Attack2,
    Attack3,
    JumpAttack,
    RunAttack,
    JumpRise,
    JumpFall,
    JumpLand,
    Hurt,
    KnockedDown,
    GetUp,
    Pickup,
    Dead,
}

impl AnimState {
    pub fn is_attack(self) -> bool {
        matches!(
            self,
            Self::Attack1 | Self::Attack2 | Self::Attack3 | Self::JumpAttack | Self::RunAttack
        )
    }

    pub fn is_jumping(self) -> bool {
        matches!(self, Self::JumpRise | Self::JumpFall)
    }

    pub fn is_airborne(self) -> bool {
        self.is_jumping() || self == Self::JumpAttack
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnimTrigger {
    Attack,
    Jump,
    IsHurt,
    Knockdown,
    GetUp,
    PickupPowerup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnimBool {
    IsAlive,
    IsGrounded,
    IsRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnimInt {
    CurrentChain,
    EvaluatedChain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnimFloat {
    Speed,
}

/// Events the animator raises when a clip reaches a marked frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnimEvent {
    PickupFinished,
    JumpAttackFinished,
    /// A combo swing reached the frame where it counts as committed.
    ChainEvaluated(i32),
}

// ──────────────────────────────────────────────────────────────────────────────
// Physics / presentation vocabulary
// ──────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForceMode {
    /// Continuous force, scaled by the fixed step.
    Force,
    /// Instant change in momentum.
    Impulse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundCue {
    Hit,
    Hit2,
    Death,
}

/// Horizontal facing of a combatant. Only left and right exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Facing {
    Left,
    #[default]
    Right,
}

impl Facing {
    pub fn from_left(is_left: bool) -> Self {
        if is_left { Self::Left } else { Self::Right }
    }

    pub fn is_left(self) -> bool {
        self == Self::Left
    }

    /// Unit front vector on the scroll axis.
    pub fn front(self) -> Vec3 {
        match self {
            Self::Left => Vec3::NEG_X,
            Self::Right => Vec3::X,
        }
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// Contracts
// ──────────────────────────────────────────────────────────────────────────────

pub trait Animator {
    fn set_bool(&mut self, param: AnimBool, value: bool);
    fn set_integer(&mut self, param: AnimInt, value: i32);
    fn set_float(&mut self, param: AnimFloat, value: f32);
    fn set_trigger(&mut self, trigger: AnimTrigger);
    fn current_state(&self) -> AnimState;

    fn is_in_state(&self, state: AnimState) -> bool {
        self.current_state() == state
    }
}

pub trait PhysicsBody {
    fn position(&self) -> Vec3;
    fn add_force(&mut self, force: Vec3, mode: ForceMode);
    fn move_position(&mut self, point: Vec3);
    fn velocity(&self) -> Vec3;
    fn set_velocity(&mut self, velocity: Vec3);
    fn set_use_gravity(&mut self, enabled: bool);
}

pub trait Presentation {
    /// Standing collider when `true`, the flat knocked-down one otherwise.
    fn set_collider_stance(&mut self, standing: bool);
    fn set_facing(&mut self, facing: Facing);
    fn set_opacity(&mut self, alpha: f32);
    /// Damage number popup plus spark at the point of impact.
    fn spawn_hit_effects(&mut self, value: f32, point: Vec3);
    fn play_sfx(&mut self, cue: SoundCue);
}

pub trait LifeBarView {
    fn show(&mut self, visible: bool);
    fn set_progress(&mut self, fraction: f32);
    /// Tints the combatant's thumbnail next to the bar.
    fn set_thumbnail(&mut self, alpha: f32);
}

/// Everything a combatant drives on its engine-side counterpart.
pub trait ActorRig: Animator + PhysicsBody + Presentation + LifeBarView {}

impl<T: Animator + PhysicsBody + Presentation + LifeBarView> ActorRig for T {}
