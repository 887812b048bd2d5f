// combat.rs
use serde::Deserialize;

// ====== Teams & attack profiles ======

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
pub enum Team {
    #[default]
    Hero,
    Enemy,
}

/// One attack profile. Damage and force are never negative.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct AttackData {
    pub damage: f32,
    pub force: f32,
    pub knockdown: bool,
}

impl Default for AttackData {
    fn default() -> Self {
        Self {
            damage: 10.0,
            force: 50.0,
            knockdown: false,
        }
    }
}

impl AttackData {
    pub const fn new(damage: f32, force: f32, knockdown: bool) -> Self {
        Self {
            damage,
            force,
            knockdown,
        }
    }

    /// Clamps loaded values into range.
    pub fn sanitized(self) -> Self {
        Self {
            damage: self.damage.max(0.0),
            force: self.force.max(0.0),
            knockdown: self.knockdown,
        }
    }
}

/// Damage about to be applied, after the attacker picked its profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub amount: f32,
    pub knockdown: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HitOutcome {
    /// Target was dead, on the same team or knocked out.
    Ignored,
    Died,
    KnockedDown,
    Flinched,
    /// Damage landed without any reaction (boss armor).
    Absorbed,
}

impl HitOutcome {
    pub fn landed(self) -> bool {
        self != Self::Ignored
    }
}

// ====== Policies ======

/// Per-archetype adjustments to the shared damage rules.
pub trait CombatPolicy {
    fn shape_hit(&mut self, hit: Hit, _grounded: bool) -> Hit {
        hit
    }

    fn can_flinch(&self) -> bool {
        true
    }
}

/// Hero damage tolerance. Enough chip damage, or any hit while airborne,
/// turns into a knockdown and refills the tolerance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerPolicy {
    pub tolerance: f32,
    pub limit: f32,
    pub recovery_rate: f32,
}

impl PlayerPolicy {
    pub fn new(limit: f32, recovery_rate: f32) -> Self {
        let limit = limit.max(0.0);
        Self {
            tolerance: limit,
            limit,
            recovery_rate: recovery_rate.max(0.0),
        }
    }

    pub fn recover(&mut self, dt: f32) {
        if self.tolerance < self.limit {
            self.tolerance = (self.tolerance + dt * self.recovery_rate).clamp(0.0, self.limit);
        }
    }
}

impl CombatPolicy for PlayerPolicy {
    fn shape_hit(&mut self, mut hit: Hit, grounded: bool) -> Hit {
        self.tolerance -= hit.amount;
        if self.tolerance <= 0.0 || !grounded {
            self.tolerance = self.limit;
            hit.knockdown = true;
        }
        hit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
pub enum EnemyKind {
    #[default]
    Robot,
    Boss,
}

impl CombatPolicy for EnemyKind {
    fn shape_hit(&mut self, mut hit: Hit, _grounded: bool) -> Hit {
        if *self == Self::Boss {
            hit.knockdown = false;
        }
        hit
    }

    fn can_flinch(&self) -> bool {
        *self == Self::Robot
    }
}
