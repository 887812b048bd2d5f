// ai.rs
//! Weighted-random decision engine for enemies.
//!
//! Each tick the AI either counts its decision cooldown down or, once it has
//! run out, rolls a new action from the weight table that matches where the
//! hero is. The chosen action comes back as an [`AiOrder`] for the enemy to
//! carry out; the AI itself never touches the world.

use std::f32::consts::TAU;
use std::ops::Range;

use bevy::math::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ====== Tuning ======
pub const SAME_PLANE_TOLERANCE: f32 = 0.5;
const CHASE_DEPTH_JITTER: f32 = 0.4;
const ROAM_DISTANCE: Range<f32> = 20.0..50.0;

const CHASE_COOLDOWN: Range<f32> = 0.2..0.4;
const ATTACK_COOLDOWN: Range<f32> = 1.0..1.5;
const WAIT_COOLDOWN: Range<f32> = 0.2..0.5;
const ROAM_COOLDOWN: Range<f32> = 0.3..0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EnemyAction {
    #[default]
    None,
    Wait,
    Attack,
    Chase,
    Roam,
}

/// Decision weights. Entries are tried in the order attack, chase, wait, roam.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightTable {
    pub attack: u32,
    pub chase: u32,
    pub wait: u32,
    pub roam: u32,
}

impl WeightTable {
    pub const FAR_AWAY: Self = Self { attack: 0, chase: 80, wait: 20, roam: 0 };
    pub const IN_REACH: Self = Self { attack: 70, chase: 0, wait: 15, roam: 15 };
    pub const SAME_PLANE_OUT_OF_REACH: Self = Self { attack: 0, chase: 80, wait: 10, roam: 10 };
    pub const OTHER_PLANE: Self = Self { attack: 0, chase: 60, wait: 20, roam: 20 };

    pub fn total(&self) -> u32 {
        self.attack + self.chase + self.wait + self.roam
    }

    fn entries(&self) -> [(EnemyAction, u32); 4] {
        [
            (EnemyAction::Attack, self.attack),
            (EnemyAction::Chase, self.chase),
            (EnemyAction::Wait, self.wait),
            (EnemyAction::Roam, self.roam),
        ]
    }

    /// Table for the current spatial relationship to the hero.
    pub fn for_perception(p: &Perception) -> Self {
        match (p.hero_nearby, p.same_plane, p.can_reach) {
            (false, _, _) => Self::FAR_AWAY,
            (true, true, true) => Self::IN_REACH,
            (true, true, false) => Self::SAME_PLANE_OUT_OF_REACH,
            (true, false, _) => Self::OTHER_PLANE,
        }
    }
}

/// Draws in `[0, total)` and walks the table subtracting weights; the entry
/// that takes the remainder below zero wins. An empty table waits.
///
/// Stopping at `< 0` rather than `<= 0` gives each entry exactly its weight's
/// share of draws and keeps zero-weight entries unreachable.
pub fn choose_weighted(table: &WeightTable, rng: &mut impl Rng) -> EnemyAction {
    let total = table.total();
    if total == 0 {
        return EnemyAction::Wait;
    }
    let mut remainder = rng.random_range(0..total) as i64;
    table
        .entries()
        .into_iter()
        .filter(|(_, weight)| *weight > 0)
        .find(|(_, weight)| {
            remainder -= i64::from(*weight);
            remainder < 0
        })
        .map_or(EnemyAction::Wait, |(action, _)| action)
}

// ====== Perception ======

/// Where the hero is relative to one enemy, sampled once per tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Perception {
    pub position: Vec3,
    pub hero_position: Vec3,
    /// Squared distance on the ground plane (x/z).
    pub sqr_distance: f32,
    pub can_reach: bool,
    pub same_plane: bool,
    pub hero_nearby: bool,
}

impl Perception {
    pub fn new(position: Vec3, hero_position: Vec3, hero_nearby: bool, reach: (f32, f32)) -> Self {
        let delta = hero_position - position;
        let sqr_distance = delta.x * delta.x + delta.z * delta.z;
        let (min, max) = reach;
        Self {
            position,
            hero_position,
            sqr_distance,
            can_reach: min * min < sqr_distance && sqr_distance < max * max,
            same_plane: delta.z.abs() < SAME_PLANE_TOLERANCE,
            hero_nearby,
        }
    }
}

/// What the enemy should do now.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AiOrder {
    /// Walk to `target + offset`, or `target - offset` if that is blocked.
    Chase { target: Vec3, offset: Vec3 },
    /// Face `target` and swing.
    Attack { target: Vec3 },
    Roam { target: Vec3 },
    Wait,
}

// ====== Engine ======

#[derive(Debug, Clone)]
pub struct EnemyAi {
    current_action: EnemyAction,
    decision_cooldown: f32,
    pub enabled: bool,
    personal_space: f32,
    rng: StdRng,
}

impl EnemyAi {
    pub fn new(personal_space: f32) -> Self {
        Self::with_rng(personal_space, StdRng::from_os_rng())
    }

    pub fn seeded(personal_space: f32, seed: u64) -> Self {
        Self::with_rng(personal_space, StdRng::seed_from_u64(seed))
    }

    fn with_rng(personal_space: f32, rng: StdRng) -> Self {
        Self {
            current_action: EnemyAction::None,
            decision_cooldown: 0.0,
            enabled: true,
            personal_space: personal_space.max(0.0),
            rng,
        }
    }

    pub fn current_action(&self) -> EnemyAction {
        self.current_action
    }

    pub fn decision_cooldown(&self) -> f32 {
        self.decision_cooldown
    }

    /// One AI tick. Returns an order when a decision was taken this tick.
    pub fn tick(&mut self, dt: f32, p: &Perception) -> Option<AiOrder> {
        if !self.enabled {
            return None;
        }

        let mut order = None;
        if p.can_reach && self.current_action == EnemyAction::Chase {
            order = Some(self.set_decision(EnemyAction::Wait, p));
        }

        if self.decision_cooldown > 0.0 {
            self.decision_cooldown = (self.decision_cooldown - dt).max(0.0);
        } else {
            let table = WeightTable::for_perception(p);
            let action = choose_weighted(&table, &mut self.rng);
            order = Some(self.set_decision(action, p));
        }
        order
    }

    fn set_decision(&mut self, action: EnemyAction, p: &Perception) -> AiOrder {
        self.current_action = action;
        match action {
            EnemyAction::Attack => {
                self.decision_cooldown = self.rng.random_range(ATTACK_COOLDOWN);
                AiOrder::Attack { target: p.hero_position }
            }
            EnemyAction::Chase => {
                let side = Vec3::new(p.hero_position.x - p.position.x, 0.0, 0.0).normalize_or_zero();
                let mut offset = side * -self.personal_space;
                offset.z += self.rng.random_range(-CHASE_DEPTH_JITTER..CHASE_DEPTH_JITTER);
                self.decision_cooldown = self.rng.random_range(CHASE_COOLDOWN);
                AiOrder::Chase { target: p.hero_position, offset }
            }
            EnemyAction::Roam => {
                let angle = self.rng.random_range(0.0..TAU);
                let distance = self.rng.random_range(ROAM_DISTANCE);
                let heading = Vec3::new(angle.sin(), 0.0, angle.cos());
                self.decision_cooldown = self.rng.random_range(ROAM_COOLDOWN);
                AiOrder::Roam { target: p.position + heading * distance }
            }
            EnemyAction::Wait | EnemyAction::None => {
                self.decision_cooldown = self.rng.random_range(WAIT_COOLDOWN);
                AiOrder::Wait
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REACH: (f32, f32) = (0.5, 1.5);

    fn far() -> Perception {
        Perception::new(Vec3::ZERO, Vec3::new(30.0, 0.0, 0.0), false, REACH)
    }

    fn in_reach() -> Perception {
        Perception::new(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.1), true, REACH)
    }

    #[test]
    fn perception_flags() {
        let p = in_reach();
        assert!(p.can_reach && p.same_plane);
        assert!((p.sqr_distance - 1.01).abs() < 1e-5);

        let other = Perception::new(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.8), true, REACH);
        assert!(!other.same_plane);

        // height is ignored
        let jumping = Perception::new(Vec3::ZERO, Vec3::new(1.0, 3.0, 0.0), true, REACH);
        assert!(jumping.can_reach);

        let too_close = Perception::new(Vec3::ZERO, Vec3::new(0.2, 0.0, 0.0), true, REACH);
        assert!(!too_close.can_reach);
    }

    #[test]
    fn table_selection_by_context() {
        assert_eq!(WeightTable::for_perception(&far()), WeightTable::FAR_AWAY);
        assert_eq!(WeightTable::for_perception(&in_reach()), WeightTable::IN_REACH);
        let out = Perception::new(Vec3::ZERO, Vec3::new(5.0, 0.0, 0.0), true, REACH);
        assert_eq!(WeightTable::for_perception(&out), WeightTable::SAME_PLANE_OUT_OF_REACH);
        let other = Perception::new(Vec3::ZERO, Vec3::new(5.0, 0.0, 1.0), true, REACH);
        assert_eq!(WeightTable::for_perception(&other), WeightTable::OTHER_PLANE);
    }

    #[test]
    fn weighted_choice_matches_weights() {
        let mut rng = StdRng::seed_from_u64(7);
        let draws = 10_000;
        let (mut attack, mut wait, mut roam, mut chase) = (0u32, 0u32, 0u32, 0u32);
        for _ in 0..draws {
            match choose_weighted(&WeightTable::IN_REACH, &mut rng) {
                EnemyAction::Attack => attack += 1,
                EnemyAction::Wait => wait += 1,
                EnemyAction::Roam => roam += 1,
                EnemyAction::Chase => chase += 1,
                EnemyAction::None => {}
            }
        }
        assert_eq!(chase, 0);

        let expected = [7_000.0, 1_500.0, 1_500.0];
        let observed = [attack as f32, wait as f32, roam as f32];
        let chi2: f32 = observed
            .iter()
            .zip(expected)
            .map(|(o, e)| (o - e) * (o - e) / e)
            .sum();
        // two degrees of freedom, p = 0.001
        assert!(chi2 < 13.82, "chi-square {chi2} too large: {observed:?}");
    }

    #[test]
    fn weighted_choice_is_deterministic_per_seed() {
        let roll = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..64)
                .map(|_| choose_weighted(&WeightTable::OTHER_PLANE, &mut rng))
                .collect::<Vec<_>>()
        };
        assert_eq!(roll(42), roll(42));
    }

    #[test]
    fn empty_table_waits() {
        let mut rng = StdRng::seed_from_u64(1);
        let empty = WeightTable { attack: 0, chase: 0, wait: 0, roam: 0 };
        assert_eq!(choose_weighted(&empty, &mut rng), EnemyAction::Wait);
    }

    #[test]
    fn hero_far_away_only_waits_or_chases() {
        let mut ai = EnemyAi::seeded(1.2, 3);
        let p = far();
        let mut decisions = 0;
        for _ in 0..2_000 {
            if let Some(order) = ai.tick(0.1, &p) {
                decisions += 1;
                assert!(matches!(order, AiOrder::Wait | AiOrder::Chase { .. }), "{order:?}");
                assert!(matches!(ai.current_action(), EnemyAction::Wait | EnemyAction::Chase));
            }
        }
        assert!(decisions > 100);
    }

    #[test]
    fn decisions_wait_for_the_cooldown() {
        let mut ai = EnemyAi::seeded(1.2, 5);
        let p = far();
        assert!(ai.tick(0.016, &p).is_some());
        let cooldown = ai.decision_cooldown();
        assert!(cooldown >= 0.2 && cooldown < 0.5);
        assert!(ai.tick(0.016, &p).is_none());
    }

    #[test]
    fn long_frame_empties_the_cooldown_without_going_negative() {
        let mut ai = EnemyAi::seeded(1.2, 5);
        let p = far();
        assert!(ai.tick(0.016, &p).is_some());
        assert!(ai.tick(10.0, &p).is_none());
        assert_eq!(ai.decision_cooldown(), 0.0);
        assert!(ai.tick(0.016, &p).is_some());
    }

    #[test]
    fn chase_is_preempted_when_in_reach() {
        let mut ai = EnemyAi::seeded(1.2, 11);
        let p = far();
        while ai.current_action() != EnemyAction::Chase {
            ai.tick(1.0, &p);
        }
        assert!(ai.decision_cooldown() > 0.0);

        let order = ai.tick(0.0, &in_reach());
        assert_eq!(order, Some(AiOrder::Wait));
        assert_eq!(ai.current_action(), EnemyAction::Wait);
        assert!(ai.decision_cooldown() >= 0.2);
    }

    #[test]
    fn chase_offset_stands_in_front_of_the_hero() {
        let mut ai = EnemyAi::seeded(1.2, 2);
        let p = Perception::new(Vec3::ZERO, Vec3::new(6.0, 0.0, 0.0), false, REACH);
        for _ in 0..200 {
            if let Some(AiOrder::Chase { target, offset }) = ai.tick(1.0, &p) {
                assert_eq!(target, p.hero_position);
                assert!((offset.x + 1.2).abs() < 1e-5);
                assert!(offset.z.abs() <= CHASE_DEPTH_JITTER);
                return;
            }
        }
        panic!("no chase decision in 200 ticks");
    }

    #[test]
    fn roam_targets_are_20_to_50_units_away() {
        let mut ai = EnemyAi::seeded(1.2, 9);
        let p = Perception::new(Vec3::ZERO, Vec3::new(5.0, 0.0, 1.0), true, REACH);
        let mut roams = 0;
        for _ in 0..2_000 {
            if let Some(AiOrder::Roam { target }) = ai.tick(1.0, &p) {
                let d = Vec3::new(target.x, 0.0, target.z).length();
                assert!(d > 19.99 && d < 50.01, "roam distance {d}");
                assert_eq!(target.y, 0.0);
                roams += 1;
            }
        }
        assert!(roams > 0);
    }

    #[test]
    fn in_reach_attacks_face_the_hero() {
        let mut ai = EnemyAi::seeded(1.2, 4);
        let p = in_reach();
        let attack = (0..500).find_map(|_| match ai.tick(2.0, &p) {
            Some(AiOrder::Attack { target }) => Some(target),
            _ => None,
        });
        assert_eq!(attack, Some(p.hero_position));
        assert!(ai.decision_cooldown() >= 1.0);
    }

    #[test]
    fn disabled_ai_does_nothing() {
        let mut ai = EnemyAi::seeded(1.2, 1);
        ai.enabled = false;
        assert!(ai.tick(1.0, &in_reach()).is_none());
        assert_eq!(ai.current_action(), EnemyAction::None);
    }
}
