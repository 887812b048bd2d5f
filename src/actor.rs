// actor.rs
//! Shared combatant state machine.
//!
//! ```text
//! Alive-Active --knockdown hit--> Knocked-Down --1.0s--> Getting-Up --0.4s--> Alive-Active
//!      |                              |                       |
//!      +---------- life <= 0 ---------+-----------------------+--> Dead
//! ```
//!
//! `Dead` is terminal. Hero and Enemy embed an [`Actor`] and share the hit
//! routing through the [`Combatant`] trait.

use std::time::Duration;

use bevy::math::Vec3;
use bevy::time::{Timer, TimerMode};
use log::debug;

use crate::combat::{AttackData, CombatPolicy, Hit, HitOutcome, Team};
use crate::rig::{ActorRig, AnimBool, AnimTrigger, Facing, ForceMode, SoundCue};

// ====== Tuning ======
pub const KNOCKDOWN_SECONDS: f32 = 1.0;
pub const GET_UP_SECONDS: f32 = 0.4;
const KNOCKBACK_UPWARD_BIAS: f32 = 0.75;
const KNOCKBACK_FORCE: f32 = 250.0;
const DEATH_FLICKER_CYCLES: u32 = 5;
const DEATH_FLICKER_HALF_PERIOD: f32 = 0.1;
const DEATH_FLICKER_ALPHA: f32 = 0.5;
const OVERKILL_THUMBNAIL_ALPHA: f32 = 0.75;

#[derive(Debug, Clone, PartialEq)]
enum DownPhase {
    Down(Timer),
    GettingUp(Timer),
}

/// Opacity toggles on a repeating half period until the cycles run out.
#[derive(Debug, Clone, PartialEq)]
struct DeathFlicker {
    timer: Timer,
    flips: u32,
}

impl DeathFlicker {
    fn new() -> Self {
        Self {
            timer: Timer::from_seconds(DEATH_FLICKER_HALF_PERIOD, TimerMode::Repeating),
            flips: 0,
        }
    }

    fn is_finished(&self) -> bool {
        self.flips >= DEATH_FLICKER_CYCLES * 2
    }

    /// Returns the new dimmed state when the phase changed this tick.
    fn tick(&mut self, delta: Duration) -> Option<bool> {
        if self.is_finished() {
            return None;
        }
        let flips = self.timer.tick(delta).times_finished_this_tick();
        if flips == 0 {
            return None;
        }
        self.flips = (self.flips + flips).min(DEATH_FLICKER_CYCLES * 2);
        Some(!self.is_finished() && self.flips % 2 == 0)
    }
}

fn tick_delta(dt: f32) -> Duration {
    Duration::from_secs_f32(dt.max(0.0))
}

#[derive(Debug, Clone)]
pub struct Actor {
    team: Team,
    is_alive: bool,
    is_knocked_out: bool,
    max_life: f32,
    current_life: f32,
    facing: Facing,
    is_grounded: bool,
    pub speed: f32,
    pub normal_attack: AttackData,
    down: Option<DownPhase>,
    death: Option<DeathFlicker>,
}

impl Actor {
    pub fn new(team: Team, max_life: f32, normal_attack: AttackData) -> Self {
        let max_life = if max_life > 0.0 { max_life } else { 1.0 };
        Self {
            team,
            is_alive: true,
            is_knocked_out: false,
            max_life,
            current_life: max_life,
            facing: Facing::Right,
            is_grounded: true,
            speed: 0.0,
            normal_attack: normal_attack.sanitized(),
            down: None,
            death: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_life(mut self, life: f32) -> Self {
        self.current_life = life.min(self.max_life);
        self
    }

    /// Pushes the spawn state to the rig.
    pub fn enter_play(&self, rig: &mut dyn ActorRig) {
        rig.set_bool(AnimBool::IsAlive, self.is_alive);
        rig.set_bool(AnimBool::IsGrounded, self.is_grounded);
        rig.set_collider_stance(true);
        rig.set_facing(self.facing);
    }

    pub fn team(&self) -> Team {
        self.team
    }

    pub fn is_alive(&self) -> bool {
        self.is_alive
    }

    pub fn is_knocked_out(&self) -> bool {
        self.is_knocked_out
    }

    pub fn current_life(&self) -> f32 {
        self.current_life
    }

    pub fn max_life(&self) -> f32 {
        self.max_life
    }

    pub fn life_fraction(&self) -> f32 {
        self.current_life / self.max_life
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn front_vector(&self) -> Vec3 {
        self.facing.front()
    }

    pub fn is_grounded(&self) -> bool {
        self.is_grounded
    }

    pub fn can_be_hit(&self) -> bool {
        self.is_alive && !self.is_knocked_out
    }

    /// The death flicker has played out; the entity can leave the world.
    pub fn ready_for_removal(&self) -> bool {
        self.death.as_ref().is_some_and(DeathFlicker::is_finished)
    }

    // ====== Orientation ======

    pub fn flip(&mut self, facing: Facing, rig: &mut dyn ActorRig) {
        self.facing = facing;
        rig.set_facing(facing);
    }

    pub fn face_target(&mut self, target: Vec3, rig: &mut dyn ActorRig) {
        let is_left = rig.position().x - target.x > 0.0;
        self.flip(Facing::from_left(is_left), rig);
    }

    // ====== Actions ======

    /// Fires the attack trigger. Returns `false` when the actor cannot act.
    pub fn attack(&self, rig: &mut dyn ActorRig) -> bool {
        if !self.is_alive || self.is_knocked_out {
            return false;
        }
        rig.set_trigger(AnimTrigger::Attack);
        true
    }

    /// Floor contact changed. Returns `true` on a landing.
    pub fn on_ground_contact(&mut self, grounded: bool, rig: &mut dyn ActorRig) -> bool {
        let landed = grounded && !self.is_grounded;
        self.is_grounded = grounded;
        rig.set_bool(AnimBool::IsGrounded, grounded);
        landed
    }

    // ====== Damage ======

    pub fn take_damage(
        &mut self,
        rig: &mut dyn ActorRig,
        policy: &mut dyn CombatPolicy,
        amount: f32,
        hit_dir: Vec3,
        knockdown: bool,
    ) -> HitOutcome {
        if !self.is_alive {
            return HitOutcome::Ignored;
        }

        let hit = policy.shape_hit(
            Hit {
                amount: amount.max(0.0),
                knockdown,
            },
            self.is_grounded,
        );

        self.flip(Facing::from_left(hit_dir.x > 0.0), rig);
        self.current_life -= hit.amount;

        let outcome = if self.current_life <= 0.0 {
            self.die(rig);
            HitOutcome::Died
        } else if hit.knockdown {
            let push = (hit_dir + Vec3::Y * KNOCKBACK_UPWARD_BIAS).normalize_or_zero();
            rig.add_force(push * KNOCKBACK_FORCE, ForceMode::Force);
            if !matches!(self.down, Some(DownPhase::Down(_))) {
                self.start_knockdown(rig);
            }
            HitOutcome::KnockedDown
        } else if policy.can_flinch() {
            rig.set_trigger(AnimTrigger::IsHurt);
            HitOutcome::Flinched
        } else {
            HitOutcome::Absorbed
        };

        self.refresh_life_bar(rig);
        outcome
    }

    /// Returns `true` only on the call that performs the transition.
    pub fn die(&mut self, rig: &mut dyn ActorRig) -> bool {
        if !self.is_alive {
            return false;
        }
        self.down = None;
        self.is_alive = false;
        rig.set_bool(AnimBool::IsAlive, false);
        rig.set_collider_stance(false);
        rig.set_opacity(DEATH_FLICKER_ALPHA);
        rig.play_sfx(SoundCue::Death);
        self.death = Some(DeathFlicker::new());
        debug!("{:?} actor died", self.team);
        true
    }

    fn start_knockdown(&mut self, rig: &mut dyn ActorRig) {
        self.is_knocked_out = true;
        self.down = Some(DownPhase::Down(Timer::from_seconds(
            KNOCKDOWN_SECONDS,
            TimerMode::Once,
        )));
        rig.set_trigger(AnimTrigger::Knockdown);
        rig.set_collider_stance(false);
    }

    fn refresh_life_bar(&self, rig: &mut dyn ActorRig) {
        rig.show(true);
        rig.set_progress(self.life_fraction());
        let alpha = if self.current_life < 0.0 {
            OVERKILL_THUMBNAIL_ALPHA
        } else {
            1.0
        };
        rig.set_thumbnail(alpha);
    }

    /// Advances knockdown, get-up and death sequences.
    pub fn tick(&mut self, dt: f32, rig: &mut dyn ActorRig) {
        let delta = tick_delta(dt);
        match &mut self.down {
            Some(DownPhase::Down(timer)) => {
                if timer.tick(delta).just_finished() {
                    rig.set_collider_stance(true);
                    rig.set_trigger(AnimTrigger::GetUp);
                    self.down = Some(DownPhase::GettingUp(Timer::from_seconds(
                        GET_UP_SECONDS,
                        TimerMode::Once,
                    )));
                }
            }
            Some(DownPhase::GettingUp(timer)) => {
                if timer.tick(delta).just_finished() {
                    self.down = None;
                    self.is_knocked_out = false;
                }
            }
            None => {}
        }

        if let Some(death) = &mut self.death {
            if let Some(dimmed) = death.tick(delta) {
                rig.set_opacity(if dimmed { DEATH_FLICKER_ALPHA } else { 1.0 });
            }
        }
    }
}

// ====== Hit routing ======

/// Anything that can deal and receive melee hits.
pub trait Combatant {
    fn actor(&self) -> &Actor;
    fn actor_mut(&mut self) -> &mut Actor;

    fn take_damage(
        &mut self,
        rig: &mut dyn ActorRig,
        amount: f32,
        hit_dir: Vec3,
        knockdown: bool,
    ) -> HitOutcome;

    fn evaluate_attack_data(
        &mut self,
        rig: &mut dyn ActorRig,
        data: &AttackData,
        hit_dir: Vec3,
        hit_point: Vec3,
    ) -> HitOutcome {
        if !self.actor().is_alive() {
            return HitOutcome::Ignored;
        }
        rig.add_force(hit_dir * data.force, ForceMode::Force);
        let outcome = self.take_damage(rig, data.damage, hit_dir, data.knockdown);
        rig.spawn_hit_effects(data.damage, hit_point);
        outcome
    }

    /// Resolves a hit already known to be valid. Override to pick the profile.
    fn hit_actor(
        &mut self,
        rig: &mut dyn ActorRig,
        target: &mut dyn Combatant,
        target_rig: &mut dyn ActorRig,
        hit_point: Vec3,
        hit_dir: Vec3,
    ) -> HitOutcome {
        let attack = self.actor().normal_attack;
        let outcome = target.evaluate_attack_data(target_rig, &attack, hit_dir, hit_point);
        rig.play_sfx(SoundCue::Hit);
        outcome
    }

    /// Entry point for melee contact. Same-team, dead or downed targets are
    /// silently ignored.
    fn did_hit_object(
        &mut self,
        rig: &mut dyn ActorRig,
        target: &mut dyn Combatant,
        target_rig: &mut dyn ActorRig,
        hit_point: Vec3,
        hit_dir: Vec3,
    ) -> HitOutcome {
        if !self.actor().is_alive()
            || target.actor().team() == self.actor().team()
            || !target.actor().can_be_hit()
        {
            return HitOutcome::Ignored;
        }
        self.hit_actor(rig, target, target_rig, hit_point, hit_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::EnemyKind;
    use crate::rig::testing::FakeRig;
    use proptest::prelude::*;

    struct Dummy {
        actor: Actor,
        kind: EnemyKind,
    }

    impl Dummy {
        fn new(team: Team, life: f32) -> Self {
            Self {
                actor: Actor::new(team, life, AttackData::default()),
                kind: EnemyKind::Robot,
            }
        }
    }

    impl Combatant for Dummy {
        fn actor(&self) -> &Actor {
            &self.actor
        }
        fn actor_mut(&mut self) -> &mut Actor {
            &mut self.actor
        }
        fn take_damage(
            &mut self,
            rig: &mut dyn ActorRig,
            amount: f32,
            hit_dir: Vec3,
            knockdown: bool,
        ) -> HitOutcome {
            self.actor
                .take_damage(rig, &mut self.kind, amount, hit_dir, knockdown)
        }
    }

    fn run(actor: &mut Actor, rig: &mut FakeRig, seconds: f32) {
        let steps = (seconds / 0.05).round() as usize;
        for _ in 0..steps {
            actor.tick(0.05, rig);
        }
    }

    #[test]
    fn dead_actor_ignores_damage() {
        let mut d = Dummy::new(Team::Enemy, 10.0);
        let mut rig = FakeRig::new();
        assert_eq!(d.take_damage(&mut rig, 15.0, Vec3::X, false), HitOutcome::Died);
        let life = d.actor.current_life();
        assert_eq!(d.take_damage(&mut rig, 5.0, Vec3::X, false), HitOutcome::Ignored);
        assert_eq!(d.actor.current_life(), life);
        assert_eq!(rig.sounds.iter().filter(|s| **s == SoundCue::Death).count(), 1);
        assert_eq!(rig.flag(AnimBool::IsAlive), Some(false));
        assert!(!rig.standing);
    }

    #[test]
    fn faces_the_hit_source() {
        let mut d = Dummy::new(Team::Enemy, 100.0);
        let mut rig = FakeRig::new();
        d.take_damage(&mut rig, 1.0, Vec3::X, false);
        assert_eq!(d.actor.facing(), Facing::Left);
        d.take_damage(&mut rig, 1.0, Vec3::NEG_X, false);
        assert_eq!(d.actor.facing(), Facing::Right);
        assert_eq!(rig.facing, Some(Facing::Right));
    }

    #[test]
    fn flinch_keeps_actor_hittable() {
        let mut d = Dummy::new(Team::Enemy, 100.0);
        let mut rig = FakeRig::new();
        assert_eq!(d.take_damage(&mut rig, 10.0, Vec3::X, false), HitOutcome::Flinched);
        assert_eq!(rig.count(AnimTrigger::IsHurt), 1);
        assert!(d.actor.can_be_hit());
        assert_eq!(rig.progress, Some(0.9));
        assert_eq!(rig.thumbnail_alpha, Some(1.0));
        assert!(rig.bar_visible);
    }

    #[test]
    fn knockdown_blocks_hits_until_recovered() {
        let mut d = Dummy::new(Team::Enemy, 100.0);
        let mut rig = FakeRig::new();
        assert_eq!(
            d.take_damage(&mut rig, 10.0, Vec3::X, true),
            HitOutcome::KnockedDown
        );
        assert!(!d.actor.can_be_hit());
        assert!(!rig.standing);
        assert_eq!(rig.count(AnimTrigger::Knockdown), 1);
        assert_eq!(rig.forces.len(), 1);

        run(&mut d.actor, &mut rig, 0.9);
        assert!(!d.actor.can_be_hit());
        assert_eq!(rig.count(AnimTrigger::GetUp), 0);

        run(&mut d.actor, &mut rig, 0.2);
        assert_eq!(rig.count(AnimTrigger::GetUp), 1);
        assert!(rig.standing);
        assert!(!d.actor.can_be_hit());

        run(&mut d.actor, &mut rig, 0.5);
        assert!(d.actor.can_be_hit());
        assert!(d.actor.is_alive());
    }

    #[test]
    fn second_knockdown_while_down_does_not_restart() {
        let mut d = Dummy::new(Team::Enemy, 100.0);
        let mut rig = FakeRig::new();
        d.take_damage(&mut rig, 10.0, Vec3::X, true);
        run(&mut d.actor, &mut rig, 0.5);
        d.take_damage(&mut rig, 10.0, Vec3::X, true);
        assert_eq!(rig.count(AnimTrigger::Knockdown), 1);
        run(&mut d.actor, &mut rig, 0.55);
        assert_eq!(rig.count(AnimTrigger::GetUp), 1);
    }

    #[test]
    fn knockdown_during_get_up_cancels_it() {
        let mut d = Dummy::new(Team::Enemy, 100.0);
        let mut rig = FakeRig::new();
        d.take_damage(&mut rig, 10.0, Vec3::X, true);
        run(&mut d.actor, &mut rig, 1.1);
        assert_eq!(rig.count(AnimTrigger::GetUp), 1);

        d.take_damage(&mut rig, 10.0, Vec3::X, true);
        assert_eq!(rig.count(AnimTrigger::Knockdown), 2);
        run(&mut d.actor, &mut rig, 0.5);
        // the cancelled get-up must not clear the new knockdown
        assert!(d.actor.is_knocked_out());
    }

    #[test]
    fn death_cancels_knockdown_and_flickers() {
        let mut d = Dummy::new(Team::Enemy, 20.0);
        let mut rig = FakeRig::new();
        d.take_damage(&mut rig, 10.0, Vec3::X, true);
        assert!(d.actor.die(&mut rig));
        assert!(!d.actor.die(&mut rig));
        assert_eq!(rig.opacity, 0.5);

        run(&mut d.actor, &mut rig, 0.1);
        assert_eq!(rig.opacity, 1.0);
        assert!(!d.actor.ready_for_removal());
        run(&mut d.actor, &mut rig, 0.9);
        assert_eq!(rig.count(AnimTrigger::GetUp), 0);
        assert!(d.actor.ready_for_removal());
        assert_eq!(rig.opacity, 1.0);
        assert!(!d.actor.can_be_hit());
    }

    #[test]
    fn long_frame_finishes_death_flicker_at_once() {
        let mut d = Dummy::new(Team::Enemy, 10.0);
        let mut rig = FakeRig::new();
        d.take_damage(&mut rig, 15.0, Vec3::X, false);
        d.actor.tick(5.0, &mut rig);
        assert!(d.actor.ready_for_removal());
        assert_eq!(rig.opacity, 1.0);
    }

    #[test]
    fn overkill_tints_thumbnail() {
        let mut d = Dummy::new(Team::Enemy, 10.0);
        let mut rig = FakeRig::new();
        d.take_damage(&mut rig, 25.0, Vec3::X, false);
        assert_eq!(rig.thumbnail_alpha, Some(0.75));
        assert_eq!(rig.progress, Some(-1.5));
    }

    #[test]
    fn attack_is_guarded() {
        let mut d = Dummy::new(Team::Enemy, 100.0);
        let mut rig = FakeRig::new();
        assert!(d.actor.attack(&mut rig));
        d.take_damage(&mut rig, 1.0, Vec3::X, true);
        assert!(!d.actor.attack(&mut rig));
        assert_eq!(rig.count(AnimTrigger::Attack), 1);
    }

    #[test]
    fn did_hit_object_filters_targets() {
        let mut hero = Dummy::new(Team::Hero, 100.0);
        let mut ally = Dummy::new(Team::Hero, 100.0);
        let mut foe = Dummy::new(Team::Enemy, 100.0);
        let (mut hero_rig, mut ally_rig, mut foe_rig) = (FakeRig::new(), FakeRig::new(), FakeRig::new());

        let same = hero.did_hit_object(&mut hero_rig, &mut ally, &mut ally_rig, Vec3::ZERO, Vec3::X);
        assert_eq!(same, HitOutcome::Ignored);
        assert_eq!(ally.actor.current_life(), 100.0);

        let hit = hero.did_hit_object(&mut hero_rig, &mut foe, &mut foe_rig, Vec3::ONE, Vec3::X);
        assert_eq!(hit, HitOutcome::Flinched);
        assert_eq!(foe.actor.current_life(), 90.0);
        assert_eq!(foe_rig.hit_effects, vec![(10.0, Vec3::ONE)]);
        assert_eq!(foe_rig.forces[0], (Vec3::X * 50.0, ForceMode::Force));
        assert_eq!(hero_rig.sounds, vec![SoundCue::Hit]);

        foe.take_damage(&mut foe_rig, 0.0, Vec3::X, true);
        let downed = hero.did_hit_object(&mut hero_rig, &mut foe, &mut foe_rig, Vec3::ONE, Vec3::X);
        assert_eq!(downed, HitOutcome::Ignored);
        assert_eq!(foe_rig.hit_effects.len(), 1);
    }

    #[test]
    fn boss_absorbs_instead_of_flinching() {
        let mut boss = Dummy::new(Team::Enemy, 100.0);
        boss.kind = EnemyKind::Boss;
        let mut rig = FakeRig::new();
        assert_eq!(boss.take_damage(&mut rig, 10.0, Vec3::X, true), HitOutcome::Absorbed);
        assert_eq!(rig.count(AnimTrigger::IsHurt), 0);
        assert_eq!(rig.count(AnimTrigger::Knockdown), 0);
        assert!(boss.actor.can_be_hit());
    }

    proptest! {
        #[test]
        fn life_never_exceeds_max_and_death_is_single(
            hits in prop::collection::vec((0.0f32..40.0, any::<bool>()), 1..40)
        ) {
            let mut d = Dummy::new(Team::Enemy, 100.0);
            let mut rig = FakeRig::new();
            let mut deaths = 0;
            for (amount, knockdown) in hits {
                if d.take_damage(&mut rig, amount, Vec3::X, knockdown) == HitOutcome::Died {
                    deaths += 1;
                }
                prop_assert!(d.actor.current_life() <= d.actor.max_life());
                d.actor.tick(0.05, &mut rig);
            }
            prop_assert!(deaths <= 1);
            prop_assert_eq!(deaths == 1, !d.actor.is_alive());
            let death_cues = rig.sounds.iter().filter(|s| **s == SoundCue::Death).count();
            prop_assert_eq!(death_cues, deaths);
        }
    }
}
