// hero.rs
//! Player-controlled combatant: movement tiers, jumping, the three-hit combo,
//! weapon pickups and the scripted autopilot used for level intros/outros.

use bevy::prelude::*;
use log::{debug, info};

use crate::actor::{Actor, Combatant};
use crate::class::HeroClass;
use crate::combat::{AttackData, HitOutcome, PlayerPolicy, Team};
use crate::controls::InputSource;
use crate::navigation::NavigationProvider;
use crate::pickups::{Container, ItemEvent, ItemId, Powerup};
use crate::rig::{
    ActorRig, AnimBool, AnimEvent, AnimFloat, AnimInt, AnimState, AnimTrigger, Facing, ForceMode,
    SoundCue,
};
use crate::sensors::JumpSensors;
use crate::walker::Walker;
use crate::wave::StageCue;

// ====== Tuning ======
pub const TAP_AGAIN_TO_RUN: f32 = 0.2;
pub const ATTACK_LIMIT: f32 = 0.14;
pub const JUMP_DURATION: f32 = 0.2;
const JUMP_HORIZONTAL_MULTIPLIER: f32 = 40.0;
const RUN_ATTACK_FRONT_SCALE: f32 = 5.0;
const MAX_COMBO: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeedTier {
    #[default]
    Stopped,
    Walk,
    Run,
}

// ====== Combo table ======

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackSlot {
    Combo(usize),
    Jump,
    Run,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComboStep {
    pub slot: AttackSlot,
    /// `None` leaves the chain where it is.
    pub next_chain: Option<i32>,
    pub cue: SoundCue,
}

const COMBO_TABLE: [(AnimState, ComboStep); 5] = [
    (
        AnimState::Attack1,
        ComboStep { slot: AttackSlot::Combo(0), next_chain: Some(2), cue: SoundCue::Hit },
    ),
    (
        AnimState::Attack2,
        ComboStep { slot: AttackSlot::Combo(1), next_chain: Some(3), cue: SoundCue::Hit },
    ),
    (
        AnimState::Attack3,
        ComboStep { slot: AttackSlot::Combo(2), next_chain: Some(1), cue: SoundCue::Hit2 },
    ),
    (
        AnimState::JumpAttack,
        ComboStep { slot: AttackSlot::Jump, next_chain: None, cue: SoundCue::Hit2 },
    ),
    (
        AnimState::RunAttack,
        ComboStep { slot: AttackSlot::Run, next_chain: None, cue: SoundCue::Hit2 },
    ),
];

/// Which profile and follow-up a hit resolves to, keyed by the swing playing.
pub fn combo_step(state: AnimState) -> Option<ComboStep> {
    COMBO_TABLE
        .iter()
        .find(|(s, _)| *s == state)
        .map(|(_, step)| *step)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeroAttacks {
    pub combo: [AttackData; 3],
    pub jump: AttackData,
    pub run: AttackData,
}

/// Animation-derived flags, refreshed at the top of every update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct AnimFlags {
    attacking: bool,
    jumping: bool,
    landing: bool,
    hurt: bool,
    picking_up: bool,
}

impl AnimFlags {
    fn classify(state: AnimState) -> Self {
        Self {
            attacking: state.is_attack(),
            jumping: state.is_jumping(),
            landing: state == AnimState::JumpLand,
            hurt: state == AnimState::Hurt,
            picking_up: state == AnimState::Pickup,
        }
    }
}

// ====== Hero ======

#[derive(Component, Debug)]
pub struct Hero {
    pub actor: Actor,
    policy: PlayerPolicy,
    walk_speed: f32,
    run_speed: f32,
    jump_force: f32,
    run_attack_force: f32,
    chain_combo_limit: f32,
    attacks: HeroAttacks,

    tier: SpeedTier,
    is_moving: bool,
    current_dir: Vec3,
    last_walk: f32,
    last_walk_vector: Vec3,
    is_facing_left: bool,

    pub can_run: bool,
    pub can_jump: bool,
    can_jump_attack: bool,
    last_jump_time: f32,
    last_attack_time: f32,

    current_chain: i32,
    evaluated_chain: i32,
    combo_window: f32,

    weapon: Option<Powerup>,
    nearby_item: Option<Powerup>,
    weapon_drop_pressed: bool,
    item_events: Vec<ItemEvent>,

    autopiloting: bool,
    controllable: bool,
    walker: Walker<StageCue>,

    flags: AnimFlags,
    clock: f32,
}

impl Hero {
    pub fn new(class: &HeroClass) -> Self {
        Self {
            actor: Actor::new(Team::Hero, class.max_life, class.normal_attacks[0]),
            policy: PlayerPolicy::new(class.hurt_limit, class.recovery_rate),
            walk_speed: class.walk_speed,
            run_speed: class.run_speed,
            jump_force: class.jump_force,
            run_attack_force: class.run_attack_force,
            chain_combo_limit: class.chain_combo_limit.max(0.0),
            attacks: HeroAttacks {
                combo: class.normal_attacks.map(AttackData::sanitized),
                jump: class.jump_attack.sanitized(),
                run: class.run_attack.sanitized(),
            },
            tier: SpeedTier::Stopped,
            is_moving: false,
            current_dir: Vec3::ZERO,
            last_walk: f32::NEG_INFINITY,
            last_walk_vector: Vec3::ZERO,
            is_facing_left: false,
            can_run: true,
            can_jump: true,
            can_jump_attack: true,
            last_jump_time: f32::NEG_INFINITY,
            last_attack_time: f32::NEG_INFINITY,
            current_chain: 0,
            evaluated_chain: 0,
            combo_window: 0.0,
            weapon: None,
            nearby_item: None,
            weapon_drop_pressed: false,
            item_events: Vec::new(),
            autopiloting: false,
            controllable: true,
            walker: Walker::new(),
            flags: AnimFlags::default(),
            clock: 0.0,
        }
    }

    pub fn tier(&self) -> SpeedTier {
        self.tier
    }

    pub fn current_chain(&self) -> i32 {
        self.current_chain
    }

    pub fn combo_window(&self) -> f32 {
        self.combo_window
    }

    pub fn hurt_tolerance(&self) -> f32 {
        self.policy.tolerance
    }

    pub fn weapon(&self) -> Option<&Powerup> {
        self.weapon.as_ref()
    }

    pub fn is_autopiloting(&self) -> bool {
        self.autopiloting
    }

    pub fn set_controllable(&mut self, controllable: bool) {
        self.controllable = controllable;
    }

    /// Item changes since the last call, oldest first.
    pub fn drain_item_events(&mut self) -> Vec<ItemEvent> {
        std::mem::take(&mut self.item_events)
    }

    // ====== Per-frame ======

    pub fn update(
        &mut self,
        dt: f32,
        input: &dyn InputSource,
        sensors: &JumpSensors,
        rig: &mut dyn ActorRig,
    ) {
        self.clock += dt;
        self.actor.tick(dt, rig);
        if !self.actor.is_alive() {
            return;
        }

        self.flags = AnimFlags::classify(rig.current_state());
        if self.autopiloting || !self.controllable {
            return;
        }

        let h = input.horizontal_axis();
        let v = input.vertical_axis();
        let jump = input.jump_pressed();
        let attack = input.attack_pressed();

        self.current_dir = Vec3::new(h, 0.0, v).normalize_or_zero();

        if !self.flags.attacking {
            if h == 0.0 && v == 0.0 {
                self.stop(rig);
                self.is_moving = false;
            } else if !self.is_moving {
                self.is_moving = true;
                let same_way = self.current_dir.dot(self.last_walk_vector) > 0.0;
                if self.can_run && self.clock < self.last_walk + TAP_AGAIN_TO_RUN && same_way {
                    self.run(rig);
                } else {
                    self.walk(rig);
                    if h != 0.0 {
                        self.last_walk_vector = self.current_dir;
                        self.last_walk = self.clock;
                    }
                }
            }
        }

        self.tick_combo_window(dt, rig);

        if jump && self.weapon.is_some() {
            self.weapon_drop_pressed = true;
            self.drop_weapon();
        }
        if self.weapon_drop_pressed && !jump {
            self.weapon_drop_pressed = false;
        }

        let grounded = self.actor.is_grounded();
        if self.can_jump
            && jump
            && !self.actor.is_knocked_out()
            && sensors.can_jump(self.current_dir, self.actor.front_vector())
            && !self.flags.landing
            && !self.flags.attacking
            && !self.flags.picking_up
            && !self.weapon_drop_pressed
            && (grounded
                || (self.flags.jumping && self.clock < self.last_jump_time + JUMP_DURATION))
        {
            self.jump(dt, rig);
        }

        let nearby_equippable = self.nearby_item.as_ref().is_some_and(Powerup::can_equip);
        if attack
            && self.attack_ready()
            && grounded
            && !self.flags.picking_up
            && !self.flags.attacking
            && nearby_equippable
        {
            self.last_attack_time = self.clock;
            self.stop(rig);
            rig.set_trigger(AnimTrigger::PickupPowerup);
        }

        if attack && self.attack_ready() && !self.actor.is_knocked_out() && !self.flags.picking_up {
            self.last_attack_time = self.clock;
            self.attack(rig);
        }

        self.policy.recover(dt);
    }

    /// Physics step: free movement, or the autopilot walker. Returns the
    /// stage cue when a scripted walk finishes.
    pub fn fixed_update(&mut self, dt: f32, rig: &mut dyn ActorRig) -> Option<StageCue> {
        if !self.actor.is_alive() {
            return None;
        }

        if self.autopiloting {
            let can_walk = self.can_walk();
            return self.walker.fixed_tick(dt, &mut self.actor, can_walk, rig);
        }

        let move_vector = self.current_dir * self.actor.speed;
        if self.can_walk() {
            rig.move_position(rig.position() + move_vector * dt);
            rig.set_float(AnimFloat::Speed, move_vector.length());
        }

        if move_vector != Vec3::ZERO
            && self.actor.is_grounded()
            && !self.actor.is_knocked_out()
            && !self.flags.attacking
        {
            if move_vector.x != 0.0 {
                self.is_facing_left = move_vector.x < 0.0;
            }
            self.actor.flip(Facing::from_left(self.is_facing_left), rig);
        }
        None
    }

    pub fn can_walk(&self) -> bool {
        self.actor.is_grounded()
            && !self.flags.attacking
            && !self.flags.landing
            && !self.actor.is_knocked_out()
            && !self.flags.hurt
    }

    fn attack_ready(&self) -> bool {
        self.clock >= self.last_attack_time + ATTACK_LIMIT
    }

    fn tick_combo_window(&mut self, dt: f32, rig: &mut dyn ActorRig) {
        if self.combo_window > 0.0 {
            self.combo_window -= dt;
            if self.combo_window <= 0.0 {
                self.combo_window = 0.0;
                self.set_chain(0, 0, rig);
            }
        }
    }

    fn set_chain(&mut self, current: i32, evaluated: i32, rig: &mut dyn ActorRig) {
        self.current_chain = current;
        self.evaluated_chain = evaluated;
        rig.set_integer(AnimInt::CurrentChain, current);
        rig.set_integer(AnimInt::EvaluatedChain, evaluated);
    }

    // ====== Locomotion ======

    pub fn stop(&mut self, rig: &mut dyn ActorRig) {
        self.tier = SpeedTier::Stopped;
        self.actor.speed = 0.0;
        rig.set_float(AnimFloat::Speed, 0.0);
        rig.set_bool(AnimBool::IsRunning, false);
    }

    pub fn walk(&mut self, rig: &mut dyn ActorRig) {
        self.tier = SpeedTier::Walk;
        self.actor.speed = self.walk_speed;
        rig.set_float(AnimFloat::Speed, self.walk_speed);
        rig.set_bool(AnimBool::IsRunning, false);
    }

    pub fn run(&mut self, rig: &mut dyn ActorRig) {
        self.tier = SpeedTier::Run;
        self.actor.speed = self.run_speed;
        rig.set_bool(AnimBool::IsRunning, true);
        rig.set_float(AnimFloat::Speed, self.run_speed);
    }

    fn jump(&mut self, dt: f32, rig: &mut dyn ActorRig) {
        if !self.flags.jumping {
            rig.set_trigger(AnimTrigger::Jump);
            self.last_jump_time = self.clock;
            let horizontal = Vec3::new(self.current_dir.x, 0.0, self.current_dir.z)
                * self.actor.speed
                * JUMP_HORIZONTAL_MULTIPLIER;
            rig.add_force(horizontal, ForceMode::Force);
        }
        rig.add_force(Vec3::Y * self.jump_force * dt, ForceMode::Force);
    }

    /// Floor contact changed. Landing resumes walking and re-arms the jump attack.
    pub fn on_ground_contact(&mut self, grounded: bool, rig: &mut dyn ActorRig) {
        if self.actor.on_ground_contact(grounded, rig) {
            self.can_jump_attack = true;
            self.walk(rig);
        }
    }

    // ====== Attacks ======

    /// Starts a swing. Returns `false` when no attack could begin.
    pub fn attack(&mut self, rig: &mut dyn ActorRig) -> bool {
        if !self.actor.is_alive() || self.actor.is_knocked_out() || self.current_chain > MAX_COMBO {
            return false;
        }

        if !self.actor.is_grounded() {
            if !(self.flags.jumping && self.can_jump_attack) {
                return false;
            }
            self.can_jump_attack = false;
            self.set_chain(1, 0, rig);
            rig.set_velocity(Vec3::ZERO);
            rig.set_use_gravity(false);
        } else if self.tier == SpeedTier::Run {
            let push =
                (Vec3::Y + self.actor.front_vector() * RUN_ATTACK_FRONT_SCALE) * self.run_attack_force;
            rig.add_force(push, ForceMode::Impulse);
            self.set_chain(1, 0, rig);
        } else {
            if self.current_chain == 0 || self.combo_window <= 0.0 {
                self.current_chain = 1;
                self.evaluated_chain = 0;
            }
            let (current, evaluated) = (self.current_chain, self.evaluated_chain);
            self.set_chain(current, evaluated, rig);
        }

        rig.set_trigger(AnimTrigger::Attack);
        true
    }

    fn profile_for(&self, slot: AttackSlot) -> AttackData {
        match slot {
            AttackSlot::Combo(i) => match &self.weapon {
                Some(weapon) => weapon.attacks[i],
                None => self.attacks.combo[i],
            },
            AttackSlot::Jump => self.attacks.jump,
            AttackSlot::Run => self.attacks.run,
        }
    }

    /// Crates take the hit without any team or life rules.
    pub fn hit_container(&mut self, rig: &mut dyn ActorRig, container: &mut Container) -> bool {
        rig.play_sfx(SoundCue::Hit);
        container.hit()
    }

    // ====== Items ======

    /// The carried weapon is never offered back as a floor item.
    pub fn set_nearby_item(&mut self, item: Powerup) {
        if self.weapon.as_ref().is_some_and(|w| w.id == item.id) {
            return;
        }
        self.nearby_item = Some(item);
    }

    pub fn nearby_item_id(&self) -> Option<ItemId> {
        self.nearby_item.as_ref().map(|p| p.id)
    }

    /// Leaving an item's range only forgets it if it is the remembered one.
    pub fn clear_nearby_item(&mut self, id: ItemId) {
        if self.nearby_item.as_ref().is_some_and(|p| p.id == id) {
            self.nearby_item = None;
        }
    }

    fn did_pickup_weapon(&mut self, rig: &mut dyn ActorRig) {
        let Some(item) = self.nearby_item.take() else {
            return;
        };
        if !item.can_equip() {
            return;
        }
        debug!("hero equipped item {:?} ({} uses)", item.id, item.uses_remaining);
        self.item_events.push(ItemEvent::Equipped(item.id));
        self.weapon = Some(item);
        self.walk(rig);
        self.can_run = false;
        self.can_jump = false;
    }

    /// Puts the weapon back into the world and restores run and jump.
    pub fn drop_weapon(&mut self) {
        let Some(weapon) = self.weapon.take() else {
            return;
        };
        self.nearby_item = None;
        self.can_run = true;
        self.can_jump = true;
        self.item_events.push(ItemEvent::Dropped(weapon));
    }

    pub fn on_anim_event(&mut self, event: AnimEvent, rig: &mut dyn ActorRig) {
        match event {
            AnimEvent::PickupFinished => self.did_pickup_weapon(rig),
            AnimEvent::JumpAttackFinished => rig.set_use_gravity(true),
            AnimEvent::ChainEvaluated(chain) => {
                self.evaluated_chain = chain;
                rig.set_integer(AnimInt::EvaluatedChain, chain);
            }
        }
    }

    // ====== Autopilot ======

    pub fn use_autopilot(&mut self, enabled: bool) {
        self.autopiloting = enabled;
        if !enabled {
            self.walker.stop();
        }
    }

    pub fn animate_to(
        &mut self,
        nav: &dyn NavigationProvider,
        target: Vec3,
        should_run: bool,
        cue: StageCue,
        rig: &mut dyn ActorRig,
    ) -> bool {
        if should_run {
            self.run(rig);
        } else {
            self.walk(rig);
        }
        let from = rig.position();
        self.walker
            .move_to(nav, from, target, self.actor.speed, Some(cue))
    }
}

impl Combatant for Hero {
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
        if !self.actor.is_alive() {
            return HitOutcome::Ignored;
        }
        self.drop_weapon();
        let outcome = self
            .actor
            .take_damage(rig, &mut self.policy, amount, hit_dir, knockdown);
        match outcome {
            HitOutcome::KnockedDown => rig.set_use_gravity(true),
            HitOutcome::Died => info!("hero died"),
            _ => {}
        }
        outcome
    }

    fn hit_actor(
        &mut self,
        rig: &mut dyn ActorRig,
        target: &mut dyn Combatant,
        target_rig: &mut dyn ActorRig,
        hit_point: Vec3,
        hit_dir: Vec3,
    ) -> HitOutcome {
        let Some(step) = combo_step(rig.current_state()) else {
            return HitOutcome::Ignored;
        };

        let data = self.profile_for(step.slot);
        let outcome = target.evaluate_attack_data(target_rig, &data, hit_dir, hit_point);
        if let Some(next) = step.next_chain {
            self.current_chain = next;
        }
        self.combo_window = self.chain_combo_limit;
        rig.play_sfx(step.cue);

        if matches!(step.slot, AttackSlot::Combo(_)) {
            if let Some(weapon) = self.weapon.as_mut() {
                if weapon.consume() {
                    let id = weapon.id;
                    self.weapon = None;
                    self.can_run = true;
                    self.can_jump = true;
                    self.item_events.push(ItemEvent::Broken(id));
                    debug!("hero weapon {:?} broke", id);
                }
            }
        }
        outcome
    }
}
