// enemy.rs
//! AI-driven combatant: executes [`AiOrder`]s through its walker and swings
//! at the hero, and keeps the wave tracker's live count honest.

use log::{debug, info};

use crate::actor::{Actor, Combatant};
use crate::ai::{AiOrder, EnemyAi, Perception};
use crate::animations::{AnimClips, AnimGraph, FighterSpritesheet, advance_anim_graphs};
use crate::character::spawn_fighter_sprite;
use crate::class::EnemyClass;
use crate::combat::{EnemyKind, HitOutcome, Team};
use crate::gameflow::{GameplayRoot, gameplay_running};
use crate::hero::Hero;
use crate::navigation::{NavigationProvider, StageNavigator};
use crate::physics::{
    ActorBodyBundle, BodySet, BodyShape, Depth, EcsRig, FloorContact, GameLayer, RigFx,
    body_position, body_velocity,
};
use crate::prelude::*;
use crate::raycasts::MeleeRaycastSpec;
use crate::rig::{ActorRig, AnimState};
use crate::walker::Walker;
use crate::wave::WaveTracker;

const ENEMY_RADIUS: f32 = 0.3;
const ENEMY_HEIGHT: f32 = 1.0;
const BOSS_SCALE: f32 = 1.3;

// ====== Enemy ======

#[derive(Component, Debug)]
pub struct Enemy {
    pub actor: Actor,
    kind: EnemyKind,
    pub ai: EnemyAi,
    walker: Walker,
    stop_movement_when_hit: bool,
    reach: (f32, f32),
    detect_radius: f32,
    display_name: String,
    registered: bool,
    retired: bool,
}

impl Enemy {
    pub fn new(kind: EnemyKind, class: &EnemyClass, ai: EnemyAi) -> Self {
        let mut actor = Actor::new(Team::Enemy, class.max_life, class.normal_attack);
        actor.speed = class.speed.max(0.0);
        let min = class.attack_reach_min.max(0.0);
        Self {
            actor,
            kind,
            ai,
            walker: Walker::new(),
            stop_movement_when_hit: class.stop_movement_when_hit,
            reach: (min, class.attack_reach_max.max(min)),
            detect_radius: class.detect_radius.max(0.0),
            display_name: class.display_name.clone(),
            registered: false,
            retired: false,
        }
    }

    pub fn kind(&self) -> EnemyKind {
        self.kind
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn walker(&self) -> &Walker {
        &self.walker
    }

    /// Counts this enemy into the active battle event. Only the first call counts.
    pub fn register(&mut self, tracker: &mut WaveTracker) {
        if !self.registered {
            self.registered = true;
            tracker.register_enemy();
        }
    }

    /// Takes a dead enemy out of the live count. Returns `true` on the call
    /// that does it.
    pub fn settle_death(&mut self, tracker: &mut WaveTracker) -> bool {
        if !self.registered || self.retired || self.actor.is_alive() {
            return false;
        }
        self.retired = true;
        tracker.enemy_died();
        true
    }

    pub fn can_walk(&self, state: AnimState) -> bool {
        self.actor.is_alive() && !matches!(state, AnimState::Hurt | AnimState::GetUp)
    }

    pub fn move_to(&mut self, nav: &dyn NavigationProvider, target: Vec3, rig: &dyn ActorRig) -> bool {
        let speed = self.actor.speed;
        self.walker.move_to(nav, rig.position(), target, speed, None)
    }

    /// Walks to `target + offset`, or to the mirrored side when that spot is
    /// unreachable. Both failing leaves the current path alone.
    pub fn move_to_offset(
        &mut self,
        nav: &dyn NavigationProvider,
        target: Vec3,
        offset: Vec3,
        rig: &dyn ActorRig,
    ) -> bool {
        self.move_to(nav, target + offset, rig) || self.move_to(nav, target - offset, rig)
    }

    pub fn wait(&mut self) {
        self.walker.stop();
    }

    pub fn perceive(&self, position: Vec3, hero_position: Vec3) -> Perception {
        let delta = hero_position - position;
        let planar = delta.x * delta.x + delta.z * delta.z;
        let nearby = planar <= self.detect_radius * self.detect_radius;
        Perception::new(position, hero_position, nearby, self.reach)
    }

    /// Frame tick: actor timers, then one AI step. Returns the order carried out.
    pub fn think(
        &mut self,
        dt: f32,
        perception: &Perception,
        nav: &dyn NavigationProvider,
        rig: &mut dyn ActorRig,
    ) -> Option<AiOrder> {
        self.actor.tick(dt, rig);
        if !self.actor.is_alive() {
            return None;
        }
        let order = self.ai.tick(dt, perception)?;
        self.execute(order, nav, rig);
        Some(order)
    }

    fn execute(&mut self, order: AiOrder, nav: &dyn NavigationProvider, rig: &mut dyn ActorRig) {
        match order {
            AiOrder::Chase { target, offset } => {
                self.move_to_offset(nav, target, offset, rig);
            }
            AiOrder::Attack { target } => {
                self.actor.face_target(target, rig);
                self.actor.attack(rig);
            }
            AiOrder::Roam { target } => {
                self.move_to(nav, target, rig);
            }
            AiOrder::Wait => self.wait(),
        }
    }

    pub fn fixed_update(&mut self, dt: f32, rig: &mut dyn ActorRig) {
        let can_walk = self.can_walk(rig.current_state());
        self.walker.fixed_tick(dt, &mut self.actor, can_walk, rig);
    }
}

impl Combatant for Enemy {
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
        if self.stop_movement_when_hit {
            self.walker.stop();
        }
        let outcome = self
            .actor
            .take_damage(rig, &mut self.kind, amount, hit_dir, knockdown);
        if outcome == HitOutcome::Died {
            self.ai.enabled = false;
            self.walker.stop();
            debug!("{} defeated", self.display_name);
        }
        outcome
    }
}

// ====== Plugin ======

type EnemyBody = (
    &'static mut Enemy,
    &'static mut AnimGraph,
    &'static mut RigFx,
    &'static Position,
    &'static LinearVelocity,
    &'static Depth,
);

pub struct EnemyPlugin;

impl Plugin for EnemyPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (enemy_ground_contact, enemy_think)
                .chain()
                .before(advance_anim_graphs)
                .run_if(gameplay_running),
        )
        .add_systems(
            Update,
            (discard_enemy_anim_events, settle_enemy_deaths, despawn_faded_enemies)
                .chain()
                .after(advance_anim_graphs)
                .run_if(gameplay_running),
        )
        .add_systems(
            FixedUpdate,
            enemy_fixed_update
                .before(BodySet::Apply)
                .run_if(gameplay_running),
        );
    }
}

#[allow(clippy::too_many_arguments)]
pub fn spawn_enemy(
    commands: &mut Commands,
    tracker: &mut WaveTracker,
    kind: EnemyKind,
    class: &EnemyClass,
    at: Vec3,
    tint: Option<[f32; 3]>,
    sheet: &FighterSpritesheet,
    clips: &AnimClips,
) -> Entity {
    let mut enemy = Enemy::new(kind, class, EnemyAi::new(class.personal_space));
    enemy.register(tracker);

    let mut graph = AnimGraph::default();
    let mut fx = RigFx::default();
    enemy
        .actor
        .enter_play(&mut EcsRig::new(&mut graph, &mut fx, at, Vec3::ZERO));

    let scale = if kind == EnemyKind::Boss { BOSS_SCALE } else { 1.0 };
    let shape = BodyShape::new(ENEMY_RADIUS * scale, ENEMY_HEIGHT * scale);
    let tint = tint.map_or(Color::WHITE, |[r, g, b]| Color::srgb(r, g, b));
    let hero_mask = SpatialQueryFilter::from_mask(GameLayer::Hero);
    let name = enemy.display_name.clone();

    commands
        .spawn((
            enemy,
            graph,
            ActorBodyBundle::new(at, GameLayer::Enemy, shape),
            MeleeRaycastSpec {
                offset: Vec2::new(shape.radius, 0.2),
                length: class.attack_reach_max.max(0.1),
                max_hits: 1,
                filter: hero_mask,
                solid: false,
                once_per_swing: true,
            },
            GameplayRoot,
            Name::new(name),
        ))
        .insert(fx)
        .with_children(|c| spawn_fighter_sprite(c, sheet, clips, tint))
        .id()
}

fn enemy_ground_contact(mut q: Query<(EnemyBody, &FloorContact)>) {
    for ((mut enemy, mut graph, mut fx, pos, vel, depth), contact) in &mut q {
        if contact.grounded == enemy.actor.is_grounded() {
            continue;
        }
        let mut rig = EcsRig::new(&mut graph, &mut fx, body_position(pos, depth), body_velocity(vel, depth));
        enemy.actor.on_ground_contact(contact.grounded, &mut rig);
    }
}

fn enemy_think(
    time: Res<Time>,
    nav: Res<StageNavigator>,
    heroes: Query<(&Position, &Depth), With<Hero>>,
    mut q: Query<EnemyBody, Without<Hero>>,
) {
    let Ok((hero_pos, hero_depth)) = heroes.single() else {
        return;
    };
    let hero_at = body_position(hero_pos, hero_depth);
    let dt = time.delta_secs();

    for (mut enemy, mut graph, mut fx, pos, vel, depth) in &mut q {
        let here = body_position(pos, depth);
        let perception = enemy.perceive(here, hero_at);
        let mut rig = EcsRig::new(&mut graph, &mut fx, here, body_velocity(vel, depth));
        enemy.think(dt, &perception, nav.as_ref(), &mut rig);
    }
}

fn enemy_fixed_update(time: Res<Time>, mut q: Query<EnemyBody>) {
    let dt = time.delta_secs();
    for (mut enemy, mut graph, mut fx, pos, vel, depth) in &mut q {
        let mut rig = EcsRig::new(&mut graph, &mut fx, body_position(pos, depth), body_velocity(vel, depth));
        enemy.fixed_update(dt, &mut rig);
    }
}

/// Enemies have no marked-frame handlers.
fn discard_enemy_anim_events(mut q: Query<&mut AnimGraph, With<Enemy>>) {
    for mut graph in &mut q {
        graph.drain_events();
    }
}

fn settle_enemy_deaths(mut tracker: ResMut<WaveTracker>, mut q: Query<&mut Enemy>) {
    for mut enemy in &mut q {
        if enemy.settle_death(&mut tracker) {
            info!("{} down, {} left", enemy.display_name(), tracker.live_enemies());
        }
    }
}

fn despawn_faded_enemies(mut commands: Commands, q: Query<(Entity, &Enemy)>) {
    for (entity, enemy) in &q {
        if enemy.actor.ready_for_removal() {
            commands.entity(entity).despawn();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::FloorRect;
    use crate::rig::testing::FakeRig;
    use crate::rig::{AnimTrigger, Facing};

    const DT: f32 = 0.02;

    fn nav() -> StageNavigator {
        StageNavigator {
            floor: FloorRect::new(-50.0, 50.0, -2.0, 2.0),
            blockers: Vec::new(),
        }
    }

    fn robot() -> Enemy {
        Enemy::new(EnemyKind::Robot, &EnemyClass::default(), EnemyAi::seeded(1.2, 7))
    }

    fn boss() -> Enemy {
        Enemy::new(EnemyKind::Boss, &EnemyClass::boss(), EnemyAi::seeded(1.5, 7))
    }

    #[test]
    fn registers_and_retires_exactly_once() {
        let mut tracker = WaveTracker::default();
        let mut e = robot();
        let mut rig = FakeRig::new();
        e.register(&mut tracker);
        e.register(&mut tracker);
        assert_eq!(tracker.live_enemies(), 1);

        assert!(!e.settle_death(&mut tracker));
        e.take_damage(&mut rig, 500.0, Vec3::X, false);
        assert!(e.settle_death(&mut tracker));
        assert!(!e.settle_death(&mut tracker));
        assert_eq!(tracker.live_enemies(), 0);
    }

    #[test]
    fn chase_falls_back_to_mirrored_offset() {
        let mut e = robot();
        let rig = FakeRig::at(Vec3::new(40.0, 0.0, 0.0));
        let offset = Vec3::new(2.0, 0.0, 0.0);
        assert!(e.move_to_offset(&nav(), Vec3::new(49.0, 0.0, 0.0), offset, &rig));
        assert_eq!(e.walker().destination(), Some(Vec3::new(47.0, 0.0, 0.0)));
    }

    #[test]
    fn unreachable_chase_keeps_current_path() {
        let mut e = robot();
        let rig = FakeRig::new();
        assert!(e.move_to(&nav(), Vec3::new(5.0, 0.0, 1.0), &rig));
        let offset = Vec3::new(0.0, 0.0, 10.0);
        assert!(!e.move_to_offset(&nav(), Vec3::new(10.0, 0.0, 0.0), offset, &rig));
        assert_eq!(e.walker().destination(), Some(Vec3::new(5.0, 0.0, 1.0)));
    }

    #[test]
    fn hurt_and_get_up_pause_the_walk() {
        let mut e = robot();
        let mut rig = FakeRig::new();
        e.move_to(&nav(), Vec3::new(5.0, 0.0, 0.0), &rig);

        for state in [AnimState::Hurt, AnimState::GetUp] {
            rig.state = state;
            e.fixed_update(DT, &mut rig);
            assert_eq!(rig.position, Vec3::ZERO);
            assert!(e.walker().is_walking());
        }

        rig.state = AnimState::Walk;
        for _ in 0..5 {
            e.fixed_update(DT, &mut rig);
        }
        assert!(rig.position.x > 0.0);
    }

    #[test]
    fn robot_stops_when_hit_but_boss_keeps_walking() {
        let mut r = robot();
        let mut rig = FakeRig::new();
        r.move_to(&nav(), Vec3::new(5.0, 0.0, 0.0), &rig);
        assert_eq!(r.take_damage(&mut rig, 5.0, Vec3::X, false), HitOutcome::Flinched);
        assert!(!r.walker().is_walking());

        let mut b = boss();
        let mut rig = FakeRig::new();
        b.move_to(&nav(), Vec3::new(5.0, 0.0, 0.0), &rig);
        assert_eq!(b.take_damage(&mut rig, 30.0, Vec3::X, true), HitOutcome::Absorbed);
        assert!(b.walker().is_walking());
        assert!(!b.actor.is_knocked_out());
        assert_eq!(rig.count(AnimTrigger::Knockdown), 0);
        assert_eq!(rig.count(AnimTrigger::IsHurt), 0);
    }

    #[test]
    fn death_disables_ai_and_walker() {
        let mut e = robot();
        let mut rig = FakeRig::new();
        e.move_to(&nav(), Vec3::new(5.0, 0.0, 0.0), &rig);
        assert_eq!(e.take_damage(&mut rig, 999.0, Vec3::X, false), HitOutcome::Died);
        assert!(!e.ai.enabled);
        assert!(!e.walker().is_walking());

        let p = e.perceive(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(e.think(DT, &p, &nav(), &mut rig), None);
    }

    #[test]
    fn swings_at_a_hero_in_reach() {
        let mut e = robot();
        let mut rig = FakeRig::new();
        let hero_at = Vec3::new(-1.0, 0.0, 0.1);
        let p = e.perceive(Vec3::ZERO, hero_at);
        assert!(p.can_reach && p.hero_nearby);

        for _ in 0..50 {
            e.think(2.0, &p, &nav(), &mut rig);
        }
        assert!(rig.count(AnimTrigger::Attack) >= 1);
        assert_eq!(e.actor.facing(), Facing::Left);
    }

    #[test]
    fn far_hero_is_not_noticed() {
        let e = robot();
        let p = e.perceive(Vec3::ZERO, Vec3::new(40.0, 0.0, 0.0));
        assert!(!p.hero_nearby);
    }
}
