// character.rs
//! Hero entity: spawn, input, fixed-step movement and the events the core
//! raises back into the world.

use bevy::sprite::Anchor;
use log::debug;

use crate::animations::{AnimClips, AnimGraph, FighterSprite, FighterSpritesheet, advance_anim_graphs};
use crate::class::HeroClass;
use crate::controls::{Action, default_input_map};
use crate::gameflow::{GameplayRoot, gameplay_running};
use crate::hero::Hero;
use crate::navigation::StageNavigator;
use crate::physics::{
    ActorBodyBundle, BodySet, BodyShape, Depth, EcsRig, FloorContact, GameLayer, RigFx,
    body_position, body_velocity,
};
use crate::pickups::ItemEvent;
use crate::prelude::*;
use crate::raycasts::MeleeRaycastSpec;
use crate::rig::AnimState;
use crate::sensors::{JumpSensors, SensorSide};
use crate::wave::StageCue;

const HERO_RADIUS: f32 = 0.3;
const HERO_HEIGHT: f32 = 1.0;
const HERO_REACH: f32 = 1.1;
const SENSOR_PROBE: f32 = 0.5;
pub const SPRITE_SIZE: Vec2 = Vec2::new(2.4, 2.1);

/// A scripted hero walk reached its destination.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageCueReached(pub StageCue);

/// Item traffic from the hero, with where it happened.
#[derive(Event, Debug, Clone, PartialEq)]
pub struct HeroItemEvent {
    pub event: ItemEvent,
    pub at: Vec3,
}

type HeroBody = (
    &'static mut Hero,
    &'static mut AnimGraph,
    &'static mut RigFx,
    &'static Position,
    &'static LinearVelocity,
    &'static Depth,
);

pub struct PlayerPlugin;

impl Plugin for PlayerPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<StageCueReached>()
            .add_event::<HeroItemEvent>()
            .add_systems(
                Update,
                (sync_jump_sensors, hero_ground_contact, hero_update)
                    .chain()
                    .before(advance_anim_graphs)
                    .run_if(gameplay_running),
            )
            .add_systems(
                Update,
                (dispatch_hero_anim_events, forward_item_events)
                    .chain()
                    .after(advance_anim_graphs)
                    .run_if(gameplay_running),
            )
            .add_systems(
                FixedUpdate,
                hero_fixed_update
                    .before(BodySet::Apply)
                    .run_if(gameplay_running),
            );
    }
}

/// Sprite child shared by every fighter on the sheet.
pub fn spawn_fighter_sprite(
    parent: &mut ChildSpawnerCommands,
    sheet: &FighterSpritesheet,
    clips: &AnimClips,
    tint: Color,
) {
    let mut sprite = Sprite::from_atlas_image(
        sheet.image.clone(),
        TextureAtlas {
            layout: sheet.layout.clone(),
            ..Default::default()
        },
    );
    sprite.custom_size = Some(SPRITE_SIZE);
    sprite.anchor = Anchor::Custom(Vec2::new(0.0, -0.2));
    sprite.color = tint;

    let mut child = parent.spawn((FighterSprite, sprite, Transform::default()));
    if let Some(idle) = clips.get(AnimState::Idle) {
        child.insert(SpritesheetAnimation::from_id(idle));
    }
}

pub fn spawn_hero(
    commands: &mut Commands,
    class: &HeroClass,
    at: Vec3,
    sheet: &FighterSpritesheet,
    clips: &AnimClips,
) -> Entity {
    let hero = Hero::new(class);
    let mut graph = AnimGraph::default();
    let mut fx = RigFx::default();
    hero.actor
        .enter_play(&mut EcsRig::new(&mut graph, &mut fx, at, Vec3::ZERO));

    let mask = SpatialQueryFilter::from_mask([GameLayer::Enemy, GameLayer::Container]);

    commands
        .spawn((
            hero,
            graph,
            ActorBodyBundle::new(at, GameLayer::Hero, BodyShape::new(HERO_RADIUS, HERO_HEIGHT)),
            MeleeRaycastSpec {
                offset: Vec2::new(HERO_RADIUS, 0.2),
                length: HERO_REACH,
                max_hits: 4,
                filter: mask,
                solid: false,
                once_per_swing: true,
            },
            JumpSensors::default(),
            default_input_map(),
            GameplayRoot,
            Name::new(class.display_name.clone()),
        ))
        .insert(fx)
        .with_children(|c| spawn_fighter_sprite(c, sheet, clips, Color::WHITE))
        .id()
}

/// Sensor volumes are probed against the walkable floor: a probe off the
/// floor or inside a blocker counts as occupied.
fn sync_jump_sensors(
    nav: Option<Res<StageNavigator>>,
    mut q: Query<(&mut JumpSensors, &RigFx, &Position, &Depth), With<Hero>>,
) {
    let Some(nav) = nav else {
        return;
    };
    for (mut sensors, fx, pos, depth) in &mut q {
        let here = body_position(pos, depth);
        let probes = [
            (SensorSide::Front, here + fx.facing.front() * SENSOR_PROBE),
            (SensorSide::Far, here + Vec3::Z * SENSOR_PROBE),
            (SensorSide::Near, here - Vec3::Z * SENSOR_PROBE),
        ];
        for (side, probe) in probes {
            let blocked = !nav.floor.contains(probe) || nav.blockers.iter().any(|b| b.contains(probe));
            if blocked != sensors.is_triggered(side) {
                if blocked {
                    sensors.enter(side);
                } else {
                    sensors.exit(side);
                }
            }
        }
    }
}

fn hero_ground_contact(mut q: Query<(HeroBody, &FloorContact)>) {
    for ((mut hero, mut graph, mut fx, pos, vel, depth), contact) in &mut q {
        if contact.grounded == hero.actor.is_grounded() {
            continue;
        }
        let mut rig = EcsRig::new(&mut graph, &mut fx, body_position(pos, depth), body_velocity(vel, depth));
        hero.on_ground_contact(contact.grounded, &mut rig);
    }
}

fn hero_update(
    time: Res<Time>,
    mut q: Query<(HeroBody, &ActionState<Action>, &JumpSensors)>,
) {
    let dt = time.delta_secs();
    for ((mut hero, mut graph, mut fx, pos, vel, depth), actions, sensors) in &mut q {
        let mut rig = EcsRig::new(&mut graph, &mut fx, body_position(pos, depth), body_velocity(vel, depth));
        hero.update(dt, actions, sensors, &mut rig);
    }
}

fn hero_fixed_update(
    time: Res<Time>,
    mut cues: EventWriter<StageCueReached>,
    mut q: Query<HeroBody>,
) {
    let dt = time.delta_secs();
    for (mut hero, mut graph, mut fx, pos, vel, depth) in &mut q {
        let mut rig = EcsRig::new(&mut graph, &mut fx, body_position(pos, depth), body_velocity(vel, depth));
        if let Some(cue) = hero.fixed_update(dt, &mut rig) {
            debug!("hero reached stage cue {cue:?}");
            cues.write(StageCueReached(cue));
        }
    }
}

fn dispatch_hero_anim_events(mut q: Query<HeroBody>) {
    for (mut hero, mut graph, mut fx, pos, vel, depth) in &mut q {
        let events = graph.drain_events();
        if events.is_empty() {
            continue;
        }
        let mut rig = EcsRig::new(&mut graph, &mut fx, body_position(pos, depth), body_velocity(vel, depth));
        for event in events {
            hero.on_anim_event(event, &mut rig);
        }
    }
}

pub fn forward_item_events(
    mut writer: EventWriter<HeroItemEvent>,
    mut q: Query<(&mut Hero, &Position, &Depth)>,
) {
    for (mut hero, pos, depth) in &mut q {
        let at = body_position(pos, depth);
        for event in hero.drain_item_events() {
            writer.write(HeroItemEvent { event, at });
        }
    }
}
