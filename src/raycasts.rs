// raycasts.rs
//! Melee contact: a ray child cast forward while a swing plays, one hit per
//! target per swing, then routed through the attacker's [`Combatant`].

use std::collections::HashSet;

use avian2d::prelude::*;
use avian2d::spatial_query::{RayCaster, RayHits, SpatialQueryFilter};
use bevy::prelude::*;
use log::debug;

use crate::actor::Combatant;
use crate::animations::AnimGraph;
use crate::combat::{HitOutcome, Team};
use crate::enemy::Enemy;
use crate::gameflow::PlayerDied;
use crate::hero::Hero;
use crate::physics::{Depth, EcsRig, RigFx, body_position, body_velocity};
use crate::rig::{AnimState, Facing};

/// Hits only connect between bodies this close in depth.
pub const HIT_DEPTH_TOLERANCE: f32 = 0.5;

#[derive(Component, Clone)]
pub struct MeleeRaycastSpec {
    pub offset: Vec2,
    pub length: f32,
    pub max_hits: u32,
    pub filter: SpatialQueryFilter,
    pub solid: bool,
    pub once_per_swing: bool,
}

#[derive(Component, Default)]
pub struct MeleeAttackActive;

#[derive(Event, Debug, Clone)]
pub struct MeleeRaycastHit {
    pub attacker: Entity,
    pub target: Entity,
    pub point: Vec2,
    pub distance: f32,
}

#[derive(Component)]
struct AttackRay;

/// Targets already struck by the swing currently playing.
#[derive(Component, Default)]
struct AlreadyHit {
    swing: Option<AnimState>,
    targets: HashSet<Entity>,
}

#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub enum RaycastMeleeSet {
    Cast,
    ApplyDamage,
}

pub struct RaycastMeleePlugin;

impl Plugin for RaycastMeleePlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<MeleeRaycastHit>()
            .configure_sets(
                Update,
                (RaycastMeleeSet::Cast, RaycastMeleeSet::ApplyDamage).chain(),
            )
            .add_systems(
                Update,
                (
                    toggle_attack_from_graph,
                    spawn_ray_on_attack_start,
                    keep_ray_facing_correctly,
                    emit_hits_from_rays,
                )
                    .chain()
                    .in_set(RaycastMeleeSet::Cast),
            )
            .add_systems(Update, resolve_melee_hits.in_set(RaycastMeleeSet::ApplyDamage))
            .add_systems(Update, despawn_ray_on_attack_end);
    }
}

fn ray_pose(spec: &MeleeRaycastSpec, facing: Facing) -> (Vec2, Dir2) {
    if facing.is_left() {
        (Vec2::new(-spec.offset.x, spec.offset.y), Dir2::NEG_X)
    } else {
        (spec.offset, Dir2::X)
    }
}

/// A body swings while its graph plays an attack state.
fn toggle_attack_from_graph(
    mut commands: Commands,
    mut q: Query<(Entity, &AnimGraph, Has<MeleeAttackActive>, Option<&mut AlreadyHit>), With<MeleeRaycastSpec>>,
) {
    for (entity, graph, active, already_hit) in &mut q {
        let swinging = graph.state().is_attack();
        if swinging && !active {
            commands.entity(entity).insert(MeleeAttackActive);
        } else if !swinging && active {
            commands.entity(entity).remove::<MeleeAttackActive>();
        }

        if let Some(mut set) = already_hit {
            if swinging && set.swing != Some(graph.state()) {
                set.swing = Some(graph.state());
                set.targets.clear();
            }
        }
    }
}

fn spawn_ray_on_attack_start(
    mut commands: Commands,
    added: Query<(Entity, &MeleeRaycastSpec, &RigFx, &AnimGraph), Added<MeleeAttackActive>>,
) {
    for (attacker, spec, fx, graph) in &added {
        commands.entity(attacker).insert(AlreadyHit {
            swing: Some(graph.state()),
            targets: HashSet::new(),
        });

        let (origin, direction) = ray_pose(spec, fx.facing);
        commands.entity(attacker).with_children(|c| {
            c.spawn((
                AttackRay,
                Transform::default(),
                RayCaster::new(origin, direction)
                    .with_max_distance(spec.length)
                    .with_max_hits(spec.max_hits)
                    .with_ignore_self(true)
                    .with_solidness(spec.solid)
                    .with_query_filter(spec.filter.clone()),
            ));
        });
    }
}

fn keep_ray_facing_correctly(
    attackers: Query<(&MeleeRaycastSpec, &RigFx, &Children), With<MeleeAttackActive>>,
    mut rays: Query<&mut RayCaster, With<AttackRay>>,
) {
    for (spec, fx, children) in &attackers {
        let (origin, direction) = ray_pose(spec, fx.facing);
        for &child in children {
            if let Ok(mut rc) = rays.get_mut(child) {
                rc.origin = origin;
                rc.direction = direction;
            }
        }
    }
}

fn emit_hits_from_rays(
    mut writer: EventWriter<MeleeRaycastHit>,
    rays: Query<(&ChildOf, &RayCaster, &RayHits), With<AttackRay>>,
    specs: Query<(&MeleeRaycastSpec, &GlobalTransform), With<MeleeAttackActive>>,
    depths: Query<&Depth>,
    mut hit_sets: Query<&mut AlreadyHit>,
) {
    for (child_of, caster, ray_hits) in &rays {
        let attacker = child_of.parent();
        let Ok((spec, gt)) = specs.get(attacker) else {
            continue;
        };
        let attacker_z = depths.get(attacker).map(|d| d.z).unwrap_or(0.0);

        for hit in ray_hits.iter_sorted() {
            let target = hit.entity;
            let same_plane = depths
                .get(target)
                .map_or(true, |d| (d.z - attacker_z).abs() < HIT_DEPTH_TOLERANCE);
            if !same_plane {
                continue;
            }

            if spec.once_per_swing {
                if let Ok(mut set) = hit_sets.get_mut(attacker) {
                    if !set.targets.insert(target) {
                        continue;
                    }
                }
            }

            let origin = gt.translation().truncate() + caster.origin;
            writer.write(MeleeRaycastHit {
                attacker,
                target,
                point: origin + caster.direction.as_vec2() * hit.distance,
                distance: hit.distance,
            });
        }
    }
}

type FighterItem = (
    Option<&'static mut Hero>,
    Option<&'static mut Enemy>,
    &'static mut AnimGraph,
    &'static mut RigFx,
    &'static Position,
    &'static LinearVelocity,
    &'static Depth,
);

/// Hands each hit to the attacker's combatant, hero and enemy alike.
fn resolve_melee_hits(
    mut events: EventReader<MeleeRaycastHit>,
    mut fighters: Query<FighterItem>,
    mut died: EventWriter<PlayerDied>,
) {
    for hit in events.read() {
        let Ok([a, t]) = fighters.get_many_mut([hit.attacker, hit.target]) else {
            continue;
        };
        let (a_hero, a_enemy, mut a_graph, mut a_fx, a_pos, a_vel, a_depth) = a;
        let (t_hero, t_enemy, mut t_graph, mut t_fx, t_pos, t_vel, t_depth) = t;

        let hit_dir = a_fx.facing.front();
        let hit_point = Vec3::new(hit.point.x, hit.point.y, t_depth.z);

        let attacker: &mut dyn Combatant = match (a_hero, a_enemy) {
            (Some(hero), _) => hero.into_inner(),
            (None, Some(enemy)) => enemy.into_inner(),
            (None, None) => continue,
        };
        let target: &mut dyn Combatant = match (t_hero, t_enemy) {
            (Some(hero), _) => hero.into_inner(),
            (None, Some(enemy)) => enemy.into_inner(),
            (None, None) => continue,
        };

        let mut a_rig = EcsRig::new(
            &mut a_graph,
            &mut a_fx,
            body_position(a_pos, a_depth),
            body_velocity(a_vel, a_depth),
        );
        let mut t_rig = EcsRig::new(
            &mut t_graph,
            &mut t_fx,
            body_position(t_pos, t_depth),
            body_velocity(t_vel, t_depth),
        );

        let outcome = attacker.did_hit_object(&mut a_rig, target, &mut t_rig, hit_point, hit_dir);
        if outcome.landed() {
            debug!("melee {:?} -> {:?}: {:?}", hit.attacker, hit.target, outcome);
        }
        if outcome == HitOutcome::Died && target.actor().team() == Team::Hero {
            died.write(PlayerDied);
        }
    }
}

fn despawn_ray_on_attack_end(
    mut commands: Commands,
    mut removed: RemovedComponents<MeleeAttackActive>,
    children: Query<&Children>,
    rays: Query<Entity, With<AttackRay>>,
) {
    for attacker in removed.read() {
        if let Ok(kids) = children.get(attacker) {
            for &child in kids {
                if rays.get(child).is_ok() {
                    commands.entity(child).despawn();
                }
            }
        }
    }
}
