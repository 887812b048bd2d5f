// physics.rs
//! Body plumbing between the combat core and avian.
//!
//! avian simulates the scroll axis (x) and height (y). Depth (z) lives in
//! [`Depth`] and is integrated here, then drawn as a vertical offset on the
//! sprite child. Core code talks to a body through [`EcsRig`], which buffers
//! every side effect in [`RigFx`] until the fixed step applies it.

use avian2d::{math::*, prelude::*};
use bevy::prelude::*;

use crate::animations::AnimGraph;
use crate::navigation::StageNavigator;
use crate::rig::{
    AnimBool, AnimFloat, AnimInt, AnimState, AnimTrigger, Animator, Facing, ForceMode,
    LifeBarView, PhysicsBody, Presentation, SoundCue,
};

// ====== Tuning ======
pub const GRAVITY: Scalar = 30.0;
pub const FLOOR_Y: f32 = 0.0;
/// Screen units of vertical offset per unit of depth.
pub const DEPTH_TO_SCREEN: f32 = 0.6;
const BODY_MASS: f32 = 0.08;
const FORCE_STEP: f32 = 0.02;
const MAX_PUSH_SPEED: f32 = 12.0;
const BODY_DAMPING: Scalar = 1.5;
const DEPTH_DAMPING: f32 = 4.0;

#[derive(PhysicsLayer, Clone, Copy, Debug, Default)]
pub enum GameLayer {
    #[default]
    Default,
    Floor,
    Hero,
    Enemy,
    Wall,
    Container,
}

/// Position and velocity on the depth axis.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub struct Depth {
    pub z: f32,
    pub velocity: f32,
}

#[derive(Component, Debug, Default)]
pub struct Floor;

/// Floor contact as last seen by the collision pass.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloorContact {
    pub grounded: bool,
}

impl Default for FloorContact {
    fn default() -> Self {
        Self { grounded: true }
    }
}

/// Capsule dimensions for the standing pose. The downed pose is a flat
/// capsule of the same radius.
#[derive(Component, Debug, Clone, Copy)]
pub struct BodyShape {
    pub radius: f32,
    pub height: f32,
    standing: bool,
}

impl BodyShape {
    pub fn new(radius: f32, height: f32) -> Self {
        Self {
            radius,
            height,
            standing: true,
        }
    }

    fn collider(&self, standing: bool) -> Collider {
        if standing {
            Collider::capsule(self.radius, self.height)
        } else {
            Collider::capsule(self.radius * 0.5, self.radius)
        }
    }
}

/// Life bar state a combatant pushed this frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BarUpdate {
    pub visible: bool,
    pub progress: f32,
    pub thumbnail_alpha: f32,
}

/// Side effects queued by the core, drained by the systems that own them.
#[derive(Component, Debug)]
pub struct RigFx {
    pub facing: Facing,
    pub opacity: f32,
    pub standing: bool,
    pub gravity: bool,
    pub velocity_change: Vec3,
    pub teleport: Option<Vec3>,
    pub set_velocity: Option<Vec3>,
    pub sounds: Vec<SoundCue>,
    pub hit_effects: Vec<(f32, Vec3)>,
    pub bar: Option<BarUpdate>,
}

impl Default for RigFx {
    fn default() -> Self {
        Self {
            facing: Facing::Right,
            opacity: 1.0,
            standing: true,
            gravity: true,
            velocity_change: Vec3::ZERO,
            teleport: None,
            set_velocity: None,
            sounds: Vec::new(),
            hit_effects: Vec::new(),
            bar: None,
        }
    }
}

pub fn body_position(position: &Position, depth: &Depth) -> Vec3 {
    Vec3::new(position.x, position.y, depth.z)
}

pub fn body_velocity(velocity: &LinearVelocity, depth: &Depth) -> Vec3 {
    Vec3::new(velocity.x, velocity.y, depth.velocity)
}

// ====== EcsRig ======

/// The game-side [`ActorRig`](crate::rig::ActorRig): one combatant's graph,
/// effect buffer and a snapshot of its body.
pub struct EcsRig<'a> {
    graph: &'a mut AnimGraph,
    fx: &'a mut RigFx,
    position: Vec3,
    velocity: Vec3,
}

impl<'a> EcsRig<'a> {
    pub fn new(graph: &'a mut AnimGraph, fx: &'a mut RigFx, position: Vec3, velocity: Vec3) -> Self {
        Self {
            graph,
            fx,
            position,
            velocity,
        }
    }
}

impl Animator for EcsRig<'_> {
    fn set_bool(&mut self, param: AnimBool, value: bool) {
        self.graph.set_bool(param, value);
    }
    fn set_integer(&mut self, param: AnimInt, value: i32) {
        self.graph.set_integer(param, value);
    }
    fn set_float(&mut self, param: AnimFloat, value: f32) {
        self.graph.set_float(param, value);
    }
    fn set_trigger(&mut self, trigger: AnimTrigger) {
        self.graph.set_trigger(trigger);
    }
    fn current_state(&self) -> AnimState {
        self.graph.current_state()
    }
}

impl PhysicsBody for EcsRig<'_> {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn add_force(&mut self, force: Vec3, mode: ForceMode) {
        let dv = match mode {
            ForceMode::Force => force * FORCE_STEP / BODY_MASS,
            ForceMode::Impulse => force,
        };
        self.fx.velocity_change += dv;
    }

    fn move_position(&mut self, point: Vec3) {
        self.position = point;
        self.fx.teleport = Some(point);
    }

    fn velocity(&self) -> Vec3 {
        self.velocity
    }

    fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
        self.fx.velocity_change = Vec3::ZERO;
        self.fx.set_velocity = Some(velocity);
    }

    fn set_use_gravity(&mut self, enabled: bool) {
        self.fx.gravity = enabled;
    }
}

impl Presentation for EcsRig<'_> {
    fn set_collider_stance(&mut self, standing: bool) {
        self.fx.standing = standing;
    }
    fn set_facing(&mut self, facing: Facing) {
        self.fx.facing = facing;
    }
    fn set_opacity(&mut self, alpha: f32) {
        self.fx.opacity = alpha;
    }
    fn spawn_hit_effects(&mut self, value: f32, point: Vec3) {
        self.fx.hit_effects.push((value, point));
    }
    fn play_sfx(&mut self, cue: SoundCue) {
        self.fx.sounds.push(cue);
    }
}

impl LifeBarView for EcsRig<'_> {
    fn show(&mut self, visible: bool) {
        self.fx.bar.get_or_insert_with(BarUpdate::default).visible = visible;
    }
    fn set_progress(&mut self, fraction: f32) {
        self.fx.bar.get_or_insert_with(BarUpdate::default).progress = fraction.clamp(0.0, 1.0);
    }
    fn set_thumbnail(&mut self, alpha: f32) {
        self.fx.bar.get_or_insert_with(BarUpdate::default).thumbnail_alpha = alpha;
    }
}

// ====== Bundle ======

#[derive(Bundle)]
pub struct ActorBodyBundle {
    body: RigidBody,
    lock: LockedAxes,
    restitution: Restitution,
    friction: Friction,
    damping: LinearDamping,
    gravity: GravityScale,
    collider: Collider,
    shape: BodyShape,
    collisions: CollidingEntities,
    layers: CollisionLayers,
    depth: Depth,
    contact: FloorContact,
    fx: RigFx,
    transform: Transform,
    vel: LinearVelocity,
}

impl ActorBodyBundle {
    pub fn new(at: Vec3, layer: GameLayer, shape: BodyShape) -> Self {
        Self {
            body: RigidBody::Dynamic,
            lock: LockedAxes::ROTATION_LOCKED,
            restitution: Restitution::ZERO.with_combine_rule(CoefficientCombine::Min),
            friction: Friction::ZERO.with_combine_rule(CoefficientCombine::Min),
            damping: LinearDamping(BODY_DAMPING),
            gravity: GravityScale(1.0),
            collider: shape.collider(true),
            shape,
            collisions: CollidingEntities::default(),
            layers: CollisionLayers::new(layer, [GameLayer::Floor, GameLayer::Wall]),
            depth: Depth { z: at.z, velocity: 0.0 },
            contact: FloorContact::default(),
            fx: RigFx::default(),
            transform: Transform::from_xyz(at.x, at.y + shape.height * 0.5 + shape.radius, 0.0),
            vel: LinearVelocity::default(),
        }
    }
}

// ====== Systems ======

#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub enum BodySet {
    /// Queued effects become body state.
    Apply,
    Integrate,
}

pub struct BodyPlugin;

impl Plugin for BodyPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(Gravity(Vector::NEG_Y * GRAVITY))
            .configure_sets(FixedUpdate, (BodySet::Apply, BodySet::Integrate).chain())
            .add_systems(
                FixedUpdate,
                (apply_rig_fx, sync_collider_stance).in_set(BodySet::Apply),
            )
            .add_systems(
                FixedUpdate,
                (integrate_depth, detect_floor_contact).in_set(BodySet::Integrate),
            );
    }
}

pub fn apply_rig_fx(
    mut q: Query<(
        &mut RigFx,
        &mut Position,
        &mut LinearVelocity,
        &mut Depth,
        &mut GravityScale,
    )>,
) {
    for (mut fx, mut pos, mut vel, mut depth, mut gravity) in &mut q {
        let fx = &mut *fx;
        if let Some(to) = fx.teleport.take() {
            pos.x = to.x;
            depth.z = to.z;
        }
        if let Some(v) = fx.set_velocity.take() {
            vel.x = v.x;
            vel.y = v.y;
            depth.velocity = v.z;
        }
        if fx.velocity_change != Vec3::ZERO {
            let push = fx.velocity_change.clamp_length_max(MAX_PUSH_SPEED);
            vel.x += push.x;
            vel.y += push.y;
            depth.velocity += push.z;
            fx.velocity_change = Vec3::ZERO;
        }
        let scale = if fx.gravity { 1.0 } else { 0.0 };
        if gravity.0 != scale {
            gravity.0 = scale;
        }
    }
}

fn sync_collider_stance(mut q: Query<(&RigFx, &mut BodyShape, &mut Collider)>) {
    for (fx, mut shape, mut collider) in &mut q {
        if fx.standing != shape.standing {
            shape.standing = fx.standing;
            *collider = shape.collider(fx.standing);
        }
    }
}

pub fn integrate_depth(
    time: Res<Time<Fixed>>,
    nav: Option<Res<StageNavigator>>,
    mut q: Query<&mut Depth>,
) {
    let dt = time.delta_secs();
    for mut depth in &mut q {
        if depth.velocity == 0.0 {
            continue;
        }
        depth.z += depth.velocity * dt;
        depth.velocity /= 1.0 + DEPTH_DAMPING * dt;
        if depth.velocity.abs() < 1e-3 {
            depth.velocity = 0.0;
        }
        if let Some(nav) = nav.as_deref() {
            let clamped = depth.z.clamp(nav.floor.min_z, nav.floor.max_z);
            if clamped != depth.z {
                depth.z = clamped;
                depth.velocity = 0.0;
            }
        }
    }
}

pub fn detect_floor_contact(
    floors: Query<(), With<Floor>>,
    mut q: Query<(&CollidingEntities, &mut FloorContact)>,
) {
    for (colliding, mut contact) in &mut q {
        let grounded = colliding.iter().any(|e| floors.contains(*e));
        if contact.grounded != grounded {
            contact.grounded = grounded;
        }
    }
}
