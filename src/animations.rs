// animations.rs
//! Logical animation graph plus spritesheet playback.
//!
//! [`AnimGraph`] is the state machine the combat core reads back through
//! [`Animator`]. It owns clip timing and marked-frame events; the spritesheet
//! only mirrors whatever state the graph is in.

use std::collections::HashMap;

use bevy::prelude::*;
use bevy_spritesheet_animation::prelude::*;

use crate::physics::{DEPTH_TO_SCREEN, Depth, RigFx};
use crate::rig::{AnimBool, AnimEvent, AnimFloat, AnimInt, AnimState, AnimTrigger, Animator};

// ====== Clip timing ======
const ATTACK_SECONDS: f32 = 0.3;
const JUMP_ATTACK_SECONDS: f32 = 0.35;
const RUN_ATTACK_SECONDS: f32 = 0.4;
const HURT_SECONDS: f32 = 0.3;
const GET_UP_SECONDS: f32 = 0.4;
const PICKUP_SECONDS: f32 = 0.4;
const LAND_SECONDS: f32 = 0.15;
const RISE_SECONDS: f32 = 0.3;
/// Floor contact is ignored this long after take-off.
const MIN_AIR_SECONDS: f32 = 0.1;
const MOVING_SPEED: f32 = 0.01;

/// Play-once length of a state, `None` for looping or held states.
pub fn clip_seconds(state: AnimState) -> Option<f32> {
    match state {
        AnimState::Attack1 | AnimState::Attack2 | AnimState::Attack3 => Some(ATTACK_SECONDS),
        AnimState::JumpAttack => Some(JUMP_ATTACK_SECONDS),
        AnimState::RunAttack => Some(RUN_ATTACK_SECONDS),
        AnimState::Hurt => Some(HURT_SECONDS),
        AnimState::GetUp => Some(GET_UP_SECONDS),
        AnimState::Pickup => Some(PICKUP_SECONDS),
        AnimState::JumpLand => Some(LAND_SECONDS),
        AnimState::JumpRise => Some(RISE_SECONDS),
        _ => None,
    }
}

fn combo_state(chain: i32) -> AnimState {
    match chain {
        2 => AnimState::Attack2,
        3 => AnimState::Attack3,
        _ => AnimState::Attack1,
    }
}

// ====== Graph ======

#[derive(Component, Debug, Clone)]
pub struct AnimGraph {
    state: AnimState,
    elapsed: f32,
    alive: bool,
    grounded: bool,
    running: bool,
    current_chain: i32,
    evaluated_chain: i32,
    speed: f32,
    pending: Vec<AnimTrigger>,
    queued_attack: bool,
    events: Vec<AnimEvent>,
}

impl Default for AnimGraph {
    fn default() -> Self {
        Self {
            state: AnimState::Idle,
            elapsed: 0.0,
            alive: true,
            grounded: true,
            running: false,
            current_chain: 0,
            evaluated_chain: 0,
            speed: 0.0,
            pending: Vec::new(),
            queued_attack: false,
            events: Vec::new(),
        }
    }
}

impl AnimGraph {
    pub fn state(&self) -> AnimState {
        self.state
    }

    pub fn evaluated_chain(&self) -> i32 {
        self.evaluated_chain
    }

    /// Marked-frame events since the last call.
    pub fn drain_events(&mut self) -> Vec<AnimEvent> {
        std::mem::take(&mut self.events)
    }

    fn enter(&mut self, state: AnimState) {
        self.state = state;
        self.elapsed = 0.0;
        match state {
            AnimState::Attack1 => self.events.push(AnimEvent::ChainEvaluated(1)),
            AnimState::Attack2 => self.events.push(AnimEvent::ChainEvaluated(2)),
            AnimState::Attack3 => self.events.push(AnimEvent::ChainEvaluated(3)),
            _ => {}
        }
    }

    fn locomotion(&self) -> AnimState {
        if self.speed > MOVING_SPEED {
            if self.running {
                AnimState::Run
            } else {
                AnimState::Walk
            }
        } else {
            AnimState::Idle
        }
    }

    fn finished(&self) -> bool {
        clip_seconds(self.state).is_some_and(|len| self.elapsed >= len)
    }

    fn fire(&mut self, trigger: AnimTrigger) {
        let downed = matches!(self.state, AnimState::KnockedDown | AnimState::GetUp);
        match trigger {
            AnimTrigger::Knockdown => {
                self.queued_attack = false;
                self.enter(AnimState::KnockedDown);
            }
            AnimTrigger::GetUp => {
                if self.state == AnimState::KnockedDown {
                    self.enter(AnimState::GetUp);
                }
            }
            _ if downed => {}
            AnimTrigger::IsHurt => {
                self.queued_attack = false;
                self.enter(AnimState::Hurt);
            }
            AnimTrigger::Attack => {
                if self.state.is_attack() {
                    self.queued_attack = !self.state.is_airborne() && self.state != AnimState::RunAttack;
                } else if self.state.is_jumping() {
                    self.enter(AnimState::JumpAttack);
                } else if self.running && self.state == AnimState::Run {
                    self.enter(AnimState::RunAttack);
                } else if self.state != AnimState::Pickup {
                    self.enter(combo_state(self.current_chain));
                }
            }
            AnimTrigger::Jump => {
                if !self.state.is_airborne() && !self.state.is_attack() {
                    self.enter(AnimState::JumpRise);
                }
            }
            AnimTrigger::PickupPowerup => {
                if matches!(self.state, AnimState::Idle | AnimState::Walk | AnimState::Run) {
                    self.enter(AnimState::Pickup);
                }
            }
        }
    }

    /// Runs pending triggers, then clip ends and condition transitions.
    pub fn advance(&mut self, dt: f32) {
        self.elapsed += dt;
        let pending = std::mem::take(&mut self.pending);
        if !self.alive {
            if self.state != AnimState::Dead {
                self.enter(AnimState::Dead);
            }
            return;
        }
        for trigger in pending {
            self.fire(trigger);
        }

        match self.state {
            AnimState::Idle | AnimState::Walk | AnimState::Run => {
                let next = self.locomotion();
                if next != self.state {
                    self.enter(next);
                }
            }
            AnimState::Attack1 | AnimState::Attack2 | AnimState::Attack3 | AnimState::RunAttack => {
                if self.finished() {
                    if std::mem::take(&mut self.queued_attack) {
                        self.enter(combo_state(self.current_chain));
                    } else {
                        self.enter(self.locomotion());
                    }
                }
            }
            AnimState::JumpAttack => {
                if self.finished() {
                    self.events.push(AnimEvent::JumpAttackFinished);
                    self.enter(AnimState::JumpFall);
                }
            }
            AnimState::JumpRise => {
                if self.grounded && self.elapsed >= MIN_AIR_SECONDS {
                    self.enter(AnimState::JumpLand);
                } else if self.finished() {
                    self.enter(AnimState::JumpFall);
                }
            }
            AnimState::JumpFall => {
                if self.grounded {
                    self.enter(AnimState::JumpLand);
                }
            }
            AnimState::Pickup => {
                if self.finished() {
                    self.events.push(AnimEvent::PickupFinished);
                    self.enter(self.locomotion());
                }
            }
            AnimState::JumpLand | AnimState::Hurt | AnimState::GetUp => {
                if self.finished() {
                    self.enter(self.locomotion());
                }
            }
            AnimState::KnockedDown | AnimState::Dead => {}
        }
    }
}

impl Animator for AnimGraph {
    fn set_bool(&mut self, param: AnimBool, value: bool) {
        match param {
            AnimBool::IsAlive => self.alive = value,
            AnimBool::IsGrounded => self.grounded = value,
            AnimBool::IsRunning => self.running = value,
        }
    }

    fn set_integer(&mut self, param: AnimInt, value: i32) {
        match param {
            AnimInt::CurrentChain => self.current_chain = value,
            AnimInt::EvaluatedChain => self.evaluated_chain = value,
        }
    }

    fn set_float(&mut self, param: AnimFloat, value: f32) {
        match param {
            AnimFloat::Speed => self.speed = value,
        }
    }

    fn set_trigger(&mut self, trigger: AnimTrigger) {
        self.pending.push(trigger);
    }

    fn current_state(&self) -> AnimState {
        self.state
    }
}

// ====== Spritesheet ======

#[derive(Resource, Default)]
pub struct FighterSpritesheet {
    pub image: Handle<Image>,
    pub layout: Handle<TextureAtlasLayout>,
}

/// Registered animation per logical state.
#[derive(Resource, Default)]
pub struct AnimClips(HashMap<AnimState, AnimationId>);

impl AnimClips {
    pub fn get(&self, state: AnimState) -> Option<AnimationId> {
        self.0.get(&state).copied()
    }
}

const COLUMNS: usize = 14;
const ROWS: usize = 24;
const FRAME_W: u32 = 96;
const FRAME_H: u32 = 84;
const LOOP_FRAME_MS: u32 = 100;

/// Sheet row and frame count for each state.
const STATE_ROWS: [(AnimState, usize, usize); 16] = [
    (AnimState::Idle, 0, 7),
    (AnimState::Walk, 1, 8),
    (AnimState::Run, 2, 8),
    (AnimState::JumpRise, 5, 3),
    (AnimState::JumpFall, 6, 3),
    (AnimState::JumpLand, 7, 2),
    (AnimState::Attack1, 8, 6),
    (AnimState::Attack2, 9, 6),
    (AnimState::Attack3, 10, 6),
    (AnimState::JumpAttack, 15, 4),
    (AnimState::RunAttack, 16, 6),
    (AnimState::Hurt, 12, 2),
    (AnimState::KnockedDown, 13, 2),
    (AnimState::GetUp, 14, 3),
    (AnimState::Pickup, 19, 5),
    (AnimState::Dead, 21, 1),
];

/// Visual child of a combatant body.
#[derive(Component, Debug, Default)]
pub struct FighterSprite;

pub struct FighterAnimationsPlugin;

impl Plugin for FighterAnimationsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<FighterSpritesheet>()
            .init_resource::<AnimClips>()
            .add_systems(Startup, (load_fighter_spritesheet, register_fighter_animations))
            .add_systems(
                Update,
                (advance_anim_graphs, switch_sheet_animation, sync_fighter_sprites).chain(),
            );
    }
}

fn load_fighter_spritesheet(
    mut atlas_layouts: ResMut<Assets<TextureAtlasLayout>>,
    assets: Res<AssetServer>,
    mut sheet: ResMut<FighterSpritesheet>,
) {
    sheet.image = assets.load("fighter_sheet.png");

    let spritesheet = Spritesheet::new(COLUMNS, ROWS);
    sheet.layout = atlas_layouts.add(spritesheet.atlas_layout(FRAME_W, FRAME_H));
}

fn register_fighter_animations(mut library: ResMut<AnimationLibrary>, mut clips: ResMut<AnimClips>) {
    let spritesheet = Spritesheet::new(COLUMNS, ROWS);

    for (state, row, frames) in STATE_ROWS {
        let frames = frames.clamp(1, COLUMNS);
        let frame_ms = match clip_seconds(state) {
            Some(len) => ((len * 1000.0) as u32 / frames as u32).max(1),
            None => LOOP_FRAME_MS,
        };

        let clip = Clip::from_frames(spritesheet.row_partial(row, 0..frames))
            .with_duration(AnimationDuration::PerFrame(frame_ms));

        let clip_id = library.register_clip(clip);
        let anim_id = library.register_animation(Animation::from_clip(clip_id));

        let name = format!("fighter:{state:?}").to_lowercase();
        let _ = library.name_animation(anim_id, &name);
        clips.0.insert(state, anim_id);
    }
}

pub fn advance_anim_graphs(time: Res<Time>, mut q: Query<&mut AnimGraph>) {
    let dt = time.delta_secs();
    for mut graph in &mut q {
        graph.advance(dt);
    }
}

fn switch_sheet_animation(
    clips: Res<AnimClips>,
    bodies: Query<(&AnimGraph, &Children)>,
    mut sprites: Query<&mut SpritesheetAnimation, With<FighterSprite>>,
) {
    for (graph, children) in &bodies {
        let Some(id) = clips.get(graph.state()) else {
            continue;
        };
        for &child in children {
            if let Ok(mut anim) = sprites.get_mut(child) {
                if anim.animation_id != id {
                    anim.switch(id);
                }
                anim.playing = true;
            }
        }
    }
}

/// Facing, fade and depth placement of the sprite child.
fn sync_fighter_sprites(
    bodies: Query<(&RigFx, &Depth, &Children)>,
    mut sprites: Query<(&mut Sprite, &mut Transform), With<FighterSprite>>,
) {
    for (fx, depth, children) in &bodies {
        for &child in children {
            let Ok((mut sprite, mut tf)) = sprites.get_mut(child) else {
                continue;
            };
            sprite.flip_x = fx.facing.is_left();
            sprite.color.set_alpha(fx.opacity);
            tf.translation.y = depth.z * DEPTH_TO_SCREEN;
            tf.translation.z = -depth.z;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(graph: &mut AnimGraph, seconds: f32) {
        let steps = (seconds / 0.02).ceil() as usize + 1;
        for _ in 0..steps {
            graph.advance(0.02);
        }
    }

    #[test]
    fn locomotion_follows_speed_and_run_flag() {
        let mut g = AnimGraph::default();
        g.set_float(AnimFloat::Speed, 2.0);
        g.advance(0.02);
        assert_eq!(g.state(), AnimState::Walk);
        g.set_bool(AnimBool::IsRunning, true);
        g.advance(0.02);
        assert_eq!(g.state(), AnimState::Run);
        g.set_float(AnimFloat::Speed, 0.0);
        g.advance(0.02);
        assert_eq!(g.state(), AnimState::Idle);
    }

    #[test]
    fn attack_enters_chain_state_and_reports_it() {
        let mut g = AnimGraph::default();
        g.set_integer(AnimInt::CurrentChain, 2);
        g.set_trigger(AnimTrigger::Attack);
        g.advance(0.02);
        assert_eq!(g.state(), AnimState::Attack2);
        assert_eq!(g.drain_events(), vec![AnimEvent::ChainEvaluated(2)]);
        run(&mut g, ATTACK_SECONDS);
        assert_eq!(g.state(), AnimState::Idle);
    }

    #[test]
    fn attack_during_swing_is_buffered() {
        let mut g = AnimGraph::default();
        g.set_integer(AnimInt::CurrentChain, 1);
        g.set_trigger(AnimTrigger::Attack);
        g.advance(0.02);
        g.set_integer(AnimInt::CurrentChain, 2);
        g.set_trigger(AnimTrigger::Attack);
        g.advance(0.02);
        assert_eq!(g.state(), AnimState::Attack1);
        run(&mut g, ATTACK_SECONDS);
        assert_eq!(g.state(), AnimState::Attack2);
    }

    #[test]
    fn running_attack_and_jump_attack() {
        let mut g = AnimGraph::default();
        g.set_float(AnimFloat::Speed, 5.0);
        g.set_bool(AnimBool::IsRunning, true);
        g.advance(0.02);
        g.set_trigger(AnimTrigger::Attack);
        g.advance(0.02);
        assert_eq!(g.state(), AnimState::RunAttack);

        let mut g = AnimGraph::default();
        g.set_trigger(AnimTrigger::Jump);
        g.set_bool(AnimBool::IsGrounded, false);
        g.advance(0.02);
        assert_eq!(g.state(), AnimState::JumpRise);
        g.set_trigger(AnimTrigger::Attack);
        g.advance(0.02);
        assert_eq!(g.state(), AnimState::JumpAttack);
        run(&mut g, JUMP_ATTACK_SECONDS);
        assert_eq!(g.state(), AnimState::JumpFall);
        assert!(g.drain_events().contains(&AnimEvent::JumpAttackFinished));
        g.set_bool(AnimBool::IsGrounded, true);
        g.advance(0.02);
        assert_eq!(g.state(), AnimState::JumpLand);
    }

    #[test]
    fn downed_graph_ignores_everything_but_get_up() {
        let mut g = AnimGraph::default();
        g.set_trigger(AnimTrigger::Knockdown);
        g.advance(0.02);
        g.set_trigger(AnimTrigger::IsHurt);
        g.set_trigger(AnimTrigger::Attack);
        run(&mut g, 2.0);
        assert_eq!(g.state(), AnimState::KnockedDown);
        g.set_trigger(AnimTrigger::GetUp);
        g.advance(0.02);
        assert_eq!(g.state(), AnimState::GetUp);
        run(&mut g, GET_UP_SECONDS);
        assert_eq!(g.state(), AnimState::Idle);
    }

    #[test]
    fn pickup_raises_event_at_clip_end() {
        let mut g = AnimGraph::default();
        g.set_trigger(AnimTrigger::PickupPowerup);
        g.advance(0.02);
        assert_eq!(g.state(), AnimState::Pickup);
        assert!(g.drain_events().is_empty());
        run(&mut g, PICKUP_SECONDS);
        assert_eq!(g.drain_events(), vec![AnimEvent::PickupFinished]);
    }

    #[test]
    fn death_wins_over_pending_triggers() {
        let mut g = AnimGraph::default();
        g.set_trigger(AnimTrigger::IsHurt);
        g.set_bool(AnimBool::IsAlive, false);
        g.advance(0.02);
        assert_eq!(g.state(), AnimState::Dead);
        g.set_trigger(AnimTrigger::Attack);
        g.advance(0.02);
        assert_eq!(g.state(), AnimState::Dead);
    }
}
