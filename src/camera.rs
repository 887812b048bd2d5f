// camera.rs
//! Side-scrolling camera: follows the hero inside the stage limits, locks on
//! a battle column, and drags the invisible stage walls along its edges.

use bevy::render::camera::ScalingMode;

use crate::class::StageClass;
use crate::gameflow::{GameplayRoot, gameplay_running};
use crate::hero::Hero;
use crate::physics::{BodySet, GameLayer};
use crate::prelude::*;

/// Visible world width is fixed; height follows from it.
pub const VIEW_WIDTH: f32 = 16.0;
pub const VIEW_HEIGHT: f32 = 9.0;
const CAMERA_Y: f32 = 2.6;
const OFFSET_EASE: f32 = 0.1;
const OFFSET_SNAP: f32 = 0.05;
const WALL_THICKNESS: f32 = 1.0;
const WALL_HEIGHT: f32 = 40.0;

#[derive(Component)]
pub struct MainCamera;

/// Horizontal camera limits plus the offset left over after a lock releases.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct CameraBounds {
    pub min_visible_x: f32,
    pub max_visible_x: f32,
    pub half_width: f32,
    offset: f32,
    locked_at: Option<f32>,
    x: f32,
}

impl Default for CameraBounds {
    fn default() -> Self {
        Self::new(&StageClass::default(), VIEW_WIDTH * 0.5)
    }
}

impl CameraBounds {
    pub fn new(stage: &StageClass, half_width: f32) -> Self {
        let mut bounds = Self {
            min_visible_x: stage.min_visible_x,
            max_visible_x: stage.max_visible_x,
            half_width: half_width.max(0.0),
            offset: 0.0,
            locked_at: None,
            x: 0.0,
        };
        bounds.x = bounds.set_x_position(stage.min_visible_x);
        bounds
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }

    pub fn is_locked(&self) -> bool {
        self.locked_at.is_some()
    }

    /// Camera x for a followed actor at `x`. A stage narrower than the view
    /// centers on it.
    pub fn set_x_position(&self, x: f32) -> f32 {
        let lo = self.min_visible_x + self.half_width;
        let hi = self.max_visible_x - self.half_width;
        if lo > hi {
            return (self.min_visible_x + self.max_visible_x) * 0.5;
        }
        (x + self.offset).clamp(lo, hi)
    }

    /// Keeps the camera where it is while the followed actor is elsewhere.
    pub fn calculate_offset(&mut self, actor_x: f32, camera_x: f32) {
        self.offset = camera_x - actor_x;
    }

    pub fn ease(&mut self) {
        self.offset += (0.0 - self.offset) * OFFSET_EASE;
        if self.offset.abs() < OFFSET_SNAP {
            self.offset = 0.0;
        }
    }

    pub fn lock(&mut self, column: f32) {
        self.locked_at = Some(column);
    }

    /// Hands the camera back to the actor without a jump.
    pub fn release(&mut self, actor_x: f32) {
        if self.locked_at.take().is_some() {
            self.calculate_offset(actor_x, self.x);
        }
    }

    /// One fixed step. Returns the new camera x.
    pub fn step(&mut self, actor_x: f32) -> f32 {
        self.x = match self.locked_at {
            Some(column) => self.set_x_position(column - self.offset),
            None => {
                let x = self.set_x_position(actor_x);
                self.ease();
                x
            }
        };
        self.x
    }

    /// Snaps the camera straight onto an actor, dropping any lock.
    pub fn reset(&mut self, actor_x: f32) {
        self.offset = 0.0;
        self.locked_at = None;
        self.x = self.set_x_position(actor_x);
    }

    pub fn left_edge(&self) -> f32 {
        self.x - self.half_width
    }

    pub fn right_edge(&self) -> f32 {
        self.x + self.half_width
    }
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageWall {
    Left,
    Right,
}

/// Whether the walls at the screen edges keep the hero in.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StageWalls {
    pub enabled: bool,
}

pub struct StageCameraPlugin;

impl Plugin for StageCameraPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CameraBounds>()
            .init_resource::<StageWalls>()
            .add_systems(Startup, spawn_main_camera)
            .add_systems(
                FixedUpdate,
                (camera_follow, move_stage_walls)
                    .chain()
                    .after(BodySet::Integrate)
                    .run_if(gameplay_running),
            )
            .add_systems(
                Update,
                toggle_stage_walls.run_if(resource_changed::<StageWalls>),
            );
    }
}

pub fn spawn_main_camera(mut commands: Commands, existing: Query<(), With<MainCamera>>) {
    if existing.is_empty() {
        commands.spawn((
            MainCamera,
            Camera2d,
            Msaa::Off,
            Projection::Orthographic(OrthographicProjection {
                scaling_mode: ScalingMode::Fixed {
                    width: VIEW_WIDTH,
                    height: VIEW_HEIGHT,
                },
                ..OrthographicProjection::default_2d()
            }),
            Transform::from_xyz(0.0, CAMERA_Y, 0.0),
        ));
    }
}

pub fn spawn_stage_walls(commands: &mut Commands, bounds: &CameraBounds) {
    for (wall, x) in [
        (StageWall::Left, bounds.left_edge() - WALL_THICKNESS * 0.5),
        (StageWall::Right, bounds.right_edge() + WALL_THICKNESS * 0.5),
    ] {
        commands.spawn((
            wall,
            RigidBody::Kinematic,
            Collider::rectangle(WALL_THICKNESS, WALL_HEIGHT),
            CollisionLayers::new(GameLayer::Wall, [GameLayer::Hero]),
            ColliderDisabled,
            Transform::from_xyz(x, WALL_HEIGHT * 0.5, 0.0),
            GameplayRoot,
            Name::new(format!("{wall:?} wall")),
        ));
    }
}

fn camera_follow(
    mut bounds: ResMut<CameraBounds>,
    heroes: Query<&Position, With<Hero>>,
    mut cams: Query<&mut Transform, With<MainCamera>>,
) {
    let Ok(hero) = heroes.single() else {
        return;
    };
    let x = bounds.step(hero.x);
    for mut tf in &mut cams {
        tf.translation.x = x;
        tf.translation.y = CAMERA_Y;
    }
}

fn move_stage_walls(bounds: Res<CameraBounds>, mut walls: Query<(&StageWall, &mut Position)>) {
    for (wall, mut pos) in &mut walls {
        pos.x = match wall {
            StageWall::Left => bounds.left_edge() - WALL_THICKNESS * 0.5,
            StageWall::Right => bounds.right_edge() + WALL_THICKNESS * 0.5,
        };
    }
}

fn toggle_stage_walls(
    mut commands: Commands,
    state: Res<StageWalls>,
    walls: Query<Entity, With<StageWall>>,
) {
    for wall in &walls {
        if state.enabled {
            commands.entity(wall).remove::<ColliderDisabled>();
        } else {
            commands.entity(wall).insert(ColliderDisabled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> CameraBounds {
        CameraBounds::new(&StageClass::default(), 8.0)
    }

    #[test]
    fn follow_is_clamped_to_stage() {
        let b = bounds();
        assert_eq!(b.set_x_position(-30.0), 8.0);
        assert_eq!(b.set_x_position(30.0), 30.0);
        assert_eq!(b.set_x_position(500.0), 64.0);
    }

    #[test]
    fn narrow_stage_centers() {
        let stage = StageClass {
            min_visible_x: 0.0,
            max_visible_x: 10.0,
            ..StageClass::default()
        };
        let b = CameraBounds::new(&stage, 8.0);
        assert_eq!(b.set_x_position(-4.0), 5.0);
        assert_eq!(b.set_x_position(40.0), 5.0);
    }

    #[test]
    fn released_lock_eases_back_without_a_jump() {
        let mut b = bounds();
        b.reset(20.0);
        b.lock(20.0);
        assert_eq!(b.step(26.0), 20.0);

        b.release(26.0);
        assert_eq!(b.offset(), -6.0);
        assert_eq!(b.step(26.0), 20.0);

        for _ in 0..200 {
            b.step(26.0);
        }
        assert_eq!(b.offset(), 0.0);
        assert_eq!(b.x(), 26.0);
    }

    #[test]
    fn ease_snaps_small_offsets() {
        let mut b = bounds();
        b.calculate_offset(10.0, 10.04);
        b.ease();
        assert_eq!(b.offset(), 0.0);
    }

    #[test]
    fn edges_track_camera() {
        let mut b = bounds();
        b.reset(30.0);
        assert_eq!(b.left_edge(), 22.0);
        assert_eq!(b.right_edge(), 38.0);
    }
}
