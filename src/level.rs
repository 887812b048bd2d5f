// level.rs
//! Stage geometry: the physics floor, the walkable depth band the navigator
//! plans on, and the backdrop.

use log::debug;

use crate::class::StageClass;
use crate::gameflow::GameplayRoot;
use crate::navigation::{FloorRect, StageNavigator};
use crate::physics::{DEPTH_TO_SCREEN, FLOOR_Y, Floor, GameLayer};
use crate::pickups::{ItemIds, spawn_level_items};
use crate::prelude::*;
use crate::wave::LevelData;

/// Walkable floor beyond each visible edge, so scripted walks can start and
/// end off screen.
pub const FLOOR_MARGIN: f32 = 3.0;
const FLOOR_THICKNESS: f32 = 1.0;
const BACKDROP_HEIGHT: f32 = 12.0;

pub fn stage_navigator(stage: &StageClass) -> StageNavigator {
    StageNavigator {
        floor: FloorRect::new(
            stage.min_visible_x - FLOOR_MARGIN,
            stage.max_visible_x + FLOOR_MARGIN,
            stage.floor_min_z,
            stage.floor_max_z,
        ),
        blockers: Vec::new(),
    }
}

pub fn spawn_stage(
    commands: &mut Commands,
    stage: &StageClass,
    level: &LevelData,
    ids: &mut ItemIds,
) {
    let left = stage.min_visible_x - FLOOR_MARGIN * 2.0;
    let width = stage.max_visible_x - stage.min_visible_x + FLOOR_MARGIN * 4.0;
    let center_x = left + width * 0.5;

    commands.spawn((
        Floor,
        RigidBody::Static,
        Collider::rectangle(width, FLOOR_THICKNESS),
        CollisionLayers::new(GameLayer::Floor, [GameLayer::Hero, GameLayer::Enemy]),
        Friction::ZERO,
        Transform::from_xyz(center_x, FLOOR_Y - FLOOR_THICKNESS * 0.5, 0.0),
        GameplayRoot,
        Name::new("Floor"),
    ));

    let near = stage.floor_min_z * DEPTH_TO_SCREEN;
    let far = stage.floor_max_z * DEPTH_TO_SCREEN;
    commands.spawn((
        Sprite::from_color(Color::srgb(0.22, 0.2, 0.24), Vec2::new(width, far - near + 1.0)),
        Transform::from_xyz(center_x, (near + far) * 0.5, -20.0),
        GameplayRoot,
        Name::new("Street"),
    ));
    commands.spawn((
        Sprite::from_color(Color::srgb(0.12, 0.12, 0.2), Vec2::new(width, BACKDROP_HEIGHT)),
        Transform::from_xyz(center_x, far + BACKDROP_HEIGHT * 0.5, -30.0),
        GameplayRoot,
        Name::new("Backdrop"),
    ));

    spawn_level_items(commands, ids, &level.powerups);
    debug!(
        "stage '{}' spawned: {} events, {} items",
        level.name,
        level.battle_events.len(),
        level.powerups.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::NavigationProvider;

    #[test]
    fn navigator_covers_the_off_screen_margins() {
        let nav = stage_navigator(&StageClass::default());
        let start = Vec3::new(-2.0, 0.0, 0.0);
        assert!(nav.calculate_path(start, Vec3::new(2.0, 0.0, 1.0)).is_some());
        assert!(nav.calculate_path(start, Vec3::new(74.0, 0.0, 0.0)).is_some());
        assert!(nav.calculate_path(start, Vec3::new(2.0, 0.0, 2.5)).is_none());
        assert!(nav.calculate_path(start, Vec3::new(80.0, 0.0, 0.0)).is_none());
    }
}
