mod actor;
mod ai;
mod animations;
mod camera;
mod character;
mod class;
mod combat;
mod controls;
mod enemy;
mod gameflow;
mod hero;
mod hud;
mod level;
mod navigation;
mod physics;
mod pickups;
mod prelude;
mod raycasts;
mod rig;
mod sensors;
mod walker;
mod wave;

use crate::animations::FighterAnimationsPlugin;
use crate::camera::StageCameraPlugin;
use crate::character::PlayerPlugin;
use crate::class::ClassPlugin;
use crate::controls::Action;
use crate::enemy::EnemyPlugin;
use crate::gameflow::GameFlowPlugin;
use crate::hud::HudPlugin;
use crate::physics::BodyPlugin;
use crate::pickups::PickupsPlugin;
use crate::prelude::*;
use crate::raycasts::RaycastMeleePlugin;

fn main() {
    App::new()
        .add_plugins((
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        title: String::from("brawler"),
                        ..Default::default()
                    }),
                    ..default()
                })
                .set(ImagePlugin::default_nearest()),
            InputManagerPlugin::<Action>::default(),
            PhysicsPlugins::default(),
//            PhysicsDebugPlugin::default(),
        ))
        .add_plugins(SpritesheetAnimationPlugin)
        .add_plugins(ClassPlugin::new("assets/brawler.json"))
        .add_plugins((
            BodyPlugin,
            FighterAnimationsPlugin,
            PlayerPlugin,
            EnemyPlugin,
            RaycastMeleePlugin,
            PickupsPlugin,
        ))
        .add_plugins((StageCameraPlugin, HudPlugin, GameFlowPlugin))
        .insert_resource(ClearColor(Color::srgb(0.05, 0.05, 0.1)))
        .run();
}
