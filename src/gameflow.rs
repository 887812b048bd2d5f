// gameflow.rs
//! Level lifecycle: intro walk, battle events, walkout, level transitions,
//! game over and victory.

use bevy::ui::GlobalZIndex;
use log::{info, warn};

use crate::animations::{AnimClips, AnimGraph, FighterSpritesheet};
use crate::camera::{CameraBounds, MainCamera, StageWalls, VIEW_WIDTH, spawn_stage_walls};
use crate::character::{StageCueReached, spawn_hero};
use crate::class::ClassFile;
use crate::combat::EnemyKind;
use crate::enemy::spawn_enemy;
use crate::hero::Hero;
use crate::hud::{ShowBanner, ShowGo};
use crate::level::{spawn_stage, stage_navigator};
use crate::navigation::StageNavigator;
use crate::physics::{Depth, EcsRig, RigFx};
use crate::pickups::ItemIds;
use crate::prelude::*;
use crate::rig::LifeBarView;
use crate::wave::{
    BattleEvent, Campaign, CampaignStep, LevelData, StageCue, WaveProgress, WaveTracker,
};

/// Scripted walks start and end this far beyond the visible stage.
const OFF_SCREEN: f32 = 2.0;
const LEVEL_BANNER_SECONDS: f32 = 2.0;
const LEVEL_COMPLETE_SECONDS: f32 = 2.5;

#[derive(States, Debug, Hash, PartialEq, Eq, Clone, Copy, Default)]
pub enum GameState {
    /// Waiting for the class file and the fighter sheet.
    #[default]
    Loading,
    LevelStart,
    InGame,
    LevelComplete,
    GameOver,
    Victory,
}

/// Combatants keep simulating behind the game over screen.
pub fn gameplay_running(state: Option<Res<State<GameState>>>) -> bool {
    state.is_some_and(|s| matches!(s.get(), GameState::InGame | GameState::GameOver))
}

#[derive(Event, Debug, Clone, Copy, Default)]
pub struct PlayerDied;

/// Everything despawned when a level is torn down.
#[derive(Component)]
pub struct GameplayRoot;

#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LevelPhase {
    #[default]
    Intro,
    Fighting,
    Walkout,
}

/// The level being played, copied out of the class file.
#[derive(Resource, Debug, Clone, Default)]
pub struct ActiveLevel(pub LevelData);

#[derive(Resource, Debug)]
struct TransitionTimer(Timer);

#[derive(Component)]
struct EndScreenUI;

#[derive(Component, Clone, Copy)]
enum EndBtn {
    TryAgain,
    PlayAgain,
}

pub struct GameFlowPlugin;

impl Plugin for GameFlowPlugin {
    fn build(&self, app: &mut App) {
        app.init_state::<GameState>()
            .init_resource::<LevelPhase>()
            .init_resource::<ActiveLevel>()
            .init_resource::<WaveTracker>()
            .init_resource::<StageNavigator>()
            .add_event::<PlayerDied>()
            .add_systems(Update, finish_loading.run_if(in_state(GameState::Loading)))
            .add_systems(
                OnEnter(GameState::LevelStart),
                (despawn_gameplay, start_level, begin_intro).chain(),
            )
            .add_systems(
                Update,
                (handle_stage_cues, run_battle_events)
                    .chain()
                    .run_if(in_state(GameState::InGame)),
            )
            .add_systems(Update, to_game_over_on_death.run_if(in_state(GameState::InGame)))
            .add_systems(OnEnter(GameState::LevelComplete), start_transition_timer)
            .add_systems(
                Update,
                tick_transition_timer.run_if(in_state(GameState::LevelComplete)),
            )
            .add_systems(OnEnter(GameState::GameOver), spawn_game_over)
            .add_systems(OnEnter(GameState::Victory), spawn_victory)
            .add_systems(OnExit(GameState::GameOver), despawn_ui::<EndScreenUI>)
            .add_systems(OnExit(GameState::Victory), despawn_ui::<EndScreenUI>)
            .add_systems(
                Update,
                end_screen_buttons
                    .run_if(in_state(GameState::GameOver).or(in_state(GameState::Victory))),
            );
    }
}

fn finish_loading(
    mut commands: Commands,
    class: Option<Res<ClassFile>>,
    sheet: Option<Res<FighterSpritesheet>>,
    clips: Option<Res<AnimClips>>,
    mut next: ResMut<NextState<GameState>>,
) {
    let (Some(class), Some(_), Some(_)) = (class, sheet, clips) else {
        return;
    };
    commands.insert_resource(Campaign::new(class.levels.len()));
    next.set(GameState::LevelStart);
}

// ====== Level start ======

#[allow(clippy::too_many_arguments)]
fn start_level(
    mut commands: Commands,
    class: Res<ClassFile>,
    campaign: Res<Campaign>,
    sheet: Res<FighterSpritesheet>,
    clips: Res<AnimClips>,
    mut ids: ResMut<ItemIds>,
    mut tracker: ResMut<WaveTracker>,
    mut walls: ResMut<StageWalls>,
    mut banners: EventWriter<ShowBanner>,
) {
    let level = class
        .levels
        .get(campaign.current_level())
        .cloned()
        .unwrap_or_default();
    info!("starting level {} '{}'", campaign.current_level(), level.name);

    tracker.load(&level);
    let stage = &class.stage;
    let mut bounds = CameraBounds::new(stage, VIEW_WIDTH * 0.5);
    bounds.reset(stage.min_visible_x);

    spawn_stage(&mut commands, stage, &level, &mut ids);
    spawn_stage_walls(&mut commands, &bounds);
    walls.enabled = false;

    let start = Vec3::new(stage.min_visible_x - OFF_SCREEN, 0.0, 0.0);
    spawn_hero(&mut commands, &class.hero, start, &sheet, &clips);

    banners.write(ShowBanner::timed(level.name.clone(), LEVEL_BANNER_SECONDS));
    commands.insert_resource(stage_navigator(stage));
    commands.insert_resource(bounds);
    commands.insert_resource(ActiveLevel(level));
    commands.insert_resource(LevelPhase::Intro);
}

/// The hero walks in from off screen before taking control.
fn begin_intro(
    class: Res<ClassFile>,
    nav: Res<StageNavigator>,
    mut heroes: Query<(&mut Hero, &mut AnimGraph, &mut RigFx, &Depth)>,
    mut cams: Query<&mut Transform, With<MainCamera>>,
    bounds: Res<CameraBounds>,
    mut next: ResMut<NextState<GameState>>,
) {
    let stage = &class.stage;
    let start = Vec3::new(stage.min_visible_x - OFF_SCREEN, 0.0, 0.0);
    for (mut hero, mut graph, mut fx, depth) in &mut heroes {
        let at = Vec3::new(start.x, start.y, depth.z);
        let mut rig = EcsRig::new(&mut graph, &mut fx, at, Vec3::ZERO);
        rig.show(true);
        rig.set_progress(hero.actor.life_fraction());
        rig.set_thumbnail(1.0);

        hero.set_controllable(false);
        hero.use_autopilot(true);
        let target = Vec3::new(stage.min_visible_x + OFF_SCREEN, start.y, depth.z);
        if !hero.animate_to(nav.as_ref(), target, false, StageCue::IntroFinished, &mut rig) {
            warn!("intro walk has no path; handing control over");
            hero.use_autopilot(false);
            hero.set_controllable(true);
        }
    }
    for mut tf in &mut cams {
        tf.translation.x = bounds.x();
    }
    next.set(GameState::InGame);
}

// ====== In game ======

#[allow(clippy::too_many_arguments)]
fn handle_stage_cues(
    mut cues: EventReader<StageCueReached>,
    mut phase: ResMut<LevelPhase>,
    mut walls: ResMut<StageWalls>,
    mut campaign: ResMut<Campaign>,
    level: Res<ActiveLevel>,
    mut heroes: Query<&mut Hero>,
    mut go: EventWriter<ShowGo>,
    mut banners: EventWriter<ShowBanner>,
    mut next: ResMut<NextState<GameState>>,
) {
    for StageCueReached(cue) in cues.read() {
        match cue {
            StageCue::IntroFinished => {
                for mut hero in &mut heroes {
                    hero.use_autopilot(false);
                    hero.set_controllable(true);
                }
                walls.enabled = true;
                *phase = LevelPhase::Fighting;
                go.write(ShowGo);
            }
            StageCue::WalkoutFinished => match campaign.advance() {
                CampaignStep::NextLevel(index) => {
                    info!("level '{}' cleared, next is {index}", level.0.name);
                    banners.write(ShowBanner::hold(format!("{} COMPLETED", level.0.name)));
                    next.set(GameState::LevelComplete);
                }
                CampaignStep::Victory => {
                    info!("campaign cleared");
                    banners.write(ShowBanner::hold("YOU WON"));
                    next.set(GameState::Victory);
                }
            },
        }
    }
}

/// Where one spawn entry enters: `offset` counts camera half-widths from the
/// center, plus one unit so it starts off screen.
pub fn enemy_spawn_point(
    camera_x: f32,
    half_width: f32,
    offset: f32,
    rows: &[f32],
    row: usize,
) -> Vec3 {
    let x = camera_x + offset * (half_width + 1.0);
    let z = rows.get(row).copied().unwrap_or(0.0);
    Vec3::new(x, 0.0, z)
}

#[allow(clippy::too_many_arguments)]
fn run_battle_events(
    mut commands: Commands,
    class: Res<ClassFile>,
    level: Res<ActiveLevel>,
    nav: Res<StageNavigator>,
    sheet: Res<FighterSpritesheet>,
    clips: Res<AnimClips>,
    mut phase: ResMut<LevelPhase>,
    mut tracker: ResMut<WaveTracker>,
    mut bounds: ResMut<CameraBounds>,
    mut walls: ResMut<StageWalls>,
    mut go: EventWriter<ShowGo>,
    mut heroes: Query<(&mut Hero, &mut AnimGraph, &mut RigFx, &Position, &Depth)>,
) {
    if *phase != LevelPhase::Fighting {
        return;
    }
    let Ok((mut hero, mut graph, mut fx, pos, depth)) = heroes.single_mut() else {
        return;
    };

    match tracker.update(&level.0) {
        Some(WaveProgress::MoreAhead) => {
            bounds.release(pos.x);
            go.write(ShowGo);
        }
        Some(WaveProgress::LevelCleared) => {
            bounds.release(pos.x);
            walls.enabled = false;
            *phase = LevelPhase::Walkout;

            let here = Vec3::new(pos.x, pos.y, depth.z);
            let exit = Vec3::new(class.stage.max_visible_x + OFF_SCREEN, pos.y, depth.z);
            let mut rig = EcsRig::new(&mut graph, &mut fx, here, Vec3::ZERO);
            hero.set_controllable(false);
            hero.use_autopilot(true);
            if !hero.animate_to(nav.as_ref(), exit, true, StageCue::WalkoutFinished, &mut rig) {
                warn!("walkout has no path from {here}");
            }
            return;
        }
        None => {}
    }

    if let Some(event) = tracker.poll(&level.0, bounds.x()) {
        bounds.lock(event.column);
        spawn_battle(&mut commands, &class, &event, &bounds, &mut tracker, &sheet, &clips);
    }
}

fn spawn_battle(
    commands: &mut Commands,
    class: &ClassFile,
    event: &BattleEvent,
    bounds: &CameraBounds,
    tracker: &mut WaveTracker,
    sheet: &FighterSpritesheet,
    clips: &AnimClips,
) {
    for spawn in &event.enemies {
        let enemy_class = match spawn.kind {
            EnemyKind::Robot => &class.robot,
            EnemyKind::Boss => &class.boss,
        };
        let at = enemy_spawn_point(
            bounds.x(),
            bounds.half_width,
            spawn.offset,
            &class.stage.spawn_rows,
            spawn.row,
        );
        spawn_enemy(commands, tracker, spawn.kind, enemy_class, at, spawn.tint, sheet, clips);
    }
}

fn to_game_over_on_death(
    mut ev: EventReader<PlayerDied>,
    mut banners: EventWriter<ShowBanner>,
    mut next: ResMut<NextState<GameState>>,
) {
    if ev.read().next().is_some() {
        banners.write(ShowBanner::hold("GAME OVER"));
        next.set(GameState::GameOver);
    }
}

// ====== Between levels ======

fn start_transition_timer(mut commands: Commands) {
    commands.insert_resource(TransitionTimer(Timer::from_seconds(
        LEVEL_COMPLETE_SECONDS,
        TimerMode::Once,
    )));
}

fn tick_transition_timer(
    time: Res<Time>,
    mut timer: ResMut<TransitionTimer>,
    mut banners: EventWriter<ShowBanner>,
    mut next: ResMut<NextState<GameState>>,
) {
    if timer.0.tick(time.delta()).just_finished() {
        banners.write(ShowBanner::clear());
        next.set(GameState::LevelStart);
    }
}

// ====== End screens ======

fn end_root(commands: &mut Commands) -> Entity {
    commands
        .spawn((
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                justify_content: JustifyContent::Center,
                align_items: AlignItems::End,
                padding: UiRect::bottom(Val::Px(120.0)),
                ..default()
            },
            GlobalZIndex(1000),
            BackgroundColor(Color::NONE),
            EndScreenUI,
        ))
        .id()
}

fn spawn_button<A: Component>(commands: &mut Commands, label: &str, action: A) -> Entity {
    let btn = commands
        .spawn((
            Button,
            Node {
                width: Val::Px(240.0),
                height: Val::Px(48.0),
                align_items: AlignItems::Center,
                justify_content: JustifyContent::Center,
                ..default()
            },
            BackgroundColor(Color::srgb(0.15, 0.15, 0.25)),
            action,
        ))
        .id();

    let text = commands
        .spawn((
            Text::new(label),
            TextFont {
                font_size: 24.0,
                ..default()
            },
            TextColor(Color::WHITE),
        ))
        .id();

    commands.entity(btn).add_child(text);
    btn
}

fn spawn_game_over(mut commands: Commands) {
    let root = end_root(&mut commands);
    let b_try = spawn_button(&mut commands, "Try Again", EndBtn::TryAgain);
    commands.entity(root).add_child(b_try);
}

fn spawn_victory(mut commands: Commands) {
    let root = end_root(&mut commands);
    let b_again = spawn_button(&mut commands, "Play Again", EndBtn::PlayAgain);
    commands.entity(root).add_child(b_again);
}

fn set_btn_color(bg: &mut BackgroundColor, interaction: Interaction) {
    *bg = match interaction {
        Interaction::Pressed => Color::srgba(0.40, 0.40, 0.60, 1.0).into(),
        Interaction::Hovered => Color::srgba(0.25, 0.25, 0.40, 1.0).into(),
        Interaction::None => Color::srgba(0.15, 0.15, 0.25, 1.0).into(),
    };
}

fn end_screen_buttons(
    mut next: ResMut<NextState<GameState>>,
    mut campaign: ResMut<Campaign>,
    mut banners: EventWriter<ShowBanner>,
    mut q: Query<(&Interaction, &mut BackgroundColor, &EndBtn), (Changed<Interaction>, With<Button>)>,
) {
    for (i, mut bg, btn) in &mut q {
        set_btn_color(&mut bg, *i);
        if *i == Interaction::Pressed {
            if matches!(btn, EndBtn::PlayAgain) {
                campaign.reset();
            }
            banners.write(ShowBanner::clear());
            next.set(GameState::LevelStart);
        }
    }
}

fn despawn_ui<T: Component>(mut commands: Commands, q: Query<Entity, With<T>>) {
    for e in &q {
        commands.entity(e).despawn();
    }
}

pub fn despawn_gameplay(mut commands: Commands, q: Query<Entity, With<GameplayRoot>>) {
    for e in &q {
        commands.entity(e).despawn();
    }
}
