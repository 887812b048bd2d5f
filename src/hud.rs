// hud.rs
//! Screen overlay: the hero's life bar, one shared enemy bar, floating damage
//! numbers, level banners and the GO indicator. Also plays the sound cues
//! combatants queue on their rigs.

use bevy::ui::GlobalZIndex;

use crate::enemy::Enemy;
use crate::hero::Hero;
use crate::physics::{BarUpdate, DEPTH_TO_SCREEN, RigFx};
use crate::prelude::*;
use crate::rig::SoundCue;

const BAR_WIDTH: f32 = 220.0;
const DAMAGE_NUMBER_SECONDS: f32 = 1.0;
const DAMAGE_NUMBER_RISE: f32 = 0.8;
const DAMAGE_NUMBER_SCALE: f32 = 0.02;
const GO_CYCLES: u32 = 4;
const GO_HALF_PERIOD: f32 = 0.2;

pub struct HudPlugin;

impl Plugin for HudPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<ShowBanner>()
            .add_event::<ShowGo>()
            .add_systems(Startup, (spawn_hud, load_sound_bank))
            .add_systems(
                Update,
                (
                    update_life_bars,
                    play_sound_cues,
                    spawn_damage_numbers,
                    float_damage_numbers,
                    show_banner,
                    tick_banner,
                    show_go,
                    blink_go,
                ),
            );
    }
}

// ====== Events ======

/// Puts `text` in the middle of the screen; `None` clears it. A banner with
/// `seconds` hides itself afterwards.
#[derive(Event, Debug, Clone, PartialEq)]
pub struct ShowBanner {
    pub text: Option<String>,
    pub seconds: Option<f32>,
}

impl ShowBanner {
    pub fn timed(text: impl Into<String>, seconds: f32) -> Self {
        Self {
            text: Some(text.into()),
            seconds: Some(seconds),
        }
    }

    pub fn hold(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            seconds: None,
        }
    }

    pub fn clear() -> Self {
        Self {
            text: None,
            seconds: None,
        }
    }
}

#[derive(Event, Debug, Clone, Copy, Default)]
pub struct ShowGo;

// ====== Widgets ======

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
enum BarOwner {
    Hero,
    Enemy,
}

#[derive(Component)]
struct LifeBarRoot(BarOwner);

#[derive(Component)]
struct LifeFill(BarOwner);

#[derive(Component)]
struct Thumbnail(BarOwner);

#[derive(Component)]
struct EnemyName;

#[derive(Component, Default)]
struct Banner(Option<Timer>);

#[derive(Component, Default)]
struct GoIndicator(Option<GoBlink>);

struct GoBlink {
    timer: Timer,
    flips: u32,
}

#[derive(Component)]
struct DamageNumber(Timer);

/// Fill colour for a life fraction.
pub fn fill_color(fraction: f32) -> Color {
    if fraction >= 0.5 {
        Color::srgb(0.2, 0.8, 0.25)
    } else if fraction >= 0.25 {
        Color::srgb(0.95, 0.8, 0.15)
    } else {
        Color::srgb(0.85, 0.2, 0.2)
    }
}

fn spawn_life_bar(parent: &mut ChildSpawnerCommands, owner: BarOwner, label: &str) {
    parent
        .spawn((
            LifeBarRoot(owner),
            Node {
                flex_direction: FlexDirection::Row,
                align_items: AlignItems::Center,
                column_gap: Val::Px(8.0),
                ..default()
            },
            if owner == BarOwner::Hero {
                Visibility::Inherited
            } else {
                Visibility::Hidden
            },
        ))
        .with_children(|row| {
            row.spawn((
                Thumbnail(owner),
                Node {
                    width: Val::Px(24.0),
                    height: Val::Px(24.0),
                    ..default()
                },
                BackgroundColor(Color::srgb(0.9, 0.9, 0.9)),
            ));
            row.spawn((
                Node {
                    width: Val::Px(BAR_WIDTH),
                    height: Val::Px(16.0),
                    border: UiRect::all(Val::Px(2.0)),
                    ..default()
                },
                BorderColor(Color::srgb(0.1, 0.1, 0.1)),
                BackgroundColor(Color::srgb(0.05, 0.05, 0.05)),
            ))
            .with_children(|bar| {
                bar.spawn((
                    LifeFill(owner),
                    Node {
                        width: Val::Percent(100.0),
                        height: Val::Percent(100.0),
                        ..default()
                    },
                    BackgroundColor(fill_color(1.0)),
                ));
            });
            let mut name = row.spawn((
                Text::new(label),
                TextFont {
                    font_size: 14.0,
                    ..default()
                },
                TextColor(Color::WHITE),
            ));
            if owner == BarOwner::Enemy {
                name.insert(EnemyName);
            }
        });
}

fn spawn_hud(mut commands: Commands) {
    commands
        .spawn((
            Node {
                position_type: PositionType::Absolute,
                top: Val::Px(12.0),
                left: Val::Px(12.0),
                flex_direction: FlexDirection::Column,
                row_gap: Val::Px(6.0),
                ..default()
            },
            GlobalZIndex(1),
        ))
        .with_children(|root| {
            spawn_life_bar(root, BarOwner::Hero, "HERO");
            spawn_life_bar(root, BarOwner::Enemy, "");
        });

    commands
        .spawn((
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                position_type: PositionType::Absolute,
                flex_direction: FlexDirection::Column,
                justify_content: JustifyContent::Center,
                align_items: AlignItems::Center,
                row_gap: Val::Px(16.0),
                ..default()
            },
            GlobalZIndex(2),
        ))
        .with_children(|center| {
            center.spawn((
                Banner::default(),
                Text::new(""),
                TextFont {
                    font_size: 44.0,
                    ..default()
                },
                TextColor(Color::WHITE),
            ));
        });

    commands.spawn((
        GoIndicator::default(),
        Text::new("GO ->"),
        TextFont {
            font_size: 36.0,
            ..default()
        },
        TextColor(Color::srgb(1.0, 0.85, 0.2)),
        Node {
            position_type: PositionType::Absolute,
            top: Val::Px(60.0),
            right: Val::Px(32.0),
            ..default()
        },
        GlobalZIndex(2),
        Visibility::Hidden,
    ));
}

// ====== Life bars ======

fn update_life_bars(
    mut bodies: Query<(&mut RigFx, Option<&Enemy>, Has<Hero>)>,
    mut roots: Query<(&LifeBarRoot, &mut Visibility)>,
    mut fills: Query<(&LifeFill, &mut Node, &mut BackgroundColor), Without<Thumbnail>>,
    mut thumbs: Query<(&Thumbnail, &mut BackgroundColor), Without<LifeFill>>,
    mut names: Query<&mut Text, With<EnemyName>>,
) {
    for (mut fx, enemy, is_hero) in &mut bodies {
        let Some(update) = fx.bar.take() else {
            continue;
        };
        let owner = match (is_hero, enemy) {
            (true, _) => BarOwner::Hero,
            (false, Some(enemy)) => {
                for mut text in &mut names {
                    **text = enemy.display_name().to_string();
                }
                BarOwner::Enemy
            }
            (false, None) => continue,
        };
        apply_bar(owner, update, &mut roots, &mut fills, &mut thumbs);
    }
}

fn apply_bar(
    owner: BarOwner,
    update: BarUpdate,
    roots: &mut Query<(&LifeBarRoot, &mut Visibility)>,
    fills: &mut Query<(&LifeFill, &mut Node, &mut BackgroundColor), Without<Thumbnail>>,
    thumbs: &mut Query<(&Thumbnail, &mut BackgroundColor), Without<LifeFill>>,
) {
    for (root, mut vis) in roots.iter_mut() {
        if root.0 == owner {
            *vis = if update.visible {
                Visibility::Inherited
            } else {
                Visibility::Hidden
            };
        }
    }
    for (fill, mut node, mut bg) in fills.iter_mut() {
        if fill.0 == owner {
            node.width = Val::Percent(update.progress * 100.0);
            bg.0 = fill_color(update.progress);
        }
    }
    for (thumb, mut bg) in thumbs.iter_mut() {
        if thumb.0 == owner {
            bg.0.set_alpha(update.thumbnail_alpha);
        }
    }
}

// ====== Sound ======

#[derive(Resource)]
pub struct SoundBank {
    hit: Handle<AudioSource>,
    hit2: Handle<AudioSource>,
    death: Handle<AudioSource>,
}

impl SoundBank {
    fn get(&self, cue: SoundCue) -> Handle<AudioSource> {
        match cue {
            SoundCue::Hit => self.hit.clone(),
            SoundCue::Hit2 => self.hit2.clone(),
            SoundCue::Death => self.death.clone(),
        }
    }
}

fn load_sound_bank(mut commands: Commands, assets: Res<AssetServer>) {
    commands.insert_resource(SoundBank {
        hit: assets.load("sfx/hit.ogg"),
        hit2: assets.load("sfx/hit2.ogg"),
        death: assets.load("sfx/death.ogg"),
    });
}

fn play_sound_cues(
    mut commands: Commands,
    bank: Option<Res<SoundBank>>,
    mut bodies: Query<&mut RigFx>,
) {
    for mut fx in &mut bodies {
        if fx.sounds.is_empty() {
            continue;
        }
        let cues = std::mem::take(&mut fx.sounds);
        let Some(bank) = bank.as_deref() else {
            continue;
        };
        for cue in cues {
            commands.spawn((AudioPlayer::new(bank.get(cue)), PlaybackSettings::DESPAWN));
        }
    }
}

// ====== Damage numbers ======

fn spawn_damage_numbers(mut commands: Commands, mut bodies: Query<&mut RigFx>) {
    for mut fx in &mut bodies {
        for (value, point) in std::mem::take(&mut fx.hit_effects) {
            commands.spawn((
                DamageNumber(Timer::from_seconds(DAMAGE_NUMBER_SECONDS, TimerMode::Once)),
                Text2d::new(format!("{value:.0}")),
                TextFont {
                    font_size: 24.0,
                    ..default()
                },
                TextColor(Color::srgb(1.0, 0.95, 0.6)),
                Transform::from_xyz(point.x, point.y + point.z * DEPTH_TO_SCREEN + 0.6, 50.0)
                    .with_scale(Vec3::splat(DAMAGE_NUMBER_SCALE)),
            ));
        }
    }
}

fn float_damage_numbers(
    mut commands: Commands,
    time: Res<Time>,
    mut numbers: Query<(Entity, &mut DamageNumber, &mut Transform, &mut TextColor)>,
) {
    let dt = time.delta_secs();
    for (entity, mut number, mut tf, mut color) in &mut numbers {
        if number.0.tick(time.delta()).finished() {
            commands.entity(entity).despawn();
            continue;
        }
        tf.translation.y += DAMAGE_NUMBER_RISE * dt;
        color.0.set_alpha(number.0.fraction_remaining());
    }
}

// ====== Banner & GO ======

fn show_banner(mut events: EventReader<ShowBanner>, mut banners: Query<(&mut Banner, &mut Text)>) {
    let Some(last) = events.read().last() else {
        return;
    };
    for (mut banner, mut text) in &mut banners {
        **text = last.text.clone().unwrap_or_default();
        banner.0 = last
            .seconds
            .map(|s| Timer::from_seconds(s.max(0.0), TimerMode::Once));
    }
}

fn tick_banner(time: Res<Time>, mut banners: Query<(&mut Banner, &mut Text)>) {
    for (mut banner, mut text) in &mut banners {
        if let Some(timer) = &mut banner.0 {
            if timer.tick(time.delta()).just_finished() {
                text.clear();
                banner.0 = None;
            }
        }
    }
}

fn show_go(mut events: EventReader<ShowGo>, mut go: Query<(&mut GoIndicator, &mut Visibility)>) {
    if events.read().last().is_none() {
        return;
    }
    for (mut indicator, mut vis) in &mut go {
        indicator.0 = Some(GoBlink {
            timer: Timer::from_seconds(GO_HALF_PERIOD, TimerMode::Repeating),
            flips: 0,
        });
        *vis = Visibility::Inherited;
    }
}

fn blink_go(time: Res<Time>, mut go: Query<(&mut GoIndicator, &mut Visibility)>) {
    for (mut indicator, mut vis) in &mut go {
        let Some(blink) = &mut indicator.0 else {
            continue;
        };
        let flips = blink.timer.tick(time.delta()).times_finished_this_tick();
        if flips == 0 {
            continue;
        }
        blink.flips += flips;
        if blink.flips >= GO_CYCLES * 2 {
            *vis = Visibility::Hidden;
            indicator.0 = None;
        } else if blink.flips % 2 == 0 {
            *vis = Visibility::Inherited;
        } else {
            *vis = Visibility::Hidden;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{EnemyClass, HeroClass};
    use crate::ai::EnemyAi;
    use crate::combat::EnemyKind;

    #[test]
    fn fill_tiers() {
        assert_eq!(fill_color(1.0), fill_color(0.5));
        assert_eq!(fill_color(0.49), fill_color(0.25));
        assert_eq!(fill_color(0.24), fill_color(0.0));
        assert_ne!(fill_color(0.5), fill_color(0.3));
        assert_ne!(fill_color(0.3), fill_color(0.1));
    }

    fn hud_app() -> App {
        let mut app = App::new();
        app.add_systems(Startup, spawn_hud)
            .add_systems(Update, update_life_bars);
        app
    }

    fn fill_width(app: &mut App, owner: BarOwner) -> Option<Val> {
        let mut q = app.world_mut().query::<(&LifeFill, &Node)>();
        q.iter(app.world())
            .find(|(f, _)| f.0 == owner)
            .map(|(_, n)| n.width)
    }

    fn bar(progress: f32) -> RigFx {
        RigFx {
            bar: Some(BarUpdate {
                visible: true,
                progress,
                thumbnail_alpha: 1.0,
            }),
            ..RigFx::default()
        }
    }

    #[test]
    fn hero_hit_moves_only_the_hero_bar() {
        let mut app = hud_app();
        app.world_mut().spawn((Hero::new(&HeroClass::default()), bar(0.5)));
        app.update();
        assert_eq!(fill_width(&mut app, BarOwner::Hero), Some(Val::Percent(50.0)));
        assert_eq!(fill_width(&mut app, BarOwner::Enemy), Some(Val::Percent(100.0)));
    }

    #[test]
    fn enemy_hit_names_the_shared_bar() {
        let mut app = hud_app();
        let class = EnemyClass::boss();
        app.world_mut().spawn((
            Enemy::new(EnemyKind::Boss, &class, EnemyAi::seeded(1.0, 1)),
            bar(0.2),
        ));
        app.update();
        assert_eq!(fill_width(&mut app, BarOwner::Enemy), Some(Val::Percent(20.0)));

        let mut q = app.world_mut().query_filtered::<&Text, With<EnemyName>>();
        let names: Vec<String> = q.iter(app.world()).map(|t| t.0.clone()).collect();
        assert_eq!(names, vec!["Boss".to_string()]);

        let mut q = app.world_mut().query::<(&LifeBarRoot, &Visibility)>();
        let shown = q
            .iter(app.world())
            .any(|(r, v)| r.0 == BarOwner::Enemy && *v == Visibility::Inherited);
        assert!(shown);
    }
}
