// pickups.rs
//! Weapons lying on the floor, the crates that hold them, and the systems
//! that keep the world in step with what the hero carries.

use log::debug;

use crate::animations::AnimGraph;
use crate::character::{HeroItemEvent, forward_item_events};
use crate::combat::AttackData;
use crate::gameflow::{GameplayRoot, gameplay_running};
use crate::hero::Hero;
use crate::physics::{DEPTH_TO_SCREEN, Depth, EcsRig, GameLayer, RigFx, body_position, body_velocity};
use crate::prelude::*;
use crate::raycasts::{MeleeRaycastHit, RaycastMeleeSet};
use crate::wave::PowerupSpawn;

/// Planar distance at which the hero can grab an item.
pub const PICKUP_RADIUS: f32 = 0.8;
const ITEM_SIZE: Vec2 = Vec2::new(0.9, 0.2);
const CRATE_SIZE: Vec2 = Vec2::new(0.9, 0.9);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemId(pub u64);

/// A weapon the hero can carry. It replaces the three combo profiles and
/// breaks after `uses_remaining` landed hits.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct Powerup {
    pub id: ItemId,
    pub attacks: [AttackData; 3],
    pub uses_remaining: u32,
}

impl Powerup {
    pub fn pipe(id: ItemId, uses: u32) -> Self {
        Self {
            id,
            attacks: [
                AttackData::new(20.0, 80.0, false),
                AttackData::new(20.0, 80.0, false),
                AttackData::new(30.0, 200.0, true),
            ],
            uses_remaining: uses,
        }
    }

    pub fn can_equip(&self) -> bool {
        self.uses_remaining > 0
    }

    /// Spends one use. Returns `true` when the weapon is now broken.
    pub fn consume(&mut self) -> bool {
        self.uses_remaining = self.uses_remaining.saturating_sub(1);
        self.uses_remaining == 0
    }
}

/// Item traffic the world has to mirror (hide, respawn, destroy sprites).
#[derive(Debug, Clone, PartialEq)]
pub enum ItemEvent {
    Equipped(ItemId),
    Dropped(Powerup),
    Broken(ItemId),
}

/// Breakable crate holding one item.
#[derive(Component, Debug, Clone, Default, PartialEq, Eq)]
pub struct Container {
    is_open: bool,
}

impl Container {
    pub fn can_be_opened(&self) -> bool {
        !self.is_open
    }

    /// Registers a hit. Returns `true` on the hit that breaks it open.
    pub fn hit(&mut self) -> bool {
        if self.is_open {
            return false;
        }
        self.is_open = true;
        true
    }
}

// ====== World ======

#[derive(Resource, Debug, Default)]
pub struct ItemIds(u64);

impl ItemIds {
    pub fn next(&mut self) -> ItemId {
        self.0 += 1;
        ItemId(self.0)
    }
}

/// An item on the floor, waiting to be picked up.
#[derive(Component, Debug, Clone)]
pub struct WorldItem {
    pub powerup: Powerup,
    pub at: Vec3,
}

/// What a crate drops once broken.
#[derive(Component, Debug, Clone)]
pub struct Stash(pub Powerup);

pub struct PickupsPlugin;

impl Plugin for PickupsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ItemIds>().add_systems(
            Update,
            (
                open_hit_crates.after(RaycastMeleeSet::Cast),
                (mirror_item_events, track_nearby_items)
                    .chain()
                    .after(forward_item_events),
            )
                .run_if(gameplay_running),
        );
    }
}

fn floor_transform(at: Vec3, height: f32) -> Transform {
    Transform::from_xyz(at.x, at.y + height * 0.5 + at.z * DEPTH_TO_SCREEN, -at.z)
}

pub fn spawn_world_item(commands: &mut Commands, powerup: Powerup, at: Vec3) -> Entity {
    let at = Vec3::new(at.x, 0.0, at.z);
    commands
        .spawn((
            WorldItem { powerup, at },
            Sprite::from_color(Color::srgb(0.55, 0.58, 0.62), ITEM_SIZE),
            floor_transform(at, ITEM_SIZE.y),
            GameplayRoot,
            Name::new("Pipe"),
        ))
        .id()
}

/// Crates are static ray targets on the container layer; nothing collides with them.
pub fn spawn_crate(commands: &mut Commands, powerup: Powerup, at: Vec3) -> Entity {
    commands
        .spawn((
            Container::default(),
            Stash(powerup),
            RigidBody::Static,
            Collider::rectangle(CRATE_SIZE.x, CRATE_SIZE.y),
            CollisionLayers::new(GameLayer::Container, LayerMask::NONE),
            Depth { z: at.z, velocity: 0.0 },
            Transform::from_xyz(at.x, CRATE_SIZE.y * 0.5, 0.0),
            GameplayRoot,
            Name::new("Crate"),
        ))
        .with_children(|c| {
            c.spawn((
                Sprite::from_color(Color::srgb(0.5, 0.33, 0.18), CRATE_SIZE),
                Transform::from_xyz(0.0, at.z * DEPTH_TO_SCREEN, -at.z),
            ));
        })
        .id()
}

/// Lays out a level's loose items and crates.
pub fn spawn_level_items(commands: &mut Commands, ids: &mut ItemIds, spawns: &[PowerupSpawn]) {
    for spawn in spawns {
        let powerup = Powerup::pipe(ids.next(), spawn.uses);
        let at = Vec3::new(spawn.x, 0.0, spawn.z);
        if spawn.in_container {
            spawn_crate(commands, powerup, at);
        } else {
            spawn_world_item(commands, powerup, at);
        }
    }
}

fn track_nearby_items(
    mut heroes: Query<(&mut Hero, &Position, &Depth)>,
    items: Query<&WorldItem>,
) {
    for (mut hero, pos, depth) in &mut heroes {
        if let Some(id) = hero.nearby_item_id() {
            if !items.iter().any(|item| item.powerup.id == id) {
                hero.clear_nearby_item(id);
            }
        }
        let here = body_position(pos, depth);
        let mut nearest: Option<(f32, &Powerup)> = None;
        for item in &items {
            let d = Vec2::new(item.at.x - here.x, item.at.z - here.z).length_squared();
            if d > PICKUP_RADIUS * PICKUP_RADIUS {
                hero.clear_nearby_item(item.powerup.id);
            } else if nearest.is_none_or(|(best, _)| d < best) {
                nearest = Some((d, &item.powerup));
            }
        }
        if let Some((_, powerup)) = nearest {
            hero.set_nearby_item(powerup.clone());
        }
    }
}

fn open_hit_crates(
    mut commands: Commands,
    mut hits: EventReader<MeleeRaycastHit>,
    mut heroes: Query<(&mut Hero, &mut AnimGraph, &mut RigFx, &Position, &LinearVelocity, &Depth)>,
    mut crates: Query<(&mut Container, &Stash, &Depth)>,
    transforms: Query<&Transform>,
) {
    for hit in hits.read() {
        let Ok((mut container, stash, crate_depth)) = crates.get_mut(hit.target) else {
            continue;
        };
        let Ok((mut hero, mut graph, mut fx, pos, vel, depth)) = heroes.get_mut(hit.attacker) else {
            continue;
        };
        let mut rig = EcsRig::new(&mut graph, &mut fx, body_position(pos, depth), body_velocity(vel, depth));
        if hero.hit_container(&mut rig, &mut container) {
            let x = transforms.get(hit.target).map_or(hit.point.x, |t| t.translation.x);
            debug!("crate {:?} broken open", hit.target);
            spawn_world_item(&mut commands, stash.0.clone(), Vec3::new(x, 0.0, crate_depth.z));
            commands.entity(hit.target).despawn();
        }
    }
}

fn mirror_item_events(
    mut commands: Commands,
    mut events: EventReader<HeroItemEvent>,
    items: Query<(Entity, &WorldItem)>,
) {
    for HeroItemEvent { event, at } in events.read() {
        match event {
            ItemEvent::Equipped(id) => {
                for (entity, item) in &items {
                    if item.powerup.id == *id {
                        commands.entity(entity).despawn();
                    }
                }
            }
            ItemEvent::Dropped(powerup) => {
                spawn_world_item(&mut commands, powerup.clone(), *at);
            }
            ItemEvent::Broken(id) => debug!("item {id:?} broke"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::HeroClass;

    #[test]
    fn powerup_breaks_on_last_use() {
        let mut p = Powerup::pipe(ItemId(1), 2);
        assert!(p.can_equip());
        assert!(!p.consume());
        assert!(p.consume());
        assert!(!p.can_equip());
        assert!(p.consume());
    }

    #[test]
    fn container_opens_once() {
        let mut c = Container::default();
        assert!(c.can_be_opened());
        assert!(c.hit());
        assert!(!c.hit());
        assert!(!c.can_be_opened());
    }

    fn item_app() -> App {
        let mut app = App::new();
        app.add_event::<HeroItemEvent>()
            .add_systems(Update, mirror_item_events);
        app
    }

    fn world_items(app: &mut App) -> Vec<ItemId> {
        let mut q = app.world_mut().query::<&WorldItem>();
        q.iter(app.world()).map(|i| i.powerup.id).collect()
    }

    #[test]
    fn equipping_removes_the_floor_item() {
        let mut app = item_app();
        app.world_mut().spawn(WorldItem {
            powerup: Powerup::pipe(ItemId(3), 2),
            at: Vec3::ZERO,
        });
        assert_eq!(world_items(&mut app), vec![ItemId(3)]);

        app.world_mut().send_event(HeroItemEvent {
            event: ItemEvent::Equipped(ItemId(3)),
            at: Vec3::ZERO,
        });
        app.update();
        assert!(world_items(&mut app).is_empty());
    }

    #[test]
    fn dropping_puts_the_weapon_back_on_the_floor() {
        let mut app = item_app();
        app.world_mut().send_event(HeroItemEvent {
            event: ItemEvent::Dropped(Powerup::pipe(ItemId(9), 1)),
            at: Vec3::new(4.0, 0.8, 1.0),
        });
        app.update();

        let mut q = app.world_mut().query::<&WorldItem>();
        let items: Vec<_> = q.iter(app.world()).cloned().collect();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].powerup.id, ItemId(9));
        assert_eq!(items[0].at, Vec3::new(4.0, 0.0, 1.0));
    }

    #[test]
    fn picked_up_item_is_forgotten_once_it_leaves_the_floor() {
        let mut app = App::new();
        app.add_event::<HeroItemEvent>()
            .add_systems(Update, (mirror_item_events, track_nearby_items).chain());
        let hero = app
            .world_mut()
            .spawn((
                Hero::new(&HeroClass::default()),
                Position::default(),
                Depth::default(),
            ))
            .id();
        app.world_mut().spawn(WorldItem {
            powerup: Powerup::pipe(ItemId(3), 2),
            at: Vec3::ZERO,
        });
        app.update();
        let nearby = |app: &App| app.world().get::<Hero>(hero).and_then(|h| h.nearby_item_id());
        assert_eq!(nearby(&app), Some(ItemId(3)));

        app.world_mut().send_event(HeroItemEvent {
            event: ItemEvent::Equipped(ItemId(3)),
            at: Vec3::ZERO,
        });
        app.update();
        assert!(world_items(&mut app).is_empty());
        assert_eq!(nearby(&app), None);
    }

    #[test]
    fn item_ids_count_up() {
        let mut ids = ItemIds::default();
        assert_eq!(ids.next(), ItemId(1));
        assert_eq!(ids.next(), ItemId(2));
    }
}
