// wave.rs
//! Level data, battle-event progress and the campaign counter.

use bevy::prelude::*;
use log::info;
use serde::Deserialize;

use crate::combat::EnemyKind;

/// Distance from an event's column at which the camera triggers it.
pub const EVENT_TRIGGER_DISTANCE: f32 = 0.2;

// ====== Level data ======

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EnemySpawn {
    pub kind: EnemyKind,
    /// Index into the stage's spawn rows (depth lanes).
    pub row: usize,
    /// Horizontal offset in camera half-widths; -1 is the left edge.
    pub offset: f32,
    pub tint: Option<[f32; 3]>,
}

impl Default for EnemySpawn {
    fn default() -> Self {
        Self {
            kind: EnemyKind::Robot,
            row: 0,
            offset: 1.0,
            tint: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct BattleEvent {
    pub column: f32,
    pub enemies: Vec<EnemySpawn>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PowerupSpawn {
    pub x: f32,
    pub z: f32,
    pub uses: u32,
    /// Crate that has to be broken open first.
    pub in_container: bool,
}

impl Default for PowerupSpawn {
    fn default() -> Self {
        Self {
            x: 8.0,
            z: 0.0,
            uses: 6,
            in_container: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LevelData {
    pub name: String,
    pub battle_events: Vec<BattleEvent>,
    pub powerups: Vec<PowerupSpawn>,
}

impl Default for LevelData {
    fn default() -> Self {
        Self {
            name: "STAGE 1".to_string(),
            battle_events: vec![
                BattleEvent {
                    column: 12.0,
                    enemies: vec![
                        EnemySpawn { row: 0, offset: 1.0, ..Default::default() },
                        EnemySpawn { row: 2, offset: -1.0, ..Default::default() },
                    ],
                },
                BattleEvent {
                    column: 30.0,
                    enemies: vec![
                        EnemySpawn { row: 1, offset: 1.0, ..Default::default() },
                        EnemySpawn { row: 3, offset: 1.0, ..Default::default() },
                        EnemySpawn { row: 0, offset: -1.0, ..Default::default() },
                    ],
                },
                BattleEvent {
                    column: 54.0,
                    enemies: vec![EnemySpawn {
                        kind: EnemyKind::Boss,
                        row: 1,
                        offset: 1.0,
                        tint: None,
                    }],
                },
            ],
            powerups: vec![PowerupSpawn::default()],
        }
    }
}

/// Payload handed back by the hero's walker when a scripted walk ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageCue {
    IntroFinished,
    WalkoutFinished,
}

// ====== Battle-event progress ======

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveProgress {
    /// Event cleared, more events ahead: show GO.
    MoreAhead,
    /// Last event cleared: the hero walks out.
    LevelCleared,
}

/// Live enemy count and the position in the level's event list.
#[derive(Resource, Debug, Clone, Default)]
pub struct WaveTracker {
    live_enemies: u32,
    next_event: usize,
    active: Option<BattleEvent>,
    has_remaining: bool,
}

impl WaveTracker {
    pub fn load(&mut self, level: &LevelData) {
        *self = Self {
            has_remaining: !level.battle_events.is_empty(),
            ..Default::default()
        };
    }

    pub fn register_enemy(&mut self) {
        self.live_enemies += 1;
    }

    pub fn enemy_died(&mut self) {
        self.live_enemies = self.live_enemies.saturating_sub(1);
    }

    pub fn live_enemies(&self) -> u32 {
        self.live_enemies
    }

    pub fn active_event(&self) -> Option<&BattleEvent> {
        self.active.as_ref()
    }

    pub fn has_remaining_events(&self) -> bool {
        self.has_remaining
    }

    /// Starts the next event when the camera reaches its column.
    pub fn poll(&mut self, level: &LevelData, camera_x: f32) -> Option<BattleEvent> {
        if self.active.is_some() || !self.has_remaining {
            return None;
        }
        let event = level.battle_events.get(self.next_event)?;
        if (event.column - camera_x).abs() >= EVENT_TRIGGER_DISTANCE {
            return None;
        }
        self.next_event += 1;
        self.live_enemies = 0;
        self.active = Some(event.clone());
        info!(
            "battle event {} started at column {}",
            self.next_event, event.column
        );
        Some(event.clone())
    }

    /// Completes the active event once every enemy in it is gone.
    pub fn update(&mut self, level: &LevelData) -> Option<WaveProgress> {
        if self.active.is_none() || self.live_enemies > 0 {
            return None;
        }
        self.active = None;
        self.has_remaining = level.battle_events.len() > self.next_event;
        Some(if self.has_remaining {
            WaveProgress::MoreAhead
        } else {
            WaveProgress::LevelCleared
        })
    }
}

// ====== Campaign ======

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignStep {
    NextLevel(usize),
    Victory,
}

#[derive(Resource, Debug, Clone, Default)]
pub struct Campaign {
    current_level: usize,
    level_count: usize,
}

impl Campaign {
    pub fn new(level_count: usize) -> Self {
        Self {
            current_level: 0,
            level_count,
        }
    }

    pub fn current_level(&self) -> usize {
        self.current_level
    }

    pub fn advance(&mut self) -> CampaignStep {
        self.current_level += 1;
        if self.current_level >= self.level_count {
            CampaignStep::Victory
        } else {
            CampaignStep::NextLevel(self.current_level)
        }
    }

    pub fn reset(&mut self) {
        self.current_level = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level() -> LevelData {
        LevelData {
            name: "TEST".into(),
            battle_events: vec![
                BattleEvent { column: 5.0, enemies: vec![EnemySpawn::default(); 2] },
                BattleEvent { column: 20.0, enemies: vec![EnemySpawn::default()] },
            ],
            powerups: Vec::new(),
        }
    }

    #[test]
    fn events_start_near_their_column() {
        let lvl = level();
        let mut t = WaveTracker::default();
        t.load(&lvl);
        assert!(t.poll(&lvl, 4.5).is_none());
        let ev = t.poll(&lvl, 4.9).expect("event should start");
        assert_eq!(ev.enemies.len(), 2);
        // already active
        assert!(t.poll(&lvl, 5.0).is_none());
    }

    #[test]
    fn event_completes_when_enemies_are_gone() {
        let lvl = level();
        let mut t = WaveTracker::default();
        t.load(&lvl);
        t.poll(&lvl, 5.0);
        t.register_enemy();
        t.register_enemy();
        assert_eq!(t.update(&lvl), None);
        t.enemy_died();
        t.enemy_died();
        assert_eq!(t.update(&lvl), Some(WaveProgress::MoreAhead));
        assert_eq!(t.update(&lvl), None);

        t.poll(&lvl, 20.1);
        t.register_enemy();
        t.enemy_died();
        assert_eq!(t.update(&lvl), Some(WaveProgress::LevelCleared));
        assert!(!t.has_remaining_events());
        assert!(t.poll(&lvl, 20.0).is_none());
    }

    #[test]
    fn live_count_never_goes_negative() {
        let mut t = WaveTracker::default();
        t.enemy_died();
        assert_eq!(t.live_enemies(), 0);
        t.register_enemy();
        t.enemy_died();
        t.enemy_died();
        assert_eq!(t.live_enemies(), 0);
    }

    #[test]
    fn empty_level_has_no_events() {
        let lvl = LevelData { battle_events: Vec::new(), ..level() };
        let mut t = WaveTracker::default();
        t.load(&lvl);
        assert!(!t.has_remaining_events());
        assert!(t.poll(&lvl, 0.0).is_none());
    }

    #[test]
    fn campaign_declares_victory_after_last_level() {
        let mut c = Campaign::new(2);
        assert_eq!(c.advance(), CampaignStep::NextLevel(1));
        assert_eq!(c.advance(), CampaignStep::Victory);
        c.reset();
        assert_eq!(c.current_level(), 0);
    }

    #[test]
    fn level_data_parses_partial_json() {
        let lvl: LevelData = serde_json::from_str(
            r#"{ "name": "DOCKS", "battle_events": [ { "column": 3.0, "enemies": [ { "kind": "Boss" } ] } ] }"#,
        )
        .unwrap();
        assert_eq!(lvl.name, "DOCKS");
        assert_eq!(lvl.battle_events[0].enemies[0].kind, EnemyKind::Boss);
        assert_eq!(lvl.battle_events[0].enemies[0].offset, 1.0);
        assert!(lvl.powerups.len() == 1);
    }
}
