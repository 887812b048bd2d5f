// class.rs
//! Tuning file for the hero, both enemy archetypes, the stage and its levels.
//! Every field has a default so a partial (or missing) file still plays.

use std::path::Path;

use crate::combat::AttackData;
use crate::prelude::*;
use log::{info, warn};
use crate::wave::LevelData;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassError {
    #[error("failed to read class file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid class file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Deserialize, Resource)]
#[serde(default)]
pub struct ClassFile {
    pub hero: HeroClass,
    pub robot: EnemyClass,
    pub boss: EnemyClass,
    pub stage: StageClass,
    pub levels: Vec<LevelData>,
}

impl Default for ClassFile {
    fn default() -> Self {
        Self {
            hero: HeroClass::default(),
            robot: EnemyClass::default(),
            boss: EnemyClass::boss(),
            stage: StageClass::default(),
            levels: vec![LevelData::default()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HeroClass {
    pub display_name: String,
    pub max_life: f32,
    pub walk_speed: f32,
    pub run_speed: f32,
    pub jump_force: f32,
    pub hurt_limit: f32,
    pub recovery_rate: f32,
    pub chain_combo_limit: f32,
    pub run_attack_force: f32,
    pub normal_attacks: [AttackData; 3],
    pub jump_attack: AttackData,
    pub run_attack: AttackData,
}

impl Default for HeroClass {
    fn default() -> Self {
        Self {
            display_name: "Hero".to_string(),
            max_life: 100.0,
            walk_speed: 2.0,
            run_speed: 5.0,
            jump_force: 1750.0,
            hurt_limit: 20.0,
            recovery_rate: 5.0,
            chain_combo_limit: 0.3,
            run_attack_force: 1.8,
            normal_attacks: [
                AttackData::new(10.0, 50.0, false),
                AttackData::new(10.0, 50.0, false),
                AttackData::new(15.0, 150.0, true),
            ],
            jump_attack: AttackData::new(15.0, 100.0, true),
            run_attack: AttackData::new(15.0, 150.0, true),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnemyClass {
    pub display_name: String,
    pub max_life: f32,
    pub speed: f32,
    pub attack_reach_min: f32,
    pub attack_reach_max: f32,
    pub personal_space: f32,
    pub detect_radius: f32,
    pub stop_movement_when_hit: bool,
    pub normal_attack: AttackData,
}

impl Default for EnemyClass {
    fn default() -> Self {
        Self {
            display_name: "Robot".to_string(),
            max_life: 50.0,
            speed: 1.5,
            attack_reach_min: 0.5,
            attack_reach_max: 1.5,
            personal_space: 1.2,
            detect_radius: 12.0,
            stop_movement_when_hit: true,
            normal_attack: AttackData::new(8.0, 40.0, false),
        }
    }
}

impl EnemyClass {
    pub fn boss() -> Self {
        Self {
            display_name: "Boss".to_string(),
            max_life: 250.0,
            speed: 1.2,
            attack_reach_max: 1.8,
            personal_space: 1.5,
            stop_movement_when_hit: false,
            normal_attack: AttackData::new(20.0, 120.0, true),
            ..Self::default()
        }
    }
}

/// Stage geometry in world units (x = scroll, z = depth).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StageClass {
    pub min_visible_x: f32,
    pub max_visible_x: f32,
    pub floor_min_z: f32,
    pub floor_max_z: f32,
    /// Depth lanes enemies spawn on.
    pub spawn_rows: Vec<f32>,
}

impl Default for StageClass {
    fn default() -> Self {
        Self {
            min_visible_x: 0.0,
            max_visible_x: 72.0,
            floor_min_z: -2.0,
            floor_max_z: 2.0,
            spawn_rows: vec![-1.5, -0.5, 0.5, 1.5],
        }
    }
}

pub fn load_class_file(path: impl AsRef<Path>) -> Result<ClassFile, ClassError> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|source| ClassError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_class_file(&json, &path.display().to_string())
}

pub fn parse_class_file(json: &str, path: &str) -> Result<ClassFile, ClassError> {
    serde_json::from_str(json).map_err(|source| ClassError::Parse {
        path: path.to_string(),
        source,
    })
}

// ====== Plugin ======

#[derive(Resource, Clone)]
pub struct ClassPluginConfig {
    pub path: String,
}

pub struct ClassPlugin {
    config: ClassPluginConfig,
}

impl ClassPlugin {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            config: ClassPluginConfig { path: path.into() },
        }
    }
}

impl Plugin for ClassPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(self.config.clone())
            .add_systems(PreStartup, load_class_from_json);
    }
}

fn load_class_from_json(mut commands: Commands, cfg: Res<ClassPluginConfig>) {
    let class_file = match load_class_file(&cfg.path) {
        Ok(file) => {
            info!("ClassPlugin: loaded {}", cfg.path);
            file
        }
        Err(e) => {
            warn!("ClassPlugin: {e}; using built-in defaults");
            ClassFile::default()
        }
    };
    commands.insert_resource(class_file);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let file = parse_class_file("{}", "test.json").unwrap();
        assert_eq!(file.hero.hurt_limit, 20.0);
        assert_eq!(file.hero.chain_combo_limit, 0.3);
        assert_eq!(file.boss.display_name, "Boss");
        assert_eq!(file.levels.len(), 1);
        assert_eq!(file.stage.spawn_rows.len(), 4);
    }

    #[test]
    fn partial_override_keeps_other_fields() {
        let file = parse_class_file(
            r#"{ "hero": { "walk_speed": 3.0 }, "robot": { "max_life": 80.0 } }"#,
            "test.json",
        )
        .unwrap();
        assert_eq!(file.hero.walk_speed, 3.0);
        assert_eq!(file.hero.run_speed, 5.0);
        assert_eq!(file.robot.max_life, 80.0);
        assert!(file.robot.stop_movement_when_hit);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = parse_class_file("{ not json", "bad.json").unwrap_err();
        assert!(matches!(err, ClassError::Parse { .. }));
        assert!(err.to_string().contains("bad.json"));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = load_class_file("does/not/exist.json").unwrap_err();
        assert!(matches!(err, ClassError::Read { .. }));
    }
}
