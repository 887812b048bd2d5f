// prelude.rs
//! Engine-side imports shared by the ECS modules.

pub use avian2d::prelude::*;
pub use bevy::prelude::*;
pub use bevy_spritesheet_animation::prelude::*;
pub use leafwing_input_manager::prelude::*;
