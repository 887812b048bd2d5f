// walker.rs
use std::collections::VecDeque;

use bevy::math::Vec3;
use log::debug;

use crate::actor::Actor;
use crate::navigation::NavigationProvider;
use crate::rig::{ActorRig, AnimFloat, Facing};

/// Squared distance at which a corner counts as reached.
pub const ARRIVAL_RADIUS_SQ: f32 = 0.6;

/// Follows a corner path one physics step at a time. `H` is the completion
/// payload handed back exactly once when the last corner is reached.
#[derive(Debug, Clone)]
pub struct Walker<H = ()> {
    corners: VecDeque<Vec3>,
    on_complete: Option<H>,
    speed: f32,
    current_speed: f32,
}

impl<H> Default for Walker<H> {
    fn default() -> Self {
        Self {
            corners: VecDeque::new(),
            on_complete: None,
            speed: 0.0,
            current_speed: 0.0,
        }
    }
}

impl<H> Walker<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plans a path and replaces the current one. On failure the walker is
    /// left untouched and `false` is returned.
    pub fn move_to(
        &mut self,
        nav: &dyn NavigationProvider,
        from: Vec3,
        target: Vec3,
        speed: f32,
        on_complete: Option<H>,
    ) -> bool {
        let Some(path) = nav.calculate_path(from, target) else {
            debug!("walker: no path from {from} to {target}");
            return false;
        };
        self.corners = path.into();
        self.on_complete = on_complete;
        self.speed = speed;
        true
    }

    pub fn stop(&mut self) {
        self.corners.clear();
        self.on_complete = None;
        self.current_speed = 0.0;
    }

    pub fn is_walking(&self) -> bool {
        !self.corners.is_empty()
    }

    pub fn remaining_corners(&self) -> usize {
        self.corners.len()
    }

    /// Final corner of the current path.
    pub fn destination(&self) -> Option<Vec3> {
        self.corners.back().copied()
    }

    pub fn current_speed(&self) -> f32 {
        self.current_speed
    }

    /// One physics step along the path. Returns the completion payload on
    /// the step that consumes the last corner.
    pub fn fixed_tick(
        &mut self,
        dt: f32,
        actor: &mut Actor,
        can_walk: bool,
        rig: &mut dyn ActorRig,
    ) -> Option<H> {
        let mut arrived = None;
        if can_walk {
            if let Some(&corner) = self.corners.front() {
                let next = move_towards(rig.position(), corner, dt * self.speed);
                rig.move_position(next);
                if next.distance_squared(corner) < ARRIVAL_RADIUS_SQ {
                    self.corners.pop_front();
                }

                match self.corners.front() {
                    Some(&ahead) => {
                        self.current_speed = self.speed;
                        actor.flip(Facing::from_left(next.x - ahead.x >= 0.0), rig);
                    }
                    None => {
                        self.current_speed = 0.0;
                        arrived = self.on_complete.take();
                    }
                }
            }
        }
        rig.set_float(AnimFloat::Speed, self.current_speed);
        arrived
    }
}

fn move_towards(current: Vec3, target: Vec3, max_step: f32) -> Vec3 {
    let delta = target - current;
    let dist = delta.length();
    if dist <= max_step || dist <= f32::EPSILON {
        target
    } else {
        current + delta / dist * max_step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::{AttackData, Team};
    use crate::navigation::{FloorRect, StageNavigator};
    use crate::rig::testing::FakeRig;

    fn nav() -> StageNavigator {
        StageNavigator {
            floor: FloorRect::new(-50.0, 50.0, -5.0, 5.0),
            blockers: Vec::new(),
        }
    }

    fn actor() -> Actor {
        Actor::new(Team::Enemy, 100.0, AttackData::default())
    }

    #[test]
    fn failed_plan_keeps_previous_state() {
        let mut w: Walker<u32> = Walker::new();
        assert!(w.move_to(&nav(), Vec3::ZERO, Vec3::new(5.0, 0.0, 0.0), 2.0, Some(7)));
        assert!(!w.move_to(&nav(), Vec3::ZERO, Vec3::new(500.0, 0.0, 0.0), 2.0, Some(8)));
        assert_eq!(w.remaining_corners(), 2);
        assert_eq!(w.on_complete, Some(7));
    }

    #[test]
    fn walks_to_target_and_fires_once() {
        let mut w: Walker<&str> = Walker::new();
        let mut a = actor();
        let mut rig = FakeRig::new();
        let target = Vec3::new(-3.0, 0.0, 1.0);
        assert!(w.move_to(&nav(), rig.position, target, 2.0, Some("done")));

        let mut fired = Vec::new();
        for _ in 0..200 {
            if let Some(cue) = w.fixed_tick(0.02, &mut a, true, &mut rig) {
                fired.push(cue);
            }
        }
        assert_eq!(fired, vec!["done"]);
        assert!(!w.is_walking());
        assert!(rig.position.distance_squared(target) < ARRIVAL_RADIUS_SQ);
        assert_eq!(rig.speed, 0.0);
        assert_eq!(a.facing(), Facing::Left);
    }

    #[test]
    fn blocked_walker_never_completes_and_keeps_its_path() {
        let mut w: Walker<u8> = Walker::new();
        let mut a = actor();
        let mut rig = FakeRig::new();
        assert!(w.move_to(&nav(), Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0), 2.0, Some(3)));
        for _ in 0..500 {
            assert_eq!(w.fixed_tick(0.1, &mut a, false, &mut rig), None);
        }
        assert_eq!(rig.position, Vec3::ZERO);
        assert_eq!(w.remaining_corners(), 2);

        let fired: Vec<u8> = (0..100)
            .filter_map(|_| w.fixed_tick(0.1, &mut a, true, &mut rig))
            .collect();
        assert_eq!(fired, vec![3]);
    }

    #[test]
    fn unreachable_target_leaves_fresh_walker_idle() {
        let mut w: Walker<u8> = Walker::new();
        let mut a = actor();
        let mut rig = FakeRig::new();
        assert!(!w.move_to(&nav(), Vec3::ZERO, Vec3::new(0.0, 0.0, 40.0), 2.0, Some(1)));
        assert_eq!(w.remaining_corners(), 0);
        assert!(!w.is_walking());
        assert_eq!(w.fixed_tick(0.1, &mut a, true, &mut rig), None);
        assert_eq!(rig.position, Vec3::ZERO);
    }

    #[test]
    fn stop_drops_path_and_callback() {
        let mut w: Walker<u8> = Walker::new();
        let mut a = actor();
        let mut rig = FakeRig::new();
        w.move_to(&nav(), Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0), 2.0, Some(1));
        w.fixed_tick(0.1, &mut a, true, &mut rig);
        w.stop();
        assert!(!w.is_walking());
        assert_eq!(w.fixed_tick(0.1, &mut a, true, &mut rig), None);
        assert_eq!(rig.speed, 0.0);
    }

    #[test]
    fn faces_next_corner() {
        let mut w: Walker = Walker::new();
        let mut a = actor();
        let mut rig = FakeRig::new();
        w.move_to(&nav(), Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), 1.0, None);
        w.fixed_tick(0.1, &mut a, true, &mut rig);
        assert_eq!(a.facing(), Facing::Right);
        assert_eq!(rig.speed, 1.0);
    }
}
