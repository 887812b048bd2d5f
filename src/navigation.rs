// navigation.rs
use bevy::prelude::*;

/// Path query used by walkers. Returns the corner points from `from` to `to`
/// inclusive, or `None` when no path exists.
pub trait NavigationProvider {
    fn calculate_path(&self, from: Vec3, to: Vec3) -> Option<Vec<Vec3>>;
}

/// Axis-aligned rectangle on the floor plane (x = scroll, z = depth).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloorRect {
    pub min_x: f32,
    pub max_x: f32,
    pub min_z: f32,
    pub max_z: f32,
}

impl FloorRect {
    pub fn new(min_x: f32, max_x: f32, min_z: f32, max_z: f32) -> Self {
        Self {
            min_x: min_x.min(max_x),
            max_x: max_x.max(min_x),
            min_z: min_z.min(max_z),
            max_z: max_z.max(min_z),
        }
    }

    pub fn contains(&self, p: Vec3) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.z >= self.min_z && p.z <= self.max_z
    }

    /// Slab test of the floor-plane segment `a -> b` against the rectangle.
    pub fn intersects_segment(&self, a: Vec3, b: Vec3) -> bool {
        let (mut t0, mut t1) = (0.0f32, 1.0f32);
        let d = b - a;
        for (origin, delta, lo, hi) in [
            (a.x, d.x, self.min_x, self.max_x),
            (a.z, d.z, self.min_z, self.max_z),
        ] {
            if delta.abs() < f32::EPSILON {
                if origin < lo || origin > hi {
                    return false;
                }
                continue;
            }
            let (mut near, mut far) = ((lo - origin) / delta, (hi - origin) / delta);
            if near > far {
                std::mem::swap(&mut near, &mut far);
            }
            t0 = t0.max(near);
            t1 = t1.min(far);
            if t0 > t1 {
                return false;
            }
        }
        true
    }
}

/// Walkable stage floor with rectangular obstacles. Straight-line paths only:
/// a goal behind an obstacle is unreachable.
#[derive(Resource, Debug, Clone)]
pub struct StageNavigator {
    pub floor: FloorRect,
    pub blockers: Vec<FloorRect>,
}

impl Default for StageNavigator {
    fn default() -> Self {
        Self {
            floor: FloorRect::new(-10.0, 200.0, -3.0, 3.0),
            blockers: Vec::new(),
        }
    }
}

impl NavigationProvider for StageNavigator {
    fn calculate_path(&self, from: Vec3, to: Vec3) -> Option<Vec<Vec3>> {
        // corners stay at the walker's height; only x/z are planned
        let goal = Vec3::new(to.x, from.y, to.z);
        if !self.floor.contains(goal) {
            return None;
        }
        if self
            .blockers
            .iter()
            .any(|b| b.contains(goal) || b.intersects_segment(from, goal))
        {
            return None;
        }
        Some(vec![from, goal])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nav() -> StageNavigator {
        StageNavigator {
            floor: FloorRect::new(0.0, 50.0, -2.0, 2.0),
            blockers: vec![FloorRect::new(10.0, 12.0, -0.5, 0.5)],
        }
    }

    #[test]
    fn straight_path_keeps_height() {
        let path = nav().calculate_path(Vec3::new(1.0, 0.8, 0.0), Vec3::new(5.0, 0.0, 1.0));
        assert_eq!(
            path,
            Some(vec![Vec3::new(1.0, 0.8, 0.0), Vec3::new(5.0, 0.8, 1.0)])
        );
    }

    #[test]
    fn off_floor_goal_fails() {
        assert!(nav().calculate_path(Vec3::ZERO, Vec3::new(60.0, 0.0, 0.0)).is_none());
        assert!(nav().calculate_path(Vec3::ZERO, Vec3::new(5.0, 0.0, 3.0)).is_none());
    }

    #[test]
    fn blockers_cut_paths() {
        let n = nav();
        assert!(n.calculate_path(Vec3::new(1.0, 0.0, 0.0), Vec3::new(11.0, 0.0, 0.0)).is_none());
        assert!(n.calculate_path(Vec3::new(1.0, 0.0, 0.0), Vec3::new(20.0, 0.0, 0.0)).is_none());
        // passing in front of the obstacle is fine
        assert!(n.calculate_path(Vec3::new(1.0, 0.0, 1.5), Vec3::new(20.0, 0.0, 1.5)).is_some());
    }
}
