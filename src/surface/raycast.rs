use glam::{Vec2, Vec3};

use super::Surface;

/// Refinement stops once the bracket is this small, in meters.
const HIT_TOLERANCE: f32 = 0.001;
const MAX_REFINE_STEPS: u32 = 64;

impl Surface {
    /// First point where the segment from `start` to `end` (region space)
    /// enters the ground, with the surface normal there.
    ///
    /// The segment is marched one meter of horizontal travel at a time and a
    /// crossing is then bisected. A segment starting below the ground never
    /// hits.
    pub fn line_segment_intersect(&self, start: Vec3, end: Vec3) -> Option<(Vec3, Vec3)> {
        let delta = end - start;
        let planar = Vec2::new(delta.x, delta.y).length();
        let step = if planar > HIT_TOLERANCE { (1.0 / planar).min(1.0) } else { 1.0 };

        let ground = |p: Vec3| self.resolve_height_region(p.x, p.y);
        if ground(start) > start.z {
            return None;
        }

        let mut above = 0.0f32;
        let mut t = 0.0f32;
        loop {
            let point = start + delta * t;
            if ground(point) > point.z {
                return Some(self.refine_hit(start, delta, above, t));
            }
            if t >= 1.0 {
                return None;
            }
            above = t;
            t = (t + step).min(1.0);
        }
    }

    fn refine_hit(&self, start: Vec3, delta: Vec3, mut above: f32, mut below: f32) -> (Vec3, Vec3) {
        let length = delta.length();
        let mut point = start + delta * below;
        for _ in 0..MAX_REFINE_STEPS {
            if (below - above) * length <= HIT_TOLERANCE {
                break;
            }
            let mid = 0.5 * (above + below);
            point = start + delta * mid;
            let height = self.resolve_height_region(point.x, point.y);
            if (point.z - height).abs() < HIT_TOLERANCE {
                break;
            }
            if height > point.z {
                below = mid;
            } else {
                above = mid;
            }
        }

        point.z = self.resolve_height_region(point.x, point.y);
        (point, self.grid.resolve_normal_region(point.x, point.y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TerrainSettings;
    use glam::DVec3;

    fn sloped() -> Surface {
        let mut surface = Surface::new(17, 16, DVec3::ZERO, 16.0, &TerrainSettings::default()).unwrap();
        for y in 0..17 {
            for x in 0..17 {
                surface.grid_mut().set_z(x, y, 10.0);
            }
        }
        surface
    }

    #[test]
    fn downward_segment_hits_the_plateau() {
        let surface = sloped();
        let (hit, normal) = surface
            .line_segment_intersect(Vec3::new(2.0, 2.0, 30.0), Vec3::new(12.0, 12.0, 0.0))
            .unwrap();
        assert!((hit.z - 10.0).abs() < 1e-3);
        // Two thirds of the way down the drop of 30.
        assert!((hit.x - (2.0 + 10.0 * 20.0 / 30.0)).abs() < 0.01);
        assert!((normal - Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn starting_underground_misses() {
        let surface = sloped();
        assert!(surface
            .line_segment_intersect(Vec3::new(2.0, 2.0, 5.0), Vec3::new(12.0, 12.0, 50.0))
            .is_none());
    }

    #[test]
    fn segment_above_ground_misses() {
        let surface = sloped();
        assert!(surface
            .line_segment_intersect(Vec3::new(1.0, 1.0, 20.0), Vec3::new(15.0, 3.0, 11.0))
            .is_none());
    }

    #[test]
    fn vertical_drop_hits() {
        let surface = sloped();
        let (hit, _) = surface
            .line_segment_intersect(Vec3::new(5.0, 5.0, 40.0), Vec3::new(5.0, 5.0, -40.0))
            .unwrap();
        assert!((hit.z - 10.0).abs() < 1e-3);
    }
}
