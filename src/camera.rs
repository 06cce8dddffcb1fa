use glam::{DVec3, Mat4, Vec3, Vec4};

/// Clip planes of a perspective view, expressed relative to the eye.
///
/// Only the four side planes are kept. Terrain is never culled by distance or
/// by the near plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    planes: [Vec4; 4],
    bounded: bool,
}

impl Frustum {
    /// A frustum that contains everything.
    pub fn unbounded() -> Self {
        Self {
            planes: [Vec4::ZERO; 4],
            bounded: false,
        }
    }

    /// Extracts the left, right, bottom and top planes of an eye-relative
    /// view projection.
    pub fn from_view_projection(view_proj: Mat4) -> Self {
        let r0 = view_proj.row(0);
        let r1 = view_proj.row(1);
        let r3 = view_proj.row(3);
        let raw = [r3 + r0, r3 - r0, r3 + r1, r3 - r1];

        let planes = raw.map(|p| {
            let len = p.truncate().length();
            if len > 0.0 {
                p / len
            } else {
                p
            }
        });
        Self {
            planes,
            bounded: true,
        }
    }

    /// True if any part of the sphere is inside.
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        if !self.bounded {
            return true;
        }
        self.planes
            .iter()
            .all(|p| p.truncate().dot(center) + p.w >= -radius)
    }
}

/// The viewpoint patches are culled and LOD-selected against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainCamera {
    pub position_global: DVec3,
    frustum: Frustum,
}

impl TerrainCamera {
    /// A camera at `position_global` that sees in every direction.
    pub fn omnidirectional(position_global: DVec3) -> Self {
        Self {
            position_global,
            frustum: Frustum::unbounded(),
        }
    }

    /// A Z-up perspective camera looking along `forward`.
    pub fn looking(position_global: DVec3, forward: Vec3, fov_y_radians: f32, aspect: f32, near: f32) -> Self {
        let forward = forward.try_normalize().unwrap_or(Vec3::X);
        let up = if forward.cross(Vec3::Z).length_squared() < 1.0e-6 {
            Vec3::Y
        } else {
            Vec3::Z
        };
        let view = Mat4::look_at_rh(Vec3::ZERO, forward, up);
        let proj = Mat4::perspective_rh(fov_y_radians, aspect, near, 1.0e6);
        Self {
            position_global,
            frustum: Frustum::from_view_projection(proj * view),
        }
    }

    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    /// Sphere test with the centre given in global coordinates.
    pub fn sphere_visible(&self, center_global: DVec3, radius: f32) -> bool {
        let rel = (center_global - self.position_global).as_vec3();
        self.frustum.intersects_sphere(rel, radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_sphere_is_visible_and_behind_is_not() {
        let cam = TerrainCamera::looking(DVec3::new(100.0, 100.0, 50.0), Vec3::X, 1.0, 1.0, 0.5);
        assert!(cam.sphere_visible(DVec3::new(400.0, 100.0, 50.0), 1.0));
        assert!(!cam.sphere_visible(DVec3::new(-400.0, 100.0, 50.0), 1.0));
        // Far away but straight ahead stays visible.
        assert!(cam.sphere_visible(DVec3::new(1.0e7, 100.0, 50.0), 1.0));
    }

    #[test]
    fn large_radius_reaches_across_a_plane() {
        let cam = TerrainCamera::looking(DVec3::ZERO, Vec3::X, 1.0, 1.0, 0.5);
        assert!(cam.sphere_visible(DVec3::new(-5.0, 0.0, 0.0), 10.0));
    }

    #[test]
    fn spheres_inside_the_near_distance_are_kept() {
        let cam = TerrainCamera::looking(DVec3::ZERO, Vec3::X, 1.0, 1.0, 0.5);
        assert!(cam.sphere_visible(DVec3::new(0.1, 0.0, 0.0), 0.01));
        assert!(cam.frustum().intersects_sphere(Vec3::new(0.05, 0.0, 0.0), 0.0));
        // Still culled off to the side.
        assert!(!cam.sphere_visible(DVec3::new(0.1, 5.0, 0.0), 0.01));
    }

    #[test]
    fn omnidirectional_sees_everything() {
        let cam = TerrainCamera::omnidirectional(DVec3::ZERO);
        assert!(cam.sphere_visible(DVec3::new(-1.0e5, 3.0, -7.0), 0.0));
    }
}
