mod common;

use common::*;
use glam::{DVec3, Mat4, Vec3};
use meshi_terrain::{Direction, Terrain, TerrainCamera, TerrainSettings};

fn prepared(settings: TerrainSettings) -> (Terrain, meshi_terrain::SurfaceId) {
    let mut terrain = Terrain::new(settings);
    let id = surface(&mut terrain, 65, 16, DVec3::ZERO);
    for patch in terrain.patch_refs(id).unwrap() {
        terrain.update_vertical_stats(patch);
    }
    (terrain, id)
}

#[test]
fn stride_grows_with_distance_in_powers_of_two() {
    let (mut terrain, id) = prepared(TerrainSettings::default());
    let patch = patch_ref(&terrain, id, 0, 0);

    let mut last = 0;
    let mut seen = Vec::new();
    for step in 0..400 {
        let distance = step as f64 * 25.0;
        let camera = TerrainCamera::omnidirectional(DVec3::new(8.0 + distance, 8.0, 0.0));
        terrain.update_visibility(patch, &camera);

        let own = terrain.patch(patch).unwrap();
        let stride = own.render_stride();
        assert!(own.is_visible());
        assert!(stride.is_power_of_two() && (1..=32).contains(&stride));
        assert!(stride >= last, "stride shrank at {distance} m");
        if !seen.contains(&stride) {
            seen.push(stride);
        }
        last = stride;
    }
    assert_eq!(seen, vec![1, 2, 4, 8, 16]);
}

#[test]
fn disabling_dynamic_lod_pins_the_finest_stride() {
    let settings = TerrainSettings {
        dynamic_lod: false,
        ..Default::default()
    };
    let (mut terrain, id) = prepared(settings);
    let camera = TerrainCamera::omnidirectional(DVec3::new(5000.0, 5000.0, 0.0));
    assert_eq!(terrain.update_patch_visibilities(id, &camera).unwrap(), 16);
    for patch in terrain.surface(id).unwrap().patches() {
        assert_eq!(patch.render_stride(), 1);
        assert_eq!(patch.visible_distance(), 0.0);
    }
}

#[test]
fn stride_change_dirties_the_stitching_neighbours() {
    let (mut terrain, id) = prepared(TerrainSettings::default());
    let patch = patch_ref(&terrain, id, 1, 1);
    let west = terrain.patch_neighbor(patch, Direction::West).unwrap();
    let south = terrain.patch_neighbor(patch, Direction::South).unwrap();
    let east = terrain.patch_neighbor(patch, Direction::East).unwrap();
    for p in [patch, west, south, east] {
        terrain.rebuild_patch_geometry(p).unwrap();
        assert!(!terrain.patch(p).unwrap().geometry_dirty());
    }

    let camera = TerrainCamera::omnidirectional(DVec3::new(24.0, 24.0, 0.0));
    terrain.update_visibility(patch, &camera);
    assert_eq!(terrain.patch(patch).unwrap().render_stride(), 1);
    assert!(terrain.patch(patch).unwrap().geometry_dirty());
    assert!(terrain.patch(west).unwrap().geometry_dirty());
    assert!(terrain.patch(south).unwrap().geometry_dirty());
    assert!(!terrain.patch(east).unwrap().geometry_dirty());
}

#[test]
fn patches_behind_the_camera_are_culled() {
    let (mut terrain, id) = prepared(TerrainSettings::default());
    let position = DVec3::new(32.0, 32.0, 10.0);
    let camera = TerrainCamera::looking(position, Vec3::X, 1.0, 1.0, 0.1);

    let visible = terrain.update_patch_visibilities(id, &camera).unwrap();
    assert!(visible > 0 && visible < 16);
    assert_eq!(terrain.surface(id).unwrap().visible_patch_count(), visible);
    let behind = patch_ref(&terrain, id, 0, 2);
    let ahead = patch_ref(&terrain, id, 3, 2);
    assert!(!terrain.patch(behind).unwrap().is_visible());
    assert!(terrain.patch(ahead).unwrap().is_visible());
}

#[test]
fn view_projection_frustum_rejects_spheres_outside() {
    let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::X, Vec3::Z);
    let proj = Mat4::perspective_rh(1.0, 1.0, 0.1, 1000.0);
    let frustum = meshi_terrain::Frustum::from_view_projection(proj * view);
    assert!(frustum.intersects_sphere(Vec3::new(50.0, 0.0, 0.0), 1.0));
    assert!(!frustum.intersects_sphere(Vec3::new(-50.0, 0.0, 0.0), 1.0));
    assert!(!frustum.intersects_sphere(Vec3::new(50.0, 80.0, 0.0), 1.0));
    // Closer than the near distance but inside the side planes.
    assert!(frustum.intersects_sphere(Vec3::new(0.05, 0.0, 0.0), 0.01));
}
