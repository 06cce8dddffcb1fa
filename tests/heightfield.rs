mod common;

use common::*;
use glam::{DVec3, Vec3};
use meshi_terrain::ErrorKind;

#[test]
fn construction_enforces_power_of_two_layout() {
    let mut terrain = terrain();
    for (gpe, gppe) in [(16, 16), (257, 24), (65, 128), (33, 1)] {
        let err = terrain
            .create_surface(gpe, gppe, DVec3::ZERO, 256.0)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidGeometry, "({gpe}, {gppe})");
    }
    let id = terrain.create_surface(257, 16, DVec3::ZERO, 256.0).unwrap();
    let surface = terrain.surface(id).unwrap();
    assert_eq!(surface.grid().patches_per_edge(), 16);
    assert_eq!(surface.patches().len(), 256);
    assert_eq!(surface.min_z(), 10000.0);
    assert_eq!(surface.max_z(), -10000.0);
    assert!(!surface.has_z_data());
}

#[test]
fn single_patch_bump_interpolates_smoothly() {
    let mut terrain = terrain();
    let id = surface(&mut terrain, 17, 16, DVec3::ZERO);
    let patch = patch_ref(&terrain, id, 0, 0);

    terrain.dirty_z(patch);
    assert_eq!(terrain.surface(id).unwrap().resolve_height_region(8.0, 8.0), 0.0);

    terrain.surface_mut(id).unwrap().grid_mut().set_z(8, 8, 10.0);
    terrain.dirty_z(patch);
    terrain.update_vertical_stats(patch);

    let surface = terrain.surface(id).unwrap();
    assert_eq!(surface.min_z(), 0.0);
    assert_eq!(surface.max_z(), 10.0);
    let stats = surface.patch(0, 0).unwrap().stats();
    assert_eq!(stats.max_z, 10.0);
    assert!((stats.center_region.z - 5.0).abs() < 1e-6);

    let peak = surface.resolve_height_region(8.0, 8.0);
    assert_eq!(peak, 10.0);
    let mut last = 0.0;
    for step in 0..=10 {
        let x = 7.0 + step as f32 * 0.1;
        let h = surface.resolve_height_region(x, 8.0);
        assert!(h >= last - 1e-5, "height drops at {x}");
        assert!(h - last <= 1.0 + 1e-4, "height jumps at {x}");
        last = h;
    }
}

#[test]
fn global_queries_follow_the_origin() {
    let mut terrain = terrain();
    let origin = DVec3::new(256.0, 512.0, 0.0);
    let id = surface(&mut terrain, 33, 16, origin);
    fill(&mut terrain, id, |x, y| (x - 256.0 + 2.0 * (y - 512.0)) as f32);

    let h = terrain.resolve_height_global(DVec3::new(266.5, 520.0, 100.0)).unwrap();
    assert!((h - (10.5 + 16.0)).abs() < 1e-4);
    assert_eq!(terrain.surface_at_global(DVec3::new(300.0, 520.0, 0.0)), None);
    assert!(terrain.resolve_height_global(DVec3::new(0.0, 0.0, 0.0)).is_none());

    let surface = terrain.surface(id).unwrap();
    let patch = surface.resolve_patch_global(DVec3::new(280.0, 514.0, 0.0));
    assert_eq!(surface.patch_by_index(patch.index).unwrap().grid_position(), (1, 0));
    assert_eq!(
        surface.patch(1, 1).unwrap().origin_global(),
        DVec3::new(272.0, 528.0, 0.0)
    );
    let normal = surface.resolve_normal_global(DVec3::new(260.0, 520.0, 0.0));
    let expected = Vec3::new(-1.0, -2.0, 1.0).normalize();
    assert!((normal - expected).length() < 1e-4);
}

#[test]
fn moving_a_surface_resets_visibility() {
    let mut terrain = terrain();
    let id = surface(&mut terrain, 33, 16, DVec3::ZERO);
    terrain
        .set_origin_global(id, DVec3::new(1024.0, 0.0, 0.0))
        .unwrap();
    let surface = terrain.surface(id).unwrap();
    for patch in surface.patches() {
        assert!(!patch.is_visible());
        assert_eq!(patch.visible_distance(), 512.0);
        assert_eq!(patch.render_level(), 0);
        assert_eq!(patch.render_stride(), 16);
    }
    assert_eq!(
        surface.patch(0, 1).unwrap().origin_global(),
        DVec3::new(1024.0, 16.0, 0.0)
    );
}

#[test]
fn raw_edits_and_water_height() {
    let mut terrain = terrain();
    let id = surface(&mut terrain, 17, 16, DVec3::ZERO);
    {
        let grid = terrain.surface_mut(id).unwrap().grid_mut();
        grid.move_z(3, 4, 2.5);
        grid.move_z(3, 4, 2.5);
        assert_eq!(grid.z(3, 4), 5.0);
        // Out of range clamps to the buffer corner.
        grid.set_z(99, 99, 7.0);
        assert_eq!(grid.z(16, 16), 7.0);
    }
    assert_eq!(terrain.surface(id).unwrap().water_height(), 20.0);
    terrain.set_water_height(id, 31.5).unwrap();
    assert_eq!(terrain.surface(id).unwrap().water_height(), 31.5);
}

#[test]
fn segment_intersection_finds_the_ground() {
    let mut terrain = terrain();
    let id = surface(&mut terrain, 33, 16, DVec3::ZERO);
    fill(&mut terrain, id, |x, _| (x * 0.5) as f32);

    let surface = terrain.surface(id).unwrap();
    let (hit, normal) = surface
        .line_segment_intersect(Vec3::new(4.0, 10.0, 40.0), Vec3::new(4.0, 10.0, -5.0))
        .unwrap();
    assert!((hit.z - 2.0).abs() < 1e-3);
    assert!(normal.z > 0.0 && normal.x < 0.0);
    assert!(surface
        .line_segment_intersect(Vec3::new(20.0, 10.0, 1.0), Vec3::new(4.0, 10.0, 40.0))
        .is_none());
}

#[test]
fn removed_surfaces_are_unknown() {
    let mut terrain = terrain();
    let id = surface(&mut terrain, 17, 16, DVec3::ZERO);
    assert_eq!(terrain.surface_ids(), vec![id]);
    terrain.remove_surface(id).unwrap();
    assert_eq!(terrain.surface(id).unwrap_err().kind(), ErrorKind::Lookup);
    assert!(terrain.surface_ids().is_empty());
    assert_eq!(terrain.remove_surface(id).unwrap_err().kind(), ErrorKind::Lookup);
}
