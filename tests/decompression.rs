mod common;

use common::*;
use glam::DVec3;
use meshi_terrain::{Direction, ErrorKind};

fn flat(z: f32) -> Vec<f32> {
    vec![z; 256]
}

fn slope() -> Vec<f32> {
    (0..256).map(|k| 10.0 + 0.1 * (k % 16) as f32 + 0.05 * (k / 16) as f32).collect()
}

#[test]
fn decoded_patches_land_in_their_grid_window() {
    let mut terrain = terrain();
    let id = surface(&mut terrain, 33, 16, DVec3::ZERO);
    let message = encode_layer(16, &[(1, 0, slope()), (0, 1, flat(12.0))]);

    let updated = terrain.decompress_layer(id, &message).unwrap();
    assert_eq!(updated, vec![patch_ref(&terrain, id, 1, 0), patch_ref(&terrain, id, 0, 1)]);

    let surface = terrain.surface(id).unwrap();
    let expected = slope();
    for j in 0..16 {
        for i in 0..16 {
            let got = surface.grid().z(16 + i, j);
            let want = expected[(j * 16 + i) as usize];
            assert!((got - want).abs() < 0.5, "({i}, {j}): {got} vs {want}");
            assert!((surface.grid().z(i, 16 + j) - 12.0).abs() < 1e-3);
        }
    }
    assert_eq!(surface.grid().z(3, 3), 0.0);

    for (i, j, received) in [(1, 0, true), (0, 1, true), (0, 0, false), (1, 1, false)] {
        let patch = surface.patch(i, j).unwrap();
        assert_eq!(patch.has_received_data(), received, "({i}, {j})");
    }
    let dirty: Vec<u32> = surface.dirty_patches().collect();
    for patch in &updated {
        assert!(dirty.contains(&patch.index));
        assert!(terrain.patch(*patch).unwrap().is_dirty());
    }
}

#[test]
fn lone_surface_buffers_repeat_the_last_row_and_column() {
    let mut terrain = terrain();
    let id = surface(&mut terrain, 33, 16, DVec3::ZERO);
    let message = encode_layer(16, &[(1, 0, flat(5.0)), (0, 1, flat(8.0))]);
    terrain.decompress_layer(id, &message).unwrap();

    let grid = terrain.surface(id).unwrap().grid();
    for k in 0..16 {
        assert!((grid.z(32, k) - 5.0).abs() < 1e-3, "east buffer row {k}");
        assert!((grid.z(k, 32) - 8.0).abs() < 1e-3, "north buffer column {k}");
    }
}

#[test]
fn decoding_refreshes_the_western_neighbours_buffer() {
    let mut terrain = terrain();
    let west = surface(&mut terrain, 33, 16, DVec3::ZERO);
    let east = surface(&mut terrain, 33, 16, DVec3::new(32.0, 0.0, 0.0));
    terrain.connect_neighbor(west, east, Direction::East).unwrap();

    let message = encode_layer(16, &[(0, 0, flat(7.0))]);
    terrain.decompress_layer(east, &message).unwrap();

    let grid = terrain.surface(west).unwrap().grid();
    for j in 0..16 {
        assert!((grid.z(32, j) - 7.0).abs() < 1e-3, "row {j}");
    }
    assert_eq!(grid.z(32, 20), 0.0);
    assert!(terrain
        .patch(patch_ref(&terrain, west, 1, 0))
        .unwrap()
        .has_invalid_normals());
}

#[test]
fn out_of_range_patches_are_rejected_untouched() {
    let mut terrain = terrain();
    let id = surface(&mut terrain, 33, 16, DVec3::ZERO);
    let message = encode_layer(16, &[(2, 0, flat(4.0))]);

    let err = terrain.decompress_layer(id, &message).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProtocolCorruption);
    let surface = terrain.surface(id).unwrap();
    assert!(surface.grid().heights().iter().all(|z| *z == 0.0));
    assert!(surface.patches().iter().all(|p| !p.has_received_data()));
    assert_eq!(surface.dirty_patches().count(), 0);
}

#[test]
fn patches_before_a_bad_one_stay_applied() {
    let mut terrain = terrain();
    let id = surface(&mut terrain, 33, 16, DVec3::ZERO);
    let message = encode_layer(16, &[(0, 0, flat(2.0)), (0, 5, flat(4.0))]);

    assert!(terrain.decompress_layer(id, &message).is_err());
    let surface = terrain.surface(id).unwrap();
    assert!(surface.patch(0, 0).unwrap().has_received_data());
    assert!((surface.grid().z(4, 4) - 2.0).abs() < 1e-3);
}

#[test]
fn mismatched_or_malformed_messages_are_corruption() {
    let mut terrain = terrain();
    let id = surface(&mut terrain, 33, 16, DVec3::ZERO);

    let wide = encode_layer(32, &[(0, 0, vec![1.0; 1024])]);
    let err = terrain.decompress_layer(id, &wide).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProtocolCorruption);

    let mut unknown = encode_layer(16, &[(0, 0, flat(1.0))]);
    unknown[3] = b'X';
    let err = terrain.decompress_layer(id, &unknown).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProtocolCorruption);

    let err = terrain.decompress_layer(id, &[0x08, 0x01]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProtocolCorruption);
    assert!(terrain
        .surface(id)
        .unwrap()
        .patches()
        .iter()
        .all(|p| !p.has_received_data()));
}

#[test]
fn direct_height_blocks_must_match_the_patch_size() {
    let mut terrain = terrain();
    let id = surface(&mut terrain, 17, 16, DVec3::ZERO);
    let patch = patch_ref(&terrain, id, 0, 0);

    let err = terrain.apply_patch_heights(patch, &[1.0; 17]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProtocolCorruption);
    terrain.apply_patch_heights(patch, &flat(6.0)).unwrap();
    terrain.propagate_edges(patch);
    let grid = terrain.surface(id).unwrap().grid();
    assert_eq!(grid.z(15, 15), 6.0);
    assert_eq!(grid.z(16, 4), 6.0);
}
