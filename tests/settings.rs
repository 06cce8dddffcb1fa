use meshi_terrain::{ErrorKind, Terrain, TerrainSettings};
use std::fs;

#[test]
fn settings_round_trip_through_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("terrain.json");
    let settings = TerrainSettings {
        lod_factor: 2.0,
        dynamic_lod: false,
        texture_size: 128,
        idle_update_budget_secs: 0.004,
        ..Default::default()
    };

    settings.to_json_file(&path).unwrap();
    let loaded = TerrainSettings::from_json_file(&path).unwrap();
    assert_eq!(loaded, settings);
}

#[test]
fn partial_files_keep_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("terrain.json");
    fs::write(&path, r#"{ "color_start_height": 5.0, "pbr_enabled": true }"#).unwrap();

    let loaded = TerrainSettings::from_json_file(&path).unwrap();
    assert_eq!(loaded.color_start_height, 5.0);
    assert!(loaded.pbr_enabled);
    assert_eq!(loaded.color_height_range, 60.0);
    assert_eq!(loaded.default_water_height, 20.0);
}

#[test]
fn unreadable_settings_are_loading_errors() {
    let dir = tempfile::tempdir().unwrap();
    let missing = TerrainSettings::from_json_file(dir.path().join("missing.json")).unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::Loading);

    let path = dir.path().join("broken.json");
    fs::write(&path, "{ lod_factor: ").unwrap();
    let broken = TerrainSettings::from_json_file(&path).unwrap_err();
    assert_eq!(broken.kind(), ErrorKind::Loading);
}

#[test]
fn small_lod_factors_are_floored() {
    let settings = TerrainSettings {
        lod_factor: 0.01,
        ..Default::default()
    };
    assert_eq!(settings.effective_lod_factor(), 0.1);
    let terrain = Terrain::new(settings.clone());
    assert_eq!(terrain.settings(), &settings);
}
