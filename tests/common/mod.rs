#![allow(dead_code)]

use glam::DVec3;
use image::{DynamicImage, Rgb, RgbImage};
use meshi_terrain::codec::{GroupHeader, LayerType, PatchEncoder};
use meshi_terrain::{MemoryAssetStore, PatchRef, SurfaceId, Terrain, TerrainSettings};

pub const DETAIL_COLORS: [[u8; 3]; 4] = [[120, 90, 60], [60, 140, 40], [110, 110, 110], [200, 200, 200]];

pub fn terrain() -> Terrain {
    Terrain::new(TerrainSettings::default())
}

/// A surface sampled every meter.
pub fn surface(terrain: &mut Terrain, grids_per_edge: u32, grids_per_patch_edge: u32, origin: DVec3) -> SurfaceId {
    terrain
        .create_surface(grids_per_edge, grids_per_patch_edge, origin, (grids_per_edge - 1) as f32)
        .unwrap()
}

/// Writes `f(global x, global y)` into every sample of a surface, buffers
/// included.
pub fn fill(terrain: &mut Terrain, id: SurfaceId, f: impl Fn(f64, f64) -> f32) {
    let surface = terrain.surface_mut(id).unwrap();
    let origin = surface.origin_global();
    let mpg = surface.grid().meters_per_grid() as f64;
    let gpe = surface.grid().grids_per_edge();
    let grid = surface.grid_mut();
    for y in 0..gpe {
        for x in 0..gpe {
            grid.set_z(x, y, f(origin.x + x as f64 * mpg, origin.y + y as f64 * mpg));
        }
    }
}

/// Runs normal updates until no patch of the surface has invalid regions.
pub fn settle_normals(terrain: &mut Terrain, id: SurfaceId) {
    for _ in 0..8 {
        let patches = terrain.patch_refs(id).unwrap();
        if patches
            .iter()
            .all(|p| !terrain.patch(*p).unwrap().has_invalid_normals())
        {
            return;
        }
        for patch in patches {
            terrain.update_normals(patch);
        }
    }
    panic!("normals did not settle");
}

pub fn patch_ref(terrain: &Terrain, id: SurfaceId, i: u32, j: u32) -> PatchRef {
    terrain.surface(id).unwrap().patch_ref(i, j)
}

/// Store with all four default detail textures fully loaded.
pub fn ready_store(settings: &TerrainSettings) -> MemoryAssetStore {
    let mut store = MemoryAssetStore::new();
    publish_detail_textures(&mut store, settings);
    store
}

pub fn publish_detail_textures(store: &mut MemoryAssetStore, settings: &TerrainSettings) {
    for (id, color) in settings.default_detail_assets.iter().zip(DETAIL_COLORS) {
        let image = RgbImage::from_pixel(256, 256, Rgb(color));
        store.publish_texture(*id, DynamicImage::ImageRgb8(image));
    }
}

/// A land layer message carrying the given patches.
pub fn encode_layer(patch_size: u8, patches: &[(u32, u32, Vec<f32>)]) -> Vec<u8> {
    let mut encoder = PatchEncoder::new(GroupHeader {
        stride: 264,
        patch_size,
        layer: LayerType::Land,
    })
    .unwrap();
    for (i, j, heights) in patches {
        encoder.push_patch(*i, *j, heights).unwrap();
    }
    encoder.finish()
}
