use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::composition::assets::AssetId;
use crate::error::Result;

pub const TERRAIN_DIRT_DETAIL: &str = "0bc58228-74a0-7e83-89bc-5c23464bcec5";
pub const TERRAIN_GRASS_DETAIL: &str = "63338ede-0037-c4fd-855b-015d77112fc8";
pub const TERRAIN_MOUNTAIN_DETAIL: &str = "303cd381-8560-7579-23f1-f0a880799740";
pub const TERRAIN_ROCK_DETAIL: &str = "53a2f406-4895-1d13-d541-d2e3b86bc19c";

/// Viewer-side terrain tuning. Everything here is local preference; the
/// authoritative per-region values arrive later through region settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct TerrainSettings {
    /// Composition start height used for all four corners until the region reports its own.
    pub color_start_height: f32,
    /// Composition height range used for all four corners until the region reports its own.
    pub color_height_range: f32,
    /// Dirt, grass, mountain and rock.
    pub default_detail_assets: [AssetId; 4],
    pub lod_factor: f32,
    pub dynamic_lod: bool,
    /// Side length of the per-region composited RGB texture.
    pub texture_size: u32,
    pub default_water_height: f32,
    /// Seconds an idle update may spend regenerating patch textures. Zero means no limit.
    pub idle_update_budget_secs: f32,
    pub pbr_enabled: bool,
    pub pbr_force: bool,
    /// Detail texture repeats across a region, used when sampling minimap rasters.
    pub composition_texture_scale: f32,
}

impl Default for TerrainSettings {
    fn default() -> Self {
        Self {
            color_start_height: 20.0,
            color_height_range: 60.0,
            default_detail_assets: [
                AssetId::from_static(TERRAIN_DIRT_DETAIL),
                AssetId::from_static(TERRAIN_GRASS_DETAIL),
                AssetId::from_static(TERRAIN_MOUNTAIN_DETAIL),
                AssetId::from_static(TERRAIN_ROCK_DETAIL),
            ],
            lod_factor: 1.0,
            dynamic_lod: true,
            texture_size: 256,
            default_water_height: 20.0,
            idle_update_budget_secs: 0.0,
            pbr_enabled: false,
            pbr_force: false,
            composition_texture_scale: 16.0,
        }
    }
}

impl TerrainSettings {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: TerrainSettings = serde_json::from_str(json)?;
        Ok(settings)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// LOD factor as used for distance scaling; tiny values would explode distances.
    pub fn effective_lod_factor(&self) -> f32 {
        self.lod_factor.max(0.1)
    }
}
