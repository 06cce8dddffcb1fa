pub mod assets;
pub mod layer;
pub mod materials;
pub mod minimap;
pub mod noise;

use glam::{DVec3, Vec2};
use image::RgbImage;
use tracing::warn;

use crate::config::TerrainSettings;
use assets::{AssetFetcher, AssetId, MaterialOverride};
use layer::ViewerLayer;
use materials::{DetailAssets, TerrainMaterialType, ASSET_COUNT};
use noise::{noise2, turbulence2};

pub const CORNER_COUNT: usize = 4;

/// Region corners as indexed by the per-corner composition parameters.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    SouthWest = 0,
    SouthEast = 1,
    NorthWest = 2,
    NorthEast = 3,
}

/// Horizontal scale of the composition noise lattice, in meters.
pub const NOISE_XY_SCALE: f32 = 4.9215;
const NOISE_LOW_FREQ: f32 = 0.222_222_22;
const NOISE_LOW_AMPLITUDE: f32 = 6.5;
const NOISE_SLOPE_SQUARED: f32 = 1.5 * 1.5;
const NOISE_MAGNITUDE: f32 = 2.0;
/// Smallest height range used as a divisor.
const MIN_HEIGHT_RANGE: f32 = 1.0e-3;

fn bilinear(v00: f32, v01: f32, v10: f32, v11: f32, x_frac: f32, y_frac: f32) -> f32 {
    let inv_x = 1.0 - x_frac;
    let inv_y = 1.0 - y_frac;
    inv_x * inv_y * v00 + x_frac * inv_y * v10 + inv_x * y_frac * v01 + x_frac * y_frac * v11
}

/// Per-region composition map plus the detail assets it selects between.
#[derive(Debug, Clone)]
pub struct Composition {
    layer: ViewerLayer,
    assets: DetailAssets,
    start_height: [f32; CORNER_COUNT],
    height_range: [f32; CORNER_COUNT],
    params_ready: bool,
    texture_scale: f32,
    rasters: [Option<RgbImage>; ASSET_COUNT],
    rasters_from_textures: Option<bool>,
}

impl Composition {
    pub fn new(width: u32, scale: f32, settings: &TerrainSettings) -> Self {
        let mut assets = DetailAssets::new(settings.default_detail_assets);
        assets.set_pbr_flags(settings.pbr_enabled, settings.pbr_force);
        Self {
            layer: ViewerLayer::new(width, scale),
            assets,
            start_height: [settings.color_start_height; CORNER_COUNT],
            height_range: [settings.color_height_range; CORNER_COUNT],
            params_ready: false,
            texture_scale: settings.composition_texture_scale,
            rasters: Default::default(),
            rasters_from_textures: None,
        }
    }

    pub fn layer(&self) -> &ViewerLayer {
        &self.layer
    }

    pub fn assets(&self) -> &DetailAssets {
        &self.assets
    }

    pub fn get_value_scaled(&self, x: f32, y: f32) -> f32 {
        self.layer.get_value_scaled(x, y)
    }

    pub fn params_ready(&self) -> bool {
        self.params_ready
    }

    pub fn set_params_ready(&mut self) {
        self.params_ready = true;
    }

    pub fn start_height(&self, corner: Corner) -> f32 {
        self.start_height[corner as usize]
    }

    pub fn set_start_height(&mut self, corner: Corner, height: f32) {
        self.start_height[corner as usize] = height;
    }

    pub fn height_range(&self, corner: Corner) -> f32 {
        self.height_range[corner as usize]
    }

    pub fn set_height_range(&mut self, corner: Corner, range: f32) {
        self.height_range[corner as usize] = range;
    }

    pub fn detail_asset_id(&self, asset: usize) -> AssetId {
        self.assets.asset_id(asset)
    }

    /// Null ids are ignored and leave the current asset in place.
    pub fn set_detail_asset_id(&mut self, asset: usize, id: AssetId) {
        if self.assets.set_asset_id(asset, id) {
            self.rasters[asset] = None;
        } else if asset >= ASSET_COUNT {
            warn!("Ignoring detail asset for out of range slot {}", asset);
        }
    }

    pub fn set_material_override(&mut self, asset: usize, over: Option<MaterialOverride>) {
        self.assets.set_material_override(asset, over);
    }

    pub fn textures_ready(&mut self, fetcher: &mut impl AssetFetcher, boost: bool, strict: bool) -> bool {
        self.assets.textures_ready(fetcher, boost, strict)
    }

    pub fn materials_ready(&mut self, fetcher: &mut impl AssetFetcher, boost: bool, strict: bool) -> bool {
        self.assets.materials_ready(fetcher, boost, strict)
    }

    pub fn material_type(&mut self, fetcher: &mut impl AssetFetcher) -> TerrainMaterialType {
        self.assets.material_type(fetcher)
    }

    pub fn boost(&mut self, fetcher: &mut impl AssetFetcher) {
        self.assets.boost(fetcher);
    }

    pub fn unboost(&self, fetcher: &mut impl AssetFetcher) {
        self.assets.unboost(fetcher);
    }

    /// Fills the composition texels covering the rectangle `(x, y, width, width)`
    /// in region meters. `height_at` resolves region-local heights.
    ///
    /// Returns false until the region parameters have arrived.
    pub fn generate_heights(
        &mut self,
        origin_global: DVec3,
        x: f32,
        y: f32,
        width: f32,
        height_at: impl Fn(f32, f32) -> f32,
    ) -> bool {
        if !self.params_ready {
            return false;
        }

        let layer_width = self.layer.width() as i32;
        let scale = self.layer.scale();
        let scale_inv = self.layer.scale_inv();
        let x_begin = ((x * scale_inv).round() as i32).max(0);
        let y_begin = ((y * scale_inv).round() as i32).max(0);
        let x_end = (((x + width) * scale_inv).round() as i32).min(layer_width);
        let y_end = (((y + width) * scale_inv).round() as i32).min(layer_width);

        let inv_width = 1.0 / layer_width as f32;
        let s = &self.start_height;
        let r = &self.height_range;

        for j in y_begin..y_end {
            for i in x_begin..x_end {
                let xf = i as f32 * inv_width;
                let yf = j as f32 * inv_width;
                let start = bilinear(s[0], s[1], s[2], s[3], xf, yf);
                let range = bilinear(r[0], r[1], r[2], r[3], xf, yf);

                let location = Vec2::new(i as f32 * scale, j as f32 * scale);
                let height = height_at(location.x, location.y);

                let lattice = Vec2::new(
                    (origin_global.x + location.x as f64) as f32,
                    (origin_global.y + location.y as f64) as f32,
                ) / NOISE_XY_SCALE;
                let mut twiddle = noise2(lattice * NOISE_LOW_FREQ) * NOISE_LOW_AMPLITUDE;
                twiddle += turbulence2(lattice, 2.0) * NOISE_SLOPE_SQUARED;
                twiddle *= NOISE_MAGNITUDE;

                let divisor = if range.abs() < MIN_HEIGHT_RANGE {
                    MIN_HEIGHT_RANGE
                } else {
                    range
                };
                let mut value = (height + twiddle - start) * ASSET_COUNT as f32 / divisor;
                if !value.is_finite() {
                    value = 0.0;
                }
                self.layer
                    .set_value(i as u32, j as u32, value.clamp(0.0, (ASSET_COUNT - 1) as f32));
            }
        }
        true
    }

    /// Succeeds once either the textures or the materials are all usable.
    pub fn generate_composition(&mut self, fetcher: &mut impl AssetFetcher) -> bool {
        if !self.params_ready {
            return false;
        }
        self.assets.generate_materials(fetcher)
    }
}
