use image::{imageops::FilterType, Rgb, RgbImage, Rgba, RgbaImage};
use tracing::{debug, warn};

use super::assets::{AlphaMode, AssetFetcher, AssetHandle, MaterialTexture, RasterReadback};
use super::materials::{desired_discard, TerrainMaterialType, ASSET_COUNT, BASE_SIZE};
use super::Composition;

/// Stand-in for whatever shows through alpha-blended terrain materials.
pub const MAX_WATER_COLOR: [u8; 3] = [0, 48, 96];

enum Prepared {
    Ready(Option<RgbaImage>),
    Pending,
}

fn fallback_raster() -> RgbaImage {
    RgbaImage::from_pixel(BASE_SIZE, BASE_SIZE, Rgba([255, 255, 255, 255]))
}

/// Reads a detail texture back at the discard level the minimap wants and
/// scales it to [`BASE_SIZE`]. Missing base textures become opaque white;
/// missing emissive textures are simply absent.
fn prepare_raster(fetcher: &mut impl AssetFetcher, texture: Option<AssetHandle>, emissive: bool) -> Prepared {
    let Some(handle) = texture else {
        if emissive {
            return Prepared::Ready(None);
        }
        return Prepared::Ready(Some(fallback_raster()));
    };

    let info = fetcher.texture_info(handle);
    let discard = desired_discard(info.full_width, info.full_height);
    match fetcher.read_texture(handle, discard) {
        RasterReadback::Pending => Prepared::Pending,
        RasterReadback::Failed => {
            warn!("Detail texture readback failed, using fallback raster");
            Prepared::Ready(Some(fallback_raster()))
        }
        RasterReadback::Ready(img) => Prepared::Ready(Some(
            img.resize_exact(BASE_SIZE, BASE_SIZE, FilterType::Triangle)
                .to_rgba8(),
        )),
    }
}

struct RasterRecipe {
    base: Option<AssetHandle>,
    emissive: Option<AssetHandle>,
    base_color_factor: [f32; 3],
    emissive_factor: [f32; 3],
    has_alpha: bool,
}

fn scale_channel(value: u8, factor: f32) -> u8 {
    (value as f32 * factor).clamp(0.0, 255.0) as u8
}

/// Flattens a base colour raster, optional emissive raster and material
/// factors into the RGB tile the minimap blends.
fn compose_raster(base: &RgbaImage, emissive: Option<&RgbaImage>, recipe: &RasterRecipe) -> RgbImage {
    let background = if recipe.has_alpha {
        MAX_WATER_COLOR
    } else {
        [0, 0, 0]
    };

    RgbImage::from_fn(BASE_SIZE, BASE_SIZE, |x, y| {
        let src = base.get_pixel(x, y);
        let alpha = src[3] as f32 / 255.0;
        let mut out = [0u8; 3];
        for c in 0..3 {
            let blended = src[c] as f32 * alpha + background[c] as f32 * (1.0 - alpha);
            out[c] = scale_channel(blended as u8, recipe.base_color_factor[c]);
        }
        if let Some(emissive) = emissive {
            let glow = emissive.get_pixel(x, y);
            for c in 0..3 {
                out[c] = out[c].saturating_add(scale_channel(glow[c], recipe.emissive_factor[c]));
            }
        }
        Rgb(out)
    })
}

impl Composition {
    fn raster_recipe(&self, asset: usize, use_textures: bool) -> RasterRecipe {
        if use_textures {
            return RasterRecipe {
                base: self.assets.texture_handle(asset),
                emissive: None,
                base_color_factor: [1.0; 3],
                emissive_factor: [1.0; 3],
                has_alpha: false,
            };
        }

        let material = self.assets.render_material(asset);
        let (base_color_factor, emissive_factor, has_alpha) = match material {
            Some(mat) => {
                let [r, g, b, a] = mat.base_color_factor;
                // Alpha darkens rather than revealing anything beneath.
                ([r * a, g * a, b * a], mat.emissive_factor, mat.alpha_mode != AlphaMode::Opaque)
            }
            None => ([1.0; 3], [1.0; 3], false),
        };
        RasterRecipe {
            base: self.assets.material_texture(asset, MaterialTexture::BaseColor),
            emissive: self.assets.material_texture(asset, MaterialTexture::Emissive),
            base_color_factor,
            emissive_factor,
            has_alpha,
        }
    }

    fn prepare_rasters(&mut self, fetcher: &mut impl AssetFetcher, use_textures: bool) -> bool {
        for asset in 0..ASSET_COUNT {
            if self.rasters[asset].is_some() {
                continue;
            }

            let recipe = self.raster_recipe(asset, use_textures);
            let Prepared::Ready(Some(base)) = prepare_raster(fetcher, recipe.base, false) else {
                return false;
            };
            let emissive = match prepare_raster(fetcher, recipe.emissive, true) {
                Prepared::Ready(emissive) => emissive,
                Prepared::Pending => return false,
            };
            self.rasters[asset] = Some(compose_raster(&base, emissive.as_ref(), &recipe));
        }
        true
    }

    /// Writes the blended detail colours for the region rectangle
    /// `(x, y, width, width)` (meters) into `target`, a square RGB texture
    /// covering the whole region.
    ///
    /// Returns false without touching `target` while any detail asset is not
    /// fully ready.
    pub fn generate_minimap_tile_land(
        &mut self,
        fetcher: &mut impl AssetFetcher,
        target: &mut RgbImage,
        x: f32,
        y: f32,
        width: f32,
    ) -> bool {
        let prefer_textures = self.material_type(fetcher) != TerrainMaterialType::Pbr;
        let use_textures = if prefer_textures {
            if self.textures_ready(fetcher, true, true) {
                true
            } else if self.materials_ready(fetcher, true, true) {
                false
            } else {
                return false;
            }
        } else if self.materials_ready(fetcher, true, true) {
            false
        } else if self.textures_ready(fetcher, true, true) {
            true
        } else {
            return false;
        };

        if self.rasters_from_textures != Some(use_textures) {
            self.rasters = Default::default();
            self.rasters_from_textures = Some(use_textures);
        }
        if !self.prepare_rasters(fetcher, use_textures) {
            return false;
        }

        let layer_width = self.layer.width();
        let scale = self.layer.scale();
        let scale_inv = self.layer.scale_inv();
        let x_begin = (x * scale_inv).max(0.0) as u32;
        let y_begin = (y * scale_inv).max(0.0) as u32;
        let x_end = (((x + width) * scale_inv).round().max(0.0) as u32).min(layer_width);
        let y_end = (((y + width) * scale_inv).round().max(0.0) as u32).min(layer_width);

        let (tex_width, tex_height) = target.dimensions();
        if tex_width == 0 || tex_height == 0 {
            warn!("Minimap target texture is empty");
            return false;
        }
        let tex_x_scale = tex_width as f32 / layer_width as f32;
        let tex_y_scale = tex_height as f32 / layer_width as f32;
        let tex_x_begin = (x_begin as f32 * tex_x_scale) as u32;
        let tex_y_begin = (y_begin as f32 * tex_y_scale) as u32;
        let tex_x_end = ((x_end as f32 * tex_x_scale) as u32).min(tex_width);
        let tex_y_end = ((y_end as f32 * tex_y_scale) as u32).min(tex_height);

        let tex_x_ratio = layer_width as f32 * scale / tex_width as f32;
        let tex_y_ratio = layer_width as f32 * scale / tex_height as f32;

        let st_size = BASE_SIZE as f32;
        let st_x_stride = (st_size / self.texture_scale) * (layer_width as f32 / tex_width as f32);
        let st_y_stride = (st_size / self.texture_scale) * (layer_width as f32 / tex_height as f32);

        let wrap = |v: f32| v - st_size * (v / st_size).floor();
        let rasters: Vec<&RgbImage> = self.rasters.iter().flatten().collect();
        if rasters.len() != ASSET_COUNT {
            return false;
        }

        let mut stj = wrap(tex_y_begin as f32 * st_y_stride);
        for j in tex_y_begin..tex_y_end {
            let mut sti = wrap(tex_x_begin as f32 * st_x_stride);
            for i in tex_x_begin..tex_x_end {
                let mut composition = self.layer.get_value_scaled(i as f32 * tex_x_ratio, j as f32 * tex_y_ratio);
                let tex0 = (composition.floor() as i32).clamp(0, 3) as usize;
                composition -= tex0 as f32;
                let tex1 = (tex0 + 1).min(3);

                let sx = (sti as u32).min(BASE_SIZE - 1);
                let sy = (stj as u32).min(BASE_SIZE - 1);
                let a = rasters[tex0].get_pixel(sx, sy);
                let b = rasters[tex1].get_pixel(sx, sy);
                let mut out = [0u8; 3];
                for c in 0..3 {
                    let (a, b) = (a[c] as f32, b[c] as f32);
                    out[c] = (a + composition * (b - a)).clamp(0.0, 255.0) as u8;
                }
                target.put_pixel(i, j, Rgb(out));

                sti += st_x_stride;
                if sti >= st_size {
                    sti -= st_size;
                }
            }

            stj += st_y_stride;
            if stj >= st_size {
                stj -= st_size;
            }
        }

        debug!(
            "Composited minimap texels [{}, {}) x [{}, {})",
            tex_x_begin, tex_x_end, tex_y_begin, tex_y_end
        );
        self.unboost(fetcher);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_materials_blend_over_water() {
        let base = RgbaImage::from_pixel(BASE_SIZE, BASE_SIZE, Rgba([255, 255, 255, 0]));
        let recipe = RasterRecipe {
            base: None,
            emissive: None,
            base_color_factor: [1.0; 3],
            emissive_factor: [1.0; 3],
            has_alpha: true,
        };
        let out = compose_raster(&base, None, &recipe);
        assert_eq!(out.get_pixel(5, 5).0, MAX_WATER_COLOR);
    }

    #[test]
    fn emissive_adds_on_top_of_tinted_base() {
        let base = RgbaImage::from_pixel(BASE_SIZE, BASE_SIZE, Rgba([200, 100, 50, 255]));
        let glow = RgbaImage::from_pixel(BASE_SIZE, BASE_SIZE, Rgba([100, 10, 0, 255]));
        let recipe = RasterRecipe {
            base: None,
            emissive: None,
            base_color_factor: [0.5, 1.0, 1.0],
            emissive_factor: [1.0, 1.0, 1.0],
            has_alpha: false,
        };
        let out = compose_raster(&base, Some(&glow), &recipe);
        assert_eq!(out.get_pixel(0, 0).0, [200, 110, 50]);
    }
}
