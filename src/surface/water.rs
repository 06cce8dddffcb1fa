use image::{Rgba, RgbaImage};
use tracing::debug;

use super::Surface;
use crate::composition::minimap::MAX_WATER_COLOR;

/// Alpha ceiling for submerged texels.
pub const MAX_WATER_ALPHA: u8 = 240;
pub const MIN_WATER_ALPHA: u8 = 64;
pub const ABOVE_WATERLINE_ALPHA: u8 = 32;

pub(crate) fn blank_water_texture(size: u32) -> RgbaImage {
    let [r, g, b] = MAX_WATER_COLOR;
    RgbaImage::from_pixel(size, size, Rgba([r, g, b, MAX_WATER_ALPHA]))
}

/// Opacity of water over ground at `height`.
///
/// Dry ground gets a fixed faint alpha. Submerged ground ramps from
/// [`MIN_WATER_ALPHA`] at the waterline toward [`MAX_WATER_ALPHA`] with depth.
pub fn water_alpha(height: f32, water_height: f32) -> u8 {
    if height.is_nan() || height > water_height {
        return ABOVE_WATERLINE_ALPHA;
    }
    let depth = water_height - height;
    let frac = 1.0 - 2.0 / (2.0 + depth);
    let alpha = MIN_WATER_ALPHA as f32 + (255.0 - MIN_WATER_ALPHA as f32) * frac;
    alpha.round().clamp(MIN_WATER_ALPHA as f32, MAX_WATER_ALPHA as f32) as u8
}

impl Surface {
    /// Repaints the water tile for the region rectangle `(x, y, width, width)`
    /// in meters.
    pub(crate) fn generate_water_texture(&mut self, x: f32, y: f32, width: f32) {
        let (tex_width, tex_height) = self.water_texture.dimensions();
        let region = self.grid.meters_per_edge();
        if tex_width == 0 || tex_height == 0 || region <= 0.0 {
            return;
        }
        let x_scale = region / tex_width as f32;
        let y_scale = region / tex_height as f32;

        let x_begin = ((x / x_scale).round().max(0.0) as u32).min(tex_width);
        let y_begin = ((y / y_scale).round().max(0.0) as u32).min(tex_height);
        let x_end = (((x + width) / x_scale).round().max(0.0) as u32).min(tex_width);
        let y_end = (((y + width) / y_scale).round().max(0.0) as u32).min(tex_height);

        let [r, g, b] = MAX_WATER_COLOR;
        for j in y_begin..y_end {
            for i in x_begin..x_end {
                let height = self
                    .grid
                    .resolve_height_region((i as f32 + 0.5) * x_scale, (j as f32 + 0.5) * y_scale);
                let alpha = water_alpha(height, self.water_height);
                self.water_texture.put_pixel(i, j, Rgba([r, g, b, alpha]));
            }
        }

        debug!(
            "Painted water texels [{}, {}) x [{}, {}) at height {}",
            x_begin, x_end, y_begin, y_end, self.water_height
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_splits_at_the_waterline() {
        assert_eq!(water_alpha(20.5, 20.0), ABOVE_WATERLINE_ALPHA);
        assert_eq!(water_alpha(20.0, 20.0), MIN_WATER_ALPHA);
        assert_eq!(water_alpha(f32::NAN, 20.0), ABOVE_WATERLINE_ALPHA);
    }

    #[test]
    fn deeper_water_is_more_opaque_up_to_the_ceiling() {
        let shallow = water_alpha(19.0, 20.0);
        let deep = water_alpha(5.0, 20.0);
        assert!(MIN_WATER_ALPHA < shallow && shallow < deep);
        assert_eq!(water_alpha(-1.0e4, 20.0), MAX_WATER_ALPHA);
    }
}
