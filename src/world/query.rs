use glam::{Vec2, Vec3};

use super::Terrain;
use crate::composition::noise::noise2;
use crate::composition::NOISE_XY_SCALE;
use crate::error::{Error, Result};
use crate::geometry::{base_composition, build_patch_geometry, PatchGeometry, PatchSampler, TerrainVertex};
use crate::surface::direction::Direction;
use crate::surface::patch::PatchRef;
use crate::surface::SurfaceId;

/// Scale from global meters to the dither noise lattice.
const DITHER_SCALE: f32 = 0.2222 / (NOISE_XY_SCALE * 7.0);

/// A patch seen through its terrain, ready to be tessellated.
pub struct PatchView<'a> {
    terrain: &'a Terrain,
    patch: PatchRef,
}

impl PatchSampler for PatchView<'_> {
    fn eval(&self, x: u32, y: u32) -> TerrainVertex {
        self.terrain.eval(self.patch, x, y)
    }
}

impl Terrain {
    pub fn patch_view(&self, patch: PatchRef) -> PatchView<'_> {
        PatchView {
            terrain: self,
            patch,
        }
    }

    /// Composition value at region meters `(x, y)`. Points past the east or
    /// north edge read the connected neighbour, nudged by whole units so the
    /// value stays continuous with ours across the seam.
    pub fn composition_xy(&self, id: SurfaceId, x: f32, y: f32) -> f32 {
        let Ok(surface) = self.surface(id) else {
            return 0.0;
        };
        let width = surface.grid().meters_per_edge();
        let own = surface.composition();

        let dir = match (x >= width, y >= width) {
            (true, true) => Some(Direction::NorthEast),
            (true, false) => Some(Direction::East),
            (false, true) => Some(Direction::North),
            (false, false) => None,
        };
        let adjacent = dir
            .and_then(|dir| surface.neighbor(dir))
            .and_then(|other| self.surface(other).ok());
        let Some(adjacent) = adjacent else {
            return own.get_value_scaled(x, y);
        };

        let (ax, ox) = if x >= width { (x - width, width - 1.0) } else { (x, x) };
        let (ay, oy) = if y >= width { (y - width, width - 1.0) } else { (y, y) };
        let mut adj = adjacent.composition().get_value_scaled(ax, ay);
        let ours = own.get_value_scaled(ox, oy);
        if !adj.is_finite() || !ours.is_finite() {
            return own.get_value_scaled(x, y);
        }
        // Composition values are indices; whole-unit offsets keep the blend
        // between the same pair of assets on both sides.
        while ours - adj >= 1.0 {
            adj += 1.0;
        }
        while adj - ours >= 1.0 {
            adj -= 1.0;
        }
        adj
    }

    pub fn point_region(&self, patch: PatchRef, x: u32, y: u32) -> Option<Vec3> {
        let surface = self.surface(patch.surface).ok()?;
        let own = surface.patch_by_index(patch.index)?;
        let grid = surface.grid();
        let gppe = grid.grids_per_patch_edge();
        let mpg = grid.meters_per_grid();
        let (gx, gy) = own.grid_position();
        Some(Vec3::new(
            (gx * gppe + x) as f32 * mpg,
            (gy * gppe + y) as f32 * mpg,
            grid.patch_z(own.data_offset(), x, y),
        ))
    }

    pub fn normal(&self, patch: PatchRef, x: u32, y: u32) -> Option<Vec3> {
        let surface = self.surface(patch.surface).ok()?;
        let own = surface.patch_by_index(patch.index)?;
        Some(surface.grid().patch_normal(own.data_offset(), x, y))
    }

    /// Detail texture coordinates: planar mapping in grid units, and the
    /// composition value with its dither term.
    pub fn tex_coords(&self, patch: PatchRef, x: u32, y: u32) -> Option<(Vec2, Vec2)> {
        let surface = self.surface(patch.surface).ok()?;
        let own = surface.patch_by_index(patch.index)?;
        let grid = surface.grid();
        let mpg = grid.meters_per_grid();
        let position = self.point_region(patch, x, y)?;
        let tex0 = Vec2::new(position.x, position.y) / grid.grids_per_edge() as f32;

        let origin = own.origin_region();
        let composition = self.composition_xy(
            patch.surface,
            origin.x + x as f32 * mpg,
            origin.y + y as f32 * mpg,
        );

        let global = own.origin_global();
        let lattice = Vec2::new(
            ((global.x + (x as f32 * mpg) as f64) as f32 * DITHER_SCALE) % 256.0,
            ((global.y + (y as f32 * mpg) as f64) as f32 * DITHER_SCALE) % 256.0,
        );
        let dither = (noise2(lattice) * 0.75 + 0.5).clamp(0.0, 1.0);
        Some((tex0, Vec2::new(composition, dither)))
    }

    /// The vertex the tessellator emits for patch-local grid `(x, y)`.
    pub fn eval(&self, patch: PatchRef, x: u32, y: u32) -> TerrainVertex {
        let position = self.point_region(patch, x, y).unwrap_or(Vec3::ZERO);
        let normal = self.normal(patch, x, y).unwrap_or(Vec3::Z);
        let (tex0, tex1) = self.tex_coords(patch, x, y).unwrap_or_default();
        TerrainVertex {
            position,
            normal,
            tex0,
            tex1,
        }
    }

    /// Tessellates a patch at its current render stride, stitched to the
    /// strides of its north and east neighbours.
    pub fn build_patch_geometry(&self, patch: PatchRef) -> Result<PatchGeometry> {
        let own = self
            .patch(patch)
            .ok_or_else(|| Error::lookup(format!("{patch:?}")))?;
        let width = self.surface(patch.surface)?.grid().grids_per_patch_edge();
        let stride = own.render_stride();
        let neighbor_stride = |dir| {
            own.neighbor(dir)
                .and_then(|other| self.patch(other))
                .map_or(stride, |p| p.render_stride())
        };
        let north_stride = neighbor_stride(Direction::North);
        let east_stride = neighbor_stride(Direction::East);
        let comp = own.composition_stats();
        let base_comp = base_composition(comp.min, comp.max);

        Ok(build_patch_geometry(
            &self.patch_view(patch),
            width,
            stride,
            north_stride,
            east_stride,
            base_comp,
        ))
    }

    /// Builds geometry for the patch and clears its re-tessellation flag.
    pub fn rebuild_patch_geometry(&mut self, patch: PatchRef) -> Result<PatchGeometry> {
        let geom = self.build_patch_geometry(patch)?;
        if let Some(own) = self.patch_mut(patch) {
            own.geometry_dirty = false;
        }
        Ok(geom)
    }
}
