pub mod direction;
pub mod lod;
pub mod patch;
mod raycast;
pub mod water;

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use glam::{DVec3, Vec3};
use image::{RgbImage, RgbaImage};
use resource_pool::Handle;
use tracing::warn;

use crate::composition::Composition;
use crate::config::TerrainSettings;
use crate::error::{GeometryError, Result};
use direction::Direction;
use lod::RenderLevelTable;
use patch::{CompositionStats, Patch, PatchRef};

/// Generational handle of a surface owned by a [`crate::Terrain`].
#[derive(Clone, Copy, Default)]
pub struct SurfaceId(pub(crate) Handle<Surface>);

impl SurfaceId {
    pub fn slot(&self) -> u32 {
        self.0.slot as u32
    }
}

impl PartialEq for SurfaceId {
    fn eq(&self, other: &Self) -> bool {
        self.0.slot == other.0.slot && self.0.generation == other.0.generation
    }
}

impl Eq for SurfaceId {}

impl Hash for SurfaceId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.slot.hash(state);
        self.0.generation.hash(state);
    }
}

impl fmt::Debug for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SurfaceId(slot: {}, generation: {})", self.0.slot, self.0.generation)
    }
}

/// Region-wide height and normal samples plus the grid constants that
/// describe them. The last row and column are the north/east overlap buffer.
#[derive(Debug, Clone)]
pub struct HeightGrid {
    grids_per_edge: u32,
    grids_per_patch_edge: u32,
    patches_per_edge: u32,
    meters_per_grid: f32,
    meters_per_edge: f32,
    heights: Vec<f32>,
    normals: Vec<Vec3>,
}

impl HeightGrid {
    /// `grids_per_edge` includes the overlap buffer, e.g. 257 for a 256 m
    /// region sampled every meter.
    pub fn new(grids_per_edge: u32, grids_per_patch_edge: u32, width: f32) -> Result<Self> {
        let fail = |reason: &'static str| GeometryError {
            grids_per_edge,
            grids_per_patch_edge,
            reason,
        };

        if grids_per_edge < 3 || !(grids_per_edge - 1).is_power_of_two() {
            return Err(fail("grids per edge must be one more than a power of two").into());
        }
        if grids_per_patch_edge < 2 || !grids_per_patch_edge.is_power_of_two() {
            return Err(fail("grids per patch edge must be a power of two of at least 2").into());
        }
        if (grids_per_edge - 1) % grids_per_patch_edge != 0 {
            return Err(fail("patch edge does not divide the surface edge").into());
        }
        if !(width.is_finite() && width > 0.0) {
            return Err(fail("surface width must be positive").into());
        }

        let count = (grids_per_edge * grids_per_edge) as usize;
        let meters_per_grid = width / (grids_per_edge - 1) as f32;
        Ok(Self {
            grids_per_edge,
            grids_per_patch_edge,
            patches_per_edge: (grids_per_edge - 1) / grids_per_patch_edge,
            meters_per_grid,
            meters_per_edge: meters_per_grid * (grids_per_edge - 1) as f32,
            heights: vec![0.0; count],
            normals: vec![Vec3::Z; count],
        })
    }

    pub fn grids_per_edge(&self) -> u32 {
        self.grids_per_edge
    }

    pub fn grids_per_patch_edge(&self) -> u32 {
        self.grids_per_patch_edge
    }

    pub fn patches_per_edge(&self) -> u32 {
        self.patches_per_edge
    }

    pub fn patch_count(&self) -> u32 {
        self.patches_per_edge * self.patches_per_edge
    }

    pub fn meters_per_grid(&self) -> f32 {
        self.meters_per_grid
    }

    pub fn meters_per_edge(&self) -> f32 {
        self.meters_per_edge
    }

    pub fn heights(&self) -> &[f32] {
        &self.heights
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    fn index(&self, x: u32, y: u32) -> usize {
        let last = self.grids_per_edge - 1;
        (x.min(last) + y.min(last) * self.grids_per_edge) as usize
    }

    /// Sample at grid coordinates; out-of-range coordinates clamp.
    pub fn z(&self, x: u32, y: u32) -> f32 {
        self.heights[self.index(x, y)]
    }

    pub fn set_z(&mut self, x: u32, y: u32, z: f32) {
        let idx = self.index(x, y);
        self.heights[idx] = z;
    }

    pub fn move_z(&mut self, x: u32, y: u32, delta: f32) {
        let idx = self.index(x, y);
        self.heights[idx] += delta;
    }

    pub fn normal(&self, x: u32, y: u32) -> Vec3 {
        self.normals[self.index(x, y)]
    }

    /// Sample of the patch window starting at `offset`.
    pub(crate) fn patch_z(&self, offset: usize, x: u32, y: u32) -> f32 {
        self.heights[offset + (x + y * self.grids_per_edge) as usize]
    }

    pub(crate) fn set_patch_z(&mut self, offset: usize, x: u32, y: u32, z: f32) {
        let idx = offset + (x + y * self.grids_per_edge) as usize;
        self.heights[idx] = z;
    }

    pub(crate) fn patch_normal(&self, offset: usize, x: u32, y: u32) -> Vec3 {
        self.normals[offset + (x + y * self.grids_per_edge) as usize]
    }

    pub(crate) fn set_patch_normal(&mut self, offset: usize, x: u32, y: u32, normal: Vec3) {
        let idx = offset + (x + y * self.grids_per_edge) as usize;
        self.normals[idx] = normal;
    }

    pub fn contains_position(&self, x: f32, y: f32) -> bool {
        x >= 0.0 && x <= self.meters_per_edge && y >= 0.0 && y <= self.meters_per_edge
    }

    /// Height at region-local meters, planar within the triangle of the grid
    /// cell that contains the point. Cells split along their SW-NE diagonal;
    /// points strictly above it use the north-west triangle. Positions off the
    /// surface clamp to its border.
    pub fn resolve_height_region(&self, x: f32, y: f32) -> f32 {
        let x = x.clamp(0.0, self.meters_per_edge);
        let y = y.clamp(0.0, self.meters_per_edge);
        let inv_mpg = 1.0 / self.meters_per_grid;
        let last = self.grids_per_edge - 1;

        let left = ((x * inv_mpg).floor() as u32).min(last);
        let bottom = ((y * inv_mpg).floor() as u32).min(last);
        let right = if left + 1 < last { left + 1 } else { left };
        let top = if bottom + 1 < last { bottom + 1 } else { bottom };

        let left_bottom = self.z(left, bottom);
        let right_bottom = self.z(right, bottom);
        let left_top = self.z(left, top);
        let right_top = self.z(right, top);

        let mut dx = x - left as f32 * self.meters_per_grid;
        let mut dy = y - bottom as f32 * self.meters_per_grid;
        if dy > dx {
            dy *= left_top - left_bottom;
            dx *= right_top - left_top;
        } else {
            dx *= right_bottom - left_bottom;
            dy *= right_top - right_bottom;
        }
        left_bottom + (dx + dy) * inv_mpg
    }

    /// Face normal of the cell triangle under a region-local position.
    pub fn resolve_normal_region(&self, x: f32, y: f32) -> Vec3 {
        let inv_mpg = 1.0 / self.meters_per_grid;
        let max_cell = self.grids_per_edge - 2;
        let x = x.max(0.0);
        let y = y.max(0.0);
        let i = ((x * inv_mpg) as u32).min(max_cell);
        let j = ((y * inv_mpg) as u32).min(max_cell);

        let n = self.grids_per_edge as usize;
        let k = (i + j * self.grids_per_edge) as usize;
        let z = &self.heights;

        let dx = x - i as f32 * self.meters_per_grid;
        let dy = y - j as f32 * self.meters_per_grid;
        let normal = if dy > dx {
            let dzx = z[k + 1 + n] - z[k + n];
            let dzy = z[k] - z[k + n];
            Vec3::new(-dzx, dzy, 1.0)
        } else {
            let dzx = z[k] - z[k + 1];
            let dzy = z[k + 1 + n] - z[k + 1];
            Vec3::new(dzx, -dzy, 1.0)
        };
        normal.normalize_or(Vec3::Z)
    }

    /// Patch grid coordinates under a region-local position, clamped to the
    /// nearest boundary patch.
    pub fn resolve_patch_coords(&self, x: f32, y: f32) -> (u32, u32) {
        let patch_meters = self.meters_per_grid * self.grids_per_patch_edge as f32;
        let resolve = |v: f32| {
            if v < 0.0 {
                0
            } else if v >= self.meters_per_edge {
                self.patches_per_edge - 1
            } else {
                ((v / patch_meters) as u32).min(self.patches_per_edge - 1)
            }
        };
        (resolve(x), resolve(y))
    }
}

/// One region's heightfield, its patches and composition state.
#[derive(Debug)]
pub struct Surface {
    id: SurfaceId,
    pub(crate) grid: HeightGrid,
    pub(crate) patches: Vec<Patch>,
    pub(crate) neighbors: [Option<SurfaceId>; 8],
    pub(crate) composition: Composition,
    origin_global: DVec3,
    dirty_patches: BTreeSet<u32>,
    pub(crate) min_z: f32,
    pub(crate) max_z: f32,
    pub(crate) has_z_data: bool,
    water_height: f32,
    lod: RenderLevelTable,
    pub(crate) texture: RgbImage,
    pub(crate) water_texture: RgbaImage,
    pub(crate) visible_patch_count: u32,
}

impl Surface {
    pub(crate) fn new(
        grids_per_edge: u32,
        grids_per_patch_edge: u32,
        origin_global: DVec3,
        width: f32,
        settings: &TerrainSettings,
    ) -> Result<Self> {
        let grid = HeightGrid::new(grids_per_edge, grids_per_patch_edge, width)?;
        let ppe = grid.patches_per_edge();
        let gppe = grid.grids_per_patch_edge();
        let mpg = grid.meters_per_grid();

        let mut patches = Vec::with_capacity(grid.patch_count() as usize);
        for j in 0..ppe {
            for i in 0..ppe {
                let data_offset = (i * gppe + j * gppe * grids_per_edge) as usize;
                let origin_region = Vec3::new(
                    (i * gppe) as f32 * mpg,
                    (j * gppe) as f32 * mpg,
                    0.0,
                );
                patches.push(Patch::new(i, j, data_offset, origin_region, gppe));
            }
        }

        let composition = Composition::new(grids_per_edge - 1, mpg, settings);
        let texture_size = settings.texture_size.max(1);

        let mut surface = Self {
            id: SurfaceId::default(),
            lod: RenderLevelTable::new(gppe),
            grid,
            patches,
            neighbors: [None; 8],
            composition,
            origin_global,
            dirty_patches: BTreeSet::new(),
            min_z: 10000.0,
            max_z: -10000.0,
            has_z_data: false,
            water_height: settings.default_water_height,
            texture: RgbImage::new(texture_size, texture_size),
            water_texture: water::blank_water_texture((texture_size / 2).max(1)),
            visible_patch_count: 0,
        };
        surface.set_origin_global(origin_global);
        Ok(surface)
    }

    /// Links every patch to its in-surface neighbours once the surface knows
    /// its own id.
    pub(crate) fn wire_patches(&mut self, id: SurfaceId) {
        self.id = id;
        let ppe = self.grid.patches_per_edge() as i32;
        for j in 0..ppe {
            for i in 0..ppe {
                let index = (i + j * ppe) as usize;
                for dir in Direction::ALL {
                    let (dx, dy) = dir.offset();
                    let (ni, nj) = (i + dx, j + dy);
                    let link = if ni >= 0 && ni < ppe && nj >= 0 && nj < ppe {
                        Some(PatchRef::new(id, (ni + nj * ppe) as u32))
                    } else {
                        None
                    };
                    self.patches[index].set_neighbor(dir, link);
                }
            }
        }
    }

    pub fn id(&self) -> SurfaceId {
        self.id
    }

    pub fn grid(&self) -> &HeightGrid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut HeightGrid {
        &mut self.grid
    }

    pub fn composition(&self) -> &Composition {
        &self.composition
    }

    pub fn composition_mut(&mut self) -> &mut Composition {
        &mut self.composition
    }

    pub fn origin_global(&self) -> DVec3 {
        self.origin_global
    }

    /// Moves the surface and every patch, forgetting all visibility results.
    pub fn set_origin_global(&mut self, origin_global: DVec3) {
        self.origin_global = origin_global;
        let gppe = self.grid.grids_per_patch_edge();
        let half = 0.5 * gppe as f32 * self.grid.meters_per_grid();
        for patch in &mut self.patches {
            patch.set_origin_global(origin_global);
            let origin = patch.origin_region();
            patch.stats.center_region.x = origin.x + half;
            patch.stats.center_region.y = origin.y + half;
            patch.reset_visibility(gppe);
        }
    }

    pub fn neighbor(&self, dir: Direction) -> Option<SurfaceId> {
        self.neighbors[dir.index()]
    }

    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    pub fn patch(&self, i: u32, j: u32) -> Option<&Patch> {
        let ppe = self.grid.patches_per_edge();
        if i >= ppe || j >= ppe {
            warn!("Asking for patch ({}, {}) out of bounds", i, j);
            return None;
        }
        self.patches.get((i + j * ppe) as usize)
    }

    pub fn patch_by_index(&self, index: u32) -> Option<&Patch> {
        self.patches.get(index as usize)
    }

    pub(crate) fn patch_mut(&mut self, index: u32) -> Option<&mut Patch> {
        self.patches.get_mut(index as usize)
    }

    pub fn patch_ref(&self, i: u32, j: u32) -> PatchRef {
        PatchRef::new(self.id, i + j * self.grid.patches_per_edge())
    }

    pub fn min_z(&self) -> f32 {
        self.min_z
    }

    pub fn max_z(&self) -> f32 {
        self.max_z
    }

    pub fn has_z_data(&self) -> bool {
        self.has_z_data
    }

    pub fn water_height(&self) -> f32 {
        self.water_height
    }

    /// Moves the waterline and repaints the whole water tile once heights
    /// have arrived.
    pub fn set_water_height(&mut self, height: f32) {
        if self.water_height == height {
            return;
        }
        self.water_height = height;
        if self.has_z_data {
            let width = self.grid.meters_per_edge();
            self.generate_water_texture(0.0, 0.0, width);
        }
    }

    pub fn render_levels(&self) -> &RenderLevelTable {
        &self.lod
    }

    pub fn texture(&self) -> &RgbImage {
        &self.texture
    }

    /// Half-resolution water overlay. Alpha encodes depth below the waterline.
    pub fn water_texture(&self) -> &RgbaImage {
        &self.water_texture
    }

    pub fn visible_patch_count(&self) -> u32 {
        self.visible_patch_count
    }

    pub fn dirty_patches(&self) -> impl Iterator<Item = u32> + '_ {
        self.dirty_patches.iter().copied()
    }

    pub(crate) fn schedule_patch(&mut self, index: u32) {
        self.dirty_patches.insert(index);
    }

    pub(crate) fn unschedule_patch(&mut self, index: u32) {
        self.dirty_patches.remove(&index);
    }

    /// Sets the patch dirty flags, queueing it for the next idle update.
    pub(crate) fn dirty_patch(&mut self, index: u32) {
        let Some(patch) = self.patches.get_mut(index as usize) else {
            return;
        };
        if patch.mark_dirty() {
            self.dirty_patches.insert(index);
        }
    }

    pub fn contains_position(&self, x: f32, y: f32) -> bool {
        self.grid.contains_position(x, y)
    }

    pub fn region_from_global(&self, pos_global: DVec3) -> Vec3 {
        (pos_global - self.origin_global).as_vec3()
    }

    pub fn resolve_height_region(&self, x: f32, y: f32) -> f32 {
        self.grid.resolve_height_region(x, y)
    }

    pub fn resolve_height_global(&self, pos_global: DVec3) -> f32 {
        let pos = self.region_from_global(pos_global);
        self.grid.resolve_height_region(pos.x, pos.y)
    }

    pub fn resolve_normal_global(&self, pos_global: DVec3) -> Vec3 {
        let pos = self.region_from_global(pos_global);
        self.grid.resolve_normal_region(pos.x, pos.y)
    }

    pub fn resolve_patch_region(&self, x: f32, y: f32) -> PatchRef {
        let (i, j) = self.grid.resolve_patch_coords(x, y);
        self.patch_ref(i, j)
    }

    pub fn resolve_patch_global(&self, pos_global: DVec3) -> PatchRef {
        let pos = self.region_from_global(pos_global);
        self.resolve_patch_region(pos.x, pos.y)
    }

    /// Recomputes the patch's height bounds if its heights changed, folding
    /// them into the surface-wide running bounds.
    pub(crate) fn update_vertical_stats(&mut self, index: u32) {
        let gppe = self.grid.grids_per_patch_edge();
        let mpg = self.grid.meters_per_grid();
        let Some(patch) = self.patches.get_mut(index as usize) else {
            return;
        };
        if !patch.stats.dirty {
            return;
        }

        let offset = patch.data_offset();
        let mut min_z = self.grid.patch_z(offset, 0, 0);
        let mut max_z = min_z;
        let mut total = 0.0;
        let mut count = 0u32;
        for j in 0..=gppe {
            for i in 0..=gppe {
                let z = self.grid.patch_z(offset, i, j);
                min_z = min_z.min(z);
                max_z = max_z.max(z);
                total += z;
                count += 1;
            }
        }

        let stats = &mut patch.stats;
        stats.min_z = min_z;
        stats.max_z = max_z;
        stats.mean_z = total / count as f32;
        stats.center_region.z = 0.5 * (min_z + max_z);
        let edge = mpg * gppe as f32;
        stats.radius = Vec3::new(edge, edge, max_z - min_z).length() * 0.5;
        stats.dirty = false;

        self.max_z = self.max_z.max(max_z);
        self.min_z = self.min_z.min(min_z);
        self.has_z_data = true;
    }

    /// Min, mean and max composition value sampled over the patch.
    pub(crate) fn update_composition_stats(&mut self, index: u32) {
        let mpg = self.grid.meters_per_grid();
        let size = mpg * (self.grid.grids_per_patch_edge() + 1) as f32;
        let Some(patch) = self.patches.get_mut(index as usize) else {
            return;
        };
        let origin = patch.origin_region();
        let layer = self.composition.layer();

        let mut min = layer.get_value_scaled(origin.x, origin.y);
        let mut max = min;
        let mut mean = 0.0;
        let mut count = 0u32;
        let mut j = 0.0;
        while j < size {
            let mut i = 0.0;
            while i < size {
                let comp = layer.get_value_scaled(origin.x + i, origin.y + j);
                mean += comp;
                min = min.min(comp);
                max = max.max(comp);
                count += 1;
                i += mpg;
            }
            j += mpg;
        }

        patch.composition = CompositionStats {
            min,
            mean: mean / count.max(1) as f32,
            max,
        };
    }

    /// Regenerates the composition values under a patch once per dirtying.
    pub(crate) fn generate_patch_heights(&mut self, index: u32) -> bool {
        let Some(patch) = self.patches.get(index as usize) else {
            return false;
        };
        if patch.heights_generated {
            return true;
        }

        let origin = patch.origin_region();
        let size = self.grid.meters_per_grid() * (self.grid.grids_per_patch_edge() + 1) as f32;
        let grid = &self.grid;
        let generated = self
            .composition
            .generate_heights(self.origin_global, origin.x, origin.y, size, |x, y| {
                grid.resolve_height_region(x, y)
            });

        if generated {
            if let Some(patch) = self.patches.get_mut(index as usize) {
                patch.heights_generated = true;
            }
        }
        generated
    }

    pub(crate) fn set_neighbor(&mut self, dir: Direction, id: Option<SurfaceId>) {
        self.neighbors[dir.index()] = id;
    }

    /// Connected neighbours and the side they sit on.
    pub fn neighboring_surfaces(&self) -> Vec<(Direction, SurfaceId)> {
        Direction::ALL
            .into_iter()
            .filter_map(|dir| self.neighbors[dir.index()].map(|id| (dir, id)))
            .collect()
    }
}
