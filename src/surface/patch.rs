use glam::{DVec3, Vec3};

use super::direction::{Direction, EdgeMask, NORMAL_REGION_COUNT};
use super::SurfaceId;

/// Visible distance a patch reports before its first visibility pass.
pub const DEFAULT_VISIBLE_DISTANCE: f32 = 512.0;

/// Addresses one patch of one surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PatchRef {
    pub surface: SurfaceId,
    pub index: u32,
}

impl PatchRef {
    pub fn new(surface: SurfaceId, index: u32) -> Self {
        Self { surface, index }
    }
}

/// Height bounds of a patch, recomputed lazily after its heights change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerticalStats {
    pub min_z: f32,
    pub max_z: f32,
    pub mean_z: f32,
    pub radius: f32,
    /// Bounding-sphere centre relative to the surface origin.
    pub center_region: Vec3,
    pub dirty: bool,
}

impl Default for VerticalStats {
    fn default() -> Self {
        Self {
            min_z: 0.0,
            max_z: 0.0,
            mean_z: 0.0,
            radius: 0.0,
            center_region: Vec3::ZERO,
            dirty: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositionStats {
    pub min: f32,
    pub mean: f32,
    pub max: f32,
}

impl Default for CompositionStats {
    fn default() -> Self {
        Self {
            min: 0.0,
            mean: 0.0,
            max: 0.0,
        }
    }
}

/// One square tile of a surface.
///
/// A patch does not own samples: `data_offset` locates its `(gppe + 1)²`
/// window in the surface arrays, the last row and column being the overlap
/// copied from the north and east neighbours.
#[derive(Debug, Clone)]
pub struct Patch {
    grid_x: u32,
    grid_y: u32,
    data_offset: usize,
    origin_region: Vec3,
    origin_global: DVec3,
    neighbors: [Option<PatchRef>; 8],
    connected_edges: EdgeMask,
    pub(crate) stats: VerticalStats,
    pub(crate) composition: CompositionStats,
    normals_invalid: [bool; NORMAL_REGION_COUNT],
    dirty: bool,
    pub(crate) heights_generated: bool,
    pub(crate) texture_update: bool,
    pub(crate) geometry_dirty: bool,
    has_received_data: bool,
    pub(crate) visible: bool,
    pub(crate) visible_distance: f32,
    pub(crate) render_level: u32,
    pub(crate) render_stride: u32,
    pub(crate) last_update_us: u64,
}

impl Patch {
    pub(crate) fn new(grid_x: u32, grid_y: u32, data_offset: usize, origin_region: Vec3, stride: u32) -> Self {
        Self {
            grid_x,
            grid_y,
            data_offset,
            origin_region,
            origin_global: DVec3::ZERO,
            neighbors: [None; 8],
            connected_edges: EdgeMask::NONE,
            stats: VerticalStats::default(),
            composition: CompositionStats::default(),
            normals_invalid: [true; NORMAL_REGION_COUNT],
            dirty: false,
            heights_generated: false,
            texture_update: true,
            geometry_dirty: true,
            has_received_data: false,
            visible: false,
            visible_distance: DEFAULT_VISIBLE_DISTANCE,
            render_level: 0,
            render_stride: stride,
            last_update_us: 0,
        }
    }

    pub fn grid_position(&self) -> (u32, u32) {
        (self.grid_x, self.grid_y)
    }

    pub fn data_offset(&self) -> usize {
        self.data_offset
    }

    pub fn origin_region(&self) -> Vec3 {
        self.origin_region
    }

    pub fn origin_global(&self) -> DVec3 {
        self.origin_global
    }

    pub(crate) fn set_origin_global(&mut self, surface_origin: DVec3) {
        self.origin_global = surface_origin + self.origin_region.as_dvec3();
    }

    pub fn neighbor(&self, dir: Direction) -> Option<PatchRef> {
        self.neighbors[dir.index()]
    }

    pub fn neighbors(&self) -> &[Option<PatchRef>; 8] {
        &self.neighbors
    }

    /// Replaces one neighbour link. Normals along that side (and, for an
    /// edge, both of its corners) are recomputed on the next pass.
    pub(crate) fn set_neighbor(&mut self, dir: Direction, patch: Option<PatchRef>) {
        self.neighbors[dir.index()] = patch;
        self.normals_invalid[dir.index()] = true;
        if dir.is_cardinal() {
            for corner in dir.adjacent_corners() {
                self.normals_invalid[corner.index()] = true;
            }
        }
    }

    pub fn connected_edges(&self) -> EdgeMask {
        self.connected_edges
    }

    pub(crate) fn connect_edge(&mut self, dir: Direction) {
        if let Some(edge) = dir.edge() {
            self.connected_edges.insert(edge);
        }
    }

    pub(crate) fn disconnect_edge(&mut self, dir: Direction) {
        if let Some(edge) = dir.edge() {
            self.connected_edges.remove(edge);
        }
    }

    pub fn stats(&self) -> &VerticalStats {
        &self.stats
    }

    pub fn composition_stats(&self) -> &CompositionStats {
        &self.composition
    }

    pub fn normals_invalid(&self, region: usize) -> bool {
        self.normals_invalid.get(region).copied().unwrap_or(false)
    }

    pub fn has_invalid_normals(&self) -> bool {
        self.normals_invalid.iter().any(|b| *b)
    }

    pub(crate) fn invalidate_normals(&mut self, region: usize) {
        if let Some(flag) = self.normals_invalid.get_mut(region) {
            *flag = true;
        }
    }

    pub(crate) fn invalidate_all_normals(&mut self) {
        self.normals_invalid = [true; NORMAL_REGION_COUNT];
    }

    pub(crate) fn take_invalid_normals(&mut self) -> [bool; NORMAL_REGION_COUNT] {
        std::mem::replace(&mut self.normals_invalid, [false; NORMAL_REGION_COUNT])
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Marks the patch for an idle update. Returns true if it was clean.
    pub(crate) fn mark_dirty(&mut self) -> bool {
        self.stats.dirty = true;
        self.heights_generated = false;
        self.geometry_dirty = true;
        let was_clean = !self.dirty;
        self.dirty = true;
        was_clean
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub fn has_received_data(&self) -> bool {
        self.has_received_data
    }

    pub(crate) fn set_has_received_data(&mut self) {
        self.has_received_data = true;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn visible_distance(&self) -> f32 {
        self.visible_distance
    }

    pub fn render_level(&self) -> u32 {
        self.render_level
    }

    pub fn render_stride(&self) -> u32 {
        self.render_stride
    }

    pub fn geometry_dirty(&self) -> bool {
        self.geometry_dirty
    }

    pub fn texture_update_pending(&self) -> bool {
        self.texture_update
    }

    pub fn last_update_us(&self) -> u64 {
        self.last_update_us
    }

    pub(crate) fn reset_visibility(&mut self, patch_width: u32) {
        self.visible = false;
        self.visible_distance = DEFAULT_VISIBLE_DISTANCE;
        self.render_level = 0;
        self.render_stride = patch_width;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::direction::MIDDLE_REGION;

    fn patch() -> Patch {
        let mut p = Patch::new(0, 0, 0, Vec3::ZERO, 16);
        p.take_invalid_normals();
        p
    }

    #[test]
    fn linking_an_edge_invalidates_its_corners() {
        let mut p = patch();
        p.set_neighbor(Direction::North, None);
        for region in 0..NORMAL_REGION_COUNT {
            let expected = matches!(region, 1 | 4 | 5);
            assert_eq!(p.normals_invalid(region), expected, "region {region}");
        }
    }

    #[test]
    fn linking_a_corner_touches_only_that_corner() {
        let mut p = patch();
        p.set_neighbor(Direction::SouthWest, None);
        assert!(p.normals_invalid(Direction::SouthWest.index()));
        assert!(!p.normals_invalid(Direction::South.index()));
        assert!(!p.normals_invalid(MIDDLE_REGION));
    }

    #[test]
    fn dirtying_twice_reports_once() {
        let mut p = patch();
        assert!(p.mark_dirty());
        assert!(!p.mark_dirty());
        p.clear_dirty();
        assert!(p.mark_dirty());
    }
}
