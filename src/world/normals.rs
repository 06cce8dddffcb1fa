use glam::Vec3;

use super::Terrain;
use crate::surface::direction::{Direction, MIDDLE_REGION};
use crate::surface::patch::PatchRef;

/// Stride used when refreshing normals after a height change.
const NORMAL_STRIDE: u32 = 2;

impl Terrain {
    /// Height at patch-local `(x, y)`, which may lie past this patch's
    /// borders. Offsets step into the neighbour on that side, or clamp to
    /// this patch when there is none.
    fn reach_z(&self, patch: PatchRef, x: i32, y: i32) -> Option<f32> {
        let surface = self.surface(patch.surface).ok()?;
        let width = surface.grid().grids_per_patch_edge() as i32;
        let mut at = patch;
        let (mut x, mut y) = (x, y);

        if x < 0 {
            match self.patch_neighbor(at, Direction::West) {
                Some(west) => {
                    x += width;
                    at = west;
                }
                None => x = 0,
            }
        }
        if y < 0 {
            match self.patch_neighbor(at, Direction::South) {
                Some(south) => {
                    y += width;
                    at = south;
                }
                None => y = 0,
            }
        }
        if x >= width {
            match self.patch_neighbor(at, Direction::East) {
                Some(east) => {
                    x -= width;
                    at = east;
                }
                None => x = width - 1,
            }
        }
        if y >= width {
            match self.patch_neighbor(at, Direction::North) {
                Some(north) => {
                    y -= width;
                    at = north;
                }
                None => y = width - 1,
            }
        }

        let target = self.patch(at)?;
        let grid = self.surface(at.surface).ok()?.grid();
        Some(grid.patch_z(target.data_offset(), x.max(0) as u32, y.max(0) as u32))
    }

    /// Normal at patch-local `(x, y)` from the diamond of samples `stride`
    /// grid cells away on each diagonal.
    pub fn calc_normal(&mut self, patch: PatchRef, x: u32, y: u32, stride: u32) {
        let Some(offset) = self.patch(patch).map(|p| p.data_offset()) else {
            return;
        };
        let Ok(surface) = self.surface(patch.surface) else {
            return;
        };
        let reach = (stride as f32) * surface.grid().meters_per_grid();
        let (x, y, s) = (x as i32, y as i32, stride as i32);
        let z = |dx: i32, dy: i32| self.reach_z(patch, x + dx, y + dy).unwrap_or(0.0);

        let p00 = Vec3::new(-reach, -reach, z(-s, -s));
        let p01 = Vec3::new(-reach, reach, z(-s, s));
        let p10 = Vec3::new(reach, -reach, z(s, -s));
        let p11 = Vec3::new(reach, reach, z(s, s));

        let c1 = p11 - p00;
        let c2 = p01 - p10;
        let normal = c1.cross(c2).normalize_or(Vec3::Z);

        if let Ok(surface) = self.surface_mut(patch.surface) {
            surface
                .grid
                .set_patch_normal(offset, x as u32, y as u32, normal);
        }
    }

    /// The sample the north-east corner normals read before neighbours may
    /// have delivered heights.
    fn fill_north_east_corner(&mut self, patch: PatchRef) {
        let Some(own) = self.patch(patch) else {
            return;
        };
        let Ok(surface) = self.surface(patch.surface) else {
            return;
        };
        let offset = own.data_offset();
        let grid = surface.grid();
        let g = grid.grids_per_patch_edge();
        let diagonal = grid.patch_z(offset, g - 1, g - 1);

        let remote_z = |other: PatchRef, x: u32, y: u32| -> Option<f32> {
            let target = self.patch(other)?;
            let grid = self.surface(other.surface).ok()?.grid();
            Some(grid.patch_z(target.data_offset(), x, y))
        };
        let received = |other: PatchRef| self.patch(other).is_some_and(|p| p.has_received_data());

        let north = own.neighbor(Direction::North);
        let east = own.neighbor(Direction::East);
        let value = match own.neighbor(Direction::NorthEast) {
            None => match (north, east) {
                (None, Some(east)) if received(east) => remote_z(east, 0, g - 1),
                (Some(north), None) if received(north) => remote_z(north, g - 1, 0),
                _ => Some(diagonal),
            },
            Some(north_east) if north_east.surface != patch.surface => {
                let foreign = |p: Option<PatchRef>| p.map_or(true, |p| p.surface != patch.surface);
                if foreign(north) && foreign(east) {
                    remote_z(north_east, 0, 0)
                } else {
                    None
                }
            }
            Some(_) => None,
        };

        if let Some(z) = value {
            if let Ok(surface) = self.surface_mut(patch.surface) {
                surface.grid.set_patch_z(offset, g, g, z);
            }
        }
    }

    /// Recomputes the normals of every invalid region of a patch. Returns
    /// true if anything was recomputed, in which case the patch is queued
    /// for re-tessellation.
    pub fn update_normals(&mut self, patch: PatchRef) -> bool {
        let Some(own) = self.patch(patch) else {
            return false;
        };
        if !own.has_invalid_normals() {
            return false;
        }
        let invalid = |dirs: &[Direction]| dirs.iter().any(|d| own.normals_invalid(d.index()));
        let east = invalid(&[Direction::East, Direction::NorthEast, Direction::SouthEast]);
        let north = invalid(&[Direction::NorthEast, Direction::North, Direction::NorthWest]);
        let west = invalid(&[Direction::NorthWest, Direction::West, Direction::SouthWest]);
        let south = invalid(&[Direction::SouthWest, Direction::South, Direction::SouthEast]);
        let north_east = own.normals_invalid(Direction::NorthEast.index());
        let middle = own.normals_invalid(MIDDLE_REGION);

        let Ok(surface) = self.surface(patch.surface) else {
            return false;
        };
        let g = surface.grid().grids_per_patch_edge();
        let s = NORMAL_STRIDE;
        let mut recomputed = false;

        if east {
            for j in 0..=g {
                for x in [g, g - 1, g.saturating_sub(2)] {
                    self.calc_normal(patch, x, j, s);
                }
            }
            recomputed = true;
        }
        if north {
            for i in 0..=g {
                for y in [g, g - 1, g.saturating_sub(2)] {
                    self.calc_normal(patch, i, y, s);
                }
            }
            recomputed = true;
        }
        if west {
            for j in 0..g {
                self.calc_normal(patch, 0, j, s);
                self.calc_normal(patch, 1, j, s);
            }
            recomputed = true;
        }
        if south {
            for i in 0..g {
                self.calc_normal(patch, i, 0, s);
                self.calc_normal(patch, i, 1, s);
            }
            recomputed = true;
        }
        if north_east {
            self.fill_north_east_corner(patch);
            self.calc_normal(patch, g, g, s);
            self.calc_normal(patch, g, g - 1, s);
            self.calc_normal(patch, g - 1, g, s);
            self.calc_normal(patch, g - 1, g - 1, s);
            recomputed = true;
        }
        if middle {
            for j in 2..g.saturating_sub(2) {
                for i in 2..g.saturating_sub(2) {
                    self.calc_normal(patch, i, j, s);
                }
            }
            recomputed = true;
        }

        if let Ok(surface) = self.surface_mut(patch.surface) {
            if let Some(own) = surface.patch_mut(patch.index) {
                own.take_invalid_normals();
                if recomputed {
                    own.geometry_dirty = true;
                }
            }
            if recomputed {
                surface.schedule_patch(patch.index);
            }
        }
        recomputed
    }
}
