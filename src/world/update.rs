use tracing::debug;

use super::Terrain;
use crate::camera::TerrainCamera;
use crate::composition::assets::AssetFetcher;
use crate::error::Result;
use crate::surface::direction::{Direction, EdgeMask};
use crate::surface::patch::PatchRef;
use crate::surface::SurfaceId;
use crate::utils::timer::UpdateTimer;

/// What one idle update pass got through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdleStats {
    pub dirty: u32,
    pub textured: u32,
    pub deferred: u32,
}

impl IdleStats {
    pub fn did_update(&self) -> bool {
        self.textured > 0
    }
}

impl Terrain {
    /// Queues a patch for the next idle update.
    pub fn dirty(&mut self, patch: PatchRef) {
        if let Ok(surface) = self.surface_mut(patch.surface) {
            surface.dirty_patch(patch.index);
        }
    }

    /// Marks a patch's heights as changed: all its normals and the bordering
    /// normals of every neighbour go stale, and they are all queued.
    pub fn dirty_z(&mut self, patch: PatchRef) {
        let Some(own) = self.patch_mut(patch) else {
            return;
        };
        own.texture_update = true;
        own.invalidate_all_normals();
        let neighbors = *own.neighbors();

        for dir in Direction::ALL {
            let Some(other) = neighbors[dir.index()] else {
                continue;
            };
            let opposite = dir.opposite();
            if let Some(neighbor) = self.patch_mut(other) {
                neighbor.invalidate_normals(opposite.index());
                if opposite.is_cardinal() {
                    for corner in opposite.adjacent_corners() {
                        neighbor.invalidate_normals(corner.index());
                    }
                }
            }
            self.dirty(other);
        }

        self.dirty(patch);
        let now = self.clock.frame_time_us();
        if let Some(own) = self.patch_mut(patch) {
            own.last_update_us = now;
        }
    }

    pub fn dirty_all_patches(&mut self, id: SurfaceId) -> Result<()> {
        for patch in self.patch_refs(id)? {
            self.dirty_z(patch);
        }
        Ok(())
    }

    /// Refreshes the east overlap column from the east neighbour. Without a
    /// neighbour the last real column is extended instead.
    pub fn update_east_edge(&mut self, patch: PatchRef) {
        self.update_edge(patch, Direction::East);
    }

    /// Refreshes the north overlap row, like [`Terrain::update_east_edge`].
    pub fn update_north_edge(&mut self, patch: PatchRef) {
        self.update_edge(patch, Direction::North);
    }

    fn update_edge(&mut self, patch: PatchRef, dir: Direction) {
        let Some(own) = self.patch(patch) else {
            return;
        };
        let own_offset = own.data_offset();
        let edge = if dir == Direction::East {
            EdgeMask::EAST
        } else {
            EdgeMask::NORTH
        };
        let source = match own.neighbor(dir) {
            None => None,
            Some(other) if own.connected_edges().contains(edge) => Some(other),
            Some(_) => return,
        };

        let Ok(surface) = self.surface(patch.surface) else {
            return;
        };
        let g = surface.grid().grids_per_patch_edge();
        // Along-edge samples, first from this patch's inner line, else from
        // the neighbour's first line.
        let values: Vec<f32> = match source {
            None => (0..g)
                .map(|k| match dir {
                    Direction::East => surface.grid().patch_z(own_offset, g - 1, k),
                    _ => surface.grid().patch_z(own_offset, k, g - 1),
                })
                .collect(),
            Some(other) => {
                let Some(neighbor) = self.patch(other) else {
                    return;
                };
                let Ok(neighbor_surface) = self.surface(other.surface) else {
                    return;
                };
                let offset = neighbor.data_offset();
                let grid = neighbor_surface.grid();
                let n = g.min(grid.grids_per_patch_edge());
                (0..n)
                    .map(|k| match dir {
                        Direction::East => grid.patch_z(offset, 0, k),
                        _ => grid.patch_z(offset, k, 0),
                    })
                    .collect()
            }
        };

        if let Ok(surface) = self.surface_mut(patch.surface) {
            for (k, z) in values.into_iter().enumerate() {
                let k = k as u32;
                match dir {
                    Direction::East => surface.grid.set_patch_z(own_offset, g, k, z),
                    _ => surface.grid.set_patch_z(own_offset, k, g, z),
                }
            }
        }
    }

    /// Copies the overlap buffers touched by new heights in `patch`: its own
    /// north and east edges, then the west neighbour's east edge, the south
    /// west neighbour's east and north edges and the south neighbour's north
    /// edge. Must run before [`Terrain::dirty_z`] so recomputed normals see
    /// the copied samples.
    pub fn propagate_edges(&mut self, patch: PatchRef) {
        self.update_north_edge(patch);
        self.update_east_edge(patch);
        let neighbor = |dir| self.patch_neighbor(patch, dir);
        let (west, south_west, south) = (
            neighbor(Direction::West),
            neighbor(Direction::SouthWest),
            neighbor(Direction::South),
        );
        if let Some(west) = west {
            self.update_east_edge(west);
        }
        if let Some(south_west) = south_west {
            self.update_east_edge(south_west);
            self.update_north_edge(south_west);
        }
        if let Some(south) = south {
            self.update_north_edge(south);
        }
    }

    pub fn update_vertical_stats(&mut self, patch: PatchRef) {
        if let Ok(surface) = self.surface_mut(patch.surface) {
            surface.update_vertical_stats(patch.index);
        }
    }

    pub fn update_composition_stats(&mut self, patch: PatchRef) {
        if let Ok(surface) = self.surface_mut(patch.surface) {
            surface.update_composition_stats(patch.index);
        }
    }

    /// Culls a patch against the camera and picks its render stride. A stride
    /// change re-tessellates the patch and the two neighbours that stitch
    /// against it.
    pub fn update_visibility(&mut self, patch: PatchRef, camera: &TerrainCamera) {
        let settings_lod = self.settings.effective_lod_factor();
        let dynamic_lod = self.settings.dynamic_lod;
        let Ok(surface) = self.surface(patch.surface) else {
            return;
        };
        let Some(own) = surface.patch_by_index(patch.index) else {
            return;
        };

        let stats = own.stats();
        let center = surface.origin_global() + stats.center_region.as_dvec3();
        if !camera.sphere_visible(center, stats.radius) {
            if let Some(own) = self.patch_mut(patch) {
                own.visible = false;
            }
            return;
        }

        let mut distance = if dynamic_lod {
            let to_camera = (camera.position_global - center).length() as f32;
            (to_camera - stats.radius).max(0.0) / settings_lod
        } else {
            0.0
        };
        if !distance.is_finite() {
            distance = 0.0;
        }

        let grid = surface.grid();
        let max_candidate = 2 * grid.grids_per_patch_edge();
        let candidate = ((distance * 0.15 / grid.meters_per_grid()) as u32).min(max_candidate);
        let lod = surface.render_levels();
        let level = lod.render_level(candidate);
        let stride = lod.render_stride(level);
        let stride_changed = stride != own.render_stride();
        let west = own.neighbor(Direction::West);
        let south = own.neighbor(Direction::South);

        if let Some(own) = self.patch_mut(patch) {
            own.visible_distance = distance;
            own.render_level = level;
            own.render_stride = stride;
            own.visible = true;
            if stride_changed {
                own.geometry_dirty = true;
            }
        }
        if stride_changed {
            for other in [west, south].into_iter().flatten() {
                if let Some(neighbor) = self.patch_mut(other) {
                    neighbor.geometry_dirty = true;
                }
            }
        }
    }

    /// Runs visibility on every patch of a surface and returns how many are
    /// visible.
    pub fn update_patch_visibilities(&mut self, id: SurfaceId, camera: &TerrainCamera) -> Result<u32> {
        let patches = self.patch_refs(id)?;
        for patch in &patches {
            self.update_visibility(*patch, camera);
        }
        let surface = self.surface_mut(id)?;
        let visible = surface.patches().iter().filter(|p| p.is_visible()).count() as u32;
        surface.visible_patch_count = visible;
        Ok(visible)
    }

    /// Regenerates the composition under a patch. False while neighbours are
    /// still missing heights or the detail assets are not usable yet.
    pub fn update_texture(&mut self, patch: PatchRef, fetcher: &mut impl AssetFetcher) -> bool {
        let Some(own) = self.patch(patch) else {
            return false;
        };
        if !own.texture_update {
            return true;
        }
        let waiting = [Direction::East, Direction::West, Direction::South, Direction::North]
            .into_iter()
            .filter_map(|dir| own.neighbor(dir))
            .any(|other| self.patch(other).is_some_and(|n| !n.has_received_data()));
        if waiting {
            return false;
        }

        let Ok(surface) = self.surface_mut(patch.surface) else {
            return false;
        };
        if !surface.generate_patch_heights(patch.index) {
            return false;
        }
        if !surface.composition.generate_composition(fetcher) {
            return false;
        }
        if let Some(own) = surface.patch_mut(patch.index) {
            own.geometry_dirty = true;
        }
        true
    }

    /// Paints the patch's rectangle of the surface texture and of the water
    /// tile. The texture update flag stays set until the detail rasters are
    /// all available.
    pub fn update_gl(&mut self, patch: PatchRef, fetcher: &mut impl AssetFetcher) -> bool {
        self.update_composition_stats(patch);
        let Ok(surface) = self.surface_mut(patch.surface) else {
            return false;
        };
        let Some(origin) = surface.patch_by_index(patch.index).map(|p| p.origin_region()) else {
            return false;
        };
        let width = surface.grid.meters_per_grid() * surface.grid.grids_per_patch_edge() as f32;
        let painted = surface.composition.generate_minimap_tile_land(
            fetcher,
            &mut surface.texture,
            origin.x,
            origin.y,
            width,
        );
        if painted {
            surface.generate_water_texture(origin.x, origin.y, width);
            if let Some(own) = surface.patch_mut(patch.index) {
                own.texture_update = false;
            }
        }
        painted
    }

    /// Works through a surface's dirty patches: normals and height bounds
    /// always, composition and texture while the time budget lasts. A patch
    /// leaves the queue once its texture has been painted.
    pub fn idle_update(&mut self, id: SurfaceId, fetcher: &mut impl AssetFetcher) -> Result<IdleStats> {
        let budget = self.settings.idle_update_budget_secs;
        let dirty: Vec<u32> = self.surface(id)?.dirty_patches().collect();
        let mut timer = UpdateTimer::new();
        timer.start();

        let mut stats = IdleStats {
            dirty: dirty.len() as u32,
            ..Default::default()
        };
        for index in dirty {
            let patch = PatchRef::new(id, index);
            self.update_normals(patch);
            self.update_vertical_stats(patch);

            if !timer.within_budget(budget) || !self.update_texture(patch, fetcher) {
                stats.deferred += 1;
                continue;
            }
            let pending = self.patch(patch).is_some_and(|p| p.texture_update);
            if pending {
                self.update_gl(patch, fetcher);
            }
            let painted = self.patch(patch).is_some_and(|p| !p.texture_update);
            if painted {
                stats.textured += 1;
                let surface = self.surface_mut(id)?;
                if let Some(own) = surface.patch_mut(index) {
                    own.clear_dirty();
                }
                surface.unschedule_patch(index);
            } else {
                stats.deferred += 1;
            }
        }
        timer.stop();

        debug!(
            "Terrain idle update on {:?}: {} dirty, {} textured, {} deferred in {:.3} ms",
            id,
            stats.dirty,
            stats.textured,
            stats.deferred,
            timer.elapsed_seconds_f32() * 1000.0
        );
        Ok(stats)
    }
}
