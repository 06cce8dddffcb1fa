//! The terrain owner: every surface lives in one pool, and everything that
//! reads or writes more than one surface goes through [`Terrain`].

mod connect;
mod decode;
mod normals;
mod query;
mod update;

pub use query::PatchView;
pub use update::IdleStats;

use glam::DVec3;
use resource_pool::Pool;
use tracing::{info, warn};

use crate::config::TerrainSettings;
use crate::error::{Error, Result};
use crate::surface::direction::Direction;
use crate::surface::patch::{Patch, PatchRef};
use crate::surface::{Surface, SurfaceId};
use crate::utils::timer::FrameClock;

pub struct Terrain {
    surfaces: Pool<Surface>,
    settings: TerrainSettings,
    clock: FrameClock,
}

impl Terrain {
    pub fn new(settings: TerrainSettings) -> Self {
        Self {
            surfaces: Default::default(),
            settings,
            clock: FrameClock::new(),
        }
    }

    pub fn settings(&self) -> &TerrainSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: TerrainSettings) {
        self.settings = settings;
    }

    /// Starts a new frame; patches dirtied from now on carry its timestamp.
    pub fn advance_frame(&mut self) {
        self.clock.advance();
    }

    pub fn frame(&self) -> u64 {
        self.clock.frame()
    }

    /// Creates a surface of `grids_per_edge` samples a side (including the
    /// north/east overlap) split into `grids_per_patch_edge` patches.
    pub fn create_surface(
        &mut self,
        grids_per_edge: u32,
        grids_per_patch_edge: u32,
        origin_global: DVec3,
        width: f32,
    ) -> Result<SurfaceId> {
        let surface = Surface::new(
            grids_per_edge,
            grids_per_patch_edge,
            origin_global,
            width,
            &self.settings,
        )?;
        let patch_count = surface.grid().patch_count();
        let handle = self.surfaces.insert(surface).ok_or(Error::SlotError())?;
        let id = SurfaceId(handle);
        if let Some(surface) = self.surfaces.get_mut_ref(handle) {
            surface.wire_patches(id);
        }

        info!(
            "Created terrain surface {:?} at {:?} with {} patches",
            id, origin_global, patch_count
        );
        Ok(id)
    }

    /// Disconnects a surface from all its neighbours and frees it.
    pub fn remove_surface(&mut self, id: SurfaceId) -> Result<()> {
        self.disconnect_all(id)?;
        self.surfaces.release(id.0);
        info!("Removed terrain surface {:?}", id);
        Ok(())
    }

    pub fn surface_ids(&mut self) -> Vec<SurfaceId> {
        let mut handles = Vec::new();
        self.surfaces
            .for_each_occupied_handle_mut(|h| handles.push(SurfaceId(h)));
        handles
    }

    pub fn surface(&self, id: SurfaceId) -> Result<&Surface> {
        self.surfaces
            .get_ref(id.0)
            .ok_or_else(|| Error::lookup(format!("{id:?}")))
    }

    pub fn surface_mut(&mut self, id: SurfaceId) -> Result<&mut Surface> {
        self.surfaces
            .get_mut_ref(id.0)
            .ok_or_else(|| Error::lookup(format!("{id:?}")))
    }

    pub fn patch(&self, patch: PatchRef) -> Option<&Patch> {
        self.surfaces
            .get_ref(patch.surface.0)?
            .patch_by_index(patch.index)
    }

    pub(crate) fn patch_mut(&mut self, patch: PatchRef) -> Option<&mut Patch> {
        self.surfaces
            .get_mut_ref(patch.surface.0)?
            .patch_mut(patch.index)
    }

    pub fn patch_neighbor(&self, patch: PatchRef, dir: Direction) -> Option<PatchRef> {
        self.patch(patch)?.neighbor(dir)
    }

    /// Every patch of a surface, south-west first, row by row.
    pub fn patch_refs(&self, id: SurfaceId) -> Result<Vec<PatchRef>> {
        let count = self.surface(id)?.grid().patch_count();
        Ok((0..count).map(|index| PatchRef::new(id, index)).collect())
    }

    pub fn set_origin_global(&mut self, id: SurfaceId, origin_global: DVec3) -> Result<()> {
        self.surface_mut(id)?.set_origin_global(origin_global);
        Ok(())
    }

    pub fn set_water_height(&mut self, id: SurfaceId, height: f32) -> Result<()> {
        self.surface_mut(id)?.set_water_height(height);
        Ok(())
    }

    pub fn neighboring_surfaces(&self, id: SurfaceId) -> Result<Vec<(Direction, SurfaceId)>> {
        Ok(self.surface(id)?.neighboring_surfaces())
    }

    /// The surface whose footprint contains a global position.
    pub fn surface_at_global(&mut self, pos_global: DVec3) -> Option<SurfaceId> {
        self.surface_ids().into_iter().find(|id| {
            self.surface(*id).is_ok_and(|s| {
                let pos = s.region_from_global(pos_global);
                s.contains_position(pos.x, pos.y)
            })
        })
    }

    /// Ground height under a global position, from whichever surface holds it.
    pub fn resolve_height_global(&mut self, pos_global: DVec3) -> Option<f32> {
        let Some(id) = self.surface_at_global(pos_global) else {
            warn!("No terrain surface under {:?}", pos_global);
            return None;
        };
        self.surface(id).ok().map(|s| s.resolve_height_global(pos_global))
    }
}
