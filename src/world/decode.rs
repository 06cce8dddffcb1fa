use tracing::{debug, error};

use super::Terrain;
use crate::codec::PatchDecoder;
use crate::error::{Error, Result};
use crate::surface::patch::PatchRef;
use crate::surface::SurfaceId;

impl Terrain {
    /// Writes a decoded `size * size` block into the patch's window of the
    /// surface grid. Overlap buffers are left alone; callers follow up with
    /// [`Terrain::propagate_edges`] and then [`Terrain::dirty_z`].
    pub fn apply_patch_heights(&mut self, patch: PatchRef, heights: &[f32]) -> Result<()> {
        let surface = self.surface_mut(patch.surface)?;
        let size = surface.grid.grids_per_patch_edge();
        if heights.len() != (size * size) as usize {
            return Err(Error::protocol(format!(
                "patch block has {} heights, expected {}",
                heights.len(),
                size * size
            )));
        }
        let offset = surface
            .patch_by_index(patch.index)
            .map(|p| p.data_offset())
            .ok_or_else(|| Error::lookup(format!("{patch:?}")))?;

        for j in 0..size {
            for i in 0..size {
                let z = heights[(j * size + i) as usize];
                surface.grid.set_patch_z(offset, i, j, z);
            }
        }
        Ok(())
    }

    /// Decodes one land layer message into a surface. Every patch is written,
    /// its overlap buffers refreshed and then marked dirty, in that order.
    ///
    /// A patch addressed outside the surface aborts the message; patches
    /// decoded before it stay applied.
    pub fn decompress_layer(&mut self, id: SurfaceId, data: &[u8]) -> Result<Vec<PatchRef>> {
        let (ppe, gppe) = {
            let grid = self.surface(id)?.grid();
            (grid.patches_per_edge(), grid.grids_per_patch_edge())
        };
        let mut decoder = PatchDecoder::new(data)?;
        let patch_size = decoder.group().patch_size as u32;
        if patch_size != gppe {
            error!(
                "Terrain layer patch size {} does not match surface patch size {}",
                patch_size, gppe
            );
            return Err(Error::protocol(format!(
                "patch size {patch_size} does not match {gppe}"
            )));
        }

        let mut updated = Vec::new();
        while let Some(decoded) = decoder.next_patch()? {
            if decoded.i >= ppe || decoded.j >= ppe {
                error!(
                    "Received invalid terrain patch ({}, {}) for a surface of {} patches a side",
                    decoded.i, decoded.j, ppe
                );
                return Err(Error::protocol(format!(
                    "patch ({}, {}) outside a {ppe}x{ppe} surface",
                    decoded.i, decoded.j
                )));
            }

            let patch = PatchRef::new(id, decoded.i + decoded.j * ppe);
            self.apply_patch_heights(patch, &decoded.heights)?;
            self.propagate_edges(patch);
            self.dirty_z(patch);
            if let Some(own) = self.patch_mut(patch) {
                own.set_has_received_data();
            }
            updated.push(patch);
        }

        debug!("Decoded {} terrain patches into {:?}", updated.len(), id);
        Ok(updated)
    }
}
