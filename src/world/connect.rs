use tracing::{info, warn};

use super::Terrain;
use crate::error::{Error, Result};
use crate::surface::direction::Direction;
use crate::surface::patch::PatchRef;
use crate::surface::SurfaceId;

/// How one pair of boundary patches is linked when two surfaces meet.
struct Seam {
    own: (u32, u32),
    other: (u32, u32),
    dir: Direction,
}

impl Terrain {
    /// Links two patches both ways. Cardinal links also mark the shared edge
    /// as connected on both sides.
    pub(crate) fn connect_patches(&mut self, own: PatchRef, other: PatchRef, dir: Direction) {
        let opposite = dir.opposite();
        if let Some(patch) = self.patch_mut(own) {
            patch.invalidate_normals(dir.index());
            patch.set_neighbor(dir, Some(other));
            patch.connect_edge(dir);
        }
        if let Some(patch) = self.patch_mut(other) {
            patch.invalidate_normals(opposite.index());
            patch.set_neighbor(opposite, Some(own));
            patch.connect_edge(opposite);
        }
    }

    /// Joins `other` onto the `dir` side of `id`, linking every boundary
    /// patch pair and refreshing the overlap buffers along the seam.
    pub fn connect_neighbor(&mut self, id: SurfaceId, other: SurfaceId, dir: Direction) -> Result<()> {
        if id == other {
            return Err(Error::lookup(format!("{id:?} cannot neighbour itself")));
        }
        let ppe = self.surface(id)?.grid().patches_per_edge();
        let other_ppe = self.surface(other)?.grid().patches_per_edge();
        if ppe != other_ppe {
            warn!(
                "Connecting surfaces with different patch layouts ({} vs {})",
                ppe, other_ppe
            );
        }

        self.surface_mut(id)?.set_neighbor(dir, Some(other));
        self.surface_mut(other)?.set_neighbor(dir.opposite(), Some(id));

        let last = ppe.min(other_ppe) - 1;
        let mut seams = Vec::new();
        // Patches that must refresh their buffer after linking: the east or
        // north side of the seam owns the overlap.
        let mut refresh: Vec<(PatchRef, Direction)> = Vec::new();
        let own_ref = |i, j| PatchRef::new(id, i + j * ppe);
        let other_ref = |i, j| PatchRef::new(other, i + j * other_ppe);

        match dir {
            Direction::NorthEast => {
                seams.push(Seam { own: (last, last), other: (0, 0), dir });
                refresh.push((own_ref(last, last), Direction::North));
            }
            Direction::NorthWest => {
                seams.push(Seam { own: (0, last), other: (last, 0), dir });
            }
            Direction::SouthWest => {
                seams.push(Seam { own: (0, 0), other: (last, last), dir });
                refresh.push((other_ref(last, last), Direction::North));
            }
            Direction::SouthEast => {
                seams.push(Seam { own: (last, 0), other: (0, last), dir });
            }
            Direction::East => {
                for i in 0..=last {
                    seams.push(Seam { own: (last, i), other: (0, i), dir });
                    if i < last {
                        seams.push(Seam { own: (last, i), other: (0, i + 1), dir: Direction::NorthEast });
                    }
                    if i > 0 {
                        seams.push(Seam { own: (last, i), other: (0, i - 1), dir: Direction::SouthEast });
                    }
                    refresh.push((own_ref(last, i), Direction::East));
                }
            }
            Direction::North => {
                for i in 0..=last {
                    seams.push(Seam { own: (i, last), other: (i, 0), dir });
                    if i < last {
                        seams.push(Seam { own: (i, last), other: (i + 1, 0), dir: Direction::NorthEast });
                    }
                    if i > 0 {
                        seams.push(Seam { own: (i, last), other: (i - 1, 0), dir: Direction::NorthWest });
                    }
                    refresh.push((own_ref(i, last), Direction::North));
                }
            }
            Direction::West => {
                for i in 0..=last {
                    seams.push(Seam { own: (0, i), other: (last, i), dir });
                    if i > 0 {
                        seams.push(Seam { own: (0, i), other: (last, i - 1), dir: Direction::SouthWest });
                    }
                    if i < last {
                        seams.push(Seam { own: (0, i), other: (last, i + 1), dir: Direction::NorthWest });
                    }
                    refresh.push((other_ref(last, i), Direction::East));
                }
            }
            Direction::South => {
                for i in 0..=last {
                    seams.push(Seam { own: (i, 0), other: (i, last), dir });
                    if i > 0 {
                        seams.push(Seam { own: (i, 0), other: (i - 1, last), dir: Direction::SouthWest });
                    }
                    if i < last {
                        seams.push(Seam { own: (i, 0), other: (i + 1, last), dir: Direction::SouthEast });
                    }
                    refresh.push((other_ref(i, last), Direction::North));
                }
            }
        }

        for seam in seams {
            self.connect_patches(
                own_ref(seam.own.0, seam.own.1),
                other_ref(seam.other.0, seam.other.1),
                seam.dir,
            );
        }
        for (patch, edge) in refresh {
            match edge {
                Direction::East => self.update_east_edge(patch),
                _ => self.update_north_edge(patch),
            }
            self.dirty_z(patch);
        }

        info!("Connected surface {:?} to {:?} on its {:?} side", id, other, dir);
        Ok(())
    }

    /// Severs every link from `id` into `other`. Only `id`'s side is touched;
    /// [`Terrain::disconnect_all`] tears down both sides.
    pub fn disconnect_neighbor(&mut self, id: SurfaceId, other: SurfaceId) -> Result<()> {
        let surface = self.surface_mut(id)?;
        for dir in Direction::ALL {
            if surface.neighbor(dir) == Some(other) {
                surface.set_neighbor(dir, None);
            }
        }

        for patch in surface.patches.iter_mut() {
            for dir in Direction::ALL {
                let links_other = patch.neighbor(dir).is_some_and(|n| n.surface == other);
                if links_other {
                    patch.set_neighbor(dir, None);
                    patch.invalidate_normals(dir.index());
                    patch.disconnect_edge(dir);
                }
            }
        }
        Ok(())
    }

    /// Detaches a surface from every neighbour, on both sides.
    pub fn disconnect_all(&mut self, id: SurfaceId) -> Result<()> {
        let neighbors = self.surface(id)?.neighboring_surfaces();
        for (_, other) in &neighbors {
            if self.surface(*other).is_ok() {
                self.disconnect_neighbor(*other, id)?;
            }
        }
        let surface = self.surface_mut(id)?;
        for dir in Direction::ALL {
            surface.set_neighbor(dir, None);
        }
        for (_, other) in neighbors {
            if self.surface(other).is_ok() {
                self.disconnect_neighbor(id, other)?;
            }
        }
        Ok(())
    }
}
