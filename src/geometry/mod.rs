//! Patch tessellation at a render stride, stitched to the north and east
//! neighbours' strides.

mod stitch;

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

pub use stitch::{build_east_strip, build_north_strip};

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct TerrainVertex {
    /// Region-local position.
    pub position: Vec3,
    pub normal: Vec3,
    /// Planar detail mapping.
    pub tex0: Vec2,
    /// Composition value and dither noise.
    pub tex1: Vec2,
}

/// Samples a patch at patch-local grid coordinates. `x` and `y` may reach the
/// patch width, the overlap row and column shared with the north and east
/// neighbours.
pub trait PatchSampler {
    fn eval(&self, x: u32, y: u32) -> TerrainVertex;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GeometrySizes {
    pub vertices: u32,
    pub indices: u32,
}

impl std::ops::Add for GeometrySizes {
    type Output = GeometrySizes;

    fn add(self, rhs: Self) -> Self {
        Self {
            vertices: self.vertices + rhs.vertices,
            indices: self.indices + rhs.indices,
        }
    }
}

/// Interior grid: nothing unless at least two samples fit on a side.
pub fn geom_sizes_main(patch_width: u32, stride: u32) -> GeometrySizes {
    let n = patch_width / stride.max(1);
    if n < 2 {
        return GeometrySizes::default();
    }
    GeometrySizes {
        vertices: n * n,
        indices: 6 * (n - 1) * (n - 1),
    }
}

fn geom_sizes_edge(patch_width: u32, stride: u32, neighbor_stride: u32) -> GeometrySizes {
    let length = patch_width / stride.max(1);
    let neighbor_length = patch_width / neighbor_stride.max(1);
    if neighbor_stride == stride {
        GeometrySizes {
            vertices: 2 * length + 1,
            indices: 6 * length - 3,
        }
    } else {
        GeometrySizes {
            vertices: length + neighbor_length + 1,
            indices: 3 * (length + neighbor_length - 1),
        }
    }
}

pub fn geom_sizes_north(patch_width: u32, stride: u32, north_stride: u32) -> GeometrySizes {
    geom_sizes_edge(patch_width, stride, north_stride)
}

pub fn geom_sizes_east(patch_width: u32, stride: u32, east_stride: u32) -> GeometrySizes {
    geom_sizes_edge(patch_width, stride, east_stride)
}

/// First of the (at most three) consecutive detail assets a patch blends,
/// from its composition range.
pub fn base_composition(min_comp: f32, max_comp: f32) -> u32 {
    let min_floor = min_comp.floor();
    let max_ceil = max_comp.ceil();
    let range = (max_ceil - min_floor) as i32 + 1;
    let mut base = min_floor.max(0.0) as u32;
    if range > 3 && (min_comp - min_floor) > (max_ceil - max_comp) {
        base += 1;
    }
    base
}

/// Buffers for one patch at one level of detail.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchGeometry {
    pub vertices: Vec<TerrainVertex>,
    pub indices: Vec<u32>,
    pub base_comp: u32,
    pub stride: u32,
    pub north_stride: u32,
    pub east_stride: u32,
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
}

impl PatchGeometry {
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn triangles(&self) -> impl Iterator<Item = [TerrainVertex; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| {
            [
                self.vertices[t[0] as usize],
                self.vertices[t[1] as usize],
                self.vertices[t[2] as usize],
            ]
        })
    }
}

/// Appends the interior grid. Rows alternate their diagonal so shading has
/// no directional bias.
pub fn build_main(sampler: &impl PatchSampler, patch_width: u32, stride: u32, geom: &mut PatchGeometry) {
    let n = patch_width / stride.max(1);
    if n < 2 {
        return;
    }
    let base = geom.vertices.len() as u32;
    for j in 0..n {
        for i in 0..n {
            geom.vertices.push(sampler.eval(i * stride, j * stride));
        }
    }

    let at = |i: u32, j: u32| base + i + j * n;
    for j in 0..n - 1 {
        if j % 2 == 1 {
            for i in (1..n).rev() {
                geom.indices
                    .extend_from_slice(&[at(i - 1, j), at(i, j + 1), at(i - 1, j + 1)]);
                geom.indices
                    .extend_from_slice(&[at(i - 1, j), at(i, j), at(i, j + 1)]);
            }
        } else {
            for i in 0..n - 1 {
                geom.indices
                    .extend_from_slice(&[at(i, j), at(i + 1, j + 1), at(i, j + 1)]);
                geom.indices
                    .extend_from_slice(&[at(i, j), at(i + 1, j), at(i + 1, j + 1)]);
            }
        }
    }
}

/// Tessellates a whole patch. Strides must be powers of two no larger than
/// `patch_width`.
pub fn build_patch_geometry(
    sampler: &impl PatchSampler,
    patch_width: u32,
    stride: u32,
    north_stride: u32,
    east_stride: u32,
    base_comp: u32,
) -> PatchGeometry {
    let sizes = geom_sizes_main(patch_width, stride)
        + geom_sizes_north(patch_width, stride, north_stride)
        + geom_sizes_east(patch_width, stride, east_stride);

    let mut geom = PatchGeometry {
        vertices: Vec::with_capacity(sizes.vertices as usize),
        indices: Vec::with_capacity(sizes.indices as usize),
        base_comp,
        stride,
        north_stride,
        east_stride,
        bounds_min: Vec3::splat(f32::MAX),
        bounds_max: Vec3::splat(f32::MIN),
    };

    build_main(sampler, patch_width, stride, &mut geom);
    build_north_strip(sampler, patch_width, stride, north_stride, &mut geom);
    build_east_strip(sampler, patch_width, stride, east_stride, &mut geom);

    for v in &geom.vertices {
        geom.bounds_min = geom.bounds_min.min(v.position);
        geom.bounds_max = geom.bounds_max.max(v.position);
    }
    if geom.vertices.is_empty() {
        geom.bounds_min = Vec3::ZERO;
        geom.bounds_max = Vec3::ZERO;
    }
    geom
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flat;

    impl PatchSampler for Flat {
        fn eval(&self, x: u32, y: u32) -> TerrainVertex {
            TerrainVertex {
                position: Vec3::new(x as f32, y as f32, 0.0),
                normal: Vec3::Z,
                ..Default::default()
            }
        }
    }

    fn signed_area(t: &[TerrainVertex; 3]) -> f32 {
        let a = t[1].position - t[0].position;
        let b = t[2].position - t[0].position;
        a.x * b.y - a.y * b.x
    }

    #[test]
    fn main_pass_counts_and_winding() {
        let mut geom = PatchGeometry::default();
        build_main(&Flat, 16, 4, &mut geom);
        assert_eq!(geom.vertices.len(), 16);
        assert_eq!(geom.indices.len(), 6 * 9);
        assert!(geom.triangles().all(|t| signed_area(&t) > 0.0));
    }

    #[test]
    fn full_stride_has_no_interior() {
        assert_eq!(geom_sizes_main(16, 16), GeometrySizes::default());
        let geom = build_patch_geometry(&Flat, 16, 16, 16, 16, 0);
        assert_eq!(geom.vertices.len(), 6);
        assert_eq!(geom.indices.len(), 6);
    }

    #[test]
    fn base_composition_prefers_the_smaller_overrun() {
        assert_eq!(base_composition(0.2, 1.7), 0);
        assert_eq!(base_composition(0.9, 3.0), 1);
        assert_eq!(base_composition(0.02, 2.95), 0);
    }

    #[test]
    fn vertex_bytes_are_tightly_packed() {
        let geom = build_patch_geometry(&Flat, 8, 2, 2, 2, 0);
        assert_eq!(geom.vertex_bytes().len(), geom.vertices.len() * 40);
        assert_eq!(geom.index_bytes().len(), geom.indices.len() * 4);
    }
}
