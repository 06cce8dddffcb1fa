use super::{PatchGeometry, PatchSampler};

/// Which shared edge a strip covers. The east strip is the north strip with
/// its axes exchanged and its winding flipped back.
#[derive(Clone, Copy)]
enum Edge {
    North,
    East,
}

struct Strip<'a, S> {
    sampler: &'a S,
    edge: Edge,
    base: u32,
}

impl<'a, S: PatchSampler> Strip<'a, S> {
    fn sample(&self, geom: &mut PatchGeometry, along: u32, across: u32) {
        let v = match self.edge {
            Edge::North => self.sampler.eval(along, across),
            Edge::East => self.sampler.eval(across, along),
        };
        geom.vertices.push(v);
    }

    fn triangle(&self, geom: &mut PatchGeometry, a: u32, b: u32, c: u32) {
        let (a, b, c) = (self.base + a, self.base + b, self.base + c);
        match self.edge {
            Edge::North => geom.indices.extend_from_slice(&[a, b, c]),
            Edge::East => geom.indices.extend_from_slice(&[a, c, b]),
        }
    }
}

fn build_strip(
    sampler: &impl PatchSampler,
    edge: Edge,
    patch_width: u32,
    stride: u32,
    neighbor_stride: u32,
    geom: &mut PatchGeometry,
) {
    let stride = stride.max(1);
    let neighbor_stride = neighbor_stride.max(1);
    let length = patch_width / stride;
    let neighbor_length = patch_width / neighbor_stride;
    if length == 0 || neighbor_length == 0 {
        return;
    }

    let strip = Strip {
        sampler,
        edge,
        base: geom.vertices.len() as u32,
    };
    let inner = patch_width - stride;

    // This patch's row comes first, then the row on the shared edge.
    for i in 0..length {
        strip.sample(geom, i * stride, inner);
    }
    for k in 0..=neighbor_length {
        strip.sample(geom, k * neighbor_stride, patch_width);
    }
    let t = |i: u32| i;
    let n = |k: u32| length + k;

    if neighbor_stride == stride {
        for i in 0..length {
            strip.triangle(geom, t(i), n(i + 1), n(i));
            if i != length - 1 {
                strip.triangle(geom, t(i), t(i + 1), n(i + 1));
            }
        }
    } else if neighbor_stride > stride {
        // Coarser neighbour: each of its segments spans `ratio` of ours. The
        // first half fans to its start, the rest to its end.
        let ratio = neighbor_stride / stride;
        let half = ratio / 2;
        for k in 0..neighbor_length {
            let first = k * ratio;
            for i in first..first + half {
                strip.triangle(geom, t(i), t(i + 1), n(k));
            }
            strip.triangle(geom, t(first + half), n(k + 1), n(k));
            for i in first + half..first + ratio {
                if i < length - 1 {
                    strip.triangle(geom, t(i), t(i + 1), n(k + 1));
                }
            }
        }
    } else {
        // Finer neighbour: mirror image, our segments fan to its samples.
        let ratio = stride / neighbor_stride;
        let half = ratio / 2;
        for k in 0..length {
            let first = k * ratio;
            if k == length - 1 {
                for i in first..first + ratio {
                    strip.triangle(geom, n(i), t(k), n(i + 1));
                }
                continue;
            }
            for i in first..first + half {
                strip.triangle(geom, n(i), t(k), n(i + 1));
            }
            strip.triangle(geom, n(first + half), t(k), t(k + 1));
            for i in first + half..first + ratio {
                strip.triangle(geom, n(i), t(k + 1), n(i + 1));
            }
        }
    }
}

/// Appends the strip joining this patch's last interior row to the north
/// neighbour's first row.
pub fn build_north_strip(
    sampler: &impl PatchSampler,
    patch_width: u32,
    stride: u32,
    north_stride: u32,
    geom: &mut PatchGeometry,
) {
    build_strip(sampler, Edge::North, patch_width, stride, north_stride, geom);
}

/// Appends the strip joining this patch's last interior column to the east
/// neighbour's first column.
pub fn build_east_strip(
    sampler: &impl PatchSampler,
    patch_width: u32,
    stride: u32,
    east_stride: u32,
    geom: &mut PatchGeometry,
) {
    build_strip(sampler, Edge::East, patch_width, stride, east_stride, geom);
}

#[cfg(test)]
mod tests {
    use super::super::{geom_sizes_east, geom_sizes_north, TerrainVertex};
    use super::*;
    use glam::Vec3;

    struct Grid;

    impl PatchSampler for Grid {
        fn eval(&self, x: u32, y: u32) -> TerrainVertex {
            TerrainVertex {
                position: Vec3::new(x as f32, y as f32, 0.0),
                ..Default::default()
            }
        }
    }

    fn ccw(geom: &PatchGeometry) -> bool {
        geom.triangles().all(|t| {
            let a = t[1].position - t[0].position;
            let b = t[2].position - t[0].position;
            a.x * b.y - a.y * b.x > 0.0
        })
    }

    fn area(geom: &PatchGeometry) -> f32 {
        geom.triangles()
            .map(|t| {
                let a = t[1].position - t[0].position;
                let b = t[2].position - t[0].position;
                0.5 * (a.x * b.y - a.y * b.x)
            })
            .sum()
    }

    #[test]
    fn strip_sizes_match_emitted_buffers() {
        for stride in [1, 2, 4, 8, 16] {
            for neighbor in [1, 2, 4, 8, 16] {
                let mut north = PatchGeometry::default();
                build_north_strip(&Grid, 16, stride, neighbor, &mut north);
                let sizes = geom_sizes_north(16, stride, neighbor);
                assert_eq!(north.vertices.len() as u32, sizes.vertices, "{stride}/{neighbor}");
                assert_eq!(north.indices.len() as u32, sizes.indices, "{stride}/{neighbor}");

                let mut east = PatchGeometry::default();
                build_east_strip(&Grid, 16, stride, neighbor, &mut east);
                assert_eq!(east.indices.len() as u32, geom_sizes_east(16, stride, neighbor).indices);
            }
        }
    }

    #[test]
    fn strips_wind_counter_clockwise_and_cover_their_band() {
        for stride in [1, 2, 4, 8] {
            for neighbor in [1, 2, 4, 8, 16] {
                let mut north = PatchGeometry::default();
                build_north_strip(&Grid, 16, stride, neighbor, &mut north);
                assert!(ccw(&north), "north {stride}/{neighbor}");

                let mut east = PatchGeometry::default();
                build_east_strip(&Grid, 16, stride, neighbor, &mut east);
                assert!(ccw(&east), "east {stride}/{neighbor}");

                // Band of height `stride` across the patch, minus the half
                // corner cell the other strip owns.
                let expected = 16.0 * stride as f32 - 0.5 * (stride * stride) as f32;
                assert!((area(&north) - expected).abs() < 1e-3, "north area {stride}/{neighbor}");
                assert!((area(&east) - expected).abs() < 1e-3, "east area {stride}/{neighbor}");
            }
        }
    }
}
