use std::f32::consts::{FRAC_1_SQRT_2, PI};

/// Largest patch edge the codec accepts.
pub const MAX_PATCH_SIZE: u32 = 32;

/// Per-size lookup tables shared by the encoder and decoder.
#[derive(Debug, Clone)]
pub struct DctTables {
    size: usize,
    dequantize: Vec<f32>,
    /// Position in the coefficient stream of each block cell.
    decopy: Vec<usize>,
    /// `cos((2n + 1) u PI / 2N)` stored at `u * N + n`.
    cosines: Vec<f32>,
}

impl DctTables {
    pub fn new(size: u32) -> Self {
        let size = size as usize;
        let mut dequantize = Vec::with_capacity(size * size);
        for j in 0..size {
            for i in 0..size {
                dequantize.push(1.0 + 2.0 * (i + j) as f32);
            }
        }

        let mut cosines = vec![0.0; size * size];
        for u in 0..size {
            for n in 0..size {
                cosines[u * size + n] = ((2 * n + 1) as f32 * u as f32 * PI / (2 * size) as f32).cos();
            }
        }

        Self {
            size,
            dequantize,
            decopy: zigzag_order(size),
            cosines,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Undoes the zigzag ordering and quantisation of one coefficient block.
    pub fn dequantize(&self, coefficients: &[i32]) -> Vec<f32> {
        (0..self.size * self.size)
            .map(|k| coefficients[self.decopy[k]] as f32 * self.dequantize[k])
            .collect()
    }

    /// Quantises a frequency block into zigzag stream order.
    pub fn quantize(&self, block: &[f32]) -> Vec<i32> {
        let mut out = vec![0; self.size * self.size];
        for k in 0..self.size * self.size {
            out[self.decopy[k]] = (block[k] / self.dequantize[k]).round() as i32;
        }
        out
    }

    /// Inverse transform in place: every column, then every row.
    pub fn inverse(&self, block: &mut [f32]) {
        let n = self.size;
        let mut temp = vec![0.0; n * n];
        for column in 0..n {
            for out in 0..n {
                let mut total = FRAC_1_SQRT_2 * block[column];
                for u in 1..n {
                    total += block[u * n + column] * self.cosines[u * n + out];
                }
                temp[n * out + column] = total;
            }
        }

        let scale = 2.0 / n as f32;
        for line in 0..n {
            let row = line * n;
            for out in 0..n {
                let mut total = FRAC_1_SQRT_2 * temp[row];
                for u in 1..n {
                    total += temp[row + u] * self.cosines[u * n + out];
                }
                block[row + out] = total * scale;
            }
        }
    }

    /// Forward transform matching [`DctTables::inverse`].
    pub fn forward(&self, block: &mut [f32]) {
        let n = self.size;
        let weight = |u: usize| if u == 0 { FRAC_1_SQRT_2 } else { 1.0 };

        let mut temp = vec![0.0; n * n];
        for line in 0..n {
            let row = line * n;
            for u in 0..n {
                let mut total = 0.0;
                for x in 0..n {
                    total += block[row + x] * self.cosines[u * n + x];
                }
                temp[row + u] = total * weight(u);
            }
        }

        let scale = 2.0 / n as f32;
        for column in 0..n {
            for v in 0..n {
                let mut total = 0.0;
                for y in 0..n {
                    total += temp[y * n + column] * self.cosines[v * n + y];
                }
                block[v * n + column] = total * weight(v) * scale;
            }
        }
    }
}

/// Stream index of each `j * size + i` cell, walking anti-diagonals from the
/// DC corner.
fn zigzag_order(size: usize) -> Vec<usize> {
    let mut order = vec![0; size * size];
    let (mut i, mut j) = (0usize, 0usize);
    let mut diag = false;
    let mut right = true;
    let mut count = 0;

    while i < size && j < size {
        order[j * size + i] = count;
        count += 1;

        if !diag {
            if right {
                if i < size - 1 {
                    i += 1;
                } else {
                    j += 1;
                }
                right = false;
            } else {
                if j < size - 1 {
                    j += 1;
                } else {
                    i += 1;
                }
                right = true;
            }
            diag = true;
        } else if right {
            i += 1;
            j -= 1;
            if i == size - 1 || j == 0 {
                diag = false;
            }
        } else {
            i -= 1;
            j += 1;
            if j == size - 1 || i == 0 {
                diag = false;
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zigzag_starts_along_the_first_diagonals() {
        let order = zigzag_order(4);
        // (0,0) (1,0) (0,1) (0,2) (1,1) (2,0)
        assert_eq!(order[0], 0);
        assert_eq!(order[1], 1);
        assert_eq!(order[4], 2);
        assert_eq!(order[8], 3);
        assert_eq!(order[5], 4);
        assert_eq!(order[2], 5);
        assert_eq!(order[15], 15);
    }

    #[test]
    fn zigzag_is_a_permutation() {
        for size in [2, 4, 8, 16, 32] {
            let mut order = zigzag_order(size);
            order.sort_unstable();
            assert!(order.iter().enumerate().all(|(k, v)| k == *v), "size {size}");
        }
    }

    #[test]
    fn inverse_undoes_forward() {
        let tables = DctTables::new(8);
        let original: Vec<f32> = (0..64).map(|k| ((k * 37) % 11) as f32 - 5.0).collect();
        let mut block = original.clone();
        tables.forward(&mut block);
        tables.inverse(&mut block);
        for (a, b) in original.iter().zip(&block) {
            assert!((a - b).abs() < 1e-3, "{a} vs {b}");
        }
    }

    #[test]
    fn dc_only_block_is_flat() {
        let tables = DctTables::new(16);
        let mut block = vec![0.0; 256];
        block[0] = -2048.0;
        tables.inverse(&mut block);
        assert!(block.iter().all(|v| (v + 128.0).abs() < 1e-3));
    }
}
