use std::sync::OnceLock;

use glam::Vec2;
use noise::{NoiseFn, Perlin};

/// Fixed so every viewer (and every neighbouring region) sees the same field.
const NOISE_SEED: u32 = 0x5eed_7e42;

fn perlin() -> &'static Perlin {
    static PERLIN: OnceLock<Perlin> = OnceLock::new();
    PERLIN.get_or_init(|| Perlin::new(NOISE_SEED))
}

/// 2D gradient noise, roughly in `[-1, 1]`, zero on integer lattice points.
pub fn noise2(v: Vec2) -> f32 {
    perlin().get([v.x as f64, v.y as f64]) as f32
}

/// Sum of octaves from `freq` down to 1, each weighted by its inverse frequency.
pub fn turbulence2(v: Vec2, freq: f32) -> f32 {
    let mut total = 0.0;
    let mut freq = freq;
    while freq >= 1.0 {
        total += noise2(v * freq) / freq;
        freq *= 0.5;
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_is_deterministic_and_bounded() {
        for i in 0..64 {
            let v = Vec2::new(i as f32 * 0.37, i as f32 * 1.13);
            let a = noise2(v);
            assert_eq!(a, noise2(v));
            assert!(a.abs() <= 1.5);
        }
    }

    #[test]
    fn turbulence_with_frequency_below_one_is_zero() {
        assert_eq!(turbulence2(Vec2::new(3.3, 1.7), 0.5), 0.0);
    }
}
