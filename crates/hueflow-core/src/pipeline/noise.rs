//! Seeded 2-D gradient (Perlin) noise

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Gradient directions, indexed by the low three bits of the hash.
const GRADIENTS: [(f64, f64); 8] = [
    (1.0, 1.0),
    (-1.0, 1.0),
    (1.0, -1.0),
    (-1.0, -1.0),
    (1.0, 0.0),
    (-1.0, 0.0),
    (0.0, 1.0),
    (0.0, -1.0),
];

/// Deterministic 2-D coherent noise.
///
/// The permutation table is shuffled once from `seed`, so the same seed and
/// the same `(x, y)` always produce the same value.
#[derive(Debug, Clone)]
pub struct Perlin2 {
    perm: [u8; 512],
}

impl Perlin2 {
    /// Create a noise field for the given seed
    pub fn new(seed: u64) -> Self {
        let mut table: Vec<u8> = (0..=255).collect();
        table.shuffle(&mut StdRng::seed_from_u64(seed));

        let mut perm = [0u8; 512];
        for (i, slot) in perm.iter_mut().enumerate() {
            *slot = table[i & 255];
        }
        Self { perm }
    }

    /// Raw noise in roughly [-1, 1]
    pub fn raw(&self, x: f64, y: f64) -> f64 {
        let x0 = x.floor();
        let y0 = y.floor();
        let xi = (x0 as i64 & 255) as usize;
        let yi = (y0 as i64 & 255) as usize;
        let xf = x - x0;
        let yf = y - y0;

        let u = fade(xf);
        let v = fade(yf);

        let aa = self.perm[self.perm[xi] as usize + yi];
        let ab = self.perm[self.perm[xi] as usize + yi + 1];
        let ba = self.perm[self.perm[xi + 1] as usize + yi];
        let bb = self.perm[self.perm[xi + 1] as usize + yi + 1];

        let x1 = lerp(grad(aa, xf, yf), grad(ba, xf - 1.0, yf), u);
        let x2 = lerp(grad(ab, xf, yf - 1.0), grad(bb, xf - 1.0, yf - 1.0), u);
        lerp(x1, x2, v)
    }

    /// Noise normalized to [0, 1]
    pub fn get(&self, x: f64, y: f64) -> f32 {
        ((self.raw(x, y) + 1.0) * 0.5).clamp(0.0, 1.0) as f32
    }
}

fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + t * (b - a)
}

fn grad(hash: u8, x: f64, y: f64) -> f64 {
    let (gx, gy) = GRADIENTS[(hash & 7) as usize];
    gx * x + gy * y
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_values() {
        let a = Perlin2::new(42);
        let b = Perlin2::new(42);
        for i in 0..50 {
            let x = i as f64 * 0.37;
            let y = i as f64 * 1.13;
            assert_eq!(a.get(x, y), b.get(x, y));
        }
    }

    #[test]
    fn test_zero_at_lattice_points() {
        let noise = Perlin2::new(7);
        assert_eq!(noise.raw(3.0, 5.0), 0.0);
        assert_eq!(noise.get(3.0, 5.0), 0.5);
    }

    #[test]
    fn test_normalized_range() {
        let noise = Perlin2::new(1234);
        for i in 0..1000 {
            let v = noise.get(i as f64 * 0.173, i as f64 * -0.291);
            assert!((0.0..=1.0).contains(&v), "{} out of range", v);
        }
    }

    #[test]
    fn test_seeds_differ() {
        let a = Perlin2::new(1);
        let b = Perlin2::new(2);
        let differs = (0..100).any(|i| {
            let x = i as f64 * 0.41 + 0.5;
            a.get(x, 0.25) != b.get(x, 0.25)
        });
        assert!(differs);
    }
}
