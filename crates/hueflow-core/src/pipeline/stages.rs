//! Pipeline stage implementations
//!
//! Stages never allocate while computing: each one writes into an output
//! buffer owned by the [`Pipeline`](super::Pipeline) and reads the buffer of
//! the stage before it.
//!
//! Parameters an operator can change at runtime (Range window, Spotlight
//! selection) live behind cloneable handles backed by atomics. Setters may be
//! called from any thread; the next tick picks the new value up.

use super::curve::Curve;
use super::noise::Perlin2;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

/// Root stage: per-fixture coherent noise over time
#[derive(Debug, Clone)]
pub struct Generator {
    noise: Perlin2,
    speed_x: f64,
    speed_y: f64,
}

impl Generator {
    /// `speed_x` spreads fixtures across the noise field, `speed_y` scales time.
    pub fn new(seed: u64, speed_x: f64, speed_y: f64) -> Self {
        Self {
            noise: Perlin2::new(seed),
            speed_x,
            speed_y,
        }
    }

    /// `out[i] = noise(i * speed_x, t * speed_y)`
    pub fn compute(&self, t: f64, out: &mut [f32]) {
        let y = t * self.speed_y;
        for (i, value) in out.iter_mut().enumerate() {
            *value = self.noise.get(i as f64 * self.speed_x, y);
        }
    }
}

/// Applies a curve to every value, `iterations` times
#[derive(Debug, Clone)]
pub struct Contrast {
    curve: Curve,
    iterations: u32,
}

impl Contrast {
    pub fn new(curve: Curve, iterations: u32) -> Self {
        Self { curve, iterations }
    }

    pub fn curve(&self) -> Curve {
        self.curve
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// With zero iterations the output is an exact copy of `upstream`.
    pub fn compute(&self, upstream: &[f32], out: &mut [f32]) {
        for (value, src) in out.iter_mut().zip(upstream) {
            let mut v = *src;
            for _ in 0..self.iterations {
                v = self.curve.apply(v);
            }
            *value = v;
        }
    }
}

#[derive(Debug)]
struct RangeWindow {
    min: AtomicU32,
    max: AtomicU32,
}

/// Runtime handle to a Range stage's `[min, max]` window
#[derive(Debug, Clone)]
pub struct RangeHandle {
    window: Arc<RangeWindow>,
}

impl RangeHandle {
    fn new(min: f32, max: f32) -> Self {
        Self {
            window: Arc::new(RangeWindow {
                min: AtomicU32::new(min.to_bits()),
                max: AtomicU32::new(max.to_bits()),
            }),
        }
    }

    /// Takes effect on the next tick. `min <= max` is not enforced.
    pub fn set_range(&self, min: f32, max: f32) {
        self.window.min.store(min.to_bits(), Ordering::Relaxed);
        self.window.max.store(max.to_bits(), Ordering::Relaxed);
    }

    /// Current `(min, max)`
    pub fn range(&self) -> (f32, f32) {
        (
            f32::from_bits(self.window.min.load(Ordering::Relaxed)),
            f32::from_bits(self.window.max.load(Ordering::Relaxed)),
        )
    }
}

/// Remaps masked values from [0, 1] into the current window
#[derive(Debug, Clone)]
pub struct Range {
    mask: Vec<bool>,
    handle: RangeHandle,
}

impl Range {
    pub fn new(mask: Vec<bool>, initial_min: f32, initial_max: f32) -> Self {
        Self {
            mask,
            handle: RangeHandle::new(initial_min, initial_max),
        }
    }

    pub fn handle(&self) -> RangeHandle {
        self.handle.clone()
    }

    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    /// Unmasked indices pass through unchanged.
    pub fn compute(&self, upstream: &[f32], out: &mut [f32]) {
        let (min, max) = self.handle.range();
        let span = max - min;
        for (i, (value, src)) in out.iter_mut().zip(upstream).enumerate() {
            *value = if self.mask.get(i).copied().unwrap_or(false) {
                min + *src * span
            } else {
                *src
            };
        }
    }
}

const NO_SELECTION: usize = usize::MAX;

/// Runtime handle to a Spotlight stage's selection
#[derive(Debug, Clone)]
pub struct SpotlightHandle {
    selected: Arc<AtomicUsize>,
}

impl SpotlightHandle {
    fn new() -> Self {
        Self {
            selected: Arc::new(AtomicUsize::new(NO_SELECTION)),
        }
    }

    /// Highlight one fixture index; every other index gets the unselected value.
    pub fn spotlight(&self, index: usize) {
        self.selected.store(index, Ordering::Relaxed);
    }

    /// Back to pass-through
    pub fn clear(&self) {
        self.selected.store(NO_SELECTION, Ordering::Relaxed);
    }

    /// Current selection, if any
    pub fn selected(&self) -> Option<usize> {
        match self.selected.load(Ordering::Relaxed) {
            NO_SELECTION => None,
            index => Some(index),
        }
    }
}

/// Stateful override: pass-through, or one fixture lit and the rest set to `unselected`
#[derive(Debug, Clone)]
pub struct Spotlight {
    handle: SpotlightHandle,
    unselected: f32,
}

impl Spotlight {
    pub fn new(unselected: f32) -> Self {
        Self {
            handle: SpotlightHandle::new(),
            unselected,
        }
    }

    pub fn handle(&self) -> SpotlightHandle {
        self.handle.clone()
    }

    pub fn unselected(&self) -> f32 {
        self.unselected
    }

    /// A selection outside the fixture range behaves like no selection.
    pub fn compute(&self, upstream: &[f32], out: &mut [f32]) {
        match self.handle.selected() {
            Some(selected) if selected < upstream.len() => {
                for (i, (value, src)) in out.iter_mut().zip(upstream).enumerate() {
                    *value = if i == selected { *src } else { self.unselected };
                }
            }
            _ => out.copy_from_slice(upstream),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_is_reproducible() {
        let a = Generator::new(99, 0.1, 0.5);
        let b = Generator::new(99, 0.1, 0.5);
        let mut out_a = vec![0.0; 16];
        let mut out_b = vec![0.0; 16];
        a.compute(12.75, &mut out_a);
        b.compute(12.75, &mut out_b);
        assert_eq!(out_a, out_b);
        assert!(out_a.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_contrast_identity() {
        let contrast = Contrast::new(Curve::Quintic, 0);
        let upstream = [0.1, 0.5, 0.9];
        let mut out = [0.0; 3];
        contrast.compute(&upstream, &mut out);
        assert_eq!(out, upstream);
    }

    #[test]
    fn test_contrast_iterates() {
        let contrast = Contrast::new(Curve::EaseIn, 2);
        let mut out = [0.0; 1];
        contrast.compute(&[0.5], &mut out);
        assert!((out[0] - 0.0625).abs() < 1e-6);
    }

    #[test]
    fn test_range_masked_only() {
        let range = Range::new(vec![true, false, true], 0.2, 0.6);
        let upstream = [0.0, 0.7, 1.0];
        let mut out = [0.0; 3];
        range.compute(&upstream, &mut out);
        assert!((out[0] - 0.2).abs() < 1e-6);
        assert_eq!(out[1], 0.7);
        assert!((out[2] - 0.6).abs() < 1e-6);

        range.handle().set_range(0.0, 0.5);
        range.compute(&upstream, &mut out);
        assert_eq!(out[0], 0.0);
        assert_eq!(out[2], 0.5);
    }

    #[test]
    fn test_spotlight_select_and_clear() {
        let spotlight = Spotlight::new(0.0);
        let handle = spotlight.handle();
        let upstream = [0.3, 0.6, 0.9];
        let mut out = [0.0; 3];

        spotlight.compute(&upstream, &mut out);
        assert_eq!(out, upstream);

        handle.spotlight(1);
        spotlight.compute(&upstream, &mut out);
        assert_eq!(out, [0.0, 0.6, 0.0]);

        handle.clear();
        assert_eq!(handle.selected(), None);
        spotlight.compute(&upstream, &mut out);
        assert_eq!(out, upstream);
    }

    #[test]
    fn test_spotlight_out_of_range_passes_through() {
        let spotlight = Spotlight::new(0.0);
        spotlight.handle().spotlight(10);
        let upstream = [0.3, 0.6];
        let mut out = [0.0; 2];
        spotlight.compute(&upstream, &mut out);
        assert_eq!(out, upstream);
    }
}
