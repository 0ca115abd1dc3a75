//! Lock-free published pipeline output
//!
//! Written by the simulation clock thread only, read by every dispatch worker.
//! Each slot is an independent atomic, so a reader may see a mix of the
//! previous and the current frame; it never sees a torn float.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Shared, fixed-length array of channel values in [0, 1]
#[derive(Debug, Clone)]
pub struct SharedOutput {
    slots: Arc<[AtomicU32]>,
}

impl SharedOutput {
    /// Create an output of `len` zeroed slots
    pub fn new(len: usize) -> Self {
        let slots: Vec<AtomicU32> = (0..len).map(|_| AtomicU32::new(0f32.to_bits())).collect();
        Self {
            slots: slots.into(),
        }
    }

    /// Number of slots (constant for the lifetime of the output)
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the output has no slots
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Value at `index`, or `None` if out of range
    pub fn get(&self, index: usize) -> Option<f32> {
        self.slots
            .get(index)
            .map(|slot| f32::from_bits(slot.load(Ordering::Relaxed)))
    }

    /// Overwrite every slot from `values`.
    ///
    /// `values` must have exactly `len()` entries.
    pub fn publish(&self, values: &[f32]) {
        debug_assert_eq!(values.len(), self.slots.len());
        for (slot, value) in self.slots.iter().zip(values) {
            slot.store(value.to_bits(), Ordering::Relaxed);
        }
    }

    /// Copy of all slots
    pub fn snapshot(&self) -> Vec<f32> {
        self.slots
            .iter()
            .map(|slot| f32::from_bits(slot.load(Ordering::Relaxed)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_and_read() {
        let output = SharedOutput::new(3);
        assert_eq!(output.snapshot(), vec![0.0, 0.0, 0.0]);

        output.publish(&[0.25, 0.5, 1.0]);
        assert_eq!(output.get(1), Some(0.5));
        assert_eq!(output.get(3), None);

        let reader = output.clone();
        output.publish(&[1.0, 1.0, 1.0]);
        assert_eq!(reader.snapshot(), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_concurrent_readers() {
        let output = SharedOutput::new(64);
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let out = output.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        for v in out.snapshot() {
                            assert!(v == 0.0 || v == 1.0);
                        }
                    }
                })
            })
            .collect();

        for i in 0..1000 {
            let value = if i % 2 == 0 { 1.0 } else { 0.0 };
            output.publish(&vec![value; 64]);
        }
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
