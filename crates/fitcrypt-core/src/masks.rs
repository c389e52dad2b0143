//! Plaintext lane selectors used by the statistics circuit

use crate::error::HeResult;
use crate::he::{HeBackend, Plaintext};
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// Linear movement-score coefficients, applied to the averaged
/// gyroscope xyz and accelerometer xyz lanes in that order.
pub const MOVEMENT_WEIGHTS: [f64; 6] = [
    0.41964226961135864,
    6.6290693283081055,
    -2.404352903366089,
    -0.024301817640662193,
    -0.17596858739852905,
    0.14117737114429474,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaskPattern {
    /// `MOVEMENT_WEIGHTS` in lanes 0..6, zero elsewhere
    MovementWeights,
    /// One in a single lane
    Lane(usize),
    /// Ones in `[0, n/2)`
    FirstHalf,
    /// Ones in `[0, n/2 - 1)`
    FirstHalfExceptLast,
    /// Ones in `[n/2, n)`
    SecondHalf,
    /// Ones in `[n/2, n - 1)`
    SecondHalfExceptLast,
    /// Ones everywhere; used to lift a scale without touching values
    Ones,
}

impl MaskPattern {
    /// Lane values for a vector of `slot_count` slots
    pub fn values(&self, slot_count: usize) -> Vec<f64> {
        let half = slot_count / 2;
        let ones_in = |range: std::ops::Range<usize>| -> Vec<f64> {
            (0..slot_count)
                .map(|i| if range.contains(&i) { 1.0 } else { 0.0 })
                .collect()
        };

        match self {
            Self::MovementWeights => {
                let mut v = vec![0.0; slot_count];
                for (lane, w) in v.iter_mut().zip(MOVEMENT_WEIGHTS) {
                    *lane = w;
                }
                v
            }
            Self::Lane(i) => ones_in(*i..i + 1),
            Self::FirstHalf => ones_in(0..half),
            Self::FirstHalfExceptLast => ones_in(0..half.saturating_sub(1)),
            Self::SecondHalf => ones_in(half..slot_count),
            Self::SecondHalfExceptLast => ones_in(half..slot_count.saturating_sub(1)),
            Self::Ones => vec![1.0; slot_count],
        }
    }
}

/// Encoded masks cached per (pattern, scale, level)
#[derive(Default)]
pub struct MaskLibrary {
    cache: HashMap<(MaskPattern, u64, usize), Plaintext>,
}

impl MaskLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encoded mask at exactly `scale` and `level`, encoding on first use
    pub fn get(
        &mut self,
        backend: &dyn HeBackend,
        pattern: MaskPattern,
        scale: f64,
        level: usize,
    ) -> HeResult<&Plaintext> {
        let slot_count = backend.params().slot_count();
        match self.cache.entry((pattern, scale.to_bits(), level)) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let encoded = backend.encode(&pattern.values(slot_count), scale, level)?;
                Ok(entry.insert(encoded))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
