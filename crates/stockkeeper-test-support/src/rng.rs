//! Test RNGs: deterministic `DeterministicRng` implementations for tests.

use stockkeeper_core::rng::DeterministicRng;

/// Always draws the bottom of the range, so backoff jitter is zero.
#[derive(Debug)]
pub struct MockRng;

impl DeterministicRng for MockRng {
    fn next_u32_range(&mut self, min: u32, _max: u32) -> u32 {
        min
    }
}

/// Replays a fixed list of draws, each clamped into the requested range.
/// Once the list is used up the last value repeats.
#[derive(Debug)]
pub struct SequenceRng {
    values: Vec<u32>,
    index: usize,
}

impl SequenceRng {
    /// Create a new `SequenceRng` with the given values.
    #[must_use]
    pub fn new(values: Vec<u32>) -> Self {
        Self { values, index: 0 }
    }
}

impl DeterministicRng for SequenceRng {
    fn next_u32_range(&mut self, min: u32, max: u32) -> u32 {
        let Some(&value) = self
            .values
            .get(self.index)
            .or_else(|| self.values.last())
        else {
            return min;
        };
        self.index += 1;
        value.clamp(min, max.max(min))
    }
}
