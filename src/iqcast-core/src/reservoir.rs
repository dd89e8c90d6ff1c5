// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Double-buffered sample store.
//!
//! The FIR convolution tail reaches up to one filter length into the
//! past, across callback boundaries. Keeping two contiguous slots and
//! swapping their roles per block makes the kernel a pair of plain
//! index walks, where a single ring would put wrap arithmetic in the
//! innermost loop.

use crate::Sample;

/// Two-slot past+present sample store.
///
/// `previous` and `current` are plain vectors whose roles are
/// exchanged by [`swap_in`](Reservoir::swap_in). Both slots are
/// preallocated once so that the steady-state path never touches the
/// allocator; failing at startup is infinitely less annoying than
/// failing mid-session.
pub struct Reservoir {
    previous: Vec<Sample>,
    current: Vec<Sample>,
}

impl Reservoir {
    /// Create a reservoir whose slots can hold `capacity` samples
    /// without reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            previous: Vec::with_capacity(capacity),
            current: Vec::with_capacity(capacity),
        }
    }

    /// Exchange the slot roles, then overwrite the new current slot
    /// with `block`.
    ///
    /// The slots are swapped rather than moved so neither backing
    /// allocation is ever released. As long as `block` fits the
    /// preallocated capacity this performs no allocation.
    pub fn swap_in(&mut self, block: &[Sample]) {
        std::mem::swap(&mut self.previous, &mut self.current);

        self.current.clear();
        self.current.extend_from_slice(block);
    }

    /// The block most recently swapped in.
    pub fn current(&self) -> &[Sample] {
        &self.current
    }

    /// The block swapped in before the current one. Empty until the
    /// second swap.
    pub fn previous(&self) -> &[Sample] {
        &self.previous
    }

    /// Length of the current block.
    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(start: i16, len: usize) -> Vec<Sample> {
        (0..len as i16).map(|i| start + i).collect()
    }

    #[test]
    fn swap_in_exposes_current_and_previous() {
        let a = ramp(0, 16);
        let b = ramp(10, 16);
        let mut reservoir = Reservoir::with_capacity(16);

        reservoir.swap_in(&a);
        assert_eq!(reservoir.current(), &a[..]);
        assert!(reservoir.previous().is_empty());

        reservoir.swap_in(&b);
        assert_eq!(reservoir.current(), &b[..]);
        assert_eq!(reservoir.previous(), &a[..]);
    }

    #[test]
    fn third_swap_discards_oldest_block() {
        let a = ramp(0, 8);
        let b = ramp(10, 8);
        let c = ramp(20, 8);
        let mut reservoir = Reservoir::with_capacity(8);

        reservoir.swap_in(&a);
        reservoir.swap_in(&b);
        reservoir.swap_in(&c);

        assert_eq!(reservoir.current(), &c[..]);
        assert_eq!(reservoir.previous(), &b[..]);
    }

    #[test]
    fn len_tracks_most_recent_block() {
        let mut reservoir = Reservoir::with_capacity(8);

        reservoir.swap_in(&ramp(0, 8));
        assert_eq!(reservoir.len(), 8);

        reservoir.swap_in(&ramp(0, 4));
        assert_eq!(reservoir.len(), 4);
        assert_eq!(reservoir.previous().len(), 8);

        reservoir.swap_in(&[]);
        assert_eq!(reservoir.len(), 0);
        assert!(reservoir.is_empty());
    }

    #[test]
    fn steady_state_swaps_never_reallocate() {
        let mut reservoir = Reservoir::with_capacity(32);
        let initial = (reservoir.current.capacity(), reservoir.previous.capacity());

        for round in 0..64 {
            reservoir.swap_in(&ramp(round, 32));
        }

        assert_eq!(
            (reservoir.current.capacity(), reservoir.previous.capacity()),
            initial
        );
    }
}
