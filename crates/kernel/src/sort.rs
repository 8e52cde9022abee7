//! Bitonic sorting network for the spatial lookup table.
//!
//! The network is laid out over `next_power_of_two(len)` virtual slots. Slots
//! at or past `len` behave as `+inf` keys: a compare-exchange whose right slot
//! is out of range is skipped, which is exactly what comparing against `+inf`
//! would do, so padding never moves and never shows up in the output.
//!
//! Sorting runs as `S = log2(padded)` stages; stage `s` has `s + 1` steps, for
//! `S * (S + 1) / 2` steps in total. The first step of every stage is a
//! "flip" (mirror compare across a block), the rest are half-cleaners. Within
//! a step every compare-exchange touches a disjoint pair, and every pair lies
//! inside one block of `2 * group_width` slots, so a step is a parallel pass
//! over independent blocks. The end of each pass is the barrier between steps.

use rayon::prelude::*;

use crate::neighbor::SpatialEntry;

/// One step of the network: which stage, and which step inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SortStep {
    /// Stage index, `0..S`.
    pub stage: u32,
    /// Step index within the stage, `0..=stage`.
    pub step: u32,
}

impl SortStep {
    /// Distance between compared slots in a half-cleaner step, and the number
    /// of compare-exchanges per block.
    #[inline]
    pub fn group_width(self) -> usize {
        1 << (self.stage - self.step)
    }

    /// Number of slots covered by one independent block.
    #[inline]
    pub fn block_len(self) -> usize {
        2 * self.group_width()
    }

    /// Whether this step mirrors across the block instead of comparing at a
    /// fixed stride.
    #[inline]
    pub fn is_flip(self) -> bool {
        self.step == 0
    }

    /// Slots compared by work item `item` (`0..padded / 2`).
    ///
    /// This is the flat mapping a GPU dispatch would use; the CPU pass walks
    /// the same pairs block by block.
    #[inline]
    pub fn pair(self, item: usize) -> (usize, usize) {
        let width = self.group_width();
        let h = item & (width - 1);
        let left = h + self.block_len() * (item / width);
        (left, left + self.right_offset(h))
    }

    /// Offset from the left slot at in-block position `h` to its partner.
    #[inline]
    fn right_offset(self, h: usize) -> usize {
        if self.is_flip() {
            self.block_len() - 1 - 2 * h
        } else {
            self.group_width()
        }
    }
}

/// Padded length of the network for `len` real entries.
#[inline]
pub fn padded_len(len: usize) -> usize {
    len.max(1).next_power_of_two()
}

/// The ordered sequence of steps that sorts `len` entries.
#[derive(Debug, Clone)]
pub struct BitonicSchedule {
    stages: u32,
    next: Option<SortStep>,
}

impl BitonicSchedule {
    /// Schedule for `len` entries.
    pub fn new(len: usize) -> Self {
        let stages = padded_len(len).trailing_zeros();
        let next = (stages > 0).then_some(SortStep { stage: 0, step: 0 });
        Self { stages, next }
    }

    /// `S = log2(padded_len)`.
    pub fn stage_count(&self) -> u32 {
        self.stages
    }

    /// Total number of steps, `S * (S + 1) / 2`.
    pub fn step_count(&self) -> usize {
        let s = self.stages as usize;
        s * (s + 1) / 2
    }
}

impl Iterator for BitonicSchedule {
    type Item = SortStep;

    fn next(&mut self) -> Option<SortStep> {
        let current = self.next?;
        self.next = if current.step < current.stage {
            Some(SortStep { stage: current.stage, step: current.step + 1 })
        } else if current.stage + 1 < self.stages {
            Some(SortStep { stage: current.stage + 1, step: 0 })
        } else {
            None
        };
        Some(current)
    }
}

/// Run one step of the network over `items`, ordering by `key`.
pub fn compare_exchange_step<T, K, F>(items: &mut [T], step: SortStep, key: &F)
where
    T: Send,
    K: PartialOrd,
    F: Fn(&T) -> K + Sync,
{
    let width = step.group_width();
    items.par_chunks_mut(step.block_len()).for_each(|block| {
        for h in 0..width {
            let right = h + step.right_offset(h);
            // Right slot is padding (+inf): already in order.
            if right >= block.len() {
                continue;
            }
            if key(&block[h]) > key(&block[right]) {
                block.swap(h, right);
            }
        }
    });
}

/// Sort `items` ascending by `key` with the bitonic network.
///
/// Not stable. Returns the number of steps executed.
pub fn bitonic_sort_by_key<T, K, F>(items: &mut [T], key: F) -> usize
where
    T: Send,
    K: PartialOrd,
    F: Fn(&T) -> K + Sync,
{
    let mut steps = 0;
    for step in BitonicSchedule::new(items.len()) {
        compare_exchange_step(items, step, &key);
        steps += 1;
    }
    steps
}

/// Sort the spatial lookup table by cell key.
pub fn sort_spatial_lookup(entries: &mut [SpatialEntry]) -> usize {
    bitonic_sort_by_key(entries, |entry| entry.key)
}
