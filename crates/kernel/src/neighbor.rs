//! Spatial hash for neighbor search.
//!
//! Uses a sorted lookup table plus a cell-offset array rather than a
//! `HashMap`, so the layout maps directly onto flat GPU buffers:
//!
//! 1. [`build_spatial_hash`] writes one `(index, hash, key)` entry per particle.
//! 2. The table is sorted by key (see [`crate::sort`]).
//! 3. [`build_cell_offsets`] records where each key's run starts.
//! 4. [`SpatialIndex::for_each_neighbor`] scans the 3x3 block of cells around a
//!    point and filters candidates by exact hash and distance.
//!
//! The grid is unbounded: cells are hashed, not indexed, and unrelated cells
//! that collide on a key only cost extra distance checks.

use glam::{IVec2, Vec2};
use rayon::prelude::*;

/// Hash multiplier for the x cell coordinate.
pub const HASH_K1: u32 = 15823;
/// Hash multiplier for the y cell coordinate.
pub const HASH_K2: u32 = 9737333;

/// Offsets of the 3x3 block of cells visited around a query cell.
pub const NEIGHBOR_CELL_OFFSETS: [IVec2; 9] = [
    IVec2::new(-1, 1),
    IVec2::new(0, 1),
    IVec2::new(1, 1),
    IVec2::new(-1, 0),
    IVec2::new(0, 0),
    IVec2::new(1, 0),
    IVec2::new(-1, -1),
    IVec2::new(0, -1),
    IVec2::new(1, -1),
];

/// One row of the spatial lookup table.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SpatialEntry {
    /// Particle index this entry describes.
    pub index: u32,
    /// Full 32-bit hash of the particle's cell.
    pub hash: u32,
    /// `hash % cell_table_size`; the sort key.
    pub key: u32,
}

/// Integer cell containing `position` for cell size `h`.
#[inline]
pub fn cell_coord(position: Vec2, h: f32) -> IVec2 {
    (position / h).floor().as_ivec2()
}

/// Hash a cell coordinate. Negative coordinates wrap through `u32`.
#[inline]
pub fn hash_cell(cell: IVec2) -> u32 {
    let a = (cell.x as u32).wrapping_mul(HASH_K1);
    let b = (cell.y as u32).wrapping_mul(HASH_K2);
    a.wrapping_add(b)
}

/// Reduce a hash to a slot of the cell table.
#[inline]
pub fn key_from_hash(hash: u32, table_size: u32) -> u32 {
    hash % table_size
}

/// Fill `lookup[i]` with the hash entry for particle `i`.
///
/// `lookup.len()` must equal `predicted.len()`. `table_size` is the length of
/// the cell offset table.
pub fn build_spatial_hash(predicted: &[Vec2], h: f32, table_size: u32, lookup: &mut [SpatialEntry]) {
    debug_assert_eq!(predicted.len(), lookup.len());
    lookup
        .par_iter_mut()
        .zip(predicted.par_iter())
        .enumerate()
        .for_each(|(i, (entry, &position))| {
            let hash = hash_cell(cell_coord(position, h));
            *entry = SpatialEntry {
                index: i as u32,
                hash,
                key: key_from_hash(hash, table_size),
            };
        });
}

/// Rebuild `offsets` from a lookup table sorted by key.
///
/// `offsets[k]` becomes the first sorted index whose key is `k`, or
/// `lookup.len()` when no particle hashes to `k`.
pub fn build_cell_offsets(lookup: &[SpatialEntry], offsets: &mut [u32]) {
    let empty = lookup.len() as u32;
    offsets.par_iter_mut().for_each(|slot| *slot = empty);

    // Only the first entry of each run writes, so every slot has one writer.
    let run_starts: Vec<(u32, u32)> = lookup
        .par_iter()
        .enumerate()
        .filter(|&(i, entry)| i == 0 || lookup[i - 1].key != entry.key)
        .map(|(i, entry)| (entry.key, i as u32))
        .collect();

    for (key, start) in run_starts {
        offsets[key as usize] = start;
    }
}

/// Read-only view over a sorted lookup table and its offsets.
#[derive(Debug, Clone, Copy)]
pub struct SpatialIndex<'a> {
    lookup: &'a [SpatialEntry],
    offsets: &'a [u32],
    h: f32,
}

impl<'a> SpatialIndex<'a> {
    /// Wrap a sorted lookup table and the offsets built from it.
    pub fn new(lookup: &'a [SpatialEntry], offsets: &'a [u32], h: f32) -> Self {
        debug_assert!(!offsets.is_empty());
        Self { lookup, offsets, h }
    }

    /// Number of slots in the cell table.
    pub fn table_size(&self) -> u32 {
        self.offsets.len() as u32
    }

    /// Sorted entries sharing `key`, in table order.
    pub fn entries_with_key(&self, key: u32) -> &'a [SpatialEntry] {
        let start = self.offsets[key as usize] as usize;
        if start >= self.lookup.len() {
            return &[];
        }
        let len = self.lookup[start..]
            .iter()
            .take_while(|entry| entry.key == key)
            .count();
        &self.lookup[start..start + len]
    }

    /// Visit every particle within the smoothing radius of `origin`.
    ///
    /// `f` receives the neighbor index, the offset from `origin` to the
    /// neighbor, and the squared distance. A particle sitting at `origin`
    /// (including the querying particle itself) is visited with distance zero.
    pub fn for_each_neighbor<F>(&self, origin: Vec2, positions: &[Vec2], mut f: F)
    where
        F: FnMut(usize, Vec2, f32),
    {
        let origin_cell = cell_coord(origin, self.h);
        let sqr_radius = self.h * self.h;
        let table_size = self.table_size();
        let n = self.lookup.len();

        for offset in NEIGHBOR_CELL_OFFSETS {
            let hash = hash_cell(origin_cell + offset);
            let key = key_from_hash(hash, table_size);
            let mut cursor = self.offsets[key as usize] as usize;

            while cursor < n {
                let entry = self.lookup[cursor];
                cursor += 1;
                if entry.key != key {
                    break;
                }
                // Key collision from an unrelated cell.
                if entry.hash != hash {
                    continue;
                }
                let j = entry.index as usize;
                let to_neighbor = positions[j] - origin;
                let sqr_dst = to_neighbor.length_squared();
                if sqr_dst > sqr_radius {
                    continue;
                }
                f(j, to_neighbor, sqr_dst);
            }
        }
    }
}
