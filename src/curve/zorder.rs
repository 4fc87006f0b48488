//! Three-dimensional Morton (Z-order) encoding and range decomposition.
//!
//! Each dimension contributes 21 bits; bits are interleaved so that the
//! third dimension holds the most significant bit of every triple:
//!
//! ```text
//! z = ... t1 y1 x1 t0 y0 x0
//! ```
//!
//! Because of this layout every aligned block of `8^n` consecutive z values
//! is an axis-aligned cell, which is what [`zranges`] walks.

use std::collections::VecDeque;

/// Bits per dimension.
pub const BITS_PER_DIMENSION: u32 = 21;

/// Significant bits of a z value.
pub const TOTAL_BITS: u32 = BITS_PER_DIMENSION * 3;

/// Largest per-dimension value.
pub const MAX_MASK: u64 = 0x1f_ffff;

/// Default number of levels refined below the common prefix.
pub const DEFAULT_MAX_RECURSE: usize = 7;

/// Spread the low 21 bits of `value` so that two zero bits follow each.
pub fn split(value: u32) -> u64 {
    let mut x = value as u64 & MAX_MASK;
    x = (x | x << 32) & 0x001f_0000_0000_ffff;
    x = (x | x << 16) & 0x001f_0000_ff00_00ff;
    x = (x | x << 8) & 0x100f_00f0_0f00_f00f;
    x = (x | x << 4) & 0x10c3_0c30_c30c_30c3;
    (x | x << 2) & 0x1249_2492_4924_9249
}

/// Inverse of [`split`]: gather every third bit, starting at bit 0.
pub fn combine(z: u64) -> u32 {
    let mut x = z & 0x1249_2492_4924_9249;
    x = (x ^ (x >> 2)) & 0x10c3_0c30_c30c_30c3;
    x = (x ^ (x >> 4)) & 0x100f_00f0_0f00_f00f;
    x = (x ^ (x >> 8)) & 0x001f_0000_ff00_00ff;
    x = (x ^ (x >> 16)) & 0x001f_0000_0000_ffff;
    x = (x ^ (x >> 32)) & MAX_MASK;
    x as u32
}

/// An interleaved (x, y, t) value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Z3(pub u64);

impl Z3 {
    pub fn new(x: u32, y: u32, t: u32) -> Self {
        Self(split(x) | split(y) << 1 | split(t) << 2)
    }

    pub fn decode(&self) -> (u32, u32, u32) {
        (combine(self.0), combine(self.0 >> 1), combine(self.0 >> 2))
    }

    fn dims(&self) -> [u32; 3] {
        let (x, y, t) = self.decode();
        [x, y, t]
    }
}

/// A query box on the integer grid, inclusive on every side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZBox {
    pub min: [u32; 3],
    pub max: [u32; 3],
}

impl ZBox {
    pub fn new(min: [u32; 3], max: [u32; 3]) -> Self {
        Self { min, max }
    }

    fn z_min(&self) -> u64 {
        Z3::new(self.min[0], self.min[1], self.min[2]).0
    }

    fn z_max(&self) -> u64 {
        Z3::new(self.max[0], self.max[1], self.max[2]).0
    }

    fn contains(&self, cell: &ZBox) -> bool {
        (0..3).all(|i| self.min[i] <= cell.min[i] && cell.max[i] <= self.max[i])
    }

    fn overlaps(&self, cell: &ZBox) -> bool {
        (0..3).all(|i| self.min[i] <= cell.max[i] && cell.min[i] <= self.max[i])
    }
}

/// An inclusive range of z values.
///
/// `contained` is set when every z in the range lies inside the query, so
/// rows found in it need no further spatial check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexRange {
    pub lower: u64,
    pub upper: u64,
    pub contained: bool,
}

impl IndexRange {
    pub fn new(lower: u64, upper: u64, contained: bool) -> Self {
        Self {
            lower,
            upper,
            contained,
        }
    }

    pub fn contains(&self, z: u64) -> bool {
        self.lower <= z && z <= self.upper
    }
}

/// Aligned block of z values: `prefix` followed by `offset` free bits.
#[derive(Debug, Clone, Copy)]
struct Cell {
    prefix: u64,
    offset: u32,
}

impl Cell {
    fn upper(&self) -> u64 {
        self.prefix | low_mask(self.offset)
    }

    fn bounds(&self) -> ZBox {
        ZBox::new(Z3(self.prefix).dims(), Z3(self.upper()).dims())
    }

    fn range(&self, contained: bool) -> IndexRange {
        IndexRange::new(self.prefix, self.upper(), contained)
    }

    fn children(&self) -> impl Iterator<Item = Cell> + '_ {
        let offset = self.offset - 3;
        (0..8u64).map(move |octant| Cell {
            prefix: self.prefix | octant << offset,
            offset,
        })
    }
}

fn low_mask(bits: u32) -> u64 {
    if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 }
}

/// The cell sharing the longest prefix, in whole triples, with every corner
/// of every query.
fn common_cell(queries: &[ZBox]) -> Cell {
    let first = queries[0].z_min();
    let diff = queries
        .iter()
        .flat_map(|q| [q.z_min(), q.z_max()])
        .fold(0u64, |acc, z| acc | (z ^ first));

    let common_bits = if diff == 0 {
        TOTAL_BITS
    } else {
        let highest = 63 - diff.leading_zeros();
        (TOTAL_BITS - 1 - highest) / 3 * 3
    };
    let offset = TOTAL_BITS - common_bits;
    Cell {
        prefix: first & !low_mask(offset),
        offset,
    }
}

/// Cover a set of query boxes with at most `max(1, max_ranges)` z ranges.
///
/// Cells are refined breadth-first from the common prefix of the queries.
/// Cells inside a query are emitted whole and cells outside every query are
/// dropped. A partially covered cell is refined unless refinement is cut off
/// by `max_recurse` levels, by `precision_bits`, or by the range budget, in
/// which case it is emitted as a non-contained range. The result is sorted
/// with adjacent ranges merged, and always covers every query.
pub fn zranges(
    queries: &[ZBox],
    precision_bits: u32,
    max_ranges: Option<usize>,
    max_recurse: Option<usize>,
) -> Vec<IndexRange> {
    if queries.is_empty() {
        return Vec::new();
    }

    let target = max_ranges.unwrap_or(usize::MAX).max(1);
    let max_recurse = max_recurse.unwrap_or(DEFAULT_MAX_RECURSE);
    let min_offset = TOTAL_BITS.saturating_sub(precision_bits.min(TOTAL_BITS));

    let classify = |cell: &ZBox| {
        if queries.iter().any(|q| q.contains(cell)) {
            Some(true)
        } else if queries.iter().any(|q| q.overlaps(cell)) {
            Some(false)
        } else {
            None
        }
    };

    let mut ranges = Vec::new();
    let mut current = VecDeque::from([common_cell(queries)]);
    let mut level = 0;

    while !current.is_empty() {
        let mut next = VecDeque::new();
        let mut budget_hit = false;

        while let Some(cell) = current.pop_front() {
            match classify(&cell.bounds()) {
                Some(true) => ranges.push(cell.range(true)),
                Some(false) => {
                    let can_refine = level < max_recurse
                        && cell.offset >= 3
                        && cell.offset - 3 >= min_offset;
                    // emitting everything now would give one range per cell
                    let pending = ranges.len() + next.len() + current.len() + 1;
                    if can_refine && pending + 7 <= target {
                        next.extend(cell.children());
                    } else {
                        budget_hit |= can_refine;
                        ranges.push(cell.range(false));
                    }
                }
                None => {}
            }
        }

        if budget_hit {
            log::debug!(
                "Range target of {} reached at level {}; emitting coarser ranges",
                target,
                level
            );
        }
        current = next;
        level += 1;
    }

    merge_ranges(ranges)
}

/// Sort ranges and coalesce overlapping or adjacent ones.
pub fn merge_ranges(mut ranges: Vec<IndexRange>) -> Vec<IndexRange> {
    ranges.sort_by_key(|r| (r.lower, r.upper));
    let mut merged: Vec<IndexRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if last.upper.saturating_add(1) >= range.lower => {
                last.upper = last.upper.max(range.upper);
                last.contained &= range.contained;
            }
            _ => merged.push(range),
        }
    }
    merged
}
