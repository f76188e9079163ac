//! Tree-sequence predicates (component B): sorted, linear, complete,
//! almost-sorted, plus a forest checksum used to prove repartition is
//! semantics-preserving (§8).
//!
//! Grounded on the teacher's `linearize_keys` sort-then-pairwise scan
//! (`src/octree.rs`), inverted here into boolean predicates rather than a
//! mutating pass.

use crate::quadrant::Quadrant;
use itertools::Itertools;
use std::cmp::Ordering;

/// Strictly increasing under [`Quadrant::compare`].
pub fn is_sorted(seq: &[Quadrant]) -> bool {
    seq.iter()
        .tuple_windows()
        .all(|(a, b)| Quadrant::compare(a, b) == Ordering::Less)
}

/// Sorted, and no element is an ancestor of its successor.
pub fn is_linear(seq: &[Quadrant]) -> bool {
    is_sorted(seq)
        && seq
            .iter()
            .tuple_windows()
            .all(|(a, b)| !Quadrant::is_ancestor(a, b) && !Quadrant::is_equal(a, b))
}

/// Sorted, linear, and every consecutive pair is Morton-adjacent.
pub fn is_complete(seq: &[Quadrant]) -> bool {
    is_linear(seq)
        && seq
            .iter()
            .tuple_windows()
            .all(|(a, b)| Quadrant::is_next(a, b))
}

/// Sorted except across "outside-the-root corner" runs, where adjacent
/// extended quadrants sharing the same exterior corner may overlap in
/// Morton order (§4.B). Used as the balancer's precondition, which may see
/// both inside leaves and corner-extended images in the same sequence.
pub fn is_almost_sorted(seq: &[Quadrant]) -> bool {
    seq.iter().tuple_windows().all(|(a, b)| {
        let ok = Quadrant::compare(a, b) != Ordering::Greater;
        ok || (a.is_outside_corner() && b.is_outside_corner())
    })
}

/// Folds `(tree, x, y, level)` of every local leaf into a single 32-bit
/// checksum. Not defined by the original algorithm description; this is a
/// crc32-style rolling fold chosen to be cheap, order-sensitive (so a
/// reordering bug is caught) and combinable across ranks with a simple XOR
/// reduction, mirroring the two-stage local-then-global design of a
/// `p4est_checksum` call.
pub fn local_checksum(tree_id: i32, seq: &[Quadrant]) -> u32 {
    let mut acc: u32 = 0x811c_9dc5; // FNV offset basis
    let mix = |acc: &mut u32, bytes: &[u8]| {
        for &b in bytes {
            *acc ^= b as u32;
            *acc = acc.wrapping_mul(0x0100_0193); // FNV prime
        }
    };
    mix(&mut acc, &tree_id.to_le_bytes());
    for q in seq {
        mix(&mut acc, &q.x.to_le_bytes());
        mix(&mut acc, &q.y.to_le_bytes());
        mix(&mut acc, &[q.level]);
    }
    acc
}

/// Combines per-tree local checksums into one global value. Callers
/// `Allreduce`-combine the per-rank result of this with XOR across the
/// process set (see `forest::Forest::checksum`).
pub fn combine_checksums(parts: impl IntoIterator<Item = u32>) -> u32 {
    parts.into_iter().fold(0u32, |acc, part| acc ^ part)
}
