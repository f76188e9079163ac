//! Component F: 2:1 balancing, the hardest component (§4.F).
//!
//! No direct teacher analogue exists — `rusty-tree`'s octrees are
//! unbalanced/particle-adaptive, never 2:1-balanced. Built from spec.md
//! §4.F's bottom-up hash-insertion description, using the teacher's
//! `HashSet`/`HashMap`-backed container idiom (`src/octree.rs`).
//!
//! Simplification recorded here rather than silently: the "three indirect
//! parent-neighbors" vs "plus one corner-touching neighbor" distinction of
//! §4.F is implemented as a 3-entry-per-child offset table
//! (`constants::INDIRECT_NEIGHBORS`, ordered x-neighbor, y-neighbor,
//! diagonal-neighbor) where face-only balancing takes the first two entries
//! and face+corner balancing takes all three — the minimal mode-sensitive
//! split the hash-insertion step needs, without access to the original
//! `libsc`/`p4est` indirect-neighbor table (filtered out of the retrieval
//! pack). The early-break-on-repeated-parent-probe optimisation of §4.F is
//! not implemented since the per-level `HashSet` already makes repeated
//! insertion attempts a no-op; only the performance characteristic is
//! lost, not the result.

use std::cmp::Ordering;
use std::collections::HashSet;

use itertools::Itertools;

use crate::constants::{self, h, MAXLEVEL};
use crate::predicates::is_almost_sorted;
use crate::quadrant::{ChildId, Quadrant};
use crate::tree::{PayloadPool, Tree};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BalanceMode {
    Face,
    FaceCorner,
}

/// Rejection counters, observable for testing (§4.F).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BalanceStats {
    pub outside_root_rejections: u64,
    pub outside_tree_rejections: u64,
}

/// Balances `tree` in place: on return `tree.quadrants` is sorted, linear
/// and 2:1 balanced per `mode`; only inside leaves remain, extended leaves
/// having been used for correctness but not retained. `tree` must be
/// almost-sorted on entry (§4.F precondition).
pub fn balance_subtree(tree: &mut Tree, pool: &mut PayloadPool, mode: BalanceMode) -> BalanceStats {
    debug_assert!(
        is_almost_sorted(&tree.quadrants),
        "balance_subtree requires an almost-sorted input"
    );

    let mut stats = BalanceStats::default();
    let input = std::mem::take(&mut tree.quadrants);

    let mut inside_sorted: Vec<Quadrant> = input
        .iter()
        .filter(|q| q.is_inside_root())
        .cloned()
        .collect();
    inside_sorted.sort_by(Quadrant::compare);

    if inside_sorted.is_empty() {
        tree.recompute_counts();
        return stats;
    }

    let tree_first = Quadrant::first_descendent(inside_sorted.first().unwrap(), MAXLEVEL);
    let tree_last = Quadrant::last_descendent(inside_sorted.last().unwrap(), MAXLEVEL);

    let maxlevel = input.iter().map(|q| q.level).max().unwrap_or(0);
    let nlevels = maxlevel as usize + 1;

    let mut seen: Vec<HashSet<(i64, i64)>> = vec![HashSet::new(); nlevels];
    let mut out_lists: Vec<Vec<Quadrant>> = vec![Vec::new(); nlevels];
    let mut by_level: Vec<Vec<Quadrant>> = vec![Vec::new(); nlevels];

    for q in &input {
        seen[q.level as usize].insert((q.x, q.y));
        by_level[q.level as usize].push(q.clone());
    }
    for bucket in by_level.iter_mut() {
        bucket.sort_by(Quadrant::compare);
    }

    for l in (1..nlevels).rev() {
        let combined: Vec<Quadrant> = by_level[l]
            .iter()
            .chain(out_lists[l].iter())
            .cloned()
            .sorted_by(Quadrant::compare)
            .collect();

        let mut i = 0;
        while i < combined.len() {
            if i + 4 <= combined.len() {
                let window = [
                    combined[i].clone(),
                    combined[i + 1].clone(),
                    combined[i + 2].clone(),
                    combined[i + 3].clone(),
                ];
                if Quadrant::is_family(&window) {
                    enumerate_and_insert(
                        &window[0],
                        true,
                        mode,
                        false,
                        &tree_first,
                        &tree_last,
                        &mut seen,
                        &mut out_lists,
                        &mut stats,
                    );
                    i += 4;
                    continue;
                }
            }
            let q = combined[i].clone();
            let is_inside_q = q.is_inside_root();
            enumerate_and_insert(
                &q,
                is_inside_q,
                mode,
                is_inside_q,
                &tree_first,
                &tree_last,
                &mut seen,
                &mut out_lists,
                &mut stats,
            );
            i += 1;
        }
    }

    // Merge: original leaves keep their payload; candidates discovered via
    // the hash-insertion pass get a freshly allocated one. Extended
    // quadrants (from either source) are discarded per the postcondition.
    let mut merged = Vec::new();
    for lvl in 0..nlevels {
        for q in &by_level[lvl] {
            if q.is_inside_root() {
                merged.push(q.clone());
            }
        }
        for q in &out_lists[lvl] {
            if q.is_inside_root() {
                let mut qc = q.clone();
                qc.payload = pool.alloc();
                merged.push(qc);
            }
        }
    }
    merged.sort_by(Quadrant::compare);

    tree.quadrants = merged;
    crate::linearize::linearize_sorted(tree, pool);
    stats
}

/// The machinery of `balance_subtree` with face/corner balance disabled:
/// only siblings and parents are enumerated, yielding a complete linear
/// tree over the convex Morton hull of the input (§4.F).
pub fn complete_subtree(tree: &mut Tree, pool: &mut PayloadPool) -> BalanceStats {
    let input = tree.quadrants.clone();
    let mut stats = BalanceStats::default();

    let mut inside_sorted: Vec<Quadrant> = input
        .iter()
        .filter(|q| q.is_inside_root())
        .cloned()
        .collect();
    inside_sorted.sort_by(Quadrant::compare);
    if inside_sorted.is_empty() {
        tree.recompute_counts();
        return stats;
    }

    let q1 = Quadrant::first_descendent(inside_sorted.first().unwrap(), MAXLEVEL);
    let q2 = Quadrant::last_descendent(inside_sorted.last().unwrap(), MAXLEVEL);
    let completed = if Quadrant::compare(&q1, &q2) == Ordering::Less {
        crate::completion::complete_region(&q1, &q2, true, true)
    } else {
        vec![q1]
    };

    tree.quadrants = completed
        .into_iter()
        .map(|mut q| {
            q.payload = pool.alloc();
            q
        })
        .collect();
    crate::linearize::linearize_sorted(tree, pool);
    stats.outside_root_rejections = 0;
    stats
}

#[allow(clippy::too_many_arguments)]
fn enumerate_and_insert(
    q: &Quadrant,
    is_inside_q: bool,
    mode: BalanceMode,
    enumerate_siblings: bool,
    tree_first: &Quadrant,
    tree_last: &Quadrant,
    seen: &mut [HashSet<(i64, i64)>],
    out_lists: &mut [Vec<Quadrant>],
    stats: &mut BalanceStats,
) {
    if q.level == 0 {
        return;
    }

    let mut candidates = Vec::with_capacity(7);
    if enumerate_siblings {
        for sib_id in 0..4u8 {
            let sib = Quadrant::sibling(q, ChildId(sib_id));
            if !Quadrant::is_equal(&sib, q) {
                candidates.push(sib);
            }
        }
    }
    candidates.push(Quadrant::parent(q));
    candidates.extend(indirect_candidates(q, mode));

    for cand in candidates {
        if try_insert(&cand, is_inside_q, tree_first, tree_last, seen, stats) {
            out_lists[cand.level as usize].push(cand);
        }
    }
}

/// The parent-neighbor offsets a child at `q` forces to exist, relative to
/// `q`'s parent: the x- and y-direction neighbors always, the diagonal
/// neighbor only when `mode` is [`BalanceMode::FaceCorner`] (see module
/// docs for why this differs from the literal 3-vs-4 split in spec.md).
fn indirect_candidates(q: &Quadrant, mode: BalanceMode) -> Vec<Quadrant> {
    let parent = Quadrant::parent(q);
    let child_id = Quadrant::child_id(q);
    let offsets = constants::INDIRECT_NEIGHBORS[child_id.0 as usize];
    let take = match mode {
        BalanceMode::Face => 2,
        BalanceMode::FaceCorner => 3,
    };
    let side = h(parent.level);
    offsets[..take]
        .iter()
        .map(|(dx, dy)| Quadrant::new(parent.x + dx * side, parent.y + dy * side, parent.level))
        .collect()
}

fn try_insert(
    cand: &Quadrant,
    is_inside_q: bool,
    tree_first: &Quadrant,
    tree_last: &Quadrant,
    seen: &mut [HashSet<(i64, i64)>],
    stats: &mut BalanceStats,
) -> bool {
    if is_inside_q {
        if !cand.is_inside_root() {
            stats.outside_root_rejections += 1;
            return false;
        }
    } else if cand.is_outside_corner() {
        stats.outside_root_rejections += 1;
        return false;
    }

    if cand.is_inside_root() {
        let fd = Quadrant::first_descendent(cand, MAXLEVEL);
        let ld = Quadrant::last_descendent(cand, MAXLEVEL);
        if Quadrant::compare(&ld, tree_first) == Ordering::Less
            || Quadrant::compare(tree_last, &fd) == Ordering::Less
        {
            stats.outside_tree_rejections += 1;
            return false;
        }
    }

    let key = (cand.x, cand.y);
    let set = &mut seen[cand.level as usize];
    if set.contains(&key) {
        return false;
    }
    set.insert(key);
    true
}
