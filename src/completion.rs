//! Component E: fill a Morton interval `(q1, q2)` with the minimal linear
//! covering.
//!
//! Grounded on the teacher's `LinearTree::complete_region`
//! (`src/distributed_octree.rs`), an NCA-then-worklist construction;
//! generalized here to 2D quadrants and the include/exclude endpoint flags
//! spec.md §4.E names.

use std::cmp::Ordering;
use std::collections::VecDeque;

use crate::constants::MAXLEVEL;
use crate::quadrant::Quadrant;

/// Produces, in sorted order, the minimal linear sequence of quadrants
/// whose union of point-sets equals `(q1, q2)`, endpoints included per
/// `include_q1`/`include_q2`. Requires `q1 < q2` under
/// [`Quadrant::compare`].
pub fn complete_region(
    q1: &Quadrant,
    q2: &Quadrant,
    include_q1: bool,
    include_q2: bool,
) -> Vec<Quadrant> {
    assert_eq!(
        Quadrant::compare(q1, q2),
        Ordering::Less,
        "complete_region requires q1 < q2"
    );

    let nca = Quadrant::nearest_common_ancestor(q1, q2);
    let mut work: VecDeque<Quadrant> = Quadrant::children(&nca).into_iter().collect();
    let mut middle = Vec::new();

    while let Some(w) = work.pop_front() {
        let strictly_between = Quadrant::compare(q1, &w) == Ordering::Less
            && Quadrant::compare(&w, q2) == Ordering::Less
            && !Quadrant::is_ancestor(&w, q2);
        if strictly_between {
            middle.push(w);
        } else if (Quadrant::is_ancestor(&w, q1) || Quadrant::is_ancestor(&w, q2))
            && w.level < MAXLEVEL
        {
            work.extend(Quadrant::children(&w));
        }
        // else: discard — w lies outside (q1, q2) or cannot be refined further.
    }

    middle.sort_by(Quadrant::compare);

    let mut out = Vec::with_capacity(middle.len() + 2);
    if include_q1 {
        out.push(q1.clone());
    }
    out.extend(middle);
    if include_q2 {
        out.push(q2.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicates::is_complete;

    #[test]
    fn completes_the_full_root_interval() {
        let q1 = Quadrant::first_descendent(&Quadrant::root(), 3);
        let q2 = Quadrant::last_descendent(&Quadrant::root(), 3);
        let out = complete_region(&q1, &q2, true, true);
        assert!(Quadrant::is_equal(out.first().unwrap(), &q1));
        assert!(Quadrant::is_equal(out.last().unwrap(), &q2));
        assert!(is_complete(&out));
    }

    #[test]
    fn completes_a_small_gap_between_two_leaves() {
        // Two leaves at level 2 with a gap between them in Morton order.
        let parent = Quadrant::root();
        let children = Quadrant::children(&parent);
        let q1 = Quadrant::first_descendent(&children[0], 4);
        let q2 = Quadrant::last_descendent(&children[2], 4);
        let out = complete_region(&q1, &q2, true, true);
        assert!(is_complete(&out));
        assert!(Quadrant::is_equal(out.first().unwrap(), &q1));
        assert!(Quadrant::is_equal(out.last().unwrap(), &q2));
    }

    #[test]
    fn excluding_endpoints_drops_them() {
        let parent = Quadrant::root();
        let children = Quadrant::children(&parent);
        let q1 = Quadrant::first_descendent(&children[0], 4);
        let q2 = Quadrant::last_descendent(&children[2], 4);
        let out = complete_region(&q1, &q2, false, false);
        assert!(out.iter().all(|q| !Quadrant::is_equal(q, &q1)));
        assert!(out.iter().all(|q| !Quadrant::is_equal(q, &q2)));
    }
}
