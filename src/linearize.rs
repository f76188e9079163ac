//! Component G: remove ancestors subsumed by descendants, keeping sort
//! order.
//!
//! Grounded directly on the teacher's `Tree::linearize_keys`
//! (`src/octree.rs`): sort, then a two-cursor scan dropping any element
//! that is equal to or an ancestor of its successor. Adapted to release
//! payloads through the tree's [`PayloadPool`](crate::tree::PayloadPool)
//! and to recompute `count`/`maxlevel` on the survivors.

use crate::quadrant::Quadrant;
use crate::tree::{PayloadPool, Tree};

/// Sorts `tree.quadrants` and drops every element that is equal to or an
/// ancestor of its successor, releasing the dropped element's payload back
/// to `pool`. Recomputes `count[]`/`maxlevel` afterwards.
pub fn linearize(tree: &mut Tree, pool: &mut PayloadPool) {
    tree.quadrants.sort_by(Quadrant::compare);
    linearize_sorted(tree, pool);
}

/// Same as [`linearize`] but assumes `tree.quadrants` is already sorted
/// (the common case: balancing and completion both hand linearize a
/// pre-sorted sequence).
pub fn linearize_sorted(tree: &mut Tree, pool: &mut PayloadPool) {
    if tree.quadrants.is_empty() {
        tree.recompute_counts();
        return;
    }
    let mut survivors: Vec<Quadrant> = Vec::with_capacity(tree.quadrants.len());
    let mut drained = tree.quadrants.drain(..);
    let mut write = drained.next().expect("checked non-empty above");

    for read in drained {
        if Quadrant::is_equal(&write, &read) || Quadrant::is_ancestor(&write, &read) {
            // `write` is subsumed; release it and adopt `read` as the new
            // candidate to keep.
            let dropped = std::mem::replace(&mut write, read);
            pool.free(dropped.payload.clone());
        } else {
            survivors.push(write);
            write = read;
        }
    }
    survivors.push(write);

    tree.quadrants = survivors;
    tree.recompute_counts();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicates::is_linear;

    #[test]
    fn drops_ancestor_subsumed_by_descendant() {
        let mut pool = PayloadPool::new(0);
        let mut tree = Tree::new();
        let root = Quadrant::root();
        let child = Quadrant::children(&root)[0].clone();
        tree.quadrants = vec![root, child.clone()];
        linearize(&mut tree, &mut pool);
        assert_eq!(tree.quadrants.len(), 1);
        assert!(Quadrant::is_equal(&tree.quadrants[0], &child));
        assert!(is_linear(&tree.quadrants));
    }

    #[test]
    fn leaves_already_linear_sequence_untouched() {
        let mut pool = PayloadPool::new(0);
        let mut tree = Tree::new();
        tree.quadrants = Quadrant::children(&Quadrant::root()).into();
        linearize(&mut tree, &mut pool);
        assert_eq!(tree.quadrants.len(), 4);
        assert_eq!(tree.count[1], 4);
        assert_eq!(tree.maxlevel, 1);
    }
}
