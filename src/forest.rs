//! The public aggregate tying components C/D/I together (§3 "Forest"),
//! plus `new_forest` and the refine-by-replacement helper the end-to-end
//! scenarios of §8 need but spec.md never names directly (SPEC_FULL.md
//! §C).
//!
//! Grounded on the teacher's top-level orchestration shape in
//! `src/distributed_octree.rs` (`complete_blocktree`/`unbalanced_tree`
//! sequencing local construction with cross-rank exchange).

use crate::balance::{self, BalanceMode, BalanceStats};
use crate::connectivity::Connectivity;
use crate::constants::{h, ROOT};
use crate::ghost::{self, GhostCandidate, TaggedQuadrant};
use crate::partition::PartitionState;
use crate::predicates;
use crate::quadrant::Quadrant;
use crate::repartition;
use crate::transport::Transport;
use crate::tree::{PayloadPool, Tree};

/// A distributed collection of 2:1-balanced, Morton-ordered quadtrees, one
/// per connectivity tree, partitioned across the process ensemble (§3).
pub struct Forest {
    pub connectivity: Connectivity,
    /// One entry per connectivity tree; non-local trees are always empty.
    pub trees: Vec<Tree>,
    pub first_local_tree: i32,
    pub last_local_tree: i32,
    pub pool: PayloadPool,
    pub partition: PartitionState,
    pub rank: i32,
    pub size: i32,
}

impl Forest {
    /// Builds a forest at a uniform initial refinement level, with local
    /// trees assigned by a simple contiguous block partition of the
    /// connectivity's trees across ranks (§8 scenario 1: one root per
    /// local tree at level 0 is the `level == 0` case).
    pub fn new_forest(
        connectivity: Connectivity,
        transport: &dyn Transport,
        data_size: usize,
        level: u8,
    ) -> Forest {
        let rank = transport.rank();
        let size = transport.size();
        let num_trees = connectivity.num_trees;

        let (first_local_tree, last_local_tree) = block_range(num_trees, rank, size);

        let mut pool = PayloadPool::new(data_size);
        let mut trees: Vec<Tree> = (0..num_trees).map(|_| Tree::new()).collect();

        if first_local_tree <= last_local_tree {
            for t in first_local_tree..=last_local_tree {
                let mut tree = Tree::with_root(&mut pool);
                for _ in 0..level {
                    refine_tree_once(&mut tree, &mut pool);
                }
                trees[t as usize] = tree;
            }
        }

        let local_first_leaf = if first_local_tree <= last_local_tree {
            trees[first_local_tree as usize]
                .quadrants
                .first()
                .map(|q| (first_local_tree, q))
        } else {
            None
        };
        let local_count: i64 = trees.iter().map(|t| t.local_num_quadrants() as i64).sum();

        let partition =
            PartitionState::recompute(transport, num_trees, local_first_leaf, local_count);

        Forest {
            connectivity,
            trees,
            first_local_tree,
            last_local_tree,
            pool,
            partition,
            rank,
            size,
        }
    }

    pub fn has_local_trees(&self) -> bool {
        self.first_local_tree <= self.last_local_tree
    }

    pub fn local_num_quadrants(&self) -> i64 {
        if !self.has_local_trees() {
            return 0;
        }
        (self.first_local_tree..=self.last_local_tree)
            .map(|t| self.trees[t as usize].local_num_quadrants() as i64)
            .sum()
    }

    /// Replaces every leaf of every local tree by its four children,
    /// `rounds` times (§8 scenario 2).
    pub fn refine_uniform(&mut self, rounds: u32) {
        if !self.has_local_trees() {
            return;
        }
        for t in self.first_local_tree..=self.last_local_tree {
            let tree = &mut self.trees[t as usize];
            for _ in 0..rounds {
                refine_tree_once(tree, &mut self.pool);
            }
        }
    }

    /// Balances local tree `tree_id` in isolation, using only its own
    /// leaves (no cross-tree extension). Sufficient for a single-tree
    /// forest (§8 scenario 3); multi-tree forests additionally need
    /// [`Forest::ghost_candidates_for_tree`] folded into the input before
    /// balancing, which `balance_forest` does.
    pub fn balance_tree(&mut self, tree_id: i32, mode: BalanceMode) -> BalanceStats {
        balance::balance_subtree(&mut self.trees[tree_id as usize], &mut self.pool, mode)
    }

    /// Balances every local tree, first extending each with the directly
    /// adjacent trees' boundary leaves (projected into the local frame)
    /// found by [`Forest::ghost_candidates_for_tree`]'s sibling query so
    /// cross-tree 2:1 constraints are honoured. Single-process only: in a
    /// distributed run the projected leaves of a non-local neighbor tree
    /// would first need to arrive via `Transport::exchange`, exactly as
    /// `partition_given` moves quadrant records (§4.J); that wiring is left
    /// to the caller, which already owns a `Transport`.
    pub fn balance_forest(&mut self, mode: BalanceMode) -> BalanceStats {
        let mut total = BalanceStats::default();
        if !self.has_local_trees() {
            return total;
        }
        for t in self.first_local_tree..=self.last_local_tree {
            let extended = self.extended_neighbor_leaves(t);
            {
                let tree = &mut self.trees[t as usize];
                tree.quadrants.extend(extended);
                tree.quadrants.sort_by(Quadrant::compare);
            }
            let stats = balance::balance_subtree(&mut self.trees[t as usize], &mut self.pool, mode);
            total.outside_root_rejections += stats.outside_root_rejections;
            total.outside_tree_rejections += stats.outside_tree_rejections;
        }
        total
    }

    /// Leaves of the trees directly adjacent to `tree_id` across a face,
    /// projected into `tree_id`'s frame as extended quadrants — the
    /// almost-sorted input `balance_subtree` expects when 2:1 constraints
    /// must be checked across a tree boundary (§4.F precondition).
    fn extended_neighbor_leaves(&self, tree_id: i32) -> Vec<Quadrant> {
        let mut out = Vec::new();
        for my_face in 0..4u8 {
            if let Some((neighbor, neighbor_face, orientation, _)) =
                self.connectivity.face_neighbor(tree_id, my_face)
            {
                if let Some(neighbor_tree) = self.trees.get(neighbor as usize) {
                    for leaf in &neighbor_tree.quadrants {
                        out.push(project_across_face(leaf, neighbor_face, my_face, orientation));
                    }
                }
            }
        }
        out
    }

    /// The local leaves of `tree_id` that must ship to each directly
    /// face-adjacent neighbor tree's insulation layer (§4.H), computed by
    /// projecting the neighbor's own leaves into `tree_id`'s frame and
    /// delegating to [`ghost::compute_overlap`].
    pub fn ghost_candidates_for_tree(&self, tree_id: i32) -> Vec<GhostCandidate> {
        let mut out = Vec::new();
        for my_face in 0..4u8 {
            if let Some((neighbor, neighbor_face, orientation, _)) =
                self.connectivity.face_neighbor(tree_id, my_face)
            {
                if let Some(neighbor_tree) = self.trees.get(neighbor as usize) {
                    let tagged: Vec<TaggedQuadrant> = neighbor_tree
                        .quadrants
                        .iter()
                        .map(|leaf| TaggedQuadrant {
                            quadrant: project_across_face(leaf, neighbor_face, my_face, orientation),
                            home_tree: tree_id,
                        })
                        .collect();
                    let local_tree = &self.trees[tree_id as usize];
                    ghost::compute_overlap(&self.connectivity, tree_id, local_tree, &tagged, &mut out);
                }
            }
        }
        out
    }

    /// Combines every local tree's checksum (`predicates::local_checksum`)
    /// and `Allreduce`-XORs the result across the process ensemble (§8
    /// "checksum(before) == checksum(after)" across repartition).
    pub fn checksum(&self, transport: &dyn Transport) -> u32 {
        let local = if self.has_local_trees() {
            predicates::combine_checksums((self.first_local_tree..=self.last_local_tree).map(|t| {
                predicates::local_checksum(t, &self.trees[t as usize].quadrants)
            }))
        } else {
            0
        };
        transport.allreduce_xor_u32(local)
    }

    /// Component J: reshuffles leaves to match `new_count[p]` quadrants on
    /// each rank `p`, returning `total_quadrants_shipped` (§4.J).
    pub fn partition_given(&mut self, transport: &dyn Transport, new_count: &[i64]) -> i64 {
        repartition::partition_given(self, transport, new_count)
    }
}

fn block_range(num_trees: i32, rank: i32, size: i32) -> (i32, i32) {
    if num_trees == 0 {
        return (-1, -2);
    }
    let base = num_trees / size;
    let rem = num_trees % size;
    let start = rank * base + rank.min(rem);
    let count = base + if rank < rem { 1 } else { 0 };
    if count == 0 {
        (-1, -2)
    } else {
        (start, start + count - 1)
    }
}

fn refine_tree_once(tree: &mut Tree, pool: &mut PayloadPool) {
    let mut next = Vec::with_capacity(tree.quadrants.len() * 4);
    for leaf in tree.quadrants.drain(..) {
        pool.free(leaf.payload);
        for mut child in Quadrant::children(&Quadrant::new(leaf.x, leaf.y, leaf.level)) {
            child.payload = pool.alloc();
            next.push(child);
        }
    }
    next.sort_by(Quadrant::compare);
    tree.quadrants = next;
    tree.recompute_counts();
}

/// Projects `leaf` (in the neighbor's frame, whose own boundary runs along
/// `from_face`) into the extended region just outside `to_face` of the
/// current tree, applying the orientation flip §4.D's `tree_to_face`
/// encodes. The coordinate running along the shared edge is preserved (up
/// to the orientation flip); the coordinate normal to it is replaced by an
/// extended value just past the local root.
fn project_across_face(leaf: &Quadrant, from_face: u8, to_face: u8, orientation: bool) -> Quadrant {
    let side = h(leaf.level);
    let transverse = match from_face {
        0 | 1 => leaf.y,
        _ => leaf.x,
    };
    let transverse = if orientation {
        ROOT - side - transverse
    } else {
        transverse
    };

    match to_face {
        0 => Quadrant::new(-side, transverse, leaf.level),
        1 => Quadrant::new(ROOT, transverse, leaf.level),
        2 => Quadrant::new(transverse, -side, leaf.level),
        _ => Quadrant::new(transverse, ROOT, leaf.level),
    }
}
