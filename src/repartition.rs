//! Component J: `partition_given`, reshuffling a forest's leaves across
//! processes to match an arbitrary target count vector (§4.J).
//!
//! No teacher analogue exists (`rusty-tree` never repartitions after
//! construction); built from spec.md §4.J's seven-step description, reusing
//! the teacher's blocking point-to-point idiom via [`crate::transport`] for
//! step 4 and the wire-format discipline ("zero the payload pointer before
//! shipping") of §9.

use std::collections::BTreeMap;
use std::ops::Range;

use crate::forest::Forest;
use crate::partition::PartitionState;
use crate::payload::Payload;
use crate::quadrant::Quadrant;
use crate::transport::Transport;

/// One rank's overlap with a single partner under an old/new range pairing:
/// `count` leaves in `[max(old_lo, new_lo), min(old_hi, new_hi)]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RangePlan {
    pub partner: i32,
    pub count: i64,
}

/// `last[p] = sum(counts[0..=p]) - 1`; a rank with `counts[p] == 0` gets
/// `last[p] == last[p-1]`, so its range is always empty relative to any
/// other rank's.
pub fn prefix_last(counts: &[i64]) -> Vec<i64> {
    let mut last = Vec::with_capacity(counts.len());
    let mut running = -1i64;
    for &c in counts {
        running += c;
        last.push(running);
    }
    last
}

pub fn prefix_first(counts: &[i64]) -> Vec<i64> {
    let mut first = Vec::with_capacity(counts.len());
    let mut prev = -1i64;
    for &c in counts {
        first.push(prev + 1);
        prev += c;
    }
    first
}

/// Same as [`prefix_first`] but derived from an existing `last[]` table
/// rather than counts, for the old side where only `global_last_quad_index`
/// is carried (§4.I).
fn first_from_last(last: &[i64]) -> Vec<i64> {
    let mut first = Vec::with_capacity(last.len());
    let mut prev = -1i64;
    for &l in last {
        first.push(prev + 1);
        prev = l;
    }
    first
}

/// The ranges `rank` must send to every other rank under the old -> new
/// reassignment (§4.J step 2).
pub fn compute_send_plan(
    old_first: &[i64],
    old_last: &[i64],
    new_first: &[i64],
    new_last: &[i64],
    rank: usize,
) -> Vec<RangePlan> {
    let mut plans = Vec::new();
    for q in 0..new_first.len() {
        let lo = old_first[rank].max(new_first[q]);
        let hi = old_last[rank].min(new_last[q]);
        if lo <= hi {
            plans.push(RangePlan {
                partner: q as i32,
                count: hi - lo + 1,
            });
        }
    }
    plans
}

/// The ranges `rank` receives from every other rank, symmetric to
/// [`compute_send_plan`].
pub fn compute_recv_plan(
    old_first: &[i64],
    old_last: &[i64],
    new_first: &[i64],
    new_last: &[i64],
    rank: usize,
) -> Vec<RangePlan> {
    let mut plans = Vec::new();
    for p in 0..old_first.len() {
        let lo = old_first[p].max(new_first[rank]);
        let hi = old_last[p].min(new_last[rank]);
        if lo <= hi {
            plans.push(RangePlan {
                partner: p as i32,
                count: hi - lo + 1,
            });
        }
    }
    plans
}

/// `(tree, global_start, global_end)` for every local tree, in tree-id
/// order, treating the local sequence as a single contiguous block of the
/// global Morton-rank order starting at `base`. An empty tree contributes a
/// span with `global_end < global_start`.
fn local_tree_spans(forest: &Forest, base: i64) -> Vec<(i32, i64, i64)> {
    let mut spans = Vec::new();
    if !forest.has_local_trees() {
        return spans;
    }
    let mut cursor = base;
    for t in forest.first_local_tree..=forest.last_local_tree {
        let count = forest.trees[t as usize].local_num_quadrants() as i64;
        spans.push((t, cursor, cursor + count - 1));
        cursor += count;
    }
    spans
}

/// Maps a global index range `[lo, hi]` (inclusive) back onto the specific
/// local-tree quadrant slices it covers.
fn slice_global_range(spans: &[(i32, i64, i64)], lo: i64, hi: i64) -> Vec<(i32, Range<usize>)> {
    let mut out = Vec::new();
    for &(t, start, end) in spans {
        if end < start {
            continue;
        }
        let s = lo.max(start);
        let e = hi.min(end);
        if s <= e {
            out.push((t, (s - start) as usize..(e - start) as usize + 1));
        }
    }
    out
}

/// Serializes the given tree segments as one message: a count-prefixed
/// header of `(tree_id, quadrant_count)` pairs, then every quadrant's
/// `(x, y, level)` record, then — only when the forest carries per-leaf data
/// — the raw payload bytes, one `data_size`-byte block per quadrant in the
/// same order. The payload pointer itself is never serialized (§9: "zero
/// the payload pointer before shipping, the receiver re-derives it").
fn pack_message(forest: &Forest, segments: &[(i32, Range<usize>)]) -> Vec<u8> {
    let data_size = forest.pool.data_size();
    let mut buf = Vec::new();
    buf.extend_from_slice(&(segments.len() as u32).to_le_bytes());
    for (tree, range) in segments {
        buf.extend_from_slice(&(*tree as u32).to_le_bytes());
        buf.extend_from_slice(&(range.len() as u32).to_le_bytes());
    }
    for (tree, range) in segments {
        for q in &forest.trees[*tree as usize].quadrants[range.clone()] {
            buf.extend_from_slice(&q.x.to_le_bytes());
            buf.extend_from_slice(&q.y.to_le_bytes());
            buf.push(q.level);
        }
    }
    if data_size > 0 {
        for (tree, range) in segments {
            for q in &forest.trees[*tree as usize].quadrants[range.clone()] {
                match &q.payload {
                    Payload::UserData(bytes) => buf.extend_from_slice(bytes),
                    _ => buf.extend(std::iter::repeat(0u8).take(data_size)),
                }
            }
        }
    }
    buf
}

/// Inverse of [`pack_message`]: `(tree_id, quadrants)` per segment, in the
/// order the header listed them.
fn unpack_message(buf: &[u8], data_size: usize) -> Vec<(i32, Vec<Quadrant>)> {
    let mut pos = 0usize;
    let num_segments = read_u32(buf, &mut pos) as usize;
    let mut headers = Vec::with_capacity(num_segments);
    for _ in 0..num_segments {
        let tree = read_u32(buf, &mut pos) as i32;
        let count = read_u32(buf, &mut pos) as usize;
        headers.push((tree, count));
    }

    let mut segments: Vec<(i32, Vec<Quadrant>)> = headers
        .iter()
        .map(|&(tree, count)| (tree, Vec::with_capacity(count)))
        .collect();

    for (idx, &(_, count)) in headers.iter().enumerate() {
        for _ in 0..count {
            let x = read_i64(buf, &mut pos);
            let y = read_i64(buf, &mut pos);
            let level = buf[pos];
            pos += 1;
            segments[idx].1.push(Quadrant::new(x, y, level));
        }
    }

    if data_size > 0 {
        for (idx, &(_, count)) in headers.iter().enumerate() {
            for i in 0..count {
                let bytes = buf[pos..pos + data_size].to_vec();
                pos += data_size;
                segments[idx].1[i].payload = Payload::UserData(bytes);
            }
        }
    }

    segments
}

fn read_u32(buf: &[u8], pos: &mut usize) -> u32 {
    let v = u32::from_le_bytes(buf[*pos..*pos + 4].try_into().unwrap());
    *pos += 4;
    v
}

fn read_i64(buf: &[u8], pos: &mut usize) -> i64 {
    let v = i64::from_le_bytes(buf[*pos..*pos + 8].try_into().unwrap());
    *pos += 8;
    v
}

/// Reshuffles `forest`'s leaves so rank `p` ends up with `new_count[p]`
/// quadrants in Morton-rank order, returning the total number of quadrants
/// shipped over the network (excluding leaves a rank already owned and
/// simply keeps) (§4.J).
pub fn partition_given(forest: &mut Forest, transport: &dyn Transport, new_count: &[i64]) -> i64 {
    let size = transport.size() as usize;
    let rank = transport.rank() as usize;
    assert_eq!(
        new_count.len(),
        size,
        "new_count must carry exactly one entry per rank"
    );

    let old_last = forest.partition.global_last_quad_index.clone();
    let old_first = first_from_last(&old_last);
    let new_last = prefix_last(new_count);
    let new_first = prefix_first(new_count);

    log::debug!(
        "[rank {rank}] partition_given: old [{}, {}] -> new [{}, {}]",
        old_first[rank],
        old_last[rank],
        new_first[rank],
        new_last[rank]
    );

    let send_plan = compute_send_plan(&old_first, &old_last, &new_first, &new_last, rank);
    let recv_plan = compute_recv_plan(&old_first, &old_last, &new_first, &new_last, rank);
    let spans = local_tree_spans(forest, old_first[rank]);

    let mut sends = Vec::new();
    let mut shipped = 0i64;
    for plan in &send_plan {
        if plan.partner as usize == rank {
            continue;
        }
        let lo = old_first[rank].max(new_first[plan.partner as usize]);
        let hi = old_last[rank].min(new_last[plan.partner as usize]);
        let segments = slice_global_range(&spans, lo, hi);
        sends.push((plan.partner, 0, pack_message(forest, &segments)));
        shipped += plan.count;
    }

    let recv_from: Vec<i32> = recv_plan
        .iter()
        .filter(|p| p.partner as usize != rank)
        .map(|p| p.partner)
        .collect();
    let received = transport.exchange(sends, &recv_from);

    // What this rank keeps without shipping: the overlap of its own old
    // range with its own new range.
    let mut incoming: Vec<(i32, Vec<Quadrant>)> = Vec::new();
    let keep_lo = old_first[rank].max(new_first[rank]);
    let keep_hi = old_last[rank].min(new_last[rank]);
    if keep_lo <= keep_hi {
        for (tree, range) in slice_global_range(&spans, keep_lo, keep_hi) {
            incoming.push((tree, forest.trees[tree as usize].quadrants[range].to_vec()));
        }
    }

    let data_size = forest.pool.data_size();
    for (_from, _tag, bytes) in received {
        incoming.extend(unpack_message(&bytes, data_size));
    }

    // Every currently-local tree is about to be replaced wholesale; free its
    // payloads back to the pool before rebuilding (§5 resource discipline).
    if forest.has_local_trees() {
        for t in forest.first_local_tree..=forest.last_local_tree {
            for q in forest.trees[t as usize].quadrants.drain(..) {
                forest.pool.free(q.payload);
            }
        }
    }

    let mut by_tree: BTreeMap<i32, Vec<Quadrant>> = BTreeMap::new();
    for (tree, qs) in incoming {
        by_tree.entry(tree).or_default().extend(qs);
    }

    let mut first_local_tree = i32::MAX;
    let mut last_local_tree = i32::MIN;
    for (tree, mut qs) in by_tree {
        qs.sort_by(Quadrant::compare);
        first_local_tree = first_local_tree.min(tree);
        last_local_tree = last_local_tree.max(tree);
        let dst = &mut forest.trees[tree as usize];
        dst.quadrants = qs;
        dst.recompute_counts();
    }

    if first_local_tree <= last_local_tree {
        forest.first_local_tree = first_local_tree;
        forest.last_local_tree = last_local_tree;
    } else {
        forest.first_local_tree = -1;
        forest.last_local_tree = -2;
    }

    let local_count = forest.local_num_quadrants();
    let local_first_leaf = if forest.has_local_trees() {
        forest.trees[forest.first_local_tree as usize]
            .quadrants
            .first()
            .map(|q| (forest.first_local_tree, q))
    } else {
        None
    };
    forest.partition = PartitionState::recompute(
        transport,
        forest.connectivity.num_trees,
        local_first_leaf,
        local_count,
    );

    let total_shipped = transport.allreduce_sum_i64(shipped);
    log::debug!("[rank {rank}] partition_given: shipped {total_shipped} quadrants total");
    total_shipped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_and_recv_plans_are_symmetric_for_a_two_way_split() {
        // Rank 0 owns [0,9], rank 1 owns nothing under the old split; the
        // new split hands [0,4] to rank 0 and [5,9] to rank 1.
        let old_first = vec![0, 10];
        let old_last = vec![9, 9];
        let new_first = vec![0, 5];
        let new_last = vec![4, 9];

        let send0 = compute_send_plan(&old_first, &old_last, &new_first, &new_last, 0);
        assert_eq!(send0.len(), 2);
        assert_eq!(send0[0].count, 5);
        assert_eq!(send0[1].count, 5);

        let recv1 = compute_recv_plan(&old_first, &old_last, &new_first, &new_last, 1);
        assert_eq!(recv1.len(), 1);
        assert_eq!(recv1[0].partner, 0);
        assert_eq!(recv1[0].count, 5);
    }

    #[test]
    fn pack_unpack_round_trips_without_payload() {
        let mut pool = crate::tree::PayloadPool::new(0);
        let mut tree = crate::tree::Tree::with_root(&mut pool);
        tree.quadrants = Quadrant::children(&Quadrant::root())
            .into_iter()
            .map(|mut q| {
                q.payload = pool.alloc();
                q
            })
            .collect();
        tree.recompute_counts();

        let connectivity_text = "[Forest Info]\nNk 1\nNv 4\nNve 4\nNet 0\nNft 0\nNcf 0\nNct 0\n\
[Coordinates of Element Vertices]\n1 0.0 0.0 0.0\n2 1.0 0.0 0.0\n3 0.0 1.0 0.0\n4 1.0 1.0 0.0\n\
[Element to Vertex]\n1 1 2 4 3\n\
[Element to Element]\n1 1 1 1 1\n\
[Element to Face]\n1 0 0 0 0\n\
[Vertex to Element]\n1 1 1\n2 1 1\n3 1 1\n4 1 1\n";
        let connectivity =
            crate::connectivity::Connectivity::from_reader(std::io::Cursor::new(connectivity_text))
                .unwrap();

        let forest = Forest {
            connectivity,
            trees: vec![tree],
            first_local_tree: 0,
            last_local_tree: 0,
            pool,
            partition: crate::partition::PartitionState {
                global_first_position: Vec::new(),
                global_last_quad_index: vec![3],
            },
            rank: 0,
            size: 1,
        };

        let segments = vec![(0, 0..4usize)];
        let bytes = pack_message(&forest, &segments);
        let round_tripped = unpack_message(&bytes, 0);
        assert_eq!(round_tripped.len(), 1);
        assert_eq!(round_tripped[0].0, 0);
        assert_eq!(round_tripped[0].1.len(), 4);
        for (original, rebuilt) in forest.trees[0].quadrants.iter().zip(&round_tripped[0].1) {
            assert!(Quadrant::is_equal(original, rebuilt));
        }
    }
}
