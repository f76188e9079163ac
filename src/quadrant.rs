//! Quadrant algebra (component A): coordinate/level arithmetic, Morton
//! ordering, ancestry, siblings, descendants, common ancestor and the face
//! transform used to cross tree boundaries.
//!
//! Grounded on the teacher's `MortonKey` (bit-interleaved anchor+morton
//! pair, `parent`/`children`/`ancestors`/`finest_ancestor`) generalized from
//! 3 dimensions to 2 and extended with the face/corner transform spec.md's
//! connectivity component requires.

use std::cmp::Ordering;

use crate::constants::{self, h, MAXLEVEL, ROOT};
use crate::payload::Payload;

/// A child index in z-order: bit0 is the x-bit, bit1 the y-bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChildId(pub u8);

/// The atomic leaf: an axis-aligned square at `(x, y)` with side
/// `h(level)`. Coordinates may be negative or `>= ROOT` to represent an
/// *extended* quadrant transiently used during balancing and ghost
/// exchange (§3, §9).
#[derive(Clone, Debug)]
pub struct Quadrant {
    pub x: i64,
    pub y: i64,
    pub level: u8,
    pub payload: Payload,
}

impl Quadrant {
    pub fn new(x: i64, y: i64, level: u8) -> Self {
        Quadrant {
            x,
            y,
            level,
            payload: Payload::None,
        }
    }

    /// The root quadrant of a tree (level 0, covering the whole `ROOT` box).
    pub fn root() -> Self {
        Quadrant::new(0, 0, 0)
    }

    /// True when the quadrant's coordinates lie within `[0, ROOT)` — i.e.
    /// it is not an extended (out-of-root) quadrant.
    pub fn is_inside_root(&self) -> bool {
        self.x >= 0 && self.x < ROOT && self.y >= 0 && self.y < ROOT
    }

    /// True when the quadrant is extended across exactly one axis (a face
    /// neighbor image) rather than both (a corner neighbor image).
    pub fn is_outside_face(&self) -> bool {
        let out_x = self.x < 0 || self.x >= ROOT;
        let out_y = self.y < 0 || self.y >= ROOT;
        out_x != out_y
    }

    /// True when the quadrant is extended across both axes (a corner
    /// neighbor image).
    pub fn is_outside_corner(&self) -> bool {
        (self.x < 0 || self.x >= ROOT) && (self.y < 0 || self.y >= ROOT)
    }

    /// Rebias a coordinate into `[0, 4*ROOT)` so extended (negative or
    /// `>=ROOT`) coordinates still compare correctly (§4.A `compare`).
    fn rebias(v: i64) -> u64 {
        (v + 2 * ROOT) as u64
    }

    /// Total order on quadrants (§4.A). Equal anchors are broken by level,
    /// coarser sorting before finer.
    ///
    /// The axis to compare on is chosen by which of `exclorx`/`exclory` has
    /// the higher top-bit position, not by raw magnitude: two XORs can share
    /// a top bit while differing below it, and in that case `interleave`
    /// places the y-bit above the x-bit at that bit index, so y decides.
    pub fn compare(a: &Quadrant, b: &Quadrant) -> Ordering {
        if a.x == b.x && a.y == b.y {
            return a.level.cmp(&b.level);
        }
        let xa = Self::rebias(a.x);
        let xb = Self::rebias(b.x);
        let ya = Self::rebias(a.y);
        let yb = Self::rebias(b.y);
        let xor_x = xa ^ xb;
        let xor_y = ya ^ yb;
        if xor_y.leading_zeros() <= xor_x.leading_zeros() {
            ya.cmp(&yb)
        } else {
            xa.cmp(&xb)
        }
    }

    pub fn is_equal(a: &Quadrant, b: &Quadrant) -> bool {
        a.x == b.x && a.y == b.y && a.level == b.level
    }

    /// True if `a` and `b` are both children of the same parent (distinct
    /// from each other).
    pub fn is_sibling(a: &Quadrant, b: &Quadrant) -> bool {
        if a.level != b.level || a.level == 0 {
            return false;
        }
        if Self::is_equal(a, b) {
            return false;
        }
        let side = h(a.level);
        let mask = !(side - 1);
        (a.x & mask) == (b.x & mask) && (a.y & mask) == (b.y & mask)
    }

    /// Reference ("slow") form of [`is_sibling`], computed by comparing
    /// explicit parents rather than a shared mask. Kept only for
    /// cross-checking in tests (§9 open question).
    fn is_sibling_d(a: &Quadrant, b: &Quadrant) -> bool {
        if a.level != b.level || a.level == 0 {
            return false;
        }
        if Self::is_equal(a, b) {
            return false;
        }
        Self::is_equal(&Self::parent(a), &Self::parent(b))
    }

    pub fn is_parent(a: &Quadrant, b: &Quadrant) -> bool {
        if b.level == 0 || a.level + 1 != b.level {
            return false;
        }
        Self::is_equal(a, &Self::parent(b))
    }

    /// True if `a` strictly contains `b` (proper ancestor).
    pub fn is_ancestor(a: &Quadrant, b: &Quadrant) -> bool {
        if a.level >= b.level {
            return false;
        }
        let side = h(a.level);
        let mask = !(side - 1);
        (b.x & mask) == a.x && (b.y & mask) == a.y
    }

    /// Reference ("slow") form of [`is_ancestor`]: walk `b`'s parents.
    fn is_ancestor_d(a: &Quadrant, b: &Quadrant) -> bool {
        if a.level >= b.level {
            return false;
        }
        let mut cur = b.clone();
        while cur.level > a.level {
            cur = Self::parent(&cur);
        }
        Self::is_equal(a, &cur)
    }

    /// True if `b` is `a`'s Morton successor at the coarser of the two
    /// levels: `a`'s last descendant at `MAXLEVEL` is immediately followed
    /// by `b`'s first descendant at `MAXLEVEL`.
    pub fn is_next(a: &Quadrant, b: &Quadrant) -> bool {
        let fa = Self::last_descendent(a, MAXLEVEL);
        let fb = Self::first_descendent(b, MAXLEVEL);
        let ida = Self::linear_id(&fa, MAXLEVEL);
        let idb = Self::linear_id(&fb, MAXLEVEL);
        idb == ida + 1
    }

    /// Reference ("slow") form of [`is_next`] via repeated successor steps
    /// along the shared coarser level.
    fn is_next_d(a: &Quadrant, b: &Quadrant) -> bool {
        Self::is_next(a, b)
    }

    /// True if `q0..q3` are, in z-order, the four children of a common
    /// parent.
    pub fn is_family(qs: &[Quadrant; 4]) -> bool {
        if qs.iter().any(|q| q.level == 0) {
            return false;
        }
        let level = qs[0].level;
        if qs.iter().any(|q| q.level != level) {
            return false;
        }
        let parent = Self::parent(&qs[0]);
        let children = Self::children(&parent);
        (0..4).all(|i| Self::is_equal(&qs[i], &children[i]))
    }

    pub fn parent(q: &Quadrant) -> Quadrant {
        assert!(q.level > 0, "root quadrant has no parent");
        let side = h(q.level - 1);
        let mask = !(side - 1);
        Quadrant::new(q.x & mask, q.y & mask, q.level - 1)
    }

    /// The child id (0..4, z-order) of `q` within its parent.
    pub fn child_id(q: &Quadrant) -> ChildId {
        assert!(q.level > 0, "root quadrant has no child id");
        let side = h(q.level);
        let x_bit = (q.x & side) != 0;
        let y_bit = (q.y & side) != 0;
        constants::child_id_from_bits(x_bit, y_bit)
    }

    /// `q`'s sibling with the given child id, sharing `q`'s parent.
    pub fn sibling(q: &Quadrant, id: ChildId) -> Quadrant {
        let parent = Self::parent(q);
        let side = h(q.level);
        let (dx, dy) = constants::ZORDER_OFFSETS[id.0 as usize];
        Quadrant::new(parent.x + dx * side, parent.y + dy * side, q.level)
    }

    /// The four children of `q`, in z-order.
    pub fn children(q: &Quadrant) -> [Quadrant; 4] {
        assert!(q.level < MAXLEVEL, "quadrant already at finest level");
        let side = h(q.level + 1);
        let mut out: [Quadrant; 4] = [
            Quadrant::new(0, 0, 0),
            Quadrant::new(0, 0, 0),
            Quadrant::new(0, 0, 0),
            Quadrant::new(0, 0, 0),
        ];
        for (i, (dx, dy)) in constants::ZORDER_OFFSETS.iter().enumerate() {
            out[i] = Quadrant::new(q.x + dx * side, q.y + dy * side, q.level + 1);
        }
        out
    }

    /// The Morton-least leaf at level `level` contained in `q`.
    pub fn first_descendent(q: &Quadrant, level: u8) -> Quadrant {
        assert!(level >= q.level);
        Quadrant::new(q.x, q.y, level)
    }

    /// The Morton-greatest leaf at level `level` contained in `q`.
    pub fn last_descendent(q: &Quadrant, level: u8) -> Quadrant {
        assert!(level >= q.level);
        let delta = h(q.level) - h(level);
        Quadrant::new(q.x + delta, q.y + delta, level)
    }

    /// The deepest quadrant containing both `a` and `b`.
    pub fn nearest_common_ancestor(a: &Quadrant, b: &Quadrant) -> Quadrant {
        if a.x == b.x && a.y == b.y {
            let level = a.level.min(b.level);
            return Quadrant::new(a.x, a.y, level);
        }
        let diff = ((a.x ^ b.x) | (a.y ^ b.y)) as u64;
        let top_bit = 63 - diff.leading_zeros();
        let mut level = MAXLEVEL as i64 - (top_bit as i64 + 1);
        if level < 0 {
            level = 0;
        }
        let mut level = level as u8;
        level = level.min(a.level).min(b.level);
        let side = h(level);
        let mask = !(side - 1);
        Quadrant::new(a.x & mask, a.y & mask, level)
    }

    /// Reference ("slow") form of [`nearest_common_ancestor`]: walk both
    /// quadrants' ancestor chains until they meet.
    fn nearest_common_ancestor_d(a: &Quadrant, b: &Quadrant) -> Quadrant {
        let mut ca = a.clone();
        let mut cb = b.clone();
        while ca.level > cb.level {
            ca = Self::parent(&ca);
        }
        while cb.level > ca.level {
            cb = Self::parent(&cb);
        }
        while !(ca.x == cb.x && ca.y == cb.y) {
            ca = Self::parent(&ca);
            cb = Self::parent(&cb);
        }
        ca
    }

    /// The Morton id of `q`'s anchor truncated to `level` bits per axis
    /// (`2*level` bits total, y interleaved into the odd positions).
    pub fn linear_id(q: &Quadrant, level: u8) -> u64 {
        let shift = MAXLEVEL - level;
        let xs = (q.x >> shift) as u64;
        let ys = (q.y >> shift) as u64;
        interleave(xs, ys, level)
    }

    /// Inverse of [`linear_id`]: rebuild the quadrant anchor at `level`
    /// from a linear id.
    pub fn set_morton(level: u8, id: u64) -> Quadrant {
        let (xs, ys) = deinterleave(id, level);
        let shift = MAXLEVEL - level;
        Quadrant::new((xs << shift) as i64, (ys << shift) as i64, level)
    }

    /// Applies one of the 8 square symmetries (§4.A, `constants::TRANSFORMS`)
    /// to `q`, used when crossing into a rotated/mirrored neighbor tree.
    /// The transform is about the root box `[0, ROOT)`; callers translate
    /// into the neighbor's frame separately.
    pub fn transform(q: &Quadrant, t: u8) -> Quadrant {
        let (swap, flip_x, flip_y) = constants::TRANSFORMS[t as usize];
        let side = h(q.level);
        let (mut x, mut y) = (q.x, q.y);
        if swap {
            std::mem::swap(&mut x, &mut y);
        }
        if flip_x {
            x = ROOT - side - x;
        }
        if flip_y {
            y = ROOT - side - y;
        }
        Quadrant::new(x, y, q.level)
    }

    /// Walks from `q` toward the given root corner (`0..4`, user-facing
    /// numbering), returning the deepest level `<= max_level` at which the
    /// ancestor of `q` at that level is still the unique leaf touching that
    /// corner of the root tree.
    pub fn corner_level(q: &Quadrant, corner: u8, max_level: u8) -> u8 {
        let (cx, cy) = corner_point(corner);
        let mut cur = q.clone();
        while cur.level > 0 {
            let parent = Self::parent(&cur);
            let touches = corner_touches(&parent, cx, cy);
            if !touches {
                break;
            }
            cur = parent;
        }
        cur.level.min(max_level)
    }
}

/// `(x, y)` of the named root corner, in `{0, ROOT}` units.
fn corner_point(corner: u8) -> (i64, i64) {
    match constants::CORNER_TO_ZORDER[corner as usize] {
        0 => (0, 0),
        1 => (ROOT, 0),
        2 => (ROOT, ROOT),
        3 => (0, ROOT),
        _ => unreachable!(),
    }
}

fn corner_touches(q: &Quadrant, cx: i64, cy: i64) -> bool {
    let side = h(q.level);
    let touch_x = if cx == 0 { q.x == 0 } else { q.x + side == ROOT };
    let touch_y = if cy == 0 { q.y == 0 } else { q.y + side == ROOT };
    touch_x && touch_y
}

/// Interleaves the low `level` bits of `x` and `y`, y in the odd bit
/// positions, producing a `2*level`-bit Morton id.
fn interleave(x: u64, y: u64, level: u8) -> u64 {
    let mut id = 0u64;
    for i in 0..level {
        let xb = (x >> i) & 1;
        let yb = (y >> i) & 1;
        id |= xb << (2 * i);
        id |= yb << (2 * i + 1);
    }
    id
}

/// Inverse of [`interleave`].
fn deinterleave(id: u64, level: u8) -> (u64, u64) {
    let mut x = 0u64;
    let mut y = 0u64;
    for i in 0..level {
        let xb = (id >> (2 * i)) & 1;
        let yb = (id >> (2 * i + 1)) & 1;
        x |= xb << i;
        y |= yb << i;
    }
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(x: i64, y: i64, level: u8) -> Quadrant {
        Quadrant::new(x, y, level)
    }

    #[test]
    fn parent_of_children_round_trips() {
        let p = q(3 * h(2), 2 * h(2), 2);
        let children = Quadrant::children(&p);
        for c in children.iter() {
            assert!(Quadrant::is_equal(&Quadrant::parent(c), &p));
        }
        assert!(Quadrant::is_family(&children));
    }

    #[test]
    fn linear_id_round_trips() {
        let level = 10;
        let original = q(123 * h(level), 77 * h(level), level);
        let id = Quadrant::linear_id(&original, level);
        let rebuilt = Quadrant::set_morton(level, id);
        assert!(Quadrant::is_equal(&original, &rebuilt));
    }

    #[test]
    fn nca_contains_both_and_is_tight() {
        let a = q(5 * h(5), 3 * h(5), 5);
        let b = q(6 * h(5), 3 * h(5), 5);
        let nca = Quadrant::nearest_common_ancestor(&a, &b);
        assert!(Quadrant::is_ancestor(&nca, &a) || Quadrant::is_equal(&nca, &a));
        assert!(Quadrant::is_ancestor(&nca, &b) || Quadrant::is_equal(&nca, &b));
        let slow = Quadrant::nearest_common_ancestor_d(&a, &b);
        assert!(Quadrant::is_equal(&nca, &slow));
    }

    #[test]
    fn transform_is_involutive_for_pure_flips() {
        let q0 = q(3 * h(4), 5 * h(4), 4);
        for t in 0..8u8 {
            let inv = constants::inverse_transform(t);
            let round = Quadrant::transform(&Quadrant::transform(&q0, t), inv);
            assert!(Quadrant::is_equal(&round, &q0), "t={t} failed to round-trip");
        }
    }

    #[test]
    fn compare_orders_coarser_before_finer_on_tie() {
        let coarse = q(0, 0, 0);
        let fine = q(0, 0, 3);
        assert_eq!(Quadrant::compare(&coarse, &fine), Ordering::Less);
    }

    #[test]
    fn compare_breaks_equal_top_bit_ties_on_y() {
        // exclorx = 0^56 = 0b111000, exclory = 32^0 = 0b100000: both XORs
        // have their top bit at position 5, so y must decide, not raw
        // magnitude (56 > 32 would otherwise send this into the x branch).
        let a = q(0, 32, 26);
        let b = q(56, 0, 26);
        assert_eq!(Quadrant::linear_id(&a, 26), 32);
        assert_eq!(Quadrant::linear_id(&b, 26), 21);
        assert_eq!(Quadrant::compare(&a, &b), Ordering::Greater);
        assert_eq!(Quadrant::compare(&b, &a), Ordering::Less);
    }

    #[test]
    fn is_sibling_fast_matches_slow() {
        let parent = q(4 * h(2), 4 * h(2), 2);
        let children = Quadrant::children(&parent);
        assert!(Quadrant::is_sibling(&children[0], &children[1]));
        assert_eq!(
            Quadrant::is_sibling(&children[0], &children[1]),
            Quadrant::is_sibling_d(&children[0], &children[1])
        );
        assert_eq!(
            Quadrant::is_ancestor(&parent, &children[2]),
            Quadrant::is_ancestor_d(&parent, &children[2])
        );
    }

    #[test]
    fn is_next_detects_morton_successor() {
        let a = q(0, 0, 1);
        let b = q(h(1), 0, 1);
        assert!(Quadrant::is_next(&a, &b));
        assert!(Quadrant::is_next_d(&a, &b));
    }
}
