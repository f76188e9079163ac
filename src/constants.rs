//! Crate wide constants and lookup tables.

use crate::quadrant::ChildId;

/// Finest representable refinement level.
pub const MAXLEVEL: u8 = 29;

/// Side length of the root square, `1 << MAXLEVEL`.
pub const ROOT: i64 = 1 << MAXLEVEL;

/// Side length of a quadrant at the given level.
#[inline]
pub const fn h(level: u8) -> i64 {
    1 << (MAXLEVEL - level)
}

/// Canonical z-order child offsets: `(0,0),(1,0),(0,1),(1,1)`.
pub const ZORDER_OFFSETS: [(i64, i64); 4] = [(0, 0), (1, 0), (0, 1), (1, 1)];

/// Maps a z-order child id to the user-facing corner numbering
/// `(0,0),(1,0),(1,1),(0,1)` (counter-clockwise from the origin corner).
pub const ZORDER_TO_CORNER: [u8; 4] = [0, 1, 3, 2];

/// Inverse of [`ZORDER_TO_CORNER`]: user corner number to z-order child id.
pub const CORNER_TO_ZORDER: [u8; 4] = [0, 1, 3, 2];

/// Indirect parent-neighbor table used by face/face+corner balancing.
///
/// Indexed by `[child_id][which of 3 indirect neighbors][x or y offset]`.
/// Each entry is the `(dx, dy)` step (in units of the parent's side length)
/// from the parent to an indirect neighbor whose existence the child forces.
pub const INDIRECT_NEIGHBORS: [[(i64, i64); 3]; 4] = [
    // child 0 at (0,0): neighbors away from the parent on x, y, and xy.
    [(-1, 0), (0, -1), (-1, -1)],
    // child 1 at (1,0)
    [(1, 0), (0, -1), (1, -1)],
    // child 2 at (0,1) (z-order index 2 == offset (0,1))
    [(-1, 0), (0, 1), (-1, 1)],
    // child 3 at (1,1)
    [(1, 0), (0, 1), (1, 1)],
];

/// The 8 symmetries of the square used to cross a tree face, as permutations
/// of the 2-bit `(x,y)` coordinate pair within a fixed-size box. Each entry
/// is `(swap_xy, flip_x, flip_y)`; `transform` composes these with a
/// translation supplied by the caller (the neighbor tree's placement).
pub const TRANSFORMS: [(bool, bool, bool); 8] = [
    (false, false, false), // identity
    (false, true, false),
    (false, false, true),
    (false, true, true),
    (true, false, false),
    (true, true, false),
    (true, false, true),
    (true, true, true),
];

/// Index of `t`'s inverse transform in [`TRANSFORMS`].
pub fn inverse_transform(t: u8) -> u8 {
    // All 8 transforms are involutions except the two "rotation" pairs
    // (swap + single flip), which are inverses of each other.
    match t {
        5 => 6,
        6 => 5,
        other => other,
    }
}

/// Returns the z-order child id for a given `(x_bit, y_bit)` pair.
#[inline]
pub const fn child_id_from_bits(x_bit: bool, y_bit: bool) -> ChildId {
    ChildId((x_bit as u8) | ((y_bit as u8) << 1))
}
