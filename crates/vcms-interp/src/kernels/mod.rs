//! Interpolation kernels.
//!
//! Two flavors share one skeleton:
//!
//! - [`fixed`] - `u16` tables, 16.16 fixed-point weights
//! - [`float`] - `f32` tables, IEEE weights, inputs clamped to `[0, 1]`
//!
//! # Tetrahedral Interpolation
//!
//! The unit cell is split into six tetrahedra along its main diagonal. The
//! one holding the input is picked by sorting the fractional parts; the
//! kernel then walks from the cell origin along the axes in descending
//! fraction order, visiting four corners `c0..c3`:
//!
//! ```text
//! out = c0 + (c1 - c0) * r1 + (c2 - c1) * r2 + (c3 - c2) * r3,   r1 >= r2 >= r3
//! ```

pub mod fixed;
pub mod float;

/// Axes of a 3-D cell ordered by descending fractional part.
///
/// Ties resolve toward the lower axis, so points on the diagonal pick
/// a consistent tetrahedron.
#[inline(always)]
pub(crate) fn tetra_order<R: PartialOrd>(rx: R, ry: R, rz: R) -> [usize; 3] {
    if rx >= ry {
        if ry >= rz {
            [0, 1, 2]
        } else if rz >= rx {
            [2, 0, 1]
        } else {
            [0, 2, 1]
        }
    } else if rx >= rz {
        [1, 0, 2]
    } else if ry >= rz {
        [1, 2, 0]
    } else {
        [2, 1, 0]
    }
}
