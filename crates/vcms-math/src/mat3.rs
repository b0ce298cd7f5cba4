//! 3x3 double-precision matrix.
//!
//! [`Mat3`] backs the optimizer's matrix folding and the 3-channel reverse
//! solve. Storage is **row-major** with **column vectors**:
//!
//! ```text
//! | m00 m01 m02 |   | x |   | m00*x + m01*y + m02*z |
//! | m10 m11 m12 | * | y | = | m10*x + m11*y + m12*z |
//! | m20 m21 m22 |   | z |   | m20*x + m21*y + m22*z |
//! ```
//!
//! # Usage
//!
//! ```rust
//! use vcms_math::Mat3;
//!
//! let m = Mat3::diagonal(2.0, 2.0, 2.0);
//! assert_eq!(m.transform([1.0, 2.0, 3.0]), [2.0, 4.0, 6.0]);
//! ```

use glam::{DMat3, DVec3};
use std::ops::{Index, Mul};

/// Threshold under which a determinant counts as singular.
const SINGULAR_EPS: f64 = 1.0e-12;

/// A 3x3 matrix of `f64`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat3 {
    /// Matrix elements in row-major order: [row0, row1, row2]
    pub m: [[f64; 3]; 3],
}

impl Mat3 {
    /// Zero matrix.
    pub const ZERO: Self = Self { m: [[0.0; 3]; 3] };

    /// Identity matrix.
    pub const IDENTITY: Self = Self {
        m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    };

    /// Creates a matrix from row arrays.
    #[inline]
    pub const fn from_rows(rows: [[f64; 3]; 3]) -> Self {
        Self { m: rows }
    }

    /// Creates a matrix from a row-major slice of 9 coefficients.
    ///
    /// Returns `None` when the slice is not exactly 9 long.
    pub fn from_row_slice(v: &[f64]) -> Option<Self> {
        if v.len() != 9 {
            return None;
        }
        Some(Self::from_rows([
            [v[0], v[1], v[2]],
            [v[3], v[4], v[5]],
            [v[6], v[7], v[8]],
        ]))
    }

    /// Creates a diagonal matrix.
    #[inline]
    pub const fn diagonal(d0: f64, d1: f64, d2: f64) -> Self {
        Self::from_rows([[d0, 0.0, 0.0], [0.0, d1, 0.0], [0.0, 0.0, d2]])
    }

    /// Flattens to 9 row-major coefficients.
    pub fn to_row_array(&self) -> [f64; 9] {
        let m = &self.m;
        [
            m[0][0], m[0][1], m[0][2], m[1][0], m[1][1], m[1][2], m[2][0], m[2][1], m[2][2],
        ]
    }

    /// Computes the determinant.
    #[inline]
    pub fn determinant(&self) -> f64 {
        self.to_glam().determinant()
    }

    /// Computes the inverse, or `None` when singular.
    pub fn inverse(&self) -> Option<Self> {
        let g = self.to_glam();
        if g.determinant().abs() < SINGULAR_EPS {
            return None;
        }
        Some(Self::from_glam(g.inverse()))
    }

    /// Transforms a column vector.
    #[inline]
    pub fn transform(&self, v: [f64; 3]) -> [f64; 3] {
        let m = &self.m;
        [
            m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
            m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
            m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
        ]
    }

    /// Solves `self * x = b`, or `None` when singular.
    pub fn solve(&self, b: [f64; 3]) -> Option<[f64; 3]> {
        let g = self.to_glam();
        if g.determinant().abs() < SINGULAR_EPS {
            return None;
        }
        Some(g.inverse().mul_vec3(DVec3::from_array(b)).to_array())
    }

    /// Multiplies two matrices (`self * other`).
    #[inline]
    pub fn mul_mat(&self, other: &Self) -> Self {
        Self::from_glam(self.to_glam() * other.to_glam())
    }

    /// True when every coefficient is within `tolerance` of the identity.
    pub fn is_identity(&self, tolerance: f64) -> bool {
        (0..3).all(|i| {
            (0..3).all(|j| {
                let expected = if i == j { 1.0 } else { 0.0 };
                (self.m[i][j] - expected).abs() <= tolerance
            })
        })
    }

    /// Converts to glam (column-major).
    #[inline]
    pub fn to_glam(&self) -> DMat3 {
        DMat3::from_cols_array_2d(&[
            [self.m[0][0], self.m[1][0], self.m[2][0]],
            [self.m[0][1], self.m[1][1], self.m[2][1]],
            [self.m[0][2], self.m[1][2], self.m[2][2]],
        ])
    }

    /// Creates from glam (column-major).
    #[inline]
    pub fn from_glam(g: DMat3) -> Self {
        let c = g.to_cols_array_2d();
        Self::from_rows([
            [c[0][0], c[1][0], c[2][0]],
            [c[0][1], c[1][1], c[2][1]],
            [c[0][2], c[1][2], c[2][2]],
        ])
    }
}

impl Default for Mat3 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Mat3 {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        self.mul_mat(&rhs)
    }
}

impl Index<usize> for Mat3 {
    type Output = [f64; 3];

    #[inline]
    fn index(&self, i: usize) -> &[f64; 3] {
        &self.m[i]
    }
}
