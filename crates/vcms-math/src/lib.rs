//! # vcms-math
//!
//! Linear algebra needed by the color engine and nothing more:
//!
//! - [`Mat3`] - 3x3 `f64` matrix (row-major, column vectors), backed by
//!   [`glam::DMat3`] for products and inversion
//! - [`solve_dense`] / [`least_squares`] - stack-only solvers for the
//!   Jacobian systems of reverse evaluation
//!
//! # Dependencies
//!
//! - [`glam`] - double-precision 3x3 math
//!
//! # Used By
//!
//! - `vcms-pipe` - matrix folding and reverse evaluation

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod mat3;
mod solve;

pub use mat3::*;
pub use solve::*;
