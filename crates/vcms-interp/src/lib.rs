//! # vcms-interp
//!
//! Lookup grid interpolation for the vcms color engine.
//!
//! A grid maps `1..=15` normalized inputs to `1..=15` outputs through a
//! table of samples on a regular lattice. This crate builds grid
//! parameters ([`InterpParams`]) and evaluates them with a kernel chosen
//! from the grid's shape:
//!
//! - 1 input: linear blend between two nodes
//! - 2 inputs: bilinear
//! - 3 inputs: tetrahedral (default) or trilinear
//! - 4 to 15 inputs: recursive reduction to the 3-input case
//!
//! Every kernel exists in a 16-bit fixed-point and an `f32` flavor. Plugin
//! kernels registered on the [`Context`](vcms_core::Context) take
//! precedence over the built-ins (see [`InterpFactory`]).
//!
//! # Example
//!
//! ```rust
//! use vcms_core::Context;
//! use vcms_interp::{InterpParams, Interpolation};
//!
//! let ctx = Context::new();
//!
//! // 2x2x2 grid mapping every corner to itself
//! let mut table = Vec::new();
//! for r in [0.0f32, 1.0] {
//!     for g in [0.0, 1.0] {
//!         for b in [0.0, 1.0] {
//!             table.extend_from_slice(&[r, g, b]);
//!         }
//!     }
//! }
//! let grid = InterpParams::new(&ctx, &[2, 2, 2], 3, table, Interpolation::Tetrahedral).unwrap();
//!
//! let mut out = [0.0f32; 3];
//! grid.eval(&[0.2, 0.5, 0.8], &mut out);
//! assert!((out[1] - 0.5).abs() < 1e-6);
//! ```
//!
//! # Dependencies
//!
//! - `vcms-core` - context, errors, fixed-point helpers
//! - [`tracing`] - construction logging
//!
//! # Used By
//!
//! - `vcms-pipe` - CLUT and tone curve stages

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod factory;
mod interp;
pub mod kernels;
pub mod params;

pub use factory::{Algorithm, InterpFactory, InterpFn, register_interp_factory};
pub use interp::Interpolation;
pub use params::{GridView, InterpParams, MAX_GRID_NODES, Sample, cube_size};
