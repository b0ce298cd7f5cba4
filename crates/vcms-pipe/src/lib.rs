//! # vcms-pipe
//!
//! Stages and pipelines of the vcms color engine.
//!
//! A [`Pipeline`] chains [`Stage`]s: identity, matrices, per-channel
//! [`ToneCurve`]s, 16-bit and float lookup grids, named colors, and plugin
//! stages. On top of forward evaluation this crate provides:
//!
//! - reverse evaluation ([`Pipeline::eval_reverse_float`])
//! - lossless optimization with pluggable passes ([`optimize_pipeline`])
//! - a last-value cache for 16-bit evaluation ([`Eval16Cache`])
//! - CLUT sampling ([`Stage::sample_clut16`], [`slice_space_16`])
//!
//! # Example
//!
//! ```rust
//! use vcms_core::Context;
//! use vcms_pipe::{At, Pipeline, Stage, ToneCurve};
//!
//! let ctx = Context::new();
//! let g = ToneCurve::gamma(&ctx, 2.2).unwrap();
//!
//! let mut p = Pipeline::new(&ctx);
//! p.insert(Stage::tone_curves(&ctx, vec![g.clone(), g.clone(), g]).unwrap(), At::End).unwrap();
//!
//! let mut out = [0f32; 3];
//! p.eval_float(&[0.0, 0.5, 1.0], &mut out);
//! assert!((out[1] - 0.5f32.powf(2.2)).abs() < 1e-4);
//! ```
//!
//! # Features
//!
//! - `parallel` (default) - batch evaluation split across threads with
//!   `rayon`
//!
//! # Dependencies
//!
//! - `vcms-core` - context, errors, plugin registry
//! - `vcms-math` - matrix folding and reverse-evaluation solves
//! - `vcms-interp` - grid kernels behind curves and CLUTs
//! - [`tracing`] - construction and optimizer logging
//!
//! # Used By
//!
//! - `vcms-tests` - cross-crate properties
//! - `vcms-bench` - evaluation benchmarks

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod cache;
pub mod curve;
pub mod named;
pub mod optimize;
mod pipeline;
mod reverse;
mod sample;
pub mod stage;

pub use cache::Eval16Cache;
pub use curve::{ParametricCurve, ToneCurve};
pub use named::{NamedColor, NamedColorList};
pub use optimize::{OptimizationPass, optimize_pipeline, register_optimization};
pub use pipeline::{At, Eval16Fn, Pipeline};
pub use sample::{SamplerFlags, slice_space_16, slice_space_float};
pub use stage::{
    CustomStage, MatrixData, Stage, StageData, StageKind, StageTypeFactory, register_stage_type,
};
