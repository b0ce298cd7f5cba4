//! # vcms-core
//!
//! Foundation types for the vcms color transform engine.
//!
//! - [`Context`] - scoped configuration: user data, alarm codes, adaptation
//!   state, plugin registry and error handler
//! - [`PluginRegistry`] - type-erased plugin slots consumed by the upper crates
//! - [`CmsError`] / [`CmsResult`] - construction-time errors
//! - [`fixed`] - 16.16 fixed-point helpers and channel limits
//!
//! ## Crate Structure
//!
//! ```text
//! vcms-core (this crate)
//!    ^
//!    +-- vcms-math   (matrices, small solvers)
//!    +-- vcms-interp (grid parameters, interpolation kernels)
//!    +-- vcms-pipe   (stages, pipelines, reverse evaluation, optimizer)
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod context;
pub mod error;
pub mod fixed;
pub mod plugin;

pub use context::{Context, ErrorHandler, UserData};
pub use error::{CmsError, CmsResult, ErrorCode};
pub use fixed::{MAX_ALARM_CODES, MAX_INPUT_DIMENSIONS, MAX_STAGE_CHANNELS};
pub use plugin::{
    FormatterDirection, FormatterFactory, MutexFactory, PluginKind, PluginMutex, PluginRegistry,
    TagTypeHandler,
};
