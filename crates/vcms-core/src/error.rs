//! Error types for engine construction.
//!
//! Every failure the engine reports happens while *building* something:
//! grid parameters, stages or pipelines. Evaluation never fails, so none of
//! the hot-path functions return [`CmsResult`].
//!
//! Each [`CmsError`] also carries an [`ErrorCode`], which is what the
//! context's installable error handler receives alongside the message.

use thiserror::Error;

/// Result type for engine construction.
pub type CmsResult<T> = Result<T, CmsError>;

/// Coarse error classes handed to the installable error handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Anything not covered below.
    Undefined,
    /// A value is outside the range the engine supports.
    Range,
    /// Internal consistency failure.
    Internal,
    /// Shapes of two connected objects do not agree.
    ColorspaceCheck,
    /// No implementation is able to handle the request.
    NotSuitable,
    /// A plugin or object with the same identity already exists.
    AlreadyDefined,
    /// Data is malformed.
    CorruptionDetected,
}

/// Errors raised while constructing engine objects.
#[derive(Debug, Error)]
pub enum CmsError {
    /// Channel count beyond what the engine supports.
    #[error("{what}: {requested} channels requested, maximum is {max}")]
    ChannelLimit {
        /// Which side overflowed (input, output, ...)
        what: &'static str,
        /// Requested count
        requested: usize,
        /// Supported maximum
        max: usize,
    },

    /// Grid description is unusable.
    #[error("invalid grid: {0}")]
    InvalidGrid(String),

    /// Table length does not match the declared grid.
    #[error("table size mismatch: expected {expected} entries, got {actual}")]
    TableSize {
        /// Entries the grid requires
        expected: usize,
        /// Entries supplied
        actual: usize,
    },

    /// No built-in or plugin interpolation kernel handles this shape.
    #[error("no interpolation routine for {inputs} inputs, {outputs} outputs (float: {float})")]
    UnsupportedInterpolation {
        /// Input channels
        inputs: usize,
        /// Output channels
        outputs: usize,
        /// Float table flavor
        float: bool,
    },

    /// Two adjacent objects disagree on channel counts.
    #[error("channel mismatch: {produced} channels produced, {expected} expected")]
    ChannelMismatch {
        /// Channels produced by the upstream side
        produced: usize,
        /// Channels consumed by the downstream side
        expected: usize,
    },

    /// Value out of range.
    #[error("out of range: {0}")]
    Range(String),

    /// Operation not applicable to this object.
    #[error("not suitable: {0}")]
    NotSuitable(String),

    /// Malformed data.
    #[error("corrupt data: {0}")]
    Corrupt(String),
}

impl CmsError {
    /// Returns the error class reported to error handlers.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ChannelLimit { .. } | Self::Range(_) => ErrorCode::Range,
            Self::InvalidGrid(_) | Self::TableSize { .. } | Self::Corrupt(_) => {
                ErrorCode::CorruptionDetected
            }
            Self::UnsupportedInterpolation { .. } | Self::NotSuitable(_) => ErrorCode::NotSuitable,
            Self::ChannelMismatch { .. } => ErrorCode::ColorspaceCheck,
        }
    }
}
