//! Grid parameters.
//!
//! [`InterpParams`] describes one lookup grid: its shape, its flat sample
//! table and the kernel resolved for it. The table is stored axis 0 slowest,
//! with the output channels of a node packed together:
//!
//! ```text
//! offset(k0, k1, .., kn-1) = k0 * stride[0] + k1 * stride[1] + ... + c
//! stride[i] = n_outputs * samples[i+1] * ... * samples[n-1]
//! ```
//!
//! Kernels never see the params directly, only a borrowed [`GridView`]. The
//! N-D kernel recurses by taking sub-views that drop the leading axis and
//! start at an offset into the same table.

use std::fmt;
use std::sync::Arc;

use tracing::debug;
use vcms_core::{CmsError, CmsResult, Context, MAX_INPUT_DIMENSIONS, MAX_STAGE_CHANNELS};

use crate::factory::{self, Algorithm, InterpFactory, InterpFn};
use crate::{Interpolation, kernels};

mod sealed {
    pub trait Sealed {}
    impl Sealed for u16 {}
    impl Sealed for f32 {}
}

/// Sample type of a grid table: `u16` (fixed-point kernels) or `f32`.
pub trait Sample: sealed::Sealed + Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// True for the floating-point flavor.
    const IS_FLOAT: bool;

    #[doc(hidden)]
    fn builtin(
        n_inputs: usize,
        n_outputs: usize,
        interpolation: Interpolation,
    ) -> Option<(Algorithm, InterpFn<Self>)>;

    #[doc(hidden)]
    fn from_factory(
        factory: &dyn InterpFactory,
        n_inputs: usize,
        n_outputs: usize,
        interpolation: Interpolation,
    ) -> Option<InterpFn<Self>>;
}

impl Sample for u16 {
    const IS_FLOAT: bool = false;

    fn builtin(
        n_inputs: usize,
        n_outputs: usize,
        interpolation: Interpolation,
    ) -> Option<(Algorithm, InterpFn<Self>)> {
        let algorithm = Algorithm::select(n_inputs, n_outputs, interpolation)?;
        Some((algorithm, kernels::fixed::kernel(algorithm)?))
    }

    fn from_factory(
        factory: &dyn InterpFactory,
        n_inputs: usize,
        n_outputs: usize,
        interpolation: Interpolation,
    ) -> Option<InterpFn<Self>> {
        factory.interp_16(n_inputs, n_outputs, interpolation)
    }
}

impl Sample for f32 {
    const IS_FLOAT: bool = true;

    fn builtin(
        n_inputs: usize,
        n_outputs: usize,
        interpolation: Interpolation,
    ) -> Option<(Algorithm, InterpFn<Self>)> {
        let algorithm = Algorithm::select(n_inputs, n_outputs, interpolation)?;
        Some((algorithm, kernels::float::kernel(algorithm)?))
    }

    fn from_factory(
        factory: &dyn InterpFactory,
        n_inputs: usize,
        n_outputs: usize,
        interpolation: Interpolation,
    ) -> Option<InterpFn<Self>> {
        factory.interp_float(n_inputs, n_outputs, interpolation)
    }
}

/// Borrowed view of a grid, or of a sub-grid during N-D recursion.
#[derive(Clone, Copy)]
pub struct GridView<'a, T> {
    /// Table starting at this (sub-)grid's origin.
    pub table: &'a [T],
    /// `samples - 1` per remaining axis.
    pub domain: &'a [u32],
    /// Table stride per remaining axis.
    pub stride: &'a [usize],
    /// Output channels per node.
    pub n_outputs: usize,
}

impl<'a, T> GridView<'a, T> {
    /// Number of input axes of this view.
    #[inline]
    pub fn n_inputs(&self) -> usize {
        self.domain.len()
    }

    /// Sub-grid without the leading axis, starting `offset` entries in.
    #[inline]
    pub fn sub(&self, offset: usize) -> GridView<'a, T> {
        GridView {
            table: &self.table[offset..],
            domain: &self.domain[1..],
            stride: &self.stride[1..],
            n_outputs: self.n_outputs,
        }
    }
}

/// Shape, table and resolved kernel of one lookup grid.
///
/// Immutable once built; cloning shares the table.
///
/// # Example
///
/// ```rust
/// use vcms_core::Context;
/// use vcms_interp::{InterpParams, Interpolation};
///
/// // 1-D ramp with two nodes
/// let ctx = Context::new();
/// let p = InterpParams::<u16>::new(&ctx, &[2], 1, vec![0, 0xffff], Interpolation::default())
///     .unwrap();
///
/// let mut out = [0u16];
/// p.eval(&[0x1234], &mut out);
/// assert_eq!(out[0], 0x1234);
/// ```
#[derive(Clone)]
pub struct InterpParams<T: Sample> {
    n_inputs: usize,
    n_outputs: usize,
    samples: [u32; MAX_INPUT_DIMENSIONS],
    domain: [u32; MAX_INPUT_DIMENSIONS],
    stride: [usize; MAX_INPUT_DIMENSIONS],
    table: Arc<[T]>,
    interpolation: Interpolation,
    algorithm: Algorithm,
    func: InterpFn<T>,
}

impl<T: Sample> fmt::Debug for InterpParams<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterpParams")
            .field("n_inputs", &self.n_inputs)
            .field("n_outputs", &self.n_outputs)
            .field("samples", &self.samples())
            .field("table_len", &self.table.len())
            .field("float", &T::IS_FLOAT)
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

/// Largest number of nodes a grid may have.
pub const MAX_GRID_NODES: usize = u32::MAX as usize;

/// Number of nodes of a grid, or `None` when a side is < 2 or the product
/// exceeds [`MAX_GRID_NODES`].
pub fn cube_size(samples: &[u32]) -> Option<usize> {
    samples.iter().try_fold(1usize, |acc, &s| {
        if s < 2 {
            return None;
        }
        acc.checked_mul(s as usize).filter(|&n| n <= MAX_GRID_NODES)
    })
}

impl<T: Sample> InterpParams<T> {
    /// Builds grid parameters with per-axis sample counts.
    ///
    /// The number of inputs is `samples.len()`. Fails (and reports through
    /// the context's error handler) on channel counts out of `1..=15`, axes
    /// with fewer than two samples, a table whose length disagrees with the
    /// grid, or when no kernel handles the shape.
    pub fn new(
        ctx: &Context,
        samples: &[u32],
        n_outputs: usize,
        table: impl Into<Arc<[T]>>,
        interpolation: Interpolation,
    ) -> CmsResult<Self> {
        Self::build(ctx, samples, n_outputs, table.into(), interpolation)
            .inspect_err(|e| ctx.signal_error(e))
    }

    /// Builds grid parameters with the same sample count on every axis.
    pub fn new_uniform(
        ctx: &Context,
        n_samples: u32,
        n_inputs: usize,
        n_outputs: usize,
        table: impl Into<Arc<[T]>>,
        interpolation: Interpolation,
    ) -> CmsResult<Self> {
        if n_inputs > MAX_INPUT_DIMENSIONS {
            let e = CmsError::ChannelLimit {
                what: "grid input",
                requested: n_inputs,
                max: MAX_INPUT_DIMENSIONS,
            };
            ctx.signal_error(&e);
            return Err(e);
        }
        let samples = [n_samples; MAX_INPUT_DIMENSIONS];
        Self::new(ctx, &samples[..n_inputs], n_outputs, table, interpolation)
    }

    fn build(
        ctx: &Context,
        samples: &[u32],
        n_outputs: usize,
        table: Arc<[T]>,
        interpolation: Interpolation,
    ) -> CmsResult<Self> {
        let n_inputs = samples.len();
        if n_inputs == 0 || n_inputs > MAX_INPUT_DIMENSIONS {
            return Err(CmsError::ChannelLimit {
                what: "grid input",
                requested: n_inputs,
                max: MAX_INPUT_DIMENSIONS,
            });
        }
        if n_outputs == 0 || n_outputs > MAX_STAGE_CHANNELS {
            return Err(CmsError::ChannelLimit {
                what: "grid output",
                requested: n_outputs,
                max: MAX_STAGE_CHANNELS,
            });
        }

        let nodes = cube_size(samples)
            .ok_or_else(|| CmsError::InvalidGrid(format!("unusable sample counts {samples:?}")))?;
        let expected = nodes
            .checked_mul(n_outputs)
            .ok_or_else(|| CmsError::InvalidGrid("grid size overflows".into()))?;
        if table.len() != expected {
            return Err(CmsError::TableSize {
                expected,
                actual: table.len(),
            });
        }

        let (algorithm, func) = factory::resolve::<T>(ctx, n_inputs, n_outputs, interpolation)
            .ok_or(
            CmsError::UnsupportedInterpolation {
                inputs: n_inputs,
                outputs: n_outputs,
                float: T::IS_FLOAT,
            },
        )?;

        let mut s = [0u32; MAX_INPUT_DIMENSIONS];
        let mut domain = [0u32; MAX_INPUT_DIMENSIONS];
        let mut stride = [0usize; MAX_INPUT_DIMENSIONS];
        s[..n_inputs].copy_from_slice(samples);

        let mut acc = n_outputs;
        for i in (0..n_inputs).rev() {
            domain[i] = samples[i] - 1;
            stride[i] = acc;
            acc *= samples[i] as usize;
        }

        debug!(n_inputs, n_outputs, ?algorithm, float = T::IS_FLOAT, "Built grid parameters");

        Ok(Self {
            n_inputs,
            n_outputs,
            samples: s,
            domain,
            stride,
            table,
            interpolation,
            algorithm,
            func,
        })
    }

    /// Same grid and kernel over a different table of identical length.
    pub fn with_table(&self, table: impl Into<Arc<[T]>>) -> CmsResult<Self> {
        let table = table.into();
        if table.len() != self.table.len() {
            return Err(CmsError::TableSize {
                expected: self.table.len(),
                actual: table.len(),
            });
        }
        Ok(Self {
            table,
            ..self.clone()
        })
    }

    /// Evaluates the grid.
    ///
    /// `input` holds at least `n_inputs` values, `output` at least
    /// `n_outputs`. Out-of-domain inputs clamp to the grid edges.
    #[inline]
    pub fn eval(&self, input: &[T], output: &mut [T]) {
        (self.func)(input, output, &self.view())
    }

    /// Borrowed view of the whole grid.
    #[inline]
    pub fn view(&self) -> GridView<'_, T> {
        GridView {
            table: &self.table,
            domain: &self.domain[..self.n_inputs],
            stride: &self.stride[..self.n_inputs],
            n_outputs: self.n_outputs,
        }
    }

    /// Number of input axes.
    #[inline]
    pub fn n_inputs(&self) -> usize {
        self.n_inputs
    }

    /// Output channels per node.
    #[inline]
    pub fn n_outputs(&self) -> usize {
        self.n_outputs
    }

    /// Sample count per axis.
    #[inline]
    pub fn samples(&self) -> &[u32] {
        &self.samples[..self.n_inputs]
    }

    /// `samples - 1` per axis.
    #[inline]
    pub fn domain(&self) -> &[u32] {
        &self.domain[..self.n_inputs]
    }

    /// Table stride per axis.
    #[inline]
    pub fn stride(&self) -> &[usize] {
        &self.stride[..self.n_inputs]
    }

    /// The flat sample table.
    #[inline]
    pub fn table(&self) -> &[T] {
        &self.table
    }

    /// Number of grid nodes.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.table.len() / self.n_outputs
    }

    /// Requested interpolation method.
    #[inline]
    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    /// Kernel resolved at construction.
    #[inline]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }
}
