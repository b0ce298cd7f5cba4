//! Pipeline stages.
//!
//! A [`Stage`] is one link of a transform: a channel count on each side and
//! an immutable payload ([`StageData`]). Every stage evaluates in `f32`;
//! 16-bit CLUT stages quantize on the way in and out.
//!
//! # Stage Kinds
//!
//! | kind         | inputs | outputs   | payload                        |
//! |--------------|--------|-----------|--------------------------------|
//! | Identity     | n      | n         | -                              |
//! | Matrix       | cols   | rows      | coefficients + optional offset |
//! | ToneCurves   | n      | n         | one curve per channel          |
//! | Clut16       | 1..=15 | 1..=15    | 16-bit grid                    |
//! | ClutFloat    | 1..=15 | 1..=15    | float grid                     |
//! | NamedColor   | 1      | 3 or n    | named color list               |
//! | Custom       | any    | any       | plugin object                  |

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};
use vcms_core::fixed::{floats_to_words, from_16_to_float, from_float_to_16, quick_saturate_word};
use vcms_core::{CmsError, CmsResult, Context, MAX_INPUT_DIMENSIONS, MAX_STAGE_CHANNELS, PluginKind};
use vcms_interp::{InterpParams, Interpolation, cube_size};
use vcms_math::Mat3;

use crate::curve::ToneCurve;
use crate::named::NamedColorList;

/// Kind tag of a [`Stage`], used to match pipeline shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    /// Copies its input.
    Identity,
    /// Affine transform.
    Matrix,
    /// Per-channel curves.
    ToneCurves,
    /// 16-bit lookup grid.
    Clut16,
    /// Float lookup grid.
    ClutFloat,
    /// Index to named color.
    NamedColor,
    /// Plugin stage.
    Custom,
}

/// Evaluation hook of a plugin stage.
///
/// Dropping the box frees the plugin's data.
pub trait CustomStage: fmt::Debug + Send + Sync {
    /// Evaluates one pixel.
    fn eval(&self, input: &[f32], output: &mut [f32]);

    /// Deep copy, used when a pipeline is duplicated.
    fn clone_box(&self) -> Box<dyn CustomStage>;

    /// Type name, for matching and logs.
    fn name(&self) -> &str {
        "custom"
    }
}

impl Clone for Box<dyn CustomStage> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Plugin creating custom stages by type name.
pub trait StageTypeFactory: Send + Sync {
    /// Type name this factory builds.
    fn name(&self) -> &str;

    /// Builds a stage object for the channel counts, or `None` if unsupported.
    fn create(&self, n_inputs: usize, n_outputs: usize) -> Option<Box<dyn CustomStage>>;
}

/// Registers a custom stage type on `ctx`.
pub fn register_stage_type(ctx: &mut Context, factory: Arc<dyn StageTypeFactory>) {
    ctx.register_plugin(PluginKind::StageType, factory);
}

/// Affine transform `out = coeffs * in + offset`.
///
/// Coefficients are row-major, one row per output.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixData {
    rows: usize,
    cols: usize,
    coeffs: Vec<f64>,
    offset: Option<Vec<f64>>,
}

impl MatrixData {
    /// Outputs.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Inputs.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Row-major coefficients.
    pub fn coeffs(&self) -> &[f64] {
        &self.coeffs
    }

    /// Per-output offset.
    pub fn offset(&self) -> Option<&[f64]> {
        self.offset.as_deref()
    }

    /// True for a square identity with no (or a zero) offset.
    pub fn is_identity(&self) -> bool {
        if self.rows != self.cols {
            return false;
        }
        let square = (0..self.rows).all(|i| {
            (0..self.cols).all(|j| self.coeffs[i * self.cols + j] == if i == j { 1.0 } else { 0.0 })
        });
        square && self.offset.as_ref().is_none_or(|o| o.iter().all(|&v| v == 0.0))
    }

    /// Matrix applying `self` and then `next`.
    pub(crate) fn then(&self, next: &MatrixData) -> MatrixData {
        let (rows, cols, inner) = (next.rows, self.cols, self.rows);

        let coeffs = if rows == 3 && cols == 3 && inner == 3 {
            let a = Mat3::from_row_slice(&next.coeffs).unwrap_or_default();
            let b = Mat3::from_row_slice(&self.coeffs).unwrap_or_default();
            a.mul_mat(&b).to_row_array().to_vec()
        } else {
            let mut c = vec![0.0; rows * cols];
            for i in 0..rows {
                for j in 0..cols {
                    c[i * cols + j] = (0..inner)
                        .map(|k| next.coeffs[i * inner + k] * self.coeffs[k * cols + j])
                        .sum();
                }
            }
            c
        };

        let offset = match (&self.offset, &next.offset) {
            (None, None) => None,
            (first, second) => Some(
                (0..rows)
                    .map(|i| {
                        let carried: f64 = first
                            .as_ref()
                            .map_or(0.0, |o| {
                                (0..inner).map(|k| next.coeffs[i * inner + k] * o[k]).sum()
                            });
                        carried + second.as_ref().map_or(0.0, |o| o[i])
                    })
                    .collect(),
            ),
        };

        MatrixData {
            rows,
            cols,
            coeffs,
            offset,
        }
    }

    fn apply(&self, input: &[f32], output: &mut [f32]) {
        for (i, out) in output[..self.rows].iter_mut().enumerate() {
            let row = &self.coeffs[i * self.cols..(i + 1) * self.cols];
            let mut v: f64 = row.iter().zip(input).map(|(&c, &x)| c * x as f64).sum();
            if let Some(o) = &self.offset {
                v += o[i];
            }
            *out = v as f32;
        }
    }
}

/// Payload of a [`Stage`].
#[derive(Debug, Clone)]
pub enum StageData {
    /// Copies input to output.
    Identity,
    /// Affine transform.
    Matrix(MatrixData),
    /// One curve per channel.
    ToneCurves(Vec<ToneCurve>),
    /// 16-bit grid.
    Clut16(InterpParams<u16>),
    /// Float grid.
    ClutFloat(InterpParams<f32>),
    /// Index to named color.
    NamedColor {
        /// The colors.
        list: Arc<NamedColorList>,
        /// Output PCS instead of device colorants.
        use_pcs: bool,
    },
    /// Plugin stage.
    Custom(Box<dyn CustomStage>),
}

/// One link of a [`Pipeline`](crate::Pipeline).
///
/// Cloning duplicates the stage; the copy is fully independent.
#[derive(Debug, Clone)]
pub struct Stage {
    n_inputs: usize,
    n_outputs: usize,
    data: StageData,
}

fn check_channels(ctx: &Context, what: &'static str, n: usize, max: usize) -> CmsResult<()> {
    if n == 0 || n > max {
        let e = CmsError::ChannelLimit {
            what,
            requested: n,
            max,
        };
        ctx.signal_error(&e);
        return Err(e);
    }
    Ok(())
}

impl Stage {
    fn alloc(n_inputs: usize, n_outputs: usize, data: StageData) -> Self {
        let stage = Self {
            n_inputs,
            n_outputs,
            data,
        };
        debug!(kind = ?stage.kind(), n_inputs, n_outputs, "Allocated stage");
        stage
    }

    /// Stage copying `n` channels through.
    pub fn identity(ctx: &Context, n: usize) -> CmsResult<Self> {
        check_channels(ctx, "identity stage", n, MAX_STAGE_CHANNELS)?;
        Ok(Self::alloc(n, n, StageData::Identity))
    }

    /// Affine stage with `rows` outputs and `cols` inputs.
    ///
    /// `coeffs` is row-major, `rows * cols` long; `offset`, if given, has one
    /// entry per output.
    pub fn matrix(
        ctx: &Context,
        rows: usize,
        cols: usize,
        coeffs: &[f64],
        offset: Option<&[f64]>,
    ) -> CmsResult<Self> {
        check_channels(ctx, "matrix rows", rows, MAX_STAGE_CHANNELS)?;
        check_channels(ctx, "matrix columns", cols, MAX_STAGE_CHANNELS)?;

        let bad_len = |expected: usize, actual: usize| {
            let e = CmsError::TableSize { expected, actual };
            ctx.signal_error(&e);
            e
        };
        if coeffs.len() != rows * cols {
            return Err(bad_len(rows * cols, coeffs.len()));
        }
        if let Some(o) = offset {
            if o.len() != rows {
                return Err(bad_len(rows, o.len()));
            }
        }

        let data = MatrixData {
            rows,
            cols,
            coeffs: coeffs.to_vec(),
            offset: offset.map(<[f64]>::to_vec),
        };
        Ok(Self::alloc(cols, rows, StageData::Matrix(data)))
    }

    /// 3x3 matrix stage from a [`Mat3`].
    pub fn matrix3(ctx: &Context, m: &Mat3, offset: Option<[f64; 3]>) -> CmsResult<Self> {
        Self::matrix(ctx, 3, 3, &m.to_row_array(), offset.as_ref().map(|o| o.as_slice()))
    }

    /// Per-channel curve stage, one channel per curve.
    pub fn tone_curves(ctx: &Context, curves: Vec<ToneCurve>) -> CmsResult<Self> {
        let n = curves.len();
        check_channels(ctx, "tone curve stage", n, MAX_STAGE_CHANNELS)?;
        Ok(Self::alloc(n, n, StageData::ToneCurves(curves)))
    }

    /// `n` identity curves.
    pub fn identity_curves(ctx: &Context, n: usize) -> CmsResult<Self> {
        check_channels(ctx, "tone curve stage", n, MAX_STAGE_CHANNELS)?;
        let curves = (0..n).map(|_| ToneCurve::linear(ctx)).collect::<CmsResult<Vec<_>>>()?;
        Self::tone_curves(ctx, curves)
    }

    /// 16-bit CLUT with `grid_points` samples on every axis.
    pub fn clut16(
        ctx: &Context,
        grid_points: u32,
        n_inputs: usize,
        n_outputs: usize,
        table: Option<Vec<u16>>,
    ) -> CmsResult<Self> {
        check_channels(ctx, "CLUT input", n_inputs, MAX_INPUT_DIMENSIONS)?;
        let samples = [grid_points; MAX_INPUT_DIMENSIONS];
        Self::clut16_granular(ctx, &samples[..n_inputs], n_outputs, table)
    }

    /// 16-bit CLUT with per-axis sample counts. A missing table is zeroed.
    pub fn clut16_granular(
        ctx: &Context,
        samples: &[u32],
        n_outputs: usize,
        table: Option<Vec<u16>>,
    ) -> CmsResult<Self> {
        let table = match table {
            Some(t) => t,
            None => zeroed_table(ctx, samples, n_outputs)?,
        };
        let params = InterpParams::new(ctx, samples, n_outputs, table, Interpolation::default())?;
        Ok(Self::alloc(samples.len(), n_outputs, StageData::Clut16(params)))
    }

    /// Float CLUT with `grid_points` samples on every axis.
    pub fn clut_float(
        ctx: &Context,
        grid_points: u32,
        n_inputs: usize,
        n_outputs: usize,
        table: Option<Vec<f32>>,
    ) -> CmsResult<Self> {
        check_channels(ctx, "CLUT input", n_inputs, MAX_INPUT_DIMENSIONS)?;
        let samples = [grid_points; MAX_INPUT_DIMENSIONS];
        Self::clut_float_granular(ctx, &samples[..n_inputs], n_outputs, table)
    }

    /// Float CLUT with per-axis sample counts. A missing table is zeroed.
    pub fn clut_float_granular(
        ctx: &Context,
        samples: &[u32],
        n_outputs: usize,
        table: Option<Vec<f32>>,
    ) -> CmsResult<Self> {
        let table = match table {
            Some(t) => t,
            None => zeroed_table(ctx, samples, n_outputs)?,
        };
        let params = InterpParams::new(ctx, samples, n_outputs, table, Interpolation::default())?;
        Ok(Self::alloc(samples.len(), n_outputs, StageData::ClutFloat(params)))
    }

    pub(crate) fn from_matrix(m: MatrixData) -> Self {
        Self::alloc(m.cols, m.rows, StageData::Matrix(m))
    }

    /// Wraps an already built grid.
    pub fn from_grid16(params: InterpParams<u16>) -> Self {
        Self::alloc(params.n_inputs(), params.n_outputs(), StageData::Clut16(params))
    }

    /// Wraps an already built float grid.
    pub fn from_grid_float(params: InterpParams<f32>) -> Self {
        Self::alloc(params.n_inputs(), params.n_outputs(), StageData::ClutFloat(params))
    }

    /// Named color stage: 1 input (the normalized index), PCS or colorants out.
    pub fn named_color(list: Arc<NamedColorList>, use_pcs: bool) -> Self {
        let n_out = if use_pcs { 3 } else { list.colorant_count() };
        Self::alloc(1, n_out, StageData::NamedColor { list, use_pcs })
    }

    /// Plugin stage.
    pub fn custom(
        ctx: &Context,
        n_inputs: usize,
        n_outputs: usize,
        stage: Box<dyn CustomStage>,
    ) -> CmsResult<Self> {
        check_channels(ctx, "custom stage input", n_inputs, MAX_STAGE_CHANNELS)?;
        check_channels(ctx, "custom stage output", n_outputs, MAX_STAGE_CHANNELS)?;
        Ok(Self::alloc(n_inputs, n_outputs, StageData::Custom(stage)))
    }

    /// Plugin stage built by the newest registered factory named `name`.
    pub fn from_plugin(
        ctx: &Context,
        name: &str,
        n_inputs: usize,
        n_outputs: usize,
    ) -> CmsResult<Self> {
        let stage = ctx
            .plugins()
            .iter::<Arc<dyn StageTypeFactory>>(PluginKind::StageType)
            .filter(|f| f.name() == name)
            .find_map(|f| f.create(n_inputs, n_outputs));

        match stage {
            Some(s) => Self::custom(ctx, n_inputs, n_outputs, s),
            None => {
                let e = CmsError::NotSuitable(format!(
                    "no stage type '{name}' for {n_inputs} -> {n_outputs}"
                ));
                ctx.signal_error(&e);
                Err(e)
            }
        }
    }

    /// Kind tag.
    pub fn kind(&self) -> StageKind {
        match &self.data {
            StageData::Identity => StageKind::Identity,
            StageData::Matrix(_) => StageKind::Matrix,
            StageData::ToneCurves(_) => StageKind::ToneCurves,
            StageData::Clut16(_) => StageKind::Clut16,
            StageData::ClutFloat(_) => StageKind::ClutFloat,
            StageData::NamedColor { .. } => StageKind::NamedColor,
            StageData::Custom(_) => StageKind::Custom,
        }
    }

    /// Input channels.
    #[inline]
    pub fn input_channels(&self) -> usize {
        self.n_inputs
    }

    /// Output channels.
    #[inline]
    pub fn output_channels(&self) -> usize {
        self.n_outputs
    }

    /// The payload.
    pub fn data(&self) -> &StageData {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut StageData {
        &mut self.data
    }

    /// Reshapes an identity or custom stage.
    ///
    /// Counts of zero or beyond the channel limit are ignored and the prior
    /// shape kept, as are shapes the payload cannot follow (fixed-shape
    /// kinds, or a non-square identity). Returns whether the shape changed.
    pub fn set_channels(&mut self, n_inputs: usize, n_outputs: usize) -> bool {
        let valid = |n: usize| (1..=MAX_STAGE_CHANNELS).contains(&n);
        if !valid(n_inputs) || !valid(n_outputs) {
            debug!(n_inputs, n_outputs, "Ignoring out of range stage shape");
            return false;
        }
        let reshapeable = match self.data {
            StageData::Identity => n_inputs == n_outputs,
            StageData::Custom(_) => true,
            _ => false,
        };
        if reshapeable {
            self.n_inputs = n_inputs;
            self.n_outputs = n_outputs;
        }
        reshapeable
    }

    /// Evaluates one pixel: `input` holds the stage's input channels,
    /// `output` receives its output channels.
    pub fn eval(&self, input: &[f32], output: &mut [f32]) {
        match &self.data {
            StageData::Identity => output[..self.n_inputs].copy_from_slice(&input[..self.n_inputs]),
            StageData::Matrix(m) => m.apply(input, output),
            StageData::ToneCurves(curves) => {
                for (i, c) in curves.iter().enumerate() {
                    output[i] = c.eval_float(input[i]);
                }
            }
            StageData::Clut16(p) => {
                let mut i16 = [0u16; MAX_STAGE_CHANNELS];
                let mut o16 = [0u16; MAX_STAGE_CHANNELS];
                floats_to_words(&input[..self.n_inputs], &mut i16);
                p.eval(&i16, &mut o16);
                for (o, &v) in output[..self.n_outputs].iter_mut().zip(&o16) {
                    *o = from_16_to_float(v);
                }
            }
            StageData::ClutFloat(p) => p.eval(input, output),
            StageData::NamedColor { list, use_pcs } => {
                let index = quick_saturate_word(input[0] as f64 * 65535.0) as usize;
                let out = &mut output[..self.n_outputs];
                match list.get(index) {
                    Some(c) if *use_pcs => {
                        for (o, &v) in out.iter_mut().zip(&c.pcs) {
                            *o = from_16_to_float(v);
                        }
                    }
                    Some(c) => {
                        for (o, &v) in out.iter_mut().zip(&c.colorant) {
                            *o = from_16_to_float(v);
                        }
                    }
                    None => {
                        warn!(index, len = list.len(), "Named color index out of range");
                        out.fill(0.0);
                    }
                }
            }
            StageData::Custom(c) => c.eval(input, output),
        }
    }

    /// Evaluates one pixel in 16-bit.
    pub fn eval_16(&self, input: &[u16], output: &mut [u16]) {
        let mut fi = [0f32; MAX_STAGE_CHANNELS];
        let mut fo = [0f32; MAX_STAGE_CHANNELS];
        for (f, &v) in fi.iter_mut().zip(&input[..self.n_inputs]) {
            *f = from_16_to_float(v);
        }
        self.eval(&fi, &mut fo);
        for (o, &v) in output[..self.n_outputs].iter_mut().zip(&fo) {
            *o = from_float_to_16(v);
        }
    }
}

fn zeroed_table<T: Clone + Default>(
    ctx: &Context,
    samples: &[u32],
    n_outputs: usize,
) -> CmsResult<Vec<T>> {
    check_channels(ctx, "CLUT input", samples.len(), MAX_INPUT_DIMENSIONS)?;
    check_channels(ctx, "CLUT output", n_outputs, MAX_STAGE_CHANNELS)?;
    let fail = |msg: String| {
        let e = CmsError::InvalidGrid(msg);
        ctx.signal_error(&e);
        e
    };

    let len = cube_size(samples)
        .and_then(|n| n.checked_mul(n_outputs))
        .ok_or_else(|| fail(format!("unusable sample counts {samples:?}")))?;
    let mut table = Vec::new();
    table
        .try_reserve_exact(len)
        .map_err(|_| fail(format!("cannot allocate {len} entries for grid {samples:?}")))?;
    table.resize(len, T::default());
    Ok(table)
}
