//! Stage pipelines.
//!
//! A [`Pipeline`] is an ordered chain of [`Stage`]s. Evaluation runs the
//! input through every stage in order, alternating between two stack
//! buffers sized to the channel limit, so a call never allocates.
//!
//! Adjacent stages must agree on channel counts: [`Pipeline::insert`] and
//! [`Pipeline::cat`] refuse a stage that does not fit and leave the chain
//! as it was.
//!
//! # Example
//!
//! ```rust
//! use vcms_core::Context;
//! use vcms_math::Mat3;
//! use vcms_pipe::{At, Pipeline, Stage};
//!
//! let ctx = Context::new();
//! let mut pipeline = Pipeline::new(&ctx);
//! pipeline.insert(Stage::identity_curves(&ctx, 3).unwrap(), At::End).unwrap();
//! pipeline.insert(Stage::matrix3(&ctx, &Mat3::IDENTITY, None).unwrap(), At::End).unwrap();
//!
//! let mut out = [0u16; 3];
//! pipeline.eval_16(&[0x1000, 0x8000, 0xffff], &mut out);
//! assert_eq!(out, [0x1000, 0x8000, 0xffff]);
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::debug;
use vcms_core::fixed::{from_16_to_float, from_float_to_16};
use vcms_core::{CmsError, CmsResult, Context, MAX_STAGE_CHANNELS};
use vcms_interp::InterpParams;

use crate::stage::{Stage, StageKind};

/// Where to insert or unlink a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum At {
    /// Head of the chain.
    Begin,
    /// Tail of the chain.
    End,
}

/// Replacement 16-bit evaluator installed by an optimization pass.
pub type Eval16Fn = Arc<dyn Fn(&[u16], &mut [u16]) + Send + Sync>;

/// Fast path replacing stage-by-stage 16-bit evaluation.
#[derive(Clone)]
pub(crate) enum FastEval {
    /// Output equals input.
    Identity,
    /// A single 16-bit grid evaluated directly.
    Clut16(InterpParams<u16>),
    /// Plugin supplied.
    Custom(Eval16Fn),
}

impl fmt::Debug for FastEval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => f.write_str("Identity"),
            Self::Clut16(p) => f.debug_tuple("Clut16").field(&p.algorithm()).finish(),
            Self::Custom(_) => f.write_str("Custom(fn)"),
        }
    }
}

/// An ordered chain of stages.
///
/// Cloning duplicates every stage; the copy shares nothing mutable with the
/// source.
#[derive(Debug, Clone)]
pub struct Pipeline {
    ctx: Context,
    stages: Vec<Stage>,
    fast: Option<FastEval>,
    no_cache: bool,
}

impl Pipeline {
    /// Creates an empty pipeline bound to `ctx`.
    pub fn new(ctx: &Context) -> Self {
        Self {
            ctx: ctx.clone(),
            stages: Vec::new(),
            fast: None,
            no_cache: false,
        }
    }

    /// Context the pipeline was created with.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Input channels of the first stage, 0 when empty.
    pub fn input_channels(&self) -> usize {
        self.stages.first().map_or(0, Stage::input_channels)
    }

    /// Output channels of the last stage, 0 when empty.
    pub fn output_channels(&self) -> usize {
        self.stages.last().map_or(0, Stage::output_channels)
    }

    /// Number of stages.
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// True when the pipeline holds no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// The stages, first to last.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// First stage.
    pub fn first_stage(&self) -> Option<&Stage> {
        self.stages.first()
    }

    /// Last stage.
    pub fn last_stage(&self) -> Option<&Stage> {
        self.stages.last()
    }

    /// Output caching is disabled for this pipeline.
    pub fn no_cache(&self) -> bool {
        self.no_cache
    }

    /// Enables or disables output caching.
    pub fn set_no_cache(&mut self, no_cache: bool) {
        self.no_cache = no_cache;
    }

    /// True when an optimization pass installed a fast 16-bit path.
    pub fn is_optimized(&self) -> bool {
        self.fast.is_some()
    }

    /// Installs a replacement 16-bit evaluator and sets `no_cache`.
    ///
    /// It stays in place until the chain changes. Pass `no_cache = false`
    /// only when `f` is slow enough for [`Eval16Cache`](crate::Eval16Cache)
    /// to pay off; caches must be created after this call.
    pub fn set_optimized_eval_16(&mut self, f: Eval16Fn, no_cache: bool) {
        self.fast = Some(FastEval::Custom(f));
        self.no_cache = no_cache;
    }

    pub(crate) fn set_fast(&mut self, fast: FastEval) {
        debug!(?fast, "Installed fast 16-bit path");
        self.fast = Some(fast);
    }

    pub(crate) fn stages_mut(&mut self) -> &mut Vec<Stage> {
        self.fast = None;
        &mut self.stages
    }

    fn check_fit(&self, stage: &Stage, at: At) -> CmsResult<()> {
        let (produced, expected) = match at {
            At::End => match self.stages.last() {
                Some(last) => (last.output_channels(), stage.input_channels()),
                None => return Ok(()),
            },
            At::Begin => match self.stages.first() {
                Some(first) => (stage.output_channels(), first.input_channels()),
                None => return Ok(()),
            },
        };
        if produced != expected {
            let e = CmsError::ChannelMismatch { produced, expected };
            self.ctx.signal_error(&e);
            return Err(e);
        }
        Ok(())
    }

    /// Splices a stage in at either end.
    ///
    /// Fails, leaving the pipeline unchanged, when the stage's channel count
    /// does not match its new neighbour.
    pub fn insert(&mut self, stage: Stage, at: At) -> CmsResult<()> {
        self.check_fit(&stage, at)?;
        debug!(kind = ?stage.kind(), ?at, "Inserting stage");
        match at {
            At::Begin => self.stages_mut().insert(0, stage),
            At::End => self.stages_mut().push(stage),
        }
        Ok(())
    }

    /// Removes the stage at either end and hands it to the caller.
    pub fn unlink(&mut self, at: At) -> Option<Stage> {
        if self.stages.is_empty() {
            return None;
        }
        match at {
            At::Begin => Some(self.stages_mut().remove(0)),
            At::End => self.stages_mut().pop(),
        }
    }

    /// Appends copies of `other`'s stages.
    pub fn cat(&mut self, other: &Pipeline) -> CmsResult<()> {
        if let Some(first) = other.stages.first() {
            self.check_fit(first, At::End)?;
        }
        self.stages_mut().extend(other.stages.iter().cloned());
        Ok(())
    }

    /// Returns the stages if the chain has exactly these kinds, in order.
    pub fn check_and_retrieve_stages(&self, kinds: &[StageKind]) -> Option<Vec<&Stage>> {
        if self.stages.len() != kinds.len() {
            return None;
        }
        self.stages
            .iter()
            .zip(kinds)
            .all(|(s, &k)| s.kind() == k)
            .then(|| self.stages.iter().collect())
    }

    /// Index of the first CLUT stage.
    pub fn clut_stage(&self) -> Option<usize> {
        self.stages
            .iter()
            .position(|s| matches!(s.kind(), StageKind::Clut16 | StageKind::ClutFloat))
    }

    /// Runs the stages in `f32`.
    fn run(&self, input: &[f32], output: &mut [f32]) {
        let mut a = [0f32; MAX_STAGE_CHANNELS];
        let mut b = [0f32; MAX_STAGE_CHANNELS];
        let n_in = self.input_channels();
        a[..n_in].copy_from_slice(&input[..n_in]);

        let (mut src, mut dst) = (&mut a, &mut b);
        for stage in &self.stages {
            stage.eval(&src[..stage.input_channels()], &mut dst[..stage.output_channels()]);
            std::mem::swap(&mut src, &mut dst);
        }

        let n_out = self.output_channels();
        output[..n_out].copy_from_slice(&src[..n_out]);
    }

    /// Evaluates one pixel in 16-bit.
    pub fn eval_16(&self, input: &[u16], output: &mut [u16]) {
        match &self.fast {
            Some(FastEval::Identity) => {
                let n = self.input_channels();
                output[..n].copy_from_slice(&input[..n]);
            }
            Some(FastEval::Clut16(p)) => p.eval(input, output),
            Some(FastEval::Custom(f)) => f(input, output),
            None => {
                let mut fi = [0f32; MAX_STAGE_CHANNELS];
                let mut fo = [0f32; MAX_STAGE_CHANNELS];
                let n_in = self.input_channels();
                for (f, &v) in fi.iter_mut().zip(&input[..n_in]) {
                    *f = from_16_to_float(v);
                }
                self.run(&fi, &mut fo);
                let n_out = self.output_channels();
                for (o, &v) in output[..n_out].iter_mut().zip(&fo) {
                    *o = from_float_to_16(v);
                }
            }
        }
    }

    /// Evaluates one pixel in floating point.
    pub fn eval_float(&self, input: &[f32], output: &mut [f32]) {
        self.run(input, output);
    }

    fn check_batch(&self, input: usize, output: usize) -> CmsResult<usize> {
        let (n_in, n_out) = (self.input_channels(), self.output_channels());
        if n_in == 0 || n_out == 0 {
            return Err(CmsError::NotSuitable("empty pipeline".into()));
        }
        let pixels = input / n_in;
        if input % n_in != 0 || output != pixels * n_out {
            return Err(CmsError::Range(format!(
                "buffers of {input} and {output} values do not hold whole {n_in} -> {n_out} pixels"
            )));
        }
        Ok(pixels)
    }

    /// Evaluates packed 16-bit pixels, in parallel with the `parallel`
    /// feature.
    pub fn eval_16_batch(&self, input: &[u16], output: &mut [u16]) -> CmsResult<()> {
        self.check_batch(input.len(), output.len())?;
        let (n_in, n_out) = (self.input_channels(), self.output_channels());

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            output
                .par_chunks_mut(n_out)
                .zip(input.par_chunks(n_in))
                .for_each(|(o, i)| self.eval_16(i, o));
        }
        #[cfg(not(feature = "parallel"))]
        for (o, i) in output.chunks_mut(n_out).zip(input.chunks(n_in)) {
            self.eval_16(i, o);
        }
        Ok(())
    }

    /// Evaluates packed float pixels, in parallel with the `parallel`
    /// feature.
    pub fn eval_float_batch(&self, input: &[f32], output: &mut [f32]) -> CmsResult<()> {
        self.check_batch(input.len(), output.len())?;
        let (n_in, n_out) = (self.input_channels(), self.output_channels());

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            output
                .par_chunks_mut(n_out)
                .zip(input.par_chunks(n_in))
                .for_each(|(o, i)| self.eval_float(i, o));
        }
        #[cfg(not(feature = "parallel"))]
        for (o, i) in output.chunks_mut(n_out).zip(input.chunks(n_in)) {
            self.eval_float(i, o);
        }
        Ok(())
    }
}
