//! CLUT sampling.
//!
//! Samplers are called once per grid node, in table order (axis 0 slowest),
//! with the node's quantized coordinates and the node's current outputs.
//! Returning `false` stops the walk; nodes written so far stay written.

use vcms_core::fixed::quantize_val;
use vcms_core::{CmsError, CmsResult, MAX_INPUT_DIMENSIONS, MAX_STAGE_CHANNELS};
use vcms_interp::{InterpParams, Sample, cube_size};

use crate::stage::{Stage, StageData};

/// Options for CLUT sampling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplerFlags {
    /// Visit every node without writing back.
    pub inspect: bool,
}

impl SamplerFlags {
    /// Read-only walk.
    pub const INSPECT: Self = Self { inspect: true };
}

/// Walks every node of a grid in table order.
///
/// Calls `visit(node_index, coords)` with 16-bit quantized coordinates and
/// stops early when it returns `false`. Returns whether the walk completed.
fn walk(samples: &[u32], mut visit: impl FnMut(usize, &[u16]) -> bool) -> CmsResult<bool> {
    let n_in = samples.len();
    if n_in == 0 || n_in > MAX_INPUT_DIMENSIONS {
        return Err(CmsError::ChannelLimit {
            what: "sampled grid input",
            requested: n_in,
            max: MAX_INPUT_DIMENSIONS,
        });
    }
    let nodes = cube_size(samples)
        .ok_or_else(|| CmsError::InvalidGrid(format!("unusable sample counts {samples:?}")))?;

    let mut coords = [0u16; MAX_INPUT_DIMENSIONS];
    for i in 0..nodes {
        let mut rem = i;
        for t in (0..n_in).rev() {
            let s = samples[t] as usize;
            coords[t] = quantize_val((rem % s) as f64, samples[t]);
            rem /= s;
        }
        if !visit(i, &coords[..n_in]) {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Rewrites the table of a grid node by node, returning the new table and
/// whether the walk completed.
fn resample<T: Sample>(
    params: &InterpParams<T>,
    flags: SamplerFlags,
    mut sampler: impl FnMut(&[T], &mut [T]) -> bool,
    to_input: impl Fn(u16) -> T,
) -> CmsResult<(Vec<T>, bool)> {
    let n_outputs = params.n_outputs();
    let mut out_table = params.table().to_vec();
    let mut input = [T::default(); MAX_INPUT_DIMENSIONS];
    let mut output = [T::default(); MAX_STAGE_CHANNELS];

    let done = walk(params.samples(), |i, coords| {
        for (v, &c) in input.iter_mut().zip(coords) {
            *v = to_input(c);
        }
        let node = i * n_outputs..(i + 1) * n_outputs;
        output[..n_outputs].copy_from_slice(&out_table[node.clone()]);

        if !sampler(&input[..coords.len()], &mut output[..n_outputs]) {
            return false;
        }
        if !flags.inspect {
            out_table[node].copy_from_slice(&output[..n_outputs]);
        }
        true
    })?;
    Ok((out_table, done))
}

impl Stage {
    /// Fills a 16-bit CLUT stage by calling `sampler` once per node.
    ///
    /// Returns `Ok(false)` when the sampler aborted; the nodes visited before
    /// the abort keep their new values. Fails on non-CLUT16 stages.
    pub fn sample_clut16(
        &mut self,
        flags: SamplerFlags,
        sampler: impl FnMut(&[u16], &mut [u16]) -> bool,
    ) -> CmsResult<bool> {
        let kind = self.kind();
        let StageData::Clut16(params) = self.data_mut() else {
            return Err(CmsError::NotSuitable(format!("{kind:?} stage is not a 16-bit CLUT")));
        };
        let (table, done) = resample(params, flags, sampler, |c| c)?;
        if !flags.inspect {
            *params = params.with_table(table)?;
        }
        Ok(done)
    }

    /// Fills a float CLUT stage; coordinates are the 16-bit node positions
    /// divided by 65535.
    pub fn sample_clut_float(
        &mut self,
        flags: SamplerFlags,
        sampler: impl FnMut(&[f32], &mut [f32]) -> bool,
    ) -> CmsResult<bool> {
        let kind = self.kind();
        let StageData::ClutFloat(params) = self.data_mut() else {
            return Err(CmsError::NotSuitable(format!("{kind:?} stage is not a float CLUT")));
        };
        let (table, done) = resample(params, flags, sampler, |c| (c as f64 / 65535.0) as f32)?;
        if !flags.inspect {
            *params = params.with_table(table)?;
        }
        Ok(done)
    }
}

/// Visits every node of a grid with no table behind it.
pub fn slice_space_16(samples: &[u32], mut sampler: impl FnMut(&[u16]) -> bool) -> CmsResult<bool> {
    walk(samples, |_, coords| sampler(coords))
}

/// Float form of [`slice_space_16`].
pub fn slice_space_float(
    samples: &[u32],
    mut sampler: impl FnMut(&[f32]) -> bool,
) -> CmsResult<bool> {
    let mut input = [0f32; MAX_INPUT_DIMENSIONS];
    walk(samples, |_, coords| {
        for (v, &c) in input.iter_mut().zip(coords) {
            *v = (c as f64 / 65535.0) as f32;
        }
        sampler(&input[..coords.len()])
    })
}
