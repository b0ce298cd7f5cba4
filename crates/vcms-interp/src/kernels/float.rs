//! Floating-point kernels.
//!
//! Inputs are clamped to `[0, 1]` (NaN reads as 0) before scaling, so any
//! value evaluates; `1.0` and above land on the last node.

use vcms_core::MAX_STAGE_CHANNELS;
use vcms_core::fixed::fclamp;

use super::tetra_order;
use crate::factory::{Algorithm, InterpFn};
use crate::params::GridView;

/// Built-in float kernel for an algorithm.
pub fn kernel(algorithm: Algorithm) -> Option<InterpFn<f32>> {
    Some(match algorithm {
        Algorithm::Linear1D => lerp_1d,
        Algorithm::Eval1Input => eval_1_input,
        Algorithm::Bilinear => bilinear,
        Algorithm::Trilinear => trilinear,
        Algorithm::Tetrahedral => tetrahedral,
        Algorithm::EvalN => eval_n_inputs,
        Algorithm::Plugin => return None,
    })
}

#[inline(always)]
fn lerp(a: f32, l: f32, h: f32) -> f32 {
    l + (h - l) * a
}

/// Splits one input into (lower node offset, step to upper node, weight).
#[inline(always)]
fn split(v: f32, domain: u32, stride: usize) -> (usize, usize, f32) {
    let v = fclamp(v);
    let px = v * domain as f32;
    let k = (px.floor() as u32).min(domain);
    let step = if v >= 1.0 || k == domain { 0 } else { stride };
    (k as usize * stride, step, px - k as f32)
}

/// One input, one output.
pub fn lerp_1d(input: &[f32], output: &mut [f32], g: &GridView<'_, f32>) {
    let lut = g.table;
    let (k, step, rest) = split(input[0], g.domain[0], 1);
    output[0] = lerp(rest, lut[k], lut[k + step]);
}

/// One input, any number of outputs.
pub fn eval_1_input(input: &[f32], output: &mut [f32], g: &GridView<'_, f32>) {
    let lut = g.table;
    let (k0, step, rest) = split(input[0], g.domain[0], g.stride[0]);
    let k1 = k0 + step;

    for (o, out) in output[..g.n_outputs].iter_mut().enumerate() {
        *out = lerp(rest, lut[k0 + o], lut[k1 + o]);
    }
}

/// Two inputs.
pub fn bilinear(input: &[f32], output: &mut [f32], g: &GridView<'_, f32>) {
    let lut = g.table;
    let (x0, sx, rx) = split(input[0], g.domain[0], g.stride[0]);
    let (y0, sy, ry) = split(input[1], g.domain[1], g.stride[1]);
    let (x1, y1) = (x0 + sx, y0 + sy);

    for (o, out) in output[..g.n_outputs].iter_mut().enumerate() {
        let dx0 = lerp(rx, lut[x0 + y0 + o], lut[x1 + y0 + o]);
        let dx1 = lerp(rx, lut[x0 + y1 + o], lut[x1 + y1 + o]);
        *out = lerp(ry, dx0, dx1);
    }
}

/// Three inputs, blending all eight cell corners.
pub fn trilinear(input: &[f32], output: &mut [f32], g: &GridView<'_, f32>) {
    let lut = g.table;
    let (x0, sx, rx) = split(input[0], g.domain[0], g.stride[0]);
    let (y0, sy, ry) = split(input[1], g.domain[1], g.stride[1]);
    let (z0, sz, rz) = split(input[2], g.domain[2], g.stride[2]);
    let (x1, y1, z1) = (x0 + sx, y0 + sy, z0 + sz);

    for (o, out) in output[..g.n_outputs].iter_mut().enumerate() {
        let d = |x: usize, y: usize, z: usize| lut[x + y + z + o];

        let c00 = lerp(rx, d(x0, y0, z0), d(x1, y0, z0));
        let c01 = lerp(rx, d(x0, y0, z1), d(x1, y0, z1));
        let c10 = lerp(rx, d(x0, y1, z0), d(x1, y1, z0));
        let c11 = lerp(rx, d(x0, y1, z1), d(x1, y1, z1));

        let c0 = lerp(ry, c00, c10);
        let c1 = lerp(ry, c01, c11);
        *out = lerp(rz, c0, c1);
    }
}

/// Three inputs, blending the four corners of one tetrahedron.
pub fn tetrahedral(input: &[f32], output: &mut [f32], g: &GridView<'_, f32>) {
    let lut = g.table;
    let (x0, sx, rx) = split(input[0], g.domain[0], g.stride[0]);
    let (y0, sy, ry) = split(input[1], g.domain[1], g.stride[1]);
    let (z0, sz, rz) = split(input[2], g.domain[2], g.stride[2]);

    let steps = [sx, sy, sz];
    let rests = [rx, ry, rz];
    let [a, b, c] = tetra_order(rx, ry, rz);

    let o0 = x0 + y0 + z0;
    let o1 = o0 + steps[a];
    let o2 = o1 + steps[b];
    let o3 = o2 + steps[c];

    for (o, out) in output[..g.n_outputs].iter_mut().enumerate() {
        let c0 = lut[o0 + o];
        let c1 = lut[o1 + o];
        let c2 = lut[o2 + o];
        let c3 = lut[o3 + o];
        *out = c0 + (c1 - c0) * rests[a] + (c2 - c1) * rests[b] + (c3 - c2) * rests[c];
    }
}

/// Four to fifteen inputs, reduced one axis at a time.
pub fn eval_n_inputs(input: &[f32], output: &mut [f32], g: &GridView<'_, f32>) {
    match g.n_inputs() {
        1 => return eval_1_input(input, output, g),
        2 => return bilinear(input, output, g),
        3 => return tetrahedral(input, output, g),
        _ => {}
    }

    let (k0, step, rest) = split(input[0], g.domain[0], g.stride[0]);

    let mut lo = [0f32; MAX_STAGE_CHANNELS];
    let mut hi = [0f32; MAX_STAGE_CHANNELS];
    eval_n_inputs(&input[1..], &mut lo, &g.sub(k0));
    eval_n_inputs(&input[1..], &mut hi, &g.sub(k0 + step));

    for (o, out) in output[..g.n_outputs].iter_mut().enumerate() {
        *out = lerp(rest, lo[o], hi[o]);
    }
}
