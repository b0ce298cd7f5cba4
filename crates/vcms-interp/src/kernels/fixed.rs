//! 16-bit kernels.
//!
//! Inputs are scaled by the axis domain and converted to 16.16 fixed point;
//! the integer half selects the lower node, the fraction weights the blend
//! toward the upper one. An input of `0xFFFF` lands on the last node with a
//! zero step, so no read ever goes past the table.

use vcms_core::MAX_STAGE_CHANNELS;
use vcms_core::fixed::{
    fixed_rest_to_int, fixed_to_int, linear_interp, round_fixed_to_int, to_fixed_domain,
};

use super::tetra_order;
use crate::factory::{Algorithm, InterpFn};
use crate::params::GridView;

/// Built-in 16-bit kernel for an algorithm.
pub fn kernel(algorithm: Algorithm) -> Option<InterpFn<u16>> {
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

/// Splits one input into (lower node offset, step to upper node, weight).
#[inline(always)]
fn split(v: u16, domain: u32, stride: usize) -> (usize, usize, i64) {
    let fx = to_fixed_domain(v as i64 * domain as i64);
    let k = fixed_to_int(fx) as usize;
    let step = if v == 0xffff { 0 } else { stride };
    (k * stride, step, fixed_rest_to_int(fx))
}

/// One input, one output.
pub fn lerp_1d(input: &[u16], output: &mut [u16], g: &GridView<'_, u16>) {
    let lut = g.table;
    let domain = g.domain[0];

    if input[0] == 0xffff {
        output[0] = lut[domain as usize];
        return;
    }

    let (k, _, rest) = split(input[0], domain, 1);
    output[0] = linear_interp(rest, lut[k], lut[k + 1]);
}

/// One input, any number of outputs.
pub fn eval_1_input(input: &[u16], output: &mut [u16], g: &GridView<'_, u16>) {
    let lut = g.table;
    let (k0, step, rest) = split(input[0], g.domain[0], g.stride[0]);
    let k1 = k0 + step;

    for (o, out) in output[..g.n_outputs].iter_mut().enumerate() {
        *out = linear_interp(rest, lut[k0 + o], lut[k1 + o]);
    }
}

/// Two inputs.
pub fn bilinear(input: &[u16], output: &mut [u16], g: &GridView<'_, u16>) {
    let lut = g.table;
    let (x0, sx, rx) = split(input[0], g.domain[0], g.stride[0]);
    let (y0, sy, ry) = split(input[1], g.domain[1], g.stride[1]);
    let (x1, y1) = (x0 + sx, y0 + sy);

    for (o, out) in output[..g.n_outputs].iter_mut().enumerate() {
        let d00 = lut[x0 + y0 + o];
        let d01 = lut[x0 + y1 + o];
        let d10 = lut[x1 + y0 + o];
        let d11 = lut[x1 + y1 + o];

        let dx0 = linear_interp(rx, d00, d10);
        let dx1 = linear_interp(rx, d01, d11);
        *out = linear_interp(ry, dx0, dx1);
    }
}

/// Three inputs, blending all eight cell corners.
pub fn trilinear(input: &[u16], output: &mut [u16], g: &GridView<'_, u16>) {
    let lut = g.table;
    let (x0, sx, rx) = split(input[0], g.domain[0], g.stride[0]);
    let (y0, sy, ry) = split(input[1], g.domain[1], g.stride[1]);
    let (z0, sz, rz) = split(input[2], g.domain[2], g.stride[2]);
    let (x1, y1, z1) = (x0 + sx, y0 + sy, z0 + sz);

    for (o, out) in output[..g.n_outputs].iter_mut().enumerate() {
        let d = |x: usize, y: usize, z: usize| lut[x + y + z + o];

        let dx00 = linear_interp(rx, d(x0, y0, z0), d(x1, y0, z0));
        let dx01 = linear_interp(rx, d(x0, y0, z1), d(x1, y0, z1));
        let dx10 = linear_interp(rx, d(x0, y1, z0), d(x1, y1, z0));
        let dx11 = linear_interp(rx, d(x0, y1, z1), d(x1, y1, z1));

        let dxy0 = linear_interp(ry, dx00, dx10);
        let dxy1 = linear_interp(ry, dx01, dx11);
        *out = linear_interp(rz, dxy0, dxy1);
    }
}

/// Three inputs, blending the four corners of one tetrahedron.
pub fn tetrahedral(input: &[u16], output: &mut [u16], g: &GridView<'_, u16>) {
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
    let (r1, r2, r3) = (rests[a], rests[b], rests[c]);

    for (o, out) in output[..g.n_outputs].iter_mut().enumerate() {
        let c0 = lut[o0 + o] as i64;
        let c1 = lut[o1 + o] as i64;
        let c2 = lut[o2 + o] as i64;
        let c3 = lut[o3 + o] as i64;

        let rest = (c1 - c0) * r1 + (c2 - c1) * r2 + (c3 - c2) * r3;
        *out = (c0 + round_fixed_to_int(rest)).clamp(0, 0xffff) as u16;
    }
}

/// Four to fifteen inputs.
///
/// Splits axis 0 into its bracketing nodes, evaluates the remaining axes at
/// both (recursively, down to the 3-D tetrahedral base case) and blends.
pub fn eval_n_inputs(input: &[u16], output: &mut [u16], g: &GridView<'_, u16>) {
    match g.n_inputs() {
        1 => return eval_1_input(input, output, g),
        2 => return bilinear(input, output, g),
        3 => return tetrahedral(input, output, g),
        _ => {}
    }

    let (k0, step, rest) = split(input[0], g.domain[0], g.stride[0]);

    let mut lo = [0u16; MAX_STAGE_CHANNELS];
    let mut hi = [0u16; MAX_STAGE_CHANNELS];
    eval_n_inputs(&input[1..], &mut lo, &g.sub(k0));
    eval_n_inputs(&input[1..], &mut hi, &g.sub(k0 + step));

    for (o, out) in output[..g.n_outputs].iter_mut().enumerate() {
        *out = linear_interp(rest, lo[o], hi[o]);
    }
}
