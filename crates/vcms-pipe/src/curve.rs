//! Tone curves.
//!
//! A [`ToneCurve`] always carries a 16-bit table evaluated through a 1-D
//! grid. Curves built from a parametric definition or a float table keep
//! that source too and use it on the float path, so float evaluation does
//! not lose precision to the 16-bit table.
//!
//! # Parametric Types
//!
//! Parameters are `[g, a, b, c, d, e, f]`, as many as the type needs:
//!
//! | type | formula                                           | params |
//! |------|---------------------------------------------------|--------|
//! | 1    | `Y = X^g`                                         | 1      |
//! | 2    | `Y = (aX + b)^g` for `X >= -b/a`, else `0`        | 3      |
//! | 3    | `Y = (aX + b)^g + c` for `X >= -b/a`, else `c`    | 4      |
//! | 4    | `Y = (aX + b)^g` for `X >= d`, else `cX`          | 5      |
//! | 5    | `Y = (aX + b)^g + e` for `X >= d`, else `cX + f`  | 7      |
//!
//! Negative types are the analytic inverses.

use tracing::debug;
use vcms_core::fixed::{from_16_to_float, quantize_val, quick_saturate_word};
use vcms_core::{CmsError, CmsResult, Context};
use vcms_interp::{InterpParams, Interpolation};

/// Entries of the 16-bit table sampled from a parametric curve.
const PARAMETRIC_TABLE_SIZE: usize = 4096;

/// Largest 16-bit table accepted.
const MAX_TABLE_ENTRIES: usize = 65530;

/// Below this a parameter counts as zero.
const DET_TOLERANCE: f64 = 0.0001;

/// Ripple tolerated by [`ToneCurve::is_monotonic`].
const MONOTONIC_RIPPLE: i32 = 2;

/// Distance from the ideal ramp tolerated by [`ToneCurve::is_linear`].
const LINEAR_TOLERANCE: i32 = 0x0f;

/// One of the ICC parametric curve types or its inverse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParametricCurve {
    kind: i32,
    params: [f64; 7],
}

impl ParametricCurve {
    /// Number of parameters used by a curve type.
    pub fn param_count(kind: i32) -> Option<usize> {
        match kind.abs() {
            1 => Some(1),
            2 => Some(3),
            3 => Some(4),
            4 => Some(5),
            5 => Some(7),
            _ => None,
        }
    }

    /// Builds a parametric curve, checking the type and parameter count.
    pub fn new(kind: i32, params: &[f64]) -> CmsResult<Self> {
        let n = Self::param_count(kind)
            .ok_or_else(|| CmsError::NotSuitable(format!("unknown parametric curve type {kind}")))?;
        if params.len() < n {
            return Err(CmsError::Range(format!(
                "parametric curve type {kind} needs {n} parameters, got {}",
                params.len()
            )));
        }
        let mut p = [0.0; 7];
        p[..n].copy_from_slice(&params[..n]);
        Ok(Self { kind, params: p })
    }

    /// Curve type; negative for inverses.
    pub fn kind(&self) -> i32 {
        self.kind
    }

    /// The used parameters.
    pub fn params(&self) -> &[f64] {
        let n = Self::param_count(self.kind).unwrap_or(0);
        &self.params[..n]
    }

    /// The analytic inverse.
    pub fn inverse(&self) -> Self {
        Self {
            kind: -self.kind,
            params: self.params,
        }
    }

    /// Evaluates the curve in double precision. The result is not clamped.
    pub fn eval(&self, r: f64) -> f64 {
        let p = &self.params;
        let tiny = |v: f64| v.abs() < DET_TOLERANCE;

        match self.kind {
            1 => {
                if r < 0.0 {
                    if tiny(p[0] - 1.0) { r } else { 0.0 }
                } else {
                    r.powf(p[0])
                }
            }
            -1 => {
                if r < 0.0 {
                    if tiny(p[0] - 1.0) { r } else { 0.0 }
                } else if tiny(p[0]) {
                    f64::INFINITY
                } else {
                    r.powf(1.0 / p[0])
                }
            }
            2 => {
                if tiny(p[1]) || r < -p[2] / p[1] {
                    return 0.0;
                }
                let e = p[1] * r + p[2];
                if e > 0.0 { e.powf(p[0]) } else { 0.0 }
            }
            -2 => {
                if tiny(p[0]) || tiny(p[1]) || r < 0.0 {
                    return 0.0;
                }
                ((r.powf(1.0 / p[0]) - p[2]) / p[1]).max(0.0)
            }
            3 => {
                if tiny(p[1]) {
                    return 0.0;
                }
                let disc = (-p[2] / p[1]).max(0.0);
                if r >= disc {
                    let e = p[1] * r + p[2];
                    if e > 0.0 { e.powf(p[0]) + p[3] } else { 0.0 }
                } else {
                    p[3]
                }
            }
            -3 => {
                if tiny(p[1]) {
                    return 0.0;
                }
                if r >= p[3] {
                    let e = r - p[3];
                    if e > 0.0 { (e.powf(1.0 / p[0]) - p[2]) / p[1] } else { 0.0 }
                } else {
                    -p[2] / p[1]
                }
            }
            4 => {
                if r >= p[4] {
                    let e = p[1] * r + p[2];
                    if e > 0.0 { e.powf(p[0]) } else { 0.0 }
                } else {
                    r * p[3]
                }
            }
            -4 => {
                let e = p[1] * p[4] + p[2];
                let disc = if e < 0.0 { 0.0 } else { e.powf(p[0]) };
                if r >= disc {
                    if tiny(p[0]) || tiny(p[1]) {
                        0.0
                    } else {
                        (r.powf(1.0 / p[0]) - p[2]) / p[1]
                    }
                } else if tiny(p[3]) {
                    0.0
                } else {
                    r / p[3]
                }
            }
            5 => {
                if r >= p[4] {
                    let e = p[1] * r + p[2];
                    if e > 0.0 { e.powf(p[0]) + p[5] } else { p[5] }
                } else {
                    r * p[3] + p[6]
                }
            }
            -5 => {
                let disc = p[3] * p[4] + p[6];
                if r >= disc {
                    let e = r - p[5];
                    if e < 0.0 || tiny(p[0]) || tiny(p[1]) {
                        0.0
                    } else {
                        (e.powf(1.0 / p[0]) - p[2]) / p[1]
                    }
                } else if tiny(p[3]) {
                    0.0
                } else {
                    (r - p[6]) / p[3]
                }
            }
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone)]
enum Source {
    Table16,
    TableFloat(InterpParams<f32>),
    Parametric(ParametricCurve),
}

/// A 1-D transfer curve.
///
/// # Example
///
/// ```rust
/// use vcms_core::Context;
/// use vcms_pipe::ToneCurve;
///
/// let ctx = Context::new();
/// let gamma = ToneCurve::gamma(&ctx, 2.2).unwrap();
/// let inverse = gamma.reverse(&ctx, 4096).unwrap();
///
/// let y = gamma.eval_float(0.5);
/// assert!((inverse.eval_float(y) - 0.5).abs() < 1e-4);
/// ```
#[derive(Debug, Clone)]
pub struct ToneCurve {
    table: InterpParams<u16>,
    source: Source,
}

impl ToneCurve {
    /// Identity curve.
    pub fn linear(ctx: &Context) -> CmsResult<Self> {
        Self::from_table_16(ctx, &[0, 0xffff])
    }

    /// Curve from 16-bit samples spread evenly over `[0, 1]`.
    pub fn from_table_16(ctx: &Context, values: &[u16]) -> CmsResult<Self> {
        Ok(Self {
            table: build_table(ctx, values.to_vec())?,
            source: Source::Table16,
        })
    }

    /// Curve from float samples spread evenly over `[0, 1]`.
    pub fn from_table_float(ctx: &Context, values: &[f32]) -> CmsResult<Self> {
        let words: Vec<u16> =
            values.iter().map(|&v| quick_saturate_word(v as f64 * 65535.0)).collect();
        let table = build_table(ctx, words)?;
        let float = InterpParams::new(
            ctx,
            &[values.len() as u32],
            1,
            values.to_vec(),
            Interpolation::default(),
        )?;
        Ok(Self {
            table,
            source: Source::TableFloat(float),
        })
    }

    /// Curve from an ICC parametric definition.
    pub fn parametric(ctx: &Context, kind: i32, params: &[f64]) -> CmsResult<Self> {
        let curve = ParametricCurve::new(kind, params).inspect_err(|e| ctx.signal_error(e))?;
        Self::from_parametric(ctx, curve)
    }

    /// Pure power-law curve, `Y = X^g`.
    pub fn gamma(ctx: &Context, g: f64) -> CmsResult<Self> {
        Self::parametric(ctx, 1, &[g])
    }

    fn from_parametric(ctx: &Context, curve: ParametricCurve) -> CmsResult<Self> {
        let n = PARAMETRIC_TABLE_SIZE;
        let words: Vec<u16> = (0..n)
            .map(|i| {
                let x = i as f64 / (n - 1) as f64;
                quick_saturate_word(curve.eval(x) * 65535.0)
            })
            .collect();
        debug!(kind = curve.kind, "Built parametric tone curve");
        Ok(Self {
            table: build_table(ctx, words)?,
            source: Source::Parametric(curve),
        })
    }

    /// Evaluates the 16-bit table.
    #[inline]
    pub fn eval_16(&self, v: u16) -> u16 {
        let mut out = [0u16];
        self.table.eval(&[v], &mut out);
        out[0]
    }

    /// Evaluates in floating point.
    ///
    /// Parametric curves are computed exactly (unclamped); float tables
    /// interpolate; plain 16-bit curves go through the table.
    pub fn eval_float(&self, v: f32) -> f32 {
        match &self.source {
            Source::Parametric(p) => p.eval(v as f64) as f32,
            Source::TableFloat(t) => {
                let mut out = [0f32];
                t.eval(&[v], &mut out);
                out[0]
            }
            Source::Table16 => {
                from_16_to_float(self.eval_16(quick_saturate_word(v as f64 * 65535.0)))
            }
        }
    }

    /// The 16-bit table.
    pub fn table_16(&self) -> &[u16] {
        self.table.table()
    }

    /// Number of 16-bit table entries.
    pub fn len(&self) -> usize {
        self.table.table().len()
    }

    /// Always false; a curve has at least two entries.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Parametric definition, if the curve was built from one.
    pub fn parametric_source(&self) -> Option<&ParametricCurve> {
        match &self.source {
            Source::Parametric(p) => Some(p),
            _ => None,
        }
    }

    /// True when every table entry is within a small tolerance of the ramp.
    pub fn is_linear(&self) -> bool {
        let t = self.table_16();
        let n = t.len() as u32;
        t.iter()
            .enumerate()
            .all(|(i, &v)| (v as i32 - quantize_val(i as f64, n) as i32).abs() <= LINEAR_TOLERANCE)
    }

    /// True when the curve maps every input to itself on the float path and
    /// its 16-bit table is the exact ramp.
    pub fn is_identity(&self) -> bool {
        let t = self.table_16();
        let n = t.len() as u32;
        let ramp = t.iter().enumerate().all(|(i, &v)| v == quantize_val(i as f64, n));
        ramp && match &self.source {
            Source::Table16 => true,
            Source::Parametric(p) => p.kind == 1 && p.params[0] == 1.0,
            Source::TableFloat(f) => f.table() == [0.0, 1.0],
        }
    }

    /// True when the last entry is below the first.
    pub fn is_descending(&self) -> bool {
        let t = self.table_16();
        t[0] > t[t.len() - 1]
    }

    /// True when the table never turns back, up to a tiny ripple.
    pub fn is_monotonic(&self) -> bool {
        let t = self.table_16();
        if self.is_descending() {
            t.windows(2).all(|w| w[1] as i32 - w[0] as i32 <= MONOTONIC_RIPPLE)
        } else {
            t.windows(2).all(|w| w[0] as i32 - w[1] as i32 <= MONOTONIC_RIPPLE)
        }
    }

    /// Inverse curve.
    ///
    /// Parametric curves invert analytically. Tables are inverted by
    /// sampling `n_entries` points and interpolating inside whichever table
    /// interval brackets each one.
    pub fn reverse(&self, ctx: &Context, n_entries: usize) -> CmsResult<Self> {
        if let Source::Parametric(p) = &self.source {
            return Self::from_parametric(ctx, p.inverse());
        }
        if n_entries < 2 {
            let e = CmsError::Range(format!(
                "reversed curve needs at least 2 entries, got {n_entries}"
            ));
            ctx.signal_error(&e);
            return Err(e);
        }

        let t = self.table_16();
        let last = (t.len() - 1) as f64;
        let ascending = !self.is_descending();
        let (mut a, mut b) = (0.0f64, 0.0f64);

        let out: Vec<u16> = (0..n_entries)
            .map(|i| {
                let y = i as f64 * 65535.0 / (n_entries - 1) as f64;
                if let Some(j) = bracket(t, y) {
                    let (x1, x2) = (t[j] as f64, t[j + 1] as f64);
                    let y1 = j as f64 * 65535.0 / last;
                    let y2 = (j + 1) as f64 * 65535.0 / last;
                    if x1 == x2 {
                        return quick_saturate_word(if ascending { y2 } else { y1 });
                    }
                    a = (y2 - y1) / (x2 - x1);
                    b = y2 - a * x2;
                }
                quick_saturate_word(a * y + b)
            })
            .collect();

        Self::from_table_16(ctx, &out)
    }
}

fn build_table(ctx: &Context, values: Vec<u16>) -> CmsResult<InterpParams<u16>> {
    if values.len() > MAX_TABLE_ENTRIES {
        let e = CmsError::Range(format!("tone curve with {} entries", values.len()));
        ctx.signal_error(&e);
        return Err(e);
    }
    let n = values.len() as u32;
    InterpParams::new(ctx, &[n], 1, values, Interpolation::default())
}

/// Index `j` of the table interval `[t[j], t[j+1]]` holding `v`.
///
/// Searched from the high end for ascending tables and from the low end for
/// descending ones, so flat runs resolve toward the curve's far end.
fn bracket(t: &[u16], v: f64) -> Option<usize> {
    let holds = |i: usize| {
        let (y0, y1) = (t[i] as f64, t[i + 1] as f64);
        let (lo, hi) = if y0 <= y1 { (y0, y1) } else { (y1, y0) };
        v >= lo && v <= hi
    };
    let n = t.len() - 1;
    if t[0] < t[n] {
        (0..n).rev().find(|&i| holds(i))
    } else {
        (0..n).find(|&i| holds(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const SRGB: [f64; 5] = [2.4, 1.0 / 1.055, 0.055 / 1.055, 1.0 / 12.92, 0.04045];

    #[test]
    fn test_linear() {
        let ctx = Context::new();
        let c = ToneCurve::linear(&ctx).unwrap();
        assert!(c.is_linear());
        assert!(c.is_monotonic());
        assert!(!c.is_descending());
        for v in [0u16, 1, 0x7fff, 0xfffe, 0xffff] {
            assert_eq!(c.eval_16(v), v);
        }
        assert!(ToneCurve::gamma(&ctx, 1.0).unwrap().is_linear());
        assert!(!ToneCurve::gamma(&ctx, 2.2).unwrap().is_linear());
    }

    #[test]
    fn test_identity_is_exact() {
        let ctx = Context::new();
        assert!(ToneCurve::linear(&ctx).unwrap().is_identity());
        assert!(ToneCurve::gamma(&ctx, 1.0).unwrap().is_identity());
        assert!(ToneCurve::from_table_float(&ctx, &[0.0, 1.0]).unwrap().is_identity());

        // Within the linear tolerance but not the identity
        let near = ToneCurve::gamma(&ctx, 1.0004).unwrap();
        assert!(near.is_linear());
        assert!(!near.is_identity());
        assert!(!ToneCurve::from_table_16(&ctx, &[0, 0x8001, 0xffff]).unwrap().is_identity());
    }

    #[test]
    fn test_parametric_param_count() {
        let ctx = Context::new();
        assert!(ToneCurve::parametric(&ctx, 4, &SRGB[..4]).is_err());
        assert!(ToneCurve::parametric(&ctx, 6, &[1.0]).is_err());
        let c = ToneCurve::parametric(&ctx, 4, &SRGB).unwrap();
        assert_eq!(c.parametric_source().map(|p| p.params().len()), Some(5));
    }

    #[test]
    fn test_srgb_curve() {
        let ctx = Context::new();
        let c = ToneCurve::parametric(&ctx, 4, &SRGB).unwrap();
        assert_abs_diff_eq!(c.eval_float(0.0), 0.0, epsilon = 1e-7);
        assert_abs_diff_eq!(c.eval_float(1.0), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(c.eval_float(0.02), 0.02 / 12.92, epsilon = 1e-7);
        assert_abs_diff_eq!(c.eval_float(0.5), 0.214_041, epsilon = 1e-5);
    }

    #[test]
    fn test_parametric_inverse_roundtrip() {
        let curves = [
            (1, vec![2.2]),
            (2, vec![2.2, 1.1, -0.1]),
            (3, vec![2.2, 1.1, -0.1, 0.05]),
            (4, SRGB.to_vec()),
            (5, vec![2.2, 0.9, 0.1, 0.5, 0.1, 0.02, 0.01]),
        ];
        for (kind, p) in curves {
            let c = ParametricCurve::new(kind, &p).unwrap();
            let inv = c.inverse();
            for x in [0.2, 0.45, 0.7, 0.95] {
                assert_abs_diff_eq!(inv.eval(c.eval(x)), x, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_reverse_table() {
        let ctx = Context::new();
        let table: Vec<u16> = (0..256u32)
            .map(|i| ((i as f64 / 255.0).powf(2.0) * 65535.0).round() as u16)
            .collect();
        let c = ToneCurve::from_table_16(&ctx, &table).unwrap();
        let r = c.reverse(&ctx, 4096).unwrap();
        assert!(r.is_monotonic());
        for v in [0x1000u16, 0x4000, 0x8000, 0xc000] {
            let back = r.eval_16(c.eval_16(v));
            assert!((back as i32 - v as i32).abs() < 0x100, "{v:#x} -> {back:#x}");
        }
    }

    #[test]
    fn test_reverse_descending() {
        let ctx = Context::new();
        let c = ToneCurve::from_table_16(&ctx, &[0xffff, 0x8000, 0]).unwrap();
        assert!(c.is_descending());
        assert!(c.is_monotonic());
        let r = c.reverse(&ctx, 256).unwrap();
        assert!(r.is_descending());
        assert!((r.eval_16(0x8000) as i32 - 0x8000).abs() <= 1);
    }

    #[test]
    fn test_non_monotonic() {
        let ctx = Context::new();
        let c = ToneCurve::from_table_16(&ctx, &[0, 0x8000, 0x4000, 0xffff]).unwrap();
        assert!(!c.is_monotonic());
    }

    #[test]
    fn test_float_table() {
        let ctx = Context::new();
        let c = ToneCurve::from_table_float(&ctx, &[0.0, 0.25, 1.0]).unwrap();
        assert_abs_diff_eq!(c.eval_float(0.25), 0.125, epsilon = 1e-6);
        assert_eq!(c.eval_16(0xffff), 0xffff);
    }

    #[test]
    fn test_table_limits() {
        let ctx = Context::new();
        assert!(ToneCurve::from_table_16(&ctx, &[0]).is_err());
        assert!(ToneCurve::from_table_16(&ctx, &vec![0; MAX_TABLE_ENTRIES + 1]).is_err());
    }
}
