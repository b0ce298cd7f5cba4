//! Reverse evaluation.
//!
//! Finds an input whose forward evaluation lands on a target output. The
//! search runs in two phases:
//!
//! 1. **Seed**: evaluate the pipeline on a lattice matching the CLUT
//!    stage's grid (capped in size) and keep the node closest to the target.
//!    Nodes within a small tolerance of the best are treated as equally good
//!    and the one nearest the caller's hint wins, which keeps successive
//!    solutions continuous. The hint itself competes as a candidate.
//! 2. **Refine**: Gauss-Newton steps with a numeric Jacobian, inputs clamped
//!    to `[0, 1]`, until the residual stops improving.
//!
//! The best point found is always returned, never an error.

use vcms_core::MAX_STAGE_CHANNELS;
use vcms_math::{MAX_DIM, Mat3, least_squares};

use crate::pipeline::Pipeline;
use crate::stage::StageData;

const MAX_ITERATIONS: usize = 30;

/// Finite difference step of the Jacobian.
const JACOBIAN_STEP: f64 = 0.001;

/// Seed lattice resolution per axis.
const SEED_AXIS_MAX: u32 = 17;

/// Seed lattice size.
const SEED_MAX_NODES: usize = 4913;

/// Output distance under which seed candidates count as tied.
const TIE_TOLERANCE: f64 = 1.0e-4;

type Vector = [f64; MAX_DIM];

struct Problem<'a> {
    pipeline: &'a Pipeline,
    target: Vector,
    fixed: [f32; MAX_STAGE_CHANNELS],
    n_in: usize,
    free: usize,
    m: usize,
}

impl Problem<'_> {
    /// Residual vector `F(x) - target` and its length.
    fn residual(&self, x: &Vector, f: &mut Vector) -> f64 {
        let mut input = self.fixed;
        for (v, &xi) in input[..self.free].iter_mut().zip(x) {
            *v = xi as f32;
        }
        let mut out = [0f32; MAX_STAGE_CHANNELS];
        self.pipeline.eval_float(&input[..self.n_in], &mut out);

        let mut sum = 0.0;
        for k in 0..self.m {
            f[k] = out[k] as f64 - self.target[k];
            sum += f[k] * f[k];
        }
        sum.sqrt()
    }

    fn seed_resolution(&self) -> Vec<u32> {
        let clut = self.pipeline.clut_stage().map(|i| self.pipeline.stages()[i].data());
        let samples = match clut {
            Some(StageData::Clut16(p)) if p.n_inputs() == self.n_in => Some(p.samples()),
            Some(StageData::ClutFloat(p)) if p.n_inputs() == self.n_in => Some(p.samples()),
            _ => None,
        };

        let mut res: Vec<u32> = (0..self.free)
            .map(|i| samples.map_or(SEED_AXIS_MAX, |s| s[i]).clamp(2, SEED_AXIS_MAX))
            .collect();

        while res.iter().map(|&r| r as usize).product::<usize>() > SEED_MAX_NODES {
            if let Some(r) = res.iter_mut().filter(|r| **r > 2).max() {
                *r -= 1;
            } else {
                break;
            }
        }
        res
    }

    /// Best lattice node, ties broken toward `hint`.
    fn seed(&self, hint: Option<&[f32]>) -> Vector {
        let res = self.seed_resolution();
        let nodes: usize = res.iter().map(|&r| r as usize).product();

        let mut points = Vec::with_capacity(nodes + 1);
        let mut f = [0.0; MAX_DIM];
        for i in 0..nodes {
            let mut x = [0.0; MAX_DIM];
            let mut rem = i;
            for (c, &r) in res.iter().enumerate().rev() {
                x[c] = (rem % r as usize) as f64 / (r - 1) as f64;
                rem /= r as usize;
            }
            let err = self.residual(&x, &mut f);
            points.push((x, err));
        }

        let hint = hint.filter(|h| h.len() >= self.free).map(|h| {
            let mut x = [0.0; MAX_DIM];
            for (xi, &hi) in x.iter_mut().zip(&h[..self.free]) {
                *xi = (hi as f64).clamp(0.0, 1.0);
            }
            x
        });
        if let Some(h) = hint {
            let err = self.residual(&h, &mut f);
            points.push((h, err));
        }

        let best = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
        let tolerance = if best == 0.0 { 0.0 } else { TIE_TOLERANCE };
        let tied = points.iter().filter(|p| p.1 <= best + tolerance);

        let chosen = match hint {
            Some(h) => tied.min_by(|a, b| {
                distance(&a.0, &h, self.free).total_cmp(&distance(&b.0, &h, self.free))
            }),
            None => tied.min_by(|a, b| a.1.total_cmp(&b.1)),
        };
        chosen.map_or([0.0; MAX_DIM], |p| p.0)
    }

    /// Solves `J dx = f` for the Gauss-Newton step.
    fn step(&self, j: &[[f64; MAX_DIM]; MAX_DIM], f: &Vector) -> Option<Vector> {
        if self.m == 3 && self.free == 3 {
            let jm = Mat3::from_rows([
                [j[0][0], j[0][1], j[0][2]],
                [j[1][0], j[1][1], j[1][2]],
                [j[2][0], j[2][1], j[2][2]],
            ]);
            if let Some(dx) = jm.solve([f[0], f[1], f[2]]) {
                let mut out = [0.0; MAX_DIM];
                out[..3].copy_from_slice(&dx);
                return Some(out);
            }
        }
        least_squares(j, f, self.m, self.free)
    }

    fn refine(&self, mut x: Vector) -> (Vector, f64) {
        let mut f = [0.0; MAX_DIM];
        let mut err = self.residual(&x, &mut f);

        for _ in 0..MAX_ITERATIONS {
            if err == 0.0 {
                break;
            }

            let mut j = [[0.0; MAX_DIM]; MAX_DIM];
            let mut fd = [0.0; MAX_DIM];
            for c in 0..self.free {
                let h = if x[c] + JACOBIAN_STEP > 1.0 { -JACOBIAN_STEP } else { JACOBIAN_STEP };
                let mut xd = x;
                xd[c] += h;
                self.residual(&xd, &mut fd);
                for k in 0..self.m {
                    j[k][c] = (fd[k] - f[k]) / h;
                }
            }

            let Some(dx) = self.step(&j, &f) else {
                break;
            };

            let mut next = x;
            for c in 0..self.free {
                next[c] = (x[c] - dx[c]).clamp(0.0, 1.0);
            }
            let mut fn_ = [0.0; MAX_DIM];
            let next_err = self.residual(&next, &mut fn_);
            if next_err >= err {
                break;
            }
            x = next;
            f = fn_;
            err = next_err;
        }
        (x, err)
    }
}

fn distance(a: &Vector, b: &Vector, n: usize) -> f64 {
    a[..n].iter().zip(&b[..n]).map(|(x, y)| (x - y) * (x - y)).sum::<f64>()
}

impl Pipeline {
    /// Searches an input whose forward evaluation approximates `target`.
    ///
    /// `result` receives the pipeline's input channels; the return value is
    /// the remaining distance to the target in output space. When `target`
    /// holds more values than the pipeline has outputs, the extra ones pin
    /// the trailing inputs (e.g. black for a 4 -> 3 CMYK pipeline) and only
    /// the leading inputs are searched. `hint`, usually the previous
    /// solution, breaks ties between equally close candidates.
    ///
    /// # Example
    ///
    /// ```rust
    /// use vcms_core::Context;
    /// use vcms_pipe::{At, Pipeline, Stage};
    ///
    /// let ctx = Context::new();
    /// let mut p = Pipeline::new(&ctx);
    /// p.insert(Stage::clut_float(&ctx, 2, 1, 1, Some(vec![0.0, 1.0])).unwrap(), At::End).unwrap();
    ///
    /// let mut x = [0.0f32];
    /// let residual = p.eval_reverse_float(&[0.3], &mut x, None);
    /// assert!(residual < 1e-5);
    /// assert!((x[0] - 0.3).abs() < 1e-5);
    /// ```
    pub fn eval_reverse_float(
        &self,
        target: &[f32],
        result: &mut [f32],
        hint: Option<&[f32]>,
    ) -> f32 {
        let (n_in, n_out) = (self.input_channels(), self.output_channels());
        if n_in == 0 || n_out == 0 {
            return f32::INFINITY;
        }

        let pinned = target.len().saturating_sub(n_out).min(n_in - 1);
        let free = n_in - pinned;
        let m = target.len().min(n_out);

        let mut t = [0.0; MAX_DIM];
        for (ti, &v) in t.iter_mut().zip(&target[..m]) {
            *ti = v as f64;
        }
        let mut fixed = [0f32; MAX_STAGE_CHANNELS];
        fixed[free..n_in].copy_from_slice(&target[n_out..n_out + pinned]);

        let problem = Problem {
            pipeline: self,
            target: t,
            fixed,
            n_in,
            free,
            m,
        };

        let (x, err) = problem.refine(problem.seed(hint));

        for (r, &xi) in result[..free].iter_mut().zip(&x) {
            *r = xi as f32;
        }
        result[free..n_in].copy_from_slice(&fixed[free..n_in]);
        err as f32
    }
}
