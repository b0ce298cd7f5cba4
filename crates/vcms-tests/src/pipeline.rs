//! Pipelines end to end: evaluation, reverse evaluation, optimization,
//! caching and plugins.

use std::sync::Arc;

use approx::assert_abs_diff_eq;
use vcms_core::Context;
use vcms_interp::{GridView, InterpFactory, InterpFn, Interpolation, register_interp_factory};
use vcms_math::Mat3;
use vcms_pipe::{
    At, CustomStage, Eval16Cache, Pipeline, Stage, StageKind, StageTypeFactory, ToneCurve,
    register_stage_type,
};

use crate::grids::{identity_clut16, identity_clut_float};

fn probes_16() -> Vec<[u16; 3]> {
    (0..=0xffffu32)
        .step_by(1021)
        .map(|v| [v as u16, (v * 7 % 65536) as u16, (0xffff - v) as u16])
        .collect()
}

#[test]
fn test_identity_matrix_pipeline() {
    let ctx = Context::new();
    let mut p = Pipeline::new(&ctx);
    p.insert(Stage::matrix3(&ctx, &Mat3::IDENTITY, None).unwrap(), At::End).unwrap();

    assert_eq!(p.stage_count(), 1);
    assert_eq!(p.input_channels(), 3);
    assert_eq!(p.output_channels(), 3);

    let mut out = [0u16; 3];
    for v in probes_16() {
        p.eval_16(&v, &mut out);
        assert_eq!(out, v);
    }

    let mut f = [0f32; 3];
    for v in [[0.0f32, 0.5, 1.0], [0.123_456, 0.999_999, 1e-7], [0.25, 0.75, 0.333_333]] {
        p.eval_float(&v, &mut f);
        for c in 0..3 {
            assert_abs_diff_eq!(f[c], v[c], epsilon = 1e-9);
        }
    }
}

#[test]
fn test_reverse_identity_clut() {
    let ctx = Context::new();
    let mut p = Pipeline::new(&ctx);
    p.insert(identity_clut_float(&ctx, 2), At::End).unwrap();

    let mut x = [0f32; 3];
    assert_eq!(p.eval_reverse_float(&[0.0, 0.0, 0.0], &mut x, None), 0.0);
    assert_eq!(x, [0.0, 0.0, 0.0]);

    let mut hint = x;
    for i in 0..=64 {
        let t = i as f32 / 64.0;
        p.eval_reverse_float(&[t, 0.0, 0.0], &mut x, Some(&hint));
        assert_abs_diff_eq!(x[0], t, epsilon = 1e-5);
        assert_abs_diff_eq!(x[1], 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(x[2], 0.0, epsilon = 1e-5);
        hint = x;
    }
}

#[test]
fn test_reverse_quantized_clut() {
    let ctx = Context::new();
    let mut p = Pipeline::new(&ctx);
    p.insert(identity_clut16(&ctx, 2), At::End).unwrap();

    let mut x = [0f32; 3];
    for t in [[0.1f32, 0.2, 0.3], [0.9, 0.5, 0.05], [1.0, 0.0, 0.5]] {
        let err = p.eval_reverse_float(&t, &mut x, None);
        assert!(err < 1e-4);
        for c in 0..3 {
            assert_abs_diff_eq!(x[c], t[c], epsilon = 5e-5);
        }
    }
}

#[test]
fn test_reverse_through_curves_and_matrix() {
    let ctx = Context::new();
    let g = ToneCurve::gamma(&ctx, 2.2).unwrap();
    let m = Mat3::from_rows([[0.6, 0.3, 0.1], [0.2, 0.7, 0.1], [0.0, 0.1, 0.9]]);

    let mut p = Pipeline::new(&ctx);
    p.insert(Stage::tone_curves(&ctx, vec![g.clone(), g.clone(), g]).unwrap(), At::End).unwrap();
    p.insert(Stage::matrix3(&ctx, &m, None).unwrap(), At::End).unwrap();

    let source = [0.3f32, 0.6, 0.9];
    let mut target = [0f32; 3];
    p.eval_float(&source, &mut target);

    let mut x = [0f32; 3];
    let err = p.eval_reverse_float(&target, &mut x, None);
    assert!(err < 1e-5);
    for c in 0..3 {
        assert_abs_diff_eq!(x[c], source[c], epsilon = 1e-4);
    }
}

#[test]
fn test_optimizer_preserves_results() {
    let ctx = Context::new();
    let g = ToneCurve::gamma(&ctx, 1.8).unwrap();
    let a = Mat3::from_rows([[0.41, 0.36, 0.18], [0.21, 0.72, 0.07], [0.02, 0.12, 0.95]]);
    let b = Mat3::from_rows([[1.2, -0.1, -0.1], [-0.05, 1.1, -0.05], [0.0, -0.02, 1.02]]);

    let mut p = Pipeline::new(&ctx);
    p.insert(Stage::identity_curves(&ctx, 3).unwrap(), At::End).unwrap();
    p.insert(Stage::tone_curves(&ctx, vec![g.clone(), g.clone(), g]).unwrap(), At::End).unwrap();
    p.insert(Stage::matrix3(&ctx, &a, None).unwrap(), At::End).unwrap();
    p.insert(Stage::identity(&ctx, 3).unwrap(), At::End).unwrap();
    p.insert(Stage::matrix3(&ctx, &b, Some([0.01, 0.0, -0.01])).unwrap(), At::End).unwrap();
    let reference = p.clone();

    assert!(p.optimize());
    let kinds: Vec<_> = p.stages().iter().map(Stage::kind).collect();
    assert_eq!(kinds, [StageKind::ToneCurves, StageKind::Matrix]);

    let (mut x, mut y) = ([0u16; 3], [0u16; 3]);
    for v in probes_16() {
        reference.eval_16(&v, &mut x);
        p.eval_16(&v, &mut y);
        for c in 0..3 {
            assert!((x[c] as i32 - y[c] as i32).abs() <= 1, "{v:?}");
        }
    }
}

#[test]
fn test_cache_matches_optimized_and_plain() {
    let ctx = Context::new();
    let g = ToneCurve::gamma(&ctx, 2.4).unwrap();
    let mut p = Pipeline::new(&ctx);
    p.insert(Stage::tone_curves(&ctx, vec![g.clone(), g.clone(), g]).unwrap(), At::End).unwrap();

    let mut cache = Eval16Cache::new(&p);
    let (mut a, mut b) = ([0u16; 3], [0u16; 3]);
    for v in probes_16() {
        for _ in 0..2 {
            cache.eval(&v, &mut a);
            p.eval_16(&v, &mut b);
            assert_eq!(a, b);
        }
    }
    assert!(cache.hits() >= probes_16().len() as u64);

    let mut id = Pipeline::new(&ctx);
    id.insert(Stage::identity_curves(&ctx, 3).unwrap(), At::End).unwrap();
    id.optimize();
    assert!(id.no_cache());
    let mut cache = Eval16Cache::new(&id);
    cache.eval(&[1, 2, 3], &mut a);
    cache.eval(&[1, 2, 3], &mut a);
    assert_eq!(a, [1, 2, 3]);
    assert_eq!(cache.hits(), 0);
}

#[test]
fn test_batch_matches_single() {
    let ctx = Context::new();
    let mut p = Pipeline::new(&ctx);
    p.insert(identity_clut16(&ctx, 9), At::End).unwrap();
    p.insert(Stage::matrix(&ctx, 1, 3, &[0.2126, 0.7152, 0.0722], None).unwrap(), At::End).unwrap();

    let input: Vec<u16> = probes_16().into_iter().flatten().collect();
    let mut batch = vec![0u16; input.len() / 3];
    p.eval_16_batch(&input, &mut batch).unwrap();

    let mut one = [0u16];
    for (px, &b) in input.chunks(3).zip(&batch) {
        p.eval_16(px, &mut one);
        assert_eq!(one[0], b);
    }
}

fn constant_kernel(_: &[u16], output: &mut [u16], g: &GridView<'_, u16>) {
    output[..g.n_outputs].fill(0x4242);
}

struct ConstantGrids;

impl InterpFactory for ConstantGrids {
    fn interp_16(&self, n_inputs: usize, _: usize, _: Interpolation) -> Option<InterpFn<u16>> {
        (n_inputs == 3).then_some(constant_kernel as InterpFn<u16>)
    }
}

#[test]
fn test_interp_plugin_reaches_stages() {
    let mut ctx = Context::new();
    let before = ctx.duplicate(None);
    register_interp_factory(&mut ctx, Arc::new(ConstantGrids));

    let mut out = [0u16; 3];
    identity_clut16(&ctx, 2).eval_16(&[0x1000, 0x2000, 0x3000], &mut out);
    assert_eq!(out, [0x4242; 3]);

    // A context duplicated before registration keeps the built-ins
    identity_clut16(&before, 2).eval_16(&[0x1000, 0x2000, 0x3000], &mut out);
    assert_eq!(out, [0x1000, 0x2000, 0x3000]);

    // One-input grids are not claimed by the plugin
    let curve = ToneCurve::linear(&ctx).unwrap();
    assert_eq!(curve.eval_16(0x1234), 0x1234);
}

#[derive(Debug, Clone)]
struct Invert;

impl CustomStage for Invert {
    fn eval(&self, input: &[f32], output: &mut [f32]) {
        for (o, &i) in output.iter_mut().zip(input) {
            *o = 1.0 - i;
        }
    }

    fn clone_box(&self) -> Box<dyn CustomStage> {
        Box::new(self.clone())
    }

    fn name(&self) -> &str {
        "invert"
    }
}

struct InvertType;

impl StageTypeFactory for InvertType {
    fn name(&self) -> &str {
        "invert"
    }

    fn create(&self, n_inputs: usize, n_outputs: usize) -> Option<Box<dyn CustomStage>> {
        (n_inputs == n_outputs).then(|| Box::new(Invert) as Box<dyn CustomStage>)
    }
}

#[test]
fn test_custom_stage_type() {
    let mut ctx = Context::new();
    assert!(Stage::from_plugin(&ctx, "invert", 3, 3).is_err());
    register_stage_type(&mut ctx, Arc::new(InvertType));
    assert!(Stage::from_plugin(&ctx, "invert", 3, 1).is_err());

    let mut p = Pipeline::new(&ctx);
    p.insert(Stage::from_plugin(&ctx, "invert", 3, 3).unwrap(), At::End).unwrap();
    p.insert(Stage::identity(&ctx, 3).unwrap(), At::End).unwrap();
    let copy = p.clone();

    let mut out = [0f32; 3];
    copy.eval_float(&[0.25, 0.5, 1.0], &mut out);
    assert_eq!(out, [0.75, 0.5, 0.0]);
    assert_eq!(copy.stages()[0].kind(), StageKind::Custom);
}
