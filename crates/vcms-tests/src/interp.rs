//! Grid interpolation through curves and CLUT stages.

use std::sync::{Arc, Mutex};

use vcms_core::{CmsError, Context, ErrorCode};
use vcms_interp::{Algorithm, InterpParams, Interpolation};
use vcms_pipe::{At, Pipeline, SamplerFlags, Stage, ToneCurve};

use crate::grids::{identity_clut16, ramp};

fn worst_1d(curve: &ToneCurve, descending: bool) -> i32 {
    (0..=0xffffu32)
        .map(|v| {
            let out = curve.eval_16(v as u16) as i32;
            let got = if descending { 0xffff - out } else { out };
            (got - v as i32).abs()
        })
        .max()
        .unwrap_or(0)
}

#[test]
fn test_1d_tables_are_exact() {
    let ctx = Context::new();
    for n in [2, 4, 6, 18] {
        let curve = ToneCurve::from_table_16(&ctx, &ramp(n)).unwrap();
        assert_eq!(worst_1d(&curve, false), 0, "n = {n}");
    }
    let odd = ToneCurve::from_table_16(&ctx, &ramp(3)).unwrap();
    assert!(worst_1d(&odd, false) <= 1);
}

#[test]
fn test_1d_descending_tables() {
    let ctx = Context::new();
    for n in [2, 4, 6, 18] {
        let mut t = ramp(n);
        t.reverse();
        let curve = ToneCurve::from_table_16(&ctx, &t).unwrap();
        assert!(curve.is_descending());
        assert_eq!(worst_1d(&curve, true), 0, "n = {n}");
    }
}

#[test]
fn test_identity_clut_through_pipeline() {
    let ctx = Context::new();
    let mut p = Pipeline::new(&ctx);
    p.insert(identity_clut16(&ctx, 2), At::End).unwrap();

    let mut out = [0u16; 3];
    let probes = [
        [0u16, 0, 0],
        [0xffff, 0xffff, 0xffff],
        [0x1234, 0xfedc, 0x8000],
        [0xffff, 0, 0x4000],
        [0x0001, 0x0002, 0x0003],
    ];
    for v in probes {
        p.eval_16(&v, &mut out);
        assert_eq!(out, v);
    }

    // The diagonal is where every tetrahedron meets
    for v in (0..=0xffffu32).step_by(97) {
        let v = v as u16;
        p.eval_16(&[v, v, v], &mut out);
        assert_eq!(out, [v, v, v]);
        p.eval_16(&[v, v, v.saturating_add(1)], &mut out);
        assert_eq!(out, [v, v, v.saturating_add(1)]);
    }
}

#[test]
fn test_identity_clut_on_finer_grid() {
    let ctx = Context::new();
    let s = identity_clut16(&ctx, 17);
    let mut out = [0u16; 3];
    for r in (0..=0xffffu32).step_by(4099) {
        for g in (0..=0xffffu32).step_by(5101) {
            let v = [r as u16, g as u16, (r ^ g) as u16];
            s.eval_16(&v, &mut out);
            for c in 0..3 {
                assert!((out[c] as i32 - v[c] as i32).abs() <= 1, "{v:?} -> {out:?}");
            }
        }
    }
}

#[test]
fn test_eight_input_granular_clut() {
    let ctx = Context::new();
    let samples = [4, 3, 3, 2, 2, 2, 2, 2];
    let mut s = Stage::clut16_granular(&ctx, &samples, 3, None).unwrap();

    let f = |i: &[u16], o: &mut [u16]| {
        o[0] = (i.iter().map(|&v| v as u32).sum::<u32>() / 8) as u16;
        o[1] = i[0];
        o[2] = (i[4..].iter().map(|&v| v as u32).sum::<u32>() / 4) as u16;
    };
    s.sample_clut16(SamplerFlags::default(), |i, o| {
        f(i, o);
        true
    })
    .unwrap();

    let probes = [
        [0u16; 8],
        [0xffff; 8],
        [0x8000; 8],
        [0, 0x1111, 0x2222, 0x3333, 0x4444, 0x5555, 0x6666, 0x7777],
        [0xffff, 0, 0xffff, 0, 0xffff, 0, 0xffff, 0],
        [0x1234, 0x5678, 0x9abc, 0xdef0, 0x1357, 0x2468, 0xaaaa, 0x5555],
    ];
    let (mut got, mut want) = ([0u16; 3], [0u16; 3]);
    for v in probes {
        s.eval_16(&v, &mut got);
        f(&v, &mut want);
        for c in 0..3 {
            assert!((got[c] as i32 - want[c] as i32).abs() <= 2, "{v:x?}: {got:?} vs {want:?}");
        }
    }
}

#[test]
fn test_float_and_16_bit_grids_agree() {
    let ctx = Context::new();
    let n = 5u32;
    let q = |i: u32| i as f32 / (n - 1) as f32;
    let mut table = Vec::new();
    for r in 0..n {
        for g in 0..n {
            for b in 0..n {
                // Smooth, non-separable response
                let (x, y, z) = (q(r), q(g), q(b));
                table.extend_from_slice(&[x * y, (x + z) / 2.0, y * y]);
            }
        }
    }
    let words: Vec<u16> = table.iter().map(|&v| (v * 65535.0 + 0.5) as u16).collect();

    let ff = InterpParams::new(&ctx, &[n, n, n], 3, table, Interpolation::Tetrahedral).unwrap();
    let fw = InterpParams::new(&ctx, &[n, n, n], 3, words, Interpolation::Tetrahedral).unwrap();
    assert_eq!(ff.algorithm(), Algorithm::Tetrahedral);

    let (mut a, mut b) = ([0f32; 3], [0u16; 3]);
    for v in [[0.1f32, 0.2, 0.3], [0.9, 0.05, 0.5], [0.33, 0.33, 0.34], [1.0, 1.0, 0.0]] {
        ff.eval(&v, &mut a);
        let w = v.map(|x| (x * 65535.0 + 0.5) as u16);
        fw.eval(&w, &mut b);
        for c in 0..3 {
            assert!((a[c] - b[c] as f32 / 65535.0).abs() < 1e-4, "{v:?}");
        }
    }
}

#[test]
fn test_trilinear_stage_option() {
    let ctx = Context::new();
    let corner = vec![0u16, 0, 0, 0, 0, 0, 0, 0xffff];
    let tri = InterpParams::new_uniform(&ctx, 2, 3, 1, corner.clone(), Interpolation::Trilinear)
        .unwrap();
    let tet = InterpParams::new_uniform(&ctx, 2, 3, 1, corner, Interpolation::Tetrahedral)
        .unwrap();
    assert_eq!(tri.algorithm(), Algorithm::Trilinear);

    // x * y * z: trilinear is exact at the center, tetrahedral is not
    let (mut a, mut b) = ([0u16], [0u16]);
    tri.eval(&[0x8000, 0x8000, 0x8000], &mut a);
    tet.eval(&[0x8000, 0x8000, 0x8000], &mut b);
    assert!((a[0] as i32 - 0x2000).abs() <= 1);
    assert!((b[0] as i32 - 0x8000).abs() <= 1);
}

#[test]
fn test_oversized_grids_are_rejected() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let mut ctx = Context::new();
    ctx.set_error_handler(Some(Arc::new(move |code: ErrorCode, _: &str| {
        if let Ok(mut v) = sink.lock() {
            v.push(code);
        }
    })));

    assert!(matches!(Stage::clut16(&ctx, 200, 8, 3, None), Err(CmsError::InvalidGrid(_))));
    assert!(matches!(Stage::clut_float(&ctx, 200, 8, 3, None), Err(CmsError::InvalidGrid(_))));
    assert!(matches!(
        Stage::clut16_granular(&ctx, &[0x10000, 0x10000, 2], 3, None),
        Err(CmsError::InvalidGrid(_))
    ));
    assert!(matches!(
        InterpParams::<u16>::new(&ctx, &[0x10000; 2], 1, Vec::new(), Interpolation::default()),
        Err(CmsError::InvalidGrid(_))
    ));

    // A large but sane grid still builds
    assert!(Stage::clut16(&ctx, 33, 3, 3, None).is_ok());

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 4);
    assert!(seen.iter().all(|&c| c == ErrorCode::CorruptionDetected));
}
