//! Context isolation as seen from pipelines.

use std::sync::{Arc, Mutex};
use std::thread;

use vcms_core::{Context, ErrorCode, MAX_ALARM_CODES, UserData};
use vcms_pipe::{At, Pipeline, Stage};

#[derive(Debug, PartialEq)]
struct AppState(&'static str);

#[test]
fn test_duplicate_inherits_then_isolates() {
    let mut parent = Context::with_user_data(Arc::new(AppState("parent")));
    let mut codes = [0u16; MAX_ALARM_CODES];
    codes[0] = 0x1111;
    parent.set_alarm_codes(codes);
    parent.set_adaptation_state(0.5);

    let mut child = parent.duplicate(None);
    let sibling = parent.duplicate(None);
    assert_eq!(child.user_data::<AppState>(), Some(&AppState("parent")));
    assert_eq!(child.alarm_codes(), codes);
    assert_eq!(child.adaptation_state(), 0.5);

    let mut changed = codes;
    changed[0] = 0x2222;
    changed[15] = 0xffff;
    child.set_alarm_codes(changed);

    assert_eq!(child.alarm_codes(), changed);
    assert_eq!(parent.alarm_codes(), codes);
    assert_eq!(sibling.alarm_codes(), codes);

    let replaced = parent.duplicate(Some(Arc::new(AppState("other")) as UserData));
    assert_eq!(replaced.user_data::<AppState>(), Some(&AppState("other")));
    assert_eq!(parent.user_data::<AppState>(), Some(&AppState("parent")));
}

#[test]
fn test_pipeline_keeps_its_context() {
    let ctx = Context::with_user_data(Arc::new(AppState("bound")));
    let mut p = Pipeline::new(&ctx);
    p.insert(Stage::identity(&ctx, 3).unwrap(), At::End).unwrap();

    let copy = p.clone();
    assert_eq!(copy.context().user_data::<AppState>(), Some(&AppState("bound")));
}

#[test]
fn test_errors_reach_the_handler() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    let mut ctx = Context::new();
    ctx.set_error_handler(Some(Arc::new(move |code: ErrorCode, msg: &str| {
        if let Ok(mut v) = sink.lock() {
            v.push((code, msg.to_owned()));
        }
    })));

    let mut p = Pipeline::new(&ctx);
    p.insert(Stage::identity(&ctx, 3).unwrap(), At::End).unwrap();
    assert!(p.insert(Stage::identity(&ctx, 4).unwrap(), At::End).is_err());
    assert!(Stage::clut16(&ctx, 1, 3, 3, None).is_err());

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].0, ErrorCode::ColorspaceCheck);
    assert!(seen[0].1.contains("3 channels produced"));
}

#[test]
fn test_contexts_across_threads() {
    let base = Context::new();
    let handles: Vec<_> = (0..4u16)
        .map(|i| {
            let mut ctx = base.duplicate(None);
            thread::spawn(move || {
                let mut codes = ctx.alarm_codes();
                codes[1] = i;
                ctx.set_alarm_codes(codes);

                let mut p = Pipeline::new(&ctx);
                p.insert(Stage::identity_curves(&ctx, 3).unwrap(), At::End).unwrap();
                let mut out = [0u16; 3];
                p.eval_16(&[i, i, i], &mut out);
                (ctx.alarm_codes()[1], out)
            })
        })
        .collect();

    for (i, h) in handles.into_iter().enumerate() {
        let (code, out) = h.join().unwrap();
        assert_eq!(code, i as u16);
        assert_eq!(out, [i as u16; 3]);
    }
    assert_eq!(base.alarm_codes()[1], 0x7F00);
}
