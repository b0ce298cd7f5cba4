//! Pipeline optimization.
//!
//! [`optimize_pipeline`] rewrites a pipeline into a cheaper equivalent:
//!
//! 1. Pipelines holding named color stages are left alone.
//! 2. Lossless pre-optimization: identity stages and curve sets made only
//!    of exact identities are dropped, runs of adjacent matrices are folded
//!    into one, identity matrices are dropped.
//! 3. An emptied chain becomes a single identity stage with an identity
//!    fast path.
//! 4. Otherwise the context's [`OptimizationPass`] plugins run, newest first;
//!    the first one reporting success ends the search.
//! 5. A chain reduced to a single 16-bit CLUT gets a direct 16-bit path.
//!
//! Installed fast paths set `no_cache`: they are already cheaper than a
//! cache lookup.

use std::sync::Arc;

use tracing::debug;
use vcms_core::{Context, PluginKind};

use crate::pipeline::{FastEval, Pipeline};
use crate::stage::{MatrixData, Stage, StageData, StageKind};

/// Plugin rewriting a pipeline.
pub trait OptimizationPass: Send + Sync {
    /// Name, for logs.
    fn name(&self) -> &str {
        "optimization"
    }

    /// Rewrites `pipeline` in place. Returns `true` when it did; later passes
    /// are then skipped. A pass that declines must leave the pipeline as it
    /// was.
    fn optimize(&self, pipeline: &mut Pipeline) -> bool;
}

/// Registers an optimization pass on `ctx`.
pub fn register_optimization(ctx: &mut Context, pass: Arc<dyn OptimizationPass>) {
    ctx.register_plugin(PluginKind::Optimization, pass);
}

/// Removes stages that do nothing and folds adjacent matrices.
///
/// Returns whether anything changed.
fn pre_optimize(pipeline: &mut Pipeline) -> bool {
    let before = pipeline.stage_count();
    let stages = pipeline.stages_mut();

    stages.retain(|s| match s.data() {
        StageData::Identity => false,
        StageData::ToneCurves(curves) => !curves.iter().all(|c| c.is_identity()),
        _ => true,
    });

    let mut folded = Vec::with_capacity(stages.len());
    let mut pending = None;
    let mut merged = false;
    for stage in stages.drain(..) {
        if let StageData::Matrix(m) = stage.data() {
            pending = Some(match pending.take() {
                Some(prev) => {
                    merged = true;
                    MatrixData::then(&prev, m)
                }
                None => m.clone(),
            });
            continue;
        }
        if let Some(m) = pending.take() {
            folded.push(Stage::from_matrix(m));
        }
        folded.push(stage);
    }
    if let Some(m) = pending {
        folded.push(Stage::from_matrix(m));
    }

    folded.retain(|s| !matches!(s.data(), StageData::Matrix(m) if m.is_identity()));
    *stages = folded;

    merged || stages.len() != before
}

/// Optimizes `pipeline` in place, returning whether it changed.
///
/// Float evaluation keeps going through the stages; only the 16-bit path
/// may be replaced.
pub fn optimize_pipeline(pipeline: &mut Pipeline) -> bool {
    if pipeline.is_empty() || pipeline.is_optimized() {
        return false;
    }
    if pipeline.stages().iter().any(|s| s.kind() == StageKind::NamedColor) {
        debug!("Named color pipeline left unoptimized");
        return false;
    }

    let n_in = pipeline.input_channels();
    let ctx = pipeline.context().clone();
    let mut changed = pre_optimize(pipeline);

    if pipeline.is_empty() {
        // Identity channel counts are always within limits here.
        if let Ok(identity) = Stage::identity(&ctx, n_in) {
            pipeline.stages_mut().push(identity);
        }
        pipeline.set_fast(FastEval::Identity);
        pipeline.set_no_cache(true);
        debug!(n_in, "Pipeline reduced to identity");
        return true;
    }

    for pass in ctx.plugins().iter::<Arc<dyn OptimizationPass>>(PluginKind::Optimization) {
        if pass.optimize(pipeline) {
            debug!(pass = pass.name(), "Optimization plugin applied");
            return true;
        }
    }

    let single_clut = match pipeline.stages() {
        [stage] => match stage.data() {
            StageData::Clut16(params) => Some(params.clone()),
            _ => None,
        },
        _ => None,
    };
    if let Some(params) = single_clut {
        pipeline.set_fast(FastEval::Clut16(params));
        pipeline.set_no_cache(true);
        changed = true;
    }

    debug!(changed, stages = pipeline.stage_count(), "Optimized pipeline");
    changed
}

impl Pipeline {
    /// Shorthand for [`optimize_pipeline`].
    pub fn optimize(&mut self) -> bool {
        optimize_pipeline(self)
    }
}
