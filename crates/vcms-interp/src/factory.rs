//! Kernel selection and plugin overrides.
//!
//! Grid construction asks the context's registered [`InterpFactory`]
//! plugins first, newest registration first. The first factory returning a
//! kernel wins; otherwise the built-in table below applies:
//!
//! | inputs | outputs | kernel                                  |
//! |--------|---------|-----------------------------------------|
//! | 1      | 1       | [`Algorithm::Linear1D`]                 |
//! | 1      | 2..=15  | [`Algorithm::Eval1Input`]               |
//! | 2      | any     | [`Algorithm::Bilinear`]                 |
//! | 3      | any     | tetrahedral, or trilinear on request    |
//! | 4..=15 | any     | [`Algorithm::EvalN`]                    |

use std::sync::Arc;

use tracing::debug;
use vcms_core::{Context, MAX_INPUT_DIMENSIONS, PluginKind};

use crate::params::{GridView, Sample};
use crate::Interpolation;

/// Interpolation kernel: reads `n_inputs` values, writes `n_outputs`.
pub type InterpFn<T> = fn(&[T], &mut [T], &GridView<'_, T>);

/// Kernel family resolved for a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// One input, one output.
    Linear1D,
    /// One input, several outputs.
    Eval1Input,
    /// Two inputs.
    Bilinear,
    /// Three inputs, eight-corner blend.
    Trilinear,
    /// Three inputs, four-corner blend.
    Tetrahedral,
    /// Four to fifteen inputs, recursive reduction.
    EvalN,
    /// Supplied by an [`InterpFactory`] plugin.
    Plugin,
}

impl Algorithm {
    /// Built-in kernel family for a grid shape.
    pub fn select(n_inputs: usize, n_outputs: usize, interpolation: Interpolation) -> Option<Self> {
        match n_inputs {
            1 if n_outputs == 1 => Some(Self::Linear1D),
            1 => Some(Self::Eval1Input),
            2 => Some(Self::Bilinear),
            3 => match interpolation {
                Interpolation::Trilinear => Some(Self::Trilinear),
                Interpolation::Tetrahedral => Some(Self::Tetrahedral),
            },
            4..=MAX_INPUT_DIMENSIONS => Some(Self::EvalN),
            _ => None,
        }
    }
}

/// Plugin supplying interpolation kernels.
///
/// Returning `None` defers to older factories and then to the built-ins.
pub trait InterpFactory: Send + Sync {
    /// 16-bit kernel for the shape, if handled.
    fn interp_16(
        &self,
        n_inputs: usize,
        n_outputs: usize,
        interpolation: Interpolation,
    ) -> Option<InterpFn<u16>> {
        let _ = (n_inputs, n_outputs, interpolation);
        None
    }

    /// Float kernel for the shape, if handled.
    fn interp_float(
        &self,
        n_inputs: usize,
        n_outputs: usize,
        interpolation: Interpolation,
    ) -> Option<InterpFn<f32>> {
        let _ = (n_inputs, n_outputs, interpolation);
        None
    }
}

/// Registers an interpolation factory on `ctx`.
pub fn register_interp_factory(ctx: &mut Context, factory: Arc<dyn InterpFactory>) {
    ctx.register_plugin(PluginKind::Interpolation, factory);
}

/// Resolves the kernel for a grid shape: plugins first, then built-ins.
pub fn resolve<T: Sample>(
    ctx: &Context,
    n_inputs: usize,
    n_outputs: usize,
    interpolation: Interpolation,
) -> Option<(Algorithm, InterpFn<T>)> {
    let from_plugin = ctx
        .plugins()
        .iter::<Arc<dyn InterpFactory>>(PluginKind::Interpolation)
        .find_map(|f| T::from_factory(f.as_ref(), n_inputs, n_outputs, interpolation));

    if let Some(func) = from_plugin {
        debug!(n_inputs, n_outputs, "Using plugin interpolation kernel");
        return Some((Algorithm::Plugin, func));
    }
    T::builtin(n_inputs, n_outputs, interpolation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InterpParams;

    fn constant_16(_: &[u16], out: &mut [u16], g: &GridView<'_, u16>) {
        out[..g.n_outputs].fill(0x4242);
    }

    struct Only3In;

    impl InterpFactory for Only3In {
        fn interp_16(&self, n_inputs: usize, _: usize, _: Interpolation) -> Option<InterpFn<u16>> {
            (n_inputs == 3).then_some(constant_16 as InterpFn<u16>)
        }
    }

    #[test]
    fn test_select() {
        assert_eq!(Algorithm::select(0, 1, Interpolation::default()), None);
        assert_eq!(Algorithm::select(16, 1, Interpolation::default()), None);
        assert_eq!(Algorithm::select(15, 3, Interpolation::default()), Some(Algorithm::EvalN));
        assert_eq!(
            Algorithm::select(3, 3, Interpolation::Trilinear),
            Some(Algorithm::Trilinear)
        );
    }

    #[test]
    fn test_plugin_override() {
        let mut ctx = Context::new();
        register_interp_factory(&mut ctx, Arc::new(Only3In));

        let p = InterpParams::new_uniform(&ctx, 2, 3, 3, vec![0u16; 24], Interpolation::default())
            .unwrap();
        assert_eq!(p.algorithm(), Algorithm::Plugin);
        let mut out = [0u16; 3];
        p.eval(&[1, 2, 3], &mut out);
        assert_eq!(out, [0x4242; 3]);

        // Declined shapes and the float flavor fall back to built-ins
        let p = InterpParams::new_uniform(&ctx, 2, 2, 3, vec![0u16; 12], Interpolation::default())
            .unwrap();
        assert_eq!(p.algorithm(), Algorithm::Bilinear);
        let p = InterpParams::new_uniform(&ctx, 2, 3, 3, vec![0f32; 24], Interpolation::default())
            .unwrap();
        assert_eq!(p.algorithm(), Algorithm::Tetrahedral);
    }

    #[test]
    fn test_plugin_not_inherited_backwards() {
        let parent = Context::new();
        let mut child = parent.duplicate(None);
        register_interp_factory(&mut child, Arc::new(Only3In));

        let table = vec![0u16; 24];
        let p = InterpParams::new_uniform(&parent, 2, 3, 3, table, Interpolation::default())
            .unwrap();
        assert_eq!(p.algorithm(), Algorithm::Tetrahedral);
    }
}
