//! Integration tests for the vcms crates.
//!
//! End-to-end checks that cross crate boundaries: grids built through
//! stages, pipelines bound to contexts with plugins, reverse evaluation
//! and the optimizer against unoptimized references.

#[cfg(test)]
mod context;
#[cfg(test)]
mod interp;
#[cfg(test)]
mod pipeline;

/// Shared grid builders.
#[cfg(test)]
mod grids {
    use vcms_core::Context;
    use vcms_pipe::{SamplerFlags, Stage};

    /// `round(65535 * i / (n - 1))` for `i` in `0..n`.
    pub fn ramp(n: u32) -> Vec<u16> {
        (0..n)
            .map(|i| ((65535.0 * i as f64) / (n - 1) as f64 + 0.5).floor() as u16)
            .collect()
    }

    /// 3 -> 3 CLUT mapping every node to its own coordinates.
    pub fn identity_clut16(ctx: &Context, n: u32) -> Stage {
        let mut s = Stage::clut16(ctx, n, 3, 3, None).unwrap();
        s.sample_clut16(SamplerFlags::default(), |i, o| {
            o.copy_from_slice(i);
            true
        })
        .unwrap();
        s
    }

    /// Float flavor of [`identity_clut16`].
    pub fn identity_clut_float(ctx: &Context, n: u32) -> Stage {
        let mut s = Stage::clut_float(ctx, n, 3, 3, None).unwrap();
        s.sample_clut_float(SamplerFlags::default(), |i, o| {
            o.copy_from_slice(i);
            true
        })
        .unwrap();
        s
    }
}
