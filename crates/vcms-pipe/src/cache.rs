//! Last-value cache for 16-bit evaluation.
//!
//! Images often repeat the previous pixel. [`Eval16Cache`] remembers the
//! last input and its output and skips the pipeline on a repeat.

use vcms_core::MAX_STAGE_CHANNELS;

use crate::pipeline::Pipeline;

/// Single-entry memo in front of [`Pipeline::eval_16`].
///
/// Each thread should own its cache; the pipeline itself is shared.
#[derive(Debug, Clone)]
pub struct Eval16Cache<'a> {
    pipeline: &'a Pipeline,
    input: [u16; MAX_STAGE_CHANNELS],
    output: [u16; MAX_STAGE_CHANNELS],
    hits: u64,
}

impl<'a> Eval16Cache<'a> {
    /// Creates a cache primed with the all-zero input.
    pub fn new(pipeline: &'a Pipeline) -> Self {
        let input = [0u16; MAX_STAGE_CHANNELS];
        let mut output = [0u16; MAX_STAGE_CHANNELS];
        if !pipeline.no_cache() && !pipeline.is_empty() {
            pipeline.eval_16(&input, &mut output);
        }
        Self {
            pipeline,
            input,
            output,
            hits: 0,
        }
    }

    /// The wrapped pipeline.
    pub fn pipeline(&self) -> &'a Pipeline {
        self.pipeline
    }

    /// Lookups answered from the cache.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Evaluates one pixel, reusing the previous result on a repeat.
    pub fn eval(&mut self, input: &[u16], output: &mut [u16]) {
        let p = self.pipeline;
        if p.no_cache() {
            p.eval_16(input, output);
            return;
        }

        let (n_in, n_out) = (p.input_channels(), p.output_channels());
        if input[..n_in] != self.input[..n_in] {
            self.input[..n_in].copy_from_slice(&input[..n_in]);
            p.eval_16(&self.input, &mut self.output);
        } else {
            self.hits += 1;
        }
        output[..n_out].copy_from_slice(&self.output[..n_out]);
    }
}
