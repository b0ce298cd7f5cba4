//! 16.16 fixed-point arithmetic and 16-bit/float conversions.
//!
//! The 16-bit interpolation kernels work on grid coordinates expressed in
//! 16.16 fixed point: the high half is the node index, the low half the
//! fractional weight toward the next node at 1/65536 resolution.
//!
//! # Example
//!
//! ```rust
//! use vcms_core::fixed::{fixed_rest_to_int, fixed_to_int, to_fixed_domain};
//!
//! // Half way along a two-node axis
//! let fx = to_fixed_domain(0x8000);
//! assert_eq!(fixed_to_int(fx), 0);
//! assert_eq!(fixed_rest_to_int(fx), 0x8001);
//! ```

/// Maximum number of grid input dimensions.
pub const MAX_INPUT_DIMENSIONS: usize = 15;

/// Maximum number of channels a stage may consume or produce.
pub const MAX_STAGE_CHANNELS: usize = 15;

/// Number of alarm codes held by a context.
pub const MAX_ALARM_CODES: usize = 16;

/// A 16.16 fixed-point number. Held in 64 bits so that a 16-bit value
/// times a large grid domain never overflows.
pub type Fixed = i64;

/// Rescales `a`, a product of a 16-bit value and a grid domain, into 16.16
/// fixed point. Equivalent to `a * 65536 / 65535` rounded.
#[inline(always)]
pub const fn to_fixed_domain(a: i64) -> Fixed {
    a + ((a + 0x7fff) / 0xffff)
}

/// Integer part of a 16.16 number.
#[inline(always)]
pub const fn fixed_to_int(x: Fixed) -> i64 {
    x >> 16
}

/// Fractional part of a 16.16 number, in 1/65536 units.
#[inline(always)]
pub const fn fixed_rest_to_int(x: Fixed) -> i64 {
    x & 0xffff
}

/// Rounds a 16.16 number to the nearest integer.
#[inline(always)]
pub const fn round_fixed_to_int(x: Fixed) -> i64 {
    (x + 0x8000) >> 16
}

/// Blends `l` toward `h` by the 16.16 weight `a`.
#[inline(always)]
pub const fn linear_interp(a: i64, l: u16, h: u16) -> u16 {
    let dif = (h as i64 - l as i64) * a + 0x8000;
    ((dif >> 16) + l as i64) as u16
}

/// Rounds and clamps a double to the 16-bit range.
#[inline(always)]
pub fn quick_saturate_word(d: f64) -> u16 {
    let d = d + 0.5;
    if d <= 0.0 {
        0
    } else if d >= 65535.0 {
        0xffff
    } else {
        d.floor() as u16
    }
}

/// Quantizes node `i` of an axis with `max_samples` nodes to 16 bits.
#[inline]
pub fn quantize_val(i: f64, max_samples: u32) -> u16 {
    let x = (i * 65535.0) / (max_samples - 1) as f64;
    quick_saturate_word(x)
}

/// Clamps a float to `[0, 1]`; NaN and tiny values become 0.
#[inline(always)]
pub fn fclamp(v: f32) -> f32 {
    if v < 1.0e-9 || v.is_nan() {
        0.0
    } else if v > 1.0 {
        1.0
    } else {
        v
    }
}

/// 16-bit value to normalized float.
#[inline(always)]
pub fn from_16_to_float(v: u16) -> f32 {
    v as f32 / 65535.0
}

/// Normalized float to 16-bit value, rounded and saturated.
#[inline(always)]
pub fn from_float_to_16(v: f32) -> u16 {
    quick_saturate_word(v as f64 * 65535.0)
}

/// Converts a whole buffer of normalized floats to 16-bit values.
#[inline]
pub fn floats_to_words(input: &[f32], output: &mut [u16]) {
    for (o, &i) in output.iter_mut().zip(input) {
        *o = from_float_to_16(i);
    }
}
