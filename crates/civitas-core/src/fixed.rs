use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
///
/// Used for production progress and yearly production rates so that
/// fractional progress accumulates identically on every platform.
pub type Fixed64 = I32F32;

/// Ticks are the atomic unit of simulation time.
pub type Ticks = u64;

/// Convert an f64 to Fixed64. Use only for initialization, never in sim loop.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Convert Fixed64 to f64. Use only for display, never in sim loop.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Fraction `num / den` as a Fixed64. A zero denominator yields zero.
#[inline]
pub fn ratio(num: u32, den: u32) -> Fixed64 {
    if den == 0 {
        return Fixed64::ZERO;
    }
    Fixed64::from_num(num) / Fixed64::from_num(den)
}
