//! Two's complement register arithmetic of configurable width.
//!
//! Values are carried in `i64` and reinterpreted as `bits` wide registers,
//! the way a Verilog `reg signed [(bits-1):0]` would hold them.

/// Sign-extend the low `bits` of `x` (`1 <= bits <= 64`).
///
/// This is the value a `bits` wide signed register holds after assignment.
#[inline]
pub fn wrap(x: i64, bits: u32) -> i64 {
    let s = i64::BITS - bits;
    (x << s) >> s
}

/// Zero-extend the low `bits` of `x` (`0 <= bits < 64`).
#[inline]
pub fn mask(x: u64, bits: u32) -> u64 {
    x & ((1u64 << bits) - 1)
}

/// Bit `n` of `x`
#[inline]
pub fn bit(x: i64, n: u32) -> bool {
    (x >> n) & 1 != 0
}

/// Round-half-to-even addend for dropping the low `drop` bits of `x`.
///
/// `{x[drop], (drop-1){!x[drop]}}`: a half LSB when the kept LSB is odd and
/// just below a half LSB when it is even.
#[inline]
fn rne_addend(x: i64, drop: u32) -> i64 {
    let half = 1i64 << (drop - 1);
    if bit(x, drop) { half } else { half - 1 }
}

/// Round a `width` bit value to its top `width - drop` bits, ties to even.
///
/// The addition wraps in `width` bits like the emitted adder. `drop == 0`
/// passes `x` through.
pub fn round_half_even(x: i64, width: u32, drop: u32) -> i64 {
    if drop == 0 {
        return wrap(x, width);
    }
    wrap(x + rne_addend(x, drop), width) >> drop
}

/// As [`round_half_even`] but leaves the value unrounded (truncated) when
/// rounding up would overflow the positive full scale.
pub fn round_half_even_guarded(x: i64, width: u32, drop: u32) -> i64 {
    let x = wrap(x, width);
    if drop == 0 {
        return x;
    }
    let top = (1i64 << (width - 1)) - 1;
    if x >> drop == top >> drop {
        x >> drop
    } else {
        (x + rne_addend(x, drop)) >> drop
    }
}
