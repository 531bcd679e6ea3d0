//! Tolerance helpers for the numeric tests
use num_traits::Float;

/// Maximum acceptable error between a computed and an expected value
///
/// # Args
/// * `a` - First input.
/// * `b` - Second input. The relative tolerance applies to the larger
///   magnitude of the two.
/// * `rtol` - Relative tolerance.
/// * `atol` - Absolute tolerance.
pub fn max_error<T: Float>(a: T, b: T, rtol: T, atol: T) -> T {
    rtol * a.abs().max(b.abs()) + atol
}

/// Whether two numbers agree within absolute plus relative tolerance
pub fn isclose<T: Float>(a: T, b: T, rtol: T, atol: T) -> bool {
    (a - b).abs() <= max_error(a, b, rtol, atol)
}

