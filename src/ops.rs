//! Operation library: pure arithmetic over JSON numbers.
//!
//! Everything here is stateless and total except `factorial`, which rejects
//! negative input with a domain error.

use std::fmt;

/// Factorial is undefined for negative input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub struct NegativeInput;

impl fmt::Display for NegativeInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "factorial is undefined for negative numbers")
    }
}

impl std::error::Error for NegativeInput {}

/// Sum of two numbers.
#[must_use]
pub fn sum(a: f64, b: f64) -> f64 {
    a + b
}

/// Product of two numbers.
#[must_use]
pub fn product(a: f64, b: f64) -> f64 {
    a * b
}

/// Factorial of `n`.
///
/// Computed in `f64`, so large inputs overflow to infinity rather than
/// wrapping. Not exposed over HTTP; only the test suite exercises it.
#[allow(dead_code, clippy::cast_precision_loss)]
pub fn factorial(n: i64) -> Result<f64, NegativeInput> {
    if n < 0 {
        return Err(NegativeInput);
    }
    if n <= 1 {
        return Ok(1.0);
    }
    Ok(n as f64 * factorial(n - 1)?)
}
