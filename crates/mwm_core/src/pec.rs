//! Perfect-conductor baseline for the squared propagation constant.

use std::f64::consts::PI;

use num_complex::Complex64;

use crate::error::{invalid, Result};

/// Closed-form `beta²` of order `n` for perfectly conducting walls a distance
/// `size` apart: `e1·w² − (nπ/size)²`. Identical for both polarizations.
pub fn beta2_pec(w: Complex64, n: u32, e1: Complex64, size: f64) -> Result<Complex64> {
    if !size.is_finite() || size <= 0.0 {
        return Err(invalid(format!("size must be positive and finite, got {}", size)));
    }
    let kc = n as f64 * PI / size;
    Ok(e1 * w * w - kc * kc)
}
