use std::fmt;

use num_complex::Complex64;

use crate::error::Result;
use crate::pec::beta2_pec;
use crate::types::ModeLabel;

/// Squared propagation constant assigned to labels a shape has no mode for.
pub const PLACEHOLDER_BETA2: Complex64 = Complex64::new(0.01, 0.0);

/// The transcendental dispersion relation of one waveguide cross-section.
///
/// Implementations are shape-specific; the sweep, cache and interpolation
/// layers only talk to this trait.
pub trait ModeEquation: Send + Sync + fmt::Debug {
    /// Shape name used in cache keys, e.g. `"slit"`.
    fn shape(&self) -> &str;

    /// Characteristic transverse size.
    fn size(&self) -> f64;

    /// Number of radial orders this shape supports when `num_m` are requested.
    fn radial_orders(&self, num_m: u32) -> u32 {
        num_m
    }

    /// Whether `label` corresponds to a physical mode of this shape.
    fn supports(&self, _label: ModeLabel) -> bool {
        true
    }

    /// Residual of the characteristic equation at squared propagation
    /// constant `h2`, complex frequency `w`, core permittivity `e1` and
    /// cladding permittivity `e2`. Roots are the guided modes.
    fn residual(&self, h2: Complex64, w: Complex64, label: ModeLabel, e1: Complex64, e2: Complex64)
        -> Complex64;

    /// Perfect-conductor estimate used to seed the continuation.
    fn pec_beta2(&self, w: Complex64, label: ModeLabel, e1: Complex64) -> Result<Complex64> {
        beta2_pec(w, label.n, e1, self.size())
    }
}
