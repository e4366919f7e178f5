//! Metal-clad slit (parallel-plate) waveguide.
//!
//! The gap `|x| < size/2` is filled with `e1` and bounded by cladding `e2`.
//! With `u = kx·size/2` inside and `v = γ·size/2` the decay outside, the
//! boundary conditions reduce to
//!
//! | label         | profile | relation               |
//! |---------------|---------|------------------------|
//! | `M`, even `n` | cos     | `u tan u = (e1/e2) v`  |
//! | `M`, odd `n`  | sin     | `u cot u = −(e1/e2) v` |
//! | `E`, odd `n`  | cos     | `u tan u = v`          |
//! | `E`, even `n` | sin     | `u cot u = −v`         |
//!
//! The residuals are written without `tan`/`cot` so that the perfect-conductor
//! seeds never sit on a pole. `('E', 0, m)` has no counterpart in a slit.

use num_complex::Complex64;

use crate::equation::ModeEquation;
use crate::error::{invalid, Result};
use crate::types::{ModeLabel, Polarization};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slit {
    size: f64,
}

impl Slit {
    pub fn new(size: f64) -> Result<Self> {
        if !size.is_finite() || size <= 0.0 {
            return Err(invalid(format!("slit size must be positive, got {}", size)));
        }
        Ok(Self { size })
    }

    fn u(&self, h2: Complex64, w: Complex64, e1: Complex64) -> Complex64 {
        (e1 * w * w - h2).sqrt() * (self.size / 2.0)
    }

    /// Branch cut along the positive imaginary axis of `h2 − e2·w²`, which
    /// keeps `Re v > 0` for lossy metals on both frequency axes.
    fn v(&self, h2: Complex64, w: Complex64, e2: Complex64) -> Complex64 {
        let z = h2 - e2 * w * w;
        Complex64::new(1.0, -1.0) * (Complex64::i() * z * 0.5).sqrt() * (self.size / 2.0)
    }
}

fn sinc(u: Complex64) -> Complex64 {
    if u.norm() < 1e-4 {
        Complex64::new(1.0, 0.0) - u * u / 6.0
    } else {
        u.sin() / u
    }
}

impl ModeEquation for Slit {
    fn shape(&self) -> &str {
        "slit"
    }

    fn size(&self) -> f64 {
        self.size
    }

    fn radial_orders(&self, _num_m: u32) -> u32 {
        1
    }

    fn supports(&self, label: ModeLabel) -> bool {
        label.m == 1 && !(label.pol == Polarization::E && label.n == 0)
    }

    fn residual(
        &self,
        h2: Complex64,
        w: Complex64,
        label: ModeLabel,
        e1: Complex64,
        e2: Complex64,
    ) -> Complex64 {
        let u = self.u(h2, w, e1);
        let v = self.v(h2, w, e2);
        let even = label.n % 2 == 0;
        match (label.pol, even) {
            (Polarization::M, true) => u * u.sin() - e1 / e2 * v * u.cos(),
            (Polarization::M, false) => u.cos() + e1 / e2 * v * sinc(u),
            (Polarization::E, false) => u * u.sin() - v * u.cos(),
            (Polarization::E, true) => u.cos() + v * sinc(u),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_slit_rejects_non_positive_size() {
        assert!(Slit::new(0.0).is_err());
        assert!(Slit::new(-1.0).is_err());
        assert!(Slit::new(0.3).is_ok());
    }

    #[test]
    fn test_slit_mode_support() {
        let slit = Slit::new(0.3).unwrap();
        assert!(!slit.supports(ModeLabel::new(Polarization::E, 0, 1)));
        assert!(slit.supports(ModeLabel::new(Polarization::E, 1, 1)));
        assert!(slit.supports(ModeLabel::new(Polarization::M, 0, 1)));
        assert!(!slit.supports(ModeLabel::new(Polarization::M, 0, 2)));
        assert_eq!(slit.radial_orders(3), 1);
    }

    #[test]
    fn test_v_branch_has_positive_real_part_for_metal() {
        let slit = Slit::new(0.3).unwrap();
        let e2 = Complex64::new(-40.0, 3.0);
        for &(wr, wi) in &[(1.25, 0.0), (6.0, 0.0), (3.0, -1.0), (1.25, -1.2)] {
            let w = Complex64::new(wr, wi);
            let v = slit.v(w * w, w, e2);
            assert!(v.re > 0.0, "Re v = {} at w = {}", v.re, w);
            let expected = (w * w - e2 * w * w).sqrt() * 0.15;
            assert!((v * v - expected * expected).norm() < 1e-9 * expected.norm_sqr());
        }
    }

    #[test]
    fn test_odd_residuals_finite_at_zero_u() {
        let slit = Slit::new(0.3).unwrap();
        let w = Complex64::new(2.0, 0.0);
        let e1 = Complex64::new(1.0, 0.0);
        let e2 = Complex64::new(-40.0, 1.0);
        let h2 = e1 * w * w;
        for label in [
            ModeLabel::new(Polarization::M, 1, 1),
            ModeLabel::new(Polarization::E, 2, 1),
        ] {
            let f = slit.residual(h2, w, label, e1, e2);
            assert!(f.re.is_finite() && f.im.is_finite());
            assert!(f.norm() > 0.5, "spurious root at u = 0 for {}", label);
        }
    }

    #[test]
    fn test_pec_seeds_are_near_roots_for_good_conductor() {
        // With |e2| huge the roots approach the perfect-conductor values.
        let slit = Slit::new(0.3).unwrap();
        let w = Complex64::new(2.0 * PI, 0.0);
        let e1 = Complex64::new(1.0, 0.0);
        let e2 = Complex64::new(-1e12, 0.0);
        for label in [
            ModeLabel::new(Polarization::M, 0, 1),
            ModeLabel::new(Polarization::M, 1, 1),
            ModeLabel::new(Polarization::M, 2, 1),
        ] {
            let h2 = slit.pec_beta2(w, label, e1).unwrap();
            let f = slit.residual(h2, w, label, e1, e2);
            assert!(f.norm() < 1e-3, "residual {} too large for {}", f.norm(), label);
        }
    }
}
