//! Frequency grids derived from wavelength bounds.
//!
//! Angular frequencies are expressed as `w = 2π/λ` with `λ` in the length unit
//! of the waveguide size (µm throughout the crate).

use std::f64::consts::PI;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{invalid, Result};

/// The two frequency axes every sample grid is indexed by.
///
/// `ws` ascends along the real axis; `wis` descends from zero along the
/// imaginary axis. A sample at `(i, j)` lives at `ws[j] + i·wis[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyGrid {
    ws: Vec<f64>,
    wis: Vec<f64>,
    dw: f64,
}

impl FrequencyGrid {
    /// Builds the grid from wavelength bounds `lmax > lmin > 0`, an imaginary
    /// axis bound `limag > 0` and a step `dw > 0`.
    ///
    /// The lower real bound rounds down and the upper bounds round up, so the
    /// requested physical range is always covered.
    pub fn new(lmax: f64, lmin: f64, limag: f64, dw: f64) -> Result<Self> {
        for (name, value) in [("lmax", lmax), ("lmin", lmin), ("limag", limag), ("dw", dw)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(invalid(format!("{} must be positive and finite, got {}", name, value)));
            }
        }
        if lmax <= lmin {
            return Err(invalid(format!(
                "lmax ({}) must be greater than lmin ({})",
                lmax, lmin
            )));
        }

        let ind_wmin = (2.0 * PI / lmax / dw).floor() as i64;
        let ind_wmax = (2.0 * PI / lmin / dw).ceil() as i64;
        let ind_wimag = (2.0 * PI / limag / dw).ceil() as i64;
        if ind_wmin < 1 {
            return Err(invalid(format!(
                "step dw = {} is too coarse for lmax = {}: the grid would start at zero frequency",
                dw, lmax
            )));
        }

        let ws = (ind_wmin..=ind_wmax).map(|i| i as f64 * dw).collect();
        let wis = (0..=ind_wimag).map(|j| -(j as f64) * dw).collect();
        Ok(Self { ws, wis, dw })
    }

    pub fn ws(&self) -> &[f64] {
        &self.ws
    }

    pub fn wis(&self) -> &[f64] {
        &self.wis
    }

    pub fn dw(&self) -> f64 {
        self.dw
    }

    /// `(len(wis), len(ws))`, the shape of every sample grid.
    pub fn shape(&self) -> (usize, usize) {
        (self.wis.len(), self.ws.len())
    }

    /// Complex angular frequency at grid position `(i, j)`.
    pub fn point(&self, i: usize, j: usize) -> Complex64 {
        Complex64::new(self.ws[j], self.wis[i])
    }

    /// Whether `ws` and `wis` match this grid's axes within rounding.
    pub fn same_axes(&self, ws: &[f64], wis: &[f64]) -> bool {
        fn close(a: &[f64], b: &[f64]) -> bool {
            a.len() == b.len()
                && a
                    .iter()
                    .zip(b)
                    .all(|(x, y)| (x - y).abs() <= 1e-12 * x.abs().max(1.0))
        }
        close(&self.ws, ws) && close(&self.wis, wis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_matches_index_formula() {
        let (lmax, lmin, limag, dw) = (5.0, 0.4, 5.0, 1.0 / 64.0);
        let grid = FrequencyGrid::new(lmax, lmin, limag, dw).unwrap();

        let ind_wmin = (2.0 * PI / lmax / dw).floor() as i64;
        let ind_wmax = (2.0 * PI / lmin / dw).ceil() as i64;
        let ind_wimag = (2.0 * PI / limag / dw).ceil() as i64;

        assert_eq!(grid.ws().len() as i64, ind_wmax - ind_wmin + 1);
        assert_eq!(grid.ws()[0], ind_wmin as f64 * dw);
        assert_eq!(grid.wis().len() as i64, ind_wimag + 1);
        for (k, w) in grid.ws().iter().enumerate() {
            assert_eq!(*w, (ind_wmin + k as i64) as f64 * dw);
        }
        for (k, wi) in grid.wis().iter().enumerate() {
            assert_eq!(*wi, -(k as f64) * dw);
        }
    }

    #[test]
    fn test_default_bounds_start_at_1_25() {
        let grid = FrequencyGrid::new(5.0, 0.4, 5.0, 1.0 / 64.0).unwrap();
        assert_eq!(grid.ws()[0], 1.25);
        assert_eq!(grid.wis()[0], 0.0);
        assert!(grid.wis().windows(2).all(|w| w[1] < w[0]));
        assert!(grid.ws().windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_grid_covers_requested_range() {
        let grid = FrequencyGrid::new(3.0, 0.575, 10.0, 0.1).unwrap();
        assert!(grid.ws()[0] <= 2.0 * PI / 3.0);
        assert!(*grid.ws().last().unwrap() >= 2.0 * PI / 0.575);
        assert!(*grid.wis().last().unwrap() <= -2.0 * PI / 10.0);
    }

    #[test]
    fn test_rejects_non_physical_bounds() {
        assert!(FrequencyGrid::new(0.4, 5.0, 5.0, 0.01).is_err());
        assert!(FrequencyGrid::new(5.0, 0.4, -1.0, 0.01).is_err());
        assert!(FrequencyGrid::new(5.0, 0.4, 5.0, 0.0).is_err());
        assert!(FrequencyGrid::new(5.0, 0.4, 5.0, f64::NAN).is_err());
        // Grid would start at w = 0.
        assert!(FrequencyGrid::new(100.0, 0.4, 5.0, 0.5).is_err());
    }

    #[test]
    fn test_point_combines_axes() {
        let grid = FrequencyGrid::new(2.0, 1.0, 10.0, 1.0 / 16.0).unwrap();
        let w = grid.point(2, 3);
        assert_eq!(w.re, grid.ws()[3]);
        assert_eq!(w.im, -2.0 / 16.0);
        assert_eq!(grid.shape(), (grid.wis().len(), grid.ws().len()));
    }
}
