//! Continuation of characteristic-equation roots across the frequency grid.
//!
//! Each grid point is seeded with the root found at its neighbour:
//!
//! 1. row `wi = 0` is walked along `ws`, starting from a perfect-conductor
//!    seed at `ws[0]`;
//! 2. every column is then walked down `wis`, starting from its solved
//!    `wi = 0` value.
//!
//! A point that fails to converge keeps its best estimate, is flagged, and
//! still seeds the next point.

use log::debug;
use nalgebra::DMatrix;
use num_complex::Complex64;
use num_traits::Zero;

use crate::equation::{ModeEquation, PLACEHOLDER_BETA2};
use crate::error::{invalid, Result};
use crate::grid::FrequencyGrid;
use crate::material::Permittivity;
use crate::solver::{solve_root, NewtonSettings, RootOutcome};
use crate::types::{ModeLabel, SampleGrid};

/// Everything a sweep reads. Borrowed, never mutated.
#[derive(Debug, Clone, Copy)]
pub struct SweepContext<'a> {
    pub equation: &'a dyn ModeEquation,
    pub fill: &'a dyn Permittivity,
    pub clad: &'a dyn Permittivity,
    pub grid: &'a FrequencyGrid,
    pub settings: NewtonSettings,
}

impl<'a> SweepContext<'a> {
    fn permittivities(&self, w: Complex64) -> Result<(Complex64, Complex64)> {
        let e1 = self.fill.permittivity(w);
        let e2 = self.clad.permittivity(w);
        for (role, name, eps) in [("fill", self.fill.name(), e1), ("clad", self.clad.name(), e2)] {
            if !eps.re.is_finite() || !eps.im.is_finite() || eps.norm() == 0.0 {
                return Err(invalid(format!(
                    "{} material '{}' has permittivity {} at w = {}",
                    role, name, eps, w
                )));
            }
        }
        Ok((e1, e2))
    }

    /// Perfect-conductor seed for `label` at the low-frequency end of `ws`.
    pub fn seed(&self, label: ModeLabel) -> Result<Complex64> {
        let w = self.grid.point(0, 0);
        let e1 = self.fill.permittivity(w);
        self.equation.pec_beta2(w, label, e1)
    }

    /// Solves the characteristic equation for `label` at complex frequency `w`.
    pub fn solve_point(&self, label: ModeLabel, w: Complex64, guess: Complex64) -> Result<RootOutcome> {
        let (e1, e2) = self.permittivities(w)?;
        let equation = self.equation;
        solve_root(
            |h2| equation.residual(h2, w, label, e1, e2),
            guess,
            self.settings,
        )
    }

    /// Full sweep for `label`, seeded with [`SweepContext::seed`].
    pub fn sweep(&self, label: ModeLabel) -> Result<SampleGrid> {
        let (rows, cols) = self.grid.shape();
        if !self.equation.supports(label) {
            debug!("{} is not a mode of {}; using placeholder grid", label, self.equation.shape());
            return Ok(SampleGrid::filled(rows, cols, PLACEHOLDER_BETA2, false));
        }
        let seed = self.seed(label)?;
        self.sweep_from(label, seed)
    }

    /// Full sweep for `label` starting from an explicit seed at `(0, 0)`.
    pub fn sweep_from(&self, label: ModeLabel, seed: Complex64) -> Result<SampleGrid> {
        let (rows, cols) = self.grid.shape();
        let mut values = DMatrix::from_element(rows, cols, Complex64::zero());
        let mut converged = DMatrix::from_element(rows, cols, false);

        let mut guess = seed;
        for j in 0..cols {
            let outcome = self.solve_point(label, self.grid.point(0, j), guess)?;
            values[(0, j)] = outcome.root;
            converged[(0, j)] = outcome.converged;
            guess = outcome.root;
        }

        for j in 0..cols {
            let mut guess = values[(0, j)];
            for i in 1..rows {
                let outcome = self.solve_point(label, self.grid.point(i, j), guess)?;
                values[(i, j)] = outcome.root;
                converged[(i, j)] = outcome.converged;
                guess = outcome.root;
            }
        }

        let grid = SampleGrid { values, converged };
        let failures = rows * cols - grid.converged_count();
        if failures > 0 {
            debug!("{}: {} of {} samples did not converge", label, failures, rows * cols);
        }
        Ok(grid)
    }
}
