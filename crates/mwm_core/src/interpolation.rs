//! Continuous dispersion functions built from sampled grids.
//!
//! Each `(mode, component)` pair gets a tensor-product natural cubic spline
//! over a window of the frequency grid. Samples whose root search did not
//! converge are excluded from the fit: their support values are rebuilt
//! from converged neighbours along the same `wi` row (linearly between
//! neighbours, nearest value past the last one), and rows without any
//! converged sample copy the nearest rebuilt row. Queries touching such a
//! support point report [`SampleQuality::Reconstructed`].

use std::collections::BTreeMap;
use std::f64::consts::PI;

use log::warn;
use nalgebra::DMatrix;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{invalid, Error, Result};
use crate::grid::FrequencyGrid;
use crate::spline::{bracket, BicubicSpline};
use crate::types::{Component, ModeLabel, SampleSet};

/// Relative slack on domain edges, to absorb rounding in `2π/λ`.
const EDGE_TOLERANCE: f64 = 1e-9;

/// Wavelength window the interpolants cover. Must lie inside the sampled
/// grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InterpolationBounds {
    pub lmax: f64,
    pub lmin: f64,
    pub limag: f64,
}

impl InterpolationBounds {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("lmax", self.lmax), ("lmin", self.lmin), ("limag", self.limag)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(invalid(format!(
                    "interpolation bound {} must be positive and finite, got {}",
                    name, value
                )));
            }
        }
        if self.lmax <= self.lmin {
            return Err(invalid(format!(
                "interpolation lmax ({}) must be greater than lmin ({})",
                self.lmax, self.lmin
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleQuality {
    /// Every support point of the enclosing cell converged.
    Converged,
    /// At least one support point was rebuilt from its neighbours.
    Reconstructed,
}

/// Rectangle of the complex frequency plane a function is defined on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Domain {
    pub wr_min: f64,
    pub wr_max: f64,
    pub wi_min: f64,
    pub wi_max: f64,
}

impl Domain {
    /// Returns the query pulled onto the domain when it lies within the
    /// edge tolerance, or an error when it lies outside.
    fn admit(&self, wr: f64, wi: f64) -> Result<(f64, f64)> {
        let slack_r = EDGE_TOLERANCE * self.wr_max.abs().max(1.0);
        let slack_i = EDGE_TOLERANCE * self.wi_min.abs().max(1.0);
        let inside = wr.is_finite()
            && wi.is_finite()
            && wr >= self.wr_min - slack_r
            && wr <= self.wr_max + slack_r
            && wi >= self.wi_min - slack_i
            && wi <= self.wi_max + slack_i;
        if !inside {
            return Err(Error::OutOfDomain {
                wr,
                wi,
                wr_min: self.wr_min,
                wr_max: self.wr_max,
                wi_min: self.wi_min,
                wi_max: self.wi_max,
            });
        }
        Ok((
            wr.clamp(self.wr_min, self.wr_max),
            wi.clamp(self.wi_min, self.wi_max),
        ))
    }
}

/// One real-valued component of a mode's propagation constant as a
/// function of complex angular frequency `wr + i·wi`.
#[derive(Debug, Clone)]
pub struct DispersionFunction {
    spline: BicubicSpline,
    /// Support points rebuilt from neighbours, in spline orientation.
    reconstructed: DMatrix<bool>,
    domain: Domain,
}

impl DispersionFunction {
    pub fn value_at(&self, wr: f64, wi: f64) -> Result<f64> {
        let (wr, wi) = self.domain.admit(wr, wi)?;
        Ok(self.spline.evaluate(wr, wi))
    }

    pub fn quality(&self, wr: f64, wi: f64) -> Result<SampleQuality> {
        let (wr, wi) = self.domain.admit(wr, wi)?;
        let (c0, c1) = bracket(self.spline.xs(), wr);
        let (r0, r1) = bracket(self.spline.ys(), wi);
        let touched = [(r0, c0), (r0, c1), (r1, c0), (r1, c1)]
            .iter()
            .any(|&idx| self.reconstructed[idx]);
        Ok(if touched {
            SampleQuality::Reconstructed
        } else {
            SampleQuality::Converged
        })
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }
}

/// Interpolated functions for every mode that had converged samples in the
/// window.
#[derive(Debug, Clone, Default)]
pub struct BetaFuncs {
    funcs: BTreeMap<(ModeLabel, Component), DispersionFunction>,
}

impl BetaFuncs {
    pub fn get(&self, label: ModeLabel, component: Component) -> Result<&DispersionFunction> {
        self.funcs
            .get(&(label, component))
            .ok_or(Error::UnknownMode(label))
    }

    pub fn value_at(&self, label: ModeLabel, component: Component, wr: f64, wi: f64) -> Result<f64> {
        self.get(label, component)?.value_at(wr, wi)
    }

    pub fn beta_at(&self, label: ModeLabel, wr: f64, wi: f64) -> Result<Complex64> {
        Ok(Complex64::new(
            self.value_at(label, Component::Real, wr, wi)?,
            self.value_at(label, Component::Imag, wr, wi)?,
        ))
    }

    pub fn contains(&self, label: ModeLabel) -> bool {
        self.funcs.contains_key(&(label, Component::Real))
    }

    pub fn labels(&self) -> Vec<ModeLabel> {
        let mut labels: Vec<ModeLabel> = self.funcs.keys().map(|(label, _)| *label).collect();
        labels.dedup();
        labels
    }
}

/// Grid indices covering the bounds: columns `j0..=j1`, rows `0..=i1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    j0: usize,
    j1: usize,
    i1: usize,
}

fn window(grid: &FrequencyGrid, bounds: &InterpolationBounds) -> Result<Window> {
    bounds.validate()?;
    let ws = grid.ws();
    let wis = grid.wis();
    let wr_min = 2.0 * PI / bounds.lmax;
    let wr_max = 2.0 * PI / bounds.lmin;
    let wi_min = -2.0 * PI / bounds.limag;
    let slack = |w: f64| EDGE_TOLERANCE * w.abs().max(1.0);

    let j0 = ws
        .iter()
        .rposition(|&w| w <= wr_min + slack(wr_min))
        .ok_or_else(|| {
            Error::BoundsExceedSamples(format!(
                "lmax = {} needs w = {:.6} but ws starts at {:.6}",
                bounds.lmax, wr_min, ws[0]
            ))
        })?;
    let j1 = ws
        .iter()
        .position(|&w| w >= wr_max - slack(wr_max))
        .ok_or_else(|| {
            Error::BoundsExceedSamples(format!(
                "lmin = {} needs w = {:.6} but ws ends at {:.6}",
                bounds.lmin,
                wr_max,
                ws[ws.len() - 1]
            ))
        })?;
    let i1 = wis
        .iter()
        .position(|&wi| wi <= wi_min + slack(wi_min))
        .ok_or_else(|| {
            Error::BoundsExceedSamples(format!(
                "limag = {} needs wi = {:.6} but wis ends at {:.6}",
                bounds.limag,
                wi_min,
                wis[wis.len() - 1]
            ))
        })?;
    Ok(Window { j0, j1, i1: i1.max(1) })
}

/// Fills non-converged entries of `values` from converged ones. Returns
/// `None` when nothing converged.
fn reconstruct(values: &DMatrix<Complex64>, converged: &DMatrix<bool>) -> Option<DMatrix<Complex64>> {
    let (rows, cols) = values.shape();
    let mut filled = values.clone();
    let mut row_ok = vec![false; rows];

    for i in 0..rows {
        let good: Vec<usize> = (0..cols).filter(|&j| converged[(i, j)]).collect();
        if good.is_empty() {
            continue;
        }
        row_ok[i] = true;
        for j in (0..cols).filter(|&j| !converged[(i, j)]) {
            let left = good.iter().rev().find(|&&g| g < j).copied();
            let right = good.iter().find(|&&g| g > j).copied();
            filled[(i, j)] = match (left, right) {
                (Some(l), Some(r)) => {
                    let t = (j - l) as f64 / (r - l) as f64;
                    values[(i, l)] * (1.0 - t) + values[(i, r)] * t
                }
                (Some(l), None) => values[(i, l)],
                (None, Some(r)) => values[(i, r)],
                (None, None) => continue,
            };
        }
    }

    if !row_ok.iter().any(|&ok| ok) {
        return None;
    }
    for i in (0..rows).filter(|&i| !row_ok[i]) {
        let source = (0..rows)
            .filter(|&k| row_ok[k])
            .min_by_key(|&k| (k as isize - i as isize).unsigned_abs())?;
        for j in 0..cols {
            filled[(i, j)] = filled[(source, j)];
        }
    }
    Some(filled)
}

/// Builds interpolants for every mode in `set` over the window `bounds`
/// selects from `grid`.
pub fn interpolate(grid: &FrequencyGrid, set: &SampleSet, bounds: &InterpolationBounds) -> Result<BetaFuncs> {
    set.validate(grid.shape())?;
    let Window { j0, j1, i1 } = window(grid, bounds)?;
    let rows = i1 + 1;
    let cols = j1 - j0 + 1;

    // Spline rows run along ascending wi, i.e. grid rows i1, i1 - 1, ..., 0.
    let xs: Vec<f64> = grid.ws()[j0..=j1].to_vec();
    let ys: Vec<f64> = (0..rows).map(|r| grid.wis()[i1 - r]).collect();
    let domain = Domain {
        wr_min: xs[0],
        wr_max: xs[cols - 1],
        wi_min: ys[0],
        wi_max: ys[rows - 1],
    };

    let mut funcs = BTreeMap::new();
    for (label, betas) in &set.betas {
        let convs = set
            .convs
            .get(label)
            .ok_or_else(|| invalid(format!("no convergence grid for mode {}", label)))?;
        let values = DMatrix::from_fn(rows, cols, |r, c| betas[(i1 - r, j0 + c)]);
        let converged = DMatrix::from_fn(rows, cols, |r, c| convs[(i1 - r, j0 + c)]);

        let filled = match reconstruct(&values, &converged) {
            Some(filled) => filled,
            None => {
                warn!("mode {} has no converged samples in the window; skipping", label);
                continue;
            }
        };
        let reconstructed = converged.map(|ok| !ok);

        for component in Component::ALL {
            let table = filled.map(|z| component.of(z));
            let spline = BicubicSpline::new(xs.clone(), ys.clone(), table)?;
            funcs.insert(
                (*label, component),
                DispersionFunction {
                    spline,
                    reconstructed: reconstructed.clone(),
                    domain,
                },
            );
        }
    }
    Ok(BetaFuncs { funcs })
}
