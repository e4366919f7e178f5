//! Core types shared by the sweep, cache and interpolation layers.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use nalgebra::DMatrix;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{invalid, Error, Result};

/// Polarization class of a guided mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Polarization {
    /// TM-like (magnetic field transverse).
    M,
    /// TE-like (electric field transverse).
    E,
}

impl Polarization {
    pub const ALL: [Polarization; 2] = [Polarization::M, Polarization::E];
}

impl fmt::Display for Polarization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Polarization::M => write!(f, "M"),
            Polarization::E => write!(f, "E"),
        }
    }
}

/// Identifies one guided mode: polarization, transverse order `n >= 0` and
/// radial order `m >= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModeLabel {
    pub pol: Polarization,
    pub n: u32,
    pub m: u32,
}

impl ModeLabel {
    pub fn new(pol: Polarization, n: u32, m: u32) -> Self {
        Self { pol, n, m }
    }
}

impl fmt::Display for ModeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.pol, self.n, self.m)
    }
}

/// Parses labels written as `M,0,1` (whitespace and surrounding parentheses
/// are ignored).
impl FromStr for ModeLabel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim().trim_start_matches('(').trim_end_matches(')');
        let parts: Vec<&str> = trimmed
            .split(',')
            .map(|p| p.trim().trim_matches('\''))
            .collect();
        if parts.len() != 3 {
            return Err(invalid(format!(
                "mode label '{}' must have the form POL,N,M",
                s
            )));
        }
        let pol = match parts[0] {
            "M" | "m" => Polarization::M,
            "E" | "e" => Polarization::E,
            other => return Err(invalid(format!("unknown polarization '{}'", other))),
        };
        let n = parts[1]
            .parse::<u32>()
            .map_err(|_| invalid(format!("invalid transverse order '{}'", parts[1])))?;
        let m = parts[2]
            .parse::<u32>()
            .map_err(|_| invalid(format!("invalid radial order '{}'", parts[2])))?;
        if m == 0 {
            return Err(invalid("radial order must be at least 1"));
        }
        Ok(ModeLabel::new(pol, n, m))
    }
}

/// Real or imaginary part of a complex propagation constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    Real,
    Imag,
}

impl Component {
    pub const ALL: [Component; 2] = [Component::Real, Component::Imag];

    pub fn of(self, z: Complex64) -> f64 {
        match self {
            Component::Real => z.re,
            Component::Imag => z.im,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Real => write!(f, "real"),
            Component::Imag => write!(f, "imag"),
        }
    }
}

/// Solved values for one mode over the complex frequency grid.
///
/// Rows follow `wis`, columns follow `ws`. `converged` has the same shape as
/// `values` and records whether the root search met its tolerance.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleGrid {
    pub values: DMatrix<Complex64>,
    pub converged: DMatrix<bool>,
}

impl SampleGrid {
    pub fn filled(rows: usize, cols: usize, value: Complex64, converged: bool) -> Self {
        Self {
            values: DMatrix::from_element(rows, cols, value),
            converged: DMatrix::from_element(rows, cols, converged),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.values.shape()
    }

    pub fn converged_count(&self) -> usize {
        self.converged.iter().filter(|&&c| c).count()
    }
}

/// Merged propagation constants and convergence flags for every mode of a
/// configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleSet {
    pub betas: BTreeMap<ModeLabel, DMatrix<Complex64>>,
    pub convs: BTreeMap<ModeLabel, DMatrix<bool>>,
}

impl SampleSet {
    pub fn labels(&self) -> impl Iterator<Item = &ModeLabel> {
        self.betas.keys()
    }

    /// Checks that both mappings cover the same labels and that every grid
    /// has the given `(rows, cols)` shape.
    pub fn validate(&self, shape: (usize, usize)) -> Result<()> {
        if self.betas.len() != self.convs.len() {
            return Err(invalid(format!(
                "sample set has {} beta grids but {} convergence grids",
                self.betas.len(),
                self.convs.len()
            )));
        }
        for (label, betas) in &self.betas {
            let convs = self
                .convs
                .get(label)
                .ok_or_else(|| invalid(format!("no convergence grid for mode {}", label)))?;
            if betas.shape() != shape || convs.shape() != shape {
                return Err(invalid(format!(
                    "grid for mode {} has shape {:?}/{:?}, expected {:?}",
                    label,
                    betas.shape(),
                    convs.shape(),
                    shape
                )));
            }
        }
        Ok(())
    }
}
