//! Waveguide configuration read from TOML.
//!
//! # Example
//!
//! ```toml
//! [core]
//! shape = "slit"
//! size = 0.3
//! fill = { model = "air" }
//!
//! [clad]
//! model = "gold_dl"
//!
//! [modes]
//! num_n = 6
//! lmax = 5.0
//! lmin = 0.4
//!
//! [bounds]
//! lmax = 3.0
//! lmin = 0.575
//! limag = 10.0
//! ```
//!
//! Every `[modes]` field is optional; `[bounds]` defaults to the sampled
//! range.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::equation::ModeEquation;
use crate::error::{invalid, Result};
use crate::grid::FrequencyGrid;
use crate::interpolation::InterpolationBounds;
use crate::material::MaterialConfig;
use crate::slit::Slit;
use crate::solver::NewtonSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    #[default]
    Slit,
}

impl Shape {
    pub fn equation(&self, size: f64) -> Result<Arc<dyn ModeEquation>> {
        match self {
            Shape::Slit => Ok(Arc::new(Slit::new(size)?)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub shape: Shape,
    pub size: f64,
    pub fill: MaterialConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModesConfig {
    /// Transverse orders `0..num_n` per polarization.
    #[serde(default = "default_num_n")]
    pub num_n: u32,

    /// Radial orders requested per transverse order.
    #[serde(default = "default_num_m")]
    pub num_m: u32,

    #[serde(default = "default_lmax")]
    pub lmax: f64,

    #[serde(default = "default_lmin")]
    pub lmin: f64,

    /// Wavelength setting the depth of the imaginary-frequency axis.
    #[serde(default = "default_limag")]
    pub limag: f64,

    #[serde(default = "default_dw")]
    pub dw: f64,

    #[serde(default)]
    pub newton: NewtonSettings,
}

fn default_num_n() -> u32 {
    6
}

fn default_num_m() -> u32 {
    1
}

fn default_lmax() -> f64 {
    5.0
}

fn default_lmin() -> f64 {
    0.4
}

fn default_limag() -> f64 {
    5.0
}

fn default_dw() -> f64 {
    1.0 / 64.0
}

impl Default for ModesConfig {
    fn default() -> Self {
        Self {
            num_n: default_num_n(),
            num_m: default_num_m(),
            lmax: default_lmax(),
            lmin: default_lmin(),
            limag: default_limag(),
            dw: default_dw(),
            newton: NewtonSettings::default(),
        }
    }
}

impl ModesConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_n == 0 {
            return Err(invalid("num_n must be at least 1"));
        }
        if self.num_m == 0 {
            return Err(invalid("num_m must be at least 1"));
        }
        self.newton.validate()?;
        // Bounds and step are checked where the grid is built.
        FrequencyGrid::new(self.lmax, self.lmin, self.limag, self.dw).map(|_| ())
    }

    pub fn frequency_grid(&self) -> Result<FrequencyGrid> {
        FrequencyGrid::new(self.lmax, self.lmin, self.limag, self.dw)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveguideConfig {
    pub core: CoreConfig,
    pub clad: MaterialConfig,
    #[serde(default)]
    pub modes: ModesConfig,
    #[serde(default)]
    pub bounds: Option<InterpolationBounds>,
}

impl WaveguideConfig {
    pub fn from_toml_str(src: &str) -> Result<Self> {
        let config: Self = toml::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let src = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&src)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.core.size.is_finite() || self.core.size <= 0.0 {
            return Err(invalid(format!("core size must be positive, got {}", self.core.size)));
        }
        self.modes.validate()?;
        if let Some(bounds) = &self.bounds {
            bounds.validate()?;
        }
        Ok(())
    }

    /// Interpolation window, defaulting to the sampled wavelength range.
    pub fn interpolation_bounds(&self) -> InterpolationBounds {
        self.bounds.unwrap_or(InterpolationBounds {
            lmax: self.modes.lmax,
            lmin: self.modes.lmin,
            limag: self.modes.limag,
        })
    }
}
