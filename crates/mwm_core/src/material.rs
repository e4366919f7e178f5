//! Material permittivity models.
//!
//! The engine only needs `w -> ε(w)` at complex angular frequency; everything
//! implementing [`Permittivity`] can be used as core fill or cladding. The
//! models here cover constant dielectrics and Drude–Lorentz metals.

use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{invalid, Result};

/// Speed of light in µm·THz.
const C_UM_THZ: f64 = 299.792458;

/// Frequency-dependent complex permittivity.
pub trait Permittivity: Send + Sync + fmt::Debug {
    /// Identity used in cache keys.
    fn name(&self) -> &str;

    /// Relative permittivity at complex angular frequency `w` (µm⁻¹).
    fn permittivity(&self, w: Complex64) -> Complex64;
}

/// Frequency-independent dielectric.
#[derive(Debug, Clone, PartialEq)]
pub struct Dielectric {
    name: String,
    eps: Complex64,
}

impl Dielectric {
    pub fn new(name: impl Into<String>, eps: Complex64) -> Result<Self> {
        if !eps.re.is_finite() || !eps.im.is_finite() || eps.norm() == 0.0 {
            return Err(invalid(format!("permittivity must be finite and non-zero, got {}", eps)));
        }
        Ok(Self {
            name: name.into(),
            eps,
        })
    }

    pub fn air() -> Self {
        Self {
            name: "air".to_string(),
            eps: Complex64::new(1.0, 0.0),
        }
    }

    /// Dielectric with refractive index `ri`.
    pub fn from_index(ri: f64) -> Result<Self> {
        if !ri.is_finite() || ri <= 0.0 {
            return Err(invalid(format!("refractive index must be positive, got {}", ri)));
        }
        Self::new(format!("RI_{}", ri), Complex64::new(ri * ri, 0.0))
    }
}

impl Permittivity for Dielectric {
    fn name(&self) -> &str {
        &self.name
    }

    fn permittivity(&self, _w: Complex64) -> Complex64 {
        self.eps
    }
}

/// One Lorentz pole: `Δε·Ω² / (Ω² − w² − iΓw)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LorentzOscillator {
    pub strength: f64,
    pub omega: f64,
    pub gamma: f64,
}

/// Drude metal with optional Lorentz oscillators (exp(−iωt) convention):
///
/// `ε(w) = ε∞ − wp² / (w(w + iγ)) − Σ Δε·Ω² / (w² − Ω² + iΓw)`
///
/// All rates are in the same µm⁻¹ units as `w`.
#[derive(Debug, Clone, PartialEq)]
pub struct DrudeLorentz {
    name: String,
    e_inf: f64,
    wp: f64,
    gamma: f64,
    oscillators: Vec<LorentzOscillator>,
}

impl DrudeLorentz {
    pub fn new(
        name: impl Into<String>,
        e_inf: f64,
        wp: f64,
        gamma: f64,
        oscillators: Vec<LorentzOscillator>,
    ) -> Result<Self> {
        if !e_inf.is_finite() || !wp.is_finite() || wp < 0.0 || !gamma.is_finite() || gamma < 0.0 {
            return Err(invalid("Drude parameters must be finite with wp, gamma >= 0"));
        }
        for osc in &oscillators {
            if !osc.strength.is_finite() || !(osc.omega > 0.0) || !(osc.gamma >= 0.0) {
                return Err(invalid(format!("invalid Lorentz oscillator {:?}", osc)));
            }
        }
        Ok(Self {
            name: name.into(),
            e_inf,
            wp,
            gamma,
            oscillators,
        })
    }

    /// Gold, Drude plus one Lorentz pole. The pole position and width follow
    /// Vial et al. (Phys. Rev. B 71, 085416); the remaining terms are tuned so
    /// that ε(2π/5 µm) = −1285.044 + 356.609i and ε(2π/1 µm) = −46.553 + 3.327i.
    pub fn gold() -> Self {
        let thz = |f: f64| 2.0 * PI * f / C_UM_THZ;
        Self {
            name: "gold_dl".to_string(),
            e_inf: 5.0095023,
            wp: thz(2224.46508),
            gamma: thz(16.4509203),
            oscillators: vec![LorentzOscillator {
                strength: 2.6443088,
                omega: thz(650.07),
                gamma: thz(104.86),
            }],
        }
    }
}

impl Permittivity for DrudeLorentz {
    fn name(&self) -> &str {
        &self.name
    }

    fn permittivity(&self, w: Complex64) -> Complex64 {
        let i = Complex64::i();
        let mut eps = Complex64::new(self.e_inf, 0.0) - self.wp * self.wp / (w * (w + i * self.gamma));
        for osc in &self.oscillators {
            eps -= osc.strength * osc.omega * osc.omega
                / (w * w - osc.omega * osc.omega + i * osc.gamma * w);
        }
        eps
    }
}

/// Material section of a configuration.
///
/// Accepts `{ RI = 1.5 }`, `{ e = 2.25 }` or `{ model = "..." }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaterialConfig {
    Index {
        #[serde(rename = "RI")]
        ri: f64,
    },
    Constant {
        e: f64,
        #[serde(default)]
        e_imag: f64,
    },
    Model(ModelConfig),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ModelConfig {
    Air,
    GoldDl,
    DrudeLorentz {
        name: String,
        e_inf: f64,
        wp: f64,
        gamma: f64,
        #[serde(default)]
        oscillators: Vec<LorentzOscillator>,
    },
}

impl MaterialConfig {
    pub fn build(&self) -> Result<Arc<dyn Permittivity>> {
        let material: Arc<dyn Permittivity> = match self {
            MaterialConfig::Index { ri } => Arc::new(Dielectric::from_index(*ri)?),
            MaterialConfig::Constant { e, e_imag } => {
                let eps = Complex64::new(*e, *e_imag);
                let name = if *e_imag == 0.0 {
                    format!("e_{}", e)
                } else {
                    format!("e_{}_{}", e, e_imag)
                };
                Arc::new(Dielectric::new(name, eps)?)
            }
            MaterialConfig::Model(ModelConfig::Air) => Arc::new(Dielectric::air()),
            MaterialConfig::Model(ModelConfig::GoldDl) => Arc::new(DrudeLorentz::gold()),
            MaterialConfig::Model(ModelConfig::DrudeLorentz {
                name,
                e_inf,
                wp,
                gamma,
                oscillators,
            }) => Arc::new(DrudeLorentz::new(
                name.clone(),
                *e_inf,
                *wp,
                *gamma,
                oscillators.clone(),
            )?),
        };
        Ok(material)
    }
}
