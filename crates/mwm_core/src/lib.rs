//! `mwm_core` computes, caches and interpolates the complex propagation
//! constants of metallic waveguide modes over a grid of complex angular
//! frequencies.
//!
//! Key components:
//! - **Grid**: `ws`/`wis` frequency axes derived from wavelength bounds.
//! - **Equation**: `ModeEquation`, the shape-specific dispersion relation (`Slit`).
//! - **Solver**: damped Newton search for complex roots, with convergence flags.
//! - **Continuation**: row-then-column root tracking across the grid.
//! - **Dispatch**: independent `(polarization, n)` sweeps on a worker pool.
//! - **Cache**: keyed, atomic persistence of merged sample sets.
//! - **Interpolation**: bicubic splines with explicit handling of non-converged samples.
//! - **Samples**: the engine tying these together for one configuration.
pub mod cache;
pub mod config;
pub mod continuation;
pub mod dispatch;
pub mod equation;
pub mod error;
pub mod grid;
pub mod interpolation;
pub mod material;
pub mod pec;
pub mod samples;
pub mod slit;
pub mod solver;
pub mod spline;
pub mod types;

pub use cache::{cache_key, CacheLookup, CacheStore, FileStore, MemoryStore};
pub use config::{ModesConfig, Shape, WaveguideConfig};
pub use dispatch::{Sequential, SweepExecutor, ThreadPool};
pub use error::{Error, Result};
pub use grid::FrequencyGrid;
pub use interpolation::{BetaFuncs, DispersionFunction, InterpolationBounds, SampleQuality};
pub use material::{MaterialConfig, Permittivity};
pub use samples::{beta_from_beta2, Provenance, Samples};
pub use types::{Component, ModeLabel, Polarization, SampleGrid, SampleSet};
