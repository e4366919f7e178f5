//! The sampling engine: owns one configuration's frequency grid and drives
//! sweeps, caching and interpolation for it.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use log::info;
use num_complex::Complex64;

use crate::cache::{self, cache_key, CacheLookup, CacheStore};
use crate::config::{ModesConfig, WaveguideConfig};
use crate::continuation::SweepContext;
use crate::dispatch::{merge_outcomes, SweepExecutor, SweepOutcome, SweepTask};
use crate::equation::{ModeEquation, PLACEHOLDER_BETA2};
use crate::error::Result;
use crate::grid::FrequencyGrid;
use crate::interpolation::{interpolate, BetaFuncs, InterpolationBounds};
use crate::material::Permittivity;
use crate::solver::{NewtonSettings, RootOutcome};
use crate::types::{ModeLabel, Polarization, SampleSet};

/// Propagation constant from its square.
///
/// Takes the principal root and flips its sign so the dominant component
/// is positive: forward propagation for guided modes, forward decay past
/// cutoff.
pub fn beta_from_beta2(h2: Complex64) -> Complex64 {
    let beta = h2.sqrt();
    let dominant = if beta.re.abs() > beta.im.abs() {
        beta.re
    } else {
        beta.im
    };
    if dominant < 0.0 {
        -beta
    } else {
        beta
    }
}

/// Where a sample set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Cache,
    Computed,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Cache => write!(f, "cache"),
            Provenance::Computed => write!(f, "computed"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Samples {
    equation: Arc<dyn ModeEquation>,
    fill: Arc<dyn Permittivity>,
    clad: Arc<dyn Permittivity>,
    grid: Arc<FrequencyGrid>,
    num_n: u32,
    num_m: u32,
    settings: NewtonSettings,
    key: String,
}

impl Samples {
    pub fn new(
        equation: Arc<dyn ModeEquation>,
        fill: Arc<dyn Permittivity>,
        clad: Arc<dyn Permittivity>,
        modes: &ModesConfig,
    ) -> Result<Self> {
        modes.validate()?;
        let grid = Arc::new(modes.frequency_grid()?);
        let key = cache_key(equation.shape(), equation.size(), fill.name(), clad.name());
        Ok(Self {
            equation,
            fill,
            clad,
            grid,
            num_n: modes.num_n,
            num_m: modes.num_m,
            settings: modes.newton,
            key,
        })
    }

    pub fn from_config(config: &WaveguideConfig) -> Result<Self> {
        config.validate()?;
        let equation = config.core.shape.equation(config.core.size)?;
        let fill = config.core.fill.build()?;
        let clad = config.clad.build()?;
        Self::new(equation, fill, clad, &config.modes)
    }

    fn context(&self) -> SweepContext<'_> {
        SweepContext {
            equation: self.equation.as_ref(),
            fill: self.fill.as_ref(),
            clad: self.clad.as_ref(),
            grid: self.grid.as_ref(),
            settings: self.settings,
        }
    }

    pub fn grid(&self) -> &FrequencyGrid {
        &self.grid
    }

    pub fn ws(&self) -> &[f64] {
        self.grid.ws()
    }

    pub fn wis(&self) -> &[f64] {
        self.grid.wis()
    }

    /// Cache key of this configuration.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Every label a full computation produces.
    pub fn labels(&self) -> Vec<ModeLabel> {
        self.tasks().iter().flat_map(|task| task.labels()).collect()
    }

    /// Perfect-conductor squared propagation constant of order `n` at `w`.
    pub fn beta2_pec(&self, w: Complex64, n: u32) -> Result<Complex64> {
        let e1 = self.fill.permittivity(w);
        self.equation.pec_beta2(w, ModeLabel::new(Polarization::M, n, 1), e1)
    }

    /// Roots for every transverse order of `pol` at the first real frequency,
    /// seeded from the perfect-conductor values.
    pub fn beta2_wmin(&self, pol: Polarization) -> Result<Vec<RootOutcome>> {
        let ctx = self.context();
        let w = self.grid.point(0, 0);
        (0..self.num_n)
            .map(|n| {
                let label = ModeLabel::new(pol, n, 1);
                if !self.equation.supports(label) {
                    return Ok(RootOutcome {
                        root: PLACEHOLDER_BETA2,
                        converged: false,
                        residual_norm: f64::NAN,
                        iterations: 0,
                    });
                }
                ctx.solve_point(label, w, ctx.seed(label)?)
            })
            .collect()
    }

    /// Single root search at complex frequency `w`.
    pub fn solve(&self, label: ModeLabel, w: Complex64, guess: Complex64) -> Result<RootOutcome> {
        self.context().solve_point(label, w, guess)
    }

    fn task(&self, pol: Polarization, n: u32) -> SweepTask {
        SweepTask::new(
            pol,
            n,
            self.num_m,
            self.equation.clone(),
            self.fill.clone(),
            self.clad.clone(),
            self.grid.clone(),
            self.settings,
        )
    }

    /// Full sweep of all radial orders for `(pol, n)` on the calling thread.
    pub fn sweep(&self, pol: Polarization, n: u32) -> Result<SweepOutcome> {
        self.task(pol, n).run()
    }

    /// Independent units of work, one per `(polarization, n)`.
    pub fn tasks(&self) -> Vec<SweepTask> {
        Polarization::ALL
            .iter()
            .flat_map(|&pol| (0..self.num_n).map(move |n| (pol, n)))
            .map(|(pol, n)| self.task(pol, n))
            .collect()
    }

    /// Merges sweep completions and converts `beta²` to `beta`.
    pub fn betas_convs(&self, tasks: &[SweepTask], results: Vec<Result<SweepOutcome>>) -> Result<SampleSet> {
        let merged = merge_outcomes(tasks, results, self.grid.shape())?;
        let mut set = SampleSet::default();
        for (label, grid) in merged {
            set.betas.insert(label, grid.values.map(beta_from_beta2));
            set.convs.insert(label, grid.converged);
        }
        Ok(set)
    }

    pub fn compute(&self, executor: &dyn SweepExecutor) -> Result<SampleSet> {
        let tasks = self.tasks();
        let (rows, cols) = self.grid.shape();
        info!(
            "{}: sweeping {} units on a {}x{} grid",
            self.key,
            tasks.len(),
            rows,
            cols
        );
        let started = Instant::now();
        let results = executor.execute(&tasks);
        let set = self.betas_convs(&tasks, results)?;
        let total: usize = set.convs.values().map(|c| c.len()).sum();
        let converged: usize = set.convs.values().map(|c| c.iter().filter(|&&ok| ok).count()).sum();
        info!(
            "{}: {} of {} samples converged in {:.2?}",
            self.key,
            converged,
            total,
            started.elapsed()
        );
        Ok(set)
    }

    pub fn load(&self, store: &dyn CacheStore) -> Result<CacheLookup> {
        cache::load(store, &self.key, &self.grid)
    }

    pub fn save(&self, store: &dyn CacheStore, set: &SampleSet) -> Result<()> {
        cache::save(store, &self.key, &self.grid, set)
    }

    /// Loads the cached set, or computes and stores it when the entry is
    /// missing, stale or unreadable.
    pub fn compute_or_load(
        &self,
        store: &dyn CacheStore,
        executor: &dyn SweepExecutor,
    ) -> Result<(SampleSet, Provenance)> {
        if let CacheLookup::Found(set) = self.load(store)? {
            return Ok((set, Provenance::Cache));
        }
        let set = self.compute(executor)?;
        self.save(store, &set)?;
        Ok((set, Provenance::Computed))
    }

    pub fn interpolation(&self, set: &SampleSet, bounds: &InterpolationBounds) -> Result<BetaFuncs> {
        interpolate(&self.grid, set, bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::dispatch::Sequential;
    use crate::material::Dielectric;
    use crate::slit::Slit;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn samples(num_n: u32) -> Samples {
        let modes = ModesConfig {
            num_n,
            lmax: 2.0,
            lmin: 1.0,
            limag: 10.0,
            dw: 1.0 / 16.0,
            ..ModesConfig::default()
        };
        Samples::new(
            Arc::new(Slit::new(0.3).unwrap()),
            Arc::new(Dielectric::air()),
            Arc::new(Dielectric::new("pec_like", Complex64::new(-1e6, 100.0)).unwrap()),
            &modes,
        )
        .unwrap()
    }

    #[derive(Debug, Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    impl SweepExecutor for Counting {
        fn execute(&self, tasks: &[SweepTask]) -> Vec<Result<SweepOutcome>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Sequential.execute(tasks)
        }
    }

    #[test]
    fn test_beta_from_beta2_picks_forward_branch() {
        for beta in [
            Complex64::new(1.33761261, 0.01156405),
            Complex64::new(-8.73807985e-4, 41.86642304),
        ] {
            let got = beta_from_beta2(beta * beta);
            assert!((got - beta).norm() < 1e-12 * beta.norm(), "expected {}, got {}", beta, got);
        }
        let placeholder = beta_from_beta2(Complex64::new(0.01, 0.0));
        assert!((placeholder - Complex64::new(0.1, 0.0)).norm() < 1e-15);
    }

    #[test]
    fn test_key_and_labels() {
        let s = samples(2);
        assert_eq!(s.key(), "slit_size_0.3_core_air_clad_pec_like");
        assert_eq!(s.tasks().len(), 4);
        assert_eq!(
            s.labels(),
            vec![
                ModeLabel::new(Polarization::M, 0, 1),
                ModeLabel::new(Polarization::M, 1, 1),
                ModeLabel::new(Polarization::E, 0, 1),
                ModeLabel::new(Polarization::E, 1, 1),
            ]
        );
        assert_eq!(s.ws()[0], 3.125);
        assert_eq!(s.wis().len(), 12);
    }

    #[test]
    fn test_beta2_pec_matches_closed_form() {
        let s = samples(3);
        let w = Complex64::new(4.0, -0.25);
        for n in 0..3 {
            let k = n as f64 * std::f64::consts::PI / 0.3;
            let expected = w * w - k * k;
            assert!((s.beta2_pec(w, n).unwrap() - expected).norm() < 1e-12 * expected.norm().max(1.0));
        }
    }

    #[test]
    fn test_beta2_wmin_near_pec() {
        let s = samples(3);
        let w = s.grid().point(0, 0);
        let outcomes = s.beta2_wmin(Polarization::M).unwrap();
        assert_eq!(outcomes.len(), 3);
        for (n, outcome) in outcomes.iter().enumerate() {
            assert!(outcome.converged);
            let pec = s.beta2_pec(w, n as u32).unwrap();
            assert!((outcome.root - pec).norm() < 0.05 * pec.norm());
        }
        let e = s.beta2_wmin(Polarization::E).unwrap();
        assert!(!e[0].converged);
        assert_eq!(e[0].root, PLACEHOLDER_BETA2);
    }

    #[test]
    fn test_gold_slit_roots_at_wmin() {
        let s = Samples::new(
            Arc::new(Slit::new(0.3).unwrap()),
            Arc::new(Dielectric::air()),
            Arc::new(crate::material::DrudeLorentz::gold()),
            &ModesConfig::default(),
        )
        .unwrap();
        assert_eq!(s.key(), "slit_size_0.3_core_air_clad_gold_dl");
        assert_eq!(s.ws()[0], 1.25);

        let tm = [
            Complex64::new(1.33761261, 0.01156405),
            Complex64::new(0.00274425, 10.37584126),
            Complex64::new(0.00097855, 20.89689765),
            Complex64::new(1.15739193e-4, 31.38561413),
            Complex64::new(-8.73807985e-4, 41.86642304),
            Complex64::new(-2.39724110e-3, 52.34332833),
        ];
        let te = [
            Complex64::new(0.1, 0.0),
            Complex64::new(0.16144428, 9.05251986),
            Complex64::new(0.33827986, 18.18637903),
            Complex64::new(0.56259232, 27.18042727),
            Complex64::new(0.911172765, 35.94543976),
            Complex64::new(1.73210379, 44.29031772),
        ];
        for (pol, expected) in [(Polarization::M, tm), (Polarization::E, te)] {
            let outcomes = s.beta2_wmin(pol).unwrap();
            assert_eq!(outcomes.len(), 6);
            for (n, (outcome, beta)) in outcomes.iter().zip(expected.iter()).enumerate() {
                let want = beta * beta;
                assert!(
                    (outcome.root - want).norm() < 1e-6 * want.norm(),
                    "({}, {}): beta² = {}, expected {}",
                    pol,
                    n,
                    outcome.root,
                    want
                );
            }
        }

        // Gap plasmon: slower than light and lossy.
        let m0 = beta_from_beta2(s.beta2_wmin(Polarization::M).unwrap()[0].root);
        assert!(m0.re > 1.25 && m0.im > 0.0, "unexpected beta {}", m0);
    }

    #[test]
    fn test_compute_or_load_is_idempotent() {
        let s = samples(2);
        let store = MemoryStore::new();
        let executor = Counting::default();

        let (first, from) = s.compute_or_load(&store, &executor).unwrap();
        assert_eq!(from, Provenance::Computed);
        let (second, from) = s.compute_or_load(&store, &executor).unwrap();
        assert_eq!(from, Provenance::Cache);
        assert_eq!(first, second);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);

        let m0 = ModeLabel::new(Polarization::M, 0, 1);
        let beta = first.betas[&m0][(0, 0)];
        assert!(beta.re > 0.0 && beta.im.abs() < 0.01 * beta.re, "unexpected branch {}", beta);
        let e0 = ModeLabel::new(Polarization::E, 0, 1);
        assert!(first.convs[&e0].iter().all(|&ok| !ok));
    }

    #[test]
    fn test_stale_entry_is_recomputed_and_overwritten() {
        let s = samples(1);
        let store = MemoryStore::new();
        let other = FrequencyGrid::new(2.0, 1.0, 10.0, 1.0 / 8.0).unwrap();
        cache::save(&store, s.key(), &other, &SampleSet::default()).unwrap();
        assert!(matches!(s.load(&store).unwrap(), CacheLookup::Mismatch { .. }));

        let executor = Counting::default();
        let (set, from) = s.compute_or_load(&store, &executor).unwrap();
        assert_eq!(from, Provenance::Computed);
        assert_eq!(s.load(&store).unwrap(), CacheLookup::Found(set));
    }

    #[test]
    fn test_sweep_single_unit() {
        let s = samples(2);
        let outcome = s.sweep(Polarization::M, 1).unwrap();
        assert_eq!(outcome.grids.len(), 1);
        let (label, grid) = &outcome.grids[0];
        assert_eq!(*label, ModeLabel::new(Polarization::M, 1, 1));
        assert_eq!(grid.shape(), s.grid().shape());
    }
}
