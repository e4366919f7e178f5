//! Parallel dispatch of independent continuation sweeps.
//!
//! A [`SweepTask`] carries everything one `(polarization, n)` unit needs and
//! shares nothing mutable with other tasks. Executors return one completion
//! per task, in task order; [`merge_outcomes`] folds them into a single
//! mapping or fails as a whole.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use log::debug;
use rayon::prelude::*;

use crate::continuation::SweepContext;
use crate::equation::ModeEquation;
use crate::error::{invalid, Error, Result};
use crate::grid::FrequencyGrid;
use crate::material::Permittivity;
use crate::solver::NewtonSettings;
use crate::types::{ModeLabel, Polarization, SampleGrid};

#[derive(Debug, Clone)]
pub struct SweepTask {
    pub pol: Polarization,
    pub n: u32,
    pub num_m: u32,
    equation: Arc<dyn ModeEquation>,
    fill: Arc<dyn Permittivity>,
    clad: Arc<dyn Permittivity>,
    grid: Arc<FrequencyGrid>,
    settings: NewtonSettings,
}

/// Squared propagation constants produced by one task.
#[derive(Debug, Clone)]
pub struct SweepOutcome {
    pub pol: Polarization,
    pub n: u32,
    pub grids: Vec<(ModeLabel, SampleGrid)>,
}

impl SweepTask {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pol: Polarization,
        n: u32,
        num_m: u32,
        equation: Arc<dyn ModeEquation>,
        fill: Arc<dyn Permittivity>,
        clad: Arc<dyn Permittivity>,
        grid: Arc<FrequencyGrid>,
        settings: NewtonSettings,
    ) -> Self {
        Self {
            pol,
            n,
            num_m,
            equation,
            fill,
            clad,
            grid,
            settings,
        }
    }

    pub fn unit_name(&self) -> String {
        format!("({}, {})", self.pol, self.n)
    }

    /// Labels this task is expected to produce.
    pub fn labels(&self) -> Vec<ModeLabel> {
        (1..=self.equation.radial_orders(self.num_m))
            .map(|m| ModeLabel::new(self.pol, self.n, m))
            .collect()
    }

    pub fn run(&self) -> Result<SweepOutcome> {
        let started = Instant::now();
        let ctx = SweepContext {
            equation: self.equation.as_ref(),
            fill: self.fill.as_ref(),
            clad: self.clad.as_ref(),
            grid: self.grid.as_ref(),
            settings: self.settings,
        };
        let grids = self
            .labels()
            .into_iter()
            .map(|label| ctx.sweep(label).map(|grid| (label, grid)))
            .collect::<Result<Vec<_>>>()?;
        debug!(
            "sweep {} finished in {:.2?}",
            self.unit_name(),
            started.elapsed()
        );
        Ok(SweepOutcome {
            pol: self.pol,
            n: self.n,
            grids,
        })
    }
}

/// Runs independent sweep tasks and returns one completion per task, in
/// the order given.
pub trait SweepExecutor {
    fn execute(&self, tasks: &[SweepTask]) -> Vec<Result<SweepOutcome>>;
}

/// Runs tasks one after another on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sequential;

impl SweepExecutor for Sequential {
    fn execute(&self, tasks: &[SweepTask]) -> Vec<Result<SweepOutcome>> {
        tasks.iter().map(run_guarded).collect()
    }
}

/// Fixed-size worker pool.
#[derive(Debug)]
pub struct ThreadPool {
    pool: rayon::ThreadPool,
}

impl ThreadPool {
    pub fn new(threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(invalid("worker pool needs at least one thread"));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("mwm-sweep-{}", i))
            .build()
            .map_err(|err| Error::Worker {
                unit: "pool".to_string(),
                message: err.to_string(),
            })?;
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl SweepExecutor for ThreadPool {
    fn execute(&self, tasks: &[SweepTask]) -> Vec<Result<SweepOutcome>> {
        self.pool
            .install(|| tasks.par_iter().map(run_guarded).collect())
    }
}

fn run_guarded(task: &SweepTask) -> Result<SweepOutcome> {
    catch_unwind(AssertUnwindSafe(|| task.run())).unwrap_or_else(|payload| {
        Err(Error::Worker {
            unit: task.unit_name(),
            message: panic_payload_to_string(payload),
        })
    })
}

fn panic_payload_to_string(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    "sweep panicked".to_string()
}

/// Merges per-task completions into one mapping.
///
/// Fails on the first failed unit, on a missing completion, on a label
/// produced twice or not at all, and on a grid of the wrong shape. Nothing
/// partial is ever returned.
pub fn merge_outcomes(
    tasks: &[SweepTask],
    results: Vec<Result<SweepOutcome>>,
    shape: (usize, usize),
) -> Result<BTreeMap<ModeLabel, SampleGrid>> {
    if results.len() != tasks.len() {
        return Err(Error::MissingResult(format!(
            "{} of {} sweep units reported",
            results.len(),
            tasks.len()
        )));
    }

    let mut merged = BTreeMap::new();
    for (task, result) in tasks.iter().zip(results) {
        let outcome = result?;
        if outcome.pol != task.pol || outcome.n != task.n {
            return Err(Error::MissingResult(format!(
                "unit {} answered for ({}, {})",
                task.unit_name(),
                outcome.pol,
                outcome.n
            )));
        }
        for (label, grid) in outcome.grids {
            if grid.shape() != shape {
                return Err(Error::Worker {
                    unit: task.unit_name(),
                    message: format!("grid for {} has shape {:?}, expected {:?}", label, grid.shape(), shape),
                });
            }
            if merged.insert(label, grid).is_some() {
                return Err(Error::DuplicateMode(label));
            }
        }
        for label in task.labels() {
            if !merged.contains_key(&label) {
                return Err(Error::MissingResult(format!("mode {}", label)));
            }
        }
    }
    Ok(merged)
}
