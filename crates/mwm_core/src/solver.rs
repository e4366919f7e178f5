use nalgebra::{Matrix2, Vector2};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{invalid, Result};

/// Halvings attempted before a Newton step is rejected.
const MAX_BACKTRACK: usize = 12;

/// Relative size of the rounding noise in a residual evaluation.
const ROUNDING_NOISE: f64 = 1e-13;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewtonSettings {
    pub max_steps: usize,
    pub damping: f64,
    /// Residual norm accepted as a root.
    pub tolerance: f64,
    /// Relative Newton step accepted as a root.
    pub step_tolerance: f64,
}

impl Default for NewtonSettings {
    fn default() -> Self {
        Self {
            max_steps: 50,
            damping: 1.0,
            tolerance: 1e-12,
            step_tolerance: 1e-10,
        }
    }
}

impl NewtonSettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(invalid("max_steps must be greater than zero."));
        }
        if !(self.damping > 0.0 && self.damping <= 1.0) {
            return Err(invalid("damping must lie in (0, 1]."));
        }
        if !(self.tolerance > 0.0) || !(self.step_tolerance > 0.0) {
            return Err(invalid("tolerances must be positive."));
        }
        Ok(())
    }
}

/// Result of one root search. `root` is the best estimate found even when
/// `converged` is false.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootOutcome {
    pub root: Complex64,
    pub converged: bool,
    pub residual_norm: f64,
    pub iterations: usize,
}

/// Damped Newton iteration for a complex root of `f` near `initial_guess`.
///
/// `f` is treated as a map of two real unknowns, so it need not be analytic.
/// Running out of steps is not an error; only invalid settings or a
/// non-finite guess are.
pub fn solve_root<F>(f: F, initial_guess: Complex64, settings: NewtonSettings) -> Result<RootOutcome>
where
    F: Fn(Complex64) -> Complex64,
{
    settings.validate()?;
    if !is_finite(initial_guess) {
        return Err(invalid(format!("initial guess must be finite, got {}", initial_guess)));
    }

    let mut x = initial_guess;
    let mut fx = f(x);
    if !is_finite(fx) {
        return Ok(RootOutcome {
            root: x,
            converged: false,
            residual_norm: f64::INFINITY,
            iterations: 0,
        });
    }
    let mut residual_norm = fx.norm();
    let mut iterations = 0usize;
    let mut converged = false;

    loop {
        if residual_norm <= settings.tolerance {
            converged = true;
            break;
        }
        if iterations >= settings.max_steps {
            break;
        }

        let jacobian = compute_jacobian(&f, x);
        let delta = match solve_linear_system(jacobian, fx) {
            Some(delta) => delta,
            None => break,
        };
        iterations += 1;

        // Newton has stalled below the resolution of x. That is a root only
        // if the residual is down at the rounding level of f near x.
        if delta.norm() <= settings.step_tolerance * x.norm().max(1.0) {
            let candidate = x - delta;
            let f_candidate = f(candidate);
            if is_finite(f_candidate) && f_candidate.norm() <= residual_norm {
                x = candidate;
                fx = f_candidate;
                residual_norm = fx.norm();
            }
            converged = residual_norm <= stalled_tolerance(&settings, &jacobian, x);
            break;
        }

        let mut lambda = settings.damping;
        let mut accepted = false;
        for _ in 0..MAX_BACKTRACK {
            let candidate = x - delta * lambda;
            let f_candidate = f(candidate);
            if is_finite(f_candidate) && f_candidate.norm() < residual_norm {
                x = candidate;
                fx = f_candidate;
                residual_norm = fx.norm();
                accepted = true;
                break;
            }
            lambda *= 0.5;
        }
        if !accepted {
            break;
        }
    }

    Ok(RootOutcome {
        root: x,
        converged,
        residual_norm,
        iterations,
    })
}

/// Residual accepted when Newton stalls: the configured tolerance, or the
/// rounding noise of `f` implied by the Jacobian scale, whichever is larger.
fn stalled_tolerance(settings: &NewtonSettings, jacobian: &Matrix2<f64>, x: Complex64) -> f64 {
    let noise = ROUNDING_NOISE * jacobian.norm() * x.norm().max(1.0);
    settings.tolerance.max(noise)
}

fn is_finite(z: Complex64) -> bool {
    z.re.is_finite() && z.im.is_finite()
}

/// Central-difference Jacobian of `(Re f, Im f)` with respect to `(Re x, Im x)`.
fn compute_jacobian<F>(f: &F, x: Complex64) -> Matrix2<f64>
where
    F: Fn(Complex64) -> Complex64,
{
    let h = 1e-7 * x.norm().max(1.0);
    let dx = Complex64::new(h, 0.0);
    let dy = Complex64::new(0.0, h);
    let d_re = (f(x + dx) - f(x - dx)) / (2.0 * h);
    let d_im = (f(x + dy) - f(x - dy)) / (2.0 * h);
    Matrix2::new(d_re.re, d_im.re, d_re.im, d_im.im)
}

fn solve_linear_system(jacobian: Matrix2<f64>, residual: Complex64) -> Option<Complex64> {
    if jacobian.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let rhs = Vector2::new(residual.re, residual.im);
    jacobian
        .lu()
        .solve(&rhs)
        .filter(|v| v.iter().all(|c| c.is_finite()))
        .map(|v| Complex64::new(v[0], v[1]))
}
