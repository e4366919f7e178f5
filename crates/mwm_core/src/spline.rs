//! Natural cubic splines in one and two dimensions.

use nalgebra::DMatrix;

use crate::error::{invalid, Result};

/// A natural cubic spline through `(x_i, y_i)` with continuous first and
/// second derivatives.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Second derivatives at each knot.
    y2s: Vec<f64>,
}

impl CubicSpline {
    /// `xs` must be strictly increasing, with at least two points.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self> {
        check_knots(&xs)?;
        if xs.len() != ys.len() {
            return Err(invalid(format!(
                "spline has {} knots but {} values",
                xs.len(),
                ys.len()
            )));
        }
        if ys.iter().any(|y| !y.is_finite()) {
            return Err(invalid("spline values must be finite"));
        }
        let y2s = second_derivatives(&xs, &ys);
        Ok(Self { xs, ys, y2s })
    }

    /// Evaluates the spline at `x`. Outside the knots the boundary cubic
    /// is continued; callers that must not extrapolate check the range first.
    pub fn evaluate(&self, x: f64) -> f64 {
        evaluate(&self.xs, &self.ys, &self.y2s, x)
    }
}

fn check_knots(xs: &[f64]) -> Result<()> {
    if xs.len() < 2 {
        return Err(invalid("spline needs at least 2 knots"));
    }
    if let Some(i) = (1..xs.len()).find(|&i| !(xs[i] > xs[i - 1])) {
        return Err(invalid(format!("spline knots must be strictly increasing at index {}", i)));
    }
    Ok(())
}

/// Tridiagonal solve for the natural-spline second derivatives.
fn second_derivatives(xs: &[f64], ys: &[f64]) -> Vec<f64> {
    let n = xs.len();
    let mut y2s = vec![0.0; n];
    let mut u = vec![0.0; n - 1];

    for i in 1..n - 1 {
        let sig = (xs[i] - xs[i - 1]) / (xs[i + 1] - xs[i - 1]);
        let p = sig * y2s[i - 1] + 2.0;
        y2s[i] = (sig - 1.0) / p;
        u[i] = (ys[i + 1] - ys[i]) / (xs[i + 1] - xs[i]) - (ys[i] - ys[i - 1]) / (xs[i] - xs[i - 1]);
        u[i] = (6.0 * u[i] / (xs[i + 1] - xs[i - 1]) - sig * u[i - 1]) / p;
    }

    for k in (0..n - 2).rev() {
        y2s[k + 1] = y2s[k + 1] * y2s[k + 2] + u[k + 1];
    }
    y2s
}

fn evaluate(xs: &[f64], ys: &[f64], y2s: &[f64], x: f64) -> f64 {
    let (lo, hi) = bracket(xs, x);
    let h = xs[hi] - xs[lo];
    let a = (xs[hi] - x) / h;
    let b = (x - xs[lo]) / h;

    a * ys[lo] + b * ys[hi] + ((a * a * a - a) * y2s[lo] + (b * b * b - b) * y2s[hi]) * h * h / 6.0
}

/// Indices of the knot interval containing `x` (clamped to the end intervals).
pub(crate) fn bracket(xs: &[f64], x: f64) -> (usize, usize) {
    let mut lo = 0;
    let mut hi = xs.len() - 1;
    while hi - lo > 1 {
        let mid = (lo + hi) / 2;
        if xs[mid] > x {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    (lo, hi)
}

/// Tensor-product natural cubic spline on a rectangular grid.
///
/// `values[(i, j)]` is the sample at `(xs[j], ys[i])`. Row splines along `x`
/// are precomputed; a query builds one spline along `y` through the row
/// splines evaluated at `x`.
#[derive(Debug, Clone)]
pub struct BicubicSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// One spline along `x` per `ys` entry.
    rows: Vec<CubicSpline>,
}

impl BicubicSpline {
    pub fn new(xs: Vec<f64>, ys: Vec<f64>, values: DMatrix<f64>) -> Result<Self> {
        check_knots(&xs)?;
        check_knots(&ys)?;
        if values.shape() != (ys.len(), xs.len()) {
            return Err(invalid(format!(
                "spline table has shape {:?}, expected {:?}",
                values.shape(),
                (ys.len(), xs.len())
            )));
        }

        let rows = values
            .row_iter()
            .map(|row| CubicSpline::new(xs.clone(), row.iter().copied().collect()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { xs, ys, rows })
    }

    pub fn xs(&self) -> &[f64] {
        &self.xs
    }

    pub fn ys(&self) -> &[f64] {
        &self.ys
    }

    pub fn evaluate(&self, x: f64, y: f64) -> f64 {
        let column: Vec<f64> = self.rows.iter().map(|row| row.evaluate(x)).collect();
        let column_y2s = second_derivatives(&self.ys, &column);
        evaluate(&self.ys, &column, &column_y2s, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spline_passes_through_data_points() {
        let xs = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let ys = vec![2.0, 3.0, 5.0, 4.0, 1.0];
        let spline = CubicSpline::new(xs.clone(), ys.clone()).unwrap();

        for (x, y) in xs.iter().zip(ys.iter()) {
            let result = spline.evaluate(*x);
            assert!((result - y).abs() < 1e-10, "Spline({}) = {} but expected {}", x, result, y);
        }
    }

    #[test]
    fn test_spline_reproduces_linear_data_exactly() {
        let xs: Vec<f64> = (0..7).map(|i| 0.5 * i as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 3.0 * x - 1.0).collect();
        let spline = CubicSpline::new(xs, ys).unwrap();
        for x in [0.1, 0.75, 1.3, 2.9] {
            assert!((spline.evaluate(x) - (3.0 * x - 1.0)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_two_point_spline_is_a_line() {
        let spline = CubicSpline::new(vec![0.0, 2.0], vec![1.0, 5.0]).unwrap();
        assert!((spline.evaluate(0.5) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_spline_rejects_bad_knots() {
        assert!(CubicSpline::new(vec![1.0], vec![1.0]).is_err());
        assert!(CubicSpline::new(vec![1.0, 1.0], vec![1.0, 2.0]).is_err());
        assert!(CubicSpline::new(vec![1.0, 2.0], vec![1.0]).is_err());
        assert!(CubicSpline::new(vec![1.0, 2.0], vec![1.0, f64::NAN]).is_err());
    }

    #[test]
    fn test_bicubic_hits_nodes_and_bilinear_surfaces() {
        let xs: Vec<f64> = (0..6).map(|j| 1.0 + 0.25 * j as f64).collect();
        let ys: Vec<f64> = (0..4).map(|i| -0.75 + 0.25 * i as f64).collect();
        let f = |x: f64, y: f64| 2.0 * x - 3.0 * y + 0.5 * x * y;
        let values = DMatrix::from_fn(ys.len(), xs.len(), |i, j| f(xs[j], ys[i]));
        let spline = BicubicSpline::new(xs.clone(), ys.clone(), values).unwrap();

        for (i, y) in ys.iter().enumerate() {
            for (j, x) in xs.iter().enumerate() {
                assert!((spline.evaluate(*x, *y) - f(xs[j], ys[i])).abs() < 1e-12);
            }
        }
        for &(x, y) in &[(1.1, -0.6), (1.9, -0.05), (2.2, -0.4)] {
            let got = spline.evaluate(x, y);
            assert!((got - f(x, y)).abs() < 1e-12, "f({}, {}) = {}, got {}", x, y, f(x, y), got);
        }
    }

    #[test]
    fn test_bicubic_rejects_wrong_table_shape() {
        let values = DMatrix::zeros(3, 2);
        assert!(BicubicSpline::new(vec![0.0, 1.0, 2.0], vec![0.0, 1.0], values).is_err());
    }

    #[test]
    fn test_bicubic_rejects_non_finite_values() {
        let mut values = DMatrix::zeros(2, 3);
        values[(1, 2)] = f64::INFINITY;
        assert!(BicubicSpline::new(vec![0.0, 1.0, 2.0], vec![0.0, 1.0], values).is_err());
    }

    #[test]
    fn test_bicubic_matches_row_spline_on_a_row() {
        let xs = vec![0.0, 0.5, 1.0, 1.5, 2.0];
        let ys = vec![-1.0, 0.0];
        let top = vec![1.0, 0.2, -0.4, 0.9, 2.0];
        let values = DMatrix::from_fn(2, 5, |i, j| if i == 1 { top[j] } else { 0.0 });
        let surface = BicubicSpline::new(xs.clone(), ys, values).unwrap();
        let row = CubicSpline::new(xs, top).unwrap();
        for x in [0.1, 0.7, 1.2, 1.9] {
            assert!((surface.evaluate(x, 0.0) - row.evaluate(x)).abs() < 1e-12);
        }
    }
}
