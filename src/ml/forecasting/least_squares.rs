//! Polynomial least-squares fitting through the normal equations.
//!
//! `(VᵗV) c = Vᵗy` is solved by inverting the `(degree + 1)²` normal matrix
//! with Gauss-Jordan elimination. When the matrix is singular the fit falls
//! back to closed-form simple linear regression.

use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::errors::ForecastError;

pub const DEFAULT_DEGREE: usize = 1;

/// Pivots smaller than this fraction of the largest diagonal entry of the
/// normal matrix are treated as zero.
pub const PIVOT_TOLERANCE: f64 = 1e-12;

/// Which path produced a fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum FitMethod {
    NormalEquations,
    SimpleRegressionFallback,
}

/// Fitted polynomial, coefficients lowest degree first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FitResult {
    pub coefficients: Vec<f64>,
    pub degree: usize,
    pub method: FitMethod,
}

impl FitResult {
    /// Evaluates the polynomial at `x` (Horner's scheme).
    pub fn evaluate(&self, x: f64) -> f64 {
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, coefficient| acc * x + coefficient)
    }

    pub fn intercept(&self) -> f64 {
        self.coefficients.first().copied().unwrap_or(0.0)
    }

    /// Linear coefficient; zero for a constant fit.
    pub fn slope(&self) -> f64 {
        self.coefficients.get(1).copied().unwrap_or(0.0)
    }

    pub fn used_fallback(&self) -> bool {
        self.method == FitMethod::SimpleRegressionFallback
    }
}

/// Fits a polynomial of `degree` to `(x, y)` points.
///
/// Needs at least two points. A singular normal matrix is not an error: the
/// result is then a degree-1 simple regression whatever `degree` asked for.
pub fn fit_polynomial(points: &[(f64, f64)], degree: usize) -> Result<FitResult, ForecastError> {
    if points.len() < 2 {
        return Err(ForecastError::InsufficientData {
            points: points.len(),
        });
    }

    match solve_normal_equations(points, degree) {
        Ok(coefficients) => Ok(FitResult {
            coefficients,
            degree,
            method: FitMethod::NormalEquations,
        }),
        Err(err) => {
            debug!(error = %err, degree, "falling back to simple linear regression");
            Ok(simple_linear_regression(points))
        }
    }
}

/// Solves the normal equations for the coefficients of a `degree` polynomial.
pub(crate) fn solve_normal_equations(
    points: &[(f64, f64)],
    degree: usize,
) -> Result<Vec<f64>, ForecastError> {
    let size = degree + 1;

    let distinct = distinct_x_count(points);
    if distinct < size {
        return Err(ForecastError::SingularFit(format!(
            "{} distinct x value(s) cannot determine a degree {} polynomial",
            distinct, degree
        )));
    }

    // power_sums[k] = Σ x^k for k in 0..=2·degree
    let mut power_sums = vec![0.0; 2 * degree + 1];
    let mut moments = vec![0.0; size];
    for &(x, y) in points {
        let mut power = 1.0;
        for (k, sum) in power_sums.iter_mut().enumerate() {
            *sum += power;
            if k < size {
                moments[k] += power * y;
            }
            power *= x;
        }
    }

    let normal: Vec<Vec<f64>> = (0..size)
        .map(|row| (0..size).map(|col| power_sums[row + col]).collect())
        .collect();
    let inverse = invert_matrix(&normal)?;

    let coefficients: Vec<f64> = inverse
        .iter()
        .map(|row| row.iter().zip(&moments).map(|(a, b)| a * b).sum::<f64>())
        .collect();

    if coefficients.iter().any(|c: &f64| !c.is_finite()) {
        return Err(ForecastError::SingularFit(
            "normal equations produced non-finite coefficients".to_string(),
        ));
    }

    Ok(coefficients)
}

/// Gauss-Jordan inversion with partial pivoting.
pub(crate) fn invert_matrix(matrix: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ForecastError> {
    let size = matrix.len();
    if size == 0 || matrix.iter().any(|row| row.len() != size) {
        return Err(ForecastError::SingularFit(
            "matrix is not square".to_string(),
        ));
    }

    let scale = (0..size)
        .map(|i| matrix[i][i].abs())
        .fold(0.0_f64, f64::max);
    if !scale.is_finite() || scale == 0.0 {
        return Err(ForecastError::SingularFit(format!(
            "normal matrix has degenerate diagonal (scale {})",
            scale
        )));
    }
    let threshold = scale * PIVOT_TOLERANCE;

    // Augmented [A | I]
    let mut rows: Vec<Vec<f64>> = matrix
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut augmented = row.clone();
            augmented.extend((0..size).map(|j| if i == j { 1.0 } else { 0.0 }));
            augmented
        })
        .collect();

    for col in 0..size {
        let pivot_row = (col..size)
            .max_by(|&a, &b| rows[a][col].abs().total_cmp(&rows[b][col].abs()))
            .unwrap_or(col);
        let pivot = rows[pivot_row][col];
        if !pivot.is_finite() || pivot.abs() < threshold {
            return Err(ForecastError::SingularFit(format!(
                "pivot {:e} in column {} is below tolerance {:e}",
                pivot, col, threshold
            )));
        }
        rows.swap(col, pivot_row);

        for value in rows[col].iter_mut() {
            *value /= pivot;
        }
        let normalized = rows[col].clone();
        for (r, row) in rows.iter_mut().enumerate() {
            if r == col {
                continue;
            }
            let factor = row[col];
            if factor != 0.0 {
                for (value, pivot_value) in row.iter_mut().zip(&normalized) {
                    *value -= factor * pivot_value;
                }
            }
        }
    }

    Ok(rows.into_iter().map(|row| row[size..].to_vec()).collect())
}

/// Closed-form ordinary least squares line.
pub fn simple_linear_regression(points: &[(f64, f64)]) -> FitResult {
    let n = points.len() as f64;
    let sum_x: f64 = points.iter().map(|p| p.0).sum();
    let sum_y: f64 = points.iter().map(|p| p.1).sum();
    let sum_xx: f64 = points.iter().map(|p| p.0 * p.0).sum();
    let sum_xy: f64 = points.iter().map(|p| p.0 * p.1).sum();

    let denominator = n * sum_xx - sum_x * sum_x;
    // All x equal: no slope information, predict the mean
    let slope = if denominator == 0.0 {
        0.0
    } else {
        (n * sum_xy - sum_x * sum_y) / denominator
    };
    let intercept = if n > 0.0 {
        (sum_y - slope * sum_x) / n
    } else {
        0.0
    };

    FitResult {
        coefficients: vec![intercept, slope],
        degree: 1,
        method: FitMethod::SimpleRegressionFallback,
    }
}

fn distinct_x_count(points: &[(f64, f64)]) -> usize {
    let mut xs: Vec<f64> = points.iter().map(|p| p.0).collect();
    xs.sort_by(f64::total_cmp);
    xs.dedup();
    xs.len()
}
