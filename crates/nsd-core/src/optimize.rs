//! Levenberg-Marquardt least squares
//!
//! Minimizes `‖r(x)‖²` for a residual function `r: Rⁿ → Rᵐ` with a
//! forward-difference Jacobian. The noise-model fits have parameters spread
//! over many orders of magnitude (a slope around 1e-9 next to an exponent
//! around 2), so the solver works on `u = x / s` with `s` taken from the
//! magnitude of the initial guess, and maps the solution and its covariance
//! back at the end.
//!
//! Each iteration solves `(JᵀJ + λ·diag(JᵀJ)) δ = -Jᵀr`. A step that lowers
//! the cost is accepted and λ shrinks by 10; otherwise λ grows by 10.
//!
//! | Stop condition                                   | [`Termination`] |
//! |--------------------------------------------------|-----------------|
//! | cost ≤ `cost_floor`                              | `CostFloor`     |
//! | `‖Jᵀr‖∞ ≤ g_tol`                                 | `Gradient`      |
//! | accepted step with relative reduction ≤ `f_tol`  | `Reduction`     |
//! | accepted step with `‖δ‖ ≤ x_tol·(‖u‖ + x_tol)`   | `Step`          |
//! | λ exceeds `max_damping`                          | `Stalled`       |
//!
//! Running out of iterations or hitting non-finite residuals is an error.

use tracing::{debug, trace};

use crate::types::{NsdError, NsdResult};

/// Smallest pivot accepted by the linear solve.
const PIVOT_FLOOR: f64 = 1e-300;

/// Options for [`leastsq`].
#[derive(Debug, Clone)]
pub struct LeastSquaresOptions {
    /// Maximum number of iterations
    pub max_iter: usize,
    /// Relative cost reduction treated as converged
    pub f_tol: f64,
    /// Relative step size treated as converged
    pub x_tol: f64,
    /// Gradient infinity norm treated as converged
    pub g_tol: f64,
    /// Absolute cost treated as an exact fit
    pub cost_floor: f64,
    /// Damping factor at which the search is abandoned as stalled
    pub max_damping: f64,
    /// Relative pivot size below which `JᵀJ` counts as singular
    pub singular_tol: f64,
}

impl Default for LeastSquaresOptions {
    fn default() -> Self {
        Self {
            max_iter: 500,
            f_tol: 1.49012e-8,
            x_tol: 1.49012e-8,
            g_tol: 1e-15,
            cost_floor: 1e-28,
            max_damping: 1e16,
            singular_tol: 1e-13,
        }
    }
}

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    CostFloor,
    Gradient,
    Reduction,
    Step,
    Stalled,
}

/// Result of a converged [`leastsq`] run.
#[derive(Debug, Clone)]
pub struct LeastSquaresResult {
    /// The optimal parameters found
    pub x: Vec<f64>,
    /// Residual vector at solution
    pub residuals: Vec<f64>,
    /// Sum of squared residuals (cost)
    pub cost: f64,
    /// Number of iterations
    pub iterations: usize,
    /// Number of residual evaluations
    pub nfev: usize,
    pub termination: Termination,
    /// Parameter covariance `inv(JᵀJ)·cost/(m−n)`, `None` when `JᵀJ` is
    /// singular at the solution or there are no degrees of freedom.
    pub covariance: Option<Vec<Vec<f64>>>,
}

/// Levenberg-Marquardt minimization of `‖f(x)‖²` starting from `x0`.
pub fn leastsq<F>(f: F, x0: &[f64], options: &LeastSquaresOptions) -> NsdResult<LeastSquaresResult>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let n = x0.len();
    if n == 0 {
        return Err(NsdError::FitConvergence(
            "empty initial guess".to_string(),
        ));
    }
    if x0.iter().any(|v| !v.is_finite()) {
        return Err(NsdError::FitConvergence(format!(
            "non-finite initial guess {:?}",
            x0
        )));
    }

    let scale: Vec<f64> = x0
        .iter()
        .map(|&v| if v == 0.0 { 1.0 } else { v.abs() })
        .collect();
    let scaled = |u: &[f64]| -> Vec<f64> {
        let x: Vec<f64> = u.iter().zip(&scale).map(|(u, s)| u * s).collect();
        f(&x)
    };

    let mut u: Vec<f64> = x0.iter().zip(&scale).map(|(x, s)| x / s).collect();
    let mut r = scaled(&u);
    let m = r.len();
    let mut nfev = 1;
    if m == 0 {
        return Err(NsdError::FitConvergence(
            "residual function returned no values".to_string(),
        ));
    }

    let mut cost = norm_squared(&r);
    let mut lambda = 1e-3;
    let mut outcome = None;

    for iter in 0..options.max_iter {
        if !cost.is_finite() {
            return Err(NsdError::FitConvergence(format!(
                "non-finite residuals at iteration {}",
                iter
            )));
        }
        if cost <= options.cost_floor {
            outcome = Some((Termination::CostFloor, iter));
            break;
        }

        let jacobian = finite_difference_jacobian(&scaled, &u, &r);
        nfev += n;
        let (jtj, jtr) = normal_equations(&jacobian, &r);

        if norm_inf(&jtr) <= options.g_tol {
            outcome = Some((Termination::Gradient, iter));
            break;
        }

        let mut damped = jtj.clone();
        for i in 0..n {
            damped[i][i] += lambda * jtj[i][i].max(1e-12);
        }
        let neg_jtr: Vec<f64> = jtr.iter().map(|v| -v).collect();
        let Some(step) = solve_linear_system(&damped, &neg_jtr) else {
            lambda *= 10.0;
            continue;
        };

        let u_new: Vec<f64> = u.iter().zip(&step).map(|(a, b)| a + b).collect();
        let r_new = scaled(&u_new);
        nfev += 1;
        let cost_new = norm_squared(&r_new);

        if cost_new < cost {
            let reduction = (cost - cost_new) / cost;
            let step_norm = norm(&step);
            let u_norm = norm(&u_new);
            u = u_new;
            r = r_new;
            cost = cost_new;
            lambda = (lambda * 0.1).max(1e-12);
            trace!(iter, cost, lambda, "accepted step");

            if reduction <= options.f_tol {
                outcome = Some((Termination::Reduction, iter + 1));
                break;
            }
            if step_norm <= options.x_tol * (u_norm + options.x_tol) {
                outcome = Some((Termination::Step, iter + 1));
                break;
            }
        } else {
            lambda *= 10.0;
            if lambda > options.max_damping {
                outcome = Some((Termination::Stalled, iter + 1));
                break;
            }
        }
    }

    let Some((termination, iterations)) = outcome else {
        return Err(NsdError::FitConvergence(format!(
            "no convergence after {} iterations (cost {:e})",
            options.max_iter, cost
        )));
    };

    let covariance = if m > n {
        let jacobian = finite_difference_jacobian(&scaled, &u, &r);
        nfev += n;
        let (jtj, _) = normal_equations(&jacobian, &r);
        invert(&jtj, options.singular_tol).map(|inv| {
            let variance = cost / (m - n) as f64;
            (0..n)
                .map(|i| {
                    (0..n)
                        .map(|j| inv[i][j] * variance * scale[i] * scale[j])
                        .collect()
                })
                .collect()
        })
    } else {
        None
    };

    let x: Vec<f64> = u.iter().zip(&scale).map(|(u, s)| u * s).collect();
    debug!(
        ?termination,
        iterations,
        nfev,
        cost,
        singular = covariance.is_none(),
        "least squares finished"
    );

    Ok(LeastSquaresResult {
        x,
        residuals: r,
        cost,
        iterations,
        nfev,
        termination,
        covariance,
    })
}

fn norm(v: &[f64]) -> f64 {
    norm_squared(v).sqrt()
}

fn norm_squared(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum()
}

fn norm_inf(v: &[f64]) -> f64 {
    v.iter().fold(0.0, |acc, x| acc.max(x.abs()))
}

/// Forward differences with step `√ε·max(|x_j|, 1)`.
fn finite_difference_jacobian<F>(f: &F, x: &[f64], fx: &[f64]) -> Vec<Vec<f64>>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let m = fx.len();
    let n = x.len();
    let mut jacobian = vec![vec![0.0; n]; m];
    let mut probe = x.to_vec();
    for j in 0..n {
        let h = f64::EPSILON.sqrt() * x[j].abs().max(1.0);
        probe[j] = x[j] + h;
        let shifted = f(&probe);
        probe[j] = x[j];
        for (row, (a, b)) in jacobian.iter_mut().zip(shifted.iter().zip(fx)) {
            row[j] = (a - b) / h;
        }
    }
    jacobian
}

/// `(JᵀJ, Jᵀr)`.
fn normal_equations(jacobian: &[Vec<f64>], r: &[f64]) -> (Vec<Vec<f64>>, Vec<f64>) {
    let n = jacobian.first().map_or(0, |row| row.len());
    let mut jtj = vec![vec![0.0; n]; n];
    let mut jtr = vec![0.0; n];
    for (row, &ri) in jacobian.iter().zip(r) {
        for i in 0..n {
            jtr[i] += row[i] * ri;
            for j in 0..n {
                jtj[i][j] += row[i] * row[j];
            }
        }
    }
    (jtj, jtr)
}

/// Gaussian elimination with partial pivoting.
fn solve_linear_system(a: &[Vec<f64>], b: &[f64]) -> Option<Vec<f64>> {
    let n = b.len();
    let mut m: Vec<Vec<f64>> = a
        .iter()
        .zip(b)
        .map(|(row, &bi)| {
            let mut row = row.clone();
            row.push(bi);
            row
        })
        .collect();

    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| m[i][col].abs().total_cmp(&m[j][col].abs()))?;
        if !(m[pivot][col].abs() >= PIVOT_FLOOR) {
            return None;
        }
        m.swap(col, pivot);
        for row in col + 1..n {
            let factor = m[row][col] / m[col][col];
            for k in col..=n {
                m[row][k] -= factor * m[col][k];
            }
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| m[row][k] * x[k]).sum();
        x[row] = (m[row][n] - tail) / m[row][row];
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}

/// Gauss-Jordan inverse; `None` when a pivot falls below
/// `tol · max|diag(a)|`.
fn invert(a: &[Vec<f64>], tol: f64) -> Option<Vec<Vec<f64>>> {
    let n = a.len();
    let threshold = tol * a.iter().enumerate().fold(0.0, |acc: f64, (i, row)| acc.max(row[i].abs()));
    let mut m: Vec<Vec<f64>> = a
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut row = row.clone();
            row.extend((0..n).map(|j| if i == j { 1.0 } else { 0.0 }));
            row
        })
        .collect();

    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| m[i][col].abs().total_cmp(&m[j][col].abs()))?;
        if !(m[pivot][col].abs() > threshold) {
            return None;
        }
        m.swap(col, pivot);
        let p = m[col][col];
        for v in m[col].iter_mut() {
            *v /= p;
        }
        for row in 0..n {
            if row != col {
                let factor = m[row][col];
                if factor != 0.0 {
                    for k in 0..2 * n {
                        m[row][k] -= factor * m[col][k];
                    }
                }
            }
        }
    }
    Some(m.into_iter().map(|row| row[n..].to_vec()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_fit() {
        let x_data = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y_data = [1.0, 3.0, 5.0, 7.0, 9.0];
        let residual = |p: &[f64]| -> Vec<f64> {
            x_data
                .iter()
                .zip(&y_data)
                .map(|(&x, &y)| p[0] + p[1] * x - y)
                .collect()
        };

        let result = leastsq(residual, &[0.5, 0.5], &LeastSquaresOptions::default()).unwrap();
        assert!((result.x[0] - 1.0).abs() < 1e-6);
        assert!((result.x[1] - 2.0).abs() < 1e-6);
        assert!(result.cost < 1e-12);
    }

    #[test]
    fn test_exponential_fit_with_covariance() {
        let x_data: Vec<f64> = (0..20).map(|i| i as f64 * 0.25).collect();
        // Deterministic wiggle so the residual variance is nonzero
        let y_data: Vec<f64> = x_data
            .iter()
            .enumerate()
            .map(|(i, &x)| 2.0 * (-0.5 * x).exp() + if i % 2 == 0 { 1e-3 } else { -1e-3 })
            .collect();
        let residual = |p: &[f64]| -> Vec<f64> {
            x_data
                .iter()
                .zip(&y_data)
                .map(|(&x, &y)| p[0] * (-p[1] * x).exp() - y)
                .collect()
        };

        let result = leastsq(residual, &[1.0, 1.0], &LeastSquaresOptions::default()).unwrap();
        assert!((result.x[0] - 2.0).abs() < 1e-2);
        assert!((result.x[1] - 0.5).abs() < 1e-2);
        let cov = result.covariance.unwrap();
        assert!(cov[0][0] > 0.0 && cov[1][1] > 0.0);
        assert!((cov[0][1] - cov[1][0]).abs() <= 1e-9 * cov[0][0].abs().max(cov[1][1].abs()));
    }

    #[test]
    fn test_tiny_parameter_scaling() {
        // Parameters nine orders of magnitude apart
        let x_data: Vec<f64> = (1..30).map(|i| i as f64).collect();
        let y_data: Vec<f64> = x_data.iter().map(|&x| 3e-9 * x + 2.0).collect();
        let residual = |p: &[f64]| -> Vec<f64> {
            x_data
                .iter()
                .zip(&y_data)
                .map(|(&x, &y)| p[0] * x + p[1] - y)
                .collect()
        };
        let result = leastsq(residual, &[1e-9, 1.0], &LeastSquaresOptions::default()).unwrap();
        assert!((result.x[0] / 3e-9 - 1.0).abs() < 1e-4);
        assert!((result.x[1] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_non_finite_residuals() {
        let residual = |_: &[f64]| vec![f64::NAN, 1.0];
        let err = leastsq(residual, &[1.0], &LeastSquaresOptions::default()).unwrap_err();
        assert!(matches!(err, NsdError::FitConvergence(_)));
    }

    #[test]
    fn test_iteration_limit() {
        // Minimum at infinity: the cost keeps dropping
        let residual = |p: &[f64]| vec![(-p[0]).exp(), 0.0];
        let options = LeastSquaresOptions {
            max_iter: 3,
            ..LeastSquaresOptions::default()
        };
        let err = leastsq(residual, &[0.0], &options).unwrap_err();
        assert!(matches!(err, NsdError::FitConvergence(_)));
    }

    #[test]
    fn test_singular_covariance() {
        // p[0] and p[1] only enter as a sum
        let residual = |p: &[f64]| -> Vec<f64> {
            (0..5).map(|i| p[0] + p[1] - i as f64).collect()
        };
        let result = leastsq(residual, &[1.0, 1.0], &LeastSquaresOptions::default()).unwrap();
        assert!((result.x[0] + result.x[1] - 2.0).abs() < 1e-6);
        assert!(result.covariance.is_none());
    }

    #[test]
    fn test_invert() {
        let a = vec![vec![4.0, 7.0], vec![2.0, 6.0]];
        let inv = invert(&a, 1e-13).unwrap();
        assert!((inv[0][0] - 0.6).abs() < 1e-12);
        assert!((inv[0][1] + 0.7).abs() < 1e-12);
        assert!((inv[1][0] + 0.2).abs() < 1e-12);
        assert!((inv[1][1] - 0.4).abs() < 1e-12);
        assert!(invert(&[vec![1.0, 2.0], vec![2.0, 4.0]], 1e-13).is_none());
    }
}
