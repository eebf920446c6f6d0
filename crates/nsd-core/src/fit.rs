//! Noise Model Fitting
//!
//! Fits the classic component-noise shape
//!
//! ```text
//! amplitude(f) = slope / f^(freq_exponent/2) + white_floor
//! ```
//!
//! to an NSD, either directly on the linear values ([`fit`]) or on
//! `log10(amplitude)` over `log10(f)` ([`fit_loglog`]). The log-log fit weights
//! every decade equally and usually matches a power law plus floor better;
//! the linear fit is dominated by the large low-frequency values.
//!
//! ## Covariance Convention
//!
//! [`FitResult::model`] always holds linear-scale parameters. The covariance
//! is in the space the fit ran in: for [`FitSpace::LogLog`] the fitted values
//! were `log10` of the parameters, the model is reported as `10^value`, but
//! the covariance stays that of the `log10` values. Use
//! [`FitResult::relative_errors`], which applies `ln(10)·√diag` for log-log
//! fits and `√diag/|p|` for linear ones, rather than reading the diagonal
//! directly.
//!
//! ## Example
//!
//! ```rust
//! use nsd_core::fit::{fit_loglog, NoiseModel};
//! use nsd_core::smooth::geomspace;
//! use nsd_core::types::SpectralEstimate;
//!
//! let truth = NoiseModel::new(1e-9, 2.0, 1e-10);
//! let f = geomspace(0.01, 1000.0, 200).unwrap();
//! let a = truth.sample(&f);
//! let result = fit_loglog(&SpectralEstimate::new(f, a).unwrap()).unwrap();
//! assert!((result.model.freq_exponent - 2.0).abs() < 1e-3);
//! ```

use std::f64::consts::LN_10;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::optimize::{leastsq, LeastSquaresOptions};
use crate::types::{NsdError, NsdResult, SpectralEstimate};

/// Points needed for a fit with residual degrees of freedom.
const MIN_FIT_POINTS: usize = 4;

/// `slope / f^(freq_exponent/2) + white_floor`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseModel {
    /// 1/f amplitude at 1 Hz.
    pub slope: f64,
    /// PSD exponent n of the 1/f^n part.
    pub freq_exponent: f64,
    /// White noise density.
    pub white_floor: f64,
}

impl NoiseModel {
    pub fn new(slope: f64, freq_exponent: f64, white_floor: f64) -> Self {
        Self {
            slope,
            freq_exponent,
            white_floor,
        }
    }

    fn from_slice(p: &[f64]) -> Self {
        Self::new(p[0], p[1], p[2])
    }

    /// `[slope, freq_exponent, white_floor]`.
    pub fn to_array(&self) -> [f64; 3] {
        [self.slope, self.freq_exponent, self.white_floor]
    }

    /// Model amplitude at `frequency`.
    pub fn amplitude(&self, frequency: f64) -> f64 {
        self.slope / frequency.powf(self.freq_exponent / 2.0) + self.white_floor
    }

    /// Model amplitudes at each frequency.
    pub fn sample(&self, frequencies: &[f64]) -> Vec<f64> {
        frequencies.iter().map(|&f| self.amplitude(f)).collect()
    }

    /// Frequency where the 1/f part equals the white floor.
    pub fn corner_frequency(&self) -> Option<f64> {
        let ratio = self.slope / self.white_floor;
        if self.freq_exponent == 0.0 || !(ratio > 0.0) {
            return None;
        }
        let corner = ratio.powf(2.0 / self.freq_exponent);
        corner.is_finite().then_some(corner)
    }

    /// Starting point for a fit, read off the data.
    ///
    /// The white floor is the median of the top tenth of the spectrum.
    /// Points more than three times above it are regressed in log-log space
    /// for the exponent (clamped to `[0.1, 4]`) and slope; without enough of
    /// them the exponent defaults to 1 and the slope to the excess at the
    /// first point.
    pub fn initial_guess(estimate: &SpectralEstimate) -> NsdResult<Self> {
        estimate.require_sorted(1)?;
        let f = estimate.frequencies();
        let a = estimate.amplitudes();

        let mut tail = a[a.len() * 9 / 10..].to_vec();
        tail.sort_by(f64::total_cmp);
        let white = tail[tail.len() / 2];

        let points: Vec<(f64, f64)> = estimate
            .iter()
            .filter(|&(f, a)| f > 0.0 && a > 3.0 * white)
            .map(|(f, a)| (f.log10(), (a - white).log10()))
            .collect();
        if points.len() >= 2 {
            let count = points.len() as f64;
            let mx = points.iter().map(|p| p.0).sum::<f64>() / count;
            let my = points.iter().map(|p| p.1).sum::<f64>() / count;
            let sxx: f64 = points.iter().map(|p| (p.0 - mx) * (p.0 - mx)).sum();
            if sxx > 0.0 {
                let sxy: f64 = points.iter().map(|p| (p.0 - mx) * (p.1 - my)).sum();
                let exponent = (-2.0 * sxy / sxx).clamp(0.1, 4.0);
                let slope = 10f64.powf(my + exponent / 2.0 * mx);
                return Ok(Self::new(slope, exponent, white));
            }
        }

        let exponent = 1.0;
        let mut head = a[0] - white;
        if head <= 0.0 {
            head = 0.1 * a[0];
        }
        Ok(Self::new(head * f[0].powf(exponent / 2.0), exponent, white))
    }
}

/// Space the parameters were fitted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitSpace {
    Linear,
    #[default]
    #[serde(alias = "log-log")]
    LogLog,
}

/// Fitted model with its covariance.
///
/// For [`FitSpace::LogLog`] the covariance belongs to the `log10` of the
/// parameters while `model` is already linear. See the module docs.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub model: NoiseModel,
    /// Covariance in `space`, ordered `[slope, freq_exponent, white_floor]`.
    pub covariance: [[f64; 3]; 3],
    pub space: FitSpace,
    pub iterations: usize,
    /// Sum of squared normalized residuals at the solution.
    pub cost: f64,
}

impl FitResult {
    pub fn parameters(&self) -> [f64; 3] {
        self.model.to_array()
    }

    /// `√diag(covariance)`, in `space`.
    pub fn std_errors(&self) -> [f64; 3] {
        [0, 1, 2].map(|i| self.covariance[i][i].sqrt())
    }

    /// One-sigma relative error of each linear-scale parameter.
    pub fn relative_errors(&self) -> [f64; 3] {
        let std = self.std_errors();
        match self.space {
            FitSpace::LogLog => std.map(|s| LN_10 * s),
            FitSpace::Linear => {
                let p = self.parameters();
                [0, 1, 2].map(|i| std[i] / p[i].abs())
            }
        }
    }
}

/// Fit in the requested space.
pub fn fit_in(estimate: &SpectralEstimate, space: FitSpace) -> NsdResult<FitResult> {
    match space {
        FitSpace::Linear => fit(estimate),
        FitSpace::LogLog => fit_loglog(estimate),
    }
}

/// Least-squares fit of the noise model to the linear amplitudes.
pub fn fit(estimate: &SpectralEstimate) -> NsdResult<FitResult> {
    check_fit_input(estimate)?;
    let guess = NoiseModel::initial_guess(estimate)?;
    let f = estimate.frequencies();
    let y = estimate.amplitudes();
    let norm = max_abs(y);

    let residual = |p: &[f64]| -> Vec<f64> {
        let model = NoiseModel::from_slice(p);
        f.iter()
            .zip(y)
            .map(|(&f, &y)| (model.amplitude(f) - y) / norm)
            .collect()
    };

    debug!(?guess, points = f.len(), "linear noise fit");
    let result = leastsq(residual, &guess.to_array(), &LeastSquaresOptions::default())?;
    let covariance = covariance_matrix(result.covariance)?;

    Ok(FitResult {
        model: NoiseModel::from_slice(&result.x),
        covariance,
        space: FitSpace::Linear,
        iterations: result.iterations,
        cost: result.cost,
    })
}

/// Least-squares fit of `log10(amplitude)` over `log10(f)`.
///
/// Parameters are fitted as `log10` values and reported as `10^value`; the
/// covariance is left in log space.
pub fn fit_loglog(estimate: &SpectralEstimate) -> NsdResult<FitResult> {
    check_fit_input(estimate)?;
    if let Some(&a) = estimate.amplitudes().iter().find(|&&a| !(a > 0.0)) {
        return Err(NsdError::Domain(format!(
            "log-log fit needs positive amplitudes, found {}",
            a
        )));
    }

    let guess = NoiseModel::initial_guess(estimate)?;
    let x0: Vec<f64> = guess.to_array().iter().map(|p| p.log10()).collect();

    let lx: Vec<f64> = estimate.frequencies().iter().map(|f| f.log10()).collect();
    let ly: Vec<f64> = estimate.amplitudes().iter().map(|a| a.log10()).collect();
    let norm = max_abs(&ly);

    let residual = |p: &[f64]| -> Vec<f64> {
        let half_exponent = 10f64.powf(p[1]) / 2.0;
        lx.iter()
            .zip(&ly)
            .map(|(&x, &y)| (log_sum(p[0] - x * half_exponent, p[2]) - y) / norm)
            .collect()
    };

    debug!(?guess, points = lx.len(), "log-log noise fit");
    let result = leastsq(residual, &x0, &LeastSquaresOptions::default())?;
    let covariance = covariance_matrix(result.covariance)?;
    let linear: Vec<f64> = result.x.iter().map(|v| 10f64.powf(*v)).collect();

    Ok(FitResult {
        model: NoiseModel::from_slice(&linear),
        covariance,
        space: FitSpace::LogLog,
        iterations: result.iterations,
        cost: result.cost,
    })
}

/// `log10(10^p + 10^c)` without overflow.
fn log_sum(p: f64, c: f64) -> f64 {
    let m = p.max(c);
    m + (10f64.powf(p - m) + 10f64.powf(c - m)).log10()
}

fn max_abs(values: &[f64]) -> f64 {
    let m = values.iter().fold(0.0, |acc: f64, v| acc.max(v.abs()));
    if m > 0.0 && m.is_finite() {
        m
    } else {
        1.0
    }
}

fn check_fit_input(estimate: &SpectralEstimate) -> NsdResult<()> {
    estimate.require_sorted(MIN_FIT_POINTS)?;
    if let Some(&f) = estimate.frequencies().iter().find(|&&f| !(f > 0.0)) {
        return Err(NsdError::Domain(format!(
            "noise model is undefined at {} Hz; crop the DC bin",
            f
        )));
    }
    Ok(())
}

fn covariance_matrix(covariance: Option<Vec<Vec<f64>>>) -> NsdResult<[[f64; 3]; 3]> {
    let Some(cov) = covariance else {
        warn!("singular Jacobian at the fit solution");
        return Err(NsdError::FitConvergence(
            "singular Jacobian at the solution".to_string(),
        ));
    };
    let matrix = [0, 1, 2].map(|i| [0, 1, 2].map(|j| cov[i][j]));
    if matrix.iter().flatten().any(|v| !v.is_finite()) {
        return Err(NsdError::FitConvergence(
            "non-finite covariance".to_string(),
        ));
    }
    Ok(matrix)
}
