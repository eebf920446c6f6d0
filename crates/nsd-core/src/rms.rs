//! RMS in the Time and Frequency Domains
//!
//! Two views of the same noise: the AC RMS of the sampled series, and the
//! RMS recovered from its amplitude spectral density. Comparing them is the
//! basic sanity check of an NSD estimate.
//!
//! ## Example
//!
//! ```rust
//! use nsd_core::rms::{series_rms, white_noise_rms};
//!
//! assert!((series_rms(&[1.0, -1.0, 1.0, -1.0]) - 1.0).abs() < 1e-12);
//! // 4 nV/√Hz over a 10 kHz bandwidth
//! assert!((white_noise_rms(4e-9, 1e4) - 4e-7).abs() < 1e-20);
//! ```

use crate::types::{NsdError, NsdResult, SpectralEstimate};

/// AC RMS: root mean square after removing the mean.
///
/// Returns 0.0 for an empty series.
pub fn series_rms(series: &[f64]) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    let n = series.len() as f64;
    let mean = series.iter().sum::<f64>() / n;
    let power = series.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n;
    power.sqrt()
}

/// RMS equivalent of an NSD: trapezoidal integral of the amplitude over √f.
///
/// Estimates with fewer than two points integrate to 0.0.
pub fn nsd_rms(estimate: &SpectralEstimate) -> f64 {
    let root_f: Vec<f64> = estimate.frequencies().iter().map(|f| f.sqrt()).collect();
    trapezoid(&root_f, estimate.amplitudes())
}

/// RMS contained in `[f_low, f_high]`: `sqrt(∫ amplitude² df)` over the
/// points of `estimate` inside the band.
pub fn band_rms(estimate: &SpectralEstimate, f_low: f64, f_high: f64) -> NsdResult<f64> {
    if !(f_low.is_finite() && f_high.is_finite() && f_low >= 0.0 && f_low < f_high) {
        return Err(NsdError::Domain(format!(
            "invalid band [{}, {}] Hz",
            f_low, f_high
        )));
    }
    let (f, power): (Vec<f64>, Vec<f64>) = estimate
        .iter()
        .filter(|&(f, _)| f >= f_low && f <= f_high)
        .map(|(f, a)| (f, a * a))
        .unzip();
    Ok(trapezoid(&f, &power).sqrt())
}

/// RMS of white noise with the given density over a bandwidth.
pub fn white_noise_rms(density: f64, bandwidth: f64) -> f64 {
    density * bandwidth.sqrt()
}

fn trapezoid(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(x, y)| (x[1] - x[0]) * (y[0] + y[1]) / 2.0)
        .sum()
}
