//! Synthetic Test Signals
//!
//! Producers of time series for exercising the estimator: power-law
//! ("colored") gaussian noise, instrument-like noise mixes, pure tones and
//! ADC-style quantization. The estimator itself never depends on this module.
//!
//! ## Power-Law Noise
//!
//! [`power_law_noise`] shapes a random one-sided spectrum by `f^(-β/2)`, so
//! the resulting PSD follows `1/f^β`, and inverse-transforms it:
//!
//! | β   | Name        | [`NoiseKind`]          |
//! |-----|-------------|------------------------|
//! | 0   | white       | `White`                |
//! | 0.5 | white/pink  | `WhitePink`            |
//! | 1   | pink        | `Pink`                 |
//! | 2   | brownian    | `Brownian`             |
//!
//! The output is normalized to unit variance in expectation.
//!
//! All generators take the random source explicitly, so a seeded
//! [`rand::rngs::StdRng`] gives reproducible series.
//!
//! ## Example
//!
//! ```rust
//! use nsd_core::synth::{nsd_noise, NoiseKind};
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let mut rng = StdRng::seed_from_u64(4);
//! let series = nsd_noise(1 << 12, &[NoiseKind::White, NoiseKind::Brownian], &mut rng).unwrap();
//! assert_eq!(series.len(), 4096);
//! ```

use std::f64::consts::{PI, SQRT_2};
use std::str::FromStr;

use num_complex::Complex64;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{NsdError, NsdResult};

/// Noise shapes with the level scaling of a typical precision voltage
/// reference: with 2^20 samples at 50 SPS, white plus brownian meet at a
/// corner of about 0.1 Hz at 1 nV/√Hz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoiseKind {
    White,
    WhitePink,
    Pink,
    Brownian,
}

impl NoiseKind {
    pub const ALL: [NoiseKind; 4] = [
        NoiseKind::White,
        NoiseKind::WhitePink,
        NoiseKind::Pink,
        NoiseKind::Brownian,
    ];

    /// PSD exponent β.
    pub fn exponent(&self) -> f64 {
        match self {
            NoiseKind::White => 0.0,
            NoiseKind::WhitePink => 0.5,
            NoiseKind::Pink => 1.0,
            NoiseKind::Brownian => 2.0,
        }
    }

    /// Divisor applied to the unit-variance series.
    pub fn divisor(&self) -> f64 {
        match self {
            NoiseKind::White => 199.449e6,
            NoiseKind::WhitePink => 0.55e9,
            NoiseKind::Pink => 0.85e9,
            NoiseKind::Brownian => 4e7,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NoiseKind::White => "white",
            NoiseKind::WhitePink => "white-pink",
            NoiseKind::Pink => "pink",
            NoiseKind::Brownian => "brownian",
        }
    }
}

impl FromStr for NoiseKind {
    type Err = NsdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NoiseKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| NsdError::Unsupported {
                kind: "noise type",
                value: s.to_string(),
            })
    }
}

/// Independent standard-normal samples.
pub fn gaussian_noise<R: Rng + ?Sized>(samples: usize, rng: &mut R) -> Vec<f64> {
    (0..samples)
        .map(|_| Distribution::<f64>::sample(&StandardNormal, &mut *rng))
        .collect()
}

/// Gaussian noise whose PSD falls off as `1/f^exponent`.
///
/// A random one-sided spectrum with magnitudes `f^(-exponent/2)` is built
/// for `f = k/n`, `k = 0..=n/2` (DC uses the lowest nonzero frequency), then
/// inverse-transformed. DC and Nyquist bins are kept real. The result is
/// divided by its expected standard deviation.
pub fn power_law_noise<R: Rng + ?Sized>(
    exponent: f64,
    samples: usize,
    rng: &mut R,
) -> NsdResult<Vec<f64>> {
    if !exponent.is_finite() {
        return Err(NsdError::Domain(format!(
            "power-law exponent must be finite, got {}",
            exponent
        )));
    }
    if samples < 2 {
        return Err(NsdError::Config(format!(
            "power-law noise needs at least 2 samples, got {}",
            samples
        )));
    }

    let n = samples;
    let half = n / 2;
    let scale: Vec<f64> = (0..=half)
        .map(|k| {
            let f = k.max(1) as f64 / n as f64;
            f.powf(-exponent / 2.0)
        })
        .collect();

    // Expected standard deviation of the inverse transform
    let mut power: f64 = scale[1..].iter().map(|s| s * s).sum();
    let last = scale[half] * (1 + n % 2) as f64 / 2.0;
    power += last * last - scale[half] * scale[half];
    let sigma = 2.0 * power.sqrt() / n as f64;

    let mut spectrum = vec![Complex64::new(0.0, 0.0); n];
    for (k, &s) in scale.iter().enumerate() {
        let re: f64 = StandardNormal.sample(rng);
        let im: f64 = StandardNormal.sample(rng);
        spectrum[k] = Complex64::new(re * s, im * s);
    }
    spectrum[0] = Complex64::new(spectrum[0].re * SQRT_2, 0.0);
    if n % 2 == 0 {
        spectrum[half] = Complex64::new(spectrum[half].re * SQRT_2, 0.0);
    }
    // Hermitian mirror so the inverse is real
    for k in 1..(n + 1) / 2 {
        spectrum[n - k] = spectrum[k].conj();
    }

    let mut planner = FftPlanner::<f64>::new();
    planner.plan_fft_inverse(n).process(&mut spectrum);

    let norm = n as f64 * sigma;
    debug!(exponent, samples, sigma, "generated power-law noise");
    Ok(spectrum.into_iter().map(|c| c.re / norm).collect())
}

/// Sum of the requested noise kinds, each scaled by its [`NoiseKind::divisor`].
///
/// Kinds are drawn one after the other from `rng`.
pub fn nsd_noise<R: Rng + ?Sized>(
    samples: usize,
    kinds: &[NoiseKind],
    rng: &mut R,
) -> NsdResult<Vec<f64>> {
    let mut sum = vec![0.0; samples];
    for kind in kinds {
        let noise = power_law_noise(kind.exponent(), samples, rng)?;
        let divisor = kind.divisor();
        for (acc, x) in sum.iter_mut().zip(noise) {
            *acc += x / divisor;
        }
    }
    Ok(sum)
}

/// A cosine with the given RMS value: `rms·√2·cos(2π·f·i/fs)`.
pub fn tone(rms: f64, frequency: f64, sample_frequency: f64, samples: usize) -> Vec<f64> {
    let peak = rms * SQRT_2;
    (0..samples)
        .map(|i| {
            let t = i as f64 / sample_frequency;
            peak * (2.0 * PI * frequency * t).cos()
        })
        .collect()
}

/// Round every sample to the nearest multiple of `lsb` (halves round up).
pub fn quantize(series: &[f64], lsb: f64) -> NsdResult<Vec<f64>> {
    if !(lsb.is_finite() && lsb > 0.0) {
        return Err(NsdError::Domain(format!(
            "quantization step must be positive, got {}",
            lsb
        )));
    }
    Ok(series
        .iter()
        .map(|&u| (u / lsb + 0.5).floor() * lsb)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rms::series_rms;
    use crate::welch::{welch, Detrend};
    use crate::windows::SpectralWindow;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn band_mean(values: &[f64]) -> f64 {
        values.iter().sum::<f64>() / values.len() as f64
    }

    #[test]
    fn test_gaussian_noise_statistics() {
        let mut rng = StdRng::seed_from_u64(1);
        let noise = gaussian_noise(50_000, &mut rng);
        let mean = band_mean(&noise);
        assert!(mean.abs() < 0.02, "mean={}", mean);
        assert!((series_rms(&noise) - 1.0).abs() < 0.02);
    }

    #[test]
    fn test_white_power_law_unit_variance() {
        let mut rng = StdRng::seed_from_u64(2);
        let noise = power_law_noise(0.0, 1 << 15, &mut rng).unwrap();
        assert_eq!(noise.len(), 1 << 15);
        let rms = series_rms(&noise);
        assert!((rms - 1.0).abs() < 0.05, "rms={}", rms);
    }

    #[test]
    fn test_odd_length() {
        let mut rng = StdRng::seed_from_u64(3);
        let noise = power_law_noise(1.0, 1001, &mut rng).unwrap();
        assert_eq!(noise.len(), 1001);
        assert!(noise.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_spectral_slope() {
        let mut rng = StdRng::seed_from_u64(5);
        let window = SpectralWindow::hft90d();
        let white = power_law_noise(0.0, 1 << 16, &mut rng).unwrap();
        let brown = power_law_noise(2.0, 1 << 16, &mut rng).unwrap();

        let psd = welch(&white, 1.0, 1024, &window, Detrend::None).unwrap();
        let ratio = band_mean(&psd.density[4..8]) / band_mean(&psd.density[64..128]);
        assert!(ratio > 0.5 && ratio < 2.0, "white ratio={}", ratio);

        let psd = welch(&brown, 1.0, 1024, &window, Detrend::None).unwrap();
        let ratio = band_mean(&psd.density[4..8]) / band_mean(&psd.density[64..128]);
        assert!(ratio > 50.0, "brownian ratio={}", ratio);
    }

    #[test]
    fn test_rejects_bad_arguments() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(power_law_noise(f64::NAN, 16, &mut rng).is_err());
        assert!(power_law_noise(1.0, 1, &mut rng).is_err());
        assert!(quantize(&[1.0], 0.0).is_err());
    }

    #[test]
    fn test_noise_kind_names() {
        for kind in NoiseKind::ALL {
            assert_eq!(kind.name().parse::<NoiseKind>().unwrap(), kind);
        }
        let err = "blue".parse::<NoiseKind>().unwrap_err();
        assert_eq!(err.kind(), crate::types::ErrorKind::Domain);
    }

    #[test]
    fn test_nsd_noise_mix() {
        let mut rng = StdRng::seed_from_u64(4);
        let white = nsd_noise(1 << 12, &[NoiseKind::White], &mut rng).unwrap();
        let rms = series_rms(&white) * 199.449e6;
        assert!((rms - 1.0).abs() < 0.1, "rms={}", rms);

        let empty = nsd_noise(16, &[], &mut rng).unwrap();
        assert_eq!(empty, vec![0.0; 16]);
    }

    #[test]
    fn test_tone_rms() {
        let series = tone(2.0, 10.0, 1000.0, 1000);
        assert!((series[0] - 2.0 * SQRT_2).abs() < 1e-12);
        assert!((series_rms(&series) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_quantize() {
        let q = quantize(&[0.3, 0.375, -0.375, 2.1], 0.25).unwrap();
        assert_eq!(q, vec![0.25, 0.5, -0.25, 2.0]);
    }
}
