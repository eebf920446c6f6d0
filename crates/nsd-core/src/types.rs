//! Core types for noise spectral density estimation
//!
//! This module defines the values that flow between the estimator stages and
//! the error type shared by all of them.
//!
//! ## Spectral Estimates
//!
//! Every stage after the Welch estimator works on a [`SpectralEstimate`]: two
//! equal-length sequences of frequencies (Hz, ascending) and amplitudes
//! (signal/√Hz). The constructor rejects mismatched lengths, so downstream code
//! can zip the two without re-checking.
//!
//! ```text
//!   amplitude
//!   (V/√Hz)
//!      │\
//!      │ \        1/f^n part
//!      │  \
//!      │   `-.__
//!      │        `----.______________  white floor
//!      └───────────────────────────── frequency (Hz, log)
//!           ^ corner frequency
//! ```

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// A real-valued sample of the input time series.
pub type Sample = f64;

/// Result type for estimator operations
pub type NsdResult<T> = Result<T, NsdError>;

/// Coarse classification of [`NsdError`] variants.
///
/// Callers that only need to know *what kind* of failure happened (bad
/// arguments, optimizer failure, unsupported name) can match on this instead
/// of the individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid arguments or configuration (lengths, rates, window shape).
    Configuration,
    /// The nonlinear fit failed to converge or produced a degenerate result.
    FitConvergence,
    /// A value outside the supported domain (unknown names, log of ≤ 0).
    Domain,
}

/// Errors that can occur while estimating, smoothing or fitting a spectrum
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NsdError {
    #[error("Invalid sample frequency: {0} Hz. Must be positive and finite")]
    InvalidSampleFrequency(f64),

    #[error("Segment length {segment_length} does not fit in a series of {series_length} samples")]
    SegmentTooLong {
        segment_length: usize,
        series_length: usize,
    },

    #[error("Segment length {length} is below the window minimum of {minimum}")]
    SegmentTooShort { length: usize, minimum: usize },

    #[error("Window overlap {overlap} is out of range for length {length}")]
    InvalidOverlap { overlap: usize, length: usize },

    #[error("Window has {actual} weights, expected {expected}")]
    WindowLengthMismatch { expected: usize, actual: usize },

    #[error("Invalid overlap ratio: {0}. Must be in [0, 1)")]
    InvalidOverlapRatio(f64),

    #[error("Crop ({leading}, {trailing}) leaves no bins out of {bins}")]
    CropTooLarge {
        leading: usize,
        trailing: usize,
        bins: usize,
    },

    #[error("Invalid spectral estimate: {0}")]
    InvalidEstimate(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Fit did not converge: {0}")]
    FitConvergence(String),

    #[error("Unsupported {kind}: '{value}'")]
    Unsupported { kind: &'static str, value: String },

    #[error("Value outside the supported domain: {0}")]
    Domain(String),
}

impl NsdError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            NsdError::FitConvergence(_) => ErrorKind::FitConvergence,
            NsdError::Unsupported { .. } | NsdError::Domain(_) => ErrorKind::Domain,
            _ => ErrorKind::Configuration,
        }
    }
}

/// Validate a sample frequency (must be positive and finite).
pub(crate) fn check_sample_frequency(sample_frequency: f64) -> NsdResult<()> {
    if sample_frequency.is_finite() && sample_frequency > 0.0 {
        Ok(())
    } else {
        Err(NsdError::InvalidSampleFrequency(sample_frequency))
    }
}

/// A frequency-domain curve: ascending frequencies with one amplitude each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralEstimate {
    frequencies: Vec<f64>,
    amplitudes: Vec<f64>,
}

impl SpectralEstimate {
    /// Create an estimate from matching frequency and amplitude vectors.
    pub fn new(frequencies: Vec<f64>, amplitudes: Vec<f64>) -> NsdResult<Self> {
        if frequencies.len() != amplitudes.len() {
            return Err(NsdError::InvalidEstimate(format!(
                "{} frequencies but {} amplitudes",
                frequencies.len(),
                amplitudes.len()
            )));
        }
        Ok(Self {
            frequencies,
            amplitudes,
        })
    }

    /// Frequencies in Hz.
    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    /// Amplitude densities (signal/√Hz for an NSD).
    pub fn amplitudes(&self) -> &[f64] {
        &self.amplitudes
    }

    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// Iterate over `(frequency, amplitude)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.frequencies
            .iter()
            .copied()
            .zip(self.amplitudes.iter().copied())
    }

    /// Split into `(frequencies, amplitudes)`.
    pub fn into_parts(self) -> (Vec<f64>, Vec<f64>) {
        (self.frequencies, self.amplitudes)
    }

    /// Whether frequencies are strictly ascending.
    pub fn is_strictly_ascending(&self) -> bool {
        self.frequencies.windows(2).all(|w| w[0] < w[1])
    }

    /// Fail unless the estimate holds at least `minimum` points with
    /// non-decreasing frequencies.
    pub(crate) fn require_sorted(&self, minimum: usize) -> NsdResult<()> {
        if self.len() < minimum {
            return Err(NsdError::InvalidEstimate(format!(
                "need at least {} points, got {}",
                minimum,
                self.len()
            )));
        }
        if self.frequencies.windows(2).any(|w| w[1] < w[0]) {
            return Err(NsdError::InvalidEstimate(
                "frequencies are not ascending".to_string(),
            ));
        }
        Ok(())
    }
}

/// Number of bins dropped from each end of a spectrum.
///
/// The lowest bins carry residual window leakage from DC and the last
/// (Nyquist) bin is folded, so by default three are dropped at the start and
/// one at the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Crop {
    pub leading: usize,
    pub trailing: usize,
}

impl Default for Crop {
    fn default() -> Self {
        Self {
            leading: 3,
            trailing: 1,
        }
    }
}

impl Crop {
    pub fn new(leading: usize, trailing: usize) -> Self {
        Self { leading, trailing }
    }

    /// Keep every bin.
    pub fn none() -> Self {
        Self::new(0, 0)
    }

    /// Total number of dropped bins.
    pub fn amount(&self) -> usize {
        self.leading + self.trailing
    }

    /// Index range that survives cropping `bins` values.
    pub fn range(&self, bins: usize) -> NsdResult<Range<usize>> {
        if self.amount() >= bins {
            return Err(NsdError::CropTooLarge {
                leading: self.leading,
                trailing: self.trailing,
                bins,
            });
        }
        Ok(self.leading..bins - self.trailing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_length_mismatch() {
        let err = SpectralEstimate::new(vec![1.0, 2.0], vec![1.0]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_estimate_accessors() {
        let est = SpectralEstimate::new(vec![1.0, 2.0, 3.0], vec![0.5, 0.4, 0.3]).unwrap();
        assert_eq!(est.len(), 3);
        assert!(est.is_strictly_ascending());
        let pairs: Vec<(f64, f64)> = est.iter().collect();
        assert_eq!(pairs[1], (2.0, 0.4));
        let (f, a) = est.into_parts();
        assert_eq!(f.len(), a.len());
    }

    #[test]
    fn test_require_sorted() {
        let est = SpectralEstimate::new(vec![1.0, 3.0, 2.0], vec![1.0; 3]).unwrap();
        assert!(est.require_sorted(2).is_err());
        let est = SpectralEstimate::new(vec![1.0], vec![1.0]).unwrap();
        assert!(est.require_sorted(2).is_err());
    }

    #[test]
    fn test_crop_range() {
        assert_eq!(Crop::default().range(10).unwrap(), 3..9);
        assert_eq!(Crop::none().range(4).unwrap(), 0..4);
        assert!(Crop::new(2, 2).range(4).is_err());
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            NsdError::FitConvergence("x".into()).kind(),
            ErrorKind::FitConvergence
        );
        assert_eq!(
            NsdError::Unsupported {
                kind: "aggregate",
                value: "mode".into()
            }
            .kind(),
            ErrorKind::Domain
        );
        assert_eq!(
            NsdError::InvalidSampleFrequency(0.0).kind(),
            ErrorKind::Configuration
        );
    }

    #[test]
    fn test_check_sample_frequency() {
        assert!(check_sample_frequency(1.0).is_ok());
        assert!(check_sample_frequency(0.0).is_err());
        assert!(check_sample_frequency(-5.0).is_err());
        assert!(check_sample_frequency(f64::NAN).is_err());
    }
}
