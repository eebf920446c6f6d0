//! Window Functions for Noise Spectral Density Estimation
//!
//! A window provider turns a segment length into the weights applied to each
//! Welch segment *and* the number of samples consecutive segments share.
//! Flat-top style windows need a large overlap to keep the variance of the
//! averaged estimate down, so the two are produced together.
//!
//! ## Window Selection Guide
//!
//! | Window  | Main Lobe Width | Sidelobe Level | Use Case                         |
//! |---------|-----------------|----------------|----------------------------------|
//! | Flattop | Wide            | -93 dB         | Amplitude-accurate tone levels   |
//! | HFT90D  | Wide (±5 bins)  | -90 dB         | Wide-dynamic-range noise spectra |
//!
//! Both default to an overlap of 76 % of the segment length
//! ([`DEFAULT_OVERLAP_RATIO`]). The ratio is an empirical compromise between
//! noise-floor accuracy and computation cost, not a derived value; tune it with
//! [`SpectralWindow::with_overlap_ratio`].
//!
//! ## Example
//!
//! ```rust
//! use nsd_core::windows::{SpectralWindow, WindowProvider};
//!
//! let window = SpectralWindow::hft90d().window(1024).unwrap();
//! assert_eq!(window.len(), 1024);
//! assert_eq!(window.overlap, 778);
//!
//! // Any closure is a provider too
//! let boxcar = |length: usize| nsd_core::windows::Window::new(length / 2, vec![1.0; length]);
//! assert_eq!(boxcar.window(64).unwrap().stride(), 32);
//! ```

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::types::{NsdError, NsdResult};

/// Shortest segment any provider accepts.
pub const MIN_WINDOW_LENGTH: usize = 4;

/// Fraction of a segment shared with the next one.
pub const DEFAULT_OVERLAP_RATIO: f64 = 0.76;

/// Flattop coefficients a0..a4 (alternating signs applied in the sum).
const FLATTOP_COEFFS: [f64; 5] = [
    0.215_578_95,
    0.416_631_58,
    0.277_263_158,
    0.083_578_947,
    0.006_947_368,
];

/// HFT90D coefficients c0..c4, already signed.
const HFT90D_COEFFS: [f64; 5] = [1.0, -1.942_604, 1.340_318, -0.440_811, 0.043_097];

/// Segment weights plus the overlap (in samples) between consecutive segments.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    /// Samples shared by consecutive segments.
    pub overlap: usize,
    /// Per-sample weights, one per segment sample.
    pub weights: Vec<f64>,
}

impl Window {
    pub fn new(overlap: usize, weights: Vec<f64>) -> Self {
        Self { overlap, weights }
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Distance between the starts of consecutive segments.
    pub fn stride(&self) -> usize {
        self.len().saturating_sub(self.overlap)
    }

    /// Σw², the density normalization of a windowed periodogram.
    pub fn power(&self) -> f64 {
        self.weights.iter().map(|w| w * w).sum()
    }

    /// Coherent gain: Σw / N.
    pub fn coherent_gain(&self) -> f64 {
        if self.weights.is_empty() {
            return 0.0;
        }
        self.weights.iter().sum::<f64>() / self.len() as f64
    }

    /// Equivalent noise bandwidth in bins: N·Σw² / (Σw)².
    pub fn enbw(&self) -> f64 {
        let sum: f64 = self.weights.iter().sum();
        if sum == 0.0 {
            return f64::INFINITY;
        }
        self.len() as f64 * self.power() / (sum * sum)
    }

    /// Check that this window is usable for segments of `length` samples.
    pub fn validate(&self, length: usize) -> NsdResult<()> {
        if self.len() != length {
            return Err(NsdError::WindowLengthMismatch {
                expected: length,
                actual: self.len(),
            });
        }
        if self.overlap >= length {
            return Err(NsdError::InvalidOverlap {
                overlap: self.overlap,
                length,
            });
        }
        if self.weights.iter().any(|w| !w.is_finite()) {
            return Err(NsdError::InvalidEstimate(
                "window weights must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// Capability producing a [`Window`] for a given segment length.
///
/// The Welch estimator is generic over this trait; it never picks a window on
/// its own. Closures `Fn(usize) -> Window` implement it directly.
pub trait WindowProvider {
    /// Build the window for segments of `length` samples.
    fn window(&self, length: usize) -> NsdResult<Window>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "custom"
    }
}

impl<F> WindowProvider for F
where
    F: Fn(usize) -> Window,
{
    fn window(&self, length: usize) -> NsdResult<Window> {
        check_length(length)?;
        Ok(self(length))
    }
}

fn check_length(length: usize) -> NsdResult<()> {
    if length < MIN_WINDOW_LENGTH {
        return Err(NsdError::SegmentTooShort {
            length,
            minimum: MIN_WINDOW_LENGTH,
        });
    }
    Ok(())
}

/// Built-in window shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    /// Symmetric 5-term flat top
    Flattop,
    /// HFT90D (Heinzel et al.), periodic
    #[default]
    Hft90d,
}

impl WindowKind {
    /// Generate the weights for the given length.
    pub fn generate(&self, length: usize) -> Vec<f64> {
        match self {
            WindowKind::Flattop => flattop_window(length),
            WindowKind::Hft90d => hft90d_window(length),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WindowKind::Flattop => "flattop",
            WindowKind::Hft90d => "hft90d",
        }
    }
}

impl std::str::FromStr for WindowKind {
    type Err = NsdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "flattop" => Ok(WindowKind::Flattop),
            "hft90d" => Ok(WindowKind::Hft90d),
            _ => Err(NsdError::Unsupported {
                kind: "window",
                value: s.to_string(),
            }),
        }
    }
}

impl WindowProvider for WindowKind {
    fn window(&self, length: usize) -> NsdResult<Window> {
        SpectralWindow::new(*self).window(length)
    }

    fn name(&self) -> &str {
        WindowKind::name(self)
    }
}

/// A built-in window shape with its overlap ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralWindow {
    kind: WindowKind,
    overlap_ratio: f64,
}

impl Default for SpectralWindow {
    fn default() -> Self {
        Self::hft90d()
    }
}

impl SpectralWindow {
    pub fn new(kind: WindowKind) -> Self {
        Self {
            kind,
            overlap_ratio: DEFAULT_OVERLAP_RATIO,
        }
    }

    pub fn flattop() -> Self {
        Self::new(WindowKind::Flattop)
    }

    pub fn hft90d() -> Self {
        Self::new(WindowKind::Hft90d)
    }

    /// Set the overlap ratio; must lie in `[0, 1)`.
    pub fn with_overlap_ratio(mut self, ratio: f64) -> NsdResult<Self> {
        if !(0.0..1.0).contains(&ratio) {
            return Err(NsdError::InvalidOverlapRatio(ratio));
        }
        self.overlap_ratio = ratio;
        Ok(self)
    }

    pub fn kind(&self) -> WindowKind {
        self.kind
    }

    pub fn overlap_ratio(&self) -> f64 {
        self.overlap_ratio
    }

    /// Overlap in samples for a segment of `length`.
    pub fn overlap_for(&self, length: usize) -> usize {
        (length as f64 * self.overlap_ratio).floor() as usize
    }
}

impl WindowProvider for SpectralWindow {
    fn window(&self, length: usize) -> NsdResult<Window> {
        check_length(length)?;
        Ok(Window::new(
            self.overlap_for(length),
            self.kind.generate(length),
        ))
    }

    fn name(&self) -> &str {
        self.kind.name()
    }
}

/// Generate a symmetric flat-top window.
///
/// w[n] = a0 - a1*cos(2πn/(N-1)) + a2*cos(4πn/(N-1)) - a3*cos(6πn/(N-1)) + a4*cos(8πn/(N-1))
///
/// Peak is normalized to 1.0 at the centre; edges dip slightly below zero.
pub fn flattop_window(length: usize) -> Vec<f64> {
    if length == 0 {
        return vec![];
    }
    if length == 1 {
        return vec![1.0];
    }

    let n_minus_1 = (length - 1) as f64;
    (0..length)
        .map(|n| {
            let x = 2.0 * PI * n as f64 / n_minus_1;
            FLATTOP_COEFFS
                .iter()
                .enumerate()
                .map(|(k, &a)| {
                    let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
                    sign * a * (k as f64 * x).cos()
                })
                .sum()
        })
        .collect()
}

/// Generate an HFT90D window.
///
/// w[i] = 1 − 1.942604·cos(z) + 1.340318·cos(2z) − 0.440811·cos(3z) + 0.043097·cos(4z),
/// z = 2πi/N. Periodic form: the first sample is ~0 and there is no matching
/// zero at the end.
pub fn hft90d_window(length: usize) -> Vec<f64> {
    (0..length)
        .map(|i| {
            let z = 2.0 * PI * i as f64 / length as f64;
            HFT90D_COEFFS
                .iter()
                .enumerate()
                .map(|(k, &c)| c * (k as f64 * z).cos())
                .sum()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hft90d_values() {
        let w = hft90d_window(8);
        assert_eq!(w.len(), 8);
        // Starts at (almost) zero, peaks mid-window
        assert!(w[0].abs() < 1e-5, "w[0]={}", w[0]);
        let expected_mid = 1.0 + 1.942604 + 1.340318 + 0.440811 + 0.043097;
        assert!((w[4] - expected_mid).abs() < 1e-9);
        // Periodic symmetry: w[i] == w[N-i]
        for i in 1..8 {
            assert!((w[i] - w[8 - i]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_flattop_symmetric() {
        let w = flattop_window(65);
        for i in 0..65 {
            assert!((w[i] - w[64 - i]).abs() < 1e-12);
        }
        assert!((w[32] - 1.0).abs() < 1e-6, "peak={}", w[32]);
        assert!(w[0].abs() < 1e-3);
    }

    #[test]
    fn test_overlap_contract() {
        for provider in [SpectralWindow::flattop(), SpectralWindow::hft90d()] {
            for length in (16..=4096).step_by(37).chain([16, 1024, 65536]) {
                let w = provider.window(length).unwrap();
                assert_eq!(w.len(), length);
                assert!(w.overlap < length);
                assert_eq!(w.overlap, (length as f64 * 0.76) as usize);
                assert!(w.validate(length).is_ok());
            }
        }
    }

    #[test]
    fn test_rejects_short_length() {
        let err = SpectralWindow::hft90d().window(3).unwrap_err();
        assert!(matches!(err, NsdError::SegmentTooShort { length: 3, .. }));
        assert!(SpectralWindow::flattop().window(4).is_ok());
        let closure = |length: usize| Window::new(0, vec![1.0; length]);
        assert!(closure.window(2).is_err());
    }

    #[test]
    fn test_overlap_ratio() {
        let w = SpectralWindow::hft90d().with_overlap_ratio(0.5).unwrap();
        assert_eq!(w.window(100).unwrap().overlap, 50);
        assert!(SpectralWindow::hft90d().with_overlap_ratio(1.0).is_err());
        assert!(SpectralWindow::hft90d().with_overlap_ratio(-0.1).is_err());
    }

    #[test]
    fn test_validate_shape() {
        let w = Window::new(8, vec![1.0; 8]);
        assert!(matches!(
            w.validate(8),
            Err(NsdError::InvalidOverlap { overlap: 8, length: 8 })
        ));
        let w = Window::new(2, vec![1.0; 6]);
        assert!(matches!(
            w.validate(8),
            Err(NsdError::WindowLengthMismatch { expected: 8, actual: 6 })
        ));
    }

    #[test]
    fn test_enbw() {
        let rect = Window::new(0, vec![1.0; 64]);
        assert!((rect.enbw() - 1.0).abs() < 1e-12);
        assert!((rect.coherent_gain() - 1.0).abs() < 1e-12);
        // HFT90D ENBW ≈ 3.88 bins
        let hft = SpectralWindow::hft90d().window(4096).unwrap();
        assert!((hft.enbw() - 3.88).abs() < 0.01, "enbw={}", hft.enbw());
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("HFT90D".parse::<WindowKind>().unwrap(), WindowKind::Hft90d);
        assert_eq!("flattop".parse::<WindowKind>().unwrap(), WindowKind::Flattop);
        let err = "hann".parse::<WindowKind>().unwrap_err();
        assert_eq!(err.kind(), crate::types::ErrorKind::Domain);
    }
}
