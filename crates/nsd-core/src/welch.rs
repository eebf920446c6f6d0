//! Welch PSD: averaged, windowed, overlapped periodograms
//!
//! The series is cut into segments of `segment_length` samples whose starts
//! are `segment_length - overlap` apart (any trailing partial segment is
//! dropped). Each segment is optionally detrended, multiplied by the window
//! weights and transformed with a real-input FFT. The one-sided power
//! spectrum is scaled to a density and the segments are averaged.
//!
//! ```text
//! series:   |=========================================|
//! seg 0:    |--------|
//! seg 1:      |--------|            stride = L - overlap
//! seg 2:        |--------|
//!  ...
//! PSD[k] = mean_seg( c_k · |FFT(w · x_seg)[k]|² / (fs · Σw²) ),   k = 0..=L/2
//! c_k = 1 for DC (and Nyquist when L is even), 2 otherwise
//! ```
//!
//! ## Example
//!
//! ```rust
//! use nsd_core::welch::{welch, Detrend};
//! use nsd_core::windows::SpectralWindow;
//!
//! let series: Vec<f64> = (0..4096).map(|i| (i as f64 * 0.37).sin()).collect();
//! let psd = welch(&series, 100.0, 256, &SpectralWindow::hft90d(), Detrend::None).unwrap();
//! assert_eq!(psd.len(), 129);
//! assert_eq!(psd.frequencies[1], 100.0 / 256.0);
//! ```

use std::sync::Arc;

use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::types::{check_sample_frequency, NsdError, NsdResult};
use crate::windows::{Window, WindowProvider};

/// Per-segment detrending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Detrend {
    /// Use the samples as they are.
    #[default]
    None,
    /// Remove the segment mean before windowing.
    Constant,
}

/// Averaged one-sided power spectral density.
#[derive(Debug, Clone, PartialEq)]
pub struct Psd {
    /// Bin frequencies in Hz, `k·fs/L`.
    pub frequencies: Vec<f64>,
    /// Power density per bin (signal²/Hz).
    pub density: Vec<f64>,
    /// Number of averaged segments.
    pub segments: usize,
    /// Overlap between consecutive segments, in samples.
    pub overlap: usize,
    /// Bin spacing in Hz (`fs/L`).
    pub resolution_bandwidth: f64,
}

impl Psd {
    pub fn len(&self) -> usize {
        self.density.len()
    }

    pub fn is_empty(&self) -> bool {
        self.density.is_empty()
    }

    /// Total power: Σ density·Δf.
    pub fn total_power(&self) -> f64 {
        self.density.iter().sum::<f64>() * self.resolution_bandwidth
    }
}

/// Estimate the power spectral density of `series` with Welch's method.
///
/// `window` supplies the weights and overlap for `segment_length`; the
/// returned window is validated before use.
pub fn welch<W>(
    series: &[f64],
    sample_frequency: f64,
    segment_length: usize,
    window: &W,
    detrend: Detrend,
) -> NsdResult<Psd>
where
    W: WindowProvider + ?Sized,
{
    check_sample_frequency(sample_frequency)?;
    if segment_length > series.len() {
        return Err(NsdError::SegmentTooLong {
            segment_length,
            series_length: series.len(),
        });
    }

    let window = window.window(segment_length)?;
    window.validate(segment_length)?;

    let stride = window.stride();
    let segments = (series.len() - segment_length) / stride + 1;
    let bins = segment_length / 2 + 1;

    debug!(
        segment_length,
        overlap = window.overlap,
        segments,
        bins,
        "Welch segmentation"
    );

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(segment_length);

    let mut density = accumulate(series, &window, segments, bins, detrend, &fft);

    let scale = 1.0 / (sample_frequency * window.power() * segments as f64);
    let doubled_end = if segment_length % 2 == 0 { bins - 1 } else { bins };
    for (k, value) in density.iter_mut().enumerate() {
        *value *= scale;
        if k > 0 && k < doubled_end {
            *value *= 2.0;
        }
    }

    let resolution_bandwidth = sample_frequency / segment_length as f64;
    let frequencies = (0..bins).map(|k| k as f64 * resolution_bandwidth).collect();

    Ok(Psd {
        frequencies,
        density,
        segments,
        overlap: window.overlap,
        resolution_bandwidth,
    })
}

/// Reusable FFT buffers for one worker plus its running |X|² sum.
struct SegmentWorker {
    fft: Arc<dyn Fft<f64>>,
    buffer: Vec<Complex64>,
    scratch: Vec<Complex64>,
    sum: Vec<f64>,
}

impl SegmentWorker {
    fn new(fft: Arc<dyn Fft<f64>>, length: usize, bins: usize) -> Self {
        let scratch_len = fft.get_inplace_scratch_len();
        Self {
            fft,
            buffer: vec![Complex64::new(0.0, 0.0); length],
            scratch: vec![Complex64::new(0.0, 0.0); scratch_len],
            sum: vec![0.0; bins],
        }
    }

    /// Add the raw one-sided |X|² of `segment` to the running sum.
    fn add(&mut self, segment: &[f64], weights: &[f64], detrend: Detrend) {
        let offset = match detrend {
            Detrend::None => 0.0,
            Detrend::Constant => segment.iter().sum::<f64>() / segment.len() as f64,
        };

        for ((slot, &x), &w) in self.buffer.iter_mut().zip(segment).zip(weights) {
            *slot = Complex64::new((x - offset) * w, 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        for (acc, x) in self.sum.iter_mut().zip(&self.buffer) {
            *acc += x.norm_sqr();
        }
    }
}

#[cfg(not(feature = "parallel"))]
fn accumulate(
    series: &[f64],
    window: &Window,
    segments: usize,
    bins: usize,
    detrend: Detrend,
    fft: &Arc<dyn Fft<f64>>,
) -> Vec<f64> {
    let length = window.len();
    let stride = window.stride();
    let mut worker = SegmentWorker::new(Arc::clone(fft), length, bins);
    for seg in 0..segments {
        let start = seg * stride;
        worker.add(&series[start..start + length], &window.weights, detrend);
    }
    trace!(segments, "accumulated periodograms");
    worker.sum
}

#[cfg(feature = "parallel")]
fn accumulate(
    series: &[f64],
    window: &Window,
    segments: usize,
    bins: usize,
    detrend: Detrend,
    fft: &Arc<dyn Fft<f64>>,
) -> Vec<f64> {
    use rayon::prelude::*;

    let length = window.len();
    let stride = window.stride();
    let sum = (0..segments)
        .into_par_iter()
        .fold(
            || SegmentWorker::new(Arc::clone(fft), length, bins),
            |mut worker, seg| {
                let start = seg * stride;
                worker.add(&series[start..start + length], &window.weights, detrend);
                worker
            },
        )
        .map(|worker| worker.sum)
        .reduce(
            || vec![0.0; bins],
            |mut a, b| {
                for (x, y) in a.iter_mut().zip(b) {
                    *x += y;
                }
                a
            },
        );
    trace!(segments, "accumulated periodograms in parallel");
    sum
}
