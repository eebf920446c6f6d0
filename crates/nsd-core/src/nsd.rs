//! Noise Amplitude Spectral Density
//!
//! Turns a Welch PSD into an NSD (`√PSD`, signal/√Hz) and drops the edge
//! bins that carry window leakage from DC or the folded Nyquist bin.
//!
//! ```text
//!   series ──► welch(window, L = nsd_bins) ──► √PSD ──► crop ──► SpectralEstimate
//!                                                     (3, 1)
//! ```
//!
//! `nsd_bins` is the Welch segment length, so the frequency resolution is
//! `fs / nsd_bins` and the estimate holds `nsd_bins/2 + 1 - leading - trailing`
//! points. Longer segments resolve lower frequencies but average fewer
//! segments; the series must be strictly longer than one segment.
//!
//! ## Example
//!
//! ```rust
//! use nsd_core::nsd::NsdEstimator;
//! use nsd_core::types::Crop;
//!
//! let series: Vec<f64> = (0..8192).map(|i| ((i * 7919) % 101) as f64 / 100.0).collect();
//! let nsd = NsdEstimator::new(50.0)
//!     .with_bins(1024)
//!     .with_crop(Crop::default())
//!     .estimate(&series)
//!     .unwrap();
//! assert_eq!(nsd.len(), 1024 / 2 + 1 - 4);
//! ```

use tracing::debug;

use crate::types::{check_sample_frequency, Crop, NsdError, NsdResult, SpectralEstimate};
use crate::welch::{welch, Detrend, Psd};
use crate::windows::{SpectralWindow, WindowProvider};

/// Segment length used when none is given: a quarter of the series.
pub fn default_bins(series_length: usize) -> usize {
    series_length / 4
}

/// Estimate the NSD of `series`.
///
/// `nsd_bins` is the Welch segment length and must be smaller than the
/// series. Segments are not detrended.
pub fn get<W>(
    series: &[f64],
    sample_frequency: f64,
    nsd_bins: usize,
    window: &W,
    crop: Crop,
) -> NsdResult<SpectralEstimate>
where
    W: WindowProvider + ?Sized,
{
    check_bins(series, sample_frequency, nsd_bins)?;
    welch(series, sample_frequency, nsd_bins, window, Detrend::None)?.into_nsd(crop)
}

fn check_bins(series: &[f64], sample_frequency: f64, nsd_bins: usize) -> NsdResult<()> {
    check_sample_frequency(sample_frequency)?;
    if nsd_bins >= series.len() {
        return Err(NsdError::SegmentTooLong {
            segment_length: nsd_bins,
            series_length: series.len(),
        });
    }
    Ok(())
}

impl Psd {
    /// Amplitude density `√PSD`, with `crop` applied.
    pub fn into_nsd(self, crop: Crop) -> NsdResult<SpectralEstimate> {
        let range = crop.range(self.len())?;
        let frequencies = self.frequencies[range.clone()].to_vec();
        let amplitudes = self.density[range].iter().map(|p| p.sqrt()).collect();
        debug!(
            leading = crop.leading,
            trailing = crop.trailing,
            points = frequencies.len(),
            "cropped NSD"
        );
        SpectralEstimate::new(frequencies, amplitudes)
    }
}

/// NSD estimator with its window, bin count, crop and detrend settings.
///
/// The window provider is a type parameter; any [`WindowProvider`],
/// including a closure, can be plugged in with [`NsdEstimator::with_window`].
#[derive(Debug, Clone)]
pub struct NsdEstimator<W = SpectralWindow> {
    sample_frequency: f64,
    bins: Option<usize>,
    window: W,
    crop: Crop,
    detrend: Detrend,
}

impl NsdEstimator<SpectralWindow> {
    /// Estimator with the HFT90D window, default crop and no detrending.
    pub fn new(sample_frequency: f64) -> Self {
        Self {
            sample_frequency,
            bins: None,
            window: SpectralWindow::default(),
            crop: Crop::default(),
            detrend: Detrend::None,
        }
    }
}

impl<W: WindowProvider> NsdEstimator<W> {
    /// Replace the window provider.
    pub fn with_window<V: WindowProvider>(self, window: V) -> NsdEstimator<V> {
        NsdEstimator {
            sample_frequency: self.sample_frequency,
            bins: self.bins,
            window,
            crop: self.crop,
            detrend: self.detrend,
        }
    }

    /// Fix the segment length instead of using [`default_bins`].
    pub fn with_bins(mut self, bins: usize) -> Self {
        self.bins = Some(bins);
        self
    }

    pub fn with_crop(mut self, crop: Crop) -> Self {
        self.crop = crop;
        self
    }

    pub fn with_detrend(mut self, detrend: Detrend) -> Self {
        self.detrend = detrend;
        self
    }

    pub fn sample_frequency(&self) -> f64 {
        self.sample_frequency
    }

    pub fn window(&self) -> &W {
        &self.window
    }

    pub fn crop(&self) -> Crop {
        self.crop
    }

    pub fn detrend(&self) -> Detrend {
        self.detrend
    }

    /// Segment length used for a series of `series_length` samples.
    pub fn bins_for(&self, series_length: usize) -> usize {
        self.bins.unwrap_or_else(|| default_bins(series_length))
    }

    /// Averaged PSD without the square root or crop.
    pub fn psd(&self, series: &[f64]) -> NsdResult<Psd> {
        let bins = self.bins_for(series.len());
        check_bins(series, self.sample_frequency, bins)?;
        debug!(
            window = self.window.name(),
            bins,
            samples = series.len(),
            "estimating NSD"
        );
        welch(series, self.sample_frequency, bins, &self.window, self.detrend)
    }

    /// Cropped amplitude spectral density of `series`.
    pub fn estimate(&self, series: &[f64]) -> NsdResult<SpectralEstimate> {
        self.psd(series)?.into_nsd(self.crop)
    }
}
