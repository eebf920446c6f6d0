//! # Noise Spectral Density Library
//!
//! This crate estimates the noise amplitude spectral density (NSD) of a
//! uniformly sampled time series and characterizes it with a 1/f plus white
//! noise model.
//!
//! ## Overview
//!
//! - **Welch Estimation**: Averaged, windowed periodograms with a
//!   one-sided density scaling (flat-top HFT90D window by default)
//! - **NSD**: `√PSD` in signal/√Hz with the leakage-prone edge bins cropped
//! - **RMS Checks**: Integrating an NSD back to the RMS of its series
//! - **Smoothing**: Re-binning onto geometric frequencies with a pluggable
//!   aggregate
//! - **Fitting**: Levenberg-Marquardt fit of `slope/f^(n/2) + white`, in
//!   linear or log-log space, with parameter covariance
//! - **Synthesis**: White, pink and Brownian test noise, tones, quantization
//!
//! ## Signal Flow
//!
//! ```text
//! series → Welch PSD → √ → crop → NSD ─┬→ smooth → plot
//!                                      └→ fit → slope, exponent, white floor, corner
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use nsd_core::prelude::*;
//! use rand::SeedableRng;
//!
//! let mut rng = rand::rngs::StdRng::seed_from_u64(1);
//! let series = nsd_noise(1 << 20, &[NoiseKind::White, NoiseKind::Brownian], &mut rng)?;
//!
//! let nsd = NsdEstimator::new(50.0).with_bins(1 << 16).estimate(&series)?;
//! let smoothed = smooth(&nsd, 64, &Aggregate::Median)?;
//! let fitted = fit(&smoothed)?;
//! println!("white floor {:.3e}/√Hz", fitted.model.white_floor);
//! # Ok::<(), nsd_core::NsdError>(())
//! ```

pub mod config;
pub mod fit;
pub mod logging;
pub mod nsd;
pub mod optimize;
pub mod rms;
pub mod smooth;
pub mod synth;
pub mod types;
pub mod welch;
pub mod windows;

// Re-exports for convenience
pub use config::NsdConfig;
pub use fit::{fit, fit_in, fit_loglog, FitResult, FitSpace, NoiseModel};
pub use logging::{init_logging, LogConfig, LogFormat, LogLevel};
pub use nsd::{get, NsdEstimator};
pub use rms::{band_rms, nsd_rms, series_rms};
pub use smooth::{smooth, Aggregate, Aggregator};
pub use types::{Crop, ErrorKind, NsdError, NsdResult, Sample, SpectralEstimate};
pub use welch::{welch, Detrend, Psd};
pub use windows::{SpectralWindow, Window, WindowKind, WindowProvider};

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::NsdConfig;
    pub use crate::fit::{fit, fit_loglog, FitResult, NoiseModel};
    pub use crate::nsd::NsdEstimator;
    pub use crate::rms::{nsd_rms, series_rms};
    pub use crate::smooth::{smooth, Aggregate};
    pub use crate::synth::{nsd_noise, NoiseKind};
    pub use crate::types::{Crop, NsdError, NsdResult, SpectralEstimate};
    pub use crate::windows::{SpectralWindow, WindowKind};
}
